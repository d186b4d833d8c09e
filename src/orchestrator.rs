//! Pipeline orchestrator for Fortell.
//!
//! Selects a generation strategy once per run, drives the components in
//! order, and assembles the final article. Three strategies:
//!
//! 1. **Single-pass**: one call, only when explicitly requested and the
//!    transcript fits the model's single-call budget.
//! 2. **Outline + sections** (default): outline call, then one call per
//!    section over a shared byte-identical prefix, plus an optional
//!    appendix call reusing the same prefix.
//! 3. **Chunked**: split, condense each chunk, then re-run the ladder with
//!    the condensed notes standing in for the transcript; if the notes
//!    still exceed the budget, one last-resort single pass from the notes.
//!
//! This is a strict fallback chain, not a retry loop: each strategy is
//! attempted at most once per run.

use crate::budget::TokenBudget;
use crate::chunking::ChunkSplitter;
use crate::completion::{
    CallRecord, CompletionClient, OpenAiCompletion, RecordingClient,
};
use crate::condense::Condenser;
use crate::config::{Prompts, Settings, Task};
use crate::error::{FortellError, Result};
use crate::outline::OutlineBuilder;
use crate::transcript::Transcript;
use crate::writer::{assemble_article, CachedPrefix, SectionWriter, SinglePassWriter};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

/// Generation strategy selected for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    SinglePass,
    OutlineSections,
    Chunked,
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Strategy::SinglePass => write!(f, "single-pass"),
            Strategy::OutlineSections => write!(f, "outline+sections"),
            Strategy::Chunked => write!(f, "chunked"),
        }
    }
}

/// Options for one generation run.
#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    /// Request the single-pass strategy. Honored only when the transcript
    /// fits the single-call budget; size-based selection applies otherwise.
    pub single_pass: bool,
    /// Skip the appendix call.
    pub skip_appendix: bool,
    /// Override the configured model for every task in this run.
    pub model: Option<String>,
    /// Write the validated outline JSON to this path as a debug artifact.
    pub dump_outline: Option<PathBuf>,
}

/// The assembled article plus run metadata.
#[derive(Debug)]
pub struct GenerationResult {
    /// The final article text.
    pub article: String,
    /// Strategy the run used.
    pub strategy: Strategy,
    /// Per-call token counts, in completion order.
    pub calls: Vec<CallRecord>,
}

/// The main orchestrator for the Fortell pipeline.
pub struct Orchestrator {
    settings: Settings,
    prompts: Prompts,
    client: Arc<dyn CompletionClient>,
    budget: TokenBudget,
    cancel: CancellationToken,
}

impl Orchestrator {
    /// Create an orchestrator with the production completion client.
    pub fn new(settings: Settings) -> Result<Self> {
        let prompts = Prompts::load(
            settings.prompts.custom_dir.as_deref(),
            Some(&settings.prompts.variables),
        )?;
        let client = Arc::new(OpenAiCompletion::new(&settings));
        Ok(Self::with_client(settings, prompts, client))
    }

    /// Create an orchestrator with an injected completion client.
    pub fn with_client(
        settings: Settings,
        prompts: Prompts,
        client: Arc<dyn CompletionClient>,
    ) -> Self {
        let budget = TokenBudget::new(settings.models.limits.clone());
        Self {
            settings,
            prompts,
            client,
            budget,
            cancel: CancellationToken::new(),
        }
    }

    /// Token for aborting the run. An aborted run discards all accumulated
    /// text and never emits a partial article.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Generate an article from a transcript.
    #[instrument(skip(self, transcript, opts))]
    pub async fn generate(
        &self,
        transcript: &Transcript,
        opts: &GenerateOptions,
    ) -> Result<GenerationResult> {
        let recorder = Arc::new(RecordingClient::new(self.client.clone()));

        let run = self.run(recorder.clone() as Arc<dyn CompletionClient>, transcript, opts);
        let (strategy, article) = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(FortellError::Cancelled),
            result = run => result?,
        };

        info!("Run complete: {} strategy, {} chars", strategy, article.len());
        Ok(GenerationResult {
            article,
            strategy,
            calls: recorder.take_records(),
        })
    }

    /// Strategy selection and execution. Evaluated once per run.
    async fn run(
        &self,
        client: Arc<dyn CompletionClient>,
        transcript: &Transcript,
        opts: &GenerateOptions,
    ) -> Result<(Strategy, String)> {
        let text_tokens = transcript.estimated_tokens();
        let overhead = self.settings.generation.prompt_overhead_tokens;
        let outline_overhead = self.settings.generation.outline_overhead_tokens;
        let single_pass_model = self.model_for(Task::SinglePass, opts);
        let section_model = self.model_for(Task::Section, opts);

        info!(
            "Transcript: ~{} tokens, single-pass requested: {}",
            text_tokens, opts.single_pass
        );

        // 1. Explicit single-pass request, honored only when it fits.
        if opts.single_pass
            && text_tokens + overhead <= self.budget.available_input(&single_pass_model, 0)
        {
            info!("Strategy: single-pass");
            let writer = self.single_pass_writer(&client, &single_pass_model);
            return match writer.write(transcript.text()).await {
                Err(e) if e.is_token_limit() => {
                    warn!("Single-pass prompt exceeded the input budget, falling back to chunked");
                    self.run_chunked(&client, transcript, opts).await
                }
                result => Ok((Strategy::SinglePass, result?)),
            };
        }

        // 2. Default path when the transcript fits the context window.
        if text_tokens + outline_overhead <= self.budget.available_input(&section_model, overhead)
        {
            info!("Strategy: outline + sections");
            return match self.run_outline_sections(&client, transcript.text(), opts).await {
                Err(e) if e.is_token_limit() => {
                    warn!("Prompt exceeded the input budget, falling back to chunked");
                    self.run_chunked(&client, transcript, opts).await
                }
                result => Ok((Strategy::OutlineSections, result?)),
            };
        }

        // 3. Overflow path.
        warn!(
            "Transcript exceeds the input budget (~{} tokens), condensing first",
            text_tokens
        );
        self.run_chunked(&client, transcript, opts).await
    }

    /// Outline + sections over the given source text (transcript or notes).
    async fn run_outline_sections(
        &self,
        client: &Arc<dyn CompletionClient>,
        source_text: &str,
        opts: &GenerateOptions,
    ) -> Result<String> {
        let outline_model = self.model_for(Task::Outline, opts);
        let builder = OutlineBuilder::new(
            client.clone(),
            self.prompts.clone(),
            outline_model.clone(),
            self.max_output(&outline_model),
            self.settings.generation.min_sections,
            self.settings.generation.max_sections,
        );

        eprintln!("  Generating outline...");
        let outline = builder.build(source_text).await?;
        eprintln!(
            "  Outline: \"{}\" ({} sections)",
            outline.title,
            outline.sections.len()
        );

        if let Some(path) = &opts.dump_outline {
            std::fs::write(path, serde_json::to_string_pretty(&outline)?)?;
            info!("Outline dumped to {}", path.display());
        }

        let prefix = CachedPrefix::build(&self.prompts, source_text, &outline);
        info!(
            "Cached prefix: ~{} tokens (billed once from the second call on)",
            self.budget.estimate(prefix.as_str())
        );

        let section_model = self.model_for(Task::Section, opts);
        let writer = SectionWriter::new(
            client.clone(),
            self.prompts.clone(),
            section_model.clone(),
            self.model_for(Task::Appendix, opts),
            self.max_output(&section_model),
            self.settings.generation.max_concurrent_calls,
        );

        let sections = writer.write_sections(&prefix, &outline).await?;

        let appendix = if opts.skip_appendix {
            None
        } else {
            match writer.write_appendix(&prefix, &outline).await {
                Ok(appendix) => appendix,
                Err(e) => {
                    warn!("Appendix generation failed, shipping without it: {}", e);
                    None
                }
            }
        };

        Ok(assemble_article(&outline.title, &sections, appendix.as_deref()))
    }

    /// Chunked strategy: split, condense, then re-evaluate the ladder with
    /// the condensed notes in place of the transcript.
    async fn run_chunked(
        &self,
        client: &Arc<dyn CompletionClient>,
        transcript: &Transcript,
        opts: &GenerateOptions,
    ) -> Result<(Strategy, String)> {
        let chunks = ChunkSplitter::new(self.settings.chunking.clone()).split(transcript);
        if chunks.is_empty() {
            return Err(FortellError::InvalidInput(
                "transcript produced no chunks".to_string(),
            ));
        }
        eprintln!("  Condensing {} chunks...", chunks.len());

        let condense_model = self.model_for(Task::Condensation, opts);
        let condenser = Condenser::new(
            client.clone(),
            self.prompts.clone(),
            condense_model.clone(),
            self.max_output(&condense_model),
            self.settings.generation.max_concurrent_calls,
        );
        let notes = condenser.condense(&chunks).await?;
        let combined = notes.combined();

        let notes_tokens = self.budget.estimate(&combined);
        info!("Condensed to ~{} tokens", notes_tokens);

        let overhead = self.settings.generation.prompt_overhead_tokens;
        let outline_overhead = self.settings.generation.outline_overhead_tokens;
        let single_pass_model = self.model_for(Task::SinglePass, opts);
        let section_model = self.model_for(Task::Section, opts);

        let article = if opts.single_pass
            && notes_tokens + overhead <= self.budget.available_input(&single_pass_model, 0)
        {
            self.single_pass_writer(client, &single_pass_model)
                .write_from_notes(&combined)
                .await?
        } else if notes_tokens + outline_overhead
            <= self.budget.available_input(&section_model, overhead)
        {
            self.run_outline_sections(client, &combined, opts).await?
        } else {
            // Last resort; a token-limit failure here is fatal.
            warn!("Condensed notes still exceed the input budget, writing single pass from notes");
            self.single_pass_writer(client, &single_pass_model)
                .write_from_notes(&combined)
                .await?
        };

        Ok((Strategy::Chunked, article))
    }

    fn single_pass_writer(
        &self,
        client: &Arc<dyn CompletionClient>,
        model: &str,
    ) -> SinglePassWriter {
        SinglePassWriter::new(
            client.clone(),
            self.prompts.clone(),
            model.to_string(),
            self.max_output(model),
        )
    }

    fn model_for(&self, task: Task, opts: &GenerateOptions) -> String {
        self.settings.models.for_task(task, opts.model.as_deref())
    }

    fn max_output(&self, model: &str) -> u32 {
        self.budget.limits(model).max_output_tokens.min(u32::MAX as usize) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::budget::ModelLimits;
    use crate::completion::testing::{FakeCompletion, FakeReply};
    use crate::transcript::Segment;

    const MODEL: &str = "test-model";

    fn outline_json(sections: usize) -> String {
        let sections: Vec<String> = (0..sections)
            .map(|i| {
                format!(
                    r#"{{"id": "S{n}", "title": "Section {n}", "brief": "Covers part {n}"}}"#,
                    n = i + 1
                )
            })
            .collect();
        format!(
            r#"{{"title": "The Article", "sections": [{}], "terms": []}}"#,
            sections.join(", ")
        )
    }

    /// Route fake replies by which pipeline task the prompt belongs to.
    fn router(sections: usize) -> impl Fn(usize, &str) -> FakeReply {
        move |_, prompt| {
            if prompt.contains("condensing part") {
                FakeReply::text("condensed notes for this part")
            } else if prompt.contains("Produce a plan") {
                FakeReply::text(outline_json(sections))
            } else if prompt.contains("Write an appendix") {
                FakeReply::text("## Glossary\n\nterms here")
            } else if prompt.contains("Write section") {
                FakeReply::text("section body")
            } else {
                FakeReply::text("# Article\n\nsingle pass body")
            }
        }
    }

    fn settings_with_limits(context_window: usize, max_output_tokens: usize) -> Settings {
        let mut settings = Settings::default();
        settings.models.limits.insert(
            MODEL.to_string(),
            ModelLimits {
                context_window,
                max_output_tokens,
            },
        );
        settings
    }

    fn orchestrator(fake: Arc<FakeCompletion>, settings: Settings) -> Orchestrator {
        Orchestrator::with_client(settings, Prompts::default(), fake)
    }

    fn opts() -> GenerateOptions {
        GenerateOptions {
            model: Some(MODEL.to_string()),
            ..GenerateOptions::default()
        }
    }

    fn small_diarized_transcript() -> Transcript {
        // Three segments, ~1500 chars total => ~500 estimated tokens.
        let part = "word ".repeat(100);
        let segments = vec![
            Segment::new(0.0, 10.0, Some("A"), part.trim()),
            Segment::new(10.0, 20.0, Some("A"), part.trim()),
            Segment::new(20.0, 30.0, Some("A"), part.trim()),
        ];
        Transcript::from_segments(segments).unwrap()
    }

    #[tokio::test]
    async fn test_scenario_single_pass_requested_and_fits() {
        // Single-pass budget: 36768 - 32768 = 4000 tokens; 500 + 3000 fits.
        let fake = Arc::new(FakeCompletion::new(router(0)));
        let orch = orchestrator(fake.clone(), settings_with_limits(36_768, 32_768));

        let result = orch
            .generate(
                &small_diarized_transcript(),
                &GenerateOptions {
                    single_pass: true,
                    ..opts()
                },
            )
            .await
            .unwrap();

        assert_eq!(result.strategy, Strategy::SinglePass);
        assert_eq!(fake.call_count(), 1);
        assert_eq!(result.calls.len(), 1);
        assert_eq!(result.article, "# Article\n\nsingle pass body");
    }

    #[tokio::test]
    async fn test_single_pass_not_requested_takes_outline_path() {
        // Same small transcript, but without the explicit request the
        // default outline path applies.
        let fake = Arc::new(FakeCompletion::new(router(4)));
        let orch = orchestrator(fake.clone(), settings_with_limits(200_000, 10_000));

        let result = orch
            .generate(&small_diarized_transcript(), &opts())
            .await
            .unwrap();

        assert_eq!(result.strategy, Strategy::OutlineSections);
    }

    #[tokio::test]
    async fn test_scenario_outline_sections_with_identical_prefixes() {
        // ~150K-token transcript against a 200K context window.
        let sentence = "This sentence is about caching economics. ";
        let text = sentence.repeat(450_000 / sentence.len());
        let transcript = Transcript::from_flat(&text).unwrap();

        let fake = Arc::new(FakeCompletion::new(router(5)));
        let orch = orchestrator(fake.clone(), settings_with_limits(200_000, 10_000));

        let result = orch.generate(&transcript, &opts()).await.unwrap();

        assert_eq!(result.strategy, Strategy::OutlineSections);
        // One outline call, five section calls, one appendix call.
        assert_eq!(fake.call_count(), 7);
        assert_eq!(result.calls.len(), 7);

        // Every section and appendix call shares a byte-identical prefix.
        let outline = crate::outline::parse_outline(&outline_json(5)).unwrap();
        let prefix = CachedPrefix::build(&Prompts::default(), transcript.text(), &outline);
        let calls = fake.calls();
        let prefixed: Vec<_> = calls
            .iter()
            .filter(|c| !c.prompt.contains("Produce a plan"))
            .collect();
        assert_eq!(prefixed.len(), 6);
        for call in prefixed {
            assert_eq!(&call.prompt[..prefix.as_str().len()], prefix.as_str());
        }

        // Sections appear in outline order in the assembled article.
        let s1 = result.article.find("## Section 1").unwrap();
        let s5 = result.article.find("## Section 5").unwrap();
        assert!(s1 < s5);
        assert!(result.article.contains("## Glossary"));
    }

    #[tokio::test]
    async fn test_scenario_chunked_condense_then_outline() {
        // ~500K-token diarized transcript against a 200K context window:
        // 3 hours of speech in 40-minute windows => 5 condensation calls.
        let part = "word ".repeat(1_680);
        let segments: Vec<Segment> = (0..180)
            .map(|i| Segment::new(i as f64 * 60.0, (i + 1) as f64 * 60.0, Some("A"), part.trim()))
            .collect();
        let transcript = Transcript::from_segments(segments).unwrap();
        assert!(transcript.estimated_tokens() > 400_000);

        let fake = Arc::new(FakeCompletion::new(router(4)));
        let orch = orchestrator(fake.clone(), settings_with_limits(200_000, 10_000));

        let result = orch
            .generate(
                &transcript,
                &GenerateOptions {
                    skip_appendix: true,
                    ..opts()
                },
            )
            .await
            .unwrap();

        assert_eq!(result.strategy, Strategy::Chunked);

        let calls = fake.calls();
        let condense_calls = calls
            .iter()
            .filter(|c| c.prompt.contains("condensing part"))
            .count();
        assert_eq!(condense_calls, 5);

        // The outline was built over the notes, not the raw transcript.
        let outline_call = calls
            .iter()
            .find(|c| c.prompt.contains("Produce a plan"))
            .unwrap();
        assert!(outline_call.prompt.contains("condensed notes for this part"));

        // 5 condense + 1 outline + 4 sections, no appendix.
        assert_eq!(fake.call_count(), 10);
    }

    #[tokio::test]
    async fn test_chunked_last_resort_single_pass_from_notes() {
        // Notes still exceed the tiny context window, so the run falls back
        // to one single pass from the notes.
        let mut settings = settings_with_limits(2_000, 500);
        settings.chunking.window_tokens = 5_000;
        settings.chunking.overlap_chars = 200;

        let text = "Statement about the topic. ".repeat(30_000 / 27);
        let transcript = Transcript::from_flat(&text).unwrap();

        let fake = Arc::new(FakeCompletion::new(|_, prompt| {
            if prompt.contains("condensing part") {
                FakeReply::text("note ".repeat(2_000))
            } else if prompt.contains("condensed, part by part") {
                FakeReply::text("article from notes")
            } else {
                FakeReply::error(FortellError::Api {
                    message: format!("unexpected call: {}", &prompt[..60]),
                    transient: false,
                })
            }
        }));
        let orch = orchestrator(fake.clone(), settings);

        let result = orch.generate(&transcript, &opts()).await.unwrap();

        assert_eq!(result.strategy, Strategy::Chunked);
        assert_eq!(result.article, "article from notes");
        let from_notes_calls = fake
            .calls()
            .iter()
            .filter(|c| c.prompt.contains("condensed, part by part"))
            .count();
        assert_eq!(from_notes_calls, 1);
    }

    #[tokio::test]
    async fn test_token_limit_in_outline_path_falls_back_to_chunked() {
        let sentence = "A sentence about the lecture topic. ";
        let text = sentence.repeat(60_000 / sentence.len());
        let transcript = Transcript::from_flat(&text).unwrap();

        // The outline call over the raw transcript reports a token-limit
        // overflow; the retry over condensed notes succeeds.
        let fake = Arc::new(FakeCompletion::new(move |_, prompt| {
            if prompt.contains("Produce a plan") && prompt.contains("lecture topic") {
                FakeReply::error(FortellError::TokenLimit {
                    prompt_tokens: 30_000,
                    budget: 20_000,
                })
            } else {
                router(4)(0, prompt)
            }
        }));
        let orch = orchestrator(fake.clone(), settings_with_limits(200_000, 10_000));

        let result = orch
            .generate(
                &transcript,
                &GenerateOptions {
                    skip_appendix: true,
                    ..opts()
                },
            )
            .await
            .unwrap();

        assert_eq!(result.strategy, Strategy::Chunked);
        assert!(result.article.contains("## Section 1"));
    }

    #[tokio::test]
    async fn test_cancelled_run_emits_nothing() {
        let fake = Arc::new(FakeCompletion::new(router(4)));
        let orch = orchestrator(fake.clone(), settings_with_limits(200_000, 10_000));

        orch.cancellation_token().cancel();
        let err = orch
            .generate(&small_diarized_transcript(), &opts())
            .await
            .unwrap_err();

        assert!(matches!(err, FortellError::Cancelled));
        assert_eq!(fake.call_count(), 0);
    }

    #[tokio::test]
    async fn test_outline_failure_carries_stage_diagnostic() {
        let fake = Arc::new(FakeCompletion::new(|_, prompt| {
            if prompt.contains("Produce a plan") {
                FakeReply::error(FortellError::Api {
                    message: "server exploded".into(),
                    transient: false,
                })
            } else {
                FakeReply::text("body")
            }
        }));
        let orch = orchestrator(fake, settings_with_limits(200_000, 10_000));

        let err = orch
            .generate(&small_diarized_transcript(), &opts())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("outline failed"));
    }
}
