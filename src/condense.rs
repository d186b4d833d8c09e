//! Chunk condensation for the oversized-transcript fallback.
//!
//! Each chunk is reduced to compact notes with one completion call. Chunks
//! carry no shared state, so calls run concurrently under the bounded pool;
//! the notes are collated back into chunk order before concatenation.

use crate::chunking::Chunk;
use crate::completion::CompletionClient;
use crate::config::Prompts;
use crate::error::Result;
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// Ordered per-chunk notes standing in for the original transcript.
#[derive(Debug, Clone)]
pub struct CondensedNotes {
    parts: Vec<String>,
}

impl CondensedNotes {
    /// The labelled note parts, in chunk order.
    pub fn parts(&self) -> &[String] {
        &self.parts
    }

    /// In-order concatenation used downstream in place of the transcript.
    pub fn combined(&self) -> String {
        self.parts.join("\n\n")
    }
}

/// Condenses chunks into notes via the completion client.
pub struct Condenser {
    client: Arc<dyn CompletionClient>,
    prompts: Prompts,
    model: String,
    max_output_tokens: u32,
    max_concurrent: usize,
}

impl Condenser {
    pub fn new(
        client: Arc<dyn CompletionClient>,
        prompts: Prompts,
        model: String,
        max_output_tokens: u32,
        max_concurrent: usize,
    ) -> Self {
        Self {
            client,
            prompts,
            model,
            max_output_tokens,
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// Condense all chunks, preserving chunk order in the result.
    pub async fn condense(&self, chunks: &[Chunk]) -> Result<CondensedNotes> {
        let total = chunks.len();
        info!("Condensing {} chunks with {}", total, self.model);

        let pb = ProgressBar::new(total as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("  {spinner:.green} Condensing [{bar:30.cyan/blue}] {pos}/{len}")
                .unwrap()
                .progress_chars("█▓░"),
        );

        let mut parts: Vec<(usize, String)> = Vec::with_capacity(total);

        let mut stream = stream::iter(chunks.iter())
            .map(|chunk| {
                let prompt = self.condense_prompt(chunk, total);
                async move {
                    let result = self
                        .client
                        .complete(&prompt, &self.model, self.max_output_tokens)
                        .await;
                    (chunk.index, result)
                }
            })
            .buffer_unordered(self.max_concurrent);

        while let Some((index, result)) = stream.next().await {
            pb.inc(1);
            match result {
                Ok(notes) => {
                    parts.push((
                        index,
                        format!("=== Part {} of {} ===\n{}", index + 1, total, notes.trim()),
                    ));
                }
                Err(e) => {
                    pb.finish_and_clear();
                    return Err(e.in_stage(format!("condensation chunk {}", index + 1)));
                }
            }
        }
        pb.finish_and_clear();

        // Collate back into chunk order; completion order is arbitrary.
        parts.sort_by_key(|(index, _)| *index);

        Ok(CondensedNotes {
            parts: parts.into_iter().map(|(_, notes)| notes).collect(),
        })
    }

    fn condense_prompt(&self, chunk: &Chunk, total: usize) -> String {
        let mut vars = HashMap::new();
        vars.insert("text".to_string(), chunk.body.clone());
        vars.insert("context".to_string(), chunk.context.clone());
        vars.insert("chunk_index".to_string(), (chunk.index + 1).to_string());
        vars.insert("total_chunks".to_string(), total.to_string());
        self.prompts
            .render_with_custom(&self.prompts.condense.user, &vars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::testing::{FakeCompletion, FakeReply};
    use crate::error::FortellError;
    use std::time::Duration;

    fn chunk(index: usize, body: &str, context: &str) -> Chunk {
        Chunk {
            index,
            body: body.to_string(),
            context: context.to_string(),
            start_seconds: 0.0,
            end_seconds: 0.0,
        }
    }

    fn condenser(client: Arc<dyn CompletionClient>) -> Condenser {
        Condenser::new(client, Prompts::default(), "test-model".to_string(), 1000, 4)
    }

    #[tokio::test(start_paused = true)]
    async fn test_notes_keep_chunk_order() {
        // Earlier chunks finish last; collation must restore chunk order.
        let fake = Arc::new(FakeCompletion::new(|_, prompt| {
            let marker = if prompt.contains("CHUNK-A") {
                ("notes for A", 30)
            } else if prompt.contains("CHUNK-B") {
                ("notes for B", 20)
            } else {
                ("notes for C", 10)
            };
            FakeReply::delayed(marker.0, Duration::from_millis(marker.1))
        }));

        let chunks = vec![
            chunk(0, "CHUNK-A body", ""),
            chunk(1, "CHUNK-B body", "tail of A"),
            chunk(2, "CHUNK-C body", "tail of B"),
        ];

        let notes = condenser(fake.clone()).condense(&chunks).await.unwrap();

        assert_eq!(notes.parts().len(), 3);
        assert!(notes.parts()[0].starts_with("=== Part 1 of 3 ===\nnotes for A"));
        assert!(notes.parts()[1].starts_with("=== Part 2 of 3 ===\nnotes for B"));
        assert!(notes.parts()[2].starts_with("=== Part 3 of 3 ===\nnotes for C"));

        let combined = notes.combined();
        let a = combined.find("notes for A").unwrap();
        let c = combined.find("notes for C").unwrap();
        assert!(a < c);
    }

    #[tokio::test]
    async fn test_prompt_carries_context_and_position() {
        let fake = Arc::new(FakeCompletion::always("notes"));
        let chunks = vec![chunk(0, "first body", ""), chunk(1, "second body", "first tail")];

        condenser(fake.clone()).condense(&chunks).await.unwrap();

        let calls = fake.calls();
        assert_eq!(calls.len(), 2);
        let second = calls
            .iter()
            .find(|c| c.prompt.contains("second body"))
            .unwrap();
        assert!(second.prompt.contains("first tail"));
        assert!(second.prompt.contains("part 2 of 2"));
    }

    #[tokio::test]
    async fn test_failure_names_the_chunk() {
        let fake = Arc::new(FakeCompletion::new(|_, prompt| {
            if prompt.contains("bad body") {
                FakeReply::error(FortellError::Api {
                    message: "boom".into(),
                    transient: false,
                })
            } else {
                FakeReply::text("notes")
            }
        }));
        let chunks = vec![chunk(0, "good body", ""), chunk(1, "bad body", "")];

        let err = condenser(fake).condense(&chunks).await.unwrap_err();
        assert!(err.to_string().contains("condensation chunk 2"));
    }
}
