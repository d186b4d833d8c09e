//! Generate command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::{GenerateOptions, Orchestrator};
use crate::transcript::Transcript;
use anyhow::Result;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Run the generate command.
pub async fn run_generate(
    transcript_path: &str,
    model: Option<String>,
    output_file: Option<String>,
    no_appendix: bool,
    single_pass: bool,
    dump_outline: Option<String>,
    settings: Settings,
) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Generate) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    let raw = std::fs::read_to_string(transcript_path)?;
    let transcript = Transcript::from_json_str(&raw)?;
    Output::info(&format!(
        "Loaded transcript: ~{} tokens{}",
        transcript.estimated_tokens(),
        if transcript.is_diarized() {
            format!(
                ", {} segments, {:.0} min",
                transcript.segments().len(),
                transcript.duration_seconds() / 60.0
            )
        } else {
            ", flat text".to_string()
        }
    ));

    let orchestrator = Orchestrator::new(settings)?;

    // Ctrl-C aborts the run; nothing is written on abort.
    let cancel = orchestrator.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            Output::warning("Interrupted, aborting run...");
            cancel.cancel();
        }
    });

    let opts = GenerateOptions {
        single_pass,
        skip_appendix: no_appendix,
        model,
        dump_outline: dump_outline.map(PathBuf::from),
    };

    let result = orchestrator.generate(&transcript, &opts).await?;

    Output::success(&format!("Done: {} chars", result.article.len()));
    Output::kv("Strategy", &result.strategy.to_string());
    Output::kv("Completion calls", &result.calls.len().to_string());
    let prompt_tokens: usize = result.calls.iter().map(|c| c.prompt_tokens).sum();
    Output::kv("Prompt tokens (est.)", &prompt_tokens.to_string());

    match output_file {
        Some(path) => write_article_atomically(&result.article, Path::new(&path))?,
        None => println!("{}", result.article),
    }

    Ok(())
}

/// Write the article via a temp file + rename, so a crash or abort never
/// leaves a partial article on disk.
fn write_article_atomically(article: &str, path: &Path) -> Result<()> {
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
    let mut tmp = match dir {
        Some(dir) => tempfile::NamedTempFile::new_in(dir)?,
        None => tempfile::NamedTempFile::new_in(".")?,
    };
    tmp.write_all(article.as_bytes())?;
    tmp.persist(path).map_err(|e| e.error)?;

    Output::success(&format!("Article written to {}", path.display()));
    Ok(())
}
