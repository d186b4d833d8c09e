//! Per-section article generation over a shared cached prefix.
//!
//! Every call sends the identical prefix plus a small per-section suffix.
//! Sections are independent once the outline and prefix are fixed, so they
//! run concurrently under the bounded pool; drafts are reassembled by
//! outline index, never by arrival order.

use super::CachedPrefix;
use crate::completion::CompletionClient;
use crate::config::Prompts;
use crate::error::Result;
use crate::outline::Outline;
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// One generated section, tagged with its outline position.
#[derive(Debug, Clone)]
pub struct SectionDraft {
    pub index: usize,
    pub title: String,
    pub text: String,
}

/// Writes article sections and the optional appendix.
pub struct SectionWriter {
    client: Arc<dyn CompletionClient>,
    prompts: Prompts,
    model: String,
    appendix_model: String,
    max_output_tokens: u32,
    max_concurrent: usize,
}

impl SectionWriter {
    pub fn new(
        client: Arc<dyn CompletionClient>,
        prompts: Prompts,
        model: String,
        appendix_model: String,
        max_output_tokens: u32,
        max_concurrent: usize,
    ) -> Self {
        Self {
            client,
            prompts,
            model,
            appendix_model,
            max_output_tokens,
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// Generate every outline section, returning drafts in outline order.
    pub async fn write_sections(
        &self,
        prefix: &CachedPrefix,
        outline: &Outline,
    ) -> Result<Vec<SectionDraft>> {
        let total = outline.sections.len();
        info!("Writing {} sections with {}", total, self.model);

        let pb = ProgressBar::new(total as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("  {spinner:.green} Writing sections [{bar:30.cyan/blue}] {pos}/{len}")
                .unwrap()
                .progress_chars("█▓░"),
        );

        let mut drafts: Vec<SectionDraft> = Vec::with_capacity(total);

        let mut stream = stream::iter(outline.sections.iter().enumerate())
            .map(|(index, section)| {
                let prompt = format!("{}{}", prefix.as_str(), self.section_suffix(outline, index));
                let title = section.title.clone();
                async move {
                    let result = self
                        .client
                        .complete(&prompt, &self.model, self.max_output_tokens)
                        .await;
                    (index, title, result)
                }
            })
            .buffer_unordered(self.max_concurrent);

        while let Some((index, title, result)) = stream.next().await {
            pb.inc(1);
            match result {
                Ok(text) => drafts.push(SectionDraft { index, title, text }),
                Err(e) => {
                    pb.finish_and_clear();
                    return Err(e.in_stage(format!("section {}", index + 1)));
                }
            }
        }
        pb.finish_and_clear();

        // Outline order, regardless of completion order.
        drafts.sort_by_key(|d| d.index);
        Ok(drafts)
    }

    /// Generate the appendix, reusing the identical cached prefix.
    ///
    /// Returns `None` when the model produces nothing usable; the article
    /// simply ships without an appendix.
    pub async fn write_appendix(
        &self,
        prefix: &CachedPrefix,
        outline: &Outline,
    ) -> Result<Option<String>> {
        let mut vars = HashMap::new();
        vars.insert("terms".to_string(), outline.format_terms());
        let suffix = self
            .prompts
            .render_with_custom(&self.prompts.appendix.task, &vars);
        let prompt = format!("{}{}", prefix.as_str(), suffix);

        let text = self
            .client
            .complete(&prompt, &self.appendix_model, self.max_output_tokens)
            .await
            .map_err(|e| e.in_stage("appendix"))?;

        let text = text.trim();
        Ok((!text.is_empty()).then(|| text.to_string()))
    }

    /// Per-section task suffix: position, brief, and neighboring briefs for
    /// local continuity.
    fn section_suffix(&self, outline: &Outline, index: usize) -> String {
        let total = outline.sections.len();
        let section = &outline.sections[index];

        let prev_section = match index.checked_sub(1).and_then(|i| outline.sections.get(i)) {
            Some(prev) => format!(
                "PREVIOUS SECTION (already written):\n{}: {}",
                prev.title, prev.brief
            ),
            None => "This is the first section of the article. Open with an introduction to the topic.".to_string(),
        };

        let next_section = match outline.sections.get(index + 1) {
            Some(next) => format!(
                "NEXT SECTION (written later):\n{}: {}",
                next.title, next.brief
            ),
            None => "This is the last section. Close the article with conclusions.".to_string(),
        };

        let mut vars = HashMap::new();
        vars.insert("section_number".to_string(), (index + 1).to_string());
        vars.insert("total_sections".to_string(), total.to_string());
        vars.insert("section_title".to_string(), section.title.clone());
        vars.insert("section_brief".to_string(), section.brief.clone());
        vars.insert("prev_section".to_string(), prev_section);
        vars.insert("next_section".to_string(), next_section);

        self.prompts
            .render_with_custom(&self.prompts.section.task, &vars)
    }
}
