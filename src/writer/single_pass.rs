//! One-shot article generation.
//!
//! Used when the whole task fits comfortably within one call's output
//! budget, and as the last resort of the chunked path. No outline, no
//! caching benefit expected.

use crate::completion::CompletionClient;
use crate::config::Prompts;
use crate::error::Result;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// Single-call article writer.
pub struct SinglePassWriter {
    client: Arc<dyn CompletionClient>,
    prompts: Prompts,
    model: String,
    max_output_tokens: u32,
}

impl SinglePassWriter {
    pub fn new(
        client: Arc<dyn CompletionClient>,
        prompts: Prompts,
        model: String,
        max_output_tokens: u32,
    ) -> Self {
        Self {
            client,
            prompts,
            model,
            max_output_tokens,
        }
    }

    /// Generate the article from the full transcript in one call.
    pub async fn write(&self, transcript_text: &str) -> Result<String> {
        info!("Single-pass generation with {}", self.model);
        let mut vars = HashMap::new();
        vars.insert("transcript".to_string(), transcript_text.to_string());
        let prompt = self
            .prompts
            .render_with_custom(&self.prompts.single_pass.user, &vars);

        self.client
            .complete(&prompt, &self.model, self.max_output_tokens)
            .await
            .map_err(|e| e.in_stage("single-pass"))
    }

    /// Generate the article from condensed notes (chunked last resort).
    pub async fn write_from_notes(&self, notes: &str) -> Result<String> {
        info!("Single-pass generation from notes with {}", self.model);
        let mut vars = HashMap::new();
        vars.insert("notes".to_string(), notes.to_string());
        let prompt = self
            .prompts
            .render_with_custom(&self.prompts.single_pass.from_notes, &vars);

        self.client
            .complete(&prompt, &self.model, self.max_output_tokens)
            .await
            .map_err(|e| e.in_stage("single-pass"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::testing::FakeCompletion;

    #[tokio::test]
    async fn test_write_sends_one_call() {
        let fake = Arc::new(FakeCompletion::always("the article"));
        let writer = SinglePassWriter::new(
            fake.clone(),
            Prompts::default(),
            "test-model".to_string(),
            2000,
        );

        let article = writer.write("the transcript text").await.unwrap();

        assert_eq!(article, "the article");
        assert_eq!(fake.call_count(), 1);
        let call = &fake.calls()[0];
        assert!(call.prompt.contains("the transcript text"));
        assert_eq!(call.max_output_tokens, 2000);
    }

    #[tokio::test]
    async fn test_write_from_notes_uses_notes_template() {
        let fake = Arc::new(FakeCompletion::always("the article"));
        let writer = SinglePassWriter::new(
            fake.clone(),
            Prompts::default(),
            "test-model".to_string(),
            2000,
        );

        writer.write_from_notes("condensed notes here").await.unwrap();

        let call = &fake.calls()[0];
        assert!(call.prompt.contains("condensed notes here"));
        assert!(call.prompt.contains("condensed, part by part"));
    }
}
