//! Outline generation and validation.
//!
//! The outline is the only structured payload the pipeline asks a model
//! for, so its shape and bounds are validated right where the response is
//! parsed. A malformed response gets exactly one corrective re-prompt
//! carrying the validation problem; a second failure is fatal for the run.

use crate::completion::CompletionClient;
use crate::config::Prompts;
use crate::error::{FortellError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// A planned article section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutlineSection {
    #[serde(default)]
    pub id: String,
    pub title: String,
    /// What the section covers, one or two sentences.
    pub brief: String,
    #[serde(default)]
    pub key_terms: Vec<String>,
}

/// A domain term used consistently across the article.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Term {
    pub term: String,
    #[serde(default)]
    pub gloss: Option<String>,
}

/// The article plan: ordered sections plus a terminology set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Outline {
    #[serde(default = "default_title")]
    pub title: String,
    pub sections: Vec<OutlineSection>,
    #[serde(default)]
    pub terms: Vec<Term>,
}

fn default_title() -> String {
    "Untitled".to_string()
}

impl Outline {
    /// Check section bounds and required fields.
    ///
    /// Returns a human-readable description of the first problem found,
    /// suitable for feeding back into a corrective re-prompt.
    pub fn validate(&self, min_sections: usize, max_sections: usize) -> std::result::Result<(), String> {
        let count = self.sections.len();
        if count < min_sections {
            return Err(format!(
                "outline has {} sections, minimum is {}",
                count, min_sections
            ));
        }
        if count > max_sections {
            return Err(format!(
                "outline has {} sections, maximum is {}",
                count, max_sections
            ));
        }
        for (i, section) in self.sections.iter().enumerate() {
            if section.title.trim().is_empty() {
                return Err(format!("section {} has an empty title", i + 1));
            }
            if section.brief.trim().is_empty() {
                return Err(format!("section {} has an empty brief", i + 1));
            }
        }
        Ok(())
    }

    /// Format the section list as readable text for prompt inclusion.
    pub fn format_for_prompt(&self) -> String {
        self.sections
            .iter()
            .enumerate()
            .map(|(i, s)| {
                let id = if s.id.trim().is_empty() {
                    format!("S{}", i + 1)
                } else {
                    s.id.clone()
                };
                format!("- {}. {}: {}", id, s.title, s.brief)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Format the terminology set for prompt inclusion.
    pub fn format_terms(&self) -> String {
        if self.terms.is_empty() {
            return "(none identified)".to_string();
        }
        self.terms
            .iter()
            .map(|t| match t.gloss.as_deref() {
                Some(gloss) if !gloss.trim().is_empty() => format!("- {} — {}", t.term, gloss),
                _ => format!("- {}", t.term),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Extract and parse an outline from a completion response.
///
/// Handles JSON wrapped in markdown code fences or surrounded by prose.
pub fn parse_outline(response: &str) -> std::result::Result<Outline, String> {
    let json = extract_json_object(response)
        .ok_or_else(|| "no JSON object found in the response".to_string())?;
    serde_json::from_str(json).map_err(|e| format!("outline JSON malformed: {}", e))
}

/// Find the JSON object span: prefer a fenced ```json block, else the
/// outermost brace pair.
fn extract_json_object(response: &str) -> Option<&str> {
    static FENCE: std::sync::OnceLock<regex::Regex> = std::sync::OnceLock::new();
    let fence = FENCE.get_or_init(|| {
        regex::Regex::new(r"(?s)```(?:json)?\s*(\{.*?\})\s*```").expect("fence pattern is valid")
    });
    if let Some(m) = fence.captures(response).and_then(|c| c.get(1)) {
        return Some(m.as_str());
    }

    let start = response.find('{')?;
    let end = response.rfind('}')?;
    (end > start).then(|| &response[start..=end])
}

/// Builds and validates the article outline.
pub struct OutlineBuilder {
    client: Arc<dyn CompletionClient>,
    prompts: Prompts,
    model: String,
    max_output_tokens: u32,
    min_sections: usize,
    max_sections: usize,
}

impl OutlineBuilder {
    pub fn new(
        client: Arc<dyn CompletionClient>,
        prompts: Prompts,
        model: String,
        max_output_tokens: u32,
        min_sections: usize,
        max_sections: usize,
    ) -> Self {
        Self {
            client,
            prompts,
            model,
            max_output_tokens,
            min_sections,
            max_sections,
        }
    }

    /// Generate an outline from transcript text or condensed notes.
    ///
    /// Issues one completion call; on a shape/bounds failure, exactly one
    /// corrective re-prompt with the problem appended. A second failure is
    /// a fatal [`FortellError::StructuredOutput`].
    pub async fn build(&self, source_text: &str) -> Result<Outline> {
        let mut vars = HashMap::new();
        vars.insert("transcript".to_string(), source_text.to_string());
        vars.insert("min_sections".to_string(), self.min_sections.to_string());
        vars.insert("max_sections".to_string(), self.max_sections.to_string());

        let prompt = self
            .prompts
            .render_with_custom(&self.prompts.outline.user, &vars);

        let response = self
            .client
            .complete(&prompt, &self.model, self.max_output_tokens)
            .await
            .map_err(|e| e.in_stage("outline"))?;

        let problem = match self.parse_and_check(&response) {
            Ok(outline) => {
                info!(
                    "Outline: \"{}\" — {} sections, {} terms",
                    outline.title,
                    outline.sections.len(),
                    outline.terms.len()
                );
                return Ok(outline);
            }
            Err(problem) => problem,
        };

        warn!("Outline rejected ({}), issuing corrective re-prompt", problem);
        vars.insert("error".to_string(), problem);
        let corrective_note = self
            .prompts
            .render_with_custom(&self.prompts.outline.corrective, &vars);
        let corrective_prompt = format!("{}\n\n{}", prompt, corrective_note);

        let response = self
            .client
            .complete(&corrective_prompt, &self.model, self.max_output_tokens)
            .await
            .map_err(|e| e.in_stage("outline"))?;

        self.parse_and_check(&response)
            .map_err(FortellError::StructuredOutput)
    }

    fn parse_and_check(&self, response: &str) -> std::result::Result<Outline, String> {
        let outline = parse_outline(response)?;
        outline.validate(self.min_sections, self.max_sections)?;
        Ok(outline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::testing::{FakeCompletion, FakeReply};

    fn sample_outline_json(sections: usize) -> String {
        let sections: Vec<String> = (0..sections)
            .map(|i| {
                format!(
                    r#"{{"id": "S{n}", "title": "Section {n}", "brief": "Covers part {n}", "key_terms": []}}"#,
                    n = i + 1
                )
            })
            .collect();
        format!(
            r#"{{"title": "The Article", "sections": [{}], "terms": [{{"term": "cache", "gloss": "fast storage"}}]}}"#,
            sections.join(", ")
        )
    }

    fn builder(client: Arc<dyn CompletionClient>) -> OutlineBuilder {
        OutlineBuilder::new(client, Prompts::default(), "test-model".to_string(), 1000, 2, 5)
    }

    #[test]
    fn test_parse_plain_json() {
        let outline = parse_outline(&sample_outline_json(3)).unwrap();
        assert_eq!(outline.title, "The Article");
        assert_eq!(outline.sections.len(), 3);
        assert_eq!(outline.terms[0].term, "cache");
    }

    #[test]
    fn test_parse_fenced_json() {
        let response = format!(
            "Here is the plan:\n\n```json\n{}\n```\n\nLet me know.",
            sample_outline_json(2)
        );
        let outline = parse_outline(&response).unwrap();
        assert_eq!(outline.sections.len(), 2);
    }

    #[test]
    fn test_parse_rejects_prose() {
        assert!(parse_outline("I could not produce an outline.").is_err());
    }

    #[test]
    fn test_validate_bounds() {
        let empty = Outline {
            title: "T".into(),
            sections: vec![],
            terms: vec![],
        };
        assert!(empty.validate(1, 15).is_err());

        let within = parse_outline(&sample_outline_json(5)).unwrap();
        assert!(within.validate(4, 15).is_ok());

        let too_many = parse_outline(&sample_outline_json(16)).unwrap();
        assert!(too_many.validate(4, 15).is_err());
    }

    #[test]
    fn test_validate_rejects_empty_fields() {
        let mut outline = parse_outline(&sample_outline_json(4)).unwrap();
        outline.sections[2].brief = "  ".to_string();
        let problem = outline.validate(1, 15).unwrap_err();
        assert!(problem.contains("section 3"));
    }

    #[test]
    fn test_format_for_prompt_stable() {
        let outline = parse_outline(&sample_outline_json(2)).unwrap();
        assert_eq!(
            outline.format_for_prompt(),
            "- S1. Section 1: Covers part 1\n- S2. Section 2: Covers part 2"
        );
        assert_eq!(outline.format_terms(), "- cache — fast storage");
    }

    #[tokio::test]
    async fn test_valid_outline_single_call() {
        let fake = Arc::new(FakeCompletion::new(|_, _| {
            FakeReply::text(sample_outline_json(3))
        }));
        let outline = builder(fake.clone()).build("transcript text").await.unwrap();

        assert_eq!(outline.sections.len(), 3);
        assert_eq!(fake.call_count(), 1);
    }

    #[tokio::test]
    async fn test_corrective_reprompt_recovers() {
        let fake = Arc::new(FakeCompletion::new(|seq, _| {
            if seq == 0 {
                FakeReply::text("Sorry, here is a sketch instead of JSON.")
            } else {
                FakeReply::text(sample_outline_json(3))
            }
        }));
        let outline = builder(fake.clone()).build("transcript text").await.unwrap();

        assert_eq!(outline.sections.len(), 3);
        assert_eq!(fake.call_count(), 2);
        // The corrective prompt names the problem.
        let calls = fake.calls();
        assert!(calls[1].prompt.contains("could not be used"));
    }

    #[tokio::test]
    async fn test_second_failure_is_fatal() {
        let fake = Arc::new(FakeCompletion::new(|_, _| {
            FakeReply::text("still not json")
        }));
        let err = builder(fake.clone()).build("transcript text").await.unwrap_err();

        // Exactly one corrective retry: two calls total, then fatal.
        assert_eq!(fake.call_count(), 2);
        assert!(matches!(err, FortellError::StructuredOutput(_)));
    }

    #[tokio::test]
    async fn test_out_of_bounds_triggers_corrective() {
        let fake = Arc::new(FakeCompletion::new(|seq, _| {
            if seq == 0 {
                // Too many sections for the configured maximum of 5.
                FakeReply::text(sample_outline_json(9))
            } else {
                FakeReply::text(sample_outline_json(4))
            }
        }));
        let outline = builder(fake.clone()).build("transcript text").await.unwrap();

        assert_eq!(outline.sections.len(), 4);
        let calls = fake.calls();
        assert!(calls[1].prompt.contains("9 sections"));
    }
}
