//! Prompt templates for Fortell.
//!
//! Prompts can be customized by placing TOML files in the custom prompts
//! directory. The section prefix template is rendered once per run and reused
//! byte-for-byte across all section and appendix calls, so prompt caching
//! applies; only the task suffixes vary per call.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Collection of all prompt templates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Prompts {
    pub outline: OutlinePrompts,
    pub section: SectionPrompts,
    pub condense: CondensePrompts,
    pub single_pass: SinglePassPrompts,
    pub appendix: AppendixPrompts,
    /// Custom variables from config, available in all prompts.
    #[serde(skip)]
    pub variables: std::collections::HashMap<String, String>,
}


/// Prompts for outline generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutlinePrompts {
    pub user: String,
    /// Appended after a failed validation, with the problem in {{error}}.
    pub corrective: String,
}

impl Default for OutlinePrompts {
    fn default() -> Self {
        Self {
            user: r#"You are an editor planning a long-form educational article based on a lecture transcript.
The main speaker is the lecturer. Passages marked [QUESTION/COMMENT] are audience remarks.

TRANSCRIPT:
---
{{transcript}}
---

Produce a plan for the article as a single JSON object:
{
  "title": "Article title",
  "sections": [
    {"id": "S1", "title": "Section title", "brief": "What this section covers", "key_terms": ["term"]}
  ],
  "terms": [
    {"term": "domain term", "gloss": "short explanation"}
  ]
}

Rules:
1. Between {{min_sections}} and {{max_sections}} sections, in the order the material should be presented
2. Every section needs a non-empty "title" and a non-empty "brief"
3. "terms" collects the domain terminology that must be used consistently across the article
4. Respond with the JSON object only"#
                .to_string(),

            corrective: r#"The previous response could not be used: {{error}}

Return ONLY a valid JSON object in the exact shape requested above, with between {{min_sections}} and {{max_sections}} sections, each carrying a non-empty "title" and "brief". No prose around the JSON."#
                .to_string(),
        }
    }
}

/// Prompts for per-section generation with a cached prefix.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SectionPrompts {
    /// Shared prefix. Must render identically for every call of a run.
    pub prefix: String,
    /// Per-section task suffix.
    pub task: String,
}

impl Default for SectionPrompts {
    fn default() -> Self {
        Self {
            prefix: r#"The main speaker is the lecturer. Passages marked [QUESTION/COMMENT] are audience remarks.

TRANSCRIPT:
---
{{transcript}}
---

ARTICLE OUTLINE:
{{outline}}

TERMINOLOGY:
{{terms}}

---

"#
            .to_string(),

            task: r#"Write section {{section_number}} of {{total_sections}} of the article.

SECTION: {{section_title}}
COVERS: {{section_brief}}

{{prev_section}}

{{next_section}}

Requirements:
1. Write flowing prose grounded only in the transcript above
2. Cover this section's material; leave neighboring material to its own sections
3. Use the terminology dictionary consistently
4. Do not include the section heading; return the body text only"#
                .to_string(),
        }
    }
}

/// Prompts for chunk condensation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CondensePrompts {
    pub user: String,
}

impl Default for CondensePrompts {
    fn default() -> Self {
        Self {
            user: r#"You are condensing part {{chunk_index}} of {{total_chunks}} of a long lecture transcript into compact notes for later article writing.

CONTEXT FROM THE PREVIOUS PART (for continuity only, do not summarize):
---
{{context}}
---

TRANSCRIPT PART:
---
{{text}}
---

Write dense notes that preserve:
1. The ideas and arguments, in the order presented
2. Concrete examples, numbers, and names
3. Domain terminology as the speaker uses it

Return the notes only. Do not cover the context block again."#
                .to_string(),
        }
    }
}

/// Prompts for single-pass generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SinglePassPrompts {
    /// Article from the full transcript in one call.
    pub user: String,
    /// Article from condensed notes (chunked last resort).
    pub from_notes: String,
}

impl Default for SinglePassPrompts {
    fn default() -> Self {
        Self {
            user: r#"Transform the following lecture transcript into a well-structured educational article.
The main speaker is the lecturer. Passages marked [QUESTION/COMMENT] are audience remarks.

TRANSCRIPT:
---
{{transcript}}
---

Write a complete article in Markdown: a # title, ## section headings, flowing prose, and a short conclusion. Stay grounded in the transcript and do not invent facts."#
                .to_string(),

            from_notes: r#"The notes below were condensed, part by part, from a much longer lecture transcript. Transform them into a well-structured educational article.

NOTES:
---
{{notes}}
---

Write a complete article in Markdown: a # title, ## section headings, flowing prose, and a short conclusion. Stay grounded in the notes and do not invent facts."#
                .to_string(),
        }
    }
}

/// Prompt suffix for the appendix call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppendixPrompts {
    pub task: String,
}

impl Default for AppendixPrompts {
    fn default() -> Self {
        Self {
            task: r###"Write an appendix for the article planned above.

KEY TERMS:
{{terms}}

Include:
1. "## Glossary" — each key term with a one-sentence explanation as used in the article
2. "## Further Reading" — a short list of topics the reader could explore next

Return the appendix only, starting with the first heading."###
                .to_string(),
        }
    }
}

impl Prompts {
    /// Load prompts from the default location, with optional custom directory and variables.
    pub fn load(
        custom_dir: Option<&str>,
        custom_variables: Option<&std::collections::HashMap<String, String>>,
    ) -> crate::error::Result<Self> {
        let mut prompts = Prompts::default();

        if let Some(vars) = custom_variables {
            prompts.variables = vars.clone();
        }

        if let Some(dir) = custom_dir {
            let custom_path = PathBuf::from(shellexpand::tilde(dir).to_string());

            macro_rules! load_if_present {
                ($field:ident, $file:expr) => {
                    let path = custom_path.join($file);
                    if path.exists() {
                        let content = std::fs::read_to_string(&path)?;
                        prompts.$field = toml::from_str(&content)?;
                    }
                };
            }

            load_if_present!(outline, "outline.toml");
            load_if_present!(section, "section.toml");
            load_if_present!(condense, "condense.toml");
            load_if_present!(single_pass, "single_pass.toml");
            load_if_present!(appendix, "appendix.toml");
        }

        Ok(prompts)
    }

    /// Render a prompt template with the given variables.
    pub fn render(template: &str, vars: &std::collections::HashMap<String, String>) -> String {
        let mut result = template.to_string();
        for (key, value) in vars {
            result = result.replace(&format!("{{{{{}}}}}", key), value);
        }
        result
    }

    /// Render a prompt template with both provided variables and custom config variables.
    /// Provided variables take precedence over custom config variables.
    pub fn render_with_custom(
        &self,
        template: &str,
        vars: &std::collections::HashMap<String, String>,
    ) -> String {
        let mut merged = self.variables.clone();
        for (key, value) in vars {
            merged.insert(key.clone(), value.clone());
        }
        Self::render(template, &merged)
    }
}
