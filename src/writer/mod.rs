//! Article writing: cached prefix construction and final assembly.

mod section;
mod single_pass;

pub use section::{SectionDraft, SectionWriter};
pub use single_pass::SinglePassWriter;

use crate::config::Prompts;
use crate::outline::Outline;
use std::collections::HashMap;
use std::sync::Arc;

/// Separator between assembled article blocks.
pub const SECTION_SEPARATOR: &str = "\n\n";

/// The invariant leading portion of every section and appendix prompt.
///
/// Built once per run and shared; byte-for-byte identical across calls so
/// the provider's prefix cache applies. Nothing call-specific (ids,
/// timestamps) may enter it.
#[derive(Debug, Clone)]
pub struct CachedPrefix(Arc<str>);

impl CachedPrefix {
    /// Render the prefix from the source text (transcript or condensed
    /// notes) and the validated outline.
    pub fn build(prompts: &Prompts, source_text: &str, outline: &Outline) -> Self {
        let mut vars = HashMap::new();
        vars.insert("transcript".to_string(), source_text.to_string());
        vars.insert("outline".to_string(), outline.format_for_prompt());
        vars.insert("terms".to_string(), outline.format_terms());

        let rendered = prompts.render_with_custom(&prompts.section.prefix, &vars);
        Self(Arc::from(rendered))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Join block texts with the fixed separator.
pub fn join_sections<S: AsRef<str>>(blocks: &[S]) -> String {
    blocks
        .iter()
        .map(|b| b.as_ref())
        .collect::<Vec<_>>()
        .join(SECTION_SEPARATOR)
}

/// Split an assembled string back into its blocks.
pub fn split_sections(assembled: &str) -> Vec<&str> {
    assembled.split(SECTION_SEPARATOR).collect()
}

/// Assemble the final article from the title, ordered section drafts, and
/// an optional appendix.
pub fn assemble_article(title: &str, sections: &[SectionDraft], appendix: Option<&str>) -> String {
    let mut blocks = Vec::with_capacity(sections.len() + 2);
    blocks.push(format!("# {}", title));
    for draft in sections {
        blocks.push(format!("## {}", draft.title));
        blocks.push(draft.text.trim().to_string());
    }
    if let Some(appendix) = appendix {
        blocks.push("---".to_string());
        blocks.push(appendix.trim().to_string());
    }
    join_sections(&blocks)
}
