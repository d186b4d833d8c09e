//! Size-based chunk splitting for flat transcripts without timing.
//!
//! Cuts fall on paragraph or sentence boundaries near the target size so the
//! condenser never sees a mid-sentence edge. Bodies tile the text exactly;
//! the overlap margin is the tail of the preceding body, carried as context.

use super::Chunk;
use crate::budget;

/// How far back from the target cut to search for a natural boundary.
const LOOKBACK_CHARS: usize = 10_000;

pub(super) fn split(text: &str, window_tokens: usize, overlap_chars: usize) -> Vec<Chunk> {
    let target = window_tokens
        .saturating_mul(budget::CHARS_PER_TOKEN)
        .max(1);

    if text.len() <= target {
        return vec![Chunk {
            index: 0,
            body: text.to_string(),
            context: String::new(),
            start_seconds: 0.0,
            end_seconds: 0.0,
        }];
    }

    let mut chunks: Vec<Chunk> = Vec::new();
    let mut start = 0;

    while start < text.len() {
        let mut end = floor_boundary(text, (start + target).min(text.len()));
        if end < text.len() {
            let search_from =
                floor_boundary(text, (start + target).saturating_sub(LOOKBACK_CHARS).max(start));
            if let Some(cut) = natural_break(&text[search_from..end]) {
                end = search_from + cut;
            }
        }
        if end <= start {
            end = ceil_boundary(text, start + 1);
        }

        let context = match chunks.last() {
            Some(prev) => {
                let cut = ceil_boundary(&prev.body, prev.body.len().saturating_sub(overlap_chars));
                prev.body[cut..].to_string()
            }
            None => String::new(),
        };

        chunks.push(Chunk {
            index: chunks.len(),
            body: text[start..end].to_string(),
            context,
            start_seconds: 0.0,
            end_seconds: 0.0,
        });
        start = end;
    }

    chunks
}

/// Last paragraph break, else last sentence break, within the window.
/// Returns the cut position just past the delimiter.
fn natural_break(window: &str) -> Option<usize> {
    window
        .rfind("\n\n")
        .map(|i| i + 2)
        .or_else(|| window.rfind(". ").map(|i| i + 2))
        .filter(|&i| i > 0 && i < window.len())
}

fn floor_boundary(text: &str, mut i: usize) -> usize {
    while i > 0 && !text.is_char_boundary(i) {
        i -= 1;
    }
    i
}

fn ceil_boundary(text: &str, mut i: usize) -> usize {
    while i < text.len() && !text.is_char_boundary(i) {
        i += 1;
    }
    i
}
