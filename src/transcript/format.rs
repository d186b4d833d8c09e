//! Formatting of diarized segments into structured text for prompts.
//!
//! The lecturer's speech flows as plain paragraphs; audience remarks are
//! marked so downstream prompts can treat them differently.

use super::Segment;
use std::collections::HashMap;
use tracing::debug;

/// Seconds of silence that trigger a paragraph break.
pub(crate) const DEFAULT_PARAGRAPH_GAP: f64 = 3.0;

/// Prefix for audience (non-lecturer) utterances.
const AUDIENCE_MARK: &str = "[QUESTION/COMMENT]";

/// Identify the main speaker (lecturer) by total speaking time.
///
/// Uses total duration rather than segment count because the lecturer
/// typically has longer utterances than audience members.
pub fn identify_main_speaker(segments: &[Segment]) -> Option<String> {
    let mut durations: HashMap<&str, f64> = HashMap::new();
    for seg in segments {
        if let Some(speaker) = seg.speaker.as_deref() {
            *durations.entry(speaker).or_insert(0.0) += seg.duration();
        }
    }

    let (main, main_dur) = durations
        .iter()
        .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))?;

    let total: f64 = durations.values().sum();
    debug!(
        "Main speaker: {} ({:.0}/{:.0}s, {:.0}%)",
        main,
        main_dur,
        total,
        main_dur / total.max(1.0) * 100.0
    );
    Some(main.to_string())
}

/// Convert diarized segments into well-structured text.
///
/// - Groups consecutive same-speaker-type segments into paragraphs
/// - Inserts paragraph breaks at silence gaps longer than `paragraph_gap`
/// - Marks non-lecturer segments with [QUESTION/COMMENT]
pub fn format_diarized(
    segments: &[Segment],
    main_speaker: Option<&str>,
    paragraph_gap: f64,
) -> String {
    if segments.is_empty() {
        return String::new();
    }

    let detected;
    let main_speaker = match main_speaker {
        Some(s) => Some(s),
        None => {
            detected = identify_main_speaker(segments);
            detected.as_deref()
        }
    };

    let mut paragraphs: Vec<String> = Vec::new();
    let mut current_parts: Vec<&str> = Vec::new();
    let mut current_is_main: Option<bool> = None;
    let mut prev_end: f64 = 0.0;

    let flush = |parts: &mut Vec<&str>, is_main: Option<bool>, out: &mut Vec<String>| {
        if parts.is_empty() {
            return;
        }
        let text = parts.join(" ");
        if !text.trim().is_empty() {
            if is_main == Some(false) {
                out.push(format!("{}: {}", AUDIENCE_MARK, text));
            } else {
                out.push(text);
            }
        }
        parts.clear();
    };

    for seg in segments {
        let text = seg.text.trim();
        if text.is_empty() {
            continue;
        }

        let is_main = seg.speaker.as_deref() == main_speaker;
        let gap = seg.start - prev_end;
        let speaker_type_changed =
            current_is_main.is_some_and(|current| current != is_main);

        if speaker_type_changed || (gap > paragraph_gap && !current_parts.is_empty()) {
            flush(&mut current_parts, current_is_main, &mut paragraphs);
        }

        current_parts.push(text);
        current_is_main = Some(is_main);
        prev_end = seg.end;
    }

    flush(&mut current_parts, current_is_main, &mut paragraphs);

    paragraphs.join("\n\n")
}

/// Add paragraph breaks to flat text that has no newlines.
///
/// Groups sentences into paragraphs for readability.
pub fn add_paragraph_breaks(text: &str, sentences_per_paragraph: usize) -> String {
    let sentences = split_sentences(text);

    sentences
        .chunks(sentences_per_paragraph.max(1))
        .map(|group| group.join(" "))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Split text at sentence endings followed by whitespace and an uppercase
/// letter. Keeps the terminal punctuation with the preceding sentence.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if !matches!(c, '.' | '!' | '?') {
            continue;
        }
        // Scan past whitespace to see whether an uppercase letter follows.
        let mut j = i + c.len_utf8();
        let rest = &text[j..];
        let ws_len: usize = rest
            .chars()
            .take_while(|ch| ch.is_whitespace())
            .map(|ch| ch.len_utf8())
            .sum();
        if ws_len == 0 {
            continue;
        }
        j += ws_len;
        if text[j..].chars().next().is_some_and(|ch| ch.is_uppercase()) {
            sentences.push(text[start..i + c.len_utf8()].trim());
            start = j;
            while chars.peek().is_some_and(|&(k, _)| k < j) {
                chars.next();
            }
        }
    }

    if start < text.len() {
        let tail = text[start..].trim();
        if !tail.is_empty() {
            sentences.push(tail);
        }
    }
    sentences
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(start: f64, end: f64, speaker: &str, text: &str) -> Segment {
        Segment::new(start, end, Some(speaker), text)
    }

    #[test]
    fn test_main_speaker_by_duration() {
        let segments = vec![
            seg(0.0, 60.0, "LECTURER", "A long explanation of the topic"),
            seg(60.0, 62.0, "GUEST", "Quick question"),
            seg(62.0, 120.0, "LECTURER", "And the answer in detail"),
        ];
        assert_eq!(identify_main_speaker(&segments).as_deref(), Some("LECTURER"));
    }

    #[test]
    fn test_main_speaker_none_without_labels() {
        let segments = vec![Segment::new(0.0, 5.0, None, "unlabeled")];
        assert_eq!(identify_main_speaker(&segments), None);
    }

    #[test]
    fn test_audience_segments_marked() {
        let segments = vec![
            seg(0.0, 60.0, "A", "The lecture content goes here"),
            seg(60.0, 61.0, "B", "What about edge cases?"),
            seg(61.0, 120.0, "A", "Good question, let me explain"),
        ];

        let text = format_diarized(&segments, None, DEFAULT_PARAGRAPH_GAP);
        let paragraphs: Vec<&str> = text.split("\n\n").collect();

        assert_eq!(paragraphs.len(), 3);
        assert_eq!(paragraphs[0], "The lecture content goes here");
        assert_eq!(paragraphs[1], "[QUESTION/COMMENT]: What about edge cases?");
        assert_eq!(paragraphs[2], "Good question, let me explain");
    }

    #[test]
    fn test_consecutive_same_speaker_grouped() {
        let segments = vec![
            seg(0.0, 5.0, "A", "First part."),
            seg(5.0, 10.0, "A", "Second part."),
        ];

        let text = format_diarized(&segments, None, DEFAULT_PARAGRAPH_GAP);
        assert_eq!(text, "First part. Second part.");
    }

    #[test]
    fn test_silence_gap_breaks_paragraph() {
        let segments = vec![
            seg(0.0, 5.0, "A", "Before the pause."),
            seg(15.0, 20.0, "A", "After the pause."),
        ];

        let text = format_diarized(&segments, None, DEFAULT_PARAGRAPH_GAP);
        assert_eq!(text, "Before the pause.\n\nAfter the pause.");
    }

    #[test]
    fn test_paragraph_breaks_for_flat_text() {
        let text = "One. Two. Three. Four. Five. Six. Seven.";
        let broken = add_paragraph_breaks(text, 5);
        let paragraphs: Vec<&str> = broken.split("\n\n").collect();
        assert_eq!(paragraphs.len(), 2);
        assert!(paragraphs[0].ends_with("Five."));
        assert_eq!(paragraphs[1], "Six. Seven.");
    }

    #[test]
    fn test_split_sentences_ignores_lowercase_continuation() {
        let sentences = split_sentences("Version 2.5 is out. It works.");
        assert_eq!(sentences, vec!["Version 2.5 is out.", "It works."]);
    }
}
