//! Time-based chunk splitting for diarized transcripts.
//!
//! Windows are laid out from the first segment's start time. Each segment
//! belongs to exactly one window (by its start time), so window bodies tile
//! the transcript; the overlap margin is attached as context only.

use super::Chunk;
use crate::transcript::{format_diarized, Segment};

const PARAGRAPH_GAP: f64 = 3.0;

pub(super) fn split(
    segments: &[Segment],
    main_speaker: Option<&str>,
    window_secs: f64,
    overlap_secs: f64,
) -> Vec<Chunk> {
    if segments.is_empty() {
        return Vec::new();
    }

    let first_start = segments[0].start;
    let last_end = segments.last().map(|s| s.end).unwrap_or(first_start);

    if last_end - first_start <= window_secs {
        return vec![Chunk {
            index: 0,
            body: format_diarized(segments, main_speaker, PARAGRAPH_GAP),
            context: String::new(),
            start_seconds: first_start,
            end_seconds: last_end,
        }];
    }

    let window_of = |seg: &Segment| ((seg.start - first_start) / window_secs).floor() as u64;

    // Segments are ordered by start time, so each window is a contiguous
    // index range.
    let mut ranges: Vec<(u64, std::ops::Range<usize>)> = Vec::new();
    let mut current_window = window_of(&segments[0]);
    let mut range_start = 0;
    for (i, seg) in segments.iter().enumerate().skip(1) {
        let w = window_of(seg);
        if w != current_window {
            ranges.push((current_window, range_start..i));
            current_window = w;
            range_start = i;
        }
    }
    ranges.push((current_window, range_start..segments.len()));

    let mut chunks = Vec::with_capacity(ranges.len());
    for (window, range) in ranges {
        let window_start = first_start + window as f64 * window_secs;

        // Overlap margin: trailing segments of the preceding window.
        let mut ctx_start = range.start;
        while ctx_start > 0 && segments[ctx_start - 1].start >= window_start - overlap_secs {
            ctx_start -= 1;
        }
        let context = if ctx_start < range.start {
            format_diarized(&segments[ctx_start..range.start], main_speaker, PARAGRAPH_GAP)
        } else {
            String::new()
        };

        let window_segments = &segments[range.clone()];
        chunks.push(Chunk {
            index: chunks.len(),
            body: format_diarized(window_segments, main_speaker, PARAGRAPH_GAP),
            context,
            start_seconds: window_segments[0].start,
            end_seconds: window_segments[window_segments.len() - 1].end,
        });
    }

    chunks
}
