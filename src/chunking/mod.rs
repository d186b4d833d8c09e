//! Transcript chunking for the condensation fallback path.
//!
//! When a transcript exceeds the model's input budget it is split into
//! ordered windows that tile the transcript with no gaps. Each window also
//! carries a slice of its predecessor as boundary context for the condenser;
//! that context never re-enters the condensed output, so every segment's
//! meaning survives into the notes exactly once.

mod sized;
mod temporal;

use crate::transcript::{identify_main_speaker, Transcript};
use serde::{Deserialize, Serialize};
use tracing::info;

/// A contiguous window of a transcript plus boundary context.
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Position of this chunk in transcript order.
    pub index: usize,
    /// The window's own content. Chunk bodies tile the transcript exactly.
    pub body: String,
    /// Tail of the preceding window, for cross-boundary context only.
    /// Empty for the first chunk.
    pub context: String,
    /// Start time in seconds (0 for flat input).
    pub start_seconds: f64,
    /// End time in seconds (0 for flat input).
    pub end_seconds: f64,
}

/// Configuration for chunk splitting.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Window length in minutes for time-based splitting.
    pub window_minutes: f64,
    /// Overlap margin in minutes shared with the preceding window.
    pub overlap_minutes: f64,
    /// Window size in estimated tokens for size-based splitting.
    pub window_tokens: usize,
    /// Overlap margin in characters for size-based splitting.
    pub overlap_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            window_minutes: 40.0,
            overlap_minutes: 2.0,
            window_tokens: 50_000,
            overlap_chars: 5_000,
        }
    }
}

/// Splits oversized transcripts into ordered, context-carrying windows.
pub struct ChunkSplitter {
    config: ChunkingConfig,
}

impl ChunkSplitter {
    pub fn new(config: ChunkingConfig) -> Self {
        Self { config }
    }

    /// Split a transcript into ordered chunks.
    ///
    /// Splits along time when segment timing is available, else along
    /// estimated token count.
    pub fn split(&self, transcript: &Transcript) -> Vec<Chunk> {
        let chunks = if transcript.is_diarized() {
            let main_speaker = identify_main_speaker(transcript.segments());
            temporal::split(
                transcript.segments(),
                main_speaker.as_deref(),
                self.config.window_minutes * 60.0,
                self.config.overlap_minutes * 60.0,
            )
        } else {
            sized::split(
                transcript.text(),
                self.config.window_tokens,
                self.config.overlap_chars,
            )
        };

        info!("Split transcript into {} chunks", chunks.len());
        chunks
    }
}
