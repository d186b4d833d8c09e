//! Transcript loading and canonical representation.
//!
//! Two input shapes are accepted and auto-detected structurally:
//!
//! - **Diarized**: a JSON array of `{start, end, speaker, text}` segments.
//! - **Flat/ASR**: a JSON object with a single `text` field.
//!
//! Anything else is a fatal format-detection error.

mod format;

pub use format::{add_paragraph_breaks, format_diarized, identify_main_speaker};

use crate::error::{FortellError, Result};
use serde::{Deserialize, Serialize};

/// A single diarized segment with timestamp and speaker metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    /// Start time in seconds.
    pub start: f64,
    /// End time in seconds.
    pub end: f64,
    /// Speaker label. Absent for flat input.
    #[serde(default)]
    pub speaker: Option<String>,
    /// Transcribed text content.
    pub text: String,
}

impl Segment {
    /// Create a new segment.
    pub fn new(start: f64, end: f64, speaker: Option<&str>, text: &str) -> Self {
        Self {
            start,
            end,
            speaker: speaker.map(str::to_string),
            text: text.to_string(),
        }
    }

    /// Duration of this segment in seconds.
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// A canonical, ordered transcript. Immutable once loaded.
#[derive(Debug, Clone)]
pub struct Transcript {
    segments: Vec<Segment>,
    text: String,
    duration_seconds: f64,
}

impl Transcript {
    /// Parse a transcript from raw JSON, auto-detecting the input shape.
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(raw)
            .map_err(|e| FortellError::FormatDetection(format!("not valid JSON: {}", e)))?;

        if is_diarized_shape(&value) {
            let segments: Vec<Segment> = serde_json::from_value(value).map_err(|e| {
                FortellError::FormatDetection(format!("segment array malformed: {}", e))
            })?;
            return Self::from_segments(segments);
        }

        if let Some(text) = value.as_object().and_then(|o| o.get("text")).and_then(|t| t.as_str()) {
            return Self::from_flat(text);
        }

        Err(FortellError::FormatDetection(
            "expected a segment array or an object with a \"text\" field".to_string(),
        ))
    }

    /// Build a transcript from diarized segments.
    pub fn from_segments(segments: Vec<Segment>) -> Result<Self> {
        let text = format_diarized(&segments, None, format::DEFAULT_PARAGRAPH_GAP);
        if text.trim().is_empty() {
            return Err(FortellError::InvalidInput(
                "no text to process in transcript".to_string(),
            ));
        }
        let duration_seconds = segments.last().map(|s| s.end).unwrap_or(0.0);
        Ok(Self {
            segments,
            text,
            duration_seconds,
        })
    }

    /// Build a transcript from flat ASR text.
    pub fn from_flat(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Err(FortellError::InvalidInput(
                "no text to process in transcript".to_string(),
            ));
        }
        // Long single-line ASR dumps get paragraph breaks restored for readability.
        let text = if !text.contains('\n') && text.len() > 1000 {
            add_paragraph_breaks(text, 5)
        } else {
            text.to_string()
        };
        Ok(Self {
            segments: Vec::new(),
            text,
            duration_seconds: 0.0,
        })
    }

    /// Whether segment timing/speaker metadata is available.
    pub fn is_diarized(&self) -> bool {
        !self.segments.is_empty()
    }

    /// The formatted transcript text used for prompt construction.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The diarized segments. Empty for flat input.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Total duration in seconds (0 for flat input).
    pub fn duration_seconds(&self) -> f64 {
        self.duration_seconds
    }

    /// Conservative token estimate of the formatted text.
    pub fn estimated_tokens(&self) -> usize {
        crate::budget::estimate_tokens(&self.text)
    }
}

/// Check whether JSON data has the diarized shape: a non-empty array whose
/// elements carry `text` and `start` fields.
fn is_diarized_shape(value: &serde_json::Value) -> bool {
    let Some(items) = value.as_array() else {
        return false;
    };
    let Some(first) = items.first() else {
        return false;
    };
    first
        .as_object()
        .is_some_and(|o| o.contains_key("text") && o.contains_key("start"))
}
