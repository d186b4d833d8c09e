//! Error types for Fortell.

use thiserror::Error;

/// Library-level error type for Fortell operations.
#[derive(Error, Debug)]
pub enum FortellError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unrecognized transcript format: {0}")]
    FormatDetection(String),

    #[error("Prompt exceeds model input budget ({prompt_tokens} > {budget} tokens)")]
    TokenLimit { prompt_tokens: usize, budget: usize },

    #[error("Completion API error: {message}")]
    Api { message: String, transient: bool },

    #[error("Structured output invalid: {0}")]
    StructuredOutput(String),

    #[error("Run cancelled")]
    Cancelled,

    #[error("{stage} failed: {source}")]
    Stage {
        stage: String,
        #[source]
        source: Box<FortellError>,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

impl FortellError {
    /// Wrap this error with the pipeline stage it occurred in.
    pub fn in_stage(self, stage: impl Into<String>) -> FortellError {
        FortellError::Stage {
            stage: stage.into(),
            source: Box::new(self),
        }
    }

    /// Whether this error (or the error it wraps) is a token-limit overflow.
    pub fn is_token_limit(&self) -> bool {
        match self {
            FortellError::TokenLimit { .. } => true,
            FortellError::Stage { source, .. } => source.is_token_limit(),
            _ => false,
        }
    }

    /// Whether this error is a transient API failure worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(self, FortellError::Api { transient: true, .. })
    }
}

/// Result type alias for Fortell operations.
pub type Result<T> = std::result::Result<T, FortellError>;
