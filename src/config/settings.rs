//! Configuration settings for Fortell.

use crate::budget::{default_limits, ModelLimits};
use crate::chunking::ChunkingConfig;
use crate::completion::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub models: ModelSettings,
    pub generation: GenerationSettings,
    pub chunking: ChunkingConfig,
    pub retry: RetrySettings,
    pub prompts: PromptSettings,
}


/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// A pipeline task that issues completion calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    Outline,
    Section,
    Condensation,
    SinglePass,
    Appendix,
}

/// Model selection per task, plus the model-limits table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    /// Model for outline generation.
    pub outline: String,
    /// Model for per-section generation.
    pub section: String,
    /// Model for chunk condensation.
    pub condensation: String,
    /// Model for single-pass generation.
    pub single_pass: String,
    /// Model for appendix generation.
    pub appendix: String,
    /// Context/output limits per model name.
    pub limits: HashMap<String, ModelLimits>,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            outline: "gpt-5.2".to_string(),
            section: "gpt-5.2".to_string(),
            condensation: "gpt-5-mini".to_string(),
            single_pass: "gpt-5.2".to_string(),
            appendix: "gpt-5.2".to_string(),
            limits: default_limits(),
        }
    }
}

impl ModelSettings {
    /// Model name for a task, with an optional run-wide override.
    pub fn for_task(&self, task: Task, override_model: Option<&str>) -> String {
        if let Some(model) = override_model {
            return model.to_string();
        }
        match task {
            Task::Outline => self.outline.clone(),
            Task::Section => self.section.clone(),
            Task::Condensation => self.condensation.clone(),
            Task::SinglePass => self.single_pass.clone(),
            Task::Appendix => self.appendix.clone(),
        }
    }
}

/// Article generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    /// Minimum outline section count accepted.
    pub min_sections: usize,
    /// Maximum outline section count accepted.
    pub max_sections: usize,
    /// Tokens reserved for prompt instructions when gating strategies.
    pub prompt_overhead_tokens: usize,
    /// Extra tokens reserved for the outline and terms in section prompts.
    pub outline_overhead_tokens: usize,
    /// Maximum concurrent completion calls per run.
    pub max_concurrent_calls: usize,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            min_sections: 4,
            max_sections: 15,
            prompt_overhead_tokens: 3_000,
            outline_overhead_tokens: 2_000,
            max_concurrent_calls: 3,
        }
    }
}

/// Retry and transport settings for completion calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Total attempts per completion call before giving up.
    pub max_attempts: u32,
    /// First backoff delay in seconds.
    pub initial_backoff_secs: u64,
    /// Backoff ceiling in seconds.
    pub max_backoff_secs: u64,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 7,
            initial_backoff_secs: 30,
            max_backoff_secs: 120,
            request_timeout_secs: 300,
        }
    }
}

impl RetrySettings {
    /// Build the retry policy applied by the completion client.
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            initial_backoff: Duration::from_secs(self.initial_backoff_secs),
            max_backoff: Duration::from_secs(self.max_backoff_secs),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Prompt customization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct PromptSettings {
    /// Directory for custom prompts (overrides defaults).
    pub custom_dir: Option<String>,
    /// Custom variables available in all prompts as {{variable_name}}.
    pub variables: HashMap<String, String>,
}


impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> crate::error::Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> crate::error::Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let settings: Settings = toml::from_str(&content)?;
            Ok(settings)
        } else {
            Ok(Settings::default())
        }
    }

    /// Save settings to the default configuration file.
    pub fn save(&self) -> crate::error::Result<()> {
        self.save_to(&Self::default_config_path())
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::FortellError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("fortell")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }
}
