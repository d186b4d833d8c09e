//! Configuration module for Fortell.
//!
//! Handles loading and managing application settings and prompt templates.

mod prompts;
mod settings;

pub use prompts::{
    AppendixPrompts, CondensePrompts, OutlinePrompts, Prompts, SectionPrompts, SinglePassPrompts,
};
pub use settings::{
    GeneralSettings, GenerationSettings, ModelSettings, PromptSettings, RetrySettings, Settings,
    Task,
};
