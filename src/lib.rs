//! Fortell - Transcript to Article
//!
//! A CLI tool for turning long, time-stamped transcripts into coherent
//! long-form articles.
//!
//! The name "Fortell" comes from the Norwegian word for "tell."
//!
//! # Overview
//!
//! Fortell orchestrates a text-generation model around two hard limits: a
//! bounded input context window and a much smaller output window. It:
//!
//! - Picks a generation strategy per run (single-pass, outline + sections,
//!   or chunked condensation for oversized transcripts)
//! - Writes sections concurrently over a shared, byte-identical prompt
//!   prefix, so provider-side prefix caching applies
//! - Condenses transcripts that exceed the context window into notes first
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - `config` - Configuration and prompt templates
//! - `transcript` - Transcript loading and format detection
//! - `budget` - Token estimation and model limits
//! - `chunking` - Window splitting for oversized transcripts
//! - `condense` - Chunk condensation
//! - `outline` - Outline generation and validation
//! - `writer` - Section, appendix, and single-pass writing
//! - `completion` - The retried, rate-aware completion client boundary
//! - `orchestrator` - Strategy selection and pipeline coordination
//!
//! # Example
//!
//! ```rust,no_run
//! use fortell::config::Settings;
//! use fortell::orchestrator::{GenerateOptions, Orchestrator};
//! use fortell::transcript::Transcript;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let orchestrator = Orchestrator::new(settings)?;
//!
//!     let raw = std::fs::read_to_string("talk.json")?;
//!     let transcript = Transcript::from_json_str(&raw)?;
//!
//!     let result = orchestrator
//!         .generate(&transcript, &GenerateOptions::default())
//!         .await?;
//!     println!("{}", result.article);
//!
//!     Ok(())
//! }
//! ```

pub mod budget;
pub mod chunking;
pub mod cli;
pub mod completion;
pub mod condense;
pub mod config;
pub mod error;
pub mod openai;
pub mod orchestrator;
pub mod outline;
pub mod transcript;
pub mod writer;

pub use error::{FortellError, Result};
