//! CLI module for Fortell.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use clap::{Parser, Subcommand};

/// Fortell - Transcript to Article
///
/// A CLI tool for turning long transcripts into long-form articles.
/// The name "Fortell" comes from the Norwegian word for "tell."
#[derive(Parser, Debug)]
#[command(name = "fortell")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate an article from a transcript file
    Generate {
        /// Path to the transcript JSON (diarized segment array or ASR object)
        transcript: String,

        /// LLM model to use for every task in this run
        #[arg(short, long)]
        model: Option<String>,

        /// Write the article to this file (stdout if not specified)
        #[arg(short, long)]
        output_file: Option<String>,

        /// Skip the appendix (key terms + references)
        #[arg(long)]
        no_appendix: bool,

        /// Use a single LLM call (faster, may sacrifice quality)
        #[arg(long)]
        single_pass: bool,

        /// Write the validated outline JSON to this path (debug artifact)
        #[arg(long)]
        dump_outline: Option<String>,
    },

    /// Check configuration and API access
    Doctor,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Open configuration file in editor
    Edit,

    /// Show configuration file path
    Path,
}
