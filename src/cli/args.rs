//! CLI argument definitions using clap derive

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::cli::commands::{
    completions::CompletionsArgs, derive::DeriveArgs, eqp::EqpCommands, init::InitArgs,
    validate::ValidateArgs,
};

#[derive(Parser)]
#[command(name = "lotguard")]
#[command(author, version, about = "Equipment package-validation configuration manager")]
#[command(long_about = "Maintains per-equipment package validation configs as YAML documents: \
    derive package-selection identifiers, validate documents and manage the equipment store.")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalOpts,
}

#[derive(clap::Args, Clone, Debug)]
pub struct GlobalOpts {
    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "auto")]
    pub format: OutputFormat,

    /// Suppress non-essential output and log only errors
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Enable verbose output (debug logging)
    #[arg(long, short = 'v', global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Project root (default: auto-detect by finding .lotguard/)
    #[arg(long, global = true)]
    pub project: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new lotguard project
    Init(InitArgs),

    /// Equipment config management
    #[command(subcommand)]
    Eqp(EqpCommands),

    /// Derive a package-selection identifier from a package code and mask
    Derive(DeriveArgs),

    /// Validate equipment documents
    Validate(ValidateArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Automatically detect based on context (yaml for show, a table for list)
    #[default]
    Auto,
    /// YAML format (full fidelity)
    Yaml,
    /// Tab-separated values (for piping)
    Tsv,
    /// JSON format (for programming)
    Json,
    /// CSV format (for spreadsheets)
    Csv,
    /// Markdown tables
    Md,
    /// Just IDs, one per line
    Id,
}

impl OutputFormat {
    /// Resolve `Auto` against the configured default, then `fallback`
    pub fn resolve(self, configured: Option<&str>, fallback: OutputFormat) -> OutputFormat {
        if self != OutputFormat::Auto {
            return self;
        }
        configured
            .and_then(|name| OutputFormat::from_str(name, true).ok())
            .filter(|f| *f != OutputFormat::Auto)
            .unwrap_or(fallback)
    }
}
