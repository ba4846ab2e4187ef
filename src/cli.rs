use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "grepintel")]
#[command(about = "Pattern-based vulnerability triage with model-assisted review")]
#[command(version)]
pub struct Cli {
    /// Debug-level logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    pub(crate) verbose: bool,

    #[command(subcommand)]
    pub(crate) command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scan a file or directory and have every candidate reviewed
    Scan {
        /// File or directory to scan
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Languages to scan; repeat or comma-separate, `all` for every one
        #[arg(short, long, value_delimiter = ',', default_value = "all")]
        language: Vec<String>,

        /// Framework overlay to add to its language's patterns
        #[arg(short, long)]
        framework: Option<String>,

        /// Write the JSON report to this file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format: `console` or `json`
        #[arg(long, default_value = "")]
        format: String,

        /// Show only high severity findings
        #[arg(long)]
        high_only: bool,

        /// Lines of context on each side of a match
        #[arg(long)]
        context_lines: Option<usize>,

        /// Candidates per batched model request
        #[arg(long)]
        batch_size: Option<usize>,
    },

    /// List loaded languages, frameworks and rule types
    Patterns {
        /// Framework overlay to show as well
        #[arg(short, long)]
        framework: Option<String>,
    },
}
