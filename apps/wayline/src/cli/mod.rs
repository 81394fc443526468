//! # Wayline CLI Module
//!
//! This module implements the CLI interface for Wayline.
//!
//! ## Available Commands
//!
//! - `diff` - Print the edit script between two name sequences
//! - `replay` - Replay a TOML navigation script against a stack

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use wayline_core::NavigationError;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Wayline - navigation-state engine tooling
///
/// Inspect stack reconciliation and replay navigation scripts.
#[derive(Parser, Debug)]
#[command(name = "wayline")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the minimal edit script between two sequences
    Diff {
        /// Previous sequence (comma-separated names)
        #[arg(long, value_delimiter = ',', num_args = 0..)]
        from: Vec<String>,

        /// Next sequence (comma-separated names)
        #[arg(long, value_delimiter = ',', num_args = 0..)]
        to: Vec<String>,
    },

    /// Replay a navigation script
    Replay {
        /// Path to the TOML script
        script: PathBuf,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), NavigationError> {
    let json_mode = cli.json;

    match cli.command {
        Commands::Diff { from, to } => cmd_diff(&from, &to, json_mode),
        Commands::Replay { script } => cmd_replay(&script, json_mode).await,
    }
}
