//! Command-line interface definitions using clap
//!
//! This module defines the CLI structure for linkpulse using clap's derive macros.

pub mod commands;

use clap::{Parser, Subcommand};
use std::fmt;

use crate::storage::StorageFactory;

/// Linkpulse - click tracking and analytics for link-in-bio pages
#[derive(Parser)]
#[command(name = "linkpulse")]
#[command(version)]
#[command(about = "Click tracking and analytics for link-in-bio pages", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Show click statistics for a link
    Stats {
        /// Link identifier
        link_id: String,

        /// Range start (RFC3339 or YYYY-MM-DD)
        #[arg(long)]
        start: Option<String>,

        /// Range end (RFC3339 or YYYY-MM-DD)
        #[arg(long)]
        end: Option<String>,

        /// Include bot traffic in the numbers
        #[arg(long)]
        include_bots: bool,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

/// Configuration management commands
#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Generate example configuration file
    Generate {
        /// Output path (default: config.example.toml)
        output_path: Option<String>,

        /// Force overwrite without confirmation
        #[arg(long)]
        force: bool,
    },
}

#[derive(Debug)]
pub enum CliError {
    StorageError(String),
    ParseError(String),
    CommandError(String),
}

impl CliError {
    /// Format as simple output
    pub fn format_simple(&self) -> String {
        match self {
            CliError::StorageError(msg) => format!("Storage error: {}", msg),
            CliError::ParseError(msg) => format!("Parse error: {}", msg),
            CliError::CommandError(msg) => format!("Command error: {}", msg),
        }
    }

    /// Format as colored output
    pub fn format_colored(&self) -> String {
        use colored::Colorize;
        match self {
            CliError::StorageError(msg) => {
                format!("{} {}", "Storage error:".red().bold(), msg.white())
            }
            CliError::ParseError(msg) => {
                format!("{} {}", "Parse error:".yellow().bold(), msg.white())
            }
            CliError::CommandError(msg) => {
                format!("{} {}", "Command error:".red().bold(), msg.white())
            }
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_simple())
    }
}

impl std::error::Error for CliError {}

impl From<crate::errors::LinkpulseError> for CliError {
    fn from(err: crate::errors::LinkpulseError) -> Self {
        CliError::StorageError(err.to_string())
    }
}

/// Parse command-line arguments and run the selected command
pub async fn run_cli() -> Result<(), CliError> {
    let cli = Cli::parse();
    run_cli_command(cli.command).await
}

/// Run a CLI command from clap-parsed input
pub async fn run_cli_command(cmd: Commands) -> Result<(), CliError> {
    // Handle config command separately (generate doesn't need a DB connection)
    if let Commands::Config { action } = cmd {
        let ConfigCommands::Generate { output_path, force } = action;
        return commands::config_generate(output_path, force).await;
    }

    // Create storage for commands that need it
    let storage = StorageFactory::create()
        .await
        .map_err(|e| CliError::StorageError(e.to_string()))?;

    match cmd {
        Commands::Stats {
            link_id,
            start,
            end,
            include_bots,
        } => commands::link_stats(storage, link_id, start, end, include_bots).await,

        Commands::Config { .. } => unreachable!("handled above"),
    }
}
