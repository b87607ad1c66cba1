//! Command-line interface of the service binary.

use clap::{Parser, Subcommand, ValueEnum};
use room_recorder_core::config::{CONFIG_FILE_ENV, DEFAULT_CONFIG_FILE};
use std::path::PathBuf;

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;

// ============================================================================
// CLI Structure
// ============================================================================

/// Room-Recorder - start LiveKit room recordings from webhooks
#[derive(Debug, Parser)]
#[command(name = "room-recorder")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Starts LiveKit composite recordings when rooms start")]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, env = CONFIG_FILE_ENV, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Log output format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// Subcommand to execute (defaults to `serve`)
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands
#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Commands {
    /// Run the webhook server
    Serve,

    /// Resolve and validate the configuration, then exit
    CheckConfig,
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable text
    Text,
    /// One JSON object per line
    Json,
}

impl Cli {
    pub fn command(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Serve)
    }
}
