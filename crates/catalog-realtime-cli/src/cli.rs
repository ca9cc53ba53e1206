//! CLI argument parsing

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Main CLI application structure
#[derive(Parser, Debug)]
#[command(
    name = "catalog-realtime",
    version,
    about = "Watch realtime notifications from the catalog broker",
    long_about = "Connects to the catalog STOMP broker over WebSocket, subscribes to the\n\
                  artist, album, sync and system topics and prints every notification.\n\
                  Press Ctrl-C to disconnect."
)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,

    /// Output format for events
    #[arg(long, short = 'f', global = true, value_enum, default_value = "human")]
    pub format: OutputFormat,

    /// Log level, overridden by RUST_LOG
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Connect and print notifications until interrupted
    Watch(ConfigSource),

    /// Print the resolved configuration as JSON
    ShowConfig(ConfigSource),
}

/// Where the session configuration comes from
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigSource {
    /// Broker endpoint (ws:// or wss://), overrides the configuration
    #[arg(long, short = 'e')]
    pub endpoint: Option<String>,

    /// Configuration file (.toml, .yaml, .yml or .json)
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,

    /// Suppress the connection notices
    #[arg(long)]
    pub no_notices: bool,
}

/// How events are written to stdout
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// One colored line per event
    Human,
    /// One JSON object per line
    Json,
}
