//! # Catalog Realtime CLI
//!
//! Command-line watcher for the catalog's realtime notifications.
//!
//! ```bash
//! # Watch the default broker
//! catalog-realtime watch
//!
//! # Watch a specific endpoint, printing JSON lines
//! catalog-realtime watch --endpoint wss://catalog.example.com/ws --format json
//!
//! # Show the configuration a watch would use
//! catalog-realtime show-config --config realtime.toml
//! ```

#![warn(rust_2018_idioms, clippy::all)]
#![deny(unsafe_code)]
#![allow(clippy::missing_errors_doc, clippy::must_use_candidate)]

pub mod cli;
pub mod commands;
pub mod error;
pub mod logging;
pub mod output;

use std::io::IsTerminal;

pub use cli::{Cli, Commands, ConfigSource, OutputFormat};
pub use error::{CliError, CliResult};

/// Run the parsed command line
pub async fn run(cli: Cli) -> CliResult<()> {
    let colored = !cli.no_color && std::io::stdout().is_terminal();
    match cli.command {
        Commands::Watch(source) => commands::watch(&source, cli.format, colored).await,
        Commands::ShowConfig(source) => commands::show_config(&source),
    }
}
