//! Logging initialization
//!
//! Logs always go to stderr; stdout carries event output only.

use std::io;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

/// Install the global subscriber. `RUST_LOG` takes precedence over `level`.
///
/// # Errors
///
/// Returns an error if a global subscriber is already set.
pub fn init(level: &str, json: bool) -> io::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = tracing_subscriber::registry().with(filter);

    if json {
        subscriber
            .with(fmt::layer().json().with_writer(io::stderr))
            .try_init()
            .map_err(|e| io::Error::other(e.to_string()))
    } else {
        subscriber
            .with(fmt::layer().with_writer(io::stderr))
            .try_init()
            .map_err(|e| io::Error::other(e.to_string()))
    }
}
