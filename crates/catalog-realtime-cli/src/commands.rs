//! Command implementations

use std::sync::Arc;

use catalog_realtime::{ActivationGate, RealtimeConfig, RealtimeSession};
use tokio::sync::{broadcast, watch};
use tracing::{info, warn};

use crate::cli::{ConfigSource, OutputFormat};
use crate::error::CliResult;
use crate::output::{ConsoleSink, Printer};

/// Resolve the session configuration: file or environment, then flags.
pub fn load_config(source: &ConfigSource) -> CliResult<RealtimeConfig> {
    let mut config = match &source.config {
        Some(path) => RealtimeConfig::from_file(path)?,
        None => RealtimeConfig::from_env()?,
    };
    if let Some(endpoint) = &source.endpoint {
        config.endpoint.clone_from(endpoint);
    }
    if source.no_notices {
        config.notices.enabled = false;
    }
    config.validate()?;
    Ok(config)
}

/// Print the resolved configuration.
pub fn show_config(source: &ConfigSource) -> CliResult<()> {
    let config = load_config(source)?;
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

/// Run a session and print notifications until Ctrl-C.
pub async fn watch(source: &ConfigSource, format: OutputFormat, colored: bool) -> CliResult<()> {
    let config = load_config(source)?;
    info!(endpoint = %config.endpoint, "Starting realtime watcher");

    let session = RealtimeSession::from_config(&config, Arc::new(ConsoleSink::new(colored)))?;
    let printer = Printer::new(format, colored);
    let mut events = session.subscribe_all();
    let mut status = session.watch_status();

    let (active_tx, active_rx) = watch::channel(true);
    let gate = ActivationGate::spawn(session.clone(), active_rx);

    let interrupted = tokio::signal::ctrl_c();
    tokio::pin!(interrupted);

    loop {
        tokio::select! {
            result = &mut interrupted => {
                result?;
                info!("Interrupted, disconnecting");
                break;
            }
            received = events.recv() => match received {
                Ok(event) => printer.print_event(&event)?,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Output fell behind, events skipped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = *status.borrow_and_update();
                printer.print_status(&snapshot)?;
            }
        }
    }

    let _ = active_tx.send(false);
    session.close().await;
    gate.stop();

    let stats = session.dispatcher().stats();
    info!(
        delivered = stats.delivered,
        dropped_malformed = stats.dropped_malformed,
        unroutable = stats.unroutable,
        "Realtime watcher stopped"
    );
    Ok(())
}
