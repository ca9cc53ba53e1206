//! Activation gate: drives a session from an external boolean signal.

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::session::RealtimeSession;

/// Connects the session on a rising edge of the signal and disconnects it on
/// a falling edge.
///
/// Only edges count: repeating the current value does nothing. The initial
/// value is treated as an edge from `false`. When the signal's sender goes
/// away the gate disconnects an active session and stops.
#[derive(Debug)]
pub struct ActivationGate {
    task: JoinHandle<()>,
}

impl ActivationGate {
    /// Start watching `signal`. Must be called within a tokio runtime.
    pub fn spawn(session: RealtimeSession, mut signal: watch::Receiver<bool>) -> Self {
        let task = tokio::spawn(async move {
            let mut active = false;
            let mut wanted = *signal.borrow_and_update();

            loop {
                if wanted != active {
                    active = wanted;
                    info!(active, "Activation changed");
                    let result = if active {
                        session.connect()
                    } else {
                        session.disconnect()
                    };
                    if result.is_err() {
                        debug!("Session closed, activation gate stopping");
                        return;
                    }
                }

                if signal.changed().await.is_err() {
                    break;
                }
                wanted = *signal.borrow_and_update();
            }

            debug!("Activation signal dropped");
            if active {
                let _ = session.disconnect();
            }
        });
        Self { task }
    }

    /// Stop watching. The session keeps its current state.
    pub fn stop(self) {
        self.task.abort();
    }

    /// `true` once the gate stopped on its own.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
