//! Session lifecycle as a pure transition function.
//!
//! [`transition`] takes the current [`SessionState`] and one [`Input`] and
//! returns the next state together with the [`Effect`]s the session actor has
//! to carry out. It performs no I/O and holds no clock, which keeps every
//! lifecycle rule testable without a runtime.
//!
//! Every transport open gets a fresh generation number. Inputs produced by a
//! handshake, a link or a retry timer carry the generation they belong to, and
//! inputs from an older generation are ignored. `disconnect` bumps the
//! generation as well, so anything still in flight from before it is stale.

use std::time::Duration;

use catalog_realtime_transport::TransportError;

use crate::reconnect::{ReconnectDecision, ReconnectPolicy, ReconnectState};
use crate::status::{ConnectionStatus, SessionSnapshot};

/// Everything the state machine tracks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    /// Current status.
    pub status: ConnectionStatus,
    /// Attempt counter and backoff policy.
    pub reconnect: ReconnectState,
    /// Set once the budget ran out in this activation cycle.
    pub exhausted: bool,
    /// Generation of the current transport, bumped on every open and on disconnect.
    pub generation: u64,
    /// `true` while a retry timer is armed.
    pub retry_pending: bool,
}

impl SessionState {
    /// Initial, disconnected state.
    pub const fn new(policy: ReconnectPolicy) -> Self {
        Self {
            status: ConnectionStatus::Disconnected,
            reconnect: ReconnectState::new(policy),
            exhausted: false,
            generation: 0,
            retry_pending: false,
        }
    }

    /// Observer view of this state.
    pub const fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            status: self.status,
            attempt_count: self.reconnect.attempt_count,
            exhausted: self.exhausted,
        }
    }
}

/// Something that happened to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// External request to connect.
    Connect,
    /// External request to disconnect.
    Disconnect,
    /// The handshake of `generation` succeeded.
    HandshakeSucceeded {
        /// Generation of the attempt
        generation: u64,
    },
    /// The handshake of `generation` failed or timed out.
    HandshakeFailed {
        /// Generation of the attempt
        generation: u64,
        /// Why it failed
        error: TransportError,
    },
    /// The established link of `generation` dropped.
    ConnectionLost {
        /// Generation of the link
        generation: u64,
        /// Why it dropped, when known
        error: Option<TransportError>,
    },
    /// The retry timer armed during `generation` fired.
    RetryTimerFired {
        /// Generation that armed the timer
        generation: u64,
    },
}

/// A notice the session surfaces through the display sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    /// Notifications became active.
    Active,
    /// The reconnect budget is spent.
    Exhausted,
}

/// Work the session actor performs after a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Start a handshake tagged with `generation`.
    OpenTransport {
        /// Generation of the new transport
        generation: u64,
    },
    /// Adopt the freshly handshaken connection: subscribe and start routing.
    StartLink {
        /// Generation of the link
        generation: u64,
    },
    /// Tear down the pending handshake and the live link, if any.
    CloseTransport,
    /// Arm the retry timer.
    ScheduleRetry {
        /// Generation the timer reports back with
        generation: u64,
        /// Attempt number the timer starts
        attempt: u32,
        /// Wait before firing
        delay: Duration,
    },
    /// Disarm the retry timer.
    CancelRetry,
    /// Show a connection notice.
    Notify(Notice),
}

/// Apply `input` to `state`.
pub fn transition(mut state: SessionState, input: Input) -> (SessionState, Vec<Effect>) {
    let mut effects = Vec::new();

    match input {
        Input::Connect => match state.status {
            ConnectionStatus::Connecting | ConnectionStatus::Connected => {}
            ConnectionStatus::Disconnected | ConnectionStatus::Error => {
                if state.retry_pending {
                    state.retry_pending = false;
                    effects.push(Effect::CancelRetry);
                }
                state.reconnect.attempt_count = 0;
                state.exhausted = false;
                open(&mut state, &mut effects);
            }
        },

        Input::Disconnect => {
            if state.retry_pending {
                state.retry_pending = false;
                effects.push(Effect::CancelRetry);
            }
            state.generation += 1;
            state.status = ConnectionStatus::Disconnected;
            state.reconnect.attempt_count = 0;
            state.exhausted = false;
            effects.push(Effect::CloseTransport);
        }

        Input::HandshakeSucceeded { generation } => {
            if generation == state.generation && state.status == ConnectionStatus::Connecting {
                state.status = ConnectionStatus::Connected;
                state.reconnect.attempt_count = 0;
                state.exhausted = false;
                effects.push(Effect::StartLink { generation });
                effects.push(Effect::Notify(Notice::Active));
            }
        }

        Input::HandshakeFailed { generation, .. } => {
            if generation == state.generation && state.status == ConnectionStatus::Connecting {
                state.status = ConnectionStatus::Error;
                schedule_reconnect(&mut state, &mut effects);
            }
        }

        Input::ConnectionLost { generation, .. } => {
            if generation == state.generation && state.status == ConnectionStatus::Connected {
                state.status = ConnectionStatus::Error;
                effects.push(Effect::CloseTransport);
                schedule_reconnect(&mut state, &mut effects);
            }
        }

        Input::RetryTimerFired { generation } => {
            if generation == state.generation && state.retry_pending {
                state.retry_pending = false;
                // A timer that outlived a successful connection does nothing
                if !matches!(
                    state.status,
                    ConnectionStatus::Connected | ConnectionStatus::Connecting
                ) {
                    open(&mut state, &mut effects);
                }
            }
        }
    }

    (state, effects)
}

fn open(state: &mut SessionState, effects: &mut Vec<Effect>) {
    state.generation += 1;
    state.status = ConnectionStatus::Connecting;
    effects.push(Effect::OpenTransport {
        generation: state.generation,
    });
}

fn schedule_reconnect(state: &mut SessionState, effects: &mut Vec<Effect>) {
    match state.reconnect.decide() {
        ReconnectDecision::Retry { attempt, delay } => {
            state.reconnect.attempt_count = attempt;
            state.retry_pending = true;
            effects.push(Effect::ScheduleRetry {
                generation: state.generation,
                attempt,
                delay,
            });
        }
        ReconnectDecision::Exhausted => {
            if !state.exhausted {
                state.exhausted = true;
                effects.push(Effect::Notify(Notice::Exhausted));
            }
        }
    }
}
