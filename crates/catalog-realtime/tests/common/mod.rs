//! Shared test doubles for session integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use catalog_realtime::{
    BrokerConnection, BrokerLink, BrokerTransport, ConnectionStatus, DisplaySink, HandshakeInfo,
    InboundMessage, RealtimeSession, SessionSnapshot, ToastStyle, Topic, TransportError,
    TransportEvent,
};
use catalog_realtime_transport::TransportResult;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;

/// Upper bound for every wait; with paused time this only costs virtual time.
pub const WAIT: Duration = Duration::from_secs(600);

/// What the next `connect` call does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Complete the handshake.
    Succeed,
    /// Fail the handshake.
    Fail,
    /// Never complete.
    Hang,
}

#[derive(Debug)]
struct ScriptState {
    script: VecDeque<Step>,
    fallback: Step,
    attempts: Vec<Instant>,
    links: Vec<MockLink>,
    fail_close: bool,
}

/// Scripted in-memory broker transport.
#[derive(Debug, Clone)]
pub struct MockTransport {
    state: Arc<Mutex<ScriptState>>,
    attempts_tx: Arc<watch::Sender<usize>>,
}

impl MockTransport {
    /// Run `script` in order, then repeat `fallback` forever.
    pub fn new(script: impl IntoIterator<Item = Step>, fallback: Step) -> Self {
        let (attempts_tx, _) = watch::channel(0);
        Self {
            state: Arc::new(Mutex::new(ScriptState {
                script: script.into_iter().collect(),
                fallback,
                attempts: Vec::new(),
                links: Vec::new(),
                fail_close: false,
            })),
            attempts_tx: Arc::new(attempts_tx),
        }
    }

    /// Every call succeeds.
    pub fn accepting() -> Self {
        Self::new([], Step::Succeed)
    }

    /// Every call fails.
    pub fn refusing() -> Self {
        Self::new([], Step::Fail)
    }

    /// Make `close` on every later connection report an error.
    pub fn failing_close(self) -> Self {
        self.state.lock().unwrap().fail_close = true;
        self
    }

    /// Number of `connect` calls so far.
    pub fn attempts(&self) -> usize {
        *self.attempts_tx.borrow()
    }

    /// Virtual time of each `connect` call.
    pub fn attempt_times(&self) -> Vec<Instant> {
        self.state.lock().unwrap().attempts.clone()
    }

    /// Gaps between consecutive `connect` calls.
    pub fn attempt_gaps(&self) -> Vec<Duration> {
        self.attempt_times()
            .windows(2)
            .map(|pair| pair[1] - pair[0])
            .collect()
    }

    /// Wait until at least `count` `connect` calls happened.
    pub async fn wait_for_attempts(&self, count: usize) {
        let mut attempts = self.attempts_tx.subscribe();
        tokio::time::timeout(WAIT, attempts.wait_for(|n| *n >= count))
            .await
            .unwrap_or_else(|_| panic!("never reached {count} attempts"))
            .unwrap();
    }

    /// The `index`-th established connection.
    pub fn link(&self, index: usize) -> MockLink {
        self.state.lock().unwrap().links[index].clone()
    }

    /// Number of established connections.
    pub fn link_count(&self) -> usize {
        self.state.lock().unwrap().links.len()
    }
}

#[async_trait]
impl BrokerTransport for MockTransport {
    async fn connect(&self) -> TransportResult<BrokerLink> {
        let (step, fail_close) = {
            let mut state = self.state.lock().unwrap();
            state.attempts.push(Instant::now());
            let fallback = state.fallback;
            let step = state.script.pop_front().unwrap_or(fallback);
            (step, state.fail_close)
        };
        self.attempts_tx.send_modify(|n| *n += 1);

        match step {
            Step::Fail => Err(TransportError::ConnectionFailed(
                "scripted refusal".to_string(),
            )),
            Step::Hang => std::future::pending().await,
            Step::Succeed => {
                let (events_tx, events) = mpsc::channel(64);
                let link = MockLink {
                    events_tx,
                    subscriptions: Arc::new(Mutex::new(Vec::new())),
                    closed: Arc::new(AtomicBool::new(false)),
                };
                self.state.lock().unwrap().links.push(link.clone());
                Ok(BrokerLink {
                    connection: Box::new(MockConnection {
                        subscriptions: link.subscriptions.clone(),
                        closed: link.closed.clone(),
                        fail_close,
                    }),
                    events,
                    handshake: HandshakeInfo {
                        version: Some("1.2".to_string()),
                        ..HandshakeInfo::default()
                    },
                })
            }
        }
    }

    fn endpoint(&self) -> Option<String> {
        Some("mock://broker".to_string())
    }
}

#[derive(Debug)]
struct MockConnection {
    subscriptions: Arc<Mutex<Vec<(String, String)>>>,
    closed: Arc<AtomicBool>,
    fail_close: bool,
}

#[async_trait]
impl BrokerConnection for MockConnection {
    async fn subscribe(&mut self, subscription_id: &str, destination: &str) -> TransportResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::AlreadyClosed);
        }
        self.subscriptions
            .lock()
            .unwrap()
            .push((subscription_id.to_string(), destination.to_string()));
        Ok(())
    }

    async fn close(&mut self) -> TransportResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        if self.fail_close {
            return Err(TransportError::SendFailed(
                "scripted DISCONNECT failure".to_string(),
            ));
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Test-side view of one established mock connection.
#[derive(Debug, Clone)]
pub struct MockLink {
    events_tx: mpsc::Sender<TransportEvent>,
    subscriptions: Arc<Mutex<Vec<(String, String)>>>,
    closed: Arc<AtomicBool>,
}

impl MockLink {
    /// Inject a MESSAGE frame on `topic`'s subscription.
    pub async fn deliver(&self, topic: Topic, body: &str) {
        let message = InboundMessage {
            subscription: Some(topic.subscription_id()),
            destination: Some(topic.destination().to_string()),
            message_id: None,
            body: body.to_string(),
        };
        self.events_tx
            .send(TransportEvent::Message(message))
            .await
            .unwrap();
    }

    /// Simulate the broker dropping the connection.
    pub async fn drop_connection(&self) {
        let _ = self
            .events_tx
            .send(TransportEvent::Disconnected {
                error: Some(TransportError::ConnectionLost("scripted drop".to_string())),
            })
            .await;
    }

    /// `(id, destination)` pairs in SUBSCRIBE order.
    pub fn subscriptions(&self) -> Vec<(String, String)> {
        self.subscriptions.lock().unwrap().clone()
    }

    /// Whether the session closed this connection.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Wait until all four topics are subscribed.
    pub async fn wait_subscribed(&self) {
        eventually(|| self.subscriptions().len() == Topic::ALL.len()).await;
    }

    /// Wait until the session closed this connection.
    pub async fn wait_closed(&self) {
        eventually(|| self.is_closed()).await;
    }
}

/// One call to [`DisplaySink::display`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shown {
    pub message: String,
    pub style: ToastStyle,
    pub duration: Option<Duration>,
}

/// Sink recording everything it is asked to show.
#[derive(Debug, Default)]
pub struct RecordingSink {
    shown: Mutex<Vec<Shown>>,
}

impl RecordingSink {
    pub fn shown(&self) -> Vec<Shown> {
        self.shown.lock().unwrap().clone()
    }

    pub fn count(&self, message: &str) -> usize {
        self.shown()
            .iter()
            .filter(|shown| shown.message == message)
            .count()
    }
}

impl DisplaySink for RecordingSink {
    fn display(&self, message: &str, style: ToastStyle, duration: Option<Duration>) {
        self.shown.lock().unwrap().push(Shown {
            message: message.to_string(),
            style,
            duration,
        });
    }
}

/// Wait until the session settles on `status`.
pub async fn wait_for_status(session: &RealtimeSession, status: ConnectionStatus) -> SessionSnapshot {
    wait_for_snapshot(session, |snapshot| snapshot.status == status).await
}

/// Wait until the session snapshot satisfies `predicate`.
pub async fn wait_for_snapshot(
    session: &RealtimeSession,
    predicate: impl FnMut(&SessionSnapshot) -> bool,
) -> SessionSnapshot {
    let mut snapshots = session.watch_status();
    let snapshot = tokio::time::timeout(WAIT, snapshots.wait_for(predicate))
        .await
        .expect("session never reached the expected snapshot")
        .expect("session actor stopped");
    *snapshot
}

/// Poll `condition` until it holds.
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(WAIT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("condition never became true");
}
