//! The realtime session.
//!
//! A [`RealtimeSession`] is a cheap, cloneable handle to a session actor: a
//! single tokio task that owns the [`SessionState`] and is the only place it
//! changes. Handle calls, handshake outcomes, lost links and retry timers all
//! reach the actor as channel messages, are fed through [`transition`], and
//! the resulting effects are carried out without awaiting transport I/O.
//! Handshakes, link driving and closes run in their own tasks.

use std::sync::Arc;
use std::time::Duration;

use catalog_realtime_transport::{
    BrokerLink, BrokerTransport, TransportError, WebSocketStompTransport,
};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use crate::config::RealtimeConfig;
use crate::dispatcher::{NotificationDispatcher, NotificationStream};
use crate::display::{ACTIVE_NOTICE, DisplaySink, EXHAUSTED_NOTICE, Toast};
use crate::error::{RealtimeError, RealtimeResult};
use crate::event::{NotificationEvent, NotificationKind};
use crate::machine::{Effect, Input, Notice, SessionState, transition};
use crate::reconnect::ReconnectPolicy;
use crate::status::{ConnectionStatus, SessionSnapshot};
use crate::subscriptions::{ActiveLink, LinkLost};
use crate::topic::Topic;

/// How long `close` waits for the live connection to shut down.
const CLOSE_GRACE: Duration = Duration::from_secs(5);

/// Session tuning that is not transport specific.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    /// Backoff policy.
    pub reconnect: ReconnectPolicy,
    /// Show the connection notices.
    pub notices: bool,
    /// Broadcast channel capacity.
    pub channel_capacity: usize,
    /// Bound on one `BrokerTransport::connect` call, whatever the transport.
    pub connect_timeout: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            reconnect: ReconnectPolicy::default(),
            notices: true,
            channel_capacity: 64,
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl From<&RealtimeConfig> for SessionOptions {
    fn from(config: &RealtimeConfig) -> Self {
        Self {
            reconnect: config.reconnect_policy(),
            notices: config.notices.enabled,
            channel_capacity: config.channel_capacity,
            connect_timeout: Duration::from_millis(config.connect_timeout_ms),
        }
    }
}

#[derive(Debug)]
enum Command {
    Connect,
    Disconnect,
    Close(oneshot::Sender<()>),
}

#[derive(Debug)]
enum Internal {
    HandshakeSucceeded { generation: u64, link: BrokerLink },
    HandshakeFailed { generation: u64, error: TransportError },
    RetryTimerFired { generation: u64 },
}

/// Handle to a running realtime session.
///
/// Clones share the same session. The session shuts down when
/// [`close`](RealtimeSession::close) is called or the last handle is dropped.
#[derive(Debug, Clone)]
pub struct RealtimeSession {
    commands: mpsc::UnboundedSender<Command>,
    snapshot: watch::Receiver<SessionSnapshot>,
    dispatcher: Arc<NotificationDispatcher>,
}

impl RealtimeSession {
    /// Start a session over `transport`. Must be called within a tokio runtime.
    ///
    /// The session starts disconnected; call [`connect`](Self::connect) or
    /// drive it with an [`ActivationGate`](crate::ActivationGate).
    pub fn new(
        transport: Arc<dyn BrokerTransport>,
        sink: Arc<dyn DisplaySink>,
        options: SessionOptions,
    ) -> Self {
        let dispatcher = Arc::new(NotificationDispatcher::new(options.channel_capacity, sink));
        let state = SessionState::new(options.reconnect);
        let (snapshot_tx, snapshot) = watch::channel(state.snapshot());
        let (commands, commands_rx) = mpsc::unbounded_channel();
        let (internal_tx, internal_rx) = mpsc::unbounded_channel();
        let (lost_tx, lost_rx) = mpsc::unbounded_channel();

        let actor = SessionActor {
            state,
            transport,
            dispatcher: dispatcher.clone(),
            notices: options.notices,
            connect_timeout: options.connect_timeout,
            snapshot_tx,
            internal_tx,
            lost_tx,
            handshake: None,
            link: None,
            retry: None,
            closing: None,
        };
        tokio::spawn(actor.run(commands_rx, internal_rx, lost_rx));

        Self {
            commands,
            snapshot,
            dispatcher,
        }
    }

    /// Start a session against the WebSocket broker described by `config`.
    ///
    /// # Errors
    ///
    /// Returns an error when the configuration is invalid.
    pub fn from_config(config: &RealtimeConfig, sink: Arc<dyn DisplaySink>) -> RealtimeResult<Self> {
        config.validate()?;
        let transport = WebSocketStompTransport::new(config.transport_config())?;
        Ok(Self::new(
            Arc::new(transport),
            sink,
            SessionOptions::from(config),
        ))
    }

    /// Request a connection. A no-op while connecting or connected.
    ///
    /// # Errors
    ///
    /// Returns [`RealtimeError::SessionClosed`] once the session shut down.
    pub fn connect(&self) -> RealtimeResult<()> {
        self.send(Command::Connect)
    }

    /// Drop the connection, cancel any pending reconnect, and settle on
    /// [`ConnectionStatus::Disconnected`].
    ///
    /// # Errors
    ///
    /// Returns [`RealtimeError::SessionClosed`] once the session shut down.
    pub fn disconnect(&self) -> RealtimeResult<()> {
        self.send(Command::Disconnect)
    }

    fn send(&self, command: Command) -> RealtimeResult<()> {
        self.commands
            .send(command)
            .map_err(|_| RealtimeError::SessionClosed)
    }

    /// Disconnect and stop the session actor, waiting briefly for the
    /// connection to close. Idempotent.
    pub async fn close(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.commands.send(Command::Close(done_tx)).is_ok() {
            let _ = done_rx.await;
        }
    }

    /// `true` once the session actor stopped.
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    /// Current status.
    pub fn status(&self) -> ConnectionStatus {
        self.snapshot.borrow().status
    }

    /// Current status and reconnect progress.
    pub fn snapshot(&self) -> SessionSnapshot {
        *self.snapshot.borrow()
    }

    /// Observe snapshot changes.
    pub fn watch_status(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot.clone()
    }

    /// The dispatcher publishing this session's events.
    pub fn dispatcher(&self) -> &Arc<NotificationDispatcher> {
        &self.dispatcher
    }

    /// Receive events published on `topic`.
    pub fn subscribe(&self, topic: Topic) -> broadcast::Receiver<NotificationEvent> {
        self.dispatcher.subscribe(topic)
    }

    /// Receive every event.
    pub fn subscribe_all(&self) -> broadcast::Receiver<NotificationEvent> {
        self.dispatcher.subscribe_all()
    }

    /// Events of the given kinds.
    pub fn notifications_of(
        &self,
        kinds: impl IntoIterator<Item = NotificationKind>,
    ) -> NotificationStream {
        self.dispatcher.notifications_of(kinds)
    }

    /// Artist changes.
    pub fn artist_changes(&self) -> NotificationStream {
        self.dispatcher.artist_changes()
    }

    /// Album changes.
    pub fn album_changes(&self) -> NotificationStream {
        self.dispatcher.album_changes()
    }

    /// Sync events.
    pub fn sync_events(&self) -> NotificationStream {
        self.dispatcher.sync_events()
    }
}

struct SessionActor {
    state: SessionState,
    transport: Arc<dyn BrokerTransport>,
    dispatcher: Arc<NotificationDispatcher>,
    notices: bool,
    connect_timeout: Duration,
    snapshot_tx: watch::Sender<SessionSnapshot>,
    internal_tx: mpsc::UnboundedSender<Internal>,
    lost_tx: mpsc::UnboundedSender<LinkLost>,
    handshake: Option<(u64, JoinHandle<()>)>,
    link: Option<ActiveLink>,
    retry: Option<(u64, JoinHandle<()>)>,
    closing: Option<JoinHandle<()>>,
}

impl SessionActor {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut internal: mpsc::UnboundedReceiver<Internal>,
        mut lost: mpsc::UnboundedReceiver<LinkLost>,
    ) {
        debug!(endpoint = ?self.transport.endpoint(), "Session actor started");

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Connect) => self.apply(Input::Connect, None),
                    Some(Command::Disconnect) => self.apply(Input::Disconnect, None),
                    Some(Command::Close(done)) => {
                        self.shutdown().await;
                        let _ = done.send(());
                        break;
                    }
                    None => {
                        debug!("All session handles dropped");
                        self.shutdown().await;
                        break;
                    }
                },
                Some(message) = internal.recv() => self.on_internal(message),
                Some(LinkLost { generation, error }) = lost.recv() => {
                    self.apply(Input::ConnectionLost { generation, error }, None);
                }
            }
        }

        debug!("Session actor stopped");
    }

    async fn shutdown(&mut self) {
        self.apply(Input::Disconnect, None);
        if let Some(closing) = self.closing.take()
            && tokio::time::timeout(CLOSE_GRACE, closing).await.is_err()
        {
            warn!(grace_ms = CLOSE_GRACE.as_millis() as u64, "Connection did not close in time");
        }
    }

    fn on_internal(&mut self, message: Internal) {
        match message {
            Internal::HandshakeSucceeded { generation, link } => {
                self.handshake_finished(generation);
                self.apply(Input::HandshakeSucceeded { generation }, Some(link));
            }
            Internal::HandshakeFailed { generation, error } => {
                self.handshake_finished(generation);
                if generation == self.state.generation {
                    warn!(generation, error = %error, "Connection attempt failed");
                }
                self.apply(Input::HandshakeFailed { generation, error }, None);
            }
            Internal::RetryTimerFired { generation } => {
                if matches!(self.retry, Some((armed, _)) if armed == generation) {
                    self.retry = None;
                }
                self.apply(Input::RetryTimerFired { generation }, None);
            }
        }
    }

    fn handshake_finished(&mut self, generation: u64) {
        if matches!(self.handshake, Some((pending, _)) if pending == generation) {
            self.handshake = None;
        }
    }

    /// Run one input through the state machine and carry out its effects.
    fn apply(&mut self, input: Input, mut link: Option<BrokerLink>) {
        trace!(?input, "Session input");
        let previous = self.state.status;
        let (state, effects) = transition(self.state.clone(), input);
        self.state = state;

        for effect in effects {
            self.execute(effect, &mut link);
        }
        if let Some(stale) = link {
            discard_link(stale);
        }

        if previous != self.state.status {
            info!(
                from = %previous,
                to = %self.state.status,
                generation = self.state.generation,
                attempt = self.state.reconnect.attempt_count,
                "Connection status changed"
            );
        }
        self.publish();
    }

    fn execute(&mut self, effect: Effect, link: &mut Option<BrokerLink>) {
        match effect {
            Effect::OpenTransport { generation } => self.open_transport(generation),
            Effect::StartLink { generation } => {
                if let Some(link) = link.take() {
                    self.link = Some(ActiveLink::spawn(
                        generation,
                        link,
                        self.dispatcher.clone(),
                        self.lost_tx.clone(),
                    ));
                }
            }
            Effect::CloseTransport => self.close_transport(),
            Effect::ScheduleRetry {
                generation,
                attempt,
                delay,
            } => self.schedule_retry(generation, attempt, delay),
            Effect::CancelRetry => self.cancel_retry(),
            Effect::Notify(notice) => self.notify(notice),
        }
    }

    fn open_transport(&mut self, generation: u64) {
        if let Some((_, previous)) = self.handshake.take() {
            previous.abort();
        }
        info!(
            generation,
            attempt = self.state.reconnect.attempt_count,
            endpoint = ?self.transport.endpoint(),
            "Connecting to broker"
        );

        let transport = self.transport.clone();
        let internal_tx = self.internal_tx.clone();
        let timeout = self.connect_timeout;
        let task = tokio::spawn(async move {
            let outcome = match tokio::time::timeout(timeout, transport.connect()).await {
                Ok(Ok(link)) => Internal::HandshakeSucceeded { generation, link },
                Ok(Err(error)) => Internal::HandshakeFailed { generation, error },
                Err(_) => Internal::HandshakeFailed {
                    generation,
                    error: TransportError::ConnectionTimeout {
                        operation: "broker handshake".to_string(),
                        timeout,
                    },
                },
            };
            // A closed actor drops the link with the unsent message
            let _ = internal_tx.send(outcome);
        });
        self.handshake = Some((generation, task));
    }

    fn close_transport(&mut self) {
        if let Some((generation, handshake)) = self.handshake.take() {
            debug!(generation, "Aborting pending handshake");
            handshake.abort();
        }
        if let Some(link) = self.link.take() {
            self.closing = Some(link.close());
        }
    }

    fn schedule_retry(&mut self, generation: u64, attempt: u32, delay: Duration) {
        self.cancel_retry();
        warn!(
            generation,
            attempt,
            max_attempts = self.state.reconnect.policy.max_attempts,
            delay_ms = delay.as_millis() as u64,
            "Scheduling reconnect"
        );

        let internal_tx = self.internal_tx.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = internal_tx.send(Internal::RetryTimerFired { generation });
        });
        self.retry = Some((generation, task));
    }

    fn cancel_retry(&mut self) {
        if let Some((generation, timer)) = self.retry.take() {
            debug!(generation, "Cancelling pending reconnect");
            timer.abort();
        }
    }

    fn notify(&self, notice: Notice) {
        let (message, toast) = match notice {
            Notice::Active => (ACTIVE_NOTICE, Toast::active_notice()),
            Notice::Exhausted => {
                error!(
                    max_attempts = self.state.reconnect.policy.max_attempts,
                    "Reconnect attempts exhausted, giving up until reactivated"
                );
                (EXHAUSTED_NOTICE, Toast::exhausted_notice())
            }
        };
        if self.notices {
            self.dispatcher
                .sink()
                .display(message, toast.style, toast.duration);
        }
    }

    fn publish(&self) {
        let next = self.state.snapshot();
        self.snapshot_tx.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            true
        });
    }
}

/// Close a connection whose attempt was superseded before it completed.
fn discard_link(mut link: BrokerLink) {
    debug!("Closing connection from a superseded attempt");
    tokio::spawn(async move {
        if let Err(error) = link.connection.close().await {
            debug!(error = %error, "Error while closing superseded connection");
        }
    });
}
