//! STOMP over a native WebSocket.
//!
//! [`WebSocketStompTransport`] performs the WebSocket upgrade and the STOMP
//! CONNECT/CONNECTED exchange, then hands out a [`WebSocketStompConnection`]
//! whose background tasks are:
//!
//! - a reader that is the single consumer of the socket, decoding frames and
//!   forwarding them as [`TransportEvent`]s;
//! - an optional keep-alive that writes heart-beat EOLs at the negotiated
//!   interval.
//!
//! Both tasks listen on a shared shutdown broadcast so that `close()` stops
//! them before the socket goes away.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt as _, StreamExt as _};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, broadcast};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, trace, warn};

use crate::config::{LimitsConfig, TransportConfig};
use crate::error::{TransportError, TransportResult, validate_frame_size};
use crate::events::{InboundMessage, TransportEvent, TransportEventEmitter};
use crate::frame::{StompCommand, StompFrame};
use crate::metrics::{AtomicMetrics, TransportMetrics};
use crate::traits::{BrokerConnection, BrokerLink, BrokerTransport, HandshakeInfo};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
/// WebSocket writer handle shared by the connection and its keep-alive task
pub type WebSocketWriter = Arc<Mutex<SplitSink<WsStream, Message>>>;
type WebSocketReader = SplitStream<WsStream>;

const DISCONNECT_RECEIPT: &str = "disconnect-0";

/// Silence tolerated on a heart-beating connection, in negotiated intervals.
const HEARTBEAT_GRACE_FACTOR: u32 = 2;

/// Broker transport speaking STOMP over `ws://` / `wss://`.
#[derive(Debug, Clone)]
pub struct WebSocketStompTransport {
    config: Arc<TransportConfig>,
    metrics: Arc<AtomicMetrics>,
}

impl WebSocketStompTransport {
    /// Create a transport for the configured endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::ConfigurationError`] when the endpoint is not
    /// a usable WebSocket URL.
    pub fn new(config: TransportConfig) -> TransportResult<Self> {
        config.endpoint_url()?;
        Ok(Self {
            config: Arc::new(config),
            metrics: Arc::new(AtomicMetrics::new()),
        })
    }

    /// The transport configuration.
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Snapshot of the counters shared by every connection of this transport.
    pub fn metrics(&self) -> TransportMetrics {
        self.metrics.snapshot()
    }

    async fn establish(&self) -> TransportResult<BrokerLink> {
        let url = self.config.endpoint_url()?;
        let host = self.config.virtual_host()?;

        debug!(endpoint = %url, "Opening WebSocket connection");
        let (stream, _response) = connect_async(url.as_str()).await.map_err(|e| {
            TransportError::ConnectionFailed(format!("WebSocket connection failed: {e}"))
        })?;
        let (mut writer, mut reader) = stream.split();

        let connect = StompFrame::connect(
            &host,
            &self.config.heartbeat.header_value(),
            &self.config.connect_headers,
        );
        writer
            .send(Message::text(connect.encode()))
            .await
            .map_err(|e| TransportError::SendFailed(format!("CONNECT: {e}")))?;
        self.metrics.record_frame_sent();

        let connected = await_connected(&mut reader, &self.config.limits).await?;
        let handshake = HandshakeInfo {
            version: connected.get("version").map(str::to_string),
            server: connected.get("server").map(str::to_string),
            session: connected.get("session").map(str::to_string),
        };
        let keep_alive = self
            .config
            .heartbeat
            .negotiate(connected.get("heart-beat"));
        let watchdog = self
            .config
            .heartbeat
            .negotiate_incoming(connected.get("heart-beat"))
            .map(|interval| interval * HEARTBEAT_GRACE_FACTOR);

        let writer: WebSocketWriter = Arc::new(Mutex::new(writer));
        let (emitter, events) = TransportEventEmitter::new(self.config.event_buffer);
        let (shutdown_tx, _) = broadcast::channel(1);

        let mut tasks = vec![spawn_reader_task(
            reader,
            emitter,
            shutdown_tx.subscribe(),
            watchdog,
            self.config.limits.clone(),
            self.metrics.clone(),
        )];
        if let Some(interval) = keep_alive {
            tasks.push(spawn_keep_alive_task(
                writer.clone(),
                interval,
                shutdown_tx.subscribe(),
                self.metrics.clone(),
            ));
        }

        info!(
            endpoint = %url,
            version = ?handshake.version,
            server = ?handshake.server,
            keep_alive_ms = keep_alive.map(|d| d.as_millis() as u64),
            watchdog_ms = watchdog.map(|d| d.as_millis() as u64),
            "STOMP session established"
        );

        Ok(BrokerLink {
            connection: Box::new(WebSocketStompConnection {
                writer,
                shutdown_tx,
                tasks,
                metrics: self.metrics.clone(),
                closed: false,
            }),
            events,
            handshake,
        })
    }
}

#[async_trait]
impl BrokerTransport for WebSocketStompTransport {
    async fn connect(&self) -> TransportResult<BrokerLink> {
        let timeout = self.config.connect_timeout;
        let result = match tokio::time::timeout(timeout, self.establish()).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::ConnectionTimeout {
                operation: "stomp handshake".to_string(),
                timeout,
            }),
        };
        self.metrics.record_connection(result.is_ok());
        result
    }

    fn endpoint(&self) -> Option<String> {
        Some(self.config.endpoint.clone())
    }
}

/// Reads until the broker answers the CONNECT frame.
async fn await_connected(
    reader: &mut WebSocketReader,
    limits: &LimitsConfig,
) -> TransportResult<StompFrame> {
    while let Some(message) = reader.next().await {
        let message = message.map_err(|e| {
            TransportError::ConnectionFailed(format!("socket error during handshake: {e}"))
        })?;
        let text = match message {
            Message::Text(text) => text,
            Message::Close(frame) => {
                return Err(TransportError::ConnectionFailed(format!(
                    "broker closed the socket during handshake: {}",
                    close_reason(frame.as_ref())
                )));
            }
            _ => continue,
        };
        validate_frame_size(text.len(), limits)?;

        if let Some(frame) = StompFrame::decode_all(text.as_str())?.into_iter().next() {
            return match frame.command {
                StompCommand::Connected => Ok(frame),
                StompCommand::Error => {
                    let message = frame.get("message").map(str::to_string);
                    Err(TransportError::HandshakeRejected(
                        message.unwrap_or(frame.body),
                    ))
                }
                other => Err(TransportError::ProtocolError(format!(
                    "expected CONNECTED, got {other}"
                ))),
            };
        }
        // heart-beat only, keep waiting
    }
    Err(TransportError::ConnectionFailed(
        "stream ended during handshake".to_string(),
    ))
}

fn close_reason(frame: Option<&CloseFrame>) -> String {
    match frame {
        Some(frame) => format!("{} {}", u16::from(frame.code), frame.reason.as_str()),
        None => "no close frame".to_string(),
    }
}

/// Spawn the single consumer of the socket.
///
/// Ends with exactly one `Disconnected` event unless stopped through the
/// shutdown broadcast, in which case it exits silently. With a `watchdog`,
/// a socket that stays silent that long counts as lost.
fn spawn_reader_task(
    mut reader: WebSocketReader,
    emitter: TransportEventEmitter,
    mut shutdown_rx: broadcast::Receiver<()>,
    watchdog: Option<Duration>,
    limits: LimitsConfig,
    metrics: Arc<AtomicMetrics>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        debug!("Reader task started");

        let mut last_seen = Instant::now();
        let error = loop {
            let deadline = watchdog.map(|limit| last_seen + limit);
            let silence = async move {
                match deadline {
                    Some(deadline) => tokio::time::sleep_until(deadline).await,
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                _ = shutdown_rx.recv() => {
                    debug!("Reader task received shutdown signal");
                    return;
                }

                () = silence => {
                    warn!(
                        watchdog_ms = watchdog.map(|d| d.as_millis() as u64),
                        "No heart-beat from broker"
                    );
                    break TransportError::ConnectionLost("heart-beat timeout".to_string());
                }

                message = reader.next() => match message {
                    Some(Ok(Message::Text(text))) => {
                        last_seen = Instant::now();
                        if let Err(e) = validate_frame_size(text.len(), &limits) {
                            warn!(error = %e, "Dropping oversized WebSocket message");
                            continue;
                        }
                        match StompFrame::decode_all(text.as_str()) {
                            Ok(frames) => {
                                metrics.record_received(text.len(), frames.len());
                                for frame in frames {
                                    if !deliver(&emitter, frame).await {
                                        debug!("Event receiver dropped, stopping reader task");
                                        return;
                                    }
                                }
                            }
                            Err(e) => warn!(error = %e, "Dropping undecodable STOMP message"),
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        break TransportError::ConnectionLost(format!(
                            "broker closed the socket: {}",
                            close_reason(frame.as_ref())
                        ));
                    }
                    Some(Ok(_)) => last_seen = Instant::now(),
                    Some(Err(e)) => break TransportError::from(e),
                    None => break TransportError::ConnectionLost("stream ended".to_string()),
                }
            }
        };

        debug!(error = %error, "Reader task observed disconnect");
        emitter.emit_disconnected(Some(error)).await;
    })
}

async fn deliver(emitter: &TransportEventEmitter, frame: StompFrame) -> bool {
    match frame.command {
        StompCommand::Message => {
            emitter
                .emit_message(InboundMessage::from_frame(frame))
                .await
        }
        StompCommand::Receipt => {
            let receipt_id = frame.get("receipt-id").unwrap_or_default().to_string();
            emitter.emit(TransportEvent::Receipt { receipt_id }).await
        }
        StompCommand::Error => {
            let message = frame.get("message").unwrap_or("broker error").to_string();
            emitter
                .emit(TransportEvent::BrokerError {
                    message,
                    details: frame.body,
                })
                .await
        }
        other => {
            trace!(command = %other, "Ignoring unexpected frame");
            true
        }
    }
}

/// Spawn the heart-beat writer.
fn spawn_keep_alive_task(
    writer: WebSocketWriter,
    interval: Duration,
    mut shutdown_rx: broadcast::Receiver<()>,
    metrics: Arc<AtomicMetrics>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    debug!("Keep-alive task received shutdown signal");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = writer.lock().await.send(Message::text("\n")).await {
                        // The reader observes the broken socket and reports it
                        debug!(error = %e, "Heart-beat send failed");
                        break;
                    }
                    metrics.record_frame_sent();
                }
            }
        }
    })
}

/// Control half of an established STOMP-over-WebSocket session.
#[derive(Debug)]
pub struct WebSocketStompConnection {
    writer: WebSocketWriter,
    shutdown_tx: broadcast::Sender<()>,
    tasks: Vec<JoinHandle<()>>,
    metrics: Arc<AtomicMetrics>,
    closed: bool,
}

impl WebSocketStompConnection {
    async fn send_frame(&self, frame: StompFrame) -> TransportResult<()> {
        self.writer
            .lock()
            .await
            .send(Message::text(frame.encode()))
            .await
            .map_err(|e| TransportError::SendFailed(format!("{}: {e}", frame.command)))?;
        self.metrics.record_frame_sent();
        Ok(())
    }
}

#[async_trait]
impl BrokerConnection for WebSocketStompConnection {
    async fn subscribe(
        &mut self,
        subscription_id: &str,
        destination: &str,
    ) -> TransportResult<()> {
        if self.closed {
            return Err(TransportError::AlreadyClosed);
        }
        self.send_frame(StompFrame::subscribe(subscription_id, destination))
            .await
    }

    async fn close(&mut self) -> TransportResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let _ = self.shutdown_tx.send(());
        let result = self
            .send_frame(StompFrame::disconnect(DISCONNECT_RECEIPT))
            .await;
        // Close the socket even when DISCONNECT could not be written.
        if let Err(e) = self.writer.lock().await.close().await {
            trace!(error = %e, "WebSocket close after DISCONNECT failed");
        }
        for task in self.tasks.drain(..) {
            task.abort();
        }
        result
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Drop for WebSocketStompConnection {
    fn drop(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}
