//! Core transport traits.

use std::fmt;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::TransportResult;
use crate::events::TransportEvent;

/// Opens connections to a publish/subscribe broker.
///
/// One call to [`connect`](BrokerTransport::connect) performs the whole
/// handshake. Success hands back a [`BrokerLink`]; the caller becomes the sole
/// owner of the connection and of its event stream.
#[async_trait]
pub trait BrokerTransport: Send + Sync + fmt::Debug {
    /// Establishes a connection and completes the broker handshake.
    async fn connect(&self) -> TransportResult<BrokerLink>;

    /// Returns the endpoint address for this transport, if applicable.
    fn endpoint(&self) -> Option<String> {
        None
    }
}

/// Control half of an established broker connection.
#[async_trait]
pub trait BrokerConnection: Send + fmt::Debug {
    /// Sends a SUBSCRIBE for `destination` under `subscription_id`.
    async fn subscribe(&mut self, subscription_id: &str, destination: &str)
    -> TransportResult<()>;

    /// Closes the connection.
    ///
    /// Calling this on an already closed connection returns `Ok(())`. After
    /// `close` the event stream yields no further events.
    async fn close(&mut self) -> TransportResult<()>;

    /// Returns `true` once [`close`](BrokerConnection::close) ran.
    fn is_closed(&self) -> bool;
}

/// Details from the broker's CONNECTED frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HandshakeInfo {
    /// Negotiated protocol version.
    pub version: Option<String>,
    /// Broker `server` header.
    pub server: Option<String>,
    /// Broker `session` header.
    pub session: Option<String>,
}

/// An established connection: the control half plus its inbound event stream.
#[derive(Debug)]
pub struct BrokerLink {
    /// Control half (subscribe, close).
    pub connection: Box<dyn BrokerConnection>,
    /// Inbound frames and the terminal `Disconnected` event.
    pub events: mpsc::Receiver<TransportEvent>,
    /// Handshake details.
    pub handshake: HandshakeInfo,
}
