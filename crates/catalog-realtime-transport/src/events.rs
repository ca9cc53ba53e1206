//! Transport event types.

use tokio::sync::mpsc;

use crate::error::TransportError;
use crate::frame::StompFrame;

/// A MESSAGE frame delivered on one of the client's subscriptions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// The `subscription` header, matching the id sent in SUBSCRIBE.
    pub subscription: Option<String>,
    /// The `destination` header.
    pub destination: Option<String>,
    /// The broker-assigned `message-id` header.
    pub message_id: Option<String>,
    /// The frame body, UTF-8 text.
    pub body: String,
}

impl InboundMessage {
    /// Extracts routing headers and body from a MESSAGE frame.
    pub fn from_frame(frame: StompFrame) -> Self {
        let subscription = frame.get("subscription").map(str::to_string);
        let destination = frame.get("destination").map(str::to_string);
        let message_id = frame.get("message-id").map(str::to_string);
        Self {
            subscription,
            destination,
            message_id,
            body: frame.body,
        }
    }
}

/// Represents events that occur on an established broker connection.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// A message arrived on a subscription.
    Message(InboundMessage),

    /// The broker acknowledged a frame that carried a `receipt` header.
    Receipt {
        /// The `receipt-id` header.
        receipt_id: String,
    },

    /// The broker sent an ERROR frame. It closes the connection right after.
    BrokerError {
        /// The `message` header.
        message: String,
        /// The frame body, often a longer description.
        details: String,
    },

    /// The connection is gone. No further events follow.
    Disconnected {
        /// The error that ended the connection, if any.
        error: Option<TransportError>,
    },
}

/// An emitter for delivering `TransportEvent`s to the connection's owner.
#[derive(Debug, Clone)]
pub struct TransportEventEmitter {
    sender: mpsc::Sender<TransportEvent>,
}

impl TransportEventEmitter {
    /// Creates a new event emitter and a corresponding receiver.
    #[must_use]
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<TransportEvent>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }

    /// Emits an event. Returns `false` once the receiver is gone.
    pub async fn emit(&self, event: TransportEvent) -> bool {
        self.sender.send(event).await.is_ok()
    }

    /// Emits a `Message` event.
    pub async fn emit_message(&self, message: InboundMessage) -> bool {
        self.emit(TransportEvent::Message(message)).await
    }

    /// Emits a `Disconnected` event.
    pub async fn emit_disconnected(&self, error: Option<TransportError>) -> bool {
        self.emit(TransportEvent::Disconnected { error }).await
    }

    /// Returns `true` when nobody listens anymore.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}
