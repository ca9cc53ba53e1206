//! Per-connection subscriptions and frame routing.
//!
//! Each established connection is driven by one link task. The task
//! subscribes to every topic, then routes inbound MESSAGE frames to the
//! dispatcher until the connection drops or the session asks it to close.
//! Subscriptions live exactly as long as the task; nothing is unsubscribed
//! when a connection drops, the next connection simply subscribes again.

use std::sync::Arc;

use catalog_realtime_transport::{
    BrokerConnection, BrokerLink, InboundMessage, TransportError, TransportEvent,
};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::dispatcher::NotificationDispatcher;
use crate::topic::Topic;

/// A topic bound to the id it was subscribed under on one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    /// Subscribed topic.
    pub topic: Topic,
    /// SUBSCRIBE `id` header.
    pub id: String,
}

/// The subscriptions of one connection, in subscription order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionSet {
    subscriptions: Vec<Subscription>,
}

impl Default for SubscriptionSet {
    fn default() -> Self {
        Self::new()
    }
}

impl SubscriptionSet {
    /// Fresh set covering all topics: artists, albums, sync, system.
    pub fn new() -> Self {
        Self {
            subscriptions: Topic::ALL
                .into_iter()
                .map(|topic| Subscription {
                    topic,
                    id: topic.subscription_id(),
                })
                .collect(),
        }
    }

    /// Iterate in subscription order.
    pub fn iter(&self) -> impl Iterator<Item = &Subscription> {
        self.subscriptions.iter()
    }

    /// Resolve the topic of an inbound message.
    ///
    /// Matches on the `subscription` header and falls back to the
    /// `destination` header for brokers that omit it.
    pub fn route(&self, message: &InboundMessage) -> Option<Topic> {
        if let Some(id) = message.subscription.as_deref()
            && let Some(subscription) = self.subscriptions.iter().find(|s| s.id == id)
        {
            return Some(subscription.topic);
        }
        message
            .destination
            .as_deref()
            .and_then(Topic::from_destination)
    }
}

/// Reported to the session when a link stops on its own.
#[derive(Debug)]
pub(crate) struct LinkLost {
    pub(crate) generation: u64,
    pub(crate) error: Option<TransportError>,
}

/// Handle to a running link task.
#[derive(Debug)]
pub(crate) struct ActiveLink {
    close_tx: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl ActiveLink {
    /// Start driving `link`.
    pub(crate) fn spawn(
        generation: u64,
        link: BrokerLink,
        dispatcher: Arc<NotificationDispatcher>,
        lost_tx: mpsc::UnboundedSender<LinkLost>,
    ) -> Self {
        let (close_tx, close_rx) = oneshot::channel();
        let task = tokio::spawn(run_link(generation, link, dispatcher, lost_tx, close_rx));
        Self { close_tx, task }
    }

    /// Ask the task to close its connection.
    ///
    /// Returns the task handle, which completes once the connection is closed.
    pub(crate) fn close(self) -> JoinHandle<()> {
        // The task may already be gone after a lost connection
        let _ = self.close_tx.send(());
        self.task
    }
}

enum LinkEnd {
    Closed,
    Lost(Option<TransportError>),
}

async fn run_link(
    generation: u64,
    link: BrokerLink,
    dispatcher: Arc<NotificationDispatcher>,
    lost_tx: mpsc::UnboundedSender<LinkLost>,
    mut close_rx: oneshot::Receiver<()>,
) {
    let BrokerLink {
        mut connection,
        mut events,
        handshake,
    } = link;
    debug!(generation, session = ?handshake.session, "Link task started");

    let subscriptions = SubscriptionSet::new();
    let end = tokio::select! {
        _ = &mut close_rx => LinkEnd::Closed,
        lost = pump(generation, connection.as_mut(), &mut events, &subscriptions, &dispatcher) => {
            LinkEnd::Lost(lost)
        }
    };

    match end {
        LinkEnd::Closed => {
            debug!(generation, "Closing connection");
            if let Err(error) = connection.close().await {
                warn!(generation, error = %error, "Error while closing connection");
            }
        }
        LinkEnd::Lost(error) => {
            match &error {
                Some(error) => warn!(generation, error = %error, "Connection lost"),
                None => warn!(generation, "Connection lost"),
            }
            let _ = lost_tx.send(LinkLost { generation, error });
        }
    }
}

/// Subscribe, then route events until the connection ends.
async fn pump(
    generation: u64,
    connection: &mut dyn BrokerConnection,
    events: &mut mpsc::Receiver<TransportEvent>,
    subscriptions: &SubscriptionSet,
    dispatcher: &NotificationDispatcher,
) -> Option<TransportError> {
    for subscription in subscriptions.iter() {
        let topic = subscription.topic;
        if let Err(error) = connection
            .subscribe(&subscription.id, topic.destination())
            .await
        {
            warn!(generation, %topic, error = %error, "Subscribe failed");
            return Some(error);
        }
        debug!(generation, %topic, id = %subscription.id, "Subscribed");
    }
    info!(generation, topics = subscriptions.iter().count(), "Subscriptions established");

    while let Some(event) = events.recv().await {
        match event {
            TransportEvent::Message(message) => match subscriptions.route(&message) {
                Some(topic) => {
                    // Decode failures are logged and counted by the dispatcher
                    let _ = dispatcher.dispatch(topic, &message.body);
                }
                None => {
                    dispatcher.record_unroutable();
                    warn!(
                        generation,
                        subscription = ?message.subscription,
                        destination = ?message.destination,
                        "Dropping message for unknown subscription"
                    );
                }
            },
            TransportEvent::Receipt { receipt_id } => {
                trace!(generation, %receipt_id, "Receipt");
            }
            TransportEvent::BrokerError { message, details } => {
                warn!(generation, %message, %details, "Broker reported an error");
            }
            TransportEvent::Disconnected { error } => return error,
        }
    }
    Some(TransportError::ConnectionLost(
        "event stream closed".to_string(),
    ))
}
