//! Notification fan-out.
//!
//! Every decoded event goes to its topic channel, then to the global channel,
//! then to the display sink. Channels are `tokio::sync::broadcast`, so slow
//! consumers lag instead of holding up delivery, and a channel without
//! receivers simply drops the event.

use std::collections::HashSet;
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::{Stream, StreamExt as _};
use tracing::{debug, trace, warn};

use crate::display::{DisplaySink, Toast};
use crate::error::DecodeError;
use crate::event::{NotificationEvent, NotificationKind};
use crate::topic::Topic;

/// A filtered stream of notifications.
pub type NotificationStream = Pin<Box<dyn Stream<Item = NotificationEvent> + Send>>;

/// Counters describing what happened to inbound frames.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchStats {
    /// Events decoded and published.
    pub delivered: u64,
    /// Frames dropped because the body did not decode.
    pub dropped_malformed: u64,
    /// Frames dropped because no topic matched their subscription.
    pub unroutable: u64,
}

#[derive(Debug, Default)]
struct AtomicDispatchStats {
    delivered: AtomicU64,
    dropped_malformed: AtomicU64,
    unroutable: AtomicU64,
}

impl AtomicDispatchStats {
    fn snapshot(&self) -> DispatchStats {
        DispatchStats {
            delivered: self.delivered.load(Ordering::Relaxed),
            dropped_malformed: self.dropped_malformed.load(Ordering::Relaxed),
            unroutable: self.unroutable.load(Ordering::Relaxed),
        }
    }
}

/// Decodes frames and republishes them to consumers.
pub struct NotificationDispatcher {
    topics: [broadcast::Sender<NotificationEvent>; 4],
    global: broadcast::Sender<NotificationEvent>,
    sink: Arc<dyn DisplaySink>,
    stats: AtomicDispatchStats,
}

impl fmt::Debug for NotificationDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationDispatcher")
            .field("sink", &self.sink)
            .field("stats", &self.stats.snapshot())
            .finish_non_exhaustive()
    }
}

impl NotificationDispatcher {
    /// Create a dispatcher whose channels each buffer `capacity` events.
    pub fn new(capacity: usize, sink: Arc<dyn DisplaySink>) -> Self {
        let capacity = capacity.max(1);
        Self {
            topics: std::array::from_fn(|_| broadcast::channel(capacity).0),
            global: broadcast::channel(capacity).0,
            sink,
            stats: AtomicDispatchStats::default(),
        }
    }

    /// Receive events published on `topic`.
    pub fn subscribe(&self, topic: Topic) -> broadcast::Receiver<NotificationEvent> {
        self.topics[topic.index()].subscribe()
    }

    /// Receive every event.
    pub fn subscribe_all(&self) -> broadcast::Receiver<NotificationEvent> {
        self.global.subscribe()
    }

    /// Events whose kind is one of `kinds`.
    pub fn notifications_of(
        &self,
        kinds: impl IntoIterator<Item = NotificationKind>,
    ) -> NotificationStream {
        let kinds: HashSet<NotificationKind> = kinds.into_iter().collect();
        self.filtered(move |event| kinds.contains(&event.kind))
    }

    /// Artist create/update/delete events.
    pub fn artist_changes(&self) -> NotificationStream {
        self.filtered(|event| event.kind.is_artist())
    }

    /// Album create/update/delete events.
    pub fn album_changes(&self) -> NotificationStream {
        self.filtered(|event| event.kind.is_album())
    }

    /// Sync started/completed/error events.
    pub fn sync_events(&self) -> NotificationStream {
        self.filtered(|event| event.kind.is_sync())
    }

    fn filtered<F>(&self, predicate: F) -> NotificationStream
    where
        F: Fn(&NotificationEvent) -> bool + Send + 'static,
    {
        let stream = BroadcastStream::new(self.global.subscribe()).filter_map(move |item| match item {
            Ok(event) if predicate(&event) => Some(event),
            Ok(_) => None,
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                warn!(skipped, "Filtered notification stream lagged");
                None
            }
        });
        Box::pin(stream)
    }

    /// Decode `body` received on `topic` and publish it.
    ///
    /// A body that fails to decode is logged and dropped; nothing is published
    /// and the session is unaffected.
    ///
    /// # Errors
    ///
    /// Returns the [`DecodeError`] for a dropped frame.
    pub fn dispatch(&self, topic: Topic, body: &str) -> Result<(), DecodeError> {
        match NotificationEvent::decode(body) {
            Ok(event) => {
                self.publish(topic, event);
                Ok(())
            }
            Err(error) => {
                self.stats.dropped_malformed.fetch_add(1, Ordering::Relaxed);
                warn!(%topic, error = %error, "Dropping malformed notification");
                Err(error)
            }
        }
    }

    /// Publish an already decoded event.
    pub fn publish(&self, topic: Topic, event: NotificationEvent) {
        let kind = event.kind;
        if kind.home_topic() != topic {
            debug!(%topic, ?kind, "Notification arrived outside its usual topic");
        }

        let topic_receivers = self.topics[topic.index()].send(event.clone()).unwrap_or(0);
        let message = event.message.clone();
        let global_receivers = self.global.send(event).unwrap_or(0);
        trace!(%topic, ?kind, topic_receivers, global_receivers, "Notification published");

        self.stats.delivered.fetch_add(1, Ordering::Relaxed);
        let toast = Toast::for_kind(kind);
        self.sink.display(&message, toast.style, toast.duration);
    }

    /// Count a frame that could not be matched to a topic.
    pub(crate) fn record_unroutable(&self) {
        self.stats.unroutable.fetch_add(1, Ordering::Relaxed);
    }

    /// Current counters.
    pub fn stats(&self) -> DispatchStats {
        self.stats.snapshot()
    }

    /// The sink this dispatcher displays through.
    pub fn sink(&self) -> &Arc<dyn DisplaySink> {
        &self.sink
    }
}
