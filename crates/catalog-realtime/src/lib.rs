//! # Catalog Realtime
//!
//! Realtime notification client for the catalog application. A
//! [`RealtimeSession`] keeps one STOMP connection to the catalog broker,
//! subscribes to the artist, album, sync and system topics, and republishes
//! every notification as a typed [`NotificationEvent`].
//!
//! ## Overview
//!
//! - **Session**: [`RealtimeSession`] (actor handle), [`SessionOptions`],
//!   [`SessionSnapshot`], [`ConnectionStatus`]
//! - **Lifecycle**: [`transition`], [`SessionState`], [`Input`], [`Effect`],
//!   [`ReconnectPolicy`]
//! - **Events**: [`NotificationEvent`], [`NotificationKind`], [`Topic`]
//! - **Fan-out**: [`NotificationDispatcher`], filter streams, [`DispatchStats`]
//! - **Side effects**: [`DisplaySink`], [`ToastStyle`]
//! - **Activation**: [`ActivationGate`]
//! - **Configuration**: [`RealtimeConfig`]
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use catalog_realtime::{ActivationGate, RealtimeConfig, RealtimeSession, Topic, TracingSink};
//!
//! let config = RealtimeConfig::from_file("realtime.toml")?;
//! let session = RealtimeSession::from_config(&config, Arc::new(TracingSink))?;
//! let mut albums = session.subscribe(Topic::Albums);
//!
//! let (logged_in, signal) = tokio::sync::watch::channel(true);
//! let _gate = ActivationGate::spawn(session.clone(), signal);
//!
//! while let Ok(event) = albums.recv().await {
//!     println!("{}: {}", event.kind.wire_name(), event.message);
//! }
//! ```

#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub,
    clippy::all
)]
#![deny(unsafe_code)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::must_use_candidate
)]

pub mod config;
pub mod dispatcher;
pub mod display;
pub mod error;
pub mod event;
pub mod gate;
pub mod machine;
pub mod reconnect;
pub mod session;
pub mod status;
pub mod subscriptions;
pub mod topic;

pub use config::{NoticeConfig, RealtimeConfig, RealtimeConfigBuilder, ReconnectConfig};
pub use dispatcher::{DispatchStats, NotificationDispatcher, NotificationStream};
pub use display::{DisplaySink, NullSink, Toast, ToastStyle, TracingSink};
pub use error::{ConfigError, DecodeError, RealtimeError, RealtimeResult};
pub use event::{
    AlbumSummary, ArtistSummary, NotificationEvent, NotificationKind, NotificationPayload,
    SyncCounters,
};
pub use gate::ActivationGate;
pub use machine::{Effect, Input, Notice, SessionState, transition};
pub use reconnect::{ReconnectDecision, ReconnectPolicy, ReconnectState};
pub use session::{RealtimeSession, SessionOptions};
pub use status::{ConnectionStatus, IndicatorColor, SessionSnapshot, StatusPresentation};
pub use subscriptions::{Subscription, SubscriptionSet};
pub use topic::Topic;

// Transport types callers need to plug in their own broker transport
pub use catalog_realtime_transport::{
    BrokerConnection, BrokerLink, BrokerTransport, HandshakeInfo, InboundMessage,
    TransportError, TransportEvent,
};
