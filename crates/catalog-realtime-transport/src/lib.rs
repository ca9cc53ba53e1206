//! # Catalog Realtime Transport
//!
//! Broker transport abstractions for the catalog realtime notification client,
//! plus the STOMP-over-WebSocket adapter used in production.
//!
//! ## Overview
//!
//! This crate defines:
//! - **Traits**: [`BrokerTransport`], [`BrokerConnection`]
//! - **Types**: [`BrokerLink`], [`HandshakeInfo`], [`InboundMessage`], [`TransportEvent`]
//! - **Framing**: [`StompFrame`], [`StompCommand`]
//! - **Errors**: [`TransportError`], [`TransportResult`]
//! - **Config**: [`TransportConfig`], [`HeartbeatConfig`], [`LimitsConfig`]
//! - **Metrics**: [`TransportMetrics`], [`AtomicMetrics`]
//! - **Adapter**: [`WebSocketStompTransport`]
//!
//! ## Usage
//!
//! ```rust,ignore
//! use catalog_realtime_transport::{BrokerTransport, TransportConfig, WebSocketStompTransport};
//!
//! let transport = WebSocketStompTransport::new(TransportConfig::new("ws://localhost:8080/ws"))?;
//! let mut link = transport.connect().await?;
//! link.connection.subscribe("sub-0", "/topic/artistas").await?;
//! while let Some(event) = link.events.recv().await {
//!     // ...
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
#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::must_use_candidate
)]

mod config;
mod error;
mod events;
mod frame;
mod metrics;
mod traits;
mod websocket;

pub use config::{ACCEPT_VERSIONS, HeartbeatConfig, LimitsConfig, TransportConfig};
pub use error::{TransportError, TransportResult, validate_frame_size};
pub use events::{InboundMessage, TransportEvent, TransportEventEmitter};
pub use frame::{StompCommand, StompFrame};
pub use metrics::{AtomicMetrics, TransportMetrics};
pub use traits::{BrokerConnection, BrokerLink, BrokerTransport, HandshakeInfo};
pub use websocket::{WebSocketStompConnection, WebSocketStompTransport, WebSocketWriter};
