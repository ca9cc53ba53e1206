//! Transport metrics types.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// A serializable snapshot of a transport's counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportMetrics {
    /// Total number of frames sent.
    pub frames_sent: u64,

    /// Total number of non-heart-beat frames received.
    pub frames_received: u64,

    /// Total number of bytes received in text messages.
    pub bytes_received: u64,

    /// Total number of heart-beats received.
    pub heartbeats_received: u64,

    /// Total number of successful handshakes.
    pub connections: u64,

    /// Total number of failed connection attempts.
    pub failed_connections: u64,
}

/// Lock-free counters shared between a transport and its connections.
#[derive(Debug, Default)]
pub struct AtomicMetrics {
    frames_sent: AtomicU64,
    frames_received: AtomicU64,
    bytes_received: AtomicU64,
    heartbeats_received: AtomicU64,
    connections: AtomicU64,
    failed_connections: AtomicU64,
}

impl AtomicMetrics {
    /// Creates a new `AtomicMetrics` instance with all counters initialized to zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a sent frame.
    pub fn record_frame_sent(&self) {
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a received text message and the frames it carried.
    pub fn record_received(&self, bytes: usize, frames: usize) {
        self.bytes_received
            .fetch_add(bytes as u64, Ordering::Relaxed);
        if frames == 0 {
            self.heartbeats_received.fetch_add(1, Ordering::Relaxed);
        } else {
            self.frames_received
                .fetch_add(frames as u64, Ordering::Relaxed);
        }
    }

    /// Records the outcome of a connection attempt.
    pub fn record_connection(&self, success: bool) {
        if success {
            self.connections.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed_connections.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Creates a serializable snapshot from the current atomic values.
    pub fn snapshot(&self) -> TransportMetrics {
        TransportMetrics {
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            frames_received: self.frames_received.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            heartbeats_received: self.heartbeats_received.load(Ordering::Relaxed),
            connections: self.connections.load(Ordering::Relaxed),
            failed_connections: self.failed_connections.load(Ordering::Relaxed),
        }
    }
}
