//! Display side effects: toast styles and the sink boundary.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::event::NotificationKind;

/// Text of the notice shown after a successful connection.
pub const ACTIVE_NOTICE: &str = "Realtime notifications enabled";
/// Text of the notice shown once the reconnect budget is spent.
pub const EXHAUSTED_NOTICE: &str = "Could not connect to realtime notifications";

/// Visual style of a toast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToastStyle {
    /// Positive outcome.
    Success,
    /// Neutral information.
    Info,
    /// Destructive change.
    Warning,
    /// Failure.
    Error,
}

impl fmt::Display for ToastStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Success => "success",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        })
    }
}

/// Style and duration override for one toast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Toast {
    /// Style.
    pub style: ToastStyle,
    /// `None` keeps the sink's default duration.
    pub duration: Option<Duration>,
}

impl Toast {
    const fn styled(style: ToastStyle) -> Self {
        Self {
            style,
            duration: None,
        }
    }

    const fn timed(style: ToastStyle, millis: u64) -> Self {
        Self {
            style,
            duration: Some(Duration::from_millis(millis)),
        }
    }

    /// Toast for a notification of `kind`.
    pub const fn for_kind(kind: NotificationKind) -> Self {
        match kind {
            NotificationKind::ArtistCreated | NotificationKind::AlbumCreated => {
                Self::styled(ToastStyle::Success)
            }
            NotificationKind::ArtistUpdated | NotificationKind::AlbumUpdated => {
                Self::styled(ToastStyle::Info)
            }
            NotificationKind::ArtistDeleted | NotificationKind::AlbumDeleted => {
                Self::styled(ToastStyle::Warning)
            }
            NotificationKind::SyncStarted => Self::timed(ToastStyle::Info, 2000),
            NotificationKind::SyncCompleted => Self::timed(ToastStyle::Success, 5000),
            NotificationKind::SyncError => Self::styled(ToastStyle::Error),
            NotificationKind::System => Self::styled(ToastStyle::Info),
        }
    }

    /// Toast for the "notifications active" notice.
    pub const fn active_notice() -> Self {
        Self::timed(ToastStyle::Info, 2000)
    }

    /// Toast for the exhausted-budget notice. Shown without a duration override.
    pub const fn exhausted_notice() -> Self {
        Self::styled(ToastStyle::Error)
    }
}

/// Receives user-visible notices.
///
/// Called from the dispatcher and the session actor, so implementations must
/// return quickly and never block on I/O.
pub trait DisplaySink: Send + Sync + fmt::Debug {
    /// Show `message` with `style`. `duration` overrides the sink's default.
    fn display(&self, message: &str, style: ToastStyle, duration: Option<Duration>);
}

/// Sink that writes notices to the `tracing` log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DisplaySink for TracingSink {
    fn display(&self, message: &str, style: ToastStyle, duration: Option<Duration>) {
        let duration_ms = duration.map(|d| d.as_millis() as u64);
        match style {
            ToastStyle::Error => error!(%style, duration_ms, "{message}"),
            ToastStyle::Warning => warn!(%style, duration_ms, "{message}"),
            ToastStyle::Success | ToastStyle::Info => info!(%style, duration_ms, "{message}"),
        }
    }
}

/// Sink that drops every notice.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl DisplaySink for NullSink {
    fn display(&self, _message: &str, _style: ToastStyle, _duration: Option<Duration>) {}
}
