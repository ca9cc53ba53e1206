//! Typed notification events and their JSON decoding.
//!
//! Decoding happens in two steps. The body is first read into a loose wire
//! shape with an untyped payload, then the payload is interpreted according
//! to the notification kind. A payload that does not fit its kind fails the
//! whole frame.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DecodeError;
use crate::topic::Topic;

/// The ten notification kinds published by the catalog backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NotificationKind {
    /// An artist was created.
    #[serde(rename = "ARTISTA_CREATED")]
    ArtistCreated,
    /// An artist was updated.
    #[serde(rename = "ARTISTA_UPDATED")]
    ArtistUpdated,
    /// An artist was deleted.
    #[serde(rename = "ARTISTA_DELETED")]
    ArtistDeleted,
    /// An album was created.
    #[serde(rename = "ALBUM_CREATED")]
    AlbumCreated,
    /// An album was updated.
    #[serde(rename = "ALBUM_UPDATED")]
    AlbumUpdated,
    /// An album was deleted.
    #[serde(rename = "ALBUM_DELETED")]
    AlbumDeleted,
    /// A catalog synchronisation started.
    #[serde(rename = "SYNC_STARTED")]
    SyncStarted,
    /// A catalog synchronisation finished.
    #[serde(rename = "SYNC_COMPLETED")]
    SyncCompleted,
    /// A catalog synchronisation failed.
    #[serde(rename = "SYNC_ERROR")]
    SyncError,
    /// Free-form system message.
    #[serde(rename = "SYSTEM")]
    System,
}

impl NotificationKind {
    /// All kinds.
    pub const ALL: [Self; 10] = [
        Self::ArtistCreated,
        Self::ArtistUpdated,
        Self::ArtistDeleted,
        Self::AlbumCreated,
        Self::AlbumUpdated,
        Self::AlbumDeleted,
        Self::SyncStarted,
        Self::SyncCompleted,
        Self::SyncError,
        Self::System,
    ];

    /// Wire spelling.
    pub const fn wire_name(self) -> &'static str {
        match self {
            Self::ArtistCreated => "ARTISTA_CREATED",
            Self::ArtistUpdated => "ARTISTA_UPDATED",
            Self::ArtistDeleted => "ARTISTA_DELETED",
            Self::AlbumCreated => "ALBUM_CREATED",
            Self::AlbumUpdated => "ALBUM_UPDATED",
            Self::AlbumDeleted => "ALBUM_DELETED",
            Self::SyncStarted => "SYNC_STARTED",
            Self::SyncCompleted => "SYNC_COMPLETED",
            Self::SyncError => "SYNC_ERROR",
            Self::System => "SYSTEM",
        }
    }

    /// `true` for the three artist kinds.
    pub const fn is_artist(self) -> bool {
        matches!(
            self,
            Self::ArtistCreated | Self::ArtistUpdated | Self::ArtistDeleted
        )
    }

    /// `true` for the three album kinds.
    pub const fn is_album(self) -> bool {
        matches!(
            self,
            Self::AlbumCreated | Self::AlbumUpdated | Self::AlbumDeleted
        )
    }

    /// `true` for the three sync kinds.
    pub const fn is_sync(self) -> bool {
        matches!(self, Self::SyncStarted | Self::SyncCompleted | Self::SyncError)
    }

    /// The topic the backend publishes this kind on.
    pub const fn home_topic(self) -> Topic {
        if self.is_artist() {
            Topic::Artists
        } else if self.is_album() {
            Topic::Albums
        } else if self.is_sync() {
            Topic::Sync
        } else {
            Topic::System
        }
    }
}

/// Artist payload, `{id, nome}` on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtistSummary {
    /// Artist id.
    pub id: i64,
    /// Artist name.
    #[serde(rename = "nome", default)]
    pub name: Option<String>,
}

/// Album payload, `{id, nome, artistaNome}` on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlbumSummary {
    /// Album id.
    pub id: i64,
    /// Album title.
    #[serde(rename = "nome", default)]
    pub name: Option<String>,
    /// Name of the album's artist.
    #[serde(rename = "artistaNome", default)]
    pub artist_name: Option<String>,
}

/// Sync payload, `{total, novos, atualizados}` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncCounters {
    /// Records examined.
    pub total: u64,
    /// Records created.
    #[serde(rename = "novos")]
    pub created: u64,
    /// Records updated.
    #[serde(rename = "atualizados")]
    pub updated: u64,
}

/// Typed payload, selected by the notification kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum NotificationPayload {
    /// Carried by artist kinds.
    Artist(ArtistSummary),
    /// Carried by album kinds.
    Album(AlbumSummary),
    /// Carried by sync kinds.
    Sync(SyncCounters),
}

/// A decoded notification. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationEvent {
    /// Notification kind.
    pub kind: NotificationKind,
    /// Human readable text, shown as-is by display sinks.
    pub message: String,
    /// Typed payload, if the frame carried one.
    pub payload: Option<NotificationPayload>,
    /// Publication time. Offset-less timestamps are read as UTC.
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct WireNotification {
    #[serde(rename = "type")]
    kind: NotificationKind,
    message: String,
    #[serde(default)]
    payload: Option<serde_json::Value>,
    timestamp: String,
}

impl NotificationEvent {
    /// Decodes a MESSAGE body.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError`] when the body is not a notification object, the
    /// kind is unknown, the payload does not match the kind, or the timestamp
    /// is not ISO-8601.
    pub fn decode(body: &str) -> Result<Self, DecodeError> {
        let wire: WireNotification = serde_json::from_str(body)?;
        let payload = decode_payload(wire.kind, wire.payload)?;
        let timestamp = parse_timestamp(&wire.timestamp)?;
        Ok(Self {
            kind: wire.kind,
            message: wire.message,
            payload,
            timestamp,
        })
    }

    /// The artist payload, if any.
    pub fn artist(&self) -> Option<&ArtistSummary> {
        match &self.payload {
            Some(NotificationPayload::Artist(artist)) => Some(artist),
            _ => None,
        }
    }

    /// The album payload, if any.
    pub fn album(&self) -> Option<&AlbumSummary> {
        match &self.payload {
            Some(NotificationPayload::Album(album)) => Some(album),
            _ => None,
        }
    }

    /// The sync counters, if any.
    pub fn sync_counters(&self) -> Option<&SyncCounters> {
        match &self.payload {
            Some(NotificationPayload::Sync(counters)) => Some(counters),
            _ => None,
        }
    }
}

fn decode_payload(
    kind: NotificationKind,
    payload: Option<serde_json::Value>,
) -> Result<Option<NotificationPayload>, DecodeError> {
    let value = match payload {
        None | Some(serde_json::Value::Null) => return Ok(None),
        Some(value) => value,
    };
    let shape_error = |source: serde_json::Error| DecodeError::PayloadShape {
        kind: kind.wire_name(),
        source,
    };

    let payload = if kind.is_artist() {
        NotificationPayload::Artist(serde_json::from_value(value).map_err(shape_error)?)
    } else if kind.is_album() {
        NotificationPayload::Album(serde_json::from_value(value).map_err(shape_error)?)
    } else if kind.is_sync() {
        NotificationPayload::Sync(serde_json::from_value(value).map_err(shape_error)?)
    } else {
        // SYSTEM carries its information in `message`
        return Ok(None);
    };
    Ok(Some(payload))
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, DecodeError> {
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(value) {
        return Ok(timestamp.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|_| DecodeError::Timestamp(value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_decode_album_created() {
        let event = NotificationEvent::decode(
            r#"{"type":"ALBUM_CREATED","message":"Novo álbum: X",
                "payload":{"id":7,"nome":"X","artistaNome":"Y"},
                "timestamp":"2025-03-01T12:30:00.123456"}"#,
        )
        .unwrap();

        assert_eq!(event.kind, NotificationKind::AlbumCreated);
        assert_eq!(event.message, "Novo álbum: X");
        assert_eq!(
            event.album(),
            Some(&AlbumSummary {
                id: 7,
                name: Some("X".to_string()),
                artist_name: Some("Y".to_string()),
            })
        );
        assert_eq!(event.timestamp.year(), 2025);
        assert_eq!(event.timestamp.minute(), 30);
    }

    #[test]
    fn test_decode_sync_and_system() {
        let sync = NotificationEvent::decode(
            r#"{"type":"SYNC_COMPLETED","message":"done",
                "payload":{"total":10,"novos":3,"atualizados":2},
                "timestamp":"2025-03-01T12:30:00Z"}"#,
        )
        .unwrap();
        assert_eq!(
            sync.sync_counters(),
            Some(&SyncCounters {
                total: 10,
                created: 3,
                updated: 2
            })
        );

        let started = NotificationEvent::decode(
            r#"{"type":"SYNC_STARTED","message":"go","payload":null,
                "timestamp":"2025-03-01T12:30:00+02:00"}"#,
        )
        .unwrap();
        assert_eq!(started.payload, None);
        assert_eq!(started.timestamp.hour(), 10);

        let system = NotificationEvent::decode(
            r#"{"type":"SYSTEM","message":"maintenance at 22h",
                "timestamp":"2025-03-01T12:30:00"}"#,
        )
        .unwrap();
        assert_eq!(system.kind, NotificationKind::System);
        assert_eq!(system.payload, None);
    }

    #[test]
    fn test_decode_artist_with_null_name() {
        let event = NotificationEvent::decode(
            r#"{"type":"ARTISTA_DELETED","message":"removed",
                "payload":{"id":3,"nome":null},"timestamp":"2025-03-01T12:30:00"}"#,
        )
        .unwrap();
        assert_eq!(event.artist(), Some(&ArtistSummary { id: 3, name: None }));
    }

    #[test]
    fn test_decode_rejects_malformed_bodies() {
        assert!(matches!(
            NotificationEvent::decode("not json"),
            Err(DecodeError::Json(_))
        ));
        assert!(matches!(
            NotificationEvent::decode(
                r#"{"type":"UNKNOWN","message":"m","timestamp":"2025-03-01T12:30:00"}"#
            ),
            Err(DecodeError::Json(_))
        ));
        assert!(matches!(
            NotificationEvent::decode(
                r#"{"type":"SYNC_COMPLETED","message":"m","payload":{"id":1},
                    "timestamp":"2025-03-01T12:30:00"}"#
            ),
            Err(DecodeError::PayloadShape { kind: "SYNC_COMPLETED", .. })
        ));
        assert!(matches!(
            NotificationEvent::decode(
                r#"{"type":"SYSTEM","message":"m","timestamp":"yesterday"}"#
            ),
            Err(DecodeError::Timestamp(_))
        ));
    }

    #[test]
    fn test_kind_classification() {
        assert_eq!(NotificationKind::ALL.iter().filter(|k| k.is_artist()).count(), 3);
        assert_eq!(NotificationKind::ALL.iter().filter(|k| k.is_album()).count(), 3);
        assert_eq!(NotificationKind::ALL.iter().filter(|k| k.is_sync()).count(), 3);
        assert_eq!(NotificationKind::AlbumDeleted.home_topic(), Topic::Albums);
        assert_eq!(NotificationKind::System.home_topic(), Topic::System);
        for kind in NotificationKind::ALL {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.wire_name()));
        }
    }
}
