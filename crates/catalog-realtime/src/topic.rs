//! The fixed topic set and its wire destinations.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A broker topic the client subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Topic {
    /// Artist create/update/delete notifications.
    Artists,
    /// Album create/update/delete notifications.
    Albums,
    /// Catalog synchronisation progress.
    Sync,
    /// Broadcast system messages.
    System,
}

impl Topic {
    /// All topics in subscription order.
    pub const ALL: [Self; 4] = [Self::Artists, Self::Albums, Self::Sync, Self::System];

    /// Wire destination of the topic.
    pub const fn destination(self) -> &'static str {
        match self {
            Self::Artists => "/topic/artistas",
            Self::Albums => "/topic/albuns",
            Self::Sync => "/topic/sync",
            Self::System => "/topic/system",
        }
    }

    /// Short lowercase name, used in logs and CLI output.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Artists => "artists",
            Self::Albums => "albums",
            Self::Sync => "sync",
            Self::System => "system",
        }
    }

    /// Position in [`Topic::ALL`].
    pub const fn index(self) -> usize {
        match self {
            Self::Artists => 0,
            Self::Albums => 1,
            Self::Sync => 2,
            Self::System => 3,
        }
    }

    /// Subscription id sent in SUBSCRIBE. Ids are reused on every connection.
    pub fn subscription_id(self) -> String {
        format!("sub-{}", self.index())
    }

    /// Reverse of [`Topic::destination`].
    pub fn from_destination(destination: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|topic| topic.destination() == destination)
    }

    /// Reverse of [`Topic::subscription_id`].
    pub fn from_subscription_id(id: &str) -> Option<Self> {
        let index: usize = id.strip_prefix("sub-")?.parse().ok()?;
        Self::ALL.get(index).copied()
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
