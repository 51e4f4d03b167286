//! Change Feed Types
//!
//! Messages delivered by a collection's change feed. Row changes arrive as
//! [`ChangeEvent`]s; connection housekeeping arrives as [`FeedStatus`].

use crate::identity::RecordId;
use crate::record::Record;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Row-level change pushed by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ChangeEvent {
    /// A row was inserted.
    Created {
        /// The new row
        record: Record,
    },

    /// A row was updated.
    Updated {
        /// The row after the update
        record: Record,
    },

    /// A row was deleted.
    Deleted {
        /// ID of the deleted row
        id: RecordId,
        /// The row before deletion, when the backend sends the full prior state
        old_record: Option<Record>,
    },
}

/// Discriminant of a [`ChangeEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeKind {
    Created,
    Updated,
    Deleted,
}

impl ChangeEvent {
    pub fn kind(&self) -> ChangeKind {
        match self {
            ChangeEvent::Created { .. } => ChangeKind::Created,
            ChangeEvent::Updated { .. } => ChangeKind::Updated,
            ChangeEvent::Deleted { .. } => ChangeKind::Deleted,
        }
    }

    /// Identifier of the affected row.
    pub fn record_id(&self) -> &RecordId {
        match self {
            ChangeEvent::Created { record } | ChangeEvent::Updated { record } => &record.id,
            ChangeEvent::Deleted { id, .. } => id,
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            ChangeKind::Created => "created",
            ChangeKind::Updated => "updated",
            ChangeKind::Deleted => "deleted",
        };
        write!(f, "{}", value)
    }
}

/// Connection state of a change feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum FeedStatus {
    /// The feed joined its channel and is delivering changes.
    Connected,

    /// The feed lost its connection and will try again.
    Disconnected {
        /// Why the connection ended
        reason: String,
    },

    /// The feed hit an error it could not attribute to a single change.
    Error {
        /// Human-readable description
        message: String,
    },

    /// The subscriber fell behind and changes were dropped.
    Lagged {
        /// Number of changes that were skipped
        skipped: u64,
    },
}

/// Item delivered by a subscription.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedMessage {
    Change(ChangeEvent),
    Status(FeedStatus),
}

impl From<ChangeEvent> for FeedMessage {
    fn from(event: ChangeEvent) -> Self {
        FeedMessage::Change(event)
    }
}

impl From<FeedStatus> for FeedMessage {
    fn from(status: FeedStatus) -> Self {
        FeedMessage::Status(status)
    }
}
