//! FieldOps Core - Record Types
//!
//! Data types shared by every FieldOps crate: records and their identity,
//! change-feed messages, the known dashboard collections, and the local
//! search/filter helpers that run over an in-memory list of records.

pub mod event;
pub mod identity;
pub mod query;
pub mod record;
pub mod table;

pub use event::{ChangeEvent, ChangeKind, FeedMessage, FeedStatus};
pub use identity::{parse_timestamp, RecordId, RecordIdParseError, Timestamp};
pub use query::{filter_records, matches_query, search_records};
pub use record::{strip_reserved, Fields, Record, RecordDecodeError, RESERVED_KEYS};
pub use table::{Table, TableParseError};

/// Column every collection is ordered by when loaded.
pub const ORDER_COLUMN: &str = "created_at";
