//! FieldOps Cache - Realtime Collection Cache
//!
//! One [`CollectionCache`] per collection per mounted screen: a bulk load, a
//! change-feed subscription for the screen's lifetime, write-through
//! create/update/delete, and local search/filter. Failures never escape as
//! panics; they become the cache's error state and an error notification.

mod echo;

pub mod collection;
pub mod error;
pub mod notifications;

pub use collection::{CacheOptions, CollectionCache, DEFAULT_ECHO_WINDOW};
pub use error::{CacheError, CacheResult};
pub use notifications::{
    ChannelNotifier, Notification, NotificationAction, NotificationLevel, Notifier,
    RecordingNotifier, TracingNotifier,
};
