//! Backend trait consumed by collection caches.
//!
//! A backend offers a query interface (fetch, insert, update, delete) and a
//! subscription interface (a per-collection change feed). Implementations
//! must be shareable across tasks; the application builds one at startup and
//! hands the same instance to every cache.

use crate::error::BackendResult;
use async_trait::async_trait;
use fieldops_core::{FeedMessage, Fields, Record, RecordId};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

#[async_trait]
pub trait Backend: Send + Sync {
    /// Fetch every row of `table`, newest `order_column` first.
    async fn fetch_all(&self, table: &str, order_column: &str) -> BackendResult<Vec<Record>>;

    /// Insert one row and return it as stored, with the generated id and timestamps.
    async fn insert(&self, table: &str, fields: &Fields) -> BackendResult<Record>;

    /// Apply `patch` to the row with `id` and return it as stored.
    ///
    /// A missing row is an error.
    async fn update(&self, table: &str, id: &RecordId, patch: &Fields) -> BackendResult<Record>;

    /// Delete the row with `id`. Deleting a row that is already gone succeeds.
    async fn delete(&self, table: &str, id: &RecordId) -> BackendResult<()>;

    /// Open a change feed for `table`.
    async fn subscribe(&self, table: &str) -> BackendResult<Subscription>;
}

/// Live change feed for one collection.
///
/// The feed is driven by a background task owned by the subscription.
/// Dropping the subscription, or calling [`Subscription::unsubscribe`],
/// stops that task and closes the channel.
#[derive(Debug)]
pub struct Subscription {
    table: String,
    receiver: mpsc::Receiver<FeedMessage>,
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    pub fn new(
        table: impl Into<String>,
        receiver: mpsc::Receiver<FeedMessage>,
        task: JoinHandle<()>,
    ) -> Self {
        Self {
            table: table.into(),
            receiver,
            task: Some(task),
        }
    }

    /// Subscription fed directly through a channel, with no background task.
    pub fn from_channel(table: impl Into<String>, receiver: mpsc::Receiver<FeedMessage>) -> Self {
        Self {
            table: table.into(),
            receiver,
            task: None,
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Wait for the next message. `None` once the feed has ended.
    pub async fn recv(&mut self) -> Option<FeedMessage> {
        self.receiver.recv().await
    }

    /// Next already-delivered message, without waiting.
    pub fn try_recv(&mut self) -> Option<FeedMessage> {
        self.receiver.try_recv().ok()
    }

    pub fn unsubscribe(self) {
        debug!(table = %self.table, "Unsubscribing from change feed");
        // Drop does the teardown.
    }

    fn shutdown(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.receiver.close();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.shutdown();
    }
}
