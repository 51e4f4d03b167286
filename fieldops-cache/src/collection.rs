//! Realtime collection cache.
//!
//! A [`CollectionCache`] holds the in-memory list of one collection's records
//! for as long as a screen is mounted. It is filled by one bulk load, kept
//! current by the collection's change feed, and written through by
//! create/update/delete calls that reconcile from the write response.
//!
//! The cache is a plain owned value. The owner interleaves writes with
//! [`CollectionCache::next_feed_message`] (or [`CollectionCache::drain_feed`])
//! in its own event loop, so no lock guards local state.

use crate::echo::PendingEchoes;
use crate::error::{CacheError, CacheResult};
use crate::notifications::{Notification, NotificationAction, NotificationLevel, Notifier};
use chrono::Utc;
use fieldops_client::{Backend, BackendError, Subscription};
use fieldops_core::{
    filter_records, search_records, strip_reserved, ChangeEvent, FeedMessage, FeedStatus, Fields,
    Record, RecordId, ORDER_COLUMN,
};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default time a locally created id waits for its `created` echo.
pub const DEFAULT_ECHO_WINDOW: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct CacheOptions {
    /// How long a locally created id suppresses a matching `created` event.
    pub echo_window: Duration,
    /// Send an `Info` notification for every remote change that altered state.
    pub announce_remote_changes: bool,
    /// Send a `Success` notification after each successful write.
    pub success_notifications: bool,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            echo_window: DEFAULT_ECHO_WINDOW,
            announce_remote_changes: false,
            success_notifications: true,
        }
    }
}

pub struct CollectionCache {
    table: String,
    backend: Arc<dyn Backend>,
    notifier: Arc<dyn Notifier>,
    options: CacheOptions,
    records: Vec<Record>,
    error: Option<CacheError>,
    loading: bool,
    live: bool,
    subscription: Option<Subscription>,
    echoes: PendingEchoes,
    torn_down: bool,
    needs_resync: bool,
    interrupted: bool,
}

impl CollectionCache {
    /// Build an empty cache without touching the backend.
    pub fn new(
        backend: Arc<dyn Backend>,
        table: impl Into<String>,
        notifier: Arc<dyn Notifier>,
        options: CacheOptions,
    ) -> Self {
        let echoes = PendingEchoes::new(options.echo_window);
        Self {
            table: table.into(),
            backend,
            notifier,
            options,
            records: Vec::new(),
            error: None,
            loading: false,
            live: false,
            subscription: None,
            echoes,
            torn_down: false,
            needs_resync: false,
            interrupted: false,
        }
    }

    /// Build a cache, load it and subscribe to its change feed.
    ///
    /// Neither a failed load nor a failed subscribe prevents mounting; both
    /// leave the error state set and notify, and the cache stays usable.
    pub async fn mount(
        backend: Arc<dyn Backend>,
        table: impl Into<String>,
        notifier: Arc<dyn Notifier>,
        options: CacheOptions,
    ) -> Self {
        let mut cache = Self::new(backend, table, notifier, options);
        // Subscribe first so changes landing during the load are not lost.
        let _ = cache.resubscribe().await;
        let _ = cache.load().await;
        cache
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: &RecordId) -> Option<&Record> {
        self.records.iter().find(|record| record.id == *id)
    }

    /// Error from the most recent failed operation, cleared by the next success.
    pub fn last_error(&self) -> Option<&CacheError> {
        self.error.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Whether the change feed is currently connected.
    pub fn is_live(&self) -> bool {
        self.live
    }

    pub fn is_mounted(&self) -> bool {
        !self.torn_down
    }

    /// Whether changes may have been missed since the last load.
    pub fn needs_resync(&self) -> bool {
        self.needs_resync
    }

    pub fn pending_echoes(&self) -> usize {
        self.echoes.len()
    }

    /// Records where any of `fields` contains `query`, ignoring case.
    pub fn search<S: AsRef<str>>(&self, query: &str, fields: &[S]) -> Vec<&Record> {
        search_records(&self.records, query, fields)
    }

    pub fn filter<F>(&self, predicate: F) -> Vec<&Record>
    where
        F: FnMut(&Record) -> bool,
    {
        filter_records(&self.records, predicate)
    }

    /// Replace local state with every record of the collection, newest first.
    pub async fn load(&mut self) -> CacheResult<()> {
        if !self.torn_down {
            self.loading = true;
        }
        let result = self.backend.fetch_all(&self.table, ORDER_COLUMN).await;
        if self.torn_down {
            return result.map(|_| ()).map_err(|err| self.load_error(err));
        }
        self.loading = false;

        match result {
            Ok(mut records) => {
                records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
                debug!(table = %self.table, count = records.len(), "Loaded collection");
                self.records = records;
                self.error = None;
                self.needs_resync = false;
                Ok(())
            }
            Err(err) => {
                let err = self.load_error(err);
                Err(self.fail(err, Some(NotificationAction::Retry)))
            }
        }
    }

    /// Reload after missed changes.
    pub async fn resync(&mut self) -> CacheResult<()> {
        info!(table = %self.table, "Resyncing collection");
        self.load().await
    }

    /// Open the change feed, replacing any existing subscription.
    pub async fn resubscribe(&mut self) -> CacheResult<()> {
        if self.torn_down {
            return Ok(());
        }
        if let Some(previous) = self.subscription.take() {
            previous.unsubscribe();
        }
        self.live = false;

        match self.backend.subscribe(&self.table).await {
            Ok(subscription) => {
                debug!(table = %self.table, "Subscribed to change feed");
                self.subscription = Some(subscription);
                Ok(())
            }
            Err(err) => {
                let err = CacheError::Subscribe {
                    table: self.table.clone(),
                    message: err.to_string(),
                };
                Err(self.fail(err, Some(NotificationAction::Retry)))
            }
        }
    }

    /// Insert a record and prepend the stored row to local state.
    ///
    /// Reserved keys in `fields` are dropped before sending.
    pub async fn create(&mut self, fields: Fields) -> CacheResult<Record> {
        let payload = strip_reserved(fields);
        let result = self.backend.insert(&self.table, &payload).await;
        if self.torn_down {
            return result.map_err(|err| self.create_error(err));
        }

        match result {
            Ok(record) => {
                self.records.retain(|existing| existing.id != record.id);
                self.records.insert(0, record.clone());
                self.echoes.track(record.id.clone());
                self.error = None;
                debug!(table = %self.table, id = %record.id, "Created record");
                self.succeed("Record created");
                Ok(record)
            }
            Err(err) => {
                let err = self.create_error(err);
                Err(self.fail(err, Some(NotificationAction::Retry)))
            }
        }
    }

    /// Apply `patch` to the record with `id` and replace the local entry
    /// with the stored row.
    ///
    /// A fresh `updated_at` is always sent; `id` and `created_at` in the
    /// patch are ignored. Unknown ids are reported by the backend.
    pub async fn update(&mut self, id: &RecordId, mut patch: Fields) -> CacheResult<Record> {
        patch.remove("id");
        patch.remove("created_at");
        patch.insert(
            "updated_at".to_string(),
            Value::String(Utc::now().to_rfc3339()),
        );

        let result = self.backend.update(&self.table, id, &patch).await;
        if self.torn_down {
            return result.map_err(|err| self.update_error(id, err));
        }

        match result {
            Ok(record) => {
                if let Some(existing) = self.records.iter_mut().find(|r| r.id == record.id) {
                    *existing = record.clone();
                }
                self.error = None;
                debug!(table = %self.table, id = %record.id, "Updated record");
                self.succeed("Record updated");
                Ok(record)
            }
            Err(err) => {
                let err = self.update_error(id, err);
                Err(self.fail(err, Some(NotificationAction::Retry)))
            }
        }
    }

    pub async fn delete(&mut self, id: &RecordId) -> CacheResult<()> {
        let result = self.backend.delete(&self.table, id).await;
        if self.torn_down {
            return result.map_err(|err| self.delete_error(id, err));
        }

        match result {
            Ok(()) => {
                self.records.retain(|record| record.id != *id);
                self.error = None;
                debug!(table = %self.table, id = %id, "Deleted record");
                self.succeed("Record deleted");
                Ok(())
            }
            Err(err) => {
                let err = self.delete_error(id, err);
                Err(self.fail(err, Some(NotificationAction::Retry)))
            }
        }
    }

    /// Reconcile one change event into local state. True if state changed.
    ///
    /// - `Created`: prepended unless the id is already present or the event
    ///   is the echo of a local create.
    /// - `Updated`: replaces the matching entry; dropped when absent.
    /// - `Deleted`: removes the matching entry; no-op when absent.
    pub fn apply_change(&mut self, event: ChangeEvent) -> bool {
        if self.torn_down {
            return false;
        }
        self.echoes.prune();

        let id = event.record_id().clone();
        let kind = event.kind();
        let changed = match event {
            ChangeEvent::Created { record } => {
                if self.echoes.take(&record.id) {
                    debug!(table = %self.table, id = %record.id, "Suppressed echo of local create");
                    false
                } else if self.records.iter().any(|r| r.id == record.id) {
                    false
                } else {
                    self.records.insert(0, record);
                    true
                }
            }
            ChangeEvent::Updated { record } => {
                match self.records.iter_mut().find(|r| r.id == record.id) {
                    Some(existing) => {
                        *existing = record;
                        true
                    }
                    None => false,
                }
            }
            ChangeEvent::Deleted { id, .. } => {
                let before = self.records.len();
                self.records.retain(|r| r.id != id);
                self.records.len() != before
            }
        };

        if changed {
            debug!(table = %self.table, id = %id, kind = %kind, "Applied remote change");
            if self.options.announce_remote_changes {
                self.notify(Notification::new(
                    NotificationLevel::Info,
                    format!("Record {} {} remotely", id, kind),
                ));
            }
        }
        changed
    }

    /// Wait for the next feed message and apply it.
    ///
    /// Returns `None` when there is no feed or it has ended. Cancel-safe:
    /// a message is applied only once it has been received.
    pub async fn next_feed_message(&mut self) -> Option<FeedMessage> {
        let received = match self.subscription.as_mut() {
            Some(subscription) => subscription.recv().await,
            None => return None,
        };
        match received {
            Some(message) => {
                self.handle_message(message.clone());
                Some(message)
            }
            None => {
                self.feed_ended();
                None
            }
        }
    }

    /// Apply every message already delivered, without waiting.
    pub fn drain_feed(&mut self) -> usize {
        let mut applied = 0;
        while let Some(message) = self
            .subscription
            .as_mut()
            .and_then(|subscription| subscription.try_recv())
        {
            self.handle_message(message);
            applied += 1;
        }
        applied
    }

    /// Tear down the change feed. Later writes still reach the backend but
    /// no longer touch local state.
    pub fn unmount(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        self.live = false;
        self.loading = false;
        self.echoes.clear();
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
        debug!(table = %self.table, "Unmounted collection cache");
    }

    fn handle_message(&mut self, message: FeedMessage) {
        match message {
            FeedMessage::Change(event) => {
                self.apply_change(event);
            }
            FeedMessage::Status(status) => self.apply_status(status),
        }
    }

    fn apply_status(&mut self, status: FeedStatus) {
        if self.torn_down {
            return;
        }
        match status {
            FeedStatus::Connected => {
                if self.interrupted {
                    self.interrupted = false;
                    self.needs_resync = true;
                }
                self.live = true;
                info!(table = %self.table, "Change feed connected");
            }
            FeedStatus::Disconnected { reason } => {
                self.live = false;
                self.interrupted = true;
                self.notify(Notification::new(
                    NotificationLevel::Warning,
                    format!("Live updates interrupted: {}", reason),
                ));
            }
            FeedStatus::Error { message } => {
                self.notify(Notification::new(
                    NotificationLevel::Error,
                    format!("Live updates failed: {}", message),
                ));
            }
            FeedStatus::Lagged { skipped } => {
                self.needs_resync = true;
                self.notify(
                    Notification::new(
                        NotificationLevel::Warning,
                        format!("Missed {} live updates", skipped),
                    )
                    .with_action(NotificationAction::Resync),
                );
            }
        }
    }

    fn feed_ended(&mut self) {
        self.subscription = None;
        if self.live {
            warn!(table = %self.table, "Change feed ended");
        }
        self.live = false;
    }

    fn fail(&mut self, err: CacheError, action: Option<NotificationAction>) -> CacheError {
        warn!(table = %self.table, error = %err, "Collection operation failed");
        self.error = Some(err.clone());
        let mut notification = Notification::new(NotificationLevel::Error, err.to_string());
        if let Some(action) = action {
            notification = notification.with_action(action);
        }
        self.notify(notification);
        err
    }

    fn succeed(&self, message: &str) {
        if self.options.success_notifications {
            self.notify(Notification::new(NotificationLevel::Success, message));
        }
    }

    fn notify(&self, notification: Notification) {
        self.notifier.notify(notification.for_table(self.table.clone()));
    }

    fn load_error(&self, err: BackendError) -> CacheError {
        CacheError::Load {
            table: self.table.clone(),
            message: err.to_string(),
        }
    }

    fn create_error(&self, err: BackendError) -> CacheError {
        CacheError::Create {
            table: self.table.clone(),
            message: err.to_string(),
        }
    }

    fn update_error(&self, id: &RecordId, err: BackendError) -> CacheError {
        CacheError::Update {
            table: self.table.clone(),
            id: id.clone(),
            message: err.to_string(),
        }
    }

    fn delete_error(&self, id: &RecordId, err: BackendError) -> CacheError {
        CacheError::Delete {
            table: self.table.clone(),
            id: id.clone(),
            message: err.to_string(),
        }
    }
}

impl std::fmt::Debug for CollectionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectionCache")
            .field("table", &self.table)
            .field("records", &self.records.len())
            .field("error", &self.error)
            .field("live", &self.live)
            .field("mounted", &!self.torn_down)
            .finish()
    }
}
