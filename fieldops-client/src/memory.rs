//! In-memory backend for tests, demos and offline runs.
//!
//! Rows live in per-table vectors behind a lock; every write is broadcast to
//! subscribers of that table the same way the realtime service would push it.
//! Failures can be queued per operation with [`MemoryBackend::fail_next`].

use crate::backend::{Backend, Subscription};
use crate::error::{BackendError, BackendResult};
use async_trait::async_trait;
use chrono::Utc;
use fieldops_core::{
    parse_timestamp, ChangeEvent, FeedMessage, FeedStatus, Fields, Record, RecordId,
};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, RwLock};
use tokio::sync::{broadcast, mpsc};
use tracing::debug;

const BROADCAST_CAPACITY: usize = 1024;
const FEED_BUFFER: usize = 256;

/// Backend operation a queued failure applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Fetch,
    Insert,
    Update,
    Delete,
    Subscribe,
}

#[derive(Default)]
struct MemoryState {
    tables: HashMap<String, Vec<Record>>,
    failures: HashMap<Operation, VecDeque<String>>,
}

struct Inner {
    state: RwLock<MemoryState>,
    changes: broadcast::Sender<(String, FeedMessage)>,
}

#[derive(Clone)]
pub struct MemoryBackend {
    inner: Arc<Inner>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                state: RwLock::new(MemoryState::default()),
                changes,
            }),
        }
    }

    /// Replace the rows of `table` without notifying subscribers.
    pub fn seed(&self, table: &str, records: Vec<Record>) -> BackendResult<()> {
        let mut state = self.write()?;
        state.tables.insert(table.to_string(), records);
        Ok(())
    }

    /// Current rows of `table`, in storage order.
    pub fn rows(&self, table: &str) -> BackendResult<Vec<Record>> {
        let state = self.read()?;
        Ok(state.tables.get(table).cloned().unwrap_or_default())
    }

    /// Make the next call of `operation` fail with `message`.
    ///
    /// Calls queue up: two calls fail the next two operations.
    pub fn fail_next(&self, operation: Operation, message: impl Into<String>) -> BackendResult<()> {
        let mut state = self.write()?;
        state
            .failures
            .entry(operation)
            .or_default()
            .push_back(message.into());
        Ok(())
    }

    /// Push a change to subscribers of `table` without touching stored rows.
    ///
    /// Stands in for writes made by other clients.
    pub fn emit(&self, table: &str, event: ChangeEvent) {
        self.publish(table, FeedMessage::Change(event));
    }

    /// Push a connection status to subscribers of `table`.
    pub fn emit_status(&self, table: &str, status: FeedStatus) {
        self.publish(table, FeedMessage::Status(status));
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.changes.receiver_count()
    }

    fn publish(&self, table: &str, message: FeedMessage) {
        // No receivers is fine.
        let _ = self.inner.changes.send((table.to_string(), message));
    }

    fn read(&self) -> BackendResult<std::sync::RwLockReadGuard<'_, MemoryState>> {
        self.inner
            .state
            .read()
            .map_err(|_| BackendError::Unavailable("memory store lock poisoned".to_string()))
    }

    fn write(&self) -> BackendResult<std::sync::RwLockWriteGuard<'_, MemoryState>> {
        self.inner
            .state
            .write()
            .map_err(|_| BackendError::Unavailable("memory store lock poisoned".to_string()))
    }

    fn take_failure(&self, operation: Operation) -> BackendResult<()> {
        let mut state = self.write()?;
        match state
            .failures
            .get_mut(&operation)
            .and_then(VecDeque::pop_front)
        {
            Some(message) => Err(BackendError::Unavailable(message)),
            None => Ok(()),
        }
    }
}

fn timestamp_field(fields: &Fields, name: &str) -> Option<chrono::DateTime<Utc>> {
    fields
        .get(name)
        .and_then(Value::as_str)
        .and_then(parse_timestamp)
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn fetch_all(&self, table: &str, order_column: &str) -> BackendResult<Vec<Record>> {
        self.take_failure(Operation::Fetch)?;
        let mut rows = self.rows(table)?;
        if order_column == "created_at" {
            rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        } else {
            rows.sort_by(|a, b| {
                let left = a.field_text(order_column);
                let right = b.field_text(order_column);
                right.cmp(&left)
            });
        }
        debug!(table = %table, count = rows.len(), "Memory fetch");
        Ok(rows)
    }

    async fn insert(&self, table: &str, fields: &Fields) -> BackendResult<Record> {
        self.take_failure(Operation::Insert)?;
        let id = match fields.get("id") {
            Some(value) if !value.is_null() => serde_json::from_value::<RecordId>(value.clone())?,
            _ => RecordId::Text(uuid::Uuid::now_v7().to_string()),
        };
        let created_at = timestamp_field(fields, "created_at").unwrap_or_else(Utc::now);

        let mut record = Record::new(id, created_at);
        for (name, value) in fields {
            if !fieldops_core::RESERVED_KEYS.contains(&name.as_str()) {
                record.fields.insert(name.clone(), value.clone());
            }
        }

        {
            let mut state = self.write()?;
            let rows = state.tables.entry(table.to_string()).or_default();
            if rows.iter().any(|row| row.id == record.id) {
                return Err(BackendError::Rejected {
                    status: 409,
                    message: format!("duplicate key value: id {} already exists", record.id),
                });
            }
            rows.push(record.clone());
        }

        self.publish(table, FeedMessage::Change(ChangeEvent::Created { record: record.clone() }));
        Ok(record)
    }

    async fn update(&self, table: &str, id: &RecordId, patch: &Fields) -> BackendResult<Record> {
        self.take_failure(Operation::Update)?;
        let updated = {
            let mut state = self.write()?;
            let row = state
                .tables
                .get_mut(table)
                .and_then(|rows| rows.iter_mut().find(|row| row.id == *id))
                .ok_or_else(|| BackendError::NotFound {
                    table: table.to_string(),
                    id: id.clone(),
                })?;

            for (name, value) in patch {
                if !fieldops_core::RESERVED_KEYS.contains(&name.as_str()) {
                    row.fields.insert(name.clone(), value.clone());
                }
            }
            row.updated_at = Some(timestamp_field(patch, "updated_at").unwrap_or_else(Utc::now));
            row.clone()
        };

        self.publish(table, FeedMessage::Change(ChangeEvent::Updated { record: updated.clone() }));
        Ok(updated)
    }

    async fn delete(&self, table: &str, id: &RecordId) -> BackendResult<()> {
        self.take_failure(Operation::Delete)?;
        let removed = {
            let mut state = self.write()?;
            state.tables.get_mut(table).and_then(|rows| {
                rows.iter()
                    .position(|row| row.id == *id)
                    .map(|position| rows.remove(position))
            })
        };

        // Nothing matched: succeed without a feed event.
        if let Some(removed) = removed {
            self.publish(
                table,
                FeedMessage::Change(ChangeEvent::Deleted {
                    id: removed.id.clone(),
                    old_record: Some(removed),
                }),
            );
        }
        Ok(())
    }

    async fn subscribe(&self, table: &str) -> BackendResult<Subscription> {
        self.take_failure(Operation::Subscribe)?;

        // Subscribe before spawning so no change made after this call is missed.
        let mut changes = self.inner.changes.subscribe();
        let (sender, receiver) = mpsc::channel(FEED_BUFFER);
        let table_name = table.to_string();

        let task = tokio::spawn(async move {
            if sender
                .send(FeedMessage::Status(FeedStatus::Connected))
                .await
                .is_err()
            {
                return;
            }
            loop {
                let message = match changes.recv().await {
                    Ok((changed_table, message)) if changed_table == table_name => message,
                    Ok(_) => continue,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        FeedMessage::Status(FeedStatus::Lagged { skipped })
                    }
                    Err(broadcast::error::RecvError::Closed) => return,
                };
                if sender.send(message).await.is_err() {
                    return;
                }
            }
        });

        Ok(Subscription::new(table, receiver, task))
    }
}
