//! Ids of locally created records whose `created` echo has not arrived yet.

use fieldops_core::RecordId;
use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Debug)]
pub(crate) struct PendingEchoes {
    window: Duration,
    pending: HashMap<RecordId, Instant>,
}

impl PendingEchoes {
    pub(crate) fn new(window: Duration) -> Self {
        Self {
            window,
            pending: HashMap::new(),
        }
    }

    pub(crate) fn track(&mut self, id: RecordId) {
        self.track_at(id, Instant::now());
    }

    /// Consume the pending entry for `id`. True if one was waiting.
    pub(crate) fn take(&mut self, id: &RecordId) -> bool {
        self.take_at(id, Instant::now())
    }

    pub(crate) fn prune(&mut self) {
        self.prune_at(Instant::now());
    }

    pub(crate) fn clear(&mut self) {
        self.pending.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.pending.len()
    }

    fn track_at(&mut self, id: RecordId, now: Instant) {
        self.pending.insert(id, now);
    }

    fn take_at(&mut self, id: &RecordId, now: Instant) -> bool {
        match self.pending.remove(id) {
            Some(tracked) => now.saturating_duration_since(tracked) <= self.window,
            None => false,
        }
    }

    fn prune_at(&mut self, now: Instant) {
        let window = self.window;
        self.pending
            .retain(|_, tracked| now.saturating_duration_since(*tracked) <= window);
    }
}
