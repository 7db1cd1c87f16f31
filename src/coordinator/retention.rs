//! Record retention and eviction.
//!
//! A record becomes evictable once it is terminal, no subscription is still
//! waiting on it, and its aggregation parent (if any) is terminal too. It then
//! stays queryable for the configured retention window before a per-record
//! timer removes it. The timer holds only a weak reference to the manager and
//! re-checks everything under the write gate, so interest that reappears in the
//! meantime defers eviction.

use super::manager::ManagerInner;
use crate::models::{CommandId, CommandRecord};
use std::time::Duration;
use tracing::debug;

impl ManagerInner {
    pub(crate) fn is_evictable(&self, record: &CommandRecord) -> bool {
        if !record.is_terminal() || self.hub.subscriber_count(&record.id) > 0 {
            return false;
        }
        match record.parent {
            Some(parent) => self
                .store
                .get(&parent)
                .map(|p| p.is_terminal())
                .unwrap_or(true),
            None => true,
        }
    }

    /// Start retention for records that turned terminal during one mutation
    pub(crate) fn settle(&self, settled: &[CommandId]) {
        for id in settled {
            self.on_terminal(id);
        }
    }

    fn on_terminal(&self, id: &CommandId) {
        let Some(record) = self.store.get(id) else {
            return;
        };

        // Children were held back only by this record; they may go now
        for child in &record.children {
            if let Some(child_record) = self.store.get(child) {
                if self.is_evictable(&child_record) {
                    self.schedule_eviction(&child_record);
                }
            }
        }

        if self.is_evictable(&record) {
            self.schedule_eviction(&record);
        }
    }

    pub(crate) fn schedule_eviction(&self, record: &CommandRecord) {
        let window = self.config.retention_window();
        if window.is_zero() {
            self.evict_locked(&record.id);
            return;
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            debug!(
                command_id = %record.id,
                "CRM: No async runtime, record retained until evicted explicitly"
            );
            return;
        };

        let id = record.id;
        let epoch = record.epoch;
        let manager = self.self_ref.clone();
        runtime.spawn(async move {
            tokio::time::sleep(window).await;
            if let Some(manager) = manager.upgrade() {
                manager.evict_if_unchanged(id, epoch, window);
            }
        });
    }

    fn evict_if_unchanged(&self, id: CommandId, epoch: u64, window: Duration) {
        let _gate = self.write_gate.lock();
        let Some(record) = self.store.get(&id) else {
            return;
        };
        if record.epoch != epoch {
            // Evicted and re-submitted since the timer was armed
            return;
        }
        if self.is_evictable(&record) {
            debug!(command_id = %id, ?window, "CRM: Retention window elapsed");
            self.evict_locked(&id);
        } else {
            debug!(command_id = %id, "CRM: Eviction deferred, record still referenced");
        }
    }

    /// Remove `id` and release its children's parent links. Caller holds the gate.
    pub(crate) fn evict_locked(&self, id: &CommandId) {
        let Some(record) = self.store.remove(id) else {
            return;
        };
        for child in &record.children {
            self.store.detach_parent(child, id);
        }
        self.events.evicted(*id, &record.response);
        debug!(command_id = %id, kind = record.response.kind_name(), "CRM: Record evicted");
    }
}
