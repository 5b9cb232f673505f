//! Schedule store — the injected ownership seam for scheduled entries.
//!
//! The store is the sole owner of entry lifetime; a durable backend can be
//! substituted without touching queue or dispatch logic. The in-memory
//! implementation serializes all state transitions behind one mutex, which is
//! what makes `claim_due` safe against concurrent ticks and concurrent
//! update/remove calls.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::warn;
use uuid::Uuid;

use super::{ScheduleState, ScheduledEntry};
use crate::error::QueueError;
use crate::message::SendRequest;

/// CRUD plus the atomic claim/complete operations the trigger loop needs.
#[async_trait]
pub trait ScheduleStore: Send + Sync {
    /// Create a new entry in the `scheduled` state.
    async fn add(&self, request: SendRequest, due_at: DateTime<Utc>) -> ScheduledEntry;

    async fn get(&self, id: Uuid) -> Option<ScheduledEntry>;

    async fn list(&self) -> Vec<ScheduledEntry>;

    async fn list_by_state(&self, state: ScheduleState) -> Vec<ScheduledEntry>;

    /// Update the request payload and/or due time. Only permitted while the
    /// entry is still `scheduled`.
    async fn update(
        &self,
        id: Uuid,
        request: Option<SendRequest>,
        due_at: Option<DateTime<Utc>>,
    ) -> Result<ScheduledEntry, QueueError>;

    /// Remove an entry in any state.
    async fn remove(&self, id: Uuid) -> Result<(), QueueError>;

    /// Explicit caller-initiated reset of a terminal entry back to
    /// `scheduled`, clearing the previous outcome (manual replay).
    async fn reset(&self, id: Uuid) -> Result<ScheduledEntry, QueueError>;

    /// Atomically select every `scheduled` entry with `due_at <= now` and
    /// transition it to `processing`. A concurrent second call cannot claim
    /// the same entry twice.
    async fn claim_due(&self, now: DateTime<Utc>) -> Vec<ScheduledEntry>;

    /// Record a successful dispatch of a claimed entry.
    async fn mark_sent(&self, id: Uuid, result_message_id: Option<Uuid>);

    /// Record a failed dispatch of a claimed entry.
    async fn mark_failed(&self, id: Uuid, error: &str);
}

/// In-memory schedule store. Single-writer discipline via one mutex.
#[derive(Debug, Default)]
pub struct MemoryScheduleStore {
    entries: Mutex<HashMap<Uuid, ScheduledEntry>>,
}

impl MemoryScheduleStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ScheduleStore for MemoryScheduleStore {
    async fn add(&self, request: SendRequest, due_at: DateTime<Utc>) -> ScheduledEntry {
        let entry = ScheduledEntry::new(request, due_at);
        self.entries.lock().await.insert(entry.id, entry.clone());
        entry
    }

    async fn get(&self, id: Uuid) -> Option<ScheduledEntry> {
        self.entries.lock().await.get(&id).cloned()
    }

    async fn list(&self) -> Vec<ScheduledEntry> {
        let mut all: Vec<ScheduledEntry> = self.entries.lock().await.values().cloned().collect();
        all.sort_by_key(|e| e.due_at);
        all
    }

    async fn list_by_state(&self, state: ScheduleState) -> Vec<ScheduledEntry> {
        let mut matching: Vec<ScheduledEntry> = self
            .entries
            .lock()
            .await
            .values()
            .filter(|e| e.state == state)
            .cloned()
            .collect();
        matching.sort_by_key(|e| e.due_at);
        matching
    }

    async fn update(
        &self,
        id: Uuid,
        request: Option<SendRequest>,
        due_at: Option<DateTime<Utc>>,
    ) -> Result<ScheduledEntry, QueueError> {
        let mut entries = self.entries.lock().await;
        let entry = entries.get_mut(&id).ok_or(QueueError::NotFound { id })?;
        if entry.state != ScheduleState::Scheduled {
            return Err(QueueError::InvalidState {
                id,
                state: entry.state,
            });
        }
        if let Some(request) = request {
            entry.request = request;
        }
        if let Some(due_at) = due_at {
            entry.due_at = due_at;
        }
        entry.updated_at = Utc::now();
        Ok(entry.clone())
    }

    async fn remove(&self, id: Uuid) -> Result<(), QueueError> {
        self.entries
            .lock()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or(QueueError::NotFound { id })
    }

    async fn reset(&self, id: Uuid) -> Result<ScheduledEntry, QueueError> {
        let mut entries = self.entries.lock().await;
        let entry = entries.get_mut(&id).ok_or(QueueError::NotFound { id })?;
        if !entry.state.is_terminal() {
            return Err(QueueError::NotTerminal {
                id,
                state: entry.state,
            });
        }
        entry.state = ScheduleState::Scheduled;
        entry.last_error = None;
        entry.result_message_id = None;
        entry.updated_at = Utc::now();
        Ok(entry.clone())
    }

    async fn claim_due(&self, now: DateTime<Utc>) -> Vec<ScheduledEntry> {
        let mut entries = self.entries.lock().await;
        let mut claimed = Vec::new();
        for entry in entries.values_mut() {
            if entry.state == ScheduleState::Scheduled && entry.due_at <= now {
                entry.state = ScheduleState::Processing;
                entry.updated_at = Utc::now();
                claimed.push(entry.clone());
            }
        }
        claimed.sort_by_key(|e| e.due_at);
        claimed
    }

    async fn mark_sent(&self, id: Uuid, result_message_id: Option<Uuid>) {
        let mut entries = self.entries.lock().await;
        match entries.get_mut(&id) {
            Some(entry) if entry.state == ScheduleState::Processing => {
                entry.state = ScheduleState::Sent;
                entry.result_message_id = result_message_id;
                entry.last_error = None;
                entry.updated_at = Utc::now();
            }
            Some(entry) => {
                warn!(id = %id, state = ?entry.state, "mark_sent on entry not in processing");
            }
            // Removed mid-flight; the dispatch already happened, nothing to record.
            None => {}
        }
    }

    async fn mark_failed(&self, id: Uuid, error: &str) {
        let mut entries = self.entries.lock().await;
        match entries.get_mut(&id) {
            Some(entry) if entry.state == ScheduleState::Processing => {
                entry.state = ScheduleState::Failed;
                entry.last_error = Some(error.to_string());
                entry.updated_at = Utc::now();
            }
            Some(entry) => {
                warn!(id = %id, state = ?entry.state, "mark_failed on entry not in processing");
            }
            None => {}
        }
    }
}
