//! Scheduled-send queue — deferred send requests with a lifecycle state
//! machine, polled on a fixed cadence.

mod runner;
mod store;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use runner::{QueueRunner, TickSummary};
pub use store::{MemoryScheduleStore, ScheduleStore};

use crate::message::SendRequest;

/// Lifecycle state of a scheduled entry.
///
/// Transitions are forward-only: `scheduled → processing → sent | failed`.
/// Terminal entries stay put until explicitly removed or reset by a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleState {
    Scheduled,
    Processing,
    Sent,
    Failed,
}

impl ScheduleState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Sent | Self::Failed)
    }
}

/// A deferred send request with a due time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledEntry {
    pub id: Uuid,
    pub request: SendRequest,
    #[serde(rename = "dueAt")]
    pub due_at: DateTime<Utc>,
    pub state: ScheduleState,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
    #[serde(rename = "lastError")]
    pub last_error: Option<String>,
    #[serde(rename = "resultMessageId")]
    pub result_message_id: Option<Uuid>,
}

impl ScheduledEntry {
    pub fn new(request: SendRequest, due_at: DateTime<Utc>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            request,
            due_at,
            state: ScheduleState::Scheduled,
            created_at: now,
            updated_at: now,
            last_error: None,
            result_message_id: None,
        }
    }
}
