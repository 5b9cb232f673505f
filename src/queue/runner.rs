//! Queue trigger loop — claims due entries and feeds them through the
//! dispatch engine.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use super::{ScheduleStore, ScheduledEntry};
use crate::dispatch::Dispatcher;
use crate::message::DispatchOutcome;

/// Outcome counts for one tick, returned to manual-trigger callers.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct TickSummary {
    pub claimed: usize,
    pub sent: usize,
    pub failed: usize,
}

/// Drives the scheduled-send queue on a fixed cadence.
///
/// Ticks serialize through `tick_lock`: a timer tick and a manual
/// `/scheduled/process` trigger can never overlap. Claiming is atomic inside
/// the store, so even without the lock an entry could not be dispatched
/// twice; the lock keeps whole ticks from interleaving.
pub struct QueueRunner {
    store: Arc<dyn ScheduleStore>,
    dispatcher: Arc<Dispatcher>,
    tick_lock: Mutex<()>,
}

impl QueueRunner {
    pub fn new(store: Arc<dyn ScheduleStore>, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            store,
            dispatcher,
            tick_lock: Mutex::new(()),
        }
    }

    /// Run one tick: claim every due entry, dispatch each independently.
    /// One entry's failure never aborts the others.
    pub async fn tick(&self) -> TickSummary {
        let _guard = self.tick_lock.lock().await;

        let due = self.store.claim_due(Utc::now()).await;
        if due.is_empty() {
            return TickSummary::default();
        }

        debug!(count = due.len(), "Processing due scheduled entries");
        let mut summary = TickSummary {
            claimed: due.len(),
            ..Default::default()
        };

        // Claimed entries are independent; fan their provider calls out.
        let results =
            futures::future::join_all(due.into_iter().map(|entry| self.process_entry(entry))).await;

        for sent in results {
            if sent {
                summary.sent += 1;
            } else {
                summary.failed += 1;
            }
        }

        info!(
            claimed = summary.claimed,
            sent = summary.sent,
            failed = summary.failed,
            "Queue tick complete"
        );
        summary
    }

    /// Dispatch one claimed entry and record the outcome. Returns `true` when
    /// the entry reached `sent`.
    async fn process_entry(&self, entry: ScheduledEntry) -> bool {
        match self.dispatcher.dispatch(entry.request.clone()).await {
            Ok(DispatchOutcome::Sent(result)) => {
                self.store
                    .mark_sent(entry.id, Some(result.message_id))
                    .await;
                true
            }
            Ok(DispatchOutcome::Suppressed) => {
                // Expected terminal outcome, not a failure: the recipient
                // unsubscribed between scheduling and dispatch.
                info!(id = %entry.id, to = %entry.request.to, "Scheduled send suppressed");
                self.store.mark_sent(entry.id, None).await;
                true
            }
            Err(e) => {
                error!(id = %entry.id, error = %e, "Scheduled dispatch failed");
                self.store.mark_failed(entry.id, &e.to_string()).await;
                false
            }
        }
    }

    /// Periodic trigger. Never returns; spawn it.
    pub async fn run(self: Arc<Self>, period: Duration) {
        info!(period_secs = period.as_secs(), "Scheduled-send queue started");
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // First tick fires immediately; skip it so startup isn't a send burst.
        interval.tick().await;
        loop {
            interval.tick().await;
            self.tick().await;
        }
    }
}
