//! Engagement records — accumulated open/click/delivery/reply facts per
//! message identity.
//!
//! Every update is monotonic: a fact never reverts to false and its timestamp
//! never moves backward. Racing tracking events for the same message are
//! therefore harmless.

pub mod inbound;
pub mod webhook;

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::EngagementError;

/// Delivery disposition reported by the provider webhook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryDisposition {
    Delivered,
    Bounced,
    Complained,
}

/// The accumulated engagement facts for one message identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngagementRecord {
    #[serde(rename = "messageId")]
    pub message_id: Uuid,
    pub opened: bool,
    #[serde(rename = "openedAt")]
    pub opened_at: Option<DateTime<Utc>>,
    #[serde(rename = "openCount")]
    pub open_count: u32,
    pub clicked: bool,
    #[serde(rename = "clickedAt")]
    pub clicked_at: Option<DateTime<Utc>>,
    #[serde(rename = "clickedUrl")]
    pub clicked_url: Option<String>,
    pub delivered: bool,
    #[serde(rename = "deliveredAt")]
    pub delivered_at: Option<DateTime<Utc>>,
    pub bounced: bool,
    #[serde(rename = "bouncedAt")]
    pub bounced_at: Option<DateTime<Utc>>,
    pub complained: bool,
    #[serde(rename = "complainedAt")]
    pub complained_at: Option<DateTime<Utc>>,
    pub replied: bool,
    #[serde(rename = "repliedAt")]
    pub replied_at: Option<DateTime<Utc>>,
}

impl EngagementRecord {
    fn new(message_id: Uuid) -> Self {
        Self {
            message_id,
            opened: false,
            opened_at: None,
            open_count: 0,
            clicked: false,
            clicked_at: None,
            clicked_url: None,
            delivered: false,
            delivered_at: None,
            bounced: false,
            bounced_at: None,
            complained: false,
            complained_at: None,
            replied: false,
            replied_at: None,
        }
    }
}

/// Timestamps only move forward.
fn advance(slot: &mut Option<DateTime<Utc>>, at: DateTime<Utc>) {
    match slot {
        Some(existing) if *existing >= at => {}
        _ => *slot = Some(at),
    }
}

/// Storage seam for engagement records. The in-memory store never fails, but
/// the trait is fallible so the HTTP layer's never-break-the-redirect
/// behavior stays honest against a durable backend.
pub trait EngagementStore: Send + Sync {
    fn record_open(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), EngagementError>;

    fn record_click(&self, id: Uuid, url: &str, at: DateTime<Utc>) -> Result<(), EngagementError>;

    fn record_delivery(
        &self,
        id: Uuid,
        disposition: DeliveryDisposition,
        at: DateTime<Utc>,
    ) -> Result<(), EngagementError>;

    fn record_reply(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), EngagementError>;

    fn get(&self, id: Uuid) -> Result<Option<EngagementRecord>, EngagementError>;
}

/// Concurrent-safe in-memory engagement store.
#[derive(Debug, Default)]
pub struct MemoryEngagementStore {
    records: RwLock<HashMap<Uuid, EngagementRecord>>,
}

impl MemoryEngagementStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn upsert<F: FnOnce(&mut EngagementRecord)>(&self, id: Uuid, apply: F) {
        let mut records = match self.records.write() {
            Ok(r) => r,
            Err(poisoned) => poisoned.into_inner(),
        };
        let record = records.entry(id).or_insert_with(|| EngagementRecord::new(id));
        apply(record);
    }
}

impl EngagementStore for MemoryEngagementStore {
    fn record_open(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), EngagementError> {
        self.upsert(id, |r| {
            r.opened = true;
            r.open_count += 1;
            advance(&mut r.opened_at, at);
        });
        Ok(())
    }

    fn record_click(&self, id: Uuid, url: &str, at: DateTime<Utc>) -> Result<(), EngagementError> {
        self.upsert(id, |r| {
            r.clicked = true;
            advance(&mut r.clicked_at, at);
            if r.clicked_url.is_none() {
                r.clicked_url = Some(url.to_string());
            }
        });
        Ok(())
    }

    fn record_delivery(
        &self,
        id: Uuid,
        disposition: DeliveryDisposition,
        at: DateTime<Utc>,
    ) -> Result<(), EngagementError> {
        self.upsert(id, |r| match disposition {
            DeliveryDisposition::Delivered => {
                r.delivered = true;
                advance(&mut r.delivered_at, at);
            }
            DeliveryDisposition::Bounced => {
                r.bounced = true;
                advance(&mut r.bounced_at, at);
            }
            DeliveryDisposition::Complained => {
                r.complained = true;
                advance(&mut r.complained_at, at);
            }
        });
        Ok(())
    }

    fn record_reply(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), EngagementError> {
        self.upsert(id, |r| {
            r.replied = true;
            advance(&mut r.replied_at, at);
        });
        Ok(())
    }

    fn get(&self, id: Uuid) -> Result<Option<EngagementRecord>, EngagementError> {
        Ok(self
            .records
            .read()
            .map(|records| records.get(&id).cloned())
            .unwrap_or(None))
    }
}
