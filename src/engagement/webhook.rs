//! Provider delivery-webhook ingestion.
//!
//! Accepts SendGrid-style event batches. Unrecognized event types and
//! malformed entries are skipped, never errors — the webhook endpoint always
//! acknowledges.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{DeliveryDisposition, EngagementStore};

/// One provider delivery event. The message identity arrives either as a
/// top-level field or inside the custom args echoed back by the provider.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderEvent {
    pub event: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, rename = "messageId", alias = "message_id")]
    pub message_id: Option<String>,
    /// Unix seconds.
    #[serde(default)]
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub custom_args: HashMap<String, String>,
}

impl ProviderEvent {
    fn message_identity(&self) -> Option<Uuid> {
        self.message_id
            .as_deref()
            .or_else(|| self.custom_args.get("messageId").map(String::as_str))
            .or_else(|| self.custom_args.get("message_id").map(String::as_str))
            .and_then(|s| Uuid::parse_str(s).ok())
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.timestamp
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .unwrap_or_else(Utc::now)
    }
}

fn disposition(event: &str) -> Option<DeliveryDisposition> {
    match event {
        "delivered" => Some(DeliveryDisposition::Delivered),
        "bounce" | "bounced" | "dropped" => Some(DeliveryDisposition::Bounced),
        "spamreport" | "complaint" | "complained" => Some(DeliveryDisposition::Complained),
        _ => None,
    }
}

/// Ingest a webhook batch. Returns the number of events applied.
pub fn ingest_batch(store: &dyn EngagementStore, events: &[ProviderEvent]) -> usize {
    let mut applied = 0;
    for event in events {
        let Some(kind) = disposition(&event.event) else {
            debug!(event = %event.event, "Ignoring unrecognized webhook event type");
            continue;
        };
        let Some(id) = event.message_identity() else {
            debug!(event = %event.event, "Webhook event carries no message identity, skipping");
            continue;
        };
        match store.record_delivery(id, kind, event.occurred_at()) {
            Ok(()) => applied += 1,
            Err(e) => warn!(message_id = %id, error = %e, "Failed to record delivery event"),
        }
    }
    applied
}
