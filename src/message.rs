//! Outbound message types shared by the dispatch engine, queue, and providers.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A send request as submitted by a caller (immediate or scheduled).
///
/// `message_id` may be supplied by the caller to make retries idempotent with
/// respect to engagement correlation; when omitted, the dispatch engine mints
/// one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendRequest {
    pub to: String,
    #[serde(default)]
    pub from: Option<String>,
    pub subject: String,
    pub html: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// Informational provider name from caller metadata. Not a routing key —
    /// the active provider is selected once at startup.
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub custom_args: HashMap<String, String>,
    #[serde(default)]
    pub message_id: Option<Uuid>,
}

impl SendRequest {
    pub fn new(to: impl Into<String>, subject: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            from: None,
            subject: subject.into(),
            html: html.into(),
            headers: HashMap::new(),
            provider: None,
            categories: Vec::new(),
            custom_args: HashMap::new(),
            message_id: None,
        }
    }

    pub fn with_message_id(mut self, id: Uuid) -> Self {
        self.message_id = Some(id);
        self
    }
}

/// A fully resolved message handed to a provider adapter. Consumed once;
/// the core does not retain it.
#[derive(Debug, Clone)]
pub struct OutboundMessage {
    pub message_id: Uuid,
    pub to: String,
    pub from: String,
    pub subject: String,
    pub html: String,
    pub headers: HashMap<String, String>,
    pub categories: Vec<String>,
    pub custom_args: HashMap<String, String>,
}

/// Normalized result of a successful provider send.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchResult {
    #[serde(rename = "messageId")]
    pub message_id: Uuid,
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub mock: bool,
    pub provider: String,
    #[serde(rename = "sentAt")]
    pub sent_at: DateTime<Utc>,
}

/// Terminal outcome of a dispatch attempt that did not error.
///
/// A suppressed recipient is an expected short-circuit, distinguishable from
/// both success and provider failure.
#[derive(Debug, Clone)]
pub enum DispatchOutcome {
    Sent(DispatchResult),
    Suppressed,
}

impl DispatchOutcome {
    pub fn is_suppressed(&self) -> bool {
        matches!(self, Self::Suppressed)
    }

    pub fn result(&self) -> Option<&DispatchResult> {
        match self {
            Self::Sent(r) => Some(r),
            Self::Suppressed => None,
        }
    }
}
