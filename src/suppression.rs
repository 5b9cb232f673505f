//! Suppression list — recipients barred from receiving further sends.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

/// A suppressed recipient address.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuppressionEntry {
    pub email: String,
    pub reason: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

/// In-memory suppression store keyed by normalized address.
///
/// Normalization is trim + lowercase; the map key enforces uniqueness.
#[derive(Debug, Default)]
pub struct SuppressionList {
    entries: RwLock<HashMap<String, SuppressionEntry>>,
}

/// Normalize an address for comparison and storage.
pub fn normalize(email: &str) -> String {
    email.trim().to_lowercase()
}

impl SuppressionList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hard gate consulted before any send is attempted.
    pub fn is_suppressed(&self, email: &str) -> bool {
        let key = normalize(email);
        self.entries
            .read()
            .map(|entries| entries.contains_key(&key))
            .unwrap_or(false)
    }

    /// Add an address. Returns `true` if it was newly suppressed; a duplicate
    /// submission is a no-op that keeps the original entry.
    pub fn add(&self, email: &str, reason: &str) -> bool {
        let key = normalize(email);
        if key.is_empty() {
            return false;
        }
        let mut entries = match self.entries.write() {
            Ok(e) => e,
            Err(poisoned) => poisoned.into_inner(),
        };
        if entries.contains_key(&key) {
            return false;
        }
        info!(email = %key, reason = %reason, "Address suppressed");
        entries.insert(
            key.clone(),
            SuppressionEntry {
                email: key,
                reason: reason.to_string(),
                created_at: Utc::now(),
            },
        );
        true
    }

    /// Remove an address. Returns `true` if it was present.
    pub fn remove(&self, email: &str) -> bool {
        let key = normalize(email);
        let mut entries = match self.entries.write() {
            Ok(e) => e,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries.remove(&key).is_some()
    }

    /// All entries, for operator inspection.
    pub fn all(&self) -> Vec<SuppressionEntry> {
        self.entries
            .read()
            .map(|entries| entries.values().cloned().collect())
            .unwrap_or_default()
    }
}
