//! Mock provider — no network I/O, used when no real provider is configured.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tracing::info;

use super::{Provider, ProviderResponse};
use crate::error::ProviderError;
use crate::message::OutboundMessage;

/// Fallback provider that logs the attempt and returns a synthetic success,
/// so the rest of the pipeline is fully exercisable without credentials.
#[derive(Debug, Default)]
pub struct MockProvider {
    sent: AtomicU64,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of sends observed, for tests and diagnostics.
    pub fn sent_count(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn send(&self, msg: &OutboundMessage) -> Result<ProviderResponse, ProviderError> {
        self.sent.fetch_add(1, Ordering::Relaxed);
        info!(
            message_id = %msg.message_id,
            to = %msg.to,
            subject = %msg.subject,
            "Mock send (no delivery attempted)"
        );
        Ok(ProviderResponse {
            status_code: 202,
            mock: true,
        })
    }
}
