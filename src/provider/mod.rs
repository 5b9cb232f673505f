//! Provider adapters — uniform interface over heterogeneous delivery backends.
//!
//! Exactly one provider is selected at construction time; there is no
//! per-call branching on provider names.

mod mock;
mod sendgrid;
mod smtp;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

pub use mock::MockProvider;
pub use sendgrid::SendGridProvider;
pub use smtp::SmtpProvider;

use crate::config::Config;
use crate::error::ProviderError;
use crate::message::OutboundMessage;

/// Raw response from a provider adapter, normalized by the dispatch engine.
#[derive(Debug, Clone)]
pub struct ProviderResponse {
    pub status_code: u16,
    pub mock: bool,
}

/// A delivery backend. One network call (or zero, for the mock) per
/// invocation; no retries inside the adapter — retry policy belongs to the
/// caller.
#[async_trait]
pub trait Provider: Send + Sync {
    fn name(&self) -> &str;

    async fn send(&self, msg: &OutboundMessage) -> Result<ProviderResponse, ProviderError>;
}

/// Select the active provider from configuration.
///
/// Order: explicit `MAILFLOW_PROVIDER` override, then SendGrid when an API key
/// is configured, then SMTP when usable credentials exist, then the mock
/// fallback so the pipeline stays fully testable without external
/// dependencies.
pub fn select_provider(config: &Config) -> Arc<dyn Provider> {
    let provider: Arc<dyn Provider> = match (
        config.provider_override.as_deref(),
        &config.sendgrid_api_key,
        &config.smtp,
    ) {
        (Some("sendgrid"), Some(key), _) => Arc::new(SendGridProvider::new(key.clone())),
        (Some("smtp"), _, Some(smtp)) if config.smtp_usable() => {
            Arc::new(SmtpProvider::new(smtp.clone()))
        }
        (Some("mock"), _, _) => Arc::new(MockProvider::new()),
        (Some(other), _, _) => {
            tracing::warn!(provider = %other, "Unknown or unconfigured provider override, using mock");
            Arc::new(MockProvider::new())
        }
        (None, Some(key), _) => Arc::new(SendGridProvider::new(key.clone())),
        (None, None, Some(smtp)) if config.smtp_usable() => {
            Arc::new(SmtpProvider::new(smtp.clone()))
        }
        (None, None, _) => Arc::new(MockProvider::new()),
    };
    info!(provider = provider.name(), "Active delivery provider selected");
    provider
}
