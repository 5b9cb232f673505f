//! Authenticated SMTP relay provider (lettre).

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use secrecy::ExposeSecret;
use tracing::{debug, warn};

use super::{Provider, ProviderResponse};
use crate::config::SmtpConfig;
use crate::error::ProviderError;
use crate::message::OutboundMessage;

/// Sends through an authenticated SMTP relay.
///
/// The envelope sender is always the authenticated account — SPF alignment
/// requires it. When the caller asked for a different sender, that address is
/// preserved as the Reply-To so responses still reach the intended mailbox.
pub struct SmtpProvider {
    config: SmtpConfig,
}

impl SmtpProvider {
    pub fn new(config: SmtpConfig) -> Self {
        Self { config }
    }

    /// Resolve the From address, substituting the authenticated account when
    /// the caller's sender differs. Returns `(from, reply_to)`.
    fn resolve_sender(&self, requested: &str) -> (String, Option<String>) {
        if requested.eq_ignore_ascii_case(&self.config.username) {
            (requested.to_string(), None)
        } else {
            (self.config.username.clone(), Some(requested.to_string()))
        }
    }

    fn build_message(&self, msg: &OutboundMessage) -> Result<Message, ProviderError> {
        let (from, reply_to) = self.resolve_sender(&msg.from);
        if let Some(ref original) = reply_to {
            warn!(
                requested = %original,
                authenticated = %from,
                "Sender differs from authenticated SMTP account, substituting"
            );
        }

        let mut builder = Message::builder()
            .from(from.parse().map_err(|e| ProviderError::InvalidAddress {
                address: from.clone(),
                reason: format!("{e}"),
            })?)
            .to(msg.to.parse().map_err(|e| ProviderError::InvalidAddress {
                address: msg.to.clone(),
                reason: format!("{e}"),
            })?)
            .subject(&msg.subject)
            .message_id(Some(format!("<{}@mailflow>", msg.message_id)));

        if let Some(original) = reply_to {
            builder = builder.reply_to(original.parse().map_err(|e| {
                ProviderError::InvalidAddress {
                    address: original.clone(),
                    reason: format!("{e}"),
                }
            })?);
        }

        // Caller-supplied headers need typed lettre headers; correlation rides
        // on the Message-ID here and on custom args for the API provider.
        builder
            .header(ContentType::TEXT_HTML)
            .body(msg.html.clone())
            .map_err(|e| ProviderError::BuildFailed(e.to_string()))
    }
}

#[async_trait]
impl Provider for SmtpProvider {
    fn name(&self) -> &str {
        "smtp"
    }

    async fn send(&self, msg: &OutboundMessage) -> Result<ProviderResponse, ProviderError> {
        debug!(message_id = %msg.message_id, to = %msg.to, host = %self.config.host, "Sending via SMTP");

        let email = self.build_message(msg)?;
        let config = self.config.clone();

        // lettre's blocking transport, driven off the async runtime.
        tokio::task::spawn_blocking(move || {
            let transport = SmtpTransport::relay(&config.host)
                .map_err(|e| ProviderError::RequestFailed {
                    provider: "smtp".into(),
                    reason: format!("relay setup: {e}"),
                })?
                .port(config.port)
                .credentials(Credentials::new(
                    config.username.clone(),
                    config.password.expose_secret().to_string(),
                ))
                .build();

            transport
                .send(&email)
                .map_err(|e| ProviderError::RequestFailed {
                    provider: "smtp".into(),
                    reason: format!("send: {e}"),
                })
        })
        .await
        .map_err(|e| ProviderError::RequestFailed {
            provider: "smtp".into(),
            reason: format!("send task panicked: {e}"),
        })??;

        Ok(ProviderResponse {
            status_code: 250,
            mock: false,
        })
    }
}
