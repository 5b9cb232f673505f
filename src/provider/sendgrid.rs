//! SendGrid transactional-API provider.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use tracing::debug;

use super::{Provider, ProviderResponse};
use crate::error::ProviderError;
use crate::message::OutboundMessage;

const SENDGRID_SEND_URL: &str = "https://api.sendgrid.com/v3/mail/send";

/// Per-request timeout so a wedged provider surfaces as a bounded failure.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Sends via the SendGrid v3 mail API. Categories and custom args ride along
/// for provider-side analytics correlation.
pub struct SendGridProvider {
    api_key: SecretString,
    client: reqwest::Client,
}

impl SendGridProvider {
    pub fn new(api_key: SecretString) -> Self {
        Self {
            api_key,
            client: reqwest::Client::new(),
        }
    }

    fn payload(msg: &OutboundMessage) -> serde_json::Value {
        let mut custom_args = msg.custom_args.clone();
        custom_args.insert("messageId".to_string(), msg.message_id.to_string());

        json!({
            "personalizations": [{
                "to": [{"email": msg.to}],
                "custom_args": custom_args,
            }],
            "from": {"email": msg.from},
            "subject": msg.subject,
            "content": [{
                "type": "text/html",
                "value": msg.html,
            }],
            "headers": msg.headers,
            "categories": msg.categories,
        })
    }
}

#[async_trait]
impl Provider for SendGridProvider {
    fn name(&self) -> &str {
        "sendgrid"
    }

    async fn send(&self, msg: &OutboundMessage) -> Result<ProviderResponse, ProviderError> {
        debug!(message_id = %msg.message_id, to = %msg.to, "Sending via SendGrid");

        let resp = self
            .client
            .post(SENDGRID_SEND_URL)
            .bearer_auth(self.api_key.expose_secret())
            .timeout(REQUEST_TIMEOUT)
            .json(&Self::payload(msg))
            .send()
            .await
            .map_err(|e| ProviderError::RequestFailed {
                provider: "sendgrid".into(),
                reason: e.to_string(),
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ProviderError::Rejected {
                provider: "sendgrid".into(),
                status: status.as_u16(),
                body,
            });
        }

        Ok(ProviderResponse {
            status_code: status.as_u16(),
            mock: false,
        })
    }
}
