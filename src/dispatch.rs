//! Dispatch engine — validation, suppression gate, instrumentation, header
//! assembly, provider hand-off.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::error::DispatchError;
use crate::instrument::instrument;
use crate::message::{DispatchOutcome, DispatchResult, OutboundMessage, SendRequest};
use crate::provider::Provider;
use crate::suppression::SuppressionList;

/// Correlation header stamped on every outbound message.
pub const CORRELATION_HEADER: &str = "X-Mailflow-Id";

/// Orchestrates a single send request end to end.
pub struct Dispatcher {
    provider: Arc<dyn Provider>,
    suppression: Arc<SuppressionList>,
    default_sender: String,
    base_url: Option<String>,
}

impl Dispatcher {
    pub fn new(
        provider: Arc<dyn Provider>,
        suppression: Arc<SuppressionList>,
        default_sender: String,
        base_url: Option<String>,
    ) -> Self {
        Self {
            provider,
            suppression,
            default_sender,
            base_url,
        }
    }

    /// Dispatch one message.
    ///
    /// Sequence: validate → suppression gate → instrument → assemble headers →
    /// provider send. Validation happens before any side effect; a suppressed
    /// recipient short-circuits before instrumentation and never reaches the
    /// provider.
    pub async fn dispatch(&self, req: SendRequest) -> Result<DispatchOutcome, DispatchError> {
        validate(&req)?;

        if self.suppression.is_suppressed(&req.to) {
            info!(to = %req.to, "Recipient suppressed, send short-circuited");
            return Ok(DispatchOutcome::Suppressed);
        }

        let message_id = req.message_id.unwrap_or_else(Uuid::new_v4);
        let html = instrument(&req.html, message_id, &req.to, self.base_url.as_deref());

        let mut headers = req.headers;
        headers.insert(CORRELATION_HEADER.to_string(), message_id.to_string());
        headers.insert(
            "Message-ID".to_string(),
            format!("<{message_id}@mailflow>"),
        );

        let msg = OutboundMessage {
            message_id,
            to: req.to,
            from: req.from.unwrap_or_else(|| self.default_sender.clone()),
            subject: req.subject,
            html,
            headers,
            categories: req.categories,
            custom_args: req.custom_args,
        };

        let resp = self.provider.send(&msg).await?;
        info!(
            message_id = %message_id,
            provider = self.provider.name(),
            status = resp.status_code,
            mock = resp.mock,
            "Message dispatched"
        );

        Ok(DispatchOutcome::Sent(DispatchResult {
            message_id,
            status_code: resp.status_code,
            mock: resp.mock,
            provider: self.provider.name().to_string(),
            sent_at: Utc::now(),
        }))
    }
}

fn validate(req: &SendRequest) -> Result<(), DispatchError> {
    if req.to.trim().is_empty() {
        return Err(DispatchError::Validation("recipient is required".into()));
    }
    if req.subject.trim().is_empty() {
        return Err(DispatchError::Validation("subject is required".into()));
    }
    if req.html.trim().is_empty() {
        return Err(DispatchError::Validation("html body is required".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::provider::MockProvider;

    fn dispatcher_with(
        provider: Arc<MockProvider>,
        suppression: Arc<SuppressionList>,
    ) -> Dispatcher {
        Dispatcher::new(
            provider,
            suppression,
            "noreply@localhost".into(),
            Some("https://mail.example.com".into()),
        )
    }

    #[tokio::test]
    async fn mock_dispatch_returns_mock_result_with_identity() {
        let provider = Arc::new(MockProvider::new());
        let d = dispatcher_with(provider.clone(), Arc::new(SuppressionList::new()));

        let req = SendRequest::new(
            "user@example.com",
            "Hi",
            r#"<a href="https://x.com">go</a>"#,
        );
        let outcome = d.dispatch(req).await.unwrap();
        let result = outcome.result().expect("sent");
        assert!(result.mock);
        assert!(!result.message_id.is_nil());
        assert_eq!(provider.sent_count(), 1);
    }

    #[tokio::test]
    async fn suppressed_recipient_short_circuits_with_zero_provider_calls() {
        let provider = Arc::new(MockProvider::new());
        let suppression = Arc::new(SuppressionList::new());
        suppression.add("blocked@example.com", "unsubscribed");
        let d = dispatcher_with(provider.clone(), suppression);

        let outcome = d
            .dispatch(SendRequest::new("Blocked@Example.com", "Hi", "<p>x</p>"))
            .await
            .unwrap();
        assert!(outcome.is_suppressed());
        assert_eq!(provider.sent_count(), 0);
    }

    #[tokio::test]
    async fn validation_rejects_empty_fields_before_any_side_effect() {
        let provider = Arc::new(MockProvider::new());
        let d = dispatcher_with(provider.clone(), Arc::new(SuppressionList::new()));

        for req in [
            SendRequest::new("", "Hi", "<p>x</p>"),
            SendRequest::new("a@b.c", "  ", "<p>x</p>"),
            SendRequest::new("a@b.c", "Hi", ""),
        ] {
            let err = d.dispatch(req).await.unwrap_err();
            assert!(matches!(err, DispatchError::Validation(_)));
        }
        assert_eq!(provider.sent_count(), 0);
    }

    #[tokio::test]
    async fn caller_supplied_message_id_is_honored() {
        let provider = Arc::new(MockProvider::new());
        let d = dispatcher_with(provider, Arc::new(SuppressionList::new()));

        let id = Uuid::new_v4();
        let req = SendRequest::new("a@b.c", "Hi", "<p>x</p>").with_message_id(id);
        let outcome = d.dispatch(req).await.unwrap();
        assert_eq!(outcome.result().unwrap().message_id, id);
    }
}
