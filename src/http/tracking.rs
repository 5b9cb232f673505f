//! Tracking endpoints — open beacon, click redirect, unsubscribe, provider
//! webhook, inbound replies, engagement read-back.
//!
//! These endpoints face tracked recipients and provider callbacks, so they
//! never surface internal errors: the beacon always returns its pixel, the
//! click redirect always redirects, and the webhook always acknowledges.

use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use tracing::{debug, warn};
use uuid::Uuid;

use super::AppState;
use crate::engagement::inbound::InboundNotification;
use crate::engagement::webhook::{ProviderEvent, ingest_batch};

/// 1×1 transparent GIF served by the open beacon.
const PIXEL_GIF: &[u8] = &[
    0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x01, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00,
    0x00, 0xFF, 0xFF, 0xFF, 0x21, 0xF9, 0x04, 0x01, 0x00, 0x00, 0x00, 0x00, 0x2C, 0x00, 0x00,
    0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x02, 0x02, 0x44, 0x01, 0x00, 0x3B,
];

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/track", get(track_open))
        .route("/click", get(track_click))
        .route("/webhook", post(webhook))
        .route("/inbound", post(inbound))
        .route("/unsubscribe", get(unsubscribe_get).post(unsubscribe_post))
        .route("/unsubscribes", get(list_unsubscribes))
        .route("/engagement/{message_id}", get(get_engagement))
}

fn message_id_param(params: &HashMap<String, String>) -> Option<Uuid> {
    params
        .get("messageId")
        .or_else(|| params.get("message_id"))
        .and_then(|s| Uuid::parse_str(s.trim()).ok())
}

/// GET /track?messageId=&email= — open beacon. Always 200 with the pixel.
async fn track_open(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    if let Some(id) = message_id_param(&params) {
        if let Err(e) = state.engagement.record_open(id, Utc::now()) {
            warn!(message_id = %id, error = %e, "Failed to record open");
        }
    } else {
        debug!("Open beacon hit without a valid message id");
    }

    ([(header::CONTENT_TYPE, "image/gif")], PIXEL_GIF).into_response()
}

/// GET /click?messageId=&url= — click redirect.
///
/// The redirect fires regardless of whether the tracking write succeeds;
/// tracking must never break the recipient's navigation.
async fn track_click(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let destination = params.get("url").cloned();

    if let Some(id) = message_id_param(&params) {
        let url = destination.as_deref().unwrap_or("");
        if let Err(e) = state.engagement.record_click(id, url, Utc::now()) {
            warn!(message_id = %id, error = %e, "Failed to record click, redirecting anyway");
        }
    }

    match destination {
        Some(url) if !url.trim().is_empty() => Redirect::temporary(&url).into_response(),
        _ => (StatusCode::OK, "missing redirect url").into_response(),
    }
}

/// POST /webhook — provider delivery-event batch.
///
/// Always 200: the body is parsed leniently and unrecognized or malformed
/// entries are skipped, never rejected.
async fn webhook(State(state): State<AppState>, body: String) -> Response {
    let (received, applied) = match serde_json::from_str::<serde_json::Value>(&body) {
        Ok(serde_json::Value::Array(raw_events)) => {
            let events: Vec<ProviderEvent> = raw_events
                .into_iter()
                .filter_map(|v| serde_json::from_value(v).ok())
                .collect();
            (events.len(), ingest_batch(state.engagement.as_ref(), &events))
        }
        Ok(single) => match serde_json::from_value::<ProviderEvent>(single) {
            Ok(event) => (1, ingest_batch(state.engagement.as_ref(), &[event])),
            Err(_) => (0, 0),
        },
        Err(e) => {
            warn!(error = %e, "Webhook body was not JSON, acknowledging anyway");
            (0, 0)
        }
    };

    Json(serde_json::json!({"received": received, "applied": applied})).into_response()
}

/// POST /inbound — inbound-reply notification (JSON or raw MIME).
async fn inbound(State(state): State<AppState>, body: String) -> Response {
    let identity = match serde_json::from_str::<InboundNotification>(&body) {
        Ok(notification) => notification.message_identity(),
        Err(_) => crate::engagement::inbound::extract_message_identity(&body),
    };

    let replied = match identity {
        Some(id) => {
            if let Err(e) = state.engagement.record_reply(id, Utc::now()) {
                warn!(message_id = %id, error = %e, "Failed to record reply");
                false
            } else {
                debug!(message_id = %id, "Inbound reply recorded");
                true
            }
        }
        None => {
            debug!("Inbound message carried no recognizable correlation, ignoring");
            false
        }
    };

    Json(serde_json::json!({"replied": replied})).into_response()
}

fn email_param(params: &HashMap<String, String>, body: Option<&str>) -> Option<String> {
    if let Some(email) = params.get("email") {
        return Some(email.clone());
    }
    let body = body?;
    serde_json::from_str::<serde_json::Value>(body)
        .ok()?
        .get("email")?
        .as_str()
        .map(str::to_string)
}

/// GET /unsubscribe?email= — suppression registration with a confirmation
/// page. Idempotent: an already-suppressed address still gets a success page.
async fn unsubscribe_get(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    match email_param(&params, None) {
        Some(email) => {
            state.suppression.add(&email, "unsubscribed");
            Html(
                "<html><body style=\"font-family:sans-serif;text-align:center;margin-top:80px;\">\
                 <h2>You have been unsubscribed.</h2>\
                 <p>You will not receive further emails from us.</p>\
                 </body></html>",
            )
            .into_response()
        }
        None => (StatusCode::BAD_REQUEST, "missing email").into_response(),
    }
}

/// POST /unsubscribe — same registration, JSON-friendly.
async fn unsubscribe_post(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    body: String,
) -> Response {
    match email_param(&params, Some(&body)) {
        Some(email) => {
            let newly = state.suppression.add(&email, "unsubscribed");
            Json(serde_json::json!({"unsubscribed": true, "alreadySuppressed": !newly}))
                .into_response()
        }
        None => (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": "missing email"})),
        )
            .into_response(),
    }
}

/// GET /unsubscribes — operator inspection of the suppression list.
async fn list_unsubscribes(State(state): State<AppState>) -> Response {
    Json(state.suppression.all()).into_response()
}

/// GET /engagement/{messageId} — read back one engagement record.
async fn get_engagement(State(state): State<AppState>, Path(id): Path<Uuid>) -> Response {
    match state.engagement.get(id) {
        Ok(Some(record)) => Json(record).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"error": "no engagement record"})),
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({"error": e.to_string()})),
        )
            .into_response(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::DateTime;

    use super::*;
    use crate::dispatch::Dispatcher;
    use crate::engagement::{
        DeliveryDisposition, EngagementRecord, EngagementStore, MemoryEngagementStore,
    };
    use crate::error::EngagementError;
    use crate::provider::MockProvider;
    use crate::queue::{MemoryScheduleStore, QueueRunner};
    use crate::suppression::SuppressionList;

    /// Engagement store whose writes always fail, for the
    /// redirect-always-fires property.
    struct FailingEngagementStore;

    impl EngagementStore for FailingEngagementStore {
        fn record_open(&self, _: Uuid, _: DateTime<Utc>) -> Result<(), EngagementError> {
            Err(EngagementError::Store("injected".into()))
        }
        fn record_click(&self, _: Uuid, _: &str, _: DateTime<Utc>) -> Result<(), EngagementError> {
            Err(EngagementError::Store("injected".into()))
        }
        fn record_delivery(
            &self,
            _: Uuid,
            _: DeliveryDisposition,
            _: DateTime<Utc>,
        ) -> Result<(), EngagementError> {
            Err(EngagementError::Store("injected".into()))
        }
        fn record_reply(&self, _: Uuid, _: DateTime<Utc>) -> Result<(), EngagementError> {
            Err(EngagementError::Store("injected".into()))
        }
        fn get(&self, _: Uuid) -> Result<Option<EngagementRecord>, EngagementError> {
            Err(EngagementError::Store("injected".into()))
        }
    }

    fn state_with(engagement: Arc<dyn EngagementStore>) -> AppState {
        let suppression = Arc::new(SuppressionList::new());
        let dispatcher = Arc::new(Dispatcher::new(
            Arc::new(MockProvider::new()),
            suppression.clone(),
            "noreply@localhost".into(),
            None,
        ));
        let schedule = Arc::new(MemoryScheduleStore::new());
        let runner = Arc::new(QueueRunner::new(schedule.clone(), dispatcher.clone()));
        AppState {
            dispatcher,
            engagement,
            suppression,
            schedule,
            runner,
        }
    }

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn beacon_returns_pixel_and_records_open() {
        let engagement = Arc::new(MemoryEngagementStore::new());
        let state = state_with(engagement.clone());
        let id = Uuid::new_v4();

        let response = track_open(
            State(state),
            Query(params(&[
                ("messageId", &id.to_string()),
                ("email", "u@e.com"),
            ])),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert!(engagement.get(id).unwrap().unwrap().opened);
    }

    #[tokio::test]
    async fn beacon_still_200_with_garbage_params() {
        let state = state_with(Arc::new(MemoryEngagementStore::new()));
        let response = track_open(State(state), Query(params(&[("messageId", "nope")]))).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn click_redirects_and_records() {
        let engagement = Arc::new(MemoryEngagementStore::new());
        let state = state_with(engagement.clone());
        let id = Uuid::new_v4();

        let response = track_click(
            State(state),
            Query(params(&[
                ("messageId", &id.to_string()),
                ("url", "https://x.com/page"),
            ])),
        )
        .await;

        assert!(response.status().is_redirection());
        let record = engagement.get(id).unwrap().unwrap();
        assert!(record.clicked);
        assert_eq!(record.clicked_url.as_deref(), Some("https://x.com/page"));
    }

    #[tokio::test]
    async fn redirect_fires_even_when_tracking_write_fails() {
        let state = state_with(Arc::new(FailingEngagementStore));
        let id = Uuid::new_v4();

        let response = track_click(
            State(state),
            Query(params(&[
                ("messageId", &id.to_string()),
                ("url", "https://x.com"),
            ])),
        )
        .await;

        assert!(response.status().is_redirection());
    }

    #[tokio::test]
    async fn webhook_acknowledges_partially_malformed_batch() {
        let engagement = Arc::new(MemoryEngagementStore::new());
        let state = state_with(engagement.clone());
        let id = Uuid::new_v4();

        let body = format!(
            r#"[{{"event":"delivered","messageId":"{id}"}}, {{"bogus":true}}, 42]"#
        );
        let response = webhook(State(state), body).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(engagement.get(id).unwrap().unwrap().delivered);
    }

    #[tokio::test]
    async fn webhook_acknowledges_non_json_body() {
        let state = state_with(Arc::new(MemoryEngagementStore::new()));
        let response = webhook(State(state), "not json at all".to_string()).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn inbound_json_marks_reply() {
        let engagement = Arc::new(MemoryEngagementStore::new());
        let state = state_with(engagement.clone());
        let id = Uuid::new_v4();

        let body = format!(r#"{{"messageId":"{id}"}}"#);
        let response = inbound(State(state), body).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(engagement.get(id).unwrap().unwrap().replied);
    }

    #[tokio::test]
    async fn inbound_raw_mime_marks_reply() {
        let engagement = Arc::new(MemoryEngagementStore::new());
        let state = state_with(engagement.clone());
        let id = Uuid::new_v4();

        let body = format!("From: a@b.c\r\nIn-Reply-To: <{id}@mailflow>\r\n\r\nthanks!\r\n");
        inbound(State(state), body).await;
        assert!(engagement.get(id).unwrap().unwrap().replied);
    }

    #[tokio::test]
    async fn unsubscribe_is_idempotent() {
        let state = state_with(Arc::new(MemoryEngagementStore::new()));

        let first = unsubscribe_post(
            State(state.clone()),
            Query(params(&[("email", "u@e.com")])),
            String::new(),
        )
        .await;
        assert_eq!(first.status(), StatusCode::OK);

        let second = unsubscribe_post(
            State(state.clone()),
            Query(params(&[("email", "U@E.com")])),
            String::new(),
        )
        .await;
        assert_eq!(second.status(), StatusCode::OK);

        assert!(state.suppression.is_suppressed("u@e.com"));
        assert_eq!(state.suppression.all().len(), 1);
    }

    #[tokio::test]
    async fn unsubscribe_post_reads_email_from_json_body() {
        let state = state_with(Arc::new(MemoryEngagementStore::new()));
        unsubscribe_post(
            State(state.clone()),
            Query(HashMap::new()),
            r#"{"email":"body@e.com"}"#.to_string(),
        )
        .await;
        assert!(state.suppression.is_suppressed("body@e.com"));
    }

    #[tokio::test]
    async fn engagement_read_back_404_when_absent() {
        let state = state_with(Arc::new(MemoryEngagementStore::new()));
        let response = get_engagement(State(state), Path(Uuid::new_v4())).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
