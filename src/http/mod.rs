//! External HTTP surface.

mod scheduled;
mod tracking;

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::cors::CorsLayer;

use crate::dispatch::Dispatcher;
use crate::engagement::EngagementStore;
use crate::error::DispatchError;
use crate::message::{DispatchOutcome, SendRequest};
use crate::queue::{QueueRunner, ScheduleStore};
use crate::suppression::SuppressionList;

/// Shared state for all routes.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub engagement: Arc<dyn EngagementStore>,
    pub suppression: Arc<SuppressionList>,
    pub schedule: Arc<dyn ScheduleStore>,
    pub runner: Arc<QueueRunner>,
}

/// Build the full application router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/send", post(send))
        .merge(tracking::routes())
        .merge(scheduled::routes())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// GET /health — liveness probe.
async fn health() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok"}))
}

/// POST /send — immediate dispatch of one message.
///
/// Suppression is a success-like terminal outcome (200 with
/// `suppressed: true`), distinct from validation (400) and provider
/// failure (502).
async fn send(State(state): State<AppState>, Json(req): Json<SendRequest>) -> impl IntoResponse {
    match state.dispatcher.dispatch(req).await {
        Ok(DispatchOutcome::Sent(result)) => (StatusCode::OK, Json(serde_json::json!(result))),
        Ok(DispatchOutcome::Suppressed) => (
            StatusCode::OK,
            Json(serde_json::json!({"suppressed": true})),
        ),
        Err(DispatchError::Validation(reason)) => (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": reason})),
        ),
        Err(DispatchError::Provider(e)) => (
            StatusCode::BAD_GATEWAY,
            Json(serde_json::json!({"error": e.to_string()})),
        ),
    }
}
