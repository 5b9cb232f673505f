//! Scheduled-send CRUD endpoints and the manual queue trigger.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use super::AppState;
use crate::error::QueueError;
use crate::message::SendRequest;
use crate::queue::ScheduleState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/scheduled", post(create).get(list))
        .route("/scheduled/process", post(process))
        .route(
            "/scheduled/{id}",
            get(get_one).put(update).delete(remove),
        )
        .route("/scheduled/{id}/reset", post(reset))
}

#[derive(Debug, Deserialize)]
struct CreateScheduled {
    request: SendRequest,
    #[serde(rename = "dueAt", alias = "due_at")]
    due_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct UpdateScheduled {
    #[serde(default)]
    request: Option<SendRequest>,
    #[serde(default, rename = "dueAt", alias = "due_at")]
    due_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct ListFilter {
    #[serde(default)]
    state: Option<ScheduleState>,
}

fn queue_error(e: QueueError) -> Response {
    let status = match e {
        QueueError::NotFound { .. } => StatusCode::NOT_FOUND,
        QueueError::InvalidState { .. } | QueueError::NotTerminal { .. } => StatusCode::CONFLICT,
    };
    (status, Json(serde_json::json!({"error": e.to_string()}))).into_response()
}

/// POST /scheduled — create a deferred send.
async fn create(
    State(state): State<AppState>,
    Json(body): Json<CreateScheduled>,
) -> impl IntoResponse {
    let entry = state.schedule.add(body.request, body.due_at).await;
    (StatusCode::CREATED, Json(entry))
}

/// GET /scheduled[?state=] — list entries, optionally filtered by state.
async fn list(State(state): State<AppState>, Query(filter): Query<ListFilter>) -> Response {
    let entries = match filter.state {
        Some(s) => state.schedule.list_by_state(s).await,
        None => state.schedule.list().await,
    };
    Json(entries).into_response()
}

/// GET /scheduled/{id}
async fn get_one(State(state): State<AppState>, Path(id): Path<Uuid>) -> Response {
    match state.schedule.get(id).await {
        Some(entry) => Json(entry).into_response(),
        None => queue_error(QueueError::NotFound { id }),
    }
}

/// PUT /scheduled/{id} — update payload/due time, only while `scheduled`.
async fn update(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateScheduled>,
) -> Response {
    match state.schedule.update(id, body.request, body.due_at).await {
        Ok(entry) => Json(entry).into_response(),
        Err(e) => queue_error(e),
    }
}

/// DELETE /scheduled/{id} — remove an entry in any state.
async fn remove(State(state): State<AppState>, Path(id): Path<Uuid>) -> Response {
    match state.schedule.remove(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => queue_error(e),
    }
}

/// POST /scheduled/{id}/reset — explicit replay of a terminal entry.
async fn reset(State(state): State<AppState>, Path(id): Path<Uuid>) -> Response {
    match state.schedule.reset(id).await {
        Ok(entry) => Json(entry).into_response(),
        Err(e) => queue_error(e),
    }
}

/// POST /scheduled/process — run one queue tick now.
async fn process(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.runner.tick().await)
}
