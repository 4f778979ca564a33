//! Conversation browsing routes.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::schemas::session::{
    EmptySessionResponse, MessageResponse, SessionResponse, SessionSummaryResponse,
};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(list_sessions, get_session),
    components(schemas(
        SessionSummaryResponse,
        SessionResponse,
        EmptySessionResponse,
        MessageResponse
    ))
)]
pub struct SessionApi;

/// Register session routes.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/sessions", get(list_sessions))
        .route("/session/{id}", get(get_session))
}

/// All sessions as `{id, title}`, oldest first.
#[utoipa::path(
    get,
    path = "/sessions",
    tag = "sessions",
    responses(
        (status = 200, description = "Session list", body = Vec<SessionSummaryResponse>),
    )
)]
pub async fn list_sessions(State(state): State<Arc<AppState>>) -> Json<Vec<SessionSummaryResponse>> {
    let sessions = state.store.list().await;
    Json(sessions.into_iter().map(Into::into).collect())
}

/// Full session with its messages.
///
/// Unknown ids answer 404 with an empty message list so clients can render
/// the same shape either way.
#[utoipa::path(
    get,
    path = "/session/{id}",
    tag = "sessions",
    params(("id" = String, Path, description = "Session id")),
    responses(
        (status = 200, description = "Session content", body = SessionResponse),
        (status = 404, description = "Unknown session", body = EmptySessionResponse),
    )
)]
pub async fn get_session(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    match state.store.get(&id).await {
        Some(session) => Json(SessionResponse::from(session)).into_response(),
        None => (StatusCode::NOT_FOUND, Json(EmptySessionResponse::default())).into_response(),
    }
}
