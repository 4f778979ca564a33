//! Image generation routes.
//!
//! Thin adapters over [`atelier_core::ConversationController`]: they unpack
//! the JSON body, run the workflow and map the outcome to the response shape.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use tracing::debug;
use utoipa::OpenApi;

use crate::error::ServerError;
use crate::extract::ApiJson;
use crate::schemas::generation::{
    GenerateRequest, GenerateResponse, RegenerateRequest, RegenerateResponse,
    UpdateStatusRequest, UpdateStatusResponse,
};
use crate::state::AppState;

/// Maximum allowed prompt length in bytes.
pub(crate) const MAX_PROMPT_BYTES: usize = 16 * 1024;

#[derive(OpenApi)]
#[openapi(
    paths(generate, regenerate, update_status),
    components(schemas(
        GenerateRequest,
        GenerateResponse,
        RegenerateRequest,
        RegenerateResponse,
        UpdateStatusRequest,
        UpdateStatusResponse
    ))
)]
pub struct GenerationApi;

/// Register generation routes.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/generate", post(generate))
        .route("/regenerate", post(regenerate))
        .route("/update_status", post(update_status))
}

/// Generate an image (`POST /generate`).
///
/// Inside an existing session the prompt is merged with every earlier user
/// prompt of that session before it reaches the model.
#[utoipa::path(
    post,
    path = "/generate",
    tag = "generation",
    request_body = GenerateRequest,
    responses(
        (status = 200, description = "Image generated", body = GenerateResponse),
        (status = 400, description = "Empty, oversized or malformed request"),
        (status = 500, description = "Generation failed"),
    )
)]
pub async fn generate(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<GenerateRequest>,
) -> Result<Json<GenerateResponse>, ServerError> {
    if req.prompt.len() > MAX_PROMPT_BYTES {
        return Err(ServerError::BadRequest(format!(
            "prompt too large ({} bytes); maximum is {} bytes",
            req.prompt.len(),
            MAX_PROMPT_BYTES
        )));
    }
    debug!(session_id = ?req.session_id, "generate request");
    let outcome = state
        .controller
        .generate(&req.prompt, req.session_id.as_deref())
        .await?;
    Ok(Json(outcome.into()))
}

/// Regenerate from the prompt behind a message (`POST /regenerate`).
#[utoipa::path(
    post,
    path = "/regenerate",
    tag = "generation",
    request_body = RegenerateRequest,
    responses(
        (status = 200, description = "Image regenerated", body = RegenerateResponse),
        (status = 400, description = "Missing message_id or no usable prompt"),
        (status = 404, description = "Message not found"),
        (status = 500, description = "Generation failed"),
    )
)]
pub async fn regenerate(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<RegenerateRequest>,
) -> Result<Json<RegenerateResponse>, ServerError> {
    let message_id = req.message_id.unwrap_or_default();
    let outcome = state.controller.regenerate(&message_id).await?;
    Ok(Json(outcome.into()))
}

/// Like / dislike a message (`POST /update_status`).
#[utoipa::path(
    post,
    path = "/update_status",
    tag = "generation",
    request_body = UpdateStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = UpdateStatusResponse),
        (status = 400, description = "Missing message_id or status"),
        (status = 404, description = "Message not found"),
    )
)]
pub async fn update_status(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<UpdateStatusRequest>,
) -> Result<Json<UpdateStatusResponse>, ServerError> {
    let message_id = req.message_id.unwrap_or_default();
    let status = req.status.unwrap_or_default();
    state.controller.update_status(&message_id, &status).await?;
    Ok(Json(UpdateStatusResponse { success: true }))
}
