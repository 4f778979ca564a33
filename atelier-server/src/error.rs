//! Unified server error type.
//!
//! Every handler returns `Result<T, ServerError>`, which implements
//! [`axum::response::IntoResponse`] so errors are automatically converted
//! to a JSON-body HTTP response with an appropriate status code.
//!
//! **Security note:** generation and internal errors are logged with full
//! detail but only a generic message is returned to the caller so that file
//! paths or backend URLs never leak to clients.

use atelier_core::ConversationError;
use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// All errors that can occur in the atelier-server request lifecycle.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The caller referenced a resource that does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The caller sent an invalid or malformed request.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The request body exceeded the configured limit.
    #[error("payload too large: {0}")]
    PayloadTooLarge(String),

    /// The image-generation capability failed; no state was changed.
    #[error("generation failed: {0}")]
    Generation(String),

    /// An unclassified internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ConversationError> for ServerError {
    fn from(e: ConversationError) -> Self {
        match e {
            ConversationError::MessageNotFound | ConversationError::SessionNotFound => {
                ServerError::NotFound(e.to_string())
            }
            ConversationError::EmptyPrompt
            | ConversationError::MissingField(_)
            | ConversationError::InvalidStatus(_)
            | ConversationError::NoValidPrompt => ServerError::BadRequest(e.to_string()),
            ConversationError::Generation(inner) => ServerError::Generation(inner.to_string()),
            ConversationError::IncompleteTurn => ServerError::Internal(e.to_string()),
        }
    }
}

impl From<JsonRejection> for ServerError {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ServerError::PayloadTooLarge(rejection.body_text())
        } else {
            ServerError::BadRequest(rejection.body_text())
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, client_message) = match &self {
            // Client-facing errors: expose the message directly.
            ServerError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
            ServerError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
            ServerError::PayloadTooLarge(m) => (StatusCode::PAYLOAD_TOO_LARGE, m.clone()),

            // Internal errors: log the full detail, keep the response generic.
            ServerError::Generation(m) => {
                error!(error = %m, "image generation failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Image generation failed".to_owned(),
                )
            }
            ServerError::Internal(m) => {
                error!(message = %m, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_owned(),
                )
            }
        };
        (status, Json(json!({ "error": client_message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atelier_core::GenerationError;

    #[test]
    fn conversation_errors_map_to_http_classes() {
        let status = |e: ConversationError| ServerError::from(e).into_response().status();
        assert_eq!(status(ConversationError::EmptyPrompt), StatusCode::BAD_REQUEST);
        assert_eq!(status(ConversationError::NoValidPrompt), StatusCode::BAD_REQUEST);
        assert_eq!(status(ConversationError::MessageNotFound), StatusCode::NOT_FOUND);
        assert_eq!(
            status(ConversationError::Generation(GenerationError::EmptyResponse)),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status(ConversationError::IncompleteTurn),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
