//! Request extractors whose rejections use the JSON error shape.

use axum::extract::FromRequest;

use crate::error::ServerError;

/// `axum::Json` with rejections turned into [`ServerError`], so a malformed
/// body or a missing content type still answers with `{"error": "..."}`.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ServerError))]
pub struct ApiJson<T>(pub T);
