//! Axum router construction.
//!
//! [`build`] assembles the complete application router, including:
//! - Middleware layers (CORS, per-request trace-ID injection)
//! - Optional Swagger UI / OpenAPI spec endpoint (disable with `ATELIER_ENABLE_SWAGGER=false`)
//! - Health / heartbeat route
//! - Session browsing and generation routes
//! - Static serving of generated images under `/static/generated`

pub mod doc;
mod generation;
mod health;
mod sessions;

use crate::middleware::{cors, trace};
use crate::state::AppState;
use atelier_core::generation::GENERATED_URL_PREFIX;
use axum::extract::DefaultBodyLimit;
use axum::{Router, middleware};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::services::ServeDir;
use utoipa_swagger_ui::SwaggerUi;

/// Build the complete Axum [`Router`] for the application.
pub fn build(state: Arc<AppState>) -> Router {
    let mut app = Router::new()
        .merge(health::router())
        .merge(sessions::router())
        .merge(generation::router())
        .nest_service(
            GENERATED_URL_PREFIX,
            ServeDir::new(&state.config.generated_dir),
        );

    if state.config.enable_swagger {
        app = app.merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", doc::get_docs()));
    }

    app
        .layer(DefaultBodyLimit::max(trace::MAX_REQUEST_BODY_BYTES))
        // Outermost layers execute first on the way in.
        .layer(ServiceBuilder::new().layer(cors::cors_layer(state.clone())))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            trace::trace_middleware,
        ))
        .with_state(state)
}

// ── Tests ──────────────────────────────────────────────────────────────────────
