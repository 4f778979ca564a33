//! Shared application state injected into every Axum handler.

use std::sync::Arc;

use atelier_core::{ConversationController, SessionStore};

use crate::config::Config;

/// State shared across all HTTP handlers.
#[derive(Clone, Debug)]
pub struct AppState {
    /// Server configuration (env-derived).
    pub config: Arc<Config>,
    /// Conversation log; also owned by the controller.
    pub store: Arc<SessionStore>,
    /// Generate / regenerate / status workflows.
    pub controller: Arc<ConversationController>,
}
