use atelier_core::{GenerationOutcome, RegenerationOutcome};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Request body for `POST /generate`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GenerateRequest {
    /// New prompt; merged with the session's history when `session_id` exists.
    #[serde(default)]
    pub prompt: String,
    /// Conversation to continue; a new one is started when absent or unknown.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GenerateResponse {
    pub session_id: String,
    pub image_url: String,
    /// Id of the bot image message; pass it to `/regenerate`.
    pub message_id: String,
}

/// Request body for `POST /regenerate`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RegenerateRequest {
    #[serde(default)]
    pub message_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RegenerateResponse {
    pub session_id: String,
    /// The raw prompt that was replayed.
    pub prompt: String,
    pub image_url: String,
    pub message_id: String,
}

/// Request body for `POST /update_status`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpdateStatusRequest {
    #[serde(default)]
    pub message_id: Option<String>,
    /// `"like"`, `"dislike"` or `"none"`.
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpdateStatusResponse {
    pub success: bool,
}

impl From<GenerationOutcome> for GenerateResponse {
    fn from(o: GenerationOutcome) -> Self {
        Self {
            session_id: o.session_id,
            image_url: o.image_url,
            message_id: o.message_id,
        }
    }
}

impl From<RegenerationOutcome> for RegenerateResponse {
    fn from(o: RegenerationOutcome) -> Self {
        Self {
            session_id: o.session_id,
            prompt: o.prompt,
            image_url: o.image_url,
            message_id: o.message_id,
        }
    }
}
