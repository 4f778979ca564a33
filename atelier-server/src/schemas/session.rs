use atelier_core::{Message, Session, SessionSummary};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Entry of `GET /sessions`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SessionSummaryResponse {
    pub id: String,
    pub title: String,
}

/// Body of `GET /session/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SessionResponse {
    pub title: String,
    pub messages: Vec<MessageResponse>,
}

/// Body of `GET /session/{id}` for an unknown id (HTTP 404).
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct EmptySessionResponse {
    pub messages: Vec<MessageResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub id: String,
    /// `"user"` or `"bot"`.
    pub sender: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// `"like"`, `"dislike"` or `"none"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl From<SessionSummary> for SessionSummaryResponse {
    fn from(s: SessionSummary) -> Self {
        Self {
            id: s.id,
            title: s.title,
        }
    }
}

impl From<Session> for SessionResponse {
    fn from(s: Session) -> Self {
        Self {
            title: s.title,
            messages: s.messages.into_iter().map(MessageResponse::from).collect(),
        }
    }
}

impl From<Message> for MessageResponse {
    fn from(m: Message) -> Self {
        Self {
            id: m.id,
            sender: m.sender.to_string(),
            text: m.text,
            image_url: m.image_url,
            status: m.status.map(|s| s.to_string()),
        }
    }
}
