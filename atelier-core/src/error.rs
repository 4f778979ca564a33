use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Failures reading or writing the sessions document.
///
/// The store never surfaces these to callers: load failures degrade to an
/// empty store and save failures are logged while memory stays authoritative.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read sessions document at {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("sessions document at {path} is not valid JSON")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize sessions document")]
    Encode(#[source] serde_json::Error),

    #[error("failed to write sessions document at {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// The opaque image-generation capability failed.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("image backend request failed: {0}")]
    Backend(String),

    #[error("image backend returned status {status}: {body}")]
    BackendStatus { status: u16, body: String },

    #[error("image backend returned no image")]
    EmptyResponse,

    #[error("image generation timed out after {0:?}")]
    Timeout(Duration),

    #[error("generated image could not be decoded")]
    InvalidImage(#[source] image::ImageError),

    #[error("failed to store generated image at {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl From<reqwest::Error> for GenerationError {
    fn from(e: reqwest::Error) -> Self {
        GenerationError::Backend(e.to_string())
    }
}

/// Errors surfaced by the conversation workflows.
#[derive(Debug, Error)]
pub enum ConversationError {
    #[error("Prompt is empty")]
    EmptyPrompt,

    #[error("Missing {0}")]
    MissingField(&'static str),

    #[error("Invalid status: {0}")]
    InvalidStatus(String),

    #[error("Message not found")]
    MessageNotFound,

    #[error("Session not found")]
    SessionNotFound,

    #[error("No valid prompt found")]
    NoValidPrompt,

    #[error("Image generation failed: {0}")]
    Generation(#[from] GenerationError),

    /// A stored turn came back without its bot image message.
    #[error("Stored turn has no image message")]
    IncompleteTurn,
}

impl ConversationError {
    /// `true` for errors caused by the request itself rather than the service.
    pub fn is_client_error(&self) -> bool {
        !matches!(
            self,
            ConversationError::Generation(_) | ConversationError::IncompleteTurn
        )
    }
}
