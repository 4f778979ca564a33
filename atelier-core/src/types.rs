//! Conversation data model persisted in the sessions document.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::ids::short_id;

/// Maximum number of characters of the founding prompt kept in a title.
pub const TITLE_MAX_CHARS: usize = 30;

/// Caption prefix of a bot message produced by a new-generation turn.
pub const GENERATED_CAPTION_PREFIX: &str = "Image is generated from prompt:\n";

/// Fixed bot reply closing every successful generation turn.
pub const CLOSING_ACKNOWLEDGEMENT: &str =
    "💥 Boom! Image is generated, do you want H&C to help you with anything else?";

/// Author of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Sender {
    User,
    Bot,
}

/// Like / dislike annotation on a generated image.
///
/// `None` marks a message that can be rated but has not been yet; messages
/// that cannot be rated carry no status at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum MessageStatus {
    Like,
    Dislike,
    None,
}

/// One turn in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub sender: Sender,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<MessageStatus>,
}

impl Message {
    /// A user turn carrying the raw prompt.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            id: short_id(),
            sender: Sender::User,
            text: Some(text.into()),
            image_url: None,
            status: None,
        }
    }

    /// A bot turn carrying a generated image, not yet rated.
    pub fn bot_image(image_url: impl Into<String>, caption: impl Into<String>) -> Self {
        Self {
            id: short_id(),
            sender: Sender::Bot,
            text: Some(caption.into()),
            image_url: Some(image_url.into()),
            status: Some(MessageStatus::None),
        }
    }

    /// The fixed acknowledgement that closes a generation turn.
    pub fn closing_acknowledgement() -> Self {
        Self {
            id: short_id(),
            sender: Sender::Bot,
            text: Some(CLOSING_ACKNOWLEDGEMENT.to_owned()),
            image_url: None,
            status: None,
        }
    }

    pub fn is_user(&self) -> bool {
        self.sender == Sender::User
    }

    /// Message text, or `""` when the message has none.
    pub fn text_or_empty(&self) -> &str {
        self.text.as_deref().unwrap_or("")
    }
}

/// One conversation thread as stored in the document.
///
/// The session id is the key of the document map and is not repeated here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub title: String,
    #[serde(default)]
    pub messages: Vec<Message>,
}

impl Session {
    pub fn new(founding_prompt: &str) -> Self {
        Self {
            title: derive_title(founding_prompt),
            messages: Vec::new(),
        }
    }
}

/// Projection returned by session listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: String,
    pub title: String,
}

/// First [`TITLE_MAX_CHARS`] characters of `prompt`, with `"..."` appended
/// when anything was cut.
pub fn derive_title(prompt: &str) -> String {
    match prompt.char_indices().nth(TITLE_MAX_CHARS) {
        Some((cut, _)) => format!("{}...", &prompt[..cut]),
        None => prompt.to_owned(),
    }
}
