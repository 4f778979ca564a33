//! atelier-core – conversation state and prompt threading for image generation.
//!
//! The crate is split along the three collaborators of a generation turn:
//!
//! - [`store::SessionStore`] owns every conversation and its JSON document.
//! - [`generation::ImageGenerator`] serialises access to an opaque
//!   [`generation::ImageBackend`] and writes the produced image to disk.
//! - [`controller::ConversationController`] composes the two into the
//!   generate / regenerate / update-status workflows.

pub mod controller;
pub mod error;
pub mod generation;
pub mod ids;
pub mod store;
pub mod types;

pub use controller::{ConversationController, GenerationOutcome, RegenerationOutcome};
pub use error::{ConversationError, GenerationError, StoreError};
pub use generation::{
    GeneratedImage, GenerationParams, GenerationRequest, HttpImageBackend, ImageBackend,
    ImageGenerator,
};
pub use store::{AppendOutcome, PromptTrace, SessionStore};
pub use types::{Message, MessageStatus, Sender, Session, SessionSummary};
