//! Generate / regenerate / update-status workflows.
//!
//! Every successful generation turn appends exactly three messages in one
//! persisted checkpoint:
//!
//! 1. the user's raw prompt,
//! 2. the bot image message (the regeneration anchor, status `none`),
//! 3. the fixed closing acknowledgement.
//!
//! A new turn inside an existing session is generated from the whole prompt
//! history of that session; a regeneration replays only the single prompt the
//! anchor traces back to. Nothing is written to the store when generation
//! fails.

use std::str::FromStr;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::ConversationError;
use crate::generation::ImageGenerator;
use crate::store::{AppendOutcome, SessionStore};
use crate::types::{GENERATED_CAPTION_PREFIX, Message, MessageStatus};

/// Result of a new-generation turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationOutcome {
    pub session_id: String,
    pub image_url: String,
    /// Id of the bot image message.
    pub message_id: String,
}

/// Result of a regeneration turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegenerationOutcome {
    pub session_id: String,
    /// The raw prompt that was replayed.
    pub prompt: String,
    pub image_url: String,
    pub message_id: String,
}

#[derive(Debug, Clone)]
pub struct ConversationController {
    store: Arc<SessionStore>,
    generator: Arc<ImageGenerator>,
}

impl ConversationController {
    pub fn new(store: Arc<SessionStore>, generator: Arc<ImageGenerator>) -> Self {
        Self { store, generator }
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Generate an image for `prompt`, inside `session_id` when it exists or
    /// in a freshly created session otherwise.
    pub async fn generate(
        &self,
        prompt: &str,
        session_id: Option<&str>,
    ) -> Result<GenerationOutcome, ConversationError> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(ConversationError::EmptyPrompt);
        }

        let mut existing = session_id.filter(|s| !s.is_empty());
        if let Some(sid) = existing {
            if !self.store.contains(sid).await {
                debug!(session_id = sid, "unknown session; a new one will be created");
                existing = None;
            }
        }

        let effective = match existing {
            Some(sid) => {
                let history = self.store.concatenated_prompt_history(sid).await;
                merge_prompt(&history, prompt)
            }
            None => prompt.to_owned(),
        };
        info!(
            session_id = existing.unwrap_or("<new>"),
            prompt_chars = prompt.chars().count(),
            effective_chars = effective.chars().count(),
            "new generation request"
        );

        let image = self.generator.generate(&effective).await?;

        let turn = vec![
            Message::user(prompt),
            Message::bot_image(&image.url, format!("{GENERATED_CAPTION_PREFIX}{effective}")),
            Message::closing_acknowledgement(),
        ];
        let (session_id, ids) = match existing {
            Some(sid) => match self.store.append_messages(sid, turn).await {
                AppendOutcome::Appended { ids } => (sid.to_owned(), ids),
                // Sessions are never deleted, so this only happens if the
                // store was swapped underneath us.
                AppendOutcome::Ignored => {
                    warn!(session_id = sid, "session vanished during generation");
                    return Err(ConversationError::SessionNotFound);
                }
            },
            None => self.store.create_with_messages(prompt, turn).await,
        };

        let message_id = anchor_id(&ids)?;
        info!(%session_id, %message_id, image_url = %image.url, "generation turn stored");
        Ok(GenerationOutcome {
            session_id,
            image_url: image.url,
            message_id,
        })
    }

    /// Replay the raw prompt `message_id` traces back to.
    pub async fn regenerate(&self, message_id: &str) -> Result<RegenerationOutcome, ConversationError> {
        if message_id.is_empty() {
            return Err(ConversationError::MissingField("message_id"));
        }
        let trace = self
            .store
            .resolve_prompt_for_regeneration(message_id)
            .await
            .ok_or(ConversationError::MessageNotFound)?;
        if trace.prompt.is_empty() {
            return Err(ConversationError::NoValidPrompt);
        }
        info!(session_id = %trace.session_id, message_id, "regeneration request");

        let image = self.generator.generate(&trace.prompt).await?;

        let turn = vec![
            Message::user(&trace.prompt),
            Message::bot_image(&image.url, &trace.prompt),
            Message::closing_acknowledgement(),
        ];
        let ids = match self.store.append_messages(&trace.session_id, turn).await {
            AppendOutcome::Appended { ids } => ids,
            AppendOutcome::Ignored => return Err(ConversationError::SessionNotFound),
        };

        Ok(RegenerationOutcome {
            message_id: anchor_id(&ids)?,
            session_id: trace.session_id,
            prompt: trace.prompt,
            image_url: image.url,
        })
    }

    /// Set the like/dislike status of a message.
    pub async fn update_status(&self, message_id: &str, status: &str) -> Result<(), ConversationError> {
        if message_id.is_empty() {
            return Err(ConversationError::MissingField("message_id"));
        }
        if status.is_empty() {
            return Err(ConversationError::MissingField("status"));
        }
        let status = MessageStatus::from_str(status)
            .map_err(|_| ConversationError::InvalidStatus(status.to_owned()))?;

        if self.store.set_status(message_id, status).await {
            Ok(())
        } else {
            Err(ConversationError::MessageNotFound)
        }
    }
}

/// `history + ". " + prompt`, or just `prompt` when there is no history.
pub fn merge_prompt(history: &str, prompt: &str) -> String {
    if history.is_empty() {
        prompt.to_owned()
    } else {
        format!("{history}. {prompt}")
    }
}

/// The bot image message is the second message of a turn.
fn anchor_id(ids: &[String]) -> Result<String, ConversationError> {
    ids.get(1)
        .cloned()
        .ok_or(ConversationError::IncompleteTurn)
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::GenerationParams;
    use crate::generation::testing::RecordingBackend;
    use crate::types::{CLOSING_ACKNOWLEDGEMENT, Sender};
    use std::time::Duration;
    use tempfile::TempDir;

    struct Harness {
        _dir: TempDir,
        backend: Arc<RecordingBackend>,
        controller: ConversationController,
    }

    async fn harness(backend: RecordingBackend) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(backend);
        let store = Arc::new(SessionStore::open(dir.path().join("sessions.json")).await);
        let generator = ImageGenerator::new(
            backend.clone(),
            GenerationParams::default(),
            dir.path().join("generated"),
            Duration::from_secs(5),
        )
        .await
        .unwrap();
        Harness {
            _dir: dir,
            backend,
            controller: ConversationController::new(store, Arc::new(generator)),
        }
    }

    #[test]
    fn merge_prompt_joins_with_separator() {
        assert_eq!(merge_prompt("", "cat"), "cat");
        assert_eq!(merge_prompt("a. b", "c"), "a. b. c");
    }

    #[tokio::test]
    async fn first_turn_creates_session_with_three_messages() {
        let h = harness(RecordingBackend::default()).await;
        let out = h.controller.generate("  a red fox  ", None).await.unwrap();

        let session = h.controller.store().get(&out.session_id).await.unwrap();
        assert_eq!(session.title, "a red fox");
        let msgs = &session.messages;
        assert_eq!(msgs.len(), 3);
        assert_eq!(msgs[0].sender, Sender::User);
        assert_eq!(msgs[0].text.as_deref(), Some("a red fox"));
        assert_eq!(msgs[1].id, out.message_id);
        assert_eq!(msgs[1].image_url.as_deref(), Some(out.image_url.as_str()));
        assert_eq!(
            msgs[1].text.as_deref(),
            Some("Image is generated from prompt:\na red fox")
        );
        assert_eq!(msgs[1].status, Some(MessageStatus::None));
        assert_eq!(msgs[2].text.as_deref(), Some(CLOSING_ACKNOWLEDGEMENT));
        assert!(msgs[2].image_url.is_none());
        assert_eq!(h.backend.prompts(), vec!["a red fox".to_owned()]);
    }

    #[tokio::test]
    async fn follow_up_turn_uses_cumulative_prompt() {
        let h = harness(RecordingBackend::default()).await;
        let first = h.controller.generate("a red fox", None).await.unwrap();
        let second = h
            .controller
            .generate("in the snow", Some(&first.session_id))
            .await
            .unwrap();
        let third = h
            .controller
            .generate("at night", Some(&first.session_id))
            .await
            .unwrap();

        assert_eq!(second.session_id, first.session_id);
        assert_eq!(third.session_id, first.session_id);
        assert_eq!(
            h.backend.prompts(),
            vec![
                "a red fox".to_owned(),
                "a red fox. in the snow".to_owned(),
                "a red fox. in the snow. at night".to_owned(),
            ]
        );

        let session = h.controller.store().get(&first.session_id).await.unwrap();
        assert_eq!(session.messages.len(), 9);
        // The user message keeps the raw prompt, the caption the effective one.
        assert_eq!(session.messages[6].text.as_deref(), Some("at night"));
        assert_eq!(
            session.messages[7].text.as_deref(),
            Some("Image is generated from prompt:\na red fox. in the snow. at night")
        );
        assert_eq!(session.title, "a red fox");
    }

    #[tokio::test]
    async fn unknown_session_id_starts_new_session() {
        let h = harness(RecordingBackend::default()).await;
        let out = h.controller.generate("a boat", Some("00000000")).await.unwrap();
        assert_ne!(out.session_id, "00000000");
        assert_eq!(h.controller.store().list().await.len(), 1);
    }

    #[tokio::test]
    async fn empty_prompt_is_rejected_without_side_effects() {
        let h = harness(RecordingBackend::default()).await;
        let err = h.controller.generate("   ", None).await.unwrap_err();
        assert!(matches!(err, ConversationError::EmptyPrompt));
        assert!(err.is_client_error());
        assert!(h.controller.store().list().await.is_empty());
        assert!(h.backend.prompts().is_empty());
    }

    #[tokio::test]
    async fn generation_failure_leaves_session_unchanged() {
        let ok = harness(RecordingBackend::default()).await;
        let first = ok.controller.generate("a tree", None).await.unwrap();

        // Same store, failing backend.
        let dir = tempfile::tempdir().unwrap();
        let failing = ImageGenerator::new(
            Arc::new(RecordingBackend::failing()),
            GenerationParams::default(),
            dir.path(),
            Duration::from_secs(5),
        )
        .await
        .unwrap();
        let controller = ConversationController::new(ok.controller.store().clone(), Arc::new(failing));

        let err = controller
            .generate("with leaves", Some(&first.session_id))
            .await
            .unwrap_err();
        assert!(matches!(err, ConversationError::Generation(_)));
        assert!(!err.is_client_error());
        let session = controller.store().get(&first.session_id).await.unwrap();
        assert_eq!(session.messages.len(), 3);

        // A failed first turn must not leave an empty session behind either.
        controller.generate("orphan", None).await.unwrap_err();
        assert_eq!(controller.store().list().await.len(), 1);
    }

    #[tokio::test]
    async fn regenerate_replays_raw_prompt_not_history() {
        let h = harness(RecordingBackend::default()).await;
        let first = h.controller.generate("a castle", None).await.unwrap();
        let second = h
            .controller
            .generate("on a hill", Some(&first.session_id))
            .await
            .unwrap();

        let regen = h.controller.regenerate(&second.message_id).await.unwrap();
        assert_eq!(regen.session_id, first.session_id);
        assert_eq!(regen.prompt, "on a hill");
        assert_eq!(h.backend.prompts().last().map(String::as_str), Some("on a hill"));

        let session = h.controller.store().get(&first.session_id).await.unwrap();
        assert_eq!(session.messages.len(), 9);
        let bot = &session.messages[7];
        assert_eq!(bot.id, regen.message_id);
        assert_eq!(bot.text.as_deref(), Some("on a hill"));
        assert_eq!(bot.image_url.as_deref(), Some(regen.image_url.as_str()));
        assert_eq!(bot.status, Some(MessageStatus::None));

        // The regenerated anchor traces back to the same raw prompt.
        let again = h.controller.regenerate(&regen.message_id).await.unwrap();
        assert_eq!(again.prompt, "on a hill");
    }

    #[test]
    fn anchor_of_short_turn_is_a_service_error() {
        let err = anchor_id(&["only-user".to_owned()]).unwrap_err();
        assert!(matches!(err, ConversationError::IncompleteTurn));
        assert!(!err.is_client_error());
        assert_eq!(anchor_id(&["u".into(), "b".into(), "a".into()]).unwrap(), "b");
    }

    #[tokio::test]
    async fn regeneration_failure_leaves_session_unchanged() {
        let ok = harness(RecordingBackend::default()).await;
        let first = ok.controller.generate("a bridge", None).await.unwrap();

        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(RecordingBackend::failing());
        let failing = ImageGenerator::new(
            backend.clone(),
            GenerationParams::default(),
            dir.path(),
            Duration::from_secs(5),
        )
        .await
        .unwrap();
        let controller = ConversationController::new(ok.controller.store().clone(), Arc::new(failing));

        let err = controller.regenerate(&first.message_id).await.unwrap_err();
        assert!(matches!(err, ConversationError::Generation(_)));
        assert!(!err.is_client_error());
        assert_eq!(backend.prompts(), vec!["a bridge".to_owned()]);
        let session = controller.store().get(&first.session_id).await.unwrap();
        assert_eq!(session.messages.len(), 3);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn regenerate_errors_are_client_errors() {
        let h = harness(RecordingBackend::default()).await;
        assert!(matches!(
            h.controller.regenerate("").await,
            Err(ConversationError::MissingField("message_id"))
        ));
        assert!(matches!(
            h.controller.regenerate("nope").await,
            Err(ConversationError::MessageNotFound)
        ));

        // A lone bot message without text has no prompt to replay.
        let sid = h.controller.store().create("x").await;
        let mut bare = Message::closing_acknowledgement();
        bare.text = None;
        let bare_id = bare.id.clone();
        h.controller.store().append_message(&sid, bare).await;
        assert!(matches!(
            h.controller.regenerate(&bare_id).await,
            Err(ConversationError::NoValidPrompt)
        ));
        assert!(h.backend.prompts().is_empty());
    }

    #[tokio::test]
    async fn update_status_validates_and_delegates() {
        let h = harness(RecordingBackend::default()).await;
        let out = h.controller.generate("a kite", None).await.unwrap();

        h.controller.update_status(&out.message_id, "like").await.unwrap();
        let session = h.controller.store().get(&out.session_id).await.unwrap();
        assert_eq!(session.messages[1].status, Some(MessageStatus::Like));

        assert!(matches!(
            h.controller.update_status(&out.message_id, "love").await,
            Err(ConversationError::InvalidStatus(_))
        ));
        assert!(matches!(
            h.controller.update_status("missing1", "dislike").await,
            Err(ConversationError::MessageNotFound)
        ));
        assert!(matches!(
            h.controller.update_status("", "like").await,
            Err(ConversationError::MissingField("message_id"))
        ));
    }

    #[tokio::test]
    async fn concurrent_generations_do_not_overlap() {
        let h = harness(RecordingBackend::with_delay(Duration::from_millis(25))).await;
        let controller = Arc::new(h.controller.clone());

        let tasks: Vec<_> = (0..3)
            .map(|i| {
                let c = Arc::clone(&controller);
                tokio::spawn(async move { c.generate(&format!("scene {i}"), None).await })
            })
            .collect();
        for t in tasks {
            t.await.unwrap().unwrap();
        }

        let mut windows = h.backend.windows.lock().unwrap().clone();
        windows.sort_by_key(|(enter, _)| *enter);
        for pair in windows.windows(2) {
            assert!(pair[0].1 <= pair[1].0);
        }
        assert_eq!(controller.store().list().await.len(), 3);
    }
}
