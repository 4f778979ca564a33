//! Durable log of conversations backed by a single JSON document.
//!
//! The whole store is one document mapping session id → `{title, messages}`.
//! It is loaded once by [`SessionStore::open`] and rewritten in full after
//! every mutation while the write guard is held, so concurrent workflows can
//! never interleave partial writes.
//!
//! Persistence is best effort: an unreadable document starts an empty store
//! and a failed save is logged and swallowed. The in-memory state stays
//! authoritative for the lifetime of the process.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::error::StoreError;
use crate::ids::unique_short_id;
use crate::types::{Message, MessageStatus, Session, SessionSummary};

/// Insertion-ordered mapping; session creation order survives save/load.
type Document = IndexMap<String, Session>;

/// Result of appending to a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppendOutcome {
    /// Messages were appended; `ids` are their final ids in append order.
    Appended { ids: Vec<String> },
    /// The session does not exist; nothing was changed.
    Ignored,
}

/// The prompt a message traces back to, and the session it lives in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTrace {
    pub session_id: String,
    pub prompt: String,
}

#[derive(Debug, Default)]
struct StoreState {
    sessions: Document,
    /// message id → session id, first occurrence wins.
    message_index: HashMap<String, String>,
}

impl StoreState {
    fn from_document(sessions: Document) -> Self {
        let mut message_index = HashMap::new();
        for (sid, session) in &sessions {
            for msg in &session.messages {
                message_index
                    .entry(msg.id.clone())
                    .or_insert_with(|| sid.clone());
            }
        }
        Self {
            sessions,
            message_index,
        }
    }

    fn id_taken(&self, id: &str) -> bool {
        self.sessions.contains_key(id) || self.message_index.contains_key(id)
    }

    fn insert_session(&mut self, founding_prompt: &str) -> String {
        let id = unique_short_id(|candidate| self.id_taken(candidate));
        self.sessions.insert(id.clone(), Session::new(founding_prompt));
        id
    }

    /// Append `messages` to `session_id`, re-drawing any id already in use.
    fn append(&mut self, session_id: &str, messages: Vec<Message>) -> AppendOutcome {
        if !self.sessions.contains_key(session_id) {
            return AppendOutcome::Ignored;
        }
        let mut ids = Vec::with_capacity(messages.len());
        for mut msg in messages {
            if self.id_taken(&msg.id) {
                let fresh = unique_short_id(|candidate| self.id_taken(candidate));
                warn!(old = %msg.id, new = %fresh, "message id collision; re-drawing id");
                msg.id = fresh;
            }
            self.message_index
                .insert(msg.id.clone(), session_id.to_owned());
            ids.push(msg.id.clone());
            if let Some(session) = self.sessions.get_mut(session_id) {
                session.messages.push(msg);
            }
        }
        AppendOutcome::Appended { ids }
    }

    /// Locate a message: `(session id, position in that session)`.
    fn locate(&self, message_id: &str) -> Option<(&str, usize)> {
        let sid = self.message_index.get(message_id)?;
        let pos = self
            .sessions
            .get(sid)?
            .messages
            .iter()
            .position(|m| m.id == message_id)?;
        Some((sid.as_str(), pos))
    }
}

/// Owner of every conversation and of the persisted sessions document.
#[derive(Debug)]
pub struct SessionStore {
    path: PathBuf,
    state: RwLock<StoreState>,
}

impl SessionStore {
    /// Load the document at `path`.
    ///
    /// A missing file yields an empty store; an unreadable or corrupt file is
    /// logged and also yields an empty store.
    pub async fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let sessions = match read_document(&path).await {
            Ok(Some(doc)) => {
                info!(path = %path.display(), sessions = doc.len(), "sessions document loaded");
                doc
            }
            Ok(None) => {
                info!(path = %path.display(), "no sessions document; starting fresh");
                Document::new()
            }
            Err(e) => {
                warn!(error = %e, "could not load sessions document; starting fresh");
                Document::new()
            }
        };
        Self {
            path,
            state: RwLock::new(StoreState::from_document(sessions)),
        }
    }

    /// Path of the persisted document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every session as `{id, title}`, in creation order.
    pub async fn list(&self) -> Vec<SessionSummary> {
        let state = self.state.read().await;
        state
            .sessions
            .iter()
            .map(|(id, s)| SessionSummary {
                id: id.clone(),
                title: s.title.clone(),
            })
            .collect()
    }

    pub async fn get(&self, session_id: &str) -> Option<Session> {
        self.state.read().await.sessions.get(session_id).cloned()
    }

    pub async fn contains(&self, session_id: &str) -> bool {
        self.state.read().await.sessions.contains_key(session_id)
    }

    /// Create an empty session titled after `founding_prompt`; returns its id.
    pub async fn create(&self, founding_prompt: &str) -> String {
        let mut state = self.state.write().await;
        let id = state.insert_session(founding_prompt);
        debug!(session_id = %id, "session created");
        self.persist(&state).await;
        id
    }

    /// Create a session and append its first turn as one checkpoint.
    ///
    /// Returns the new session id and the final message ids.
    pub async fn create_with_messages(
        &self,
        founding_prompt: &str,
        messages: Vec<Message>,
    ) -> (String, Vec<String>) {
        let mut state = self.state.write().await;
        let id = state.insert_session(founding_prompt);
        let ids = match state.append(&id, messages) {
            AppendOutcome::Appended { ids } => ids,
            AppendOutcome::Ignored => Vec::new(),
        };
        debug!(session_id = %id, messages = ids.len(), "session created with first turn");
        self.persist(&state).await;
        (id, ids)
    }

    /// Append one message. Unknown sessions are ignored, not an error.
    pub async fn append_message(&self, session_id: &str, message: Message) -> AppendOutcome {
        self.append_messages(session_id, vec![message]).await
    }

    /// Append every message in order, then persist once.
    pub async fn append_messages(&self, session_id: &str, messages: Vec<Message>) -> AppendOutcome {
        let mut state = self.state.write().await;
        let outcome = state.append(session_id, messages);
        match &outcome {
            AppendOutcome::Appended { ids } => {
                debug!(session_id, messages = ids.len(), "messages appended");
                self.persist(&state).await;
            }
            AppendOutcome::Ignored => {
                warn!(session_id, "append to unknown session ignored");
            }
        }
        outcome
    }

    /// Set the status of the message with `message_id` anywhere in the store.
    ///
    /// Returns `false` (and writes nothing) when no message matches.
    pub async fn set_status(&self, message_id: &str, status: MessageStatus) -> bool {
        let mut state = self.state.write().await;
        let Some((sid, pos)) = state.locate(message_id).map(|(s, p)| (s.to_owned(), p)) else {
            return false;
        };
        if let Some(msg) = state
            .sessions
            .get_mut(&sid)
            .and_then(|s| s.messages.get_mut(pos))
        {
            msg.status = Some(status);
        }
        debug!(message_id, %status, "message status updated");
        self.persist(&state).await;
        true
    }

    /// Trace `message_id` back to the raw prompt that produced it.
    ///
    /// When the previous message in the same session was sent by the user its
    /// text is returned; otherwise the message's own text (possibly empty).
    pub async fn resolve_prompt_for_regeneration(&self, message_id: &str) -> Option<PromptTrace> {
        let state = self.state.read().await;
        let (sid, pos) = state.locate(message_id)?;
        let messages = &state.sessions.get(sid)?.messages;
        let source = match pos.checked_sub(1).map(|i| &messages[i]) {
            Some(prev) if prev.is_user() => prev,
            _ => &messages[pos],
        };
        Some(PromptTrace {
            session_id: sid.to_owned(),
            prompt: source.text_or_empty().to_owned(),
        })
    }

    /// Non-empty user prompts of the session, oldest first, joined by `". "`.
    pub async fn concatenated_prompt_history(&self, session_id: &str) -> String {
        let state = self.state.read().await;
        let Some(session) = state.sessions.get(session_id) else {
            return String::new();
        };
        session
            .messages
            .iter()
            .filter(|m| m.is_user())
            .filter_map(|m| m.text.as_deref())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(". ")
    }

    /// Rewrite the document from the current state, e.g. at shutdown.
    pub async fn flush(&self) {
        let state = self.state.read().await;
        self.persist(&state).await;
    }

    async fn persist(&self, state: &StoreState) {
        if let Err(e) = write_document(&self.path, &state.sessions).await {
            error!(error = %e, "failed to save sessions document; keeping in-memory state");
        }
    }
}

async fn read_document(path: &Path) -> Result<Option<Document>, StoreError> {
    let bytes = match tokio::fs::read(path).await {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(StoreError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|source| StoreError::Decode {
            path: path.to_path_buf(),
            source,
        })
}

/// Pretty-printed UTF-8 JSON written to a sibling temp file, then renamed
/// over the target.
async fn write_document(path: &Path, doc: &Document) -> Result<(), StoreError> {
    let json = serde_json::to_vec_pretty(doc).map_err(StoreError::Encode)?;
    let write_err = |source| StoreError::Write {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    tokio::fs::write(&tmp, &json).await.map_err(write_err)?;
    tokio::fs::rename(&tmp, path).await.map_err(write_err)?;
    Ok(())
}

// ── Tests ──────────────────────────────────────────────────────────────────────
