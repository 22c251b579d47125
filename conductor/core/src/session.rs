//! Conversation Store
//!
//! The ordered log of messages exchanged in one session.
//!
//! # Design Philosophy
//!
//! The log only grows. Entries are never removed or reordered, and the only
//! entry that may still change is the single in-flight model message. All
//! changes arrive as [`MessagePatch`]es through [`Session::patch_last`], which
//! refuses anything that would rewrite settled history.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::messages::{now_ms, ConductorMessage, Message, MessageId, MessagePatch, SessionId};

/// Why an append was refused
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum StoreError {
    /// A model message is still in flight
    #[error("Message {0} is still in flight")]
    InFlight(MessageId),
}

/// Session metadata
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionMetadata {
    /// When the session was created (Unix timestamp ms)
    pub created_at: u64,
    /// When the session was last active (Unix timestamp ms)
    pub last_active_at: u64,
    /// Total messages appended
    pub message_count: u32,
}

impl SessionMetadata {
    /// Create new metadata
    pub fn new() -> Self {
        let now = now_ms();
        Self {
            created_at: now,
            last_active_at: now,
            message_count: 0,
        }
    }

    /// Update last active timestamp
    pub fn touch(&mut self) {
        self.last_active_at = now_ms();
    }

    /// Increment message count
    pub fn add_message(&mut self) {
        self.message_count += 1;
        self.touch();
    }
}

impl Default for SessionMetadata {
    fn default() -> Self {
        Self::new()
    }
}

/// A conversation session
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Session {
    /// Unique session ID
    pub id: SessionId,
    /// Session metadata
    pub metadata: SessionMetadata,
    /// Conversation history, in creation order
    messages: Vec<Message>,
}

impl Session {
    /// Create a new session
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message to the end of the log
    ///
    /// A second in-flight model message is refused.
    pub fn append(&mut self, message: Message) -> Result<MessageId, StoreError> {
        if message.is_in_flight() {
            if let Some(current) = self.in_flight() {
                return Err(StoreError::InFlight(current.id));
            }
        }
        let id = message.id;
        self.messages.push(message);
        self.metadata.add_message();
        Ok(id)
    }

    /// Append a user message and its model placeholder together
    ///
    /// Either both land or neither does. Returns the placeholder's id.
    pub fn append_exchange(
        &mut self,
        user: Message,
        placeholder: Message,
    ) -> Result<MessageId, StoreError> {
        if let Some(current) = self.in_flight() {
            return Err(StoreError::InFlight(current.id));
        }
        self.append(user)?;
        self.append(placeholder)
    }

    /// Patch the last message matching `predicate`
    ///
    /// Returns the id of the patched message, or `None` when nothing matched
    /// or the match has already settled.
    pub fn patch_last<P>(&mut self, predicate: P, patch: &MessagePatch) -> Option<MessageId>
    where
        P: Fn(&Message) -> bool,
    {
        let msg = self.messages.iter_mut().rev().find(|m| predicate(m))?;

        if !msg.is_loading {
            tracing::warn!(message_id = %msg.id, "Refusing patch to settled message");
            return None;
        }

        apply_patch(msg, patch);
        let id = msg.id;
        self.metadata.touch();
        Some(id)
    }

    /// Patch the last model message
    pub fn patch_last_model(&mut self, patch: &MessagePatch) -> Option<MessageId> {
        self.patch_last(Message::is_model, patch)
    }

    /// Replay a conductor notification
    ///
    /// Lets an observer keep its own copy of the conversation.
    pub fn apply(&mut self, notification: &ConductorMessage) {
        match notification {
            ConductorMessage::Appended(message) => {
                if let Err(e) = self.append(message.clone()) {
                    tracing::warn!(error = %e, "Dropping replayed append");
                }
            }
            ConductorMessage::Patched { message_id, patch } => {
                self.patch_last(|m| m.id == *message_id, patch);
            }
            ConductorMessage::State { .. } | ConductorMessage::Error { .. } => {}
        }
    }

    /// Get all messages
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Get message by ID
    pub fn get(&self, id: MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    /// The most recent model message
    pub fn last_model(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.is_model())
    }

    /// The unresolved model message, if any
    pub fn in_flight(&self) -> Option<&Message> {
        self.last_model().filter(|m| m.is_loading)
    }

    /// Number of unresolved model messages (0 or 1)
    pub fn in_flight_count(&self) -> usize {
        self.messages.iter().filter(|m| m.is_in_flight()).count()
    }

    /// Get current message count
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether no message has been appended
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Apply a patch to an unsettled message
///
/// Text fields may only grow while loading; a terminal patch may replace the
/// answer once (error text). The structured response is set at most once.
fn apply_patch(msg: &mut Message, patch: &MessagePatch) {
    let terminal = patch.is_terminal();

    if let Some(ref thoughts) = patch.thoughts {
        if extends(msg.thoughts.as_deref(), thoughts) {
            msg.thoughts = Some(thoughts.clone());
        } else {
            tracing::warn!(message_id = %msg.id, "Refusing non-appending thoughts patch");
        }
    }

    if let Some(ref answer) = patch.answer {
        if terminal || extends(msg.answer.as_deref(), answer) {
            msg.answer = Some(answer.clone());
        } else {
            tracing::warn!(message_id = %msg.id, "Refusing non-appending answer patch");
        }
    }

    if let Some(ref json) = patch.json_response {
        if msg.json_response.is_none() {
            msg.json_response = Some(json.clone());
        } else {
            tracing::warn!(message_id = %msg.id, "Structured response already set");
        }
    }

    if terminal {
        msg.is_loading = false;
    }
}

/// Whether `new` keeps everything `old` had
fn extends(old: Option<&str>, new: &str) -> bool {
    old.map_or(true, |old| new.starts_with(old))
}
