//! Conversation Messages
//!
//! The data model shared by the conductor, the conversation store and any
//! observer: conversation entries, the partial updates applied to them, and
//! the notifications the conductor publishes while it works.
//!
//! # Design Philosophy
//!
//! The conductor never hands out mutable access to the conversation. It
//! produces immutable [`MessagePatch`] values, applies them to its own
//! [`Session`](crate::session::Session), and publishes the same patches as
//! [`ConductorMessage`]s. A renderer replays them and never needs to know how
//! a response was decoded or dispatched.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::mode::Mode;

/// Message identifier
///
/// Ids are handed out in creation order, so comparing two ids compares their
/// position in the conversation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MessageId(pub u64);

impl MessageId {
    /// Allocate the next id
    pub fn next() -> Self {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::SeqCst))
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "msg_{}", self.0)
    }
}

/// Session identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    /// Generate a new unique session ID
    ///
    /// Uses an atomic counter combined with timestamp to ensure uniqueness
    /// even when multiple sessions are created in the same millisecond.
    pub fn new() -> Self {
        use std::sync::atomic::{AtomicU64, Ordering};

        static COUNTER: AtomicU64 = AtomicU64::new(0);
        let count = COUNTER.fetch_add(1, Ordering::SeqCst);
        Self(format!("session_{}_{count}", now_ms()))
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

/// Who authored a message
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// User input
    User,
    /// Generation service output
    Model,
}

/// A file attached to a user action
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// File name sent with the upload
    pub name: String,
    /// Raw file contents
    pub bytes: Vec<u8>,
    /// Content type for the upload part, if known
    #[serde(default)]
    pub mime: Option<String>,
}

impl Attachment {
    /// Create an attachment without a content type
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
            mime: None,
        }
    }

    /// Set the content type
    #[must_use]
    pub fn with_mime(mut self, mime: impl Into<String>) -> Self {
        self.mime = Some(mime.into());
        self
    }

    /// Size in bytes
    #[must_use]
    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

// Contents can be megabytes; keep them out of logs.
impl fmt::Debug for Attachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attachment")
            .field("name", &self.name)
            .field("size", &self.bytes.len())
            .field("mime", &self.mime)
            .finish()
    }
}

/// One entry in the conversation
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID (creation order)
    pub id: MessageId,
    /// Who authored this message
    pub role: MessageRole,
    /// Mode active when the message was created
    pub mode: Mode,
    /// Submitted text (user messages)
    pub prompt: Option<String>,
    /// Attached file (user messages in file modes)
    pub file: Option<Attachment>,
    /// Accumulated reasoning text (model messages)
    pub thoughts: Option<String>,
    /// Accumulated answer text (model messages)
    pub answer: Option<String>,
    /// Formatted structured result (model messages, invoice mode)
    pub json_response: Option<String>,
    /// Whether the response is still being resolved
    pub is_loading: bool,
    /// When the message was created (Unix timestamp ms)
    pub timestamp: u64,
}

impl Message {
    /// Create a user message
    pub fn user(mode: Mode, prompt: impl Into<String>, file: Option<Attachment>) -> Self {
        Self {
            id: MessageId::next(),
            role: MessageRole::User,
            mode,
            prompt: Some(prompt.into()),
            file,
            thoughts: None,
            answer: None,
            json_response: None,
            is_loading: false,
            timestamp: now_ms(),
        }
    }

    /// Create a model placeholder awaiting its response
    pub fn placeholder(mode: Mode) -> Self {
        Self {
            id: MessageId::next(),
            role: MessageRole::Model,
            mode,
            prompt: None,
            file: None,
            thoughts: None,
            answer: None,
            json_response: None,
            is_loading: true,
            timestamp: now_ms(),
        }
    }

    /// Whether this is a model message
    #[must_use]
    pub fn is_model(&self) -> bool {
        self.role == MessageRole::Model
    }

    /// Whether this is the unresolved model entry
    #[must_use]
    pub fn is_in_flight(&self) -> bool {
        self.is_model() && self.is_loading
    }

    /// Whether the message has anything to display
    #[must_use]
    pub fn has_content(&self) -> bool {
        self.thoughts.is_some() || self.answer.is_some() || self.json_response.is_some()
    }
}

/// A partial update to one model message
///
/// Unset fields leave the message untouched.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagePatch {
    /// Replace `thoughts` with this value
    pub thoughts: Option<String>,
    /// Replace `answer` with this value
    pub answer: Option<String>,
    /// Set `json_response`
    pub json_response: Option<String>,
    /// Set `is_loading`
    pub is_loading: Option<bool>,
}

impl MessagePatch {
    /// Set thoughts
    #[must_use]
    pub fn thoughts(mut self, thoughts: impl Into<String>) -> Self {
        self.thoughts = Some(thoughts.into());
        self
    }

    /// Set answer
    #[must_use]
    pub fn answer(mut self, answer: impl Into<String>) -> Self {
        self.answer = Some(answer.into());
        self
    }

    /// Set the structured response
    #[must_use]
    pub fn json_response(mut self, json: impl Into<String>) -> Self {
        self.json_response = Some(json.into());
        self
    }

    /// Mark the message resolved
    #[must_use]
    pub fn settled(mut self) -> Self {
        self.is_loading = Some(false);
        self
    }

    /// Whether this patch resolves the message
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.is_loading == Some(false)
    }

    /// Whether the patch changes nothing
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.thoughts.is_none()
            && self.answer.is_none()
            && self.json_response.is_none()
            && self.is_loading.is_none()
    }
}

/// How an action ended
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Settlement {
    /// Response fully received
    Success,
    /// Request failed; the model message carries the error text
    Failed,
}

/// Conductor operational states
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConductorState {
    /// No action has been submitted yet
    Idle,
    /// Messages appended, request being issued
    Dispatching,
    /// Consuming a streamed chat response
    Streaming,
    /// Waiting for a single file-mode payload
    AwaitingPayload,
    /// The last action finished
    Settled(Settlement),
}

impl ConductorState {
    /// Whether an action is in flight
    #[must_use]
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            Self::Dispatching | Self::Streaming | Self::AwaitingPayload
        )
    }
}

/// Notifications from the conductor to observers
///
/// Replaying these in order with
/// [`Session::apply`](crate::session::Session::apply) reproduces the
/// conductor's conversation exactly.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConductorMessage {
    /// A message was appended to the conversation
    Appended(Message),

    /// The last model message was patched
    Patched {
        /// Message the patch landed on
        message_id: MessageId,
        /// The applied patch
        patch: MessagePatch,
    },

    /// Conductor state change
    State {
        /// The new state
        state: ConductorState,
    },

    /// The session error string changed
    Error {
        /// Error text, `None` when cleared
        message: Option<String>,
    },
}

/// Get current timestamp in milliseconds
pub(crate) fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
