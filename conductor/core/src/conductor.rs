//! Conductor - The Orchestration Core
//!
//! The Conductor turns one user action into one request and folds whatever
//! comes back into the conversation:
//! - Appends the user message and a model placeholder before any network call
//! - Picks the dispatch strategy by mode (streamed chat or single-payload upload)
//! - Accumulates streamed thought/answer text into the placeholder
//! - Settles the placeholder on success, or overwrites it with the error text
//!
//! # Lifecycle
//!
//! ```text
//! Idle ──submit──▶ Dispatching ──▶ Streaming ───────┐
//!                      │                            ├──▶ Settled(Success | Failed)
//!                      └─────────▶ AwaitingPayload ─┘
//! ```
//!
//! Only one action is in flight at a time; [`Conductor::submit`] refuses new
//! work until the current action settles, whichever way it ends.
//!
//! # Design Philosophy
//!
//! The network leg runs in a spawned dispatch task that only reports raw
//! progress over a bounded channel. Every change to the conversation is made
//! here, on the caller's task, as a [`MessagePatch`] applied to the
//! [`Session`] and echoed to observers as a [`ConductorMessage`]. Nothing in
//! this module knows how messages are rendered.

use std::sync::Arc;
use std::time::Instant;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;

use crate::backend::Transport;
use crate::config::ConfigError;
use crate::error::{ConductorError, SubmitError};
use crate::messages::{
    Attachment, ConductorMessage, ConductorState, Message, MessageId, MessagePatch, Settlement,
};
use crate::mode::Mode;
use crate::session::Session;
use crate::streaming::{decode_stream, StreamEvent};

/// Default service address
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

/// Conductor configuration
#[derive(Clone, Debug)]
pub struct ConductorConfig {
    /// Base URL of the generation service
    pub base_url: String,
    /// Capacity of the dispatch channel (events buffered ahead of the conductor)
    pub event_buffer: usize,
    /// Connect timeout for the HTTP client, in milliseconds
    pub connect_timeout_ms: u64,
    /// Mode selected at startup
    pub default_mode: Mode,
}

impl Default for ConductorConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            event_buffer: 100,
            connect_timeout_ms: 5000,
            default_mode: Mode::Chat,
        }
    }
}

impl ConductorConfig {
    /// Create configuration from defaults and environment variables
    ///
    /// Applies the same rules as [`load_config`](crate::config::load_config)
    /// without reading a file.
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown `PRISM_MODE` or an invalid result.
    pub fn from_env() -> Result<Self, ConfigError> {
        crate::config::conductor_from_env(|key| std::env::var(key).ok())
    }
}

/// One submission from the user
#[derive(Clone, Debug)]
pub struct UserAction {
    /// Mode active when the action was submitted
    pub mode: Mode,
    /// Prompt text (may be empty in file modes)
    pub prompt: String,
    /// Attached file (file modes)
    pub attachment: Option<Attachment>,
}

impl UserAction {
    /// Create an action
    pub fn new(mode: Mode, prompt: impl Into<String>, attachment: Option<Attachment>) -> Self {
        Self {
            mode,
            prompt: prompt.into(),
            attachment,
        }
    }

    /// A chat prompt
    pub fn chat(prompt: impl Into<String>) -> Self {
        Self::new(Mode::Chat, prompt, None)
    }

    /// A file upload with a prompt
    pub fn with_file(mode: Mode, prompt: impl Into<String>, attachment: Attachment) -> Self {
        Self::new(mode, prompt, Some(attachment))
    }

    /// Check the action can be dispatched
    pub fn validate(&self) -> Result<(), SubmitError> {
        if self.mode.requires_attachment() {
            if self.attachment.is_none() {
                return Err(SubmitError::MissingAttachment(self.mode));
            }
        } else if self.prompt.trim().is_empty() {
            return Err(SubmitError::EmptyPrompt);
        }
        Ok(())
    }

    /// Resolve into the request to issue
    fn into_request(self) -> Result<Request, SubmitError> {
        self.validate()?;
        match (self.mode.is_streaming(), self.attachment) {
            (true, _) => Ok(Request::Chat {
                prompt: self.prompt,
            }),
            (false, Some(file)) => Ok(Request::Upload {
                mode: self.mode,
                prompt: self.prompt,
                file,
            }),
            (false, None) => Err(SubmitError::MissingAttachment(self.mode)),
        }
    }
}

/// The request a dispatch task issues
#[derive(Debug)]
enum Request {
    Chat {
        prompt: String,
    },
    Upload {
        mode: Mode,
        prompt: String,
        file: Attachment,
    },
}

/// Raw progress reported by a dispatch task
#[derive(Debug)]
enum DispatchEvent {
    /// The chat response is streaming
    StreamOpened,
    /// The upload was handed to the transport
    AwaitingPayload,
    /// One decoded record
    Record(StreamEvent),
    /// The file-mode payload
    Payload(serde_json::Value),
    /// The stream ended normally
    Completed,
    /// The request failed
    Failed(ConductorError),
}

/// Bookkeeping for the action currently in flight
struct InFlight {
    /// Placeholder receiving the patches
    message_id: MessageId,
    /// Mode the action was submitted in
    mode: Mode,
    /// Progress from the dispatch task
    rx: mpsc::Receiver<DispatchEvent>,
    /// Thought text so far
    thoughts: String,
    /// Answer text so far
    answer: String,
    /// When the action was submitted
    started: Instant,
}

/// The Conductor - conversation orchestration core
pub struct Conductor<T: Transport> {
    /// Configuration
    config: ConductorConfig,
    /// Generation service transport
    transport: Arc<T>,
    /// Conversation history
    session: Session,
    /// Current operational state
    state: ConductorState,
    /// Mode new actions default to
    mode: Mode,
    /// Last failure shown to the user
    error: Option<String>,
    /// Channel to observers
    tx: mpsc::Sender<ConductorMessage>,
    /// Action currently being resolved
    in_flight: Option<InFlight>,
}

impl<T: Transport + 'static> Conductor<T> {
    /// Create a new Conductor with the given transport
    ///
    /// Notifications go to `tx`; the receiving side must keep draining it.
    pub fn new(transport: T, config: ConductorConfig, tx: mpsc::Sender<ConductorMessage>) -> Self {
        Self {
            mode: config.default_mode,
            config,
            transport: Arc::new(transport),
            session: Session::new(),
            state: ConductorState::Idle,
            error: None,
            tx,
            in_flight: None,
        }
    }

    /// Get current state
    pub fn state(&self) -> ConductorState {
        self.state
    }

    /// Whether an action is in flight
    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Last failure message, cleared when the next action starts
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Get the conversation
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Mode new actions are built with
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Switch the active mode
    ///
    /// Messages already in the conversation keep the mode they were created in.
    pub fn set_mode(&mut self, mode: Mode) {
        if mode != self.mode {
            tracing::debug!(from = %self.mode, to = %mode, "Mode changed");
            self.mode = mode;
        }
    }

    /// Build an action in the active mode
    pub fn action(&self, prompt: impl Into<String>, attachment: Option<Attachment>) -> UserAction {
        UserAction::new(self.mode, prompt, attachment)
    }

    /// Submit a user action
    ///
    /// Appends the user message and the model placeholder, then starts the
    /// request. Returns the placeholder's id. Refused actions leave the
    /// conversation untouched.
    pub async fn submit(&mut self, action: UserAction) -> Result<MessageId, SubmitError> {
        if self.is_busy() {
            tracing::debug!("Rejecting submission while busy");
            return Err(SubmitError::Busy);
        }
        action.validate()?;

        let mode = action.mode;
        // Chat never carries a file, whatever the caller attached.
        let file = if mode.requires_attachment() {
            action.attachment.clone()
        } else {
            None
        };
        let user = Message::user(mode, action.prompt.clone(), file);
        let placeholder = Message::placeholder(mode);
        let request = action.into_request()?;

        let message_id = self
            .session
            .append_exchange(user.clone(), placeholder.clone())
            .map_err(|_| SubmitError::Busy)?;

        let (tx, rx) = mpsc::channel(self.config.event_buffer.max(1));
        self.in_flight = Some(InFlight {
            message_id,
            mode,
            rx,
            thoughts: String::new(),
            answer: String::new(),
            started: Instant::now(),
        });

        self.send(ConductorMessage::Appended(user)).await;
        self.send(ConductorMessage::Appended(placeholder)).await;
        self.set_error(None).await;
        self.set_state(ConductorState::Dispatching).await;

        tracing::debug!(
            mode = %mode,
            message_id = %message_id,
            transport = self.transport.name(),
            "Dispatching request"
        );
        tokio::spawn(dispatch(Arc::clone(&self.transport), request, tx));

        Ok(message_id)
    }

    /// Submit an action and wait for it to settle
    pub async fn handle(&mut self, action: UserAction) -> Result<Settlement, SubmitError> {
        self.submit(action).await?;
        Ok(self
            .run_until_settled()
            .await
            .unwrap_or(Settlement::Failed))
    }

    /// Poll for dispatch progress
    ///
    /// Applies everything available without waiting.
    /// Returns true if there was activity.
    pub async fn poll(&mut self) -> bool {
        let mut activity = false;

        loop {
            let next = match self.in_flight.as_mut() {
                Some(flight) => flight.rx.try_recv(),
                None => return activity,
            };

            match next {
                Ok(event) => {
                    activity = true;
                    if self.apply(event).await.is_some() {
                        return true;
                    }
                }
                Err(TryRecvError::Empty) => return activity,
                Err(TryRecvError::Disconnected) => {
                    self.fail(dispatch_lost()).await;
                    return true;
                }
            }
        }
    }

    /// Wait until the in-flight action settles
    ///
    /// Returns `None` when nothing is in flight.
    pub async fn run_until_settled(&mut self) -> Option<Settlement> {
        loop {
            let next = self.in_flight.as_mut()?.rx.recv().await;
            let settlement = match next {
                Some(event) => self.apply(event).await,
                None => Some(self.fail(dispatch_lost()).await),
            };
            if settlement.is_some() {
                return settlement;
            }
        }
    }

    /// Fold one dispatch event into the conversation
    async fn apply(&mut self, event: DispatchEvent) -> Option<Settlement> {
        match event {
            DispatchEvent::StreamOpened => {
                self.set_state(ConductorState::Streaming).await;
                None
            }

            DispatchEvent::AwaitingPayload => {
                self.set_state(ConductorState::AwaitingPayload).await;
                None
            }

            DispatchEvent::Record(record) => {
                let flight = self.in_flight.as_mut()?;
                let patch = match record {
                    StreamEvent::Thought(text) => {
                        flight.thoughts.push_str(&text);
                        MessagePatch::default().thoughts(flight.thoughts.clone())
                    }
                    StreamEvent::Answer(text) => {
                        flight.answer.push_str(&text);
                        let mut patch = MessagePatch::default().answer(flight.answer.clone());
                        if !flight.thoughts.is_empty() {
                            patch = patch.thoughts(flight.thoughts.clone());
                        }
                        patch
                    }
                };
                self.patch(patch).await;
                None
            }

            DispatchEvent::Payload(payload) => {
                let mode = self.in_flight.as_ref()?.mode;
                self.patch(render_payload(mode, &payload).settled()).await;
                Some(self.finish(Settlement::Success).await)
            }

            DispatchEvent::Completed => {
                self.patch(MessagePatch::default().settled()).await;
                Some(self.finish(Settlement::Success).await)
            }

            DispatchEvent::Failed(e) => Some(self.fail(e).await),
        }
    }

    /// Terminate the in-flight message with an error
    async fn fail(&mut self, error: ConductorError) -> Settlement {
        let message = error.user_message();
        tracing::debug!(error = %message, "Request failed");

        self.set_error(Some(message.clone())).await;
        self.patch(
            MessagePatch::default()
                .answer(format!("Error: {message}"))
                .settled(),
        )
        .await;
        self.finish(Settlement::Failed).await
    }

    /// Clear the in-flight action and record how it ended
    async fn finish(&mut self, settlement: Settlement) -> Settlement {
        if let Some(flight) = self.in_flight.take() {
            tracing::debug!(
                message_id = %flight.message_id,
                elapsed_ms = flight.started.elapsed().as_millis() as u64,
                settlement = ?settlement,
                "Action settled"
            );
        }
        self.set_state(ConductorState::Settled(settlement)).await;
        settlement
    }

    /// Apply a patch to the in-flight message and tell observers
    async fn patch(&mut self, patch: MessagePatch) {
        let Some(message_id) = self.in_flight.as_ref().map(|f| f.message_id) else {
            return;
        };

        if self
            .session
            .patch_last(|m| m.is_model() && m.id == message_id, &patch)
            .is_some()
        {
            self.send(ConductorMessage::Patched { message_id, patch })
                .await;
        }
    }

    /// Set state and notify observers
    async fn set_state(&mut self, state: ConductorState) {
        self.state = state;
        self.send(ConductorMessage::State { state }).await;
    }

    /// Set the error string and notify observers
    async fn set_error(&mut self, message: Option<String>) {
        if self.error == message {
            return;
        }
        self.error.clone_from(&message);
        self.send(ConductorMessage::Error { message }).await;
    }

    /// Send a message to observers
    async fn send(&self, msg: ConductorMessage) {
        if let Err(e) = self.tx.send(msg).await {
            tracing::warn!("Failed to send message to observer: {}", e);
        }
    }
}

/// Error used when a dispatch task vanished without reporting an outcome
fn dispatch_lost() -> ConductorError {
    ConductorError::Network("Request ended unexpectedly".to_string())
}

/// Turn a file-mode payload into the model message's content
///
/// Invoice output is shown as indented JSON; every other mode shows `output`
/// as text.
fn render_payload(mode: Mode, payload: &serde_json::Value) -> MessagePatch {
    let output = payload.get("output").unwrap_or(&serde_json::Value::Null);

    if mode.is_structured() {
        let pretty = serde_json::to_string_pretty(output).unwrap_or_else(|_| output.to_string());
        return MessagePatch::default().json_response(pretty);
    }

    let text = match output {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    };
    MessagePatch::default().answer(text)
}

/// Issue one request and report its progress
///
/// Stops quietly once the conductor stops listening.
async fn dispatch<T: Transport + ?Sized>(
    transport: Arc<T>,
    request: Request,
    tx: mpsc::Sender<DispatchEvent>,
) {
    let result = match request {
        Request::Chat { prompt } => stream_chat(&*transport, &prompt, &tx).await,
        Request::Upload { mode, prompt, file } => {
            upload(&*transport, mode, &prompt, &file, &tx).await
        }
    };

    if result.is_err() {
        tracing::debug!("Conductor went away, abandoning request");
    }
}

type Report = Result<(), mpsc::error::SendError<DispatchEvent>>;

async fn stream_chat<T: Transport + ?Sized>(
    transport: &T,
    prompt: &str,
    tx: &mpsc::Sender<DispatchEvent>,
) -> Report {
    let chunks = match transport.send_chat(prompt).await {
        Ok(chunks) => chunks,
        Err(e) => return tx.send(DispatchEvent::Failed(e)).await,
    };
    tx.send(DispatchEvent::StreamOpened).await?;

    let mut events = decode_stream(chunks);
    while let Some(item) = events.next().await {
        match item {
            Ok(record) => tx.send(DispatchEvent::Record(record)).await?,
            Err(e) => return tx.send(DispatchEvent::Failed(e)).await,
        }
    }

    tx.send(DispatchEvent::Completed).await
}

async fn upload<T: Transport + ?Sized>(
    transport: &T,
    mode: Mode,
    prompt: &str,
    file: &Attachment,
    tx: &mpsc::Sender<DispatchEvent>,
) -> Report {
    tx.send(DispatchEvent::AwaitingPayload).await?;

    match transport.send_file(mode, prompt, file).await {
        Ok(payload) => tx.send(DispatchEvent::Payload(payload)).await,
        Err(e) => tx.send(DispatchEvent::Failed(e)).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ByteStream;
    use async_trait::async_trait;
    use futures::stream;
    use pretty_assertions::assert_eq;

    // Mock transport for testing
    struct MockTransport;

    #[async_trait]
    impl Transport for MockTransport {
        fn name(&self) -> &str {
            "Mock"
        }

        async fn send_chat(&self, _prompt: &str) -> Result<ByteStream, ConductorError> {
            let body = concat!(
                "{\"type\":\"thought\",\"content\":\"thinking\"}\n",
                "{\"type\":\"answer\",\"content\":\"Hello\"}\n",
                "{\"type\":\"answer\",\"content\":\"!\"}\n",
            );
            Ok(stream::iter(vec![Ok(body.as_bytes().to_vec())]).boxed())
        }

        async fn send_file(
            &self,
            _mode: Mode,
            _prompt: &str,
            file: &Attachment,
        ) -> Result<serde_json::Value, ConductorError> {
            Ok(serde_json::json!({ "output": format!("saw {}", file.name) }))
        }
    }

    fn conductor() -> (Conductor<MockTransport>, mpsc::Receiver<ConductorMessage>) {
        let (tx, rx) = mpsc::channel(256);
        (
            Conductor::new(MockTransport, ConductorConfig::default(), tx),
            rx,
        )
    }

    #[tokio::test]
    async fn test_conductor_creation() {
        let (conductor, _rx) = conductor();
        assert_eq!(conductor.state(), ConductorState::Idle);
        assert!(!conductor.is_busy());
        assert_eq!(conductor.mode(), Mode::Chat);
        assert!(conductor.session().is_empty());
    }

    #[tokio::test]
    async fn test_chat_round_trip() {
        let (mut conductor, _rx) = conductor();
        let settlement = conductor.handle(UserAction::chat("hi")).await.unwrap();
        assert_eq!(settlement, Settlement::Success);

        let msg = conductor.session().last_model().unwrap();
        assert_eq!(msg.thoughts.as_deref(), Some("thinking"));
        assert_eq!(msg.answer.as_deref(), Some("Hello!"));
        assert!(!msg.is_loading);
        assert_eq!(
            conductor.state(),
            ConductorState::Settled(Settlement::Success)
        );
    }

    #[tokio::test]
    async fn test_media_payload_sets_answer() {
        let (mut conductor, _rx) = conductor();
        let file = Attachment::new("cat.png", vec![1, 2, 3]);
        conductor
            .handle(UserAction::with_file(Mode::Image, "what is this", file))
            .await
            .unwrap();

        let user = &conductor.session().messages()[0];
        assert_eq!(user.file.as_ref().map(|f| f.name.as_str()), Some("cat.png"));
        let msg = conductor.session().last_model().unwrap();
        assert_eq!(msg.answer.as_deref(), Some("saw cat.png"));
        assert!(msg.json_response.is_none());
    }

    #[tokio::test]
    async fn test_rejected_actions_leave_history_alone() {
        let (mut conductor, _rx) = conductor();
        assert_eq!(
            conductor.submit(UserAction::chat("   ")).await,
            Err(SubmitError::EmptyPrompt)
        );
        assert_eq!(
            conductor
                .submit(UserAction::new(Mode::Audio, "transcribe", None))
                .await,
            Err(SubmitError::MissingAttachment(Mode::Audio))
        );
        assert!(conductor.session().is_empty());
        assert_eq!(conductor.state(), ConductorState::Idle);
    }

    #[tokio::test]
    async fn test_chat_drops_attachment() {
        let (mut conductor, _rx) = conductor();
        let file = Attachment::new("x.txt", b"x".to_vec());
        let action = UserAction::new(Mode::Chat, "hi", Some(file));
        conductor.handle(action).await.unwrap();
        assert!(conductor.session().messages()[0].file.is_none());
    }

    #[test]
    fn test_render_payload() {
        let payload = serde_json::json!({ "output": { "total": 42 } });
        assert_eq!(
            render_payload(Mode::Invoice, &payload).json_response.as_deref(),
            Some("{\n  \"total\": 42\n}")
        );

        let payload = serde_json::json!({ "output": "A cat." });
        assert_eq!(
            render_payload(Mode::Document, &payload).answer.as_deref(),
            Some("A cat.")
        );

        let payload = serde_json::json!({});
        assert_eq!(render_payload(Mode::Audio, &payload).answer.as_deref(), Some(""));
        assert_eq!(
            render_payload(Mode::Invoice, &payload).json_response.as_deref(),
            Some("null")
        );
    }

    #[test]
    fn test_config_default() {
        let config = ConductorConfig::default();
        assert_eq!(config.base_url, "http://localhost:8080");
        assert_eq!(config.event_buffer, 100);
        assert_eq!(config.default_mode, Mode::Chat);
    }
}
