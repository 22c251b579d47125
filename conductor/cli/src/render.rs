//! Terminal rendering of conductor notifications
//!
//! Patches carry the whole accumulated text, so the renderer remembers how
//! much of each field it already printed and only writes the new suffix.

use prism_conductor::{ConductorMessage, Message, MessageId, MessagePatch, MessageRole};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;

/// What has been printed for the message being streamed
#[derive(Debug, Default)]
struct Shown {
    id: Option<MessageId>,
    thoughts: usize,
    answer: Option<String>,
}

/// Turns notifications into terminal text
#[derive(Debug, Default)]
pub struct Renderer {
    shown: Shown,
}

impl Renderer {
    /// Create a renderer
    pub fn new() -> Self {
        Self::default()
    }

    /// Text to print for one notification
    pub fn render(&mut self, msg: &ConductorMessage) -> String {
        match msg {
            ConductorMessage::Appended(message) => self.appended(message),
            ConductorMessage::Patched { message_id, patch } => self.patched(*message_id, patch),
            ConductorMessage::State { .. } | ConductorMessage::Error { .. } => String::new(),
        }
    }

    fn appended(&mut self, message: &Message) -> String {
        match message.role {
            MessageRole::User => match message.file {
                Some(ref file) => format!("[{} attached, {} bytes]\n", file.name, file.size()),
                None => String::new(),
            },
            MessageRole::Model => {
                self.shown = Shown {
                    id: Some(message.id),
                    ..Shown::default()
                };
                "prism> ".to_string()
            }
        }
    }

    fn patched(&mut self, message_id: MessageId, patch: &MessagePatch) -> String {
        if self.shown.id != Some(message_id) {
            return String::new();
        }
        let mut out = String::new();

        // Thoughts stop being shown once the answer starts
        if let (Some(thoughts), None) = (&patch.thoughts, &self.shown.answer) {
            if let Some(new) = thoughts.get(self.shown.thoughts..) {
                if self.shown.thoughts == 0 && !new.is_empty() {
                    out.push_str("(thinking) ");
                }
                out.push_str(new);
                self.shown.thoughts = thoughts.len();
            }
        }

        if let Some(ref answer) = patch.answer {
            if self.shown.answer.is_none() && self.shown.thoughts > 0 {
                out.push_str("\n\n");
            }
            let printed = self.shown.answer.get_or_insert_with(String::new);
            match answer.strip_prefix(printed.as_str()) {
                Some(new) => out.push_str(new),
                // Replaced outright (error text)
                None => {
                    out.push('\n');
                    out.push_str(answer);
                }
            }
            answer.clone_into(printed);
        }

        if let Some(ref json) = patch.json_response {
            out.push('\n');
            out.push_str(json);
        }

        if patch.is_terminal() {
            out.push('\n');
            self.shown = Shown::default();
        }
        out
    }
}

/// Print notifications until the conductor goes away
pub async fn run(mut rx: mpsc::Receiver<ConductorMessage>) {
    let mut renderer = Renderer::new();
    let mut stdout = tokio::io::stdout();

    while let Some(msg) = rx.recv().await {
        let text = renderer.render(&msg);
        if text.is_empty() {
            continue;
        }
        if let Err(e) = stdout.write_all(text.as_bytes()).await {
            tracing::warn!(error = %e, "Failed to write to stdout");
            break;
        }
        if let Err(e) = stdout.flush().await {
            tracing::warn!(error = %e, "Failed to flush stdout");
        }
    }
}

/// One line per message for `/history`
pub fn transcript(messages: &[Message]) -> String {
    let mut out = String::new();
    for message in messages {
        match message.role {
            MessageRole::User => {
                out.push_str(&format!(
                    "[{}] you: {}",
                    message.mode,
                    message.prompt.as_deref().unwrap_or_default()
                ));
                if let Some(ref file) = message.file {
                    out.push_str(&format!(" ({})", file.name));
                }
            }
            MessageRole::Model => {
                let body = message
                    .json_response
                    .as_deref()
                    .or(message.answer.as_deref())
                    .unwrap_or(if message.is_loading { "..." } else { "" });
                out.push_str(&format!("[{}] prism: {body}", message.mode));
            }
        }
        out.push('\n');
    }
    out
}
