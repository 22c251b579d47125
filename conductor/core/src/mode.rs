//! Conversation Modes
//!
//! The five task categories a user action can target. A mode decides which
//! endpoint a request goes to and what shape the response takes: chat
//! streams newline-delimited records, every other mode uploads a file and
//! receives a single JSON payload.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Task category selecting endpoint and response shape
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Free-form streaming chat
    #[default]
    Chat,
    /// Ask about an uploaded image
    Image,
    /// Ask about an uploaded document
    Document,
    /// Ask about an uploaded audio clip
    Audio,
    /// Extract structured data from an uploaded invoice
    Invoice,
}

impl Mode {
    /// All modes, in tab order
    pub const ALL: [Mode; 5] = [
        Mode::Chat,
        Mode::Image,
        Mode::Document,
        Mode::Audio,
        Mode::Invoice,
    ];

    /// Lowercase identifier (also the wire/tab value)
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::Image => "image",
            Self::Document => "document",
            Self::Audio => "audio",
            Self::Invoice => "invoice",
        }
    }

    /// Human-readable tab name
    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Chat => "Chat",
            Self::Image => "Image",
            Self::Document => "Document",
            Self::Audio => "Audio",
            Self::Invoice => "Invoice",
        }
    }

    /// Upload endpoint path for file modes; chat has none
    #[must_use]
    pub fn file_endpoint(self) -> Option<&'static str> {
        match self {
            Self::Chat => None,
            Self::Image => Some("/api/v1/media/image"),
            Self::Document => Some("/api/v1/media/document"),
            Self::Audio => Some("/api/v1/media/audio"),
            Self::Invoice => Some("/api/v1/tools/extract-invoice"),
        }
    }

    /// Whether responses arrive as a record stream
    #[must_use]
    pub fn is_streaming(self) -> bool {
        matches!(self, Self::Chat)
    }

    /// Whether a submission needs an attached file
    #[must_use]
    pub fn requires_attachment(self) -> bool {
        !self.is_streaming()
    }

    /// Whether the payload is structured data rather than text
    #[must_use]
    pub fn is_structured(self) -> bool {
        matches!(self, Self::Invoice)
    }

    /// Hint text for the input field
    #[must_use]
    pub fn input_placeholder(self) -> String {
        match self {
            Self::Chat => "Message Gemini...".to_string(),
            other => format!("Ask something about the {}...", other.as_str()),
        }
    }

    /// Resolve a tab selector, falling back to chat when absent or unknown
    #[must_use]
    pub fn from_tab(tab: Option<&str>) -> Self {
        tab.and_then(|t| t.parse().ok()).unwrap_or_default()
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string names no known mode
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("Unknown mode '{0}' (expected one of: chat, image, document, audio, invoice)")]
pub struct ParseModeError(pub String);

impl FromStr for Mode {
    type Err = ParseModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Mode::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| ParseModeError(wanted.to_string()))
    }
}
