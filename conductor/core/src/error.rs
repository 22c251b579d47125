//! Error Types
//!
//! Three families, kept apart on purpose:
//!
//! - [`ConductorError`]: failures of one dispatched request. They always reach
//!   the conductor, which turns them into a terminal error patch.
//! - [`RecordError`]: one malformed stream record. Recovered inside the
//!   decoder and never propagated.
//! - [`SubmitError`]: a user action refused before anything was appended.

use thiserror::Error;

use crate::mode::Mode;

/// Failure of a dispatched request
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ConductorError {
    /// Transport-level failure (connection refused, body read failure)
    #[error("{0}")]
    Network(String),

    /// The service answered with a non-success status
    #[error("{message}")]
    Server {
        /// HTTP status code
        status: u16,
        /// Human-readable message (server supplied or derived from the status)
        message: String,
    },

    /// A streaming response carried no readable body
    #[error("Could not get stream reader.")]
    StreamUnavailable,

    /// A file upload was requested for a mode without an upload endpoint
    #[error("Mode '{0}' has no file endpoint")]
    UnsupportedMode(Mode),
}

impl ConductorError {
    /// Build a server error for a status with no usable body
    #[must_use]
    pub fn from_status(status: u16, reason: &str) -> Self {
        Self::Server {
            status,
            message: format!("Server error: {status} {reason}").trim_end().to_string(),
        }
    }

    /// Text shown to the user for this failure
    #[must_use]
    pub fn user_message(&self) -> String {
        let message = self.to_string();
        if message.trim().is_empty() {
            "An unknown error occurred.".to_string()
        } else {
            message
        }
    }
}

impl From<reqwest::Error> for ConductorError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(err.to_string())
    }
}

/// A single stream record that could not be decoded
#[derive(Debug, Error)]
pub enum RecordError {
    /// The record is not valid JSON
    #[error("invalid JSON record: {0}")]
    Json(#[from] serde_json::Error),

    /// The record is JSON but not an object with a string `type`
    #[error("record has no string 'type' field")]
    MissingType,

    /// A thought/answer record without string `content`
    #[error("'{0}' record has no string 'content' field")]
    MissingContent(String),
}

/// Why a user action was refused
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum SubmitError {
    /// Another action is still in flight
    #[error("A request is already in progress")]
    Busy,

    /// Chat needs a non-blank prompt
    #[error("Prompt is empty")]
    EmptyPrompt,

    /// File modes need an attachment
    #[error("Mode '{0}' needs an attached file")]
    MissingAttachment(Mode),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_message() {
        let err = ConductorError::from_status(500, "Internal Server Error");
        assert_eq!(err.to_string(), "Server error: 500 Internal Server Error");
        assert!(matches!(err, ConductorError::Server { status: 500, .. }));
    }

    #[test]
    fn test_user_message_fallback() {
        let err = ConductorError::Network(String::new());
        assert_eq!(err.user_message(), "An unknown error occurred.");

        let err = ConductorError::StreamUnavailable;
        assert_eq!(err.user_message(), "Could not get stream reader.");
    }

    #[test]
    fn test_submit_error_display() {
        assert_eq!(
            SubmitError::MissingAttachment(Mode::Audio).to_string(),
            "Mode 'audio' needs an attached file"
        );
    }
}
