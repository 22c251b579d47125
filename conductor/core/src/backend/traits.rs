//! Transport Traits
//!
//! The conductor talks to the generation service only through [`Transport`].
//! One call is made per user action, never retried.
//!
//! # Design Philosophy
//!
//! The transport knows about URLs, HTTP status codes and multipart bodies.
//! It knows nothing about records, accumulators or the conversation: chat
//! hands back raw chunks for the stream decoder, file modes hand back the
//! parsed JSON payload.

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::ConductorError;
use crate::messages::Attachment;
use crate::mode::Mode;

/// Raw response body chunks, in arrival order
pub type ByteStream = BoxStream<'static, Result<Vec<u8>, ConductorError>>;

/// Outbound requests to the generation service
#[async_trait]
pub trait Transport: Send + Sync {
    /// Transport name for logging
    fn name(&self) -> &str;

    /// POST a chat prompt and return the streamed response body
    ///
    /// A non-success status fails with [`ConductorError::Server`] before any
    /// chunk is produced.
    async fn send_chat(&self, prompt: &str) -> Result<ByteStream, ConductorError>;

    /// Upload a file with a prompt and return the parsed JSON payload
    ///
    /// Fails with [`ConductorError::UnsupportedMode`] for modes without a
    /// file endpoint.
    async fn send_file(
        &self,
        mode: Mode,
        prompt: &str,
        file: &Attachment,
    ) -> Result<serde_json::Value, ConductorError>;
}
