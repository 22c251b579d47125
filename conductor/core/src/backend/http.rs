//! HTTP Transport Implementation
//!
//! Talks to the generation service over plain HTTP.
//!
//! # Service API
//!
//! - `POST /api/v1/chat` - JSON `{"prompt": ...}`, streams newline-delimited records
//! - `POST /api/v1/media/{image,document,audio}` - multipart `file` + `prompt`
//! - `POST /api/v1/tools/extract-invoice` - multipart `file` + `prompt`
//!
//! File endpoints answer `{"output": ...}`, or `{"message": ...}` on error.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde::Deserialize;

use super::traits::{ByteStream, Transport};
use crate::conductor::ConductorConfig;
use crate::error::ConductorError;
use crate::messages::Attachment;
use crate::mode::Mode;

/// Chat endpoint path
pub const CHAT_ENDPOINT: &str = "/api/v1/chat";

/// HTTP transport client
#[derive(Clone, Debug)]
pub struct HttpTransport {
    /// Service base URL, without trailing slash
    base_url: String,
    /// HTTP client
    http_client: reqwest::Client,
}

/// Error body returned by file endpoints
#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

impl HttpTransport {
    /// Create a transport for the given base URL
    ///
    /// Only the connect phase is bounded; a response may take as long as the
    /// service needs.
    pub fn new(base_url: impl Into<String>, connect_timeout: Duration) -> Result<Self, ConductorError> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http_client,
        })
    }

    /// Create from `ConductorConfig`
    pub fn from_config(config: &ConductorConfig) -> Result<Self, ConductorError> {
        Self::new(
            config.base_url.clone(),
            Duration::from_millis(config.connect_timeout_ms),
        )
    }

    /// Get the base URL
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Get chat endpoint URL
    fn chat_url(&self) -> String {
        format!("{}{CHAT_ENDPOINT}", self.base_url)
    }

    /// Get upload endpoint URL for a mode
    fn file_url(&self, mode: Mode) -> Result<String, ConductorError> {
        mode.file_endpoint()
            .map(|endpoint| format!("{}{endpoint}", self.base_url))
            .ok_or(ConductorError::UnsupportedMode(mode))
    }
}

/// Build the error for a failed upload from its response body
///
/// Prefers the server's `message`; otherwise falls back to the status text.
fn upload_error(status: StatusCode, reason: &str, body: &str) -> ConductorError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.message)
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| {
            format!("Server error: {reason}")
                .trim_end()
                .to_string()
        });

    ConductorError::Server {
        status: status.as_u16(),
        message,
    }
}

/// Reason phrase from the status line
///
/// Falls back to the canonical phrase when the server's text was not kept.
fn reason_phrase(response: &reqwest::Response) -> String {
    response
        .extensions()
        .get::<hyper::ext::ReasonPhrase>()
        .map(|reason| String::from_utf8_lossy(reason.as_bytes()).into_owned())
        .or_else(|| response.status().canonical_reason().map(str::to_string))
        .unwrap_or_default()
}

#[async_trait]
impl Transport for HttpTransport {
    fn name(&self) -> &str {
        "HTTP"
    }

    async fn send_chat(&self, prompt: &str) -> Result<ByteStream, ConductorError> {
        let response = self
            .http_client
            .post(self.chat_url())
            .json(&serde_json::json!({ "prompt": prompt }))
            .send()
            .await?;

        // Check for HTTP errors
        let status = response.status();
        if !status.is_success() {
            tracing::debug!(status = status.as_u16(), "Chat request rejected");
            return Err(ConductorError::from_status(
                status.as_u16(),
                &reason_phrase(&response),
            ));
        }

        // 204 means there is no body to read
        if status == StatusCode::NO_CONTENT {
            return Err(ConductorError::StreamUnavailable);
        }

        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()).map_err(ConductorError::from));

        Ok(stream.boxed())
    }

    async fn send_file(
        &self,
        mode: Mode,
        prompt: &str,
        file: &Attachment,
    ) -> Result<serde_json::Value, ConductorError> {
        let url = self.file_url(mode)?;

        let mut part = Part::bytes(file.bytes.clone()).file_name(file.name.clone());
        if let Some(ref mime) = file.mime {
            part = part.mime_str(mime)?;
        }
        let form = Form::new()
            .part("file", part)
            .text("prompt", prompt.to_string());

        let response = self.http_client.post(&url).multipart(form).send().await?;

        let status = response.status();
        if !status.is_success() {
            let reason = reason_phrase(&response);
            let body = response.text().await.unwrap_or_default();
            tracing::debug!(status = status.as_u16(), mode = %mode, "Upload rejected");
            return Err(upload_error(status, &reason, &body));
        }

        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport(base: &str) -> HttpTransport {
        HttpTransport::new(base, Duration::from_secs(1)).unwrap()
    }

    #[test]
    fn test_transport_urls() {
        let transport = transport("http://localhost:8080/");
        assert_eq!(transport.base_url(), "http://localhost:8080");
        assert_eq!(transport.chat_url(), "http://localhost:8080/api/v1/chat");
        assert_eq!(
            transport.file_url(Mode::Invoice).unwrap(),
            "http://localhost:8080/api/v1/tools/extract-invoice"
        );
        assert_eq!(
            transport.file_url(Mode::Chat),
            Err(ConductorError::UnsupportedMode(Mode::Chat))
        );
    }

    #[test]
    fn test_from_config() {
        let config = ConductorConfig {
            base_url: "http://example.com:9000".to_string(),
            ..Default::default()
        };
        let transport = HttpTransport::from_config(&config).unwrap();
        assert_eq!(transport.base_url(), "http://example.com:9000");
        assert_eq!(transport.name(), "HTTP");
    }

    #[test]
    fn test_upload_error_prefers_server_message() {
        let err = upload_error(StatusCode::BAD_REQUEST, "Bad Request", r#"{"message":"File too large"}"#);
        assert_eq!(
            err,
            ConductorError::Server {
                status: 400,
                message: "File too large".to_string()
            }
        );
    }

    #[test]
    fn test_upload_error_falls_back_to_status_text() {
        for body in ["<html>oops</html>", "{}", r#"{"message":""}"#, ""] {
            let err = upload_error(StatusCode::BAD_GATEWAY, "Bad Gateway", body);
            assert_eq!(err.to_string(), "Server error: Bad Gateway", "body {body:?}");
        }
    }

    #[tokio::test]
    async fn test_chat_mode_never_uploads() {
        // Nothing listens on this port; the mode check must fail first.
        let transport = transport("http://127.0.0.1:9");
        let file = Attachment::new("a.txt", b"a".to_vec());
        let err = transport.send_file(Mode::Chat, "", &file).await.unwrap_err();
        assert_eq!(err, ConductorError::UnsupportedMode(Mode::Chat));
    }
}
