//! Newline-delimited record decoder.

use std::collections::VecDeque;

use futures::stream::{self, BoxStream, StreamExt};
use serde_json::Value;

use crate::backend::ByteStream;
use crate::error::{ConductorError, RecordError};

/// A decoded stream record
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamEvent {
    /// Intermediate reasoning text
    Thought(String),
    /// Final answer text
    Answer(String),
}

/// Event sequence produced by [`decode_stream`]
pub type EventStream = BoxStream<'static, Result<StreamEvent, ConductorError>>;

/// Incremental decoder for newline-delimited JSON records
///
/// Chunks may split records (and multi-byte characters) anywhere; only bytes
/// up to the last `\n` are decoded, the rest waits for the next chunk.
#[derive(Debug, Default)]
pub struct RecordDecoder {
    buffer: Vec<u8>,
    decoded: usize,
    malformed: usize,
}

impl RecordDecoder {
    /// Create an empty decoder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and drain every event it completes
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        let mut start = 0;

        while let Some(offset) = self.buffer[start..].iter().position(|b| *b == b'\n') {
            let end = start + offset;
            match decode_record(&self.buffer[start..end]) {
                Ok(Some(event)) => {
                    self.decoded += 1;
                    events.push(event);
                }
                Ok(None) => {}
                Err(e) => {
                    self.malformed += 1;
                    tracing::warn!(
                        error = %e,
                        line = %String::from_utf8_lossy(&self.buffer[start..end]),
                        "Failed to parse stream record"
                    );
                }
            }
            start = end + 1;
        }

        self.buffer.drain(..start);
        events
    }

    /// End of stream: discard any undelimited tail
    ///
    /// Returns how many bytes were dropped. A final record must be terminated
    /// by `\n` to count.
    pub fn finish(&mut self) -> usize {
        let dropped = self.buffer.len();
        if dropped > 0 && !String::from_utf8_lossy(&self.buffer).trim().is_empty() {
            tracing::debug!(bytes = dropped, "Discarding unterminated trailing record");
        }
        self.buffer.clear();
        dropped
    }

    /// Bytes waiting for a delimiter
    #[must_use]
    pub fn pending_bytes(&self) -> usize {
        self.buffer.len()
    }

    /// Events produced so far
    #[must_use]
    pub fn decoded_count(&self) -> usize {
        self.decoded
    }

    /// Records skipped as malformed so far
    #[must_use]
    pub fn malformed_count(&self) -> usize {
        self.malformed
    }

    /// Decode a complete body in one shot
    #[must_use]
    pub fn decode_all(input: &[u8]) -> Vec<StreamEvent> {
        let mut decoder = Self::new();
        let events = decoder.feed(input);
        decoder.finish();
        events
    }
}

/// Decode one record (without its delimiter)
///
/// Blank lines decode to `Ok(None)`, as do records of any type other than
/// `thought` and `answer`.
pub fn decode_record(line: &[u8]) -> Result<Option<StreamEvent>, RecordError> {
    let text = String::from_utf8_lossy(line);
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let value: Value = serde_json::from_str(trimmed)?;
    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or(RecordError::MissingType)?;

    let content = || {
        value
            .get("content")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| RecordError::MissingContent(kind.to_string()))
    };

    match kind {
        "thought" => Ok(Some(StreamEvent::Thought(content()?))),
        "answer" => Ok(Some(StreamEvent::Answer(content()?))),
        other => {
            tracing::trace!(kind = other, "Ignoring record of unknown type");
            Ok(None)
        }
    }
}

/// Lift a [`RecordDecoder`] over a chunk stream
///
/// Events come out lazily, in arrival order. A transport error ends the
/// sequence after being yielded once.
pub fn decode_stream(chunks: ByteStream) -> EventStream {
    let state = (chunks, RecordDecoder::new(), VecDeque::new(), false);

    stream::unfold(state, |(mut chunks, mut decoder, mut pending, done)| async move {
        loop {
            if let Some(event) = pending.pop_front() {
                return Some((Ok(event), (chunks, decoder, pending, done)));
            }
            if done {
                return None;
            }
            match chunks.next().await {
                Some(Ok(chunk)) => pending.extend(decoder.feed(&chunk)),
                Some(Err(e)) => return Some((Err(e), (chunks, decoder, pending, true))),
                None => {
                    decoder.finish();
                    tracing::trace!(
                        decoded = decoder.decoded_count(),
                        malformed = decoder.malformed_count(),
                        "Record stream complete"
                    );
                    return None;
                }
            }
        }
    })
    .boxed()
}
