//! Streaming Response Decoding
//!
//! Chat responses arrive as newline-delimited JSON records:
//!
//! ```text
//! {"type":"thought","content":"Let me think"}\n
//! {"type":"answer","content":"Hello"}\n
//! ```
//!
//! The network delivers them in chunks that have nothing to do with record
//! boundaries. [`RecordDecoder`] reassembles records from arbitrary chunks and
//! [`decode_stream`] turns a chunk stream into a lazy sequence of
//! [`StreamEvent`]s.
//!
//! # Tolerance
//!
//! - Blank records are skipped.
//! - Malformed records are logged and skipped; decoding carries on.
//! - Records of unknown `type` are ignored.
//! - Bytes after the last `\n` when the stream ends are dropped.
//!
//! # Example
//!
//! ```
//! use prism_conductor::streaming::{RecordDecoder, StreamEvent};
//!
//! let mut decoder = RecordDecoder::new();
//! assert!(decoder.feed(br#"{"type":"answer","#).is_empty());
//! let events = decoder.feed(b"\"content\":\"hi\"}\n");
//! assert_eq!(events, vec![StreamEvent::Answer("hi".to_string())]);
//! ```

mod decoder;

pub use decoder::{decode_record, decode_stream, EventStream, RecordDecoder, StreamEvent};
