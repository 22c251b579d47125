//! Prism Conductor - Conversation Orchestration Core
//!
//! This crate holds everything a Prism front end needs to hold a conversation
//! with the generation service, independent of how the conversation is drawn.
//! It can drive a terminal REPL, a GUI, or run headless for testing.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      Front ends                              │
//! │   ┌──────────┐   ┌──────────┐   ┌─────────────────────────┐  │
//! │   │   CLI    │   │   GUI    │   │   Headless / tests      │  │
//! │   └────┬─────┘   └────┬─────┘   └────────────┬────────────┘  │
//! │        └──────────────┴──────────────────────┘               │
//! │               UserAction (up)  ConductorMessage (down)       │
//! └────────────────────────────┼─────────────────────────────────┘
//!                              │
//! ┌────────────────────────────┼─────────────────────────────────┐
//! │                     CONDUCTOR CORE                           │
//! │  ┌─────────────────────────┴──────────────────────────────┐  │
//! │  │                      Conductor                         │  │
//! │  │  ┌──────────┐   ┌────────────────┐   ┌──────────────┐  │  │
//! │  │  │ Session  │   │ Record decoder │   │  Transport   │  │  │
//! │  │  │ (store)  │   │  (NDJSON)      │   │   (HTTP)     │  │  │
//! │  │  └──────────┘   └────────────────┘   └──────────────┘  │  │
//! │  └────────────────────────────────────────────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Key Types
//!
//! - [`Conductor`]: Turns user actions into requests and folds responses into the session
//! - [`UserAction`]: One submission (mode, prompt, optional attachment)
//! - [`ConductorMessage`]: Notifications sent from the Conductor to observers
//! - [`Session`]: Append-only conversation log
//! - [`Mode`]: The five interaction modes
//!
//! # Quick Start
//!
//! ```ignore
//! use prism_conductor::{Conductor, ConductorConfig, HttpTransport, UserAction};
//! use tokio::sync::mpsc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let (tx, mut rx) = mpsc::channel(100);
//!
//!     let config = ConductorConfig::from_env().unwrap();
//!     let transport = HttpTransport::from_config(&config).unwrap();
//!     let mut conductor = Conductor::new(transport, config, tx);
//!
//!     // Render notifications as they arrive
//!     tokio::spawn(async move {
//!         while let Some(msg) = rx.recv().await {
//!             println!("{msg:?}");
//!         }
//!     });
//!
//!     conductor.handle(UserAction::chat("Hello!")).await.unwrap();
//! }
//! ```
//!
//! # Module Overview
//!
//! - [`backend`]: Generation service transport (HTTP)
//! - [`conductor`]: Main Conductor struct and its configuration
//! - [`config`]: TOML configuration file and source priority
//! - [`error`]: Error types
//! - [`messages`]: Conversation messages, patches and notifications
//! - [`mode`]: Interaction modes and their endpoints
//! - [`session`]: Conversation store
//! - [`streaming`]: Newline-delimited record decoding
//!
//! # No UI Dependencies
//!
//! This crate has **zero** dependencies on any UI framework. It's pure
//! orchestration logic that can be used anywhere.

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod backend;
pub mod conductor;
pub mod config;
pub mod error;
pub mod messages;
pub mod mode;
pub mod session;
pub mod streaming;

// Re-exports for convenience
pub use backend::{ByteStream, HttpTransport, Transport};
pub use conductor::{Conductor, ConductorConfig, UserAction};
pub use error::{ConductorError, RecordError, SubmitError};
pub use messages::{
    Attachment, ConductorMessage, ConductorState, Message, MessageId, MessagePatch, MessageRole,
    SessionId, Settlement,
};
pub use mode::{Mode, ParseModeError};
pub use session::{Session, SessionMetadata, StoreError};
pub use streaming::{decode_stream, RecordDecoder, StreamEvent};

// Config exports
pub use config::{
    default_config_path, load_config, load_config_from_path, ConfigError, ConfigOverrides,
    ConfigSource, LoadedConfig,
};
