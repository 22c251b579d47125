//! Generation Service Transport
//!
//! This module provides access to the remote generation service through a
//! common trait interface.
//!
//! # Available Transports
//!
//! - **HTTP**: the service's REST API (default)
//!
//! # Usage
//!
//! ```ignore
//! use prism_conductor::backend::{HttpTransport, Transport};
//!
//! let transport = HttpTransport::new("http://localhost:8080", Duration::from_secs(5))?;
//! let chunks = transport.send_chat("Hello!").await?;
//! ```

mod http;
mod traits;

pub use http::{HttpTransport, CHAT_ENDPOINT};
pub use traits::{ByteStream, Transport};
