//! Boundary to the remote worker that speaks CalDAV.
//!
//! The engine only ever sees two primitives: a single request/response call
//! and a streaming call that pushes entities before signalling its outcome.

pub mod protocol;
pub mod stream;
pub mod subprocess;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

pub use protocol::{CALDAV_DOMAIN, Method, TransportCommand};
pub use stream::{RemoteStream, StreamEntity, StreamSink};
pub use subprocess::SubprocessTransport;

/// Error codes the worker uses for the failures the engine distinguishes.
pub const AUTHENTICATION: &str = "caldav-authentication";
pub const INVALID_ENTRYPOINT: &str = "caldav-invalid-entrypoint";
pub const SERVER_FAILURE: &str = "caldav-server-failure";

/// A stream ended without a terminal status.
pub const STREAM_CLOSED: &str = "stream-closed";

/// A call routed to the worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportRequest {
    pub domain: String,
    pub method: Method,
    #[serde(default)]
    pub params: serde_json::Value,
}

impl TransportRequest {
    pub fn new<C: TransportCommand>(command: &C) -> Result<Self, serde_json::Error> {
        Ok(TransportRequest {
            domain: CALDAV_DOMAIN.to_string(),
            method: C::method(),
            params: serde_json::to_value(command)?,
        })
    }
}

/// Failure reported by the worker. `name` drives classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportError {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl TransportError {
    pub fn new(name: &str) -> Self {
        TransportError {
            name: name.to_string(),
            message: None,
        }
    }

    pub fn with_message(name: &str, message: impl Into<String>) -> Self {
        TransportError {
            name: name.to_string(),
            message: Some(message.into()),
        }
    }

    /// The producer went away without reporting an outcome.
    pub fn stream_closed(message: impl Into<String>) -> Self {
        TransportError::with_message(STREAM_CLOSED, message)
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.message {
            Some(message) => write!(f, "{}: {}", self.name, message),
            None => write!(f, "{}", self.name),
        }
    }
}

impl std::error::Error for TransportError {}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Single request/response call.
    async fn request(&self, request: TransportRequest) -> Result<serde_json::Value, TransportError>;

    /// Streaming call. Nothing is produced until the stream is executed.
    fn stream(&self, request: TransportRequest) -> RemoteStream;
}
