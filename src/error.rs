//! Error types
//!
//! Failures are contained at the smallest possible scope: a malformed or
//! un-inferable message only loses that message, a failed delivery only loses
//! that client. Nothing in this crate is fatal to the process.

use thiserror::Error;

use crate::registry::ClientId;

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type
///
/// Ingest failures never reach this level; the read loop contains them at
/// message scope.
#[derive(Debug, Error)]
pub enum Error {
    /// IO error (accept loop, socket configuration)
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure while handling a single inbound producer message
///
/// Terminates handling of that message only; the connection's read loop
/// continues with the next message.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Inbound message failed to parse or validate
    #[error("malformed input: {0}")]
    Malformed(#[from] MalformedInput),

    /// Inference adapter call failed
    #[error("inference failed: {0}")]
    Inference(#[from] InferenceError),

    /// Result event failed to serialize; nothing was broadcast
    #[error("event serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Inbound message failed shape validation; the message is dropped and no
/// broadcast occurs
#[derive(Debug, Error)]
pub enum MalformedInput {
    /// Not valid JSON, or missing/mistyped fields
    #[error("invalid message json: {0}")]
    Json(#[from] serde_json::Error),

    /// Frame payload is not a base64 data URL
    #[error("frame payload is not a data url")]
    NotADataUrl,

    /// Frame payload failed base64 decoding
    #[error("invalid base64 frame payload: {0}")]
    Base64(#[from] base64::DecodeError),

    /// Inbound frame exceeds the configured size limit
    #[error("frame of {size} bytes exceeds limit of {limit}")]
    FrameTooLarge { size: usize, limit: usize },
}

/// Inference adapter failure
///
/// Covers both errors returned by the adapter and adapter task panics.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct InferenceError {
    message: String,
}

impl InferenceError {
    /// Create an inference error with the given message
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Failure delivering one broadcast event to one client
///
/// Never propagates to other clients or aborts the broadcast.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// Client's channel is closed; the peer is presumed dead and the client
    /// is removed from the registry
    #[error("client {0} disconnected")]
    Closed(ClientId),

    /// Client's send queue is full; this event is dropped for this client
    #[error("client {0} queue full, event dropped")]
    QueueFull(ClientId),
}
