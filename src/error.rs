//! Centralized error types for sendria.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the sendria library.
#[derive(Error, Debug)]
pub enum SendriaError {
    /// The raw source could not be framed as an RFC 5322 message.
    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    /// I/O error with the associated file path.
    #[error("I/O error reading '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The specified file does not exist.
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// The transport could not deliver a request to the server.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The server answered with a status code the operation does not accept.
    #[error("Unexpected status code: {0}")]
    UnexpectedStatus(u16),

    /// The API envelope carried a code other than `OK`.
    #[error("API error: {0}")]
    Api(String),

    /// A response body was not the JSON we expected.
    #[error("Decoding response: {0}")]
    Json(#[from] serde_json::Error),

    /// No attachment with the given Content-ID exists in the message.
    #[error("Attachment '{cid}' not found in message {message_id}")]
    AttachmentNotFound { message_id: String, cid: String },

    /// A harness wait gave up before the expected message arrived.
    #[error("Timed out after {waited_ms} ms waiting for {what} ({seen} message(s) seen)")]
    Timeout {
        what: String,
        waited_ms: u128,
        seen: usize,
    },

    /// A harness assertion on the captured mailbox failed.
    #[error("Mailbox assertion failed: {0}")]
    Assertion(String),
}

/// Convenience alias for `Result<T, SendriaError>`.
pub type Result<T> = std::result::Result<T, SendriaError>;

impl SendriaError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Shorthand for [`SendriaError::MalformedMessage`].
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedMessage(reason.into())
    }
}

/// Allow `?` on `std::io::Error` when no path context is available.
impl From<std::io::Error> for SendriaError {
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            path: PathBuf::from("<unknown>"),
            source,
        }
    }
}
