//! # Error Types
//!
//! Outcome taxonomy for correlated requests, plus configuration errors.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

/// Failures raised by a datagram transport.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Socket operation failed.
    #[error("{operation} failed ({kind:?}): {message}")]
    Io {
        operation: &'static str,
        kind: io::ErrorKind,
        message: String,
    },

    /// The transport has been closed.
    #[error("transport closed")]
    Closed,

    /// The destination refused or could not be routed.
    #[error("destination unreachable: {0}")]
    Unreachable(SocketAddr),
}

impl TransportError {
    /// Wrap an I/O error together with the operation that produced it.
    pub fn io(operation: &'static str, err: &io::Error) -> Self {
        Self::Io {
            operation,
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Failures while encoding or decoding a protocol message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Fewer bytes than the format requires.
    #[error("truncated message: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    /// A type or tag field held an unexpected value.
    #[error("unexpected message type: expected {expected}, got {actual}")]
    UnexpectedType { expected: u8, actual: u8 },

    /// Structurally invalid content.
    #[error("malformed message: {0}")]
    Malformed(String),

    /// The peer answered with a non-zero error status.
    #[error("error status {status} at index {index}")]
    ErrorStatus { status: u32, index: u32 },

    /// The peer answered with a non-zero response code.
    #[error("response code {0}")]
    ResponseCode(u8),

    /// A name could not be encoded.
    #[error("invalid name: {0}")]
    InvalidName(String),
}

/// The single failure type delivered for an issued request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    /// Sending the request failed.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// No response arrived before the deadline.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The connection closed while the request was pending.
    #[error("connection closed")]
    Closed,

    /// The response (or the request) could not be encoded or decoded.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The allocated id is still held by an older outstanding request.
    #[error("correlation id {0} is still outstanding")]
    IdCollision(u64),
}

impl RequestError {
    /// Whether this failure came from the timeout decorator.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

/// Configuration loading and validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// File could not be read.
    #[error("failed to read config: {0}")]
    Io(String),

    /// TOML could not be parsed.
    #[error("failed to parse config: {0}")]
    Parse(String),

    /// A value is out of range.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
