//! Error types for the TripShare client.
//!
//! # Design
//! Two families of failure reach the caller: the exchange itself failed
//! (`Transport`, `MalformedBody`) or the server answered with a non-2xx
//! status (`Server`). Server errors keep the parsed JSON payload verbatim so
//! the caller decides how to present it; the client adds no interpretation.

use serde_json::Value;
use thiserror::Error;

/// The HTTP exchange could not be completed (connection refused, DNS,
/// body read aborted...).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct TransportError(pub String);

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Coarse classification of an [`ApiError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The server answered with a non-success status.
    Api,
    /// No well-formed response was obtained.
    Transport,
}

/// Errors returned by every client operation.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The server returned a non-2xx status. `payload` is its JSON error body.
    #[error("HTTP {status}: {payload}")]
    Server { status: u16, payload: Value },

    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),

    /// The response body was not valid JSON.
    #[error("malformed response body (HTTP {status}): {reason}")]
    MalformedBody { status: u16, reason: String },

    /// The request payload could not be encoded.
    #[error("serialization failed: {0}")]
    Serialization(String),
}

impl ApiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Server { .. } => ErrorKind::Api,
            ApiError::Transport(_) | ApiError::MalformedBody { .. } | ApiError::Serialization(_) => {
                ErrorKind::Transport
            }
        }
    }

    /// HTTP status, when the server produced one.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Server { status, .. } | ApiError::MalformedBody { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Best-effort human readable text: the payload's `detail`, then its
    /// `message`, then the transport failure text.
    pub fn user_message(&self) -> Option<String> {
        match self {
            ApiError::Server { payload, .. } => ["detail", "message"]
                .iter()
                .find_map(|field| readable_field(payload, field)),
            ApiError::Transport(err) => Some(err.to_string()).filter(|m| !m.is_empty()),
            ApiError::MalformedBody { reason, .. } => Some(reason.clone()),
            ApiError::Serialization(_) => None,
        }
    }
}

fn readable_field(payload: &Value, field: &str) -> Option<String> {
    match payload.get(field)? {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        // Validation errors arrive as arrays of objects.
        other => Some(other.to_string()),
    }
}

/// Errors raised by a [`KeyValueStore`](crate::storage::KeyValueStore).
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage encoding failed: {0}")]
    Encode(String),
}

/// Errors loading a runtime configuration override.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read runtime env file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse runtime env file: {0}")]
    Parse(#[from] toml::de::Error),
}
