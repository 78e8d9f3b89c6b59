//! Error types for the HTTP core.
//!
//! Each layer gets its own enum so callers can tell a dead link (retried,
//! eventually fatal) from a bad document (aborts one decode) from a failed
//! token grant (aborts one request).

use thiserror::Error;

use crate::json::Phase;

/// Connection, TLS or timeout failure below the HTTP status line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Could not connect or send the request.
    #[error("connection failed: {0}")]
    Connect(String),

    /// No response within the configured timeout.
    #[error("request timed out")]
    Timeout,

    /// The connection dropped while the body was streaming.
    #[error("response body interrupted: {0}")]
    Body(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else if err.is_body() || err.is_decode() {
            TransportError::Body(err.to_string())
        } else {
            TransportError::Connect(err.to_string())
        }
    }
}

/// Failure to turn response bytes into a record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// A literal or delimiter was required and something else arrived.
    #[error("expected {expected} at byte {offset}, found {found:?}")]
    Unexpected {
        expected: &'static str,
        found: char,
        offset: u64,
    },

    /// The stream ended before the decoder reached a terminal state.
    #[error("input ended while in {phase:?}")]
    Incomplete { phase: Phase },

    /// An object (or a whole body) did not fit in its fixed buffer.
    #[error("data exceeds the {capacity} byte buffer")]
    Capacity { capacity: usize },

    /// A required key is absent.
    #[error("missing key \"{0}\"")]
    MissingField(String),

    /// The tokenizer rejected the document.
    #[error("malformed JSON: {0}")]
    Malformed(String),
}

impl From<serde_json::Error> for DecodeError {
    fn from(err: serde_json::Error) -> Self {
        DecodeError::Malformed(err.to_string())
    }
}

/// The token refresh exchange failed; the stale token is still in place.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("token refresh failed: {0}")]
    Transport(#[from] TransportError),

    #[error("token endpoint answered {0}")]
    Status(u16),

    #[error("token response unusable: {0}")]
    Decode(#[from] DecodeError),
}

/// Error surfaced by `Session::execute`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// The retry ceiling was crossed. There is no degraded mode without a
    /// link, so the process has to restart.
    #[error("giving up after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: TransportError },
}

impl SessionError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, SessionError::RetriesExhausted { .. })
    }
}
