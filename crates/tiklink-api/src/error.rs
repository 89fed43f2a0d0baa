use std::time::Duration;

use thiserror::Error;

use crate::session::SessionState;

/// Top-level error type for the `tiklink-api` crate.
///
/// Covers every failure mode of one device conversation: framing,
/// handshake, login, command replies, and the socket underneath.
/// `tiklink-core` folds these into its smaller user-facing taxonomy.
#[derive(Debug, Error)]
pub enum Error {
    // ── Framing ─────────────────────────────────────────────────────
    /// Malformed length prefix, truncated word, oversize frame, or
    /// non-UTF-8 word bytes.
    #[error("Framing error: {reason}")]
    Framing { reason: String },

    // ── Handshake / login ───────────────────────────────────────────
    /// The greeting was missing, malformed, or carried a bad challenge.
    #[error("Handshake failed: {message}")]
    Handshake { message: String },

    /// The device answered `/login` with `!fatal` (or `!trap`).
    #[error("Login rejected: {message}")]
    LoginRejected { message: String },

    // ── Command replies ─────────────────────────────────────────────
    /// `!trap`: the device rejected this command; the session stays usable.
    #[error("Command failed: {message}")]
    Trap {
        message: String,
        category: Option<u32>,
    },

    /// `!fatal`: the device is closing the connection.
    #[error("Device closed the session: {message}")]
    Fatal { message: String },

    /// A reply that does not fit the request/response state machine.
    #[error("Unexpected reply: {0}")]
    UnexpectedReply(String),

    // ── Transport ───────────────────────────────────────────────────
    /// Socket error (connection refused, reset, DNS failure, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The peer closed the stream while a reply was outstanding.
    #[error("Connection closed by peer")]
    ConnectionClosed,

    /// Connect, handshake, or command wait exceeded its deadline.
    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout {
        operation: &'static str,
        timeout_ms: u64,
    },

    /// A command was issued on a session that is not in the `Ready` state.
    #[error("Session is not ready (state: {state})")]
    NotReady { state: SessionState },
}

impl Error {
    pub(crate) fn framing(reason: impl Into<String>) -> Self {
        Self::Framing {
            reason: reason.into(),
        }
    }

    pub(crate) fn timeout(operation: &'static str, after: Duration) -> Self {
        Self::Timeout {
            operation,
            timeout_ms: u64::try_from(after.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// Returns `true` if the session that produced this error can no longer
    /// be trusted and must be discarded.
    ///
    /// Only `!trap` leaves the conversation intact.
    pub fn is_connection_level(&self) -> bool {
        !matches!(self, Self::Trap { .. })
    }

    /// Returns `true` if retrying the same path might succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Io(_)
                | Self::ConnectionClosed
                | Self::Timeout { .. }
                | Self::Framing { .. }
                | Self::Handshake { .. }
        )
    }

    /// The device-supplied message for `!trap` / `!fatal` / login failures.
    pub fn device_message(&self) -> Option<&str> {
        match self {
            Self::Trap { message, .. }
            | Self::Fatal { message }
            | Self::LoginRejected { message } => Some(message),
            _ => None,
        }
    }
}
