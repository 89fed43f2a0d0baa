// ── Core error types ──
//
// The small, closed taxonomy callers see. Raw protocol errors from
// `tiklink_api` are folded in by the `From` impl below; callers never match
// on reply tags or socket errors directly.

use thiserror::Error;

use crate::config::DeviceId;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Protocol errors ──────────────────────────────────────────────
    /// Malformed length prefix or truncated word on the wire.
    #[error("Framing error: {reason}")]
    Framing { reason: String },

    /// No usable greeting, or the device refused the login.
    #[error("Handshake failed: {message}")]
    HandshakeFailure { message: String },

    /// `!trap`: the device answered and rejected the command.
    #[error("Device rejected command: {message}")]
    Command {
        message: String,
        category: Option<u32>,
    },

    // ── Connection errors ────────────────────────────────────────────
    /// Socket error, `!fatal`, or timeout. The session is gone.
    #[error("Connection failure: {reason}")]
    ConnectionFailure { reason: String },

    /// Every configured path failed its attempt budget.
    #[error("All paths to {device} failed after {attempts} attempt(s); last error: {last}")]
    AllPathsFailed {
        device: DeviceId,
        attempts: u32,
        #[source]
        last: Box<CoreError>,
    },

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Unknown device: {device}")]
    UnknownDevice { device: DeviceId },

    #[error("{entity} not found: {identifier}")]
    NotFound {
        entity: &'static str,
        identifier: String,
    },

    #[error("Validation failed: {message}")]
    Validation { message: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl CoreError {
    /// `true` when the session that produced this error must be evicted.
    ///
    /// `AllPathsFailed` is not included: it never involves a cached session
    /// and is not retried at the device level.
    pub fn is_connection_level(&self) -> bool {
        matches!(self, Self::Framing { .. } | Self::ConnectionFailure { .. })
    }

    /// `true` when the device could not be talked to at all.
    pub fn is_unreachable(&self) -> bool {
        matches!(
            self,
            Self::ConnectionFailure { .. } | Self::AllPathsFailed { .. } | Self::Framing { .. }
        )
    }

    /// Message suitable for an operator: device-side reasons verbatim,
    /// reachability problems collapsed to one condition.
    pub fn user_message(&self) -> String {
        match self {
            Self::Command { message, .. } => message.clone(),
            e if e.is_unreachable() => "device unreachable".into(),
            other => other.to_string(),
        }
    }

    /// The innermost error of an `AllPathsFailed` chain.
    pub fn root(&self) -> &CoreError {
        match self {
            Self::AllPathsFailed { last, .. } => last.root(),
            other => other,
        }
    }
}

// ── Conversion from protocol-layer errors ───────────────────────────

impl From<tiklink_api::Error> for CoreError {
    fn from(err: tiklink_api::Error) -> Self {
        use tiklink_api::Error as Api;
        match err {
            Api::Framing { reason } => Self::Framing { reason },
            Api::Handshake { message } | Api::LoginRejected { message } => {
                Self::HandshakeFailure { message }
            }
            Api::Trap { message, category } => Self::Command { message, category },
            other @ (Api::Fatal { .. }
            | Api::UnexpectedReply(_)
            | Api::Io(_)
            | Api::ConnectionClosed
            | Api::Timeout { .. }
            | Api::NotReady { .. }) => Self::ConnectionFailure {
                reason: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn trap_maps_to_command_error() {
        let err = CoreError::from(tiklink_api::Error::Trap {
            message: "no such item".into(),
            category: Some(0),
        });
        assert!(matches!(err, CoreError::Command { .. }));
        assert!(!err.is_connection_level());
        assert_eq!(err.user_message(), "no such item");
    }

    #[test]
    fn socket_errors_collapse_to_unreachable() {
        let err = CoreError::from(tiklink_api::Error::ConnectionClosed);
        assert!(err.is_connection_level());
        assert_eq!(err.user_message(), "device unreachable");
        assert_eq!(err.to_string(), "Connection failure: Connection closed by peer");
    }

    #[test]
    fn login_rejection_is_a_handshake_failure() {
        let err = CoreError::from(tiklink_api::Error::LoginRejected {
            message: "invalid user name or password (6)".into(),
        });
        assert!(matches!(err, CoreError::HandshakeFailure { .. }));
        assert!(!err.is_connection_level());
    }

    #[test]
    fn all_paths_failed_keeps_last_error() {
        let err = CoreError::AllPathsFailed {
            device: DeviceId::new("r1"),
            attempts: 4,
            last: Box::new(CoreError::ConnectionFailure {
                reason: "connect timed out after 10000ms".into(),
            }),
        };
        assert!(!err.is_connection_level());
        assert!(err.is_unreachable());
        assert!(matches!(err.root(), CoreError::ConnectionFailure { .. }));
        assert!(err.to_string().contains("after 4 attempt(s)"));
    }
}
