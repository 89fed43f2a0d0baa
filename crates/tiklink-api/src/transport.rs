// Socket-level tuning shared by every session.

use std::time::Duration;

use crate::codec::DEFAULT_MAX_SENTENCE_LEN;

/// Default API port on the device.
pub const DEFAULT_PORT: u16 = 8728;

/// Timeouts and limits applied to one session's socket.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// TCP connect deadline.
    pub connect_timeout: Duration,
    /// Deadline for the greeting plus the `/login` exchange.
    pub handshake_timeout: Duration,
    /// Deadline for one command's complete reply.
    pub command_timeout: Duration,
    /// Largest sentence frame accepted in either direction.
    pub max_sentence_len: usize,
    /// Set `TCP_NODELAY` on the socket.
    pub nodelay: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            handshake_timeout: Duration::from_secs(10),
            command_timeout: Duration::from_secs(10),
            max_sentence_len: DEFAULT_MAX_SENTENCE_LEN,
            nodelay: true,
        }
    }
}

impl TransportConfig {
    /// Apply one timeout to connect, handshake and commands alike.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self.handshake_timeout = timeout;
        self.command_timeout = timeout;
        self
    }
}
