// ── Runtime connection configuration ──
//
// Device descriptors and connection tuning. Built by the caller (CLI,
// config crate, tests) and handed to `Controller`; core never reads files.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use tiklink_api::{Credentials, DEFAULT_PORT, LoginMethod, TransportConfig};

/// Stable identity of a device, used as the cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for DeviceId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Network route to a device, in fallback priority order.
///
/// Overlay-mesh paths come first, then VPN, then the direct address.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PathKind {
    Zerotier,
    Tailscale,
    Vpn,
    Direct,
}

impl PathKind {
    /// Lower is tried first.
    pub fn priority(self) -> u8 {
        match self {
            Self::Zerotier => 0,
            Self::Tailscale => 1,
            Self::Vpn => 2,
            Self::Direct => 3,
        }
    }
}

/// One reachability path: a route kind plus the address to dial.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DevicePath {
    pub kind: PathKind,
    pub host: String,
}

impl DevicePath {
    pub fn new(kind: PathKind, host: impl Into<String>) -> Self {
        Self {
            kind,
            host: host.into(),
        }
    }
}

impl fmt::Display for DevicePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.host)
    }
}

/// Everything needed to reach and log into one device.
///
/// Owned by the caller; the manager only reads it.
#[derive(Debug, Clone)]
pub struct DeviceDescriptor {
    pub id: DeviceId,
    pub paths: Vec<DevicePath>,
    pub port: u16,
    pub credentials: Credentials,
    pub login_method: LoginMethod,
}

impl DeviceDescriptor {
    /// A descriptor with no paths yet, default port, plaintext login.
    pub fn new(id: impl Into<DeviceId>, credentials: Credentials) -> Self {
        Self {
            id: id.into(),
            paths: Vec::new(),
            port: DEFAULT_PORT,
            credentials,
            login_method: LoginMethod::default(),
        }
    }

    pub fn with_path(mut self, kind: PathKind, host: impl Into<String>) -> Self {
        self.paths.push(DevicePath::new(kind, host));
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_login_method(mut self, method: LoginMethod) -> Self {
        self.login_method = method;
        self
    }

    /// Paths in the order they are tried. Stable for equal kinds.
    pub fn ordered_paths(&self) -> Vec<DevicePath> {
        let mut paths = self.paths.clone();
        paths.sort_by_key(|p| p.kind.priority());
        paths
    }
}

/// Retry budget for the first (highest-priority) path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts on the first path, including the first one.
    pub attempts: u32,
    /// Delay before retry `n` is `base_delay * n`.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    /// No retries at all.
    pub fn none() -> Self {
        Self {
            attempts: 1,
            base_delay: Duration::ZERO,
        }
    }

    /// Linear backoff after the given (1-based) failed attempt.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }
}

/// Whole-operation retry applied by `Controller` after a connection-level
/// failure. Kept separate from the path-level [`RetryPolicy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceRetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for DeviceRetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 1,
            delay: Duration::ZERO,
        }
    }
}

/// Tuning for a [`Controller`](crate::Controller).
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Socket timeouts and frame limits.
    pub transport: TransportConfig,
    /// Retries on the first path before falling back.
    pub path_retry: RetryPolicy,
    /// Retries of a whole operation after eviction.
    pub device_retry: DeviceRetryPolicy,
    /// Issue `/system/identity/print` after login before caching a session.
    pub verify_on_connect: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            transport: TransportConfig::default(),
            path_retry: RetryPolicy::default(),
            device_retry: DeviceRetryPolicy::default(),
            verify_on_connect: true,
        }
    }
}
