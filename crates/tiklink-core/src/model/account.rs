use std::time::Duration;

use serde::{Deserialize, Serialize};

/// A hotspot login stored on the device.
///
/// The secret is deliberately absent: devices echo it back on print, but
/// it never leaves `convert`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HotspotAccount {
    /// Device item id, e.g. `*1A`.
    pub id: String,
    pub name: String,
    pub profile: Option<String>,
    /// Device-formatted uptime limit, e.g. `1h` or `1d 2h`.
    pub limit_uptime: Option<String>,
    pub limit_bytes_total: Option<u64>,
    /// Cumulative uptime as reported by the device.
    pub uptime: Option<String>,
    pub bytes_in: u64,
    pub bytes_out: u64,
    pub comment: Option<String>,
    pub disabled: bool,
}

impl HotspotAccount {
    pub fn has_limits(&self) -> bool {
        self.limit_uptime.is_some() || self.limit_bytes_total.is_some()
    }

    pub fn bytes_total(&self) -> u64 {
        self.bytes_in.saturating_add(self.bytes_out)
    }

    pub fn limit_uptime_duration(&self) -> Option<Duration> {
        self.limit_uptime.as_deref().and_then(crate::convert::parse_uptime)
    }

    pub fn uptime_duration(&self) -> Option<Duration> {
        self.uptime.as_deref().and_then(crate::convert::parse_uptime)
    }
}
