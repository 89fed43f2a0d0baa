// ── System facts ──

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// `/system/identity`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub name: String,
}

/// `/system/routerboard`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardInfo {
    pub routerboard: bool,
    pub model: Option<String>,
    pub serial_number: Option<String>,
    pub firmware: Option<String>,
    pub upgrade_firmware: Option<String>,
}

/// `/system/resource`: live load and memory counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemResources {
    pub uptime: Option<String>,
    pub version: Option<String>,
    pub board_name: Option<String>,
    /// Percent, 0-100.
    pub cpu_load: Option<f64>,
    pub free_memory: Option<u64>,
    pub total_memory: Option<u64>,
}

impl SystemResources {
    pub fn uptime_duration(&self) -> Option<Duration> {
        self.uptime.as_deref().and_then(crate::convert::parse_uptime)
    }

    pub fn used_memory(&self) -> Option<u64> {
        Some(self.total_memory?.saturating_sub(self.free_memory?))
    }

    /// Used memory as a percentage of total, rounded to two decimals.
    #[allow(clippy::cast_precision_loss, clippy::as_conversions)]
    pub fn memory_usage_percent(&self) -> Option<f64> {
        let total = self.total_memory.filter(|t| *t > 0)?;
        let used = self.used_memory()?;
        let pct = used as f64 / total as f64 * 100.0;
        Some((pct * 100.0).round() / 100.0)
    }
}
