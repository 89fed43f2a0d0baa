// ── Composite reports ──
//
// Aggregates built from several commands against one device.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::DeviceId;

use super::{ActiveSession, HotspotAccount, SystemResources};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemoryUsage {
    pub total: u64,
    pub free: u64,
    pub used: u64,
    pub usage_percent: f64,
}

/// Load, memory and hotspot occupancy at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouterStats {
    pub cpu_load: f64,
    pub memory: MemoryUsage,
    pub uptime: String,
    pub active_users: usize,
    pub board_name: String,
    pub version: String,
}

impl RouterStats {
    pub(crate) fn from_parts(resources: &SystemResources, active_users: usize) -> Self {
        let total = resources.total_memory.unwrap_or(0);
        let free = resources.free_memory.unwrap_or(0);
        Self {
            cpu_load: resources.cpu_load.unwrap_or(0.0),
            memory: MemoryUsage {
                total,
                free,
                used: total.saturating_sub(free),
                usage_percent: resources.memory_usage_percent().unwrap_or(0.0),
            },
            uptime: resources.uptime.clone().unwrap_or_else(|| "0s".into()),
            active_users,
            board_name: resources.board_name.clone().unwrap_or_else(|| "Unknown".into()),
            version: resources.version.clone().unwrap_or_else(|| "Unknown".into()),
        }
    }
}

/// Identity, hardware and a resource summary in one record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceInfo {
    pub identity: String,
    pub model: String,
    pub serial_number: String,
    pub firmware: String,
    pub cpu_load: f64,
    pub free_memory: u64,
    pub uptime: String,
}

/// Accounts and live sessions collected together for usage accounting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UsageSnapshot {
    pub device: DeviceId,
    pub collected_at: DateTime<Utc>,
    pub total_accounts: usize,
    pub active_count: usize,
    pub accounts: Vec<HotspotAccount>,
    pub active: Vec<ActiveSession>,
}

/// Result of provisioning one voucher onto a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProvisionedVoucher {
    pub device: DeviceId,
    pub code: String,
    pub account_id: String,
    pub profile: String,
    pub limit_uptime: String,
    pub limit_bytes_total: u64,
}
