use std::net::IpAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// A client currently logged in to the hotspot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveSession {
    pub id: Option<String>,
    pub user: String,
    pub address: Option<IpAddr>,
    pub mac_address: Option<String>,
    pub uptime: Option<String>,
    pub bytes_in: u64,
    pub bytes_out: u64,
}

impl ActiveSession {
    pub fn uptime_duration(&self) -> Option<Duration> {
        self.uptime.as_deref().and_then(crate::convert::parse_uptime)
    }
}
