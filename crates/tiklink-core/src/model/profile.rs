use serde::{Deserialize, Serialize};

/// Hotspot user profile (shared settings for a class of accounts).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HotspotProfile {
    pub id: Option<String>,
    pub name: String,
    pub shared_users: Option<u32>,
    pub rate_limit: Option<String>,
}
