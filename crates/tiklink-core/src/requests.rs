// ── Typed command requests ──
//
// One struct per write operation; each renders itself into a protocol
// `Request`, so attribute keys live here and nowhere else.

use serde::{Deserialize, Serialize};

use tiklink_api::Request;

use crate::error::CoreError;

/// Device command paths used by the facade.
pub mod paths {
    pub const IDENTITY_PRINT: &str = "/system/identity/print";
    pub const ROUTERBOARD_PRINT: &str = "/system/routerboard/print";
    pub const RESOURCE_PRINT: &str = "/system/resource/print";
    pub const USER_PRINT: &str = "/ip/hotspot/user/print";
    pub const USER_ADD: &str = "/ip/hotspot/user/add";
    pub const USER_REMOVE: &str = "/ip/hotspot/user/remove";
    pub const PROFILE_PRINT: &str = "/ip/hotspot/user/profile/print";
    pub const PROFILE_ADD: &str = "/ip/hotspot/user/profile/add";
    pub const ACTIVE_PRINT: &str = "/ip/hotspot/active/print";
}

/// Profile new accounts land in unless told otherwise.
pub const DEFAULT_PROFILE: &str = "default";

const BYTES_PER_MB: u64 = 1024 * 1024;

/// `/ip/hotspot/user/add`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddAccountRequest {
    pub name: String,
    pub password: String,
    pub profile: String,
    /// Device-formatted uptime limit, e.g. `1h`.
    pub limit_uptime: Option<String>,
    pub limit_bytes_total: Option<u64>,
    pub comment: Option<String>,
}

impl AddAccountRequest {
    /// Account whose password equals its name, in the default profile.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            password: name.clone(),
            name,
            profile: DEFAULT_PROFILE.into(),
            limit_uptime: None,
            limit_bytes_total: None,
            comment: None,
        }
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.name.trim().is_empty() {
            return Err(CoreError::Validation {
                message: "account name must not be empty".into(),
            });
        }
        if self.profile.trim().is_empty() {
            return Err(CoreError::Validation {
                message: "profile must not be empty".into(),
            });
        }
        if let Some(limit) = self
            .limit_uptime
            .as_deref()
            .filter(|l| *l != crate::convert::UNLIMITED)
        {
            if crate::convert::parse_uptime(limit).is_none() {
                return Err(CoreError::Validation {
                    message: format!("invalid uptime limit: {limit:?}"),
                });
            }
        }
        Ok(())
    }

    pub fn to_request(&self) -> Request {
        Request::new(paths::USER_ADD)
            .attribute("name", &self.name)
            .attribute("password", &self.password)
            .attribute("profile", &self.profile)
            .attribute_opt("limit-uptime", self.limit_uptime.as_deref())
            .attribute_opt("limit-bytes-total", self.limit_bytes_total)
            .attribute_opt("comment", self.comment.as_deref())
    }
}

/// `/ip/hotspot/user/profile/add`, issued only when the profile is missing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnsureProfileRequest {
    pub name: String,
    pub shared_users: u32,
}

impl EnsureProfileRequest {
    pub fn new(name: impl Into<String>, shared_users: u32) -> Self {
        Self {
            name: name.into(),
            shared_users,
        }
    }

    pub fn lookup(&self) -> Request {
        Request::new(paths::PROFILE_PRINT).query("name", &self.name)
    }

    pub fn to_request(&self) -> Request {
        Request::new(paths::PROFILE_ADD)
            .attribute("name", &self.name)
            .attribute("shared-users", self.shared_users)
    }
}

/// Whether `ensure_profile` had to create anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EnsureOutcome {
    Existed,
    Created,
}

/// Time and data allowance sold with a voucher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoucherPlan {
    pub hours: u32,
    pub data_mb: u64,
    pub profile: String,
}

impl VoucherPlan {
    pub fn new(hours: u32, data_mb: u64) -> Self {
        Self {
            hours,
            data_mb,
            profile: DEFAULT_PROFILE.into(),
        }
    }

    /// `<hours>h`.
    pub fn limit_uptime(&self) -> String {
        format!("{}h", self.hours)
    }

    pub fn limit_bytes_total(&self) -> u64 {
        self.data_mb.saturating_mul(BYTES_PER_MB)
    }

    /// The account a voucher `code` becomes: name and password are the code.
    pub fn account_for(&self, code: &str) -> AddAccountRequest {
        AddAccountRequest {
            name: code.to_owned(),
            password: code.to_owned(),
            profile: self.profile.clone(),
            limit_uptime: Some(self.limit_uptime()),
            limit_bytes_total: Some(self.limit_bytes_total()),
            comment: None,
        }
    }
}
