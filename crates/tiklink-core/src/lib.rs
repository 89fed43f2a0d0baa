//! Connection management and typed hotspot operations on top of `tiklink-api`.
//!
//! - **[`Controller`]**: the facade. Holds a registry of
//!   [`DeviceDescriptor`]s and exposes one async method per device
//!   operation (`list_accounts`, `add_account`, `ensure_profile`,
//!   `get_stats`, ...). Cheap to clone; clones share the session cache.
//!
//! - **[`ConnectionManager`]**: per-device session cache. `acquire` returns a
//!   [`SessionLease`] that holds the device's lock, reusing a cached session
//!   or walking the device's paths (mesh overlay, VPN, direct) until one logs
//!   in. Sessions are evicted on connection-level failures only.
//!
//! - **Domain model** ([`model`]): typed records converted from reply rows,
//!   all `Serialize` for the CLI's output formats.
//!
//! - **[`requests`]**: typed write requests, one per mutating command.

pub mod config;
pub mod controller;
pub mod convert;
pub mod error;
pub mod manager;
pub mod model;
pub mod requests;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{
    ControllerConfig, DeviceDescriptor, DeviceId, DevicePath, DeviceRetryPolicy, PathKind,
    RetryPolicy,
};
pub use controller::Controller;
pub use error::CoreError;
pub use manager::{CacheEntryInfo, ConnectionManager, PathProbe, SessionLease};
pub use requests::{
    AddAccountRequest, DEFAULT_PROFILE, EnsureOutcome, EnsureProfileRequest, VoucherPlan,
};

pub use model::{
    ActiveSession, BoardInfo, DeviceInfo, HotspotAccount, HotspotProfile, Identity, MemoryUsage,
    ProvisionedVoucher, RouterStats, SystemResources, UsageSnapshot,
};

// Protocol types callers need to build descriptors.
pub use tiklink_api::{Credentials, DEFAULT_PORT, LoginMethod, TransportConfig};
