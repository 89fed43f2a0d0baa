// ── Domain model ──
//
// Typed records for what a device reports. Every type here is built from
// raw reply rows in `crate::convert` and is what callers of `Controller`
// depend on; nothing outside core sees a `Row`.

pub mod account;
pub mod active;
pub mod profile;
pub mod report;
pub mod system;

pub use account::HotspotAccount;
pub use active::ActiveSession;
pub use profile::HotspotProfile;
pub use report::{DeviceInfo, MemoryUsage, ProvisionedVoucher, RouterStats, UsageSnapshot};
pub use system::{BoardInfo, Identity, SystemResources};
