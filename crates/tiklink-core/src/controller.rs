// ── Controller abstraction ──
//
// Typed device operations over the connection manager. Every public call
// resolves a registered device, leases its session, issues one command and
// maps the reply rows into `crate::model` records.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use tracing::{debug, info, warn};

use tiklink_api::{Request, Response, Row};

use crate::config::{ControllerConfig, DeviceDescriptor, DeviceId};
use crate::error::CoreError;
use crate::manager::{CacheEntryInfo, ConnectionManager, PathProbe};
use crate::model::{
    ActiveSession, BoardInfo, DeviceInfo, HotspotAccount, HotspotProfile, Identity,
    ProvisionedVoucher, RouterStats, SystemResources, UsageSnapshot,
};
use crate::requests::{AddAccountRequest, EnsureOutcome, EnsureProfileRequest, VoucherPlan, paths};

/// Fragment of the trap a device sends when adding a name that exists.
const ALREADY_EXISTS: &str = "already";

// ── Controller ───────────────────────────────────────────────────

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc<ControllerInner>`. Holds the device registry
/// and the session cache; clones share both.
#[derive(Clone)]
pub struct Controller {
    inner: Arc<ControllerInner>,
}

struct ControllerInner {
    config: ControllerConfig,
    devices: DashMap<DeviceId, DeviceDescriptor>,
    manager: ConnectionManager,
}

impl Controller {
    pub fn new(config: ControllerConfig) -> Self {
        Self {
            inner: Arc::new(ControllerInner {
                manager: ConnectionManager::new(config.clone()),
                config,
                devices: DashMap::new(),
            }),
        }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.inner.config
    }

    pub fn manager(&self) -> &ConnectionManager {
        &self.inner.manager
    }

    // ── Device registry ──────────────────────────────────────────

    /// Add or replace a device. A replaced device loses its cached session.
    pub async fn register(&self, device: DeviceDescriptor) {
        let id = device.id.clone();
        if self.inner.devices.insert(id.clone(), device).is_some() {
            self.inner.manager.close(&id).await;
        }
        debug!(device = %id, "device registered");
    }

    pub async fn unregister(&self, device: &DeviceId) -> Option<DeviceDescriptor> {
        let removed = self.inner.devices.remove(device).map(|(_, d)| d);
        if removed.is_some() {
            self.inner.manager.close(device).await;
        }
        removed
    }

    pub fn device(&self, device: &DeviceId) -> Result<DeviceDescriptor, CoreError> {
        self.inner
            .devices
            .get(device)
            .map(|d| d.value().clone())
            .ok_or_else(|| CoreError::UnknownDevice {
                device: device.clone(),
            })
    }

    /// Registered device ids, sorted.
    pub fn devices(&self) -> Vec<DeviceId> {
        let mut ids: Vec<DeviceId> = self.inner.devices.iter().map(|d| d.key().clone()).collect();
        ids.sort();
        ids
    }

    pub fn cache_entries(&self) -> Vec<CacheEntryInfo> {
        self.inner.manager.entries()
    }

    pub async fn probe_paths(&self, device: &DeviceId) -> Result<Vec<PathProbe>, CoreError> {
        let descriptor = self.device(device)?;
        Ok(self.inner.manager.probe_paths(&descriptor).await)
    }

    pub async fn close(&self, device: &DeviceId) {
        self.inner.manager.close(device).await;
    }

    pub async fn close_all(&self) {
        self.inner.manager.close_all().await;
    }

    // ── Command execution ────────────────────────────────────────

    /// Run one command, retrying the whole operation after a
    /// connection-level failure as the device retry policy allows.
    async fn run(&self, device: &DeviceId, request: &Request) -> Result<Response, CoreError> {
        let descriptor = self.device(device)?;
        let policy = self.inner.config.device_retry;
        let attempts = policy.attempts.max(1);

        let mut attempt = 1;
        loop {
            match self.run_once(&descriptor, request).await {
                Err(e) if e.is_connection_level() && attempt < attempts => {
                    warn!(%device, command = request.command(), attempt, error = %e, "retrying after connection failure");
                    self.inner.manager.release_on_error(device).await;
                    tokio::time::sleep(policy.delay).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    async fn run_once(
        &self,
        device: &DeviceDescriptor,
        request: &Request,
    ) -> Result<Response, CoreError> {
        let mut lease = self.inner.manager.acquire(device).await?;
        debug!(device = %device.id, %request, "executing");
        lease.execute(request).await
    }

    async fn rows<T>(&self, device: &DeviceId, request: &Request) -> Result<Vec<T>, CoreError>
    where
        T: for<'a> From<&'a Row>,
    {
        let response = self.run(device, request).await?;
        Ok(response.rows.iter().map(T::from).collect())
    }

    /// First row of a single-record print; an empty reply maps to defaults.
    async fn record<T>(&self, device: &DeviceId, command: &str) -> Result<T, CoreError>
    where
        T: for<'a> From<&'a Row>,
    {
        let response = self.run(device, &Request::new(command)).await?;
        Ok(response.first().map_or_else(|| T::from(&Row::new()), T::from))
    }

    // ── Hotspot accounts ─────────────────────────────────────────

    pub async fn list_accounts(&self, device: &DeviceId) -> Result<Vec<HotspotAccount>, CoreError> {
        self.rows(device, &Request::new(paths::USER_PRINT)).await
    }

    pub async fn find_account(
        &self,
        device: &DeviceId,
        name: &str,
    ) -> Result<Option<HotspotAccount>, CoreError> {
        let request = Request::new(paths::USER_PRINT).query("name", name);
        let accounts: Vec<HotspotAccount> = self.rows(device, &request).await?;
        Ok(accounts.into_iter().next())
    }

    /// Create an account and return its device-assigned id.
    pub async fn add_account(
        &self,
        device: &DeviceId,
        account: &AddAccountRequest,
    ) -> Result<String, CoreError> {
        account.validate()?;
        let response = self.run(device, &account.to_request()).await?;
        let id = match response.ret {
            Some(id) => id,
            None => self
                .find_account(device, &account.name)
                .await?
                .map(|a| a.id)
                .ok_or_else(|| CoreError::NotFound {
                    entity: "account",
                    identifier: account.name.clone(),
                })?,
        };
        info!(%device, name = %account.name, %id, "account added");
        Ok(id)
    }

    pub async fn remove_account(&self, device: &DeviceId, id: &str) -> Result<(), CoreError> {
        let request = Request::new(paths::USER_REMOVE).attribute(".id", id);
        self.run(device, &request).await?;
        info!(%device, %id, "account removed");
        Ok(())
    }

    /// Look the account up by name, then remove it by id.
    pub async fn remove_account_by_name(
        &self,
        device: &DeviceId,
        name: &str,
    ) -> Result<HotspotAccount, CoreError> {
        let account = self
            .find_account(device, name)
            .await?
            .ok_or_else(|| CoreError::NotFound {
                entity: "account",
                identifier: name.to_owned(),
            })?;
        self.remove_account(device, &account.id).await?;
        Ok(account)
    }

    // ── Sessions and profiles ────────────────────────────────────

    pub async fn list_active_sessions(
        &self,
        device: &DeviceId,
    ) -> Result<Vec<ActiveSession>, CoreError> {
        self.rows(device, &Request::new(paths::ACTIVE_PRINT)).await
    }

    pub async fn list_profiles(&self, device: &DeviceId) -> Result<Vec<HotspotProfile>, CoreError> {
        self.rows(device, &Request::new(paths::PROFILE_PRINT)).await
    }

    /// Create the profile unless a lookup by name already finds it.
    ///
    /// A concurrent creator winning the race surfaces as a trap mentioning
    /// an existing name and is reported as [`EnsureOutcome::Existed`].
    pub async fn ensure_profile(
        &self,
        device: &DeviceId,
        profile: &EnsureProfileRequest,
    ) -> Result<EnsureOutcome, CoreError> {
        let existing = self.run(device, &profile.lookup()).await?;
        if !existing.rows.is_empty() {
            debug!(%device, profile = %profile.name, "profile exists");
            return Ok(EnsureOutcome::Existed);
        }

        match self.run(device, &profile.to_request()).await {
            Ok(_) => {
                info!(%device, profile = %profile.name, "profile created");
                Ok(EnsureOutcome::Created)
            }
            Err(CoreError::Command { message, .. }) if message.contains(ALREADY_EXISTS) => {
                Ok(EnsureOutcome::Existed)
            }
            Err(e) => Err(e),
        }
    }

    // ── System ───────────────────────────────────────────────────

    pub async fn get_identity(&self, device: &DeviceId) -> Result<Identity, CoreError> {
        self.record(device, paths::IDENTITY_PRINT).await
    }

    pub async fn get_board_info(&self, device: &DeviceId) -> Result<BoardInfo, CoreError> {
        self.record(device, paths::ROUTERBOARD_PRINT).await
    }

    pub async fn get_system_resources(
        &self,
        device: &DeviceId,
    ) -> Result<SystemResources, CoreError> {
        self.record(device, paths::RESOURCE_PRINT).await
    }

    // ── Aggregates ───────────────────────────────────────────────

    /// Resources plus the number of active hotspot sessions.
    pub async fn get_stats(&self, device: &DeviceId) -> Result<RouterStats, CoreError> {
        let resources = self.get_system_resources(device).await?;
        let active = self.list_active_sessions(device).await?;
        Ok(RouterStats::from_parts(&resources, active.len()))
    }

    pub async fn get_info(&self, device: &DeviceId) -> Result<DeviceInfo, CoreError> {
        let identity = self.get_identity(device).await?;
        let board = self.get_board_info(device).await?;
        let resources = self.get_system_resources(device).await?;
        let unknown = || "Unknown".to_owned();
        Ok(DeviceInfo {
            identity: identity.name,
            model: board.model.unwrap_or_else(unknown),
            serial_number: board.serial_number.unwrap_or_else(unknown),
            firmware: board.firmware.unwrap_or_else(unknown),
            cpu_load: resources.cpu_load.unwrap_or(0.0),
            free_memory: resources.free_memory.unwrap_or(0),
            uptime: resources.uptime.unwrap_or_else(|| "0s".into()),
        })
    }

    /// Accounts and active sessions, for usage accounting.
    pub async fn sync_usage(&self, device: &DeviceId) -> Result<UsageSnapshot, CoreError> {
        let accounts = self.list_accounts(device).await?;
        let active = self.list_active_sessions(device).await?;
        Ok(UsageSnapshot {
            device: device.clone(),
            collected_at: Utc::now(),
            total_accounts: accounts.len(),
            active_count: active.len(),
            accounts,
            active,
        })
    }

    /// Ensure the plan's profile exists, then create the voucher account.
    pub async fn provision_voucher(
        &self,
        device: &DeviceId,
        code: &str,
        plan: &VoucherPlan,
    ) -> Result<ProvisionedVoucher, CoreError> {
        self.ensure_profile(device, &EnsureProfileRequest::new(plan.profile.clone(), 1))
            .await?;
        let account = plan.account_for(code);
        let account_id = self.add_account(device, &account).await?;
        Ok(ProvisionedVoucher {
            device: device.clone(),
            code: code.to_owned(),
            account_id,
            profile: plan.profile.clone(),
            limit_uptime: plan.limit_uptime(),
            limit_bytes_total: plan.limit_bytes_total(),
        })
    }
}
