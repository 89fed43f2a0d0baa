// ── Connection manager ──
//
// Owns the per-device session cache. Each device gets one slot guarded by
// an async mutex; a `SessionLease` holds that lock for as long as the
// caller is talking to the device, so at most one command is in flight per
// session and two callers can never open duplicate sessions.

use std::net::SocketAddr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use tiklink_api::{Request, Response, Session};

use crate::config::{ControllerConfig, DeviceDescriptor, DeviceId, DevicePath};
use crate::error::CoreError;
use crate::requests::paths;

// ── Cache slots ──────────────────────────────────────────────────

struct CachedSession {
    session: Session,
    path: DevicePath,
    connected_at: DateTime<Utc>,
    last_used: DateTime<Utc>,
}

impl CachedSession {
    fn new(session: Session, path: DevicePath) -> Self {
        let now = Utc::now();
        Self {
            session,
            path,
            connected_at: now,
            last_used: now,
        }
    }
}

#[derive(Default)]
struct Slot {
    cached: Option<CachedSession>,
}

impl Slot {
    async fn evict(&mut self, device: &DeviceId, reason: &str) {
        if let Some(mut cached) = self.cached.take() {
            debug!(%device, path = %cached.path, reason, "evicting session");
            cached.session.close().await;
        }
    }
}

/// Point-in-time view of one cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheEntryInfo {
    pub device: DeviceId,
    /// `None` while the entry is leased out.
    pub path: Option<DevicePath>,
    pub peer: Option<SocketAddr>,
    pub connected_at: Option<DateTime<Utc>>,
    pub last_used: Option<DateTime<Utc>>,
    /// A lease currently holds the device.
    pub busy: bool,
}

/// Outcome of trying one path without caching the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathProbe {
    pub path: DevicePath,
    pub latency_ms: Option<u64>,
    pub error: Option<String>,
}

impl PathProbe {
    pub fn is_reachable(&self) -> bool {
        self.error.is_none()
    }
}

// ── ConnectionManager ────────────────────────────────────────────

/// Session cache keyed by device identity.
///
/// Owned by whoever creates it (normally a [`Controller`](crate::Controller));
/// two managers never share sessions.
pub struct ConnectionManager {
    config: ControllerConfig,
    slots: DashMap<DeviceId, Arc<Mutex<Slot>>>,
}

impl ConnectionManager {
    pub fn new(config: ControllerConfig) -> Self {
        Self {
            config,
            slots: DashMap::new(),
        }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    fn slot(&self, device: &DeviceId) -> Arc<Mutex<Slot>> {
        self.slots.entry(device.clone()).or_default().value().clone()
    }

    fn existing_slot(&self, device: &DeviceId) -> Option<Arc<Mutex<Slot>>> {
        self.slots.get(device).map(|slot| Arc::clone(slot.value()))
    }

    /// Lease a ready session for `device`, opening one if the cache has
    /// none or holds a closed one.
    ///
    /// Waits while another lease holds the same device.
    pub async fn acquire(&self, device: &DeviceDescriptor) -> Result<SessionLease, CoreError> {
        let mut guard = self.slot(&device.id).lock_owned().await;

        if guard.cached.as_ref().is_some_and(|c| !c.session.is_ready()) {
            guard.evict(&device.id, "stale").await;
        }

        if guard.cached.is_none() {
            guard.cached = Some(self.open(device).await?);
        } else {
            debug!(device = %device.id, "reusing cached session");
        }

        Ok(SessionLease {
            device: device.id.clone(),
            guard,
        })
    }

    /// Evict the cached session for `device` after a failure observed
    /// outside a lease. Waits for any active lease to finish.
    pub async fn release_on_error(&self, device: &DeviceId) {
        if let Some(slot) = self.existing_slot(device) {
            slot.lock().await.evict(device, "released on error").await;
        }
    }

    /// Close the cached session for `device`, if any.
    pub async fn close(&self, device: &DeviceId) {
        if let Some(slot) = self.existing_slot(device) {
            slot.lock().await.evict(device, "closed").await;
        }
    }

    pub async fn close_all(&self) {
        let slots: Vec<(DeviceId, Arc<Mutex<Slot>>)> = self
            .slots
            .iter()
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect();
        for (device, slot) in slots {
            slot.lock().await.evict(&device, "closed").await;
        }
        info!(count = self.slots.len(), "closed all sessions");
    }

    /// Cached and leased entries, sorted by device.
    pub fn entries(&self) -> Vec<CacheEntryInfo> {
        let mut entries: Vec<CacheEntryInfo> = self
            .slots
            .iter()
            .filter_map(|entry| {
                let device = entry.key().clone();
                match entry.value().try_lock() {
                    Ok(slot) => slot.cached.as_ref().map(|c| CacheEntryInfo {
                        device,
                        path: Some(c.path.clone()),
                        peer: Some(c.session.peer()),
                        connected_at: Some(c.connected_at),
                        last_used: Some(c.last_used),
                        busy: false,
                    }),
                    Err(_) => Some(CacheEntryInfo {
                        device,
                        path: None,
                        peer: None,
                        connected_at: None,
                        last_used: None,
                        busy: true,
                    }),
                }
            })
            .collect();
        entries.sort_by(|a, b| a.device.cmp(&b.device));
        entries
    }

    /// Try every path once, in priority order, without touching the cache.
    pub async fn probe_paths(&self, device: &DeviceDescriptor) -> Vec<PathProbe> {
        let mut probes = Vec::with_capacity(device.paths.len());
        for path in device.ordered_paths() {
            let started = Instant::now();
            let probe = match self.connect_path(device, &path).await {
                Ok(mut session) => {
                    session.close().await;
                    PathProbe {
                        latency_ms: Some(
                            u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
                        ),
                        error: None,
                        path,
                    }
                }
                Err(e) => PathProbe {
                    latency_ms: None,
                    error: Some(e.to_string()),
                    path,
                },
            };
            debug!(device = %device.id, path = %probe.path, reachable = probe.is_reachable(), "probed path");
            probes.push(probe);
        }
        probes
    }

    // ── Opening sessions ─────────────────────────────────────────

    /// Walk the paths in priority order. Only the first path is retried,
    /// and only for transient failures.
    async fn open(&self, device: &DeviceDescriptor) -> Result<CachedSession, CoreError> {
        let paths = device.ordered_paths();
        if paths.is_empty() {
            return Err(CoreError::Config {
                message: format!("device {} has no paths configured", device.id),
            });
        }

        let policy = self.config.path_retry;
        let mut attempts = 0u32;
        let mut last = None;

        for (index, path) in paths.into_iter().enumerate() {
            let budget = if index == 0 { policy.attempts.max(1) } else { 1 };

            for attempt in 1..=budget {
                attempts += 1;
                match self.connect_path(device, &path).await {
                    Ok(session) => {
                        info!(device = %device.id, %path, peer = %session.peer(), "session established");
                        return Ok(CachedSession::new(session, path));
                    }
                    Err(e) => {
                        warn!(device = %device.id, %path, attempt, error = %e, "path attempt failed");
                        let retry = e.is_transient() && attempt < budget;
                        last = Some(CoreError::from(e));
                        if !retry {
                            break;
                        }
                        tokio::time::sleep(policy.delay_after(attempt)).await;
                    }
                }
            }
        }

        Err(CoreError::AllPathsFailed {
            device: device.id.clone(),
            attempts,
            last: Box::new(last.unwrap_or_else(|| CoreError::ConnectionFailure {
                reason: "no path attempted".into(),
            })),
        })
    }

    async fn connect_path(
        &self,
        device: &DeviceDescriptor,
        path: &DevicePath,
    ) -> Result<Session, tiklink_api::Error> {
        let mut session = Session::connect(
            &path.host,
            device.port,
            &device.credentials,
            device.login_method,
            &self.config.transport,
        )
        .await?;

        if self.config.verify_on_connect {
            if let Err(e) = session.execute(&Request::new(paths::IDENTITY_PRINT)).await {
                session.close().await;
                return Err(e);
            }
        }
        Ok(session)
    }
}

// ── SessionLease ─────────────────────────────────────────────────

/// Exclusive use of one device's cached session.
///
/// Dropping the lease returns the session to the cache. A connection-level
/// failure during [`execute`](Self::execute) evicts it instead.
pub struct SessionLease {
    device: DeviceId,
    guard: OwnedMutexGuard<Slot>,
}

impl SessionLease {
    pub fn device(&self) -> &DeviceId {
        &self.device
    }

    /// Path the session was opened on; `None` once evicted.
    pub fn path(&self) -> Option<&DevicePath> {
        self.guard.cached.as_ref().map(|c| &c.path)
    }

    pub fn peer(&self) -> Option<SocketAddr> {
        self.guard.cached.as_ref().map(|c| c.session.peer())
    }

    pub async fn execute(&mut self, request: &Request) -> Result<Response, CoreError> {
        let Some(cached) = self.guard.cached.as_mut() else {
            return Err(CoreError::ConnectionFailure {
                reason: format!("session for {} was evicted", self.device),
            });
        };

        match cached.session.execute(request).await {
            Ok(response) => {
                cached.last_used = Utc::now();
                Ok(response)
            }
            Err(e) if e.is_connection_level() => {
                self.guard.evict(&self.device, "connection-level failure").await;
                Err(e.into())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Close and drop the session instead of returning it to the cache.
    pub async fn evict(mut self) {
        self.guard.evict(&self.device, "evicted by caller").await;
    }
}
