#![allow(clippy::unwrap_used)]
// Controller and connection-manager behavior against the mock device.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use pretty_assertions::assert_eq;
use tokio::net::TcpListener;

use tiklink_api::Request;
use tiklink_core::{
    AddAccountRequest, Controller, ControllerConfig, CoreError, Credentials, DeviceDescriptor,
    DeviceId, DeviceRetryPolicy, EnsureOutcome, EnsureProfileRequest, PathKind, RetryPolicy,
    TransportConfig, VoucherPlan,
};
use tiklink_mock::{MockHandle, MockOptions, MockServer};

// ── Helpers ─────────────────────────────────────────────────────────

async fn start(options: MockOptions) -> MockHandle {
    MockServer::bind("127.0.0.1:0", options)
        .await
        .unwrap()
        .spawn()
        .unwrap()
}

fn config() -> ControllerConfig {
    ControllerConfig {
        transport: TransportConfig::default().with_timeout(Duration::from_secs(5)),
        path_retry: RetryPolicy {
            attempts: 3,
            base_delay: Duration::from_millis(10),
        },
        ..ControllerConfig::default()
    }
}

fn descriptor(port: u16) -> DeviceDescriptor {
    DeviceDescriptor::new("r1", Credentials::new("admin", "secret"))
        .with_port(port)
        .with_path(PathKind::Direct, "127.0.0.1")
}

async fn controller_for(handle: &MockHandle) -> (Controller, DeviceId) {
    let controller = Controller::new(config());
    controller.register(descriptor(handle.port())).await;
    (controller, DeviceId::new("r1"))
}

/// A port with nothing listening on 127.0.0.1.
async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

/// Accepts and immediately drops connections on `127.0.0.2:port`,
/// counting each one.
async fn black_hole(port: u16) -> Arc<AtomicUsize> {
    let listener = TcpListener::bind(("127.0.0.2", port)).await.unwrap();
    let accepted = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&accepted);
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            drop(stream);
        }
    });
    accepted
}

// ── Accounts ────────────────────────────────────────────────────────

#[tokio::test]
async fn account_lifecycle_materializes_active_session() {
    let handle = start(MockOptions::default()).await;
    let (controller, device) = controller_for(&handle).await;

    let mut request = AddAccountRequest::new("V1");
    request.limit_uptime = Some("1h".into());
    request.limit_bytes_total = Some(1_048_576);
    let id = controller.add_account(&device, &request).await.unwrap();
    assert!(id.starts_with('*'));

    let accounts = controller.list_accounts(&device).await.unwrap();
    assert_eq!(accounts.len(), 1);
    assert_eq!(accounts[0].id, id);
    assert_eq!(accounts[0].name, "V1");
    assert_eq!(accounts[0].limit_uptime.as_deref(), Some("1h"));
    assert_eq!(accounts[0].limit_bytes_total, Some(1_048_576));

    let active = controller.list_active_sessions(&device).await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].user, "V1");
    assert!(active[0].address.is_some());

    controller.remove_account(&device, &id).await.unwrap();
    assert!(controller.list_accounts(&device).await.unwrap().is_empty());
    assert!(controller.list_active_sessions(&device).await.unwrap().is_empty());

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn unlimited_account_has_no_active_session() {
    let handle = start(MockOptions::default()).await;
    let (controller, device) = controller_for(&handle).await;

    controller
        .add_account(&device, &AddAccountRequest::new("staff"))
        .await
        .unwrap();

    assert!(controller.list_active_sessions(&device).await.unwrap().is_empty());
    let found = controller.find_account(&device, "staff").await.unwrap().unwrap();
    assert!(!found.has_limits());
    assert_eq!(controller.find_account(&device, "ghost").await.unwrap(), None);

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn explicit_unlimited_uptime_is_accepted() {
    let handle = start(MockOptions::default()).await;
    let (controller, device) = controller_for(&handle).await;

    let mut request = AddAccountRequest::new("staff");
    request.limit_uptime = Some("unlimited".into());
    controller.add_account(&device, &request).await.unwrap();

    let found = controller.find_account(&device, "staff").await.unwrap().unwrap();
    assert!(!found.has_limits());
    assert!(controller.list_active_sessions(&device).await.unwrap().is_empty());

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn remove_by_name_reports_missing_accounts() {
    let handle = start(MockOptions::default()).await;
    let (controller, device) = controller_for(&handle).await;

    controller
        .add_account(&device, &AddAccountRequest::new("guest"))
        .await
        .unwrap();
    let removed = controller.remove_account_by_name(&device, "guest").await.unwrap();
    assert_eq!(removed.name, "guest");

    let err = controller
        .remove_account_by_name(&device, "guest")
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::NotFound { entity: "account", .. }));

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn invalid_request_never_reaches_the_device() {
    let handle = start(MockOptions::default()).await;
    let (controller, device) = controller_for(&handle).await;

    let err = controller
        .add_account(&device, &AddAccountRequest::new(""))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Validation { .. }));
    assert!(controller.cache_entries().is_empty());

    handle.shutdown().await.unwrap();
}

// ── Traps and eviction ──────────────────────────────────────────────

#[tokio::test]
async fn trap_keeps_cached_session() {
    let handle = start(MockOptions::default()).await;
    let (controller, device) = controller_for(&handle).await;

    controller.list_accounts(&device).await.unwrap();
    let before = controller.cache_entries();
    assert_eq!(before.len(), 1);

    let err = controller.remove_account(&device, "*DEADBEEF").await.unwrap_err();
    match &err {
        CoreError::Command { message, .. } => assert!(message.contains("no such item")),
        other => panic!("expected a command error, got {other:?}"),
    }
    assert_eq!(err.user_message(), "no such item (*DEADBEEF)");

    let after = controller.cache_entries();
    assert_eq!(after.len(), 1);
    assert_eq!(after[0].connected_at, before[0].connected_at);
    assert_eq!(after[0].peer, before[0].peer);

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn fatal_reply_evicts_the_session() {
    let handle = start(MockOptions::default()).await;
    let (controller, device) = controller_for(&handle).await;
    let descriptor = controller.device(&device).unwrap();

    let mut lease = controller.manager().acquire(&descriptor).await.unwrap();
    assert!(lease.peer().is_some());
    let err = lease.execute(&Request::new("/quit")).await.unwrap_err();
    assert!(err.is_connection_level());
    assert_eq!(lease.path(), None);
    drop(lease);

    assert!(controller.cache_entries().is_empty());

    // Next operation connects afresh.
    controller.get_identity(&device).await.unwrap();
    let entries = controller.cache_entries();
    assert_eq!(entries.len(), 1);
    assert!(entries[0].connected_at.is_some());

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn stale_session_is_retried_when_policy_allows() {
    let handle = start(MockOptions::default()).await;
    let port = handle.port();

    let controller = Controller::new(ControllerConfig {
        device_retry: DeviceRetryPolicy {
            attempts: 2,
            delay: Duration::from_millis(10),
        },
        ..config()
    });
    controller.register(descriptor(port)).await;
    let device = DeviceId::new("r1");
    controller.list_accounts(&device).await.unwrap();

    // Restart the device on the same port; the cached socket is now dead.
    handle.shutdown().await.unwrap();
    let restarted = MockServer::bind(("127.0.0.1", port), MockOptions::default())
        .await
        .unwrap()
        .spawn()
        .unwrap();

    let identity = controller.get_identity(&device).await.unwrap();
    assert_eq!(identity.name, "MockRouterOS");

    restarted.shutdown().await.unwrap();
}

#[tokio::test]
async fn stale_session_fails_once_without_device_retry() {
    let handle = start(MockOptions::default()).await;
    let port = handle.port();
    let (controller, device) = controller_for(&handle).await;
    controller.list_accounts(&device).await.unwrap();

    handle.shutdown().await.unwrap();
    let restarted = MockServer::bind(("127.0.0.1", port), MockOptions::default())
        .await
        .unwrap()
        .spawn()
        .unwrap();

    let err = controller.get_identity(&device).await.unwrap_err();
    assert!(err.is_connection_level());
    assert_eq!(err.user_message(), "device unreachable");
    assert!(controller.cache_entries().is_empty());

    controller.get_identity(&device).await.unwrap();

    restarted.shutdown().await.unwrap();
}

// ── Path fallback ───────────────────────────────────────────────────

#[tokio::test]
async fn falls_back_after_first_path_exhausts_retries() {
    let handle = start(MockOptions::default()).await;
    let accepted = black_hole(handle.port()).await;

    let controller = Controller::new(config());
    controller
        .register(descriptor(handle.port()).with_path(PathKind::Zerotier, "127.0.0.2"))
        .await;
    let device = DeviceId::new("r1");
    let descriptor = controller.device(&device).unwrap();

    let lease = controller.manager().acquire(&descriptor).await.unwrap();
    assert_eq!(lease.path().unwrap().kind, PathKind::Direct);
    drop(lease);

    assert_eq!(accepted.load(Ordering::SeqCst), 3);

    let entries = controller.cache_entries();
    assert_eq!(entries[0].path.as_ref().unwrap().host, "127.0.0.1");

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn all_paths_failed_carries_attempts_and_last_error() {
    let port = closed_port().await;
    let controller = Controller::new(config());
    controller
        .register(
            DeviceDescriptor::new("r1", Credentials::new("admin", ""))
                .with_port(port)
                .with_path(PathKind::Direct, "127.0.0.1")
                .with_path(PathKind::Vpn, "127.0.0.1"),
        )
        .await;

    let err = controller
        .list_accounts(&DeviceId::new("r1"))
        .await
        .unwrap_err();
    match &err {
        CoreError::AllPathsFailed {
            device, attempts, ..
        } => {
            assert_eq!(device.as_str(), "r1");
            assert_eq!(*attempts, 4);
        }
        other => panic!("expected AllPathsFailed, got {other:?}"),
    }
    assert!(matches!(err.root(), CoreError::ConnectionFailure { .. }));
    assert_eq!(err.user_message(), "device unreachable");
}

#[tokio::test]
async fn login_rejection_is_not_retried() {
    let handle = start(MockOptions::strict("admin", "right")).await;
    let controller = Controller::new(config());
    controller
        .register(
            DeviceDescriptor::new("r1", Credentials::new("admin", "wrong"))
                .with_port(handle.port())
                .with_path(PathKind::Direct, "127.0.0.1"),
        )
        .await;

    let err = controller.get_identity(&DeviceId::new("r1")).await.unwrap_err();
    match &err {
        CoreError::AllPathsFailed { attempts, last, .. } => {
            assert_eq!(*attempts, 1);
            assert!(matches!(**last, CoreError::HandshakeFailure { .. }));
        }
        other => panic!("expected AllPathsFailed, got {other:?}"),
    }

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn probe_reports_each_path() {
    let handle = start(MockOptions::default()).await;
    let controller = Controller::new(config());
    controller
        .register(
            DeviceDescriptor::new("r1", Credentials::new("admin", ""))
                .with_port(handle.port())
                .with_path(PathKind::Direct, "127.0.0.1")
                .with_path(PathKind::Tailscale, "127.0.0.2"),
        )
        .await;

    let probes = controller.probe_paths(&DeviceId::new("r1")).await.unwrap();
    assert_eq!(probes.len(), 2);
    assert_eq!(probes[0].path.kind, PathKind::Tailscale);
    assert!(!probes[0].is_reachable());
    assert!(probes[1].is_reachable());
    assert!(probes[1].latency_ms.is_some());
    assert!(controller.cache_entries().is_empty());

    handle.shutdown().await.unwrap();
}

// ── Cache ───────────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_callers_share_one_session() {
    let handle = start(MockOptions::default()).await;
    let (controller, device) = controller_for(&handle).await;

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let controller = controller.clone();
            let device = device.clone();
            tokio::spawn(async move { controller.list_profiles(&device).await })
        })
        .collect();
    for task in tasks {
        let profiles = task.await.unwrap().unwrap();
        assert_eq!(profiles[0].name, "default");
    }

    let entries = controller.cache_entries();
    assert_eq!(entries.len(), 1);
    assert!(!entries[0].busy);

    controller.close_all().await;
    assert!(controller.cache_entries().is_empty());

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn unknown_device_is_rejected() {
    let controller = Controller::new(config());
    let err = controller
        .list_accounts(&DeviceId::new("nowhere"))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::UnknownDevice { .. }));
}

#[tokio::test]
async fn reregistering_drops_cached_session() {
    let handle = start(MockOptions::default()).await;
    let (controller, device) = controller_for(&handle).await;
    controller.list_accounts(&device).await.unwrap();
    assert_eq!(controller.cache_entries().len(), 1);

    controller.register(descriptor(handle.port())).await;
    assert!(controller.cache_entries().is_empty());
    assert_eq!(controller.devices(), [device.clone()]);

    assert!(controller.unregister(&device).await.is_some());
    assert!(controller.devices().is_empty());

    handle.shutdown().await.unwrap();
}

// ── Profiles and vouchers ───────────────────────────────────────────

#[tokio::test]
async fn ensure_profile_reads_before_creating() {
    let handle = start(MockOptions::default()).await;
    let (controller, device) = controller_for(&handle).await;

    let default = EnsureProfileRequest::new("default", 1);
    assert_eq!(
        controller.ensure_profile(&device, &default).await.unwrap(),
        EnsureOutcome::Existed
    );

    let vip = EnsureProfileRequest::new("vip", 3);
    assert_eq!(
        controller.ensure_profile(&device, &vip).await.unwrap(),
        EnsureOutcome::Created
    );
    assert_eq!(
        controller.ensure_profile(&device, &vip).await.unwrap(),
        EnsureOutcome::Existed
    );

    let profiles = controller.list_profiles(&device).await.unwrap();
    let vip = profiles.iter().find(|p| p.name == "vip").unwrap();
    assert_eq!(vip.shared_users, Some(3));

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn provision_voucher_creates_profile_and_limited_account() {
    let handle = start(MockOptions::default()).await;
    let (controller, device) = controller_for(&handle).await;

    let plan = VoucherPlan {
        hours: 1,
        data_mb: 1,
        profile: "1hour".into(),
    };
    let voucher = controller
        .provision_voucher(&device, "ABC123", &plan)
        .await
        .unwrap();
    assert_eq!(voucher.limit_uptime, "1h");
    assert_eq!(voucher.limit_bytes_total, 1_048_576);

    controller
        .provision_voucher(&device, "XYZ789", &plan)
        .await
        .unwrap();

    let state = handle.state().snapshot();
    let account = state.account("ABC123").unwrap();
    assert_eq!(account.password, "ABC123");
    assert_eq!(account.profile, "1hour");
    assert_eq!(account.limit_bytes_total.as_deref(), Some("1048576"));
    assert_eq!(state.profiles().iter().filter(|p| p.name == "1hour").count(), 1);
    assert_eq!(state.active_sessions().len(), 2);

    let err = controller
        .provision_voucher(&device, "ABC123", &plan)
        .await
        .unwrap_err();
    assert!(err.user_message().contains("already have user"));

    handle.shutdown().await.unwrap();
}

// ── System and aggregates ───────────────────────────────────────────

#[tokio::test]
async fn system_records_and_info() {
    let handle = start(MockOptions::default()).await;
    let (controller, device) = controller_for(&handle).await;

    let board = controller.get_board_info(&device).await.unwrap();
    assert!(board.routerboard);
    assert_eq!(board.serial_number.as_deref(), Some("MOCK-12345678"));

    let resources = controller.get_system_resources(&device).await.unwrap();
    let cpu = resources.cpu_load.unwrap();
    assert!((10.0..=40.0).contains(&cpu));
    assert_eq!(resources.version.as_deref(), Some("6.49.7 (stable)"));

    let info = controller.get_info(&device).await.unwrap();
    assert_eq!(info.identity, "MockRouterOS");
    assert_eq!(info.model, "RB750Gr3");
    assert_eq!(info.firmware, "6.49.7");
    assert_eq!(info.uptime, "5d 12h 30m 15s");

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn stats_and_usage_count_active_sessions() {
    let handle = start(MockOptions::default()).await;
    let (controller, device) = controller_for(&handle).await;

    let plan = VoucherPlan::new(2, 100);
    controller.provision_voucher(&device, "V1", &plan).await.unwrap();
    controller
        .add_account(&device, &AddAccountRequest::new("staff"))
        .await
        .unwrap();

    let stats = controller.get_stats(&device).await.unwrap();
    assert_eq!(stats.active_users, 1);
    assert_eq!(stats.board_name, "RB750Gr3");
    assert_eq!(stats.memory.total, 262_144_000);
    assert!(stats.memory.usage_percent > 0.0);

    let usage = controller.sync_usage(&device).await.unwrap();
    assert_eq!(usage.total_accounts, 2);
    assert_eq!(usage.active_count, 1);
    assert_eq!(usage.device, device);

    let json = serde_json::to_value(&usage).unwrap();
    assert_eq!(json["active"][0]["user"], "V1");

    handle.shutdown().await.unwrap();
}
