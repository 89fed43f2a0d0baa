#![allow(clippy::unwrap_used)]
// Loading, saving and translating inventory files.

use std::time::Duration;

use pretty_assertions::assert_eq;
use secrecy::ExposeSecret;

use tiklink_config::{
    Config, ConfigError, DeviceProfile, controller_config, device_descriptor, load_config_from,
    save_config_to,
};
use tiklink_core::{LoginMethod, PathKind};

const INVENTORY: &str = r#"
default_device = "hq"

[defaults]
timeout = 5
retry_attempts = 2
use_keyring = false

[devices.hq]
host = "203.0.113.7"
zerotier_ip = "10.147.17.4"
tailscale_ip = "100.64.0.9"
password = "hunter2"
description = "Head office"

[devices.branch]
vpn_ip = "10.8.0.2"
port = 8729
username = "ops"
password = ""
login_method = "challenge"

[devices.old]
host = "192.0.2.50"
password = "x"
active = false

[devices.empty]
password = "x"
"#;

fn write_inventory(contents: &str) -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, contents).unwrap();
    (dir, path)
}

#[test]
fn missing_file_yields_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = load_config_from(&dir.path().join("absent.toml")).unwrap();
    assert!(config.devices.is_empty());
    assert_eq!(config.defaults.output, "table");
    assert_eq!(config.defaults.port, 8728);
    assert_eq!(config.defaults.login_method, LoginMethod::Plaintext);
}

#[test]
fn inventory_parses_with_defaults_filled_in() {
    let (_dir, path) = write_inventory(INVENTORY);
    let config = load_config_from(&path).unwrap();

    assert_eq!(config.default_device.as_deref(), Some("hq"));
    assert_eq!(config.defaults.timeout, 5);
    assert_eq!(config.defaults.username, "admin");
    assert_eq!(config.devices.len(), 4);
    assert!(config.devices["hq"].active);
    assert!(!config.devices["old"].active);
}

#[test]
fn descriptor_orders_paths_and_resolves_credentials() {
    let (_dir, path) = write_inventory(INVENTORY);
    let config = load_config_from(&path).unwrap();

    let hq = device_descriptor(&config, "hq").unwrap();
    assert_eq!(hq.id.as_str(), "hq");
    assert_eq!(hq.port, 8728);
    assert_eq!(hq.credentials.username, "admin");
    assert_eq!(hq.credentials.password.expose_secret(), "hunter2");
    let kinds: Vec<PathKind> = hq.ordered_paths().iter().map(|p| p.kind).collect();
    assert_eq!(kinds, [PathKind::Zerotier, PathKind::Tailscale, PathKind::Direct]);

    let branch = device_descriptor(&config, "branch").unwrap();
    assert_eq!(branch.port, 8729);
    assert_eq!(branch.credentials.username, "ops");
    assert_eq!(branch.login_method, LoginMethod::ChallengeResponse);
    assert_eq!(branch.credentials.password.expose_secret(), "");
}

#[test]
fn unusable_devices_are_rejected() {
    let (_dir, path) = write_inventory(INVENTORY);
    let config = load_config_from(&path).unwrap();

    assert!(matches!(
        device_descriptor(&config, "old"),
        Err(ConfigError::Inactive { .. })
    ));
    assert!(matches!(
        device_descriptor(&config, "empty"),
        Err(ConfigError::Validation { .. })
    ));
    assert!(matches!(
        device_descriptor(&config, "nope"),
        Err(ConfigError::UnknownDevice { .. })
    ));
}

#[test]
fn malformed_file_is_a_load_error() {
    let (_dir, path) = write_inventory("[devices.hq]\nport = \"not a port\"\n");
    assert!(matches!(load_config_from(&path), Err(ConfigError::Figment(_))));
}

#[test]
fn save_then_load_preserves_inventory() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.toml");

    let mut config = Config {
        default_device: Some("lab".into()),
        ..Config::default()
    };
    config.devices.insert(
        "lab".into(),
        DeviceProfile {
            host: Some("192.168.88.1".into()),
            password_env: Some("LAB_PASSWORD".into()),
            active: true,
            ..DeviceProfile::default()
        },
    );
    save_config_to(&config, &path).unwrap();

    let loaded = load_config_from(&path).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn controller_config_from_file_defaults() {
    let (_dir, path) = write_inventory(INVENTORY);
    let config = load_config_from(&path).unwrap();
    let controller = controller_config(&config.defaults);
    assert_eq!(controller.transport.connect_timeout, Duration::from_secs(5));
    assert_eq!(controller.path_retry.attempts, 2);
    assert_eq!(controller.path_retry.base_delay, Duration::from_millis(1000));
}
