//! Shared configuration for tiklink tools.
//!
//! A TOML device inventory plus global defaults, credential resolution
//! (env + keyring + plaintext), and translation to `tiklink_core`'s
//! [`DeviceDescriptor`] and [`ControllerConfig`]. The CLI layers its flag
//! overrides on top of what this crate resolves.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use tiklink_core::{
    ControllerConfig, Credentials, DEFAULT_PORT, DeviceDescriptor, DeviceRetryPolicy, LoginMethod,
    PathKind, RetryPolicy, TransportConfig,
};

/// Keyring service name; entries are `<device>/password`.
pub const KEYRING_SERVICE: &str = "tiklink";

/// Environment prefix. Nested keys use `__`, e.g.
/// `TIKLINK_DEVICES__HQ__HOST=203.0.113.7`.
pub const ENV_PREFIX: &str = "TIKLINK_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("device '{name}' is not in the inventory")]
    UnknownDevice { name: String },

    #[error("no device selected and no default_device configured")]
    NoDeviceSelected,

    #[error("device '{name}' is marked inactive")]
    Inactive { name: String },

    #[error("no credentials configured for device '{name}'")]
    NoCredentials { name: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
pub struct Config {
    /// Device used when none is named on the command line.
    pub default_device: Option<String>,

    #[serde(default)]
    pub defaults: Defaults,

    /// Device inventory, keyed by name.
    #[serde(default)]
    pub devices: BTreeMap<String, DeviceProfile>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Defaults {
    pub output: String,
    /// Connect, handshake and command timeout, in seconds.
    pub timeout: u64,
    pub port: u16,
    pub username: String,
    pub login_method: LoginMethod,
    /// Attempts on the first path before falling back.
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
    /// Whole-operation attempts after a connection failure.
    pub device_retry_attempts: u32,
    pub verify_on_connect: bool,
    /// Consult the system keyring for passwords.
    pub use_keyring: bool,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: "table".into(),
            timeout: 10,
            port: DEFAULT_PORT,
            username: "admin".into(),
            login_method: LoginMethod::default(),
            retry_attempts: 3,
            retry_delay_ms: 1000,
            device_retry_attempts: 1,
            verify_on_connect: true,
            use_keyring: true,
        }
    }
}

/// One device in the inventory.
///
/// Every address that is set becomes a path; they are tried mesh overlay
/// first, then VPN, then `host`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
pub struct DeviceProfile {
    /// Direct address (LAN or public).
    pub host: Option<String>,
    pub zerotier_ip: Option<String>,
    pub tailscale_ip: Option<String>,
    pub vpn_ip: Option<String>,

    pub port: Option<u16>,
    pub username: Option<String>,

    /// Plaintext password. Prefer `password_env` or the keyring.
    pub password: Option<String>,

    /// Environment variable holding the password.
    pub password_env: Option<String>,

    pub login_method: Option<LoginMethod>,

    /// Inactive devices stay in the inventory but are never contacted.
    #[serde(default = "default_active")]
    pub active: bool,

    pub description: Option<String>,
}

fn default_active() -> bool {
    true
}

impl DeviceProfile {
    /// Configured addresses as `(kind, host)` pairs, in priority order.
    pub fn paths(&self) -> Vec<(PathKind, String)> {
        [
            (PathKind::Zerotier, &self.zerotier_ip),
            (PathKind::Tailscale, &self.tailscale_ip),
            (PathKind::Vpn, &self.vpn_ip),
            (PathKind::Direct, &self.host),
        ]
        .into_iter()
        .filter_map(|(kind, host)| {
            host.as_deref()
                .map(str::trim)
                .filter(|h| !h.is_empty())
                .map(|h| (kind, h.to_owned()))
        })
        .collect()
    }
}

impl Config {
    pub fn device(&self, name: &str) -> Result<&DeviceProfile, ConfigError> {
        self.devices.get(name).ok_or_else(|| ConfigError::UnknownDevice {
            name: name.into(),
        })
    }

    /// Pick the device to operate on: the explicit name, else
    /// `default_device`, else the only device in the inventory.
    pub fn select_device<'a>(&'a self, name: Option<&'a str>) -> Result<&'a str, ConfigError> {
        if let Some(name) = name.or(self.default_device.as_deref()) {
            return Ok(name);
        }
        match self.devices.keys().next() {
            Some(only) if self.devices.len() == 1 => Ok(only.as_str()),
            _ => Err(ConfigError::NoDeviceSelected),
        }
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "tiklink", "tiklink").map_or_else(
        || {
            let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
            p.push(".config");
            p.push("tiklink");
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

// ── Config loading ──────────────────────────────────────────────────

/// Load from the canonical path + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from `path` + environment. A missing file yields the defaults.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

/// Serialize config to TOML and write it to `path`, creating parents.
pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution ───────────────────────────────────────────

/// Resolve a device password: `password_env`, then the keyring (when
/// enabled), then plaintext in config.
pub fn resolve_password(
    profile: &DeviceProfile,
    name: &str,
    use_keyring: bool,
) -> Result<SecretString, ConfigError> {
    // 1. Profile's password_env → env var lookup
    if let Some(ref env_name) = profile.password_env {
        if let Ok(val) = std::env::var(env_name) {
            return Ok(SecretString::from(val));
        }
    }

    // 2. System keyring
    if use_keyring {
        if let Ok(entry) = keyring::Entry::new(KEYRING_SERVICE, &format!("{name}/password")) {
            if let Ok(pw) = entry.get_password() {
                return Ok(SecretString::from(pw));
            }
        }
    }

    // 3. Plaintext in config
    if let Some(ref pw) = profile.password {
        return Ok(SecretString::from(pw.clone()));
    }

    Err(ConfigError::NoCredentials { name: name.into() })
}

/// Build the descriptor for inventory device `name`.
pub fn device_descriptor(config: &Config, name: &str) -> Result<DeviceDescriptor, ConfigError> {
    let profile = config.device(name)?;
    if !profile.active {
        return Err(ConfigError::Inactive { name: name.into() });
    }

    let paths = profile.paths();
    if paths.is_empty() {
        return Err(ConfigError::Validation {
            field: format!("devices.{name}"),
            reason: "no host, zerotier_ip, tailscale_ip or vpn_ip set".into(),
        });
    }

    let defaults = &config.defaults;
    let credentials = Credentials {
        username: profile
            .username
            .clone()
            .unwrap_or_else(|| defaults.username.clone()),
        password: resolve_password(profile, name, defaults.use_keyring)?,
    };

    let descriptor = paths.into_iter().fold(
        DeviceDescriptor::new(name, credentials)
            .with_port(profile.port.unwrap_or(defaults.port))
            .with_login_method(profile.login_method.unwrap_or(defaults.login_method)),
        |d, (kind, host)| d.with_path(kind, host),
    );
    Ok(descriptor)
}

/// Connection tuning from `[defaults]`, no CLI overrides.
pub fn controller_config(defaults: &Defaults) -> ControllerConfig {
    ControllerConfig {
        transport: TransportConfig::default().with_timeout(Duration::from_secs(defaults.timeout)),
        path_retry: RetryPolicy {
            attempts: defaults.retry_attempts.max(1),
            base_delay: Duration::from_millis(defaults.retry_delay_ms),
        },
        device_retry: DeviceRetryPolicy {
            attempts: defaults.device_retry_attempts.max(1),
            delay: Duration::from_millis(defaults.retry_delay_ms),
        },
        verify_on_connect: defaults.verify_on_connect,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use secrecy::ExposeSecret;

    fn profile() -> DeviceProfile {
        DeviceProfile {
            host: Some("203.0.113.7".into()),
            vpn_ip: Some("10.8.0.2".into()),
            zerotier_ip: Some("  ".into()),
            password: Some("hunter2".into()),
            active: true,
            ..DeviceProfile::default()
        }
    }

    #[test]
    fn blank_addresses_are_skipped() {
        assert_eq!(
            profile().paths(),
            [
                (PathKind::Vpn, "10.8.0.2".to_owned()),
                (PathKind::Direct, "203.0.113.7".to_owned()),
            ]
        );
    }

    #[test]
    fn plaintext_password_is_last_resort() {
        let pw = resolve_password(&profile(), "hq", false).unwrap();
        assert_eq!(pw.expose_secret(), "hunter2");

        let bare = DeviceProfile {
            password: None,
            ..profile()
        };
        assert!(matches!(
            resolve_password(&bare, "hq", false),
            Err(ConfigError::NoCredentials { .. })
        ));
    }

    #[test]
    fn select_device_falls_back_to_single_entry() {
        let mut config = Config::default();
        assert!(matches!(config.select_device(None), Err(ConfigError::NoDeviceSelected)));

        config.devices.insert("hq".into(), profile());
        assert_eq!(config.select_device(None).unwrap(), "hq");

        config.devices.insert("branch".into(), profile());
        assert!(config.select_device(None).is_err());
        assert_eq!(config.select_device(Some("branch")).unwrap(), "branch");

        config.default_device = Some("hq".into());
        assert_eq!(config.select_device(None).unwrap(), "hq");
    }

    #[test]
    fn controller_config_follows_defaults() {
        let defaults = Defaults {
            timeout: 3,
            retry_attempts: 0,
            ..Defaults::default()
        };
        let config = controller_config(&defaults);
        assert_eq!(config.transport.command_timeout, Duration::from_secs(3));
        assert_eq!(config.path_retry.attempts, 1);
        assert_eq!(config.device_retry.attempts, 1);
        assert!(config.verify_on_connect);
    }
}
