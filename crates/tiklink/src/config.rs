//! Device and connection resolution for the CLI.
//!
//! `tiklink-config` resolves the inventory; this module layers the global
//! flags on top. `--host` bypasses the inventory for a one-off device.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use tiklink_config::{Config, ConfigError};
use tiklink_core::{ControllerConfig, Credentials, DeviceDescriptor, LoginMethod, PathKind};

use crate::cli::{GlobalOpts, LoginMethodArg};
use crate::error::CliError;

impl From<LoginMethodArg> for LoginMethod {
    fn from(arg: LoginMethodArg) -> Self {
        match arg {
            LoginMethodArg::Plaintext => Self::Plaintext,
            LoginMethodArg::Challenge => Self::ChallengeResponse,
        }
    }
}

/// Config file in effect: `--config`, else the platform default.
pub fn effective_path(global: &GlobalOpts) -> PathBuf {
    global.config.clone().unwrap_or_else(tiklink_config::config_path)
}

pub fn load(global: &GlobalOpts) -> Result<Config, CliError> {
    Ok(tiklink_config::load_config_from(&effective_path(global))?)
}

/// Resolve the target device from `--host` or the inventory.
pub fn resolve_device(global: &GlobalOpts, cfg: &Config) -> Result<DeviceDescriptor, CliError> {
    if let Some(host) = global.host.as_deref() {
        return Ok(ad_hoc_device(host, global, cfg));
    }

    let name = cfg
        .select_device(global.device.as_deref())
        .map_err(|err| match err {
            ConfigError::NoDeviceSelected => CliError::NoDevice {
                path: effective_path(global).display().to_string(),
            },
            other => other.into(),
        })?;

    let mut device = match tiklink_config::device_descriptor(cfg, name) {
        Ok(device) => device,
        // An explicit --password stands in for missing stored credentials.
        Err(ConfigError::NoCredentials { .. }) if global.password.is_some() => {
            without_stored_password(cfg, name)?
        }
        Err(ConfigError::UnknownDevice { name }) => {
            return Err(CliError::DeviceNotFound {
                name,
                available: available_devices(cfg),
            });
        }
        Err(err) => return Err(err.into()),
    };

    apply_overrides(&mut device, global);
    Ok(device)
}

/// Connection tuning from `[defaults]` with `--timeout` applied.
pub fn controller_config(global: &GlobalOpts, cfg: &Config) -> ControllerConfig {
    let mut config = tiklink_config::controller_config(&cfg.defaults);
    if let Some(secs) = global.timeout {
        config.transport = config.transport.with_timeout(Duration::from_secs(secs));
    }
    config
}

fn ad_hoc_device(host: &str, global: &GlobalOpts, cfg: &Config) -> DeviceDescriptor {
    let credentials = Credentials {
        username: global
            .username
            .clone()
            .unwrap_or_else(|| cfg.defaults.username.clone()),
        password: SecretString::from(global.password.clone().unwrap_or_default()),
    };
    DeviceDescriptor::new(host, credentials)
        .with_path(PathKind::Direct, host)
        .with_port(global.port.unwrap_or(cfg.defaults.port))
        .with_login_method(
            global
                .login_method
                .map_or(cfg.defaults.login_method, LoginMethod::from),
        )
}

/// Rebuild an inventory device with an empty password, for
/// `apply_overrides` to replace.
fn without_stored_password(cfg: &Config, name: &str) -> Result<DeviceDescriptor, CliError> {
    let mut patched = cfg.clone();
    patched.defaults.use_keyring = false;
    if let Some(profile) = patched.devices.get_mut(name) {
        profile.password = Some(String::new());
        profile.password_env = None;
    }
    tracing::debug!(device = name, "no stored password, using --password");
    Ok(tiklink_config::device_descriptor(&patched, name)?)
}

fn apply_overrides(device: &mut DeviceDescriptor, global: &GlobalOpts) {
    if let Some(port) = global.port {
        device.port = port;
    }
    if let Some(ref username) = global.username {
        device.credentials.username.clone_from(username);
    }
    if let Some(ref password) = global.password {
        device.credentials.password = SecretString::from(password.clone());
    }
    if let Some(method) = global.login_method {
        device.login_method = method.into();
    }
}

fn available_devices(cfg: &Config) -> String {
    if cfg.devices.is_empty() {
        return "(none configured)".into();
    }
    cfg.devices.keys().cloned().collect::<Vec<_>>().join(", ")
}
