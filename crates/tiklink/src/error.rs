//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text and stable exit codes.

use miette::Diagnostic;
use thiserror::Error;

use tiklink_config::ConfigError;
use tiklink_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONFLICT: i32 = 6;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

/// Trap fragments devices use for duplicate names and unknown ids.
const TRAP_EXISTS: &str = "already have";
const TRAP_NO_SUCH_ITEM: &str = "no such item";

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Device '{device}' is unreachable")]
    #[diagnostic(
        code(tiklink::unreachable),
        help(
            "{reason}\n\
             Check which paths answer with: tiklink paths probe --device {device}"
        )
    )]
    Unreachable { device: String, reason: String },

    #[error("Timed out talking to '{device}'")]
    #[diagnostic(
        code(tiklink::timeout),
        help("Increase the timeout with --timeout or check the device's load.")
    )]
    Timeout { device: String },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Login to '{device}' was rejected: {message}")]
    #[diagnostic(
        code(tiklink::auth_failed),
        help(
            "Verify the username and password for this device.\n\
             Older firmware needs --login-method challenge."
        )
    )]
    AuthFailed { device: String, message: String },

    #[error("No credentials configured for device '{device}'")]
    #[diagnostic(
        code(tiklink::no_credentials),
        help(
            "Set `password` or `password_env` under [devices.{device}],\n\
             store one in the keyring (service `tiklink`, account `{device}/password`),\n\
             or pass --password."
        )
    )]
    NoCredentials { device: String },

    // ── Device responses ─────────────────────────────────────────────
    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(tiklink::not_found),
        help("Run: tiklink {list_command} to see what exists")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    #[error("Device refused: {message}")]
    #[diagnostic(code(tiklink::conflict))]
    Conflict { message: String },

    #[error("Device refused: {message}")]
    #[diagnostic(code(tiklink::rejected))]
    Rejected { message: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(tiklink::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Device '{name}' not found in configuration")]
    #[diagnostic(
        code(tiklink::device_not_found),
        help("Available devices: {available}")
    )]
    DeviceNotFound { name: String, available: String },

    #[error("No device selected")]
    #[diagnostic(
        code(tiklink::no_device),
        help(
            "Pass --device <name>, set default_device in {path},\n\
             or use --host for a one-off connection."
        )
    )]
    NoDevice { path: String },

    #[error("Device '{name}' is marked inactive")]
    #[diagnostic(code(tiklink::inactive), help("Set `active = true` under [devices.{name}]."))]
    Inactive { name: String },

    #[error(transparent)]
    #[diagnostic(code(tiklink::config))]
    Config(Box<figment::Error>),

    #[error("Could not write configuration: {0}")]
    #[diagnostic(code(tiklink::config_write))]
    ConfigWrite(String),

    // ── Interactive ──────────────────────────────────────────────────
    #[error("Destructive operation '{action}' requires confirmation")]
    #[diagnostic(
        code(tiklink::confirmation_required),
        help("Use --yes (-y) to skip confirmation in non-interactive contexts.")
    )]
    NonInteractiveRequiresYes { action: String },

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Could not render JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Could not render YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl From<figment::Error> for CliError {
    fn from(err: figment::Error) -> Self {
        Self::Config(Box::new(err))
    }
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Unreachable { .. } => exit_code::CONNECTION,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::NotFound { .. } | Self::DeviceNotFound { .. } => exit_code::NOT_FOUND,
            Self::Conflict { .. } => exit_code::CONFLICT,
            Self::Validation { .. }
            | Self::NoDevice { .. }
            | Self::NonInteractiveRequiresYes { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }

    /// Translate a core error for operations against `device`.
    pub fn from_core(err: CoreError, device: &str) -> Self {
        let device = device.to_owned();
        match err {
            CoreError::Command { message, .. } if message.contains(TRAP_EXISTS) => {
                Self::Conflict { message }
            }
            CoreError::Command { message, .. } if message.contains(TRAP_NO_SUCH_ITEM) => {
                Self::NotFound {
                    resource_type: "item".into(),
                    identifier: message,
                    list_command: "accounts list".into(),
                }
            }
            CoreError::Command { message, .. } => Self::Rejected { message },

            CoreError::HandshakeFailure { message } => Self::AuthFailed { device, message },

            CoreError::NotFound { entity, identifier } => Self::NotFound {
                list_command: format!("{entity}s list"),
                resource_type: entity.into(),
                identifier,
            },

            CoreError::Validation { message } => Self::Validation {
                field: "input".into(),
                reason: message,
            },

            CoreError::UnknownDevice { device: name } => Self::DeviceNotFound {
                name: name.to_string(),
                available: String::new(),
            },

            CoreError::Config { message } => Self::Validation {
                field: "device".into(),
                reason: message,
            },

            err @ CoreError::AllPathsFailed { .. } => match err.root() {
                // Login refusals on every path are credential problems.
                CoreError::HandshakeFailure { message } => Self::AuthFailed {
                    device,
                    message: message.clone(),
                },
                root => Self::unreachable(device, root),
            },

            err @ (CoreError::ConnectionFailure { .. } | CoreError::Framing { .. }) => {
                Self::unreachable(device, &err)
            }
        }
    }

    fn unreachable(device: String, cause: &CoreError) -> Self {
        let reason = cause.to_string();
        if reason.contains("timed out") {
            Self::Timeout { device }
        } else {
            Self::Unreachable { device, reason }
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            ConfigError::UnknownDevice { name } => Self::DeviceNotFound {
                name,
                available: String::new(),
            },
            ConfigError::NoDeviceSelected => Self::NoDevice {
                path: tiklink_config::config_path().display().to_string(),
            },
            ConfigError::Inactive { name } => Self::Inactive { name },
            ConfigError::NoCredentials { name } => Self::NoCredentials { device: name },
            ConfigError::Figment(err) => Self::Config(err),
            ConfigError::Serialization(err) => Self::ConfigWrite(err.to_string()),
            ConfigError::Io(err) => Self::Io(err),
        }
    }
}
