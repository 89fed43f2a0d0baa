//! Shared helpers for command handlers.

use std::io::IsTerminal;

use tiklink_core::{Controller, CoreError, DeviceId};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

/// Everything a device-bound handler needs.
pub struct Ctx<'a> {
    pub controller: &'a Controller,
    pub device: &'a DeviceId,
    pub global: &'a GlobalOpts,
}

impl Ctx<'_> {
    /// Map a core failure against this device into a CLI error.
    pub fn fail(&self, err: CoreError) -> CliError {
        CliError::from_core(err, self.device.as_str())
    }

    pub fn print(&self, rendered: &str) {
        output::print_output(rendered, self.global.quiet);
    }

    pub fn notice(&self, message: &str) {
        output::notice(message, self.global.quiet);
    }
}

/// Prompt for confirmation, auto-approving if `--yes` was passed.
///
/// Without a terminal there is nobody to ask, so `--yes` is required.
pub fn confirm(message: &str, action: &str, yes_flag: bool) -> Result<bool, CliError> {
    if yes_flag {
        return Ok(true);
    }
    if !std::io::stdin().is_terminal() {
        return Err(CliError::NonInteractiveRequiresYes {
            action: action.into(),
        });
    }
    let confirmed = dialoguer::Confirm::new()
        .with_prompt(message)
        .default(false)
        .interact()
        .map_err(|e| CliError::Io(std::io::Error::other(e)))?;
    Ok(confirmed)
}
