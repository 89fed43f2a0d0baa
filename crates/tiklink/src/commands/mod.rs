//! Command dispatch: bridges CLI args -> controller operations -> output.

pub mod accounts;
pub mod active;
pub mod config_cmd;
pub mod paths;
pub mod profiles;
pub mod system;
pub mod util;
pub mod vouchers;

use tiklink_core::{Controller, DeviceId};

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a device-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    controller: &Controller,
    device: &DeviceId,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let ctx = util::Ctx {
        controller,
        device,
        global,
    };
    match cmd {
        Command::Accounts(args) => accounts::handle(&ctx, args).await,
        Command::Active(args) => active::handle(&ctx, args).await,
        Command::Profiles(args) => profiles::handle(&ctx, args).await,
        Command::System(args) => system::handle(&ctx, args).await,
        Command::Vouchers(args) => vouchers::handle(&ctx, args).await,
        Command::Paths(args) => paths::handle(&ctx, args).await,
        Command::Config(_) | Command::Completions(_) => Err(CliError::Validation {
            field: "command".into(),
            reason: "handled without a device connection".into(),
        }),
    }
}
