//! Active hotspot session handlers.

use tabled::Tabled;
use tiklink_core::ActiveSession;

use crate::cli::{ActiveArgs, ActiveCommand};
use crate::error::CliError;
use crate::output;

use super::util::Ctx;

#[derive(Tabled)]
struct ActiveRow {
    #[tabled(rename = "User")]
    user: String,
    #[tabled(rename = "Address")]
    address: String,
    #[tabled(rename = "MAC")]
    mac: String,
    #[tabled(rename = "Uptime")]
    uptime: String,
    #[tabled(rename = "In")]
    bytes_in: String,
    #[tabled(rename = "Out")]
    bytes_out: String,
}

impl From<&ActiveSession> for ActiveRow {
    fn from(s: &ActiveSession) -> Self {
        Self {
            user: s.user.clone(),
            address: s.address.map(|ip| ip.to_string()).unwrap_or_default(),
            mac: s.mac_address.clone().unwrap_or_default(),
            uptime: output::or_dash(s.uptime.as_deref()),
            bytes_in: output::bytes(s.bytes_in),
            bytes_out: output::bytes(s.bytes_out),
        }
    }
}

pub async fn handle(ctx: &Ctx<'_>, args: ActiveArgs) -> Result<(), CliError> {
    match args.command {
        ActiveCommand::List => {
            let sessions = ctx
                .controller
                .list_active_sessions(ctx.device)
                .await
                .map_err(|e| ctx.fail(e))?;
            let out = output::render_list(
                &ctx.global.output,
                &sessions,
                |s| ActiveRow::from(s),
                |s| s.user.clone(),
            )?;
            ctx.print(&out);
            Ok(())
        }
    }
}
