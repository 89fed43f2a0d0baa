//! Reachability path handlers.

use tabled::Tabled;
use tiklink_core::PathProbe;

use crate::cli::{PathsArgs, PathsCommand};
use crate::error::CliError;
use crate::output;

use super::util::Ctx;

#[derive(Tabled)]
struct ProbeRow {
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Host")]
    host: String,
    #[tabled(rename = "Latency")]
    latency: String,
    #[tabled(rename = "Result")]
    result: String,
}

impl From<&PathProbe> for ProbeRow {
    fn from(p: &PathProbe) -> Self {
        Self {
            kind: p.path.kind.to_string(),
            host: p.path.host.clone(),
            latency: p
                .latency_ms
                .map_or_else(|| "-".into(), |ms| format!("{ms} ms")),
            result: p.error.clone().unwrap_or_else(|| "ok".into()),
        }
    }
}

pub async fn handle(ctx: &Ctx<'_>, args: PathsArgs) -> Result<(), CliError> {
    match args.command {
        PathsCommand::Probe => {
            let probes = ctx
                .controller
                .probe_paths(ctx.device)
                .await
                .map_err(|e| ctx.fail(e))?;
            let reachable = probes.iter().filter(|p| p.is_reachable()).count();

            let out = output::render_list(
                &ctx.global.output,
                &probes,
                |p| ProbeRow::from(p),
                |p| p.path.to_string(),
            )?;
            ctx.print(&out);
            ctx.notice(&format!("{reachable}/{} paths reachable", probes.len()));
            Ok(())
        }
    }
}
