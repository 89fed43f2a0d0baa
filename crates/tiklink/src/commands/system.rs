//! System information handlers.

use tiklink_core::{BoardInfo, DeviceInfo, Identity, RouterStats, SystemResources};

use crate::cli::{SystemArgs, SystemCommand};
use crate::error::CliError;
use crate::output::{self, detail_lines, or_dash};

use super::util::Ctx;

fn identity_detail(i: &Identity) -> String {
    detail_lines(&[("Identity", i.name.clone())])
}

fn board_detail(b: &BoardInfo) -> String {
    detail_lines(&[
        ("Routerboard", b.routerboard.to_string()),
        ("Model", or_dash(b.model.as_deref())),
        ("Serial", or_dash(b.serial_number.as_deref())),
        ("Firmware", or_dash(b.firmware.as_deref())),
        ("Upgrade", or_dash(b.upgrade_firmware.as_deref())),
    ])
}

fn resources_detail(r: &SystemResources) -> String {
    detail_lines(&[
        ("Uptime", or_dash(r.uptime.as_deref())),
        ("Version", or_dash(r.version.as_deref())),
        ("Board", or_dash(r.board_name.as_deref())),
        (
            "CPU",
            r.cpu_load.map_or_else(|| "-".into(), |c| format!("{c:.0}%")),
        ),
        (
            "Free memory",
            r.free_memory.map_or_else(|| "-".into(), output::bytes),
        ),
        (
            "Total memory",
            r.total_memory.map_or_else(|| "-".into(), output::bytes),
        ),
    ])
}

fn stats_detail(s: &RouterStats) -> String {
    detail_lines(&[
        ("Board", s.board_name.clone()),
        ("Version", s.version.clone()),
        ("Uptime", s.uptime.clone()),
        ("CPU", format!("{:.0}%", s.cpu_load)),
        (
            "Memory",
            format!(
                "{} / {} ({:.1}%)",
                output::bytes(s.memory.used),
                output::bytes(s.memory.total),
                s.memory.usage_percent
            ),
        ),
        ("Active users", s.active_users.to_string()),
    ])
}

fn info_detail(i: &DeviceInfo) -> String {
    detail_lines(&[
        ("Identity", i.identity.clone()),
        ("Model", i.model.clone()),
        ("Serial", i.serial_number.clone()),
        ("Firmware", i.firmware.clone()),
        ("CPU", format!("{:.0}%", i.cpu_load)),
        ("Free memory", output::bytes(i.free_memory)),
        ("Uptime", i.uptime.clone()),
    ])
}

pub async fn handle(ctx: &Ctx<'_>, args: SystemArgs) -> Result<(), CliError> {
    let fmt = &ctx.global.output;
    let controller = ctx.controller;
    let device = ctx.device;

    let out = match args.command {
        SystemCommand::Identity => {
            let identity = controller.get_identity(device).await.map_err(|e| ctx.fail(e))?;
            output::render_single(fmt, &identity, identity_detail, |i| i.name.clone())?
        }
        SystemCommand::Board => {
            let board = controller
                .get_board_info(device)
                .await
                .map_err(|e| ctx.fail(e))?;
            output::render_single(fmt, &board, board_detail, |b| or_dash(b.model.as_deref()))?
        }
        SystemCommand::Resources => {
            let resources = controller
                .get_system_resources(device)
                .await
                .map_err(|e| ctx.fail(e))?;
            output::render_single(fmt, &resources, resources_detail, |r| {
                or_dash(r.uptime.as_deref())
            })?
        }
        SystemCommand::Stats => {
            let stats = controller.get_stats(device).await.map_err(|e| ctx.fail(e))?;
            output::render_single(fmt, &stats, stats_detail, |s| s.active_users.to_string())?
        }
        SystemCommand::Info => {
            let info = controller.get_info(device).await.map_err(|e| ctx.fail(e))?;
            output::render_single(fmt, &info, info_detail, |i| i.identity.clone())?
        }
    };

    ctx.print(&out);
    Ok(())
}
