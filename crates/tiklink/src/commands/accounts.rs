//! Hotspot account command handlers.

use tabled::Tabled;
use tiklink_core::{AddAccountRequest, HotspotAccount};

use crate::cli::{AccountsArgs, AccountsCommand};
use crate::error::CliError;
use crate::output;

use super::util::{self, Ctx};

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct AccountRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Profile")]
    profile: String,
    #[tabled(rename = "Uptime")]
    uptime: String,
    #[tabled(rename = "Time Limit")]
    limit_uptime: String,
    #[tabled(rename = "Data Limit")]
    limit_bytes: String,
    #[tabled(rename = "Used")]
    used: String,
}

impl From<&HotspotAccount> for AccountRow {
    fn from(a: &HotspotAccount) -> Self {
        Self {
            id: a.id.clone(),
            name: a.name.clone(),
            profile: output::or_dash(a.profile.as_deref()),
            uptime: output::or_dash(a.uptime.as_deref()),
            limit_uptime: output::or_dash(a.limit_uptime.as_deref()),
            limit_bytes: a.limit_bytes_total.map_or_else(|| "-".into(), output::bytes),
            used: output::bytes(a.bytes_total()),
        }
    }
}

fn detail(a: &HotspotAccount) -> String {
    output::detail_lines(&[
        ("ID", a.id.clone()),
        ("Name", a.name.clone()),
        ("Profile", output::or_dash(a.profile.as_deref())),
        ("Uptime", output::or_dash(a.uptime.as_deref())),
        ("Time limit", output::or_dash(a.limit_uptime.as_deref())),
        (
            "Data limit",
            a.limit_bytes_total.map_or_else(|| "-".into(), output::bytes),
        ),
        ("Bytes in", output::bytes(a.bytes_in)),
        ("Bytes out", output::bytes(a.bytes_out)),
        ("Disabled", a.disabled.to_string()),
        ("Comment", output::or_dash(a.comment.as_deref())),
    ])
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(ctx: &Ctx<'_>, args: AccountsArgs) -> Result<(), CliError> {
    let fmt = &ctx.global.output;

    match args.command {
        AccountsCommand::List => {
            let accounts = ctx
                .controller
                .list_accounts(ctx.device)
                .await
                .map_err(|e| ctx.fail(e))?;
            let out = output::render_list(
                fmt,
                &accounts,
                |a| AccountRow::from(a),
                |a| a.name.clone(),
            )?;
            ctx.print(&out);
            Ok(())
        }

        AccountsCommand::Get { name } => {
            let account = ctx
                .controller
                .find_account(ctx.device, &name)
                .await
                .map_err(|e| ctx.fail(e))?
                .ok_or_else(|| CliError::NotFound {
                    resource_type: "account".into(),
                    identifier: name.clone(),
                    list_command: "accounts list".into(),
                })?;
            let out = output::render_single(fmt, &account, detail, |a| a.id.clone())?;
            ctx.print(&out);
            Ok(())
        }

        AccountsCommand::Add {
            name,
            password,
            profile,
            limit_uptime,
            limit_bytes,
            comment,
        } => {
            let mut request = AddAccountRequest::new(name);
            if let Some(password) = password {
                request.password = password;
            }
            request.profile = profile;
            request.limit_uptime = limit_uptime;
            request.limit_bytes_total = limit_bytes;
            request.comment = comment;

            let id = ctx
                .controller
                .add_account(ctx.device, &request)
                .await
                .map_err(|e| ctx.fail(e))?;
            ctx.notice(&format!("Account '{}' created", request.name));

            let created = serde_json::json!({ "id": id, "name": request.name });
            let out = output::render_single(fmt, &created, |_| id.clone(), |_| id.clone())?;
            ctx.print(&out);
            Ok(())
        }

        AccountsCommand::Remove { account } => {
            if !util::confirm(
                &format!("Remove hotspot account '{account}'?"),
                "accounts remove",
                ctx.global.yes,
            )? {
                return Ok(());
            }

            // Device item ids always start with `*`.
            if account.starts_with('*') {
                ctx.controller
                    .remove_account(ctx.device, &account)
                    .await
                    .map_err(|e| ctx.fail(e))?;
            } else {
                ctx.controller
                    .remove_account_by_name(ctx.device, &account)
                    .await
                    .map_err(|e| ctx.fail(e))?;
            }
            ctx.notice(&format!("Account '{account}' removed"));
            Ok(())
        }
    }
}
