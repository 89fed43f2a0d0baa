//! Hotspot user profile handlers.

use tabled::Tabled;
use tiklink_core::{EnsureOutcome, EnsureProfileRequest, HotspotProfile};

use crate::cli::{ProfilesArgs, ProfilesCommand};
use crate::error::CliError;
use crate::output;

use super::util::Ctx;

#[derive(Tabled)]
struct ProfileRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Shared Users")]
    shared_users: String,
    #[tabled(rename = "Rate Limit")]
    rate_limit: String,
}

impl From<&HotspotProfile> for ProfileRow {
    fn from(p: &HotspotProfile) -> Self {
        Self {
            id: output::or_dash(p.id.as_deref()),
            name: p.name.clone(),
            shared_users: p
                .shared_users
                .map_or_else(|| "-".into(), |n| n.to_string()),
            rate_limit: output::or_dash(p.rate_limit.as_deref()),
        }
    }
}

pub async fn handle(ctx: &Ctx<'_>, args: ProfilesArgs) -> Result<(), CliError> {
    let fmt = &ctx.global.output;

    match args.command {
        ProfilesCommand::List => {
            let profiles = ctx
                .controller
                .list_profiles(ctx.device)
                .await
                .map_err(|e| ctx.fail(e))?;
            let out = output::render_list(
                fmt,
                &profiles,
                |p| ProfileRow::from(p),
                |p| p.name.clone(),
            )?;
            ctx.print(&out);
            Ok(())
        }

        ProfilesCommand::Ensure { name, shared_users } => {
            let request = EnsureProfileRequest::new(name, shared_users);
            let outcome = ctx
                .controller
                .ensure_profile(ctx.device, &request)
                .await
                .map_err(|e| ctx.fail(e))?;
            match outcome {
                EnsureOutcome::Created => ctx.notice(&format!("Profile '{}' created", request.name)),
                EnsureOutcome::Existed => {
                    ctx.notice(&format!("Profile '{}' already exists", request.name));
                }
            }

            let report = serde_json::json!({ "name": request.name, "outcome": outcome });
            let out = output::render_single(
                fmt,
                &report,
                |_| outcome.to_string(),
                |_| outcome.to_string(),
            )?;
            ctx.print(&out);
            Ok(())
        }
    }
}
