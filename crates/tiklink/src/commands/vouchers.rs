//! Voucher provisioning.

use tiklink_core::{ProvisionedVoucher, VoucherPlan};

use crate::cli::{VouchersArgs, VouchersCommand};
use crate::error::CliError;
use crate::output;

use super::util::Ctx;

fn detail(v: &ProvisionedVoucher) -> String {
    output::detail_lines(&[
        ("Code", v.code.clone()),
        ("Account", v.account_id.clone()),
        ("Profile", v.profile.clone()),
        ("Time limit", v.limit_uptime.clone()),
        ("Data limit", output::bytes(v.limit_bytes_total)),
    ])
}

pub async fn handle(ctx: &Ctx<'_>, args: VouchersArgs) -> Result<(), CliError> {
    match args.command {
        VouchersCommand::Provision {
            code,
            hours,
            data_mb,
            profile,
        } => {
            if code.trim().is_empty() {
                return Err(CliError::Validation {
                    field: "code".into(),
                    reason: "voucher code must not be empty".into(),
                });
            }
            let plan = VoucherPlan {
                profile,
                ..VoucherPlan::new(hours, data_mb)
            };
            let voucher = ctx
                .controller
                .provision_voucher(ctx.device, &code, &plan)
                .await
                .map_err(|e| ctx.fail(e))?;
            ctx.notice(&format!("Voucher '{code}' provisioned"));

            let out =
                output::render_single(&ctx.global.output, &voucher, detail, |v| v.account_id.clone())?;
            ctx.print(&out);
            Ok(())
        }
    }
}
