//! Config subcommand handlers.

use tiklink_config::Config;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts, OutputFormat};
use crate::config;
use crate::error::CliError;
use crate::output;

const REDACTED: &str = "********";

/// Copy of `cfg` with plaintext passwords masked.
fn redacted(cfg: &Config) -> Config {
    let mut cfg = cfg.clone();
    for profile in cfg.devices.values_mut() {
        if profile.password.is_some() {
            profile.password = Some(REDACTED.into());
        }
    }
    cfg
}

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Path => {
            output::print_output(&config::effective_path(global).display().to_string(), global.quiet);
            Ok(())
        }

        ConfigCommand::Show => {
            let cfg = redacted(&config::load(global)?);
            let out = match global.output {
                OutputFormat::Table | OutputFormat::Plain => toml::to_string_pretty(&cfg)
                    .map_err(|e| CliError::ConfigWrite(e.to_string()))?,
                ref fmt => output::render_single(fmt, &cfg, |_| String::new(), |_| String::new())?,
            };
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}
