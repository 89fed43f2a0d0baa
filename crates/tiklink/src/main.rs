mod cli;
mod commands;
mod config;
mod error;
mod output;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use tiklink_core::Controller;

use crate::cli::{Cli, Command};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(cli.global.verbose);

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    // stdout carries command output; diagnostics go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let Cli { global, command } = cli;

    match command {
        // Config commands never touch a device
        Command::Config(args) => commands::config_cmd::handle(args, &global),

        Command::Completions(args) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "tiklink", &mut std::io::stdout());
            Ok(())
        }

        cmd => {
            let cfg = config::load(&global)?;
            let device = config::resolve_device(&global, &cfg)?;
            let controller = Controller::new(config::controller_config(&global, &cfg));

            let id = device.id.clone();
            controller.register(device).await;

            tracing::debug!(command = ?cmd, device = %id, "dispatching command");
            let result = commands::dispatch(cmd, &controller, &id, &global).await;
            controller.close_all().await;
            result
        }
    }
}
