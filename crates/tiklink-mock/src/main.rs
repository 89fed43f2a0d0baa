use std::time::Duration;

use clap::Parser;
use miette::{IntoDiagnostic, WrapErr};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use tiklink_mock::{MockOptions, MockServer};

/// Standalone mock router speaking the API sentence protocol.
#[derive(Debug, Parser)]
#[command(name = "tiklink-mock", version, about)]
struct Args {
    /// Address to listen on
    #[arg(long, env = "TIKLINK_MOCK_LISTEN", default_value = "0.0.0.0:8728")]
    listen: String,

    /// Verify logins against --user entries instead of accepting anyone
    #[arg(long)]
    strict: bool,

    /// Known user as name:secret (repeatable, implies --strict)
    #[arg(long = "user", value_name = "NAME:SECRET", value_parser = parse_user)]
    users: Vec<(String, String)>,

    /// Split every reply into writes of at most N bytes
    #[arg(long, value_name = "BYTES")]
    write_chunk: Option<usize>,

    /// Delay each command reply by this many milliseconds
    #[arg(long, value_name = "MS")]
    reply_delay_ms: Option<u64>,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn parse_user(raw: &str) -> Result<(String, String), String> {
    match raw.split_once(':') {
        Some((name, secret)) if !name.is_empty() => Ok((name.to_owned(), secret.to_owned())),
        _ => Err(format!("expected NAME:SECRET, got {raw:?}")),
    }
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> miette::Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let mut options = MockOptions {
        strict_auth: args.strict,
        write_chunk: args.write_chunk,
        reply_delay: args.reply_delay_ms.map(Duration::from_millis),
        ..MockOptions::default()
    };
    for (name, secret) in args.users {
        options = options.with_user(name, secret);
    }
    if options.strict_auth && options.users.is_empty() {
        tracing::warn!("strict mode without --user: every login will be rejected");
    }

    let server = MockServer::bind(&args.listen, options)
        .await
        .into_diagnostic()
        .wrap_err_with(|| format!("cannot listen on {}", args.listen))?;

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutting down");
        }
        signal_cancel.cancel();
    });

    server.run(cancel).await.into_diagnostic()
}
