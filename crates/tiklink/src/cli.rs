//! Argument model for `tiklink`: global connection flags plus one
//! subcommand enum per command group.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// tiklink -- manage hotspot routers over the API protocol
#[derive(Debug, Parser)]
#[command(
    name = "tiklink",
    version,
    about = "Manage hotspot routers from the command line",
    long_about = "Talks to routers over the binary API protocol (port 8728).\n\n\
        Devices come from the inventory file (see `tiklink config path`) or\n\
        from --host for one-off use. Each device may list several addresses;\n\
        they are tried mesh overlay first, then VPN, then direct.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Config file (defaults to the platform config directory)
    #[arg(long, env = "TIKLINK_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Inventory device to use
    #[arg(long, short = 'd', env = "TIKLINK_DEVICE", global = true)]
    pub device: Option<String>,

    /// Connect directly to this address instead of an inventory device
    #[arg(long, short = 'H', env = "TIKLINK_HOST", global = true)]
    pub host: Option<String>,

    /// API port (overrides inventory)
    #[arg(long, env = "TIKLINK_PORT", global = true)]
    pub port: Option<u16>,

    /// Login user (overrides inventory)
    #[arg(long, short = 'u', env = "TIKLINK_USERNAME", global = true)]
    pub username: Option<String>,

    /// Login password (overrides inventory and keyring)
    #[arg(long, env = "TIKLINK_PASSWORD", global = true, hide_env_values = true)]
    pub password: Option<String>,

    /// Login method (overrides inventory)
    #[arg(long, value_enum, global = true)]
    pub login_method: Option<LoginMethodArg>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "TIKLINK_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// Log more (-v info, -vv debug, -vvv trace)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only print errors
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Assume yes for destructive commands
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,

    /// Connect, login and command timeout in seconds
    #[arg(long, env = "TIKLINK_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Shared Enums ─────────────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// Pretty-printed JSON
    Json,
    /// JSON on one line
    JsonCompact,
    /// YAML
    Yaml,
    /// One name or id per line
    Plain,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LoginMethodArg {
    /// Send the password as-is (current firmware)
    Plaintext,
    /// Answer the greeting challenge with an MD5 digest (legacy firmware)
    Challenge,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Manage hotspot user accounts
    #[command(alias = "acc", alias = "a")]
    Accounts(AccountsArgs),

    /// View logged-in hotspot sessions
    Active(ActiveArgs),

    /// Manage hotspot user profiles
    Profiles(ProfilesArgs),

    /// Device identity, hardware and load
    #[command(alias = "sys")]
    System(SystemArgs),

    /// Provision prepaid vouchers
    Vouchers(VouchersArgs),

    /// Inspect reachability paths
    Paths(PathsArgs),

    /// Inspect CLI configuration
    Config(ConfigArgs),

    /// Print a shell completion script
    Completions(CompletionsArgs),
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  ACCOUNTS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct AccountsArgs {
    #[command(subcommand)]
    pub command: AccountsCommand,
}

#[derive(Debug, Subcommand)]
pub enum AccountsCommand {
    /// List hotspot accounts
    #[command(alias = "ls")]
    List,

    /// Show one account
    Get {
        /// Account name
        name: String,
    },

    /// Create an account
    Add {
        /// Account name
        name: String,

        /// Password (defaults to the name)
        #[arg(long)]
        password: Option<String>,

        /// Hotspot profile
        #[arg(long, default_value = "default")]
        profile: String,

        /// Uptime limit, e.g. `1h` or `1d 12h`
        #[arg(long)]
        limit_uptime: Option<String>,

        /// Total transfer limit in bytes
        #[arg(long)]
        limit_bytes: Option<u64>,

        #[arg(long)]
        comment: Option<String>,
    },

    /// Remove an account by name or `*id`
    #[command(alias = "rm")]
    Remove {
        /// Account name, or item id starting with `*`
        account: String,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  ACTIVE SESSIONS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ActiveArgs {
    #[command(subcommand)]
    pub command: ActiveCommand,
}

#[derive(Debug, Subcommand)]
pub enum ActiveCommand {
    /// List logged-in hotspot sessions
    #[command(alias = "ls")]
    List,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  PROFILES
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ProfilesArgs {
    #[command(subcommand)]
    pub command: ProfilesCommand,
}

#[derive(Debug, Subcommand)]
pub enum ProfilesCommand {
    /// List hotspot user profiles
    #[command(alias = "ls")]
    List,

    /// Create a profile unless it already exists
    Ensure {
        /// Profile name
        name: String,

        /// Concurrent logins allowed per account
        #[arg(long, default_value = "1")]
        shared_users: u32,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  SYSTEM
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct SystemArgs {
    #[command(subcommand)]
    pub command: SystemCommand,
}

#[derive(Debug, Subcommand)]
pub enum SystemCommand {
    /// Device identity name
    Identity,
    /// Routerboard model, serial and firmware
    Board,
    /// Raw resource counters
    Resources,
    /// CPU, memory and active-user summary
    Stats,
    /// Identity, hardware and load in one view
    Info,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  VOUCHERS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct VouchersArgs {
    #[command(subcommand)]
    pub command: VouchersCommand,
}

#[derive(Debug, Subcommand)]
pub enum VouchersCommand {
    /// Create a voucher account (name and password are the code)
    Provision {
        /// Voucher code
        code: String,

        /// Uptime allowance in hours
        #[arg(long)]
        hours: u32,

        /// Data allowance in megabytes
        #[arg(long)]
        data_mb: u64,

        /// Hotspot profile, created if missing
        #[arg(long, default_value = "default")]
        profile: String,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  PATHS / CONFIG / COMPLETIONS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct PathsArgs {
    #[command(subcommand)]
    pub command: PathsCommand,
}

#[derive(Debug, Subcommand)]
pub enum PathsCommand {
    /// Try every configured path once and report latency
    Probe,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the config file location
    Path,
    /// Show the effective configuration (passwords redacted)
    Show,
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Target shell
    pub shell: clap_complete::Shell,
}
