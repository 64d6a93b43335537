//! Clap derive structures for the `clawlink` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use clawlink_core::EntityState;

// ── Top-Level CLI ────────────────────────────────────────────────────

/// clawlink -- headless client for the Claw relay
#[derive(Debug, Parser)]
#[command(
    name = "clawlink",
    version,
    about = "Stay connected to a Claw relay from the command line",
    long_about = "Keeps a registered connection to a Claw relay, mirrors the\n\
        tracked entities, rules and mute state it pushes, and carries out\n\
        the commands it sends (alerts ring the terminal bell).",
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
    /// Config file to use instead of the platform default
    #[arg(long, env = "CLAWLINK_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Relay URL (overrides the config file)
    #[arg(long, short = 'r', global = true)]
    pub relay_url: Option<String>,

    /// Seconds to wait for registration and the first snapshot
    #[arg(long, default_value = "10", global = true)]
    pub timeout: u64,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Also append logs to this file
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Stay connected until interrupted, printing state and commands
    Run(RunArgs),

    /// Print the current entities, rules and mute state
    #[command(alias = "st")]
    State,

    /// Set an entity inside or outside
    Set(SetArgs),

    /// Mute or unmute rule notifications
    Mute(MuteArgs),

    /// Manage notification rules
    Rules(RulesArgs),

    /// Report or save a location
    #[command(alias = "loc")]
    Location(LocationArgs),

    /// Ask the relay to send a test command back
    TestPing,

    /// Inspect and edit the config file
    Config(ConfigArgs),
}

// ── run ──────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Don't ring the terminal bell on alerts
    #[arg(long)]
    pub no_bell: bool,

    /// Recent log lines printed when the relay looks unreachable
    #[arg(long, default_value = "20")]
    pub log_tail: usize,
}

// ── set ──────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct SetArgs {
    /// Entity name, as shown by `clawlink state`
    pub name: String,

    /// New state
    pub state: StateArg,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum StateArg {
    Inside,
    Outside,
}

impl From<StateArg> for EntityState {
    fn from(arg: StateArg) -> Self {
        match arg {
            StateArg::Inside => Self::Inside,
            StateArg::Outside => Self::Outside,
        }
    }
}

// ── mute ─────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
#[group(required = true, multiple = false)]
pub struct MuteArgs {
    /// Mute for this many minutes
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub minutes: Option<u32>,

    /// Mute until this time today (HH:MM, local); tomorrow if already past
    #[arg(long)]
    pub until: Option<String>,

    /// Lift the mute
    #[arg(long)]
    pub off: bool,
}

// ── rules ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct RulesArgs {
    #[command(subcommand)]
    pub command: RulesCommand,
}

#[derive(Debug, Subcommand)]
pub enum RulesCommand {
    /// List the rules the relay evaluates
    #[command(alias = "ls")]
    List,

    /// Add a repeating or a daily rule
    Add(RuleAddArgs),

    /// Remove a rule by id
    #[command(alias = "rm")]
    Remove {
        /// Rule id, as shown by `clawlink rules list`
        id: String,
    },
}

#[derive(Debug, Args)]
pub struct RuleAddArgs {
    /// First reminder this many minutes after something goes outside
    #[arg(long, conflicts_with = "at")]
    pub after: Option<u32>,

    /// Upper bound for the doubling reminder interval, in minutes
    #[arg(long, requires = "after")]
    pub max: Option<u32>,

    /// Daily reminder at this wall-clock time (HH:MM)
    #[arg(long)]
    pub at: Option<String>,

    /// Message template; `{cats}` is expanded by the relay
    #[arg(long)]
    pub message: Option<String>,
}

// ── location ─────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct LocationArgs {
    #[command(subcommand)]
    pub command: LocationCommand,
}

#[derive(Debug, Subcommand)]
pub enum LocationCommand {
    /// Send one position fix
    Report(FixArgs),

    /// Save a position under a name
    Save {
        /// Name for the place
        name: String,

        #[command(flatten)]
        fix: FixArgs,
    },

    /// Turn server-side location tracking on or off
    Tracking {
        #[arg(action = clap::ArgAction::Set)]
        enabled: bool,
    },
}

#[derive(Debug, Args)]
pub struct FixArgs {
    #[arg(long, allow_negative_numbers = true)]
    pub lat: f64,

    #[arg(long, allow_negative_numbers = true)]
    pub lng: f64,

    /// Horizontal accuracy in meters
    #[arg(long)]
    pub accuracy: Option<f32>,
}

// ── config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the effective configuration (file + environment)
    Show,

    /// Print the config file path
    Path,

    /// Write a config file with defaults (and --relay-url, if given)
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Set one key, e.g. `reconnect.max_delay_secs 120`
    Set {
        key: String,
        /// New value; empty clears optional keys
        value: String,
    },
}
