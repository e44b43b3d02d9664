//! Command-line interface definitions using clap.

use crate::output::OutputFormat;
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use forkpool::paths;
use forkpool::pool::{PoolConfig, Transport};
use std::path::PathBuf;
use std::time::Duration;

/// Run units of work in forked worker processes and collect their output.
#[derive(Parser, Debug)]
#[command(name = "forkpool")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output (-v for info, -vv for debug).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress the run summary and all logs except errors.
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    pub quiet: bool,

    /// Disable colored output.
    #[arg(
        long,
        env = "NO_COLOR",
        global = true,
        value_parser = clap::builder::FalseyValueParser::new()
    )]
    pub no_color: bool,

    /// Also write logs to this file.
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run each shell command in its own worker; its stdout is the payload.
    Exec(ExecArgs),

    /// Fetch each URL in its own worker; the response body is the payload.
    Fetch(FetchArgs),

    /// Generate shell completions.
    Completions(CompletionsArgs),
}

/// Arguments for shell completions.
#[derive(Parser, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate completions for.
    #[arg(value_enum)]
    pub shell: Shell,
}

impl CompletionsArgs {
    /// Generate and print completions to stdout.
    pub fn generate(&self) {
        clap_complete::generate(
            self.shell,
            &mut Cli::command(),
            "forkpool",
            &mut std::io::stdout(),
        );
    }
}

/// Pool tuning shared by every running subcommand.
#[derive(Args, Debug, Clone)]
pub struct PoolArgs {
    /// Maximum number of workers alive at once (0 = unlimited).
    #[arg(
        short = 'j',
        long,
        env = "FORKPOOL_MAX_CHILDREN",
        default_value_t = 0,
        allow_negative_numbers = true
    )]
    pub max_children: i64,

    /// Seconds a worker may run before it is evicted (0 = no limit).
    #[arg(
        short = 't',
        long,
        env = "FORKPOOL_MAX_WAIT_TIME",
        default_value_t = 0,
        allow_negative_numbers = true
    )]
    pub max_wait_time: i64,

    /// How payloads travel from worker to coordinator.
    #[arg(long, value_enum, env = "FORKPOOL_TRANSPORT", default_value_t = TransportArg::Pair)]
    pub transport: TransportArg,

    /// Directory for rendezvous sockets [default: runtime dir, else temp dir].
    #[arg(long, env = "FORKPOOL_SOCKET_DIR")]
    pub socket_dir: Option<PathBuf>,

    /// Seconds a worker keeps retrying to reach its rendezvous socket.
    #[arg(long, env = "FORKPOOL_CONNECT_TIMEOUT", default_value_t = 5)]
    pub connect_timeout: u64,

    /// Milliseconds to sleep between scheduler ticks while waiting.
    #[arg(long, env = "FORKPOOL_POLL_INTERVAL_MS", default_value_t = 200)]
    pub poll_interval_ms: u64,

    /// Output format.
    #[arg(short, long, value_enum, default_value_t = OutputFormatArg::Plain)]
    pub format: OutputFormatArg,
}

impl PoolArgs {
    /// Build a validated pool configuration.
    pub fn to_config(&self) -> forkpool::Result<PoolConfig> {
        let transport = match self.transport {
            TransportArg::Pair => Transport::Pair,
            TransportArg::Rendezvous => Transport::Rendezvous {
                dir: self.socket_dir(),
                connect_timeout: Duration::from_secs(self.connect_timeout),
            },
        };

        PoolConfig::new()
            .with_admission_limit(self.max_children)?
            .with_time_budget(self.max_wait_time)?
            .with_poll_interval(Duration::from_millis(self.poll_interval_ms))
            .map(|config| config.with_transport(transport))
    }

    /// The rendezvous socket directory, with `~` expanded.
    pub fn socket_dir(&self) -> PathBuf {
        self.socket_dir
            .as_ref()
            .map(paths::expand_tilde)
            .unwrap_or_else(paths::default_socket_dir)
    }
}

/// Arguments for the exec command.
#[derive(Parser, Debug)]
pub struct ExecArgs {
    #[command(flatten)]
    pub pool: PoolArgs,

    /// Shell commands, one unit each (run with `sh -c`).
    #[arg(required = true)]
    pub commands: Vec<String>,
}

/// Arguments for the fetch command.
#[derive(Parser, Debug)]
pub struct FetchArgs {
    #[command(flatten)]
    pub pool: PoolArgs,

    /// Per-request timeout in seconds.
    #[arg(long, default_value_t = 30)]
    pub timeout: u64,

    /// URLs, one unit each.
    #[arg(required = true)]
    pub urls: Vec<String>,
}

/// Transport argument.
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TransportArg {
    /// Anonymous socket pair.
    #[default]
    Pair,
    /// Named Unix socket per worker.
    Rendezvous,
}

/// Output format argument.
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormatArg {
    /// Raw payloads, one per line.
    #[default]
    Plain,
    /// JSON with payloads and run report.
    Json,
    /// Payload byte lengths, one per line.
    Lengths,
}

impl From<OutputFormatArg> for OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Plain => OutputFormat::Plain,
            OutputFormatArg::Json => OutputFormat::Json,
            OutputFormatArg::Lengths => OutputFormat::Lengths,
        }
    }
}
