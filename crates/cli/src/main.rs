// gamba CLI - per-date shrimp count estimation and auction reconciliation

mod exit_codes;
mod pipeline;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Args, Parser, Subcommand};

use exit_codes::EXIT_SUCCESS;
use pipeline::DateArgs;

#[derive(Parser)]
#[command(name = "gamba")]
#[command(about = "Shrimp biomass estimation and auction ledger reconciliation")]
#[command(version)]
#[command(long_version = long_version())]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
pub struct GlobalArgs {
    /// Pipeline config file [default: <config dir>/gamba/pipeline.toml]
    #[arg(long, global = true, env = "GAMBA_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override base_dir from the config
    #[arg(long, global = true)]
    pub base_dir: Option<PathBuf>,

    /// Override the campaign year from the config
    #[arg(long, global = true)]
    pub year: Option<i32>,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Less log output (-q warnings only, -qq errors only)
    #[arg(short, long, global = true, action = ArgAction::Count, conflicts_with = "verbose")]
    pub quiet: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute polygon areas from label files, one report per date
    #[command(after_help = "\
Examples:
  gamba areas
  gamba areas --today
  gamba areas --from 2025-05-01 --to 2025-05-31")]
    Areas {
        #[command(flatten)]
        dates: DateArgs,
    },

    /// Aggregate area reports into per-image weights and processed tables
    #[command(after_help = "\
Examples:
  gamba weights
  gamba weights --from 30-05-2025 --to 30-05-2025")]
    Weights {
        #[command(flatten)]
        dates: DateArgs,
    },

    /// Reconcile processed tables against the auction ledger
    #[command(after_help = "\
Examples:
  gamba merge
  gamba merge --json
  gamba merge --year 2025 --strict")]
    Merge {
        #[command(flatten)]
        dates: DateArgs,

        /// Print per-date summaries as JSON on stdout
        #[arg(long)]
        json: bool,

        /// Exit 63 when any date has unmatched images
        #[arg(long)]
        strict: bool,
    },

    /// Run areas, weights and merge in order
    #[command(after_help = "\
Examples:
  gamba run --today
  gamba run --base-dir /data/remar --year 2025 --json")]
    Run {
        #[command(flatten)]
        dates: DateArgs,

        /// Print the full run report as JSON on stdout
        #[arg(long)]
        json: bool,

        /// Exit 63 when any date has unmatched images
        #[arg(long)]
        strict: bool,
    },

    /// Load and validate the config, then print the resolved paths
    #[command(after_help = "\
Examples:
  gamba validate
  gamba validate --config ./pipeline.toml")]
    Validate,
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn new(code: u8, msg: impl Into<String>) -> Self {
        Self { code, message: msg.into(), hint: None }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        " (", env!("GIT_COMMIT_HASH"), ")",
        "\nengine:  gamba-recon ", env!("CARGO_PKG_VERSION"),
        "\ntarget:  ", env!("TARGET"),
    )
}

fn init_logging(verbose: u8, quiet: u8) {
    let level = match (verbose, quiet) {
        (0, 0) => "info",
        (1, _) => "debug",
        (v, _) if v > 1 => "trace",
        (_, 1) => "warn",
        _ => "error",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.global.verbose, cli.global.quiet);

    let result = match cli.command {
        Commands::Areas { dates } => pipeline::cmd_areas(&cli.global, dates),
        Commands::Weights { dates } => pipeline::cmd_weights(&cli.global, dates),
        Commands::Merge { dates, json, strict } => pipeline::cmd_merge(&cli.global, dates, json, strict),
        Commands::Run { dates, json, strict } => pipeline::cmd_run(&cli.global, dates, json, strict),
        Commands::Validate => pipeline::cmd_validate(&cli.global),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}
