use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Exact conversion between DTMCs and stochastic regular expressions.
#[derive(Parser)]
#[command(
    name = "stochex",
    version,
    about = "Exact conversion between DTMCs and stochastic regular expressions"
)]
pub struct Cli {
    /// Increase verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Path to TOML configuration file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands.
#[derive(Subcommand)]
pub enum Command {
    /// Eliminate a DTMC into an SRE.
    ToSre(ToSreArgs),
    /// Construct a DTMC from an SRE.
    ToDtmc(ToDtmcArgs),
    /// Print the pre-order index listing of an SRE.
    Indices(IndicesArgs),
    /// Apply SRE deltas and report the resulting DTMC deltas.
    Delta(DeltaArgs),
    /// Refine one DTMC edge by a sub-DTMC and report the SRE delta.
    Refine(RefineArgs),
    /// Draw random strings from a DTMC.
    Sample(SampleArgs),
}

/// Arguments for the `to-sre` subcommand.
#[derive(clap::Args)]
pub struct ToSreArgs {
    /// Path to the DTMC text file.
    pub dtmc: PathBuf,
}

/// Output format of `to-dtmc`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Arguments for the `to-dtmc` subcommand.
#[derive(clap::Args)]
pub struct ToDtmcArgs {
    /// Path to the SRE text file.
    pub sre: PathBuf,

    /// Output format.
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

/// Arguments for the `indices` subcommand.
#[derive(clap::Args)]
pub struct IndicesArgs {
    /// Path to the SRE text file.
    pub sre: PathBuf,
}

/// Arguments for the `delta` subcommand.
#[derive(clap::Args)]
pub struct DeltaArgs {
    /// Path to the SRE text file.
    #[arg(long)]
    pub sre: PathBuf,

    /// Path to the SRE delta file. Successive deltas are separated by `---`
    /// lines and indexed against the expression left by the previous one.
    #[arg(long)]
    pub delta: PathBuf,
}

/// Arguments for the `refine` subcommand.
#[derive(clap::Args)]
pub struct RefineArgs {
    /// Path to the DTMC text file.
    #[arg(long)]
    pub dtmc: PathBuf,

    /// Name of the refined edge's source node.
    #[arg(long)]
    pub from: String,

    /// Name of the refined edge's target node.
    #[arg(long)]
    pub to: String,

    /// Label of the refined edge (`ε` for the empty label).
    #[arg(long, default_value = "")]
    pub label: String,

    /// Path to the sub-DTMC text file.
    #[arg(long)]
    pub sub: PathBuf,
}

/// Arguments for the `sample` subcommand.
#[derive(clap::Args)]
pub struct SampleArgs {
    /// Path to the DTMC text file.
    pub dtmc: PathBuf,

    /// Number of strings to draw.
    #[arg(short = 'n', long, default_value_t = 10)]
    pub count: usize,

    /// Override global RNG seed from config.
    #[arg(short, long)]
    pub seed: Option<u64>,

    /// Longest walk before a draw is abandoned.
    #[arg(long, default_value_t = 100_000)]
    pub max_steps: usize,
}
