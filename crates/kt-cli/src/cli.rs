//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::commands::{export::ExportArgs, keys::KeysArgs, stats::StatsArgs, total::TotalArgs};

/// Keystroke statistics.
///
/// Aggregates keystrokes into per-minute buckets and reports totals, key
/// rankings, streaks and focus time.
#[derive(Debug, Parser)]
#[command(name = "kt", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Read keystrokes as JSONL from stdin and record them.
    Ingest,

    /// Print the number of keystrokes in a range.
    Total(TotalArgs),

    /// List key press counts.
    Keys(KeysArgs),

    /// Show the full statistics summary.
    Stats(StatsArgs),

    /// Export stored per-minute buckets as CSV.
    Export(ExportArgs),

    /// Show database location and the latest recorded minute.
    Status,
}
