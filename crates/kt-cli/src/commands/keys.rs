//! Keys command: per-key press counts, most pressed first.

use std::io::Write;

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::Args;

use kt_core::{KeyCount, StatWindow};
use kt_engine::Engine;

use super::util::{RangeArgs, csv_field};

#[derive(Debug, Args)]
pub struct KeysArgs {
    #[command(flatten)]
    pub range: RangeArgs,

    /// Show at most this many keys.
    #[arg(long)]
    pub limit: Option<usize>,

    /// Output as CSV.
    #[arg(long)]
    pub csv: bool,
}

pub fn run<W: Write>(
    writer: &mut W,
    args: &KeysArgs,
    engine: &Engine,
    now: DateTime<Utc>,
) -> Result<()> {
    let range = args.range.resolve(StatWindow::Lifetime, now)?;
    let mut keys = engine.key_frequencies(range)?;
    if let Some(limit) = args.limit {
        keys.truncate(limit);
    }

    if args.csv {
        write_csv(writer, &keys)
    } else {
        write_table(writer, &keys)
    }
}

fn write_csv<W: Write>(writer: &mut W, keys: &[KeyCount]) -> Result<()> {
    writeln!(writer, "key,count")?;
    for key in keys {
        writeln!(writer, "{},{}", csv_field(&key.label), key.count)?;
    }
    Ok(())
}

fn write_table<W: Write>(writer: &mut W, keys: &[KeyCount]) -> Result<()> {
    if keys.is_empty() {
        writeln!(writer, "No keystrokes recorded.")?;
        return Ok(());
    }
    let width = keys
        .iter()
        .map(|k| k.label.chars().count())
        .max()
        .unwrap_or(0)
        .max(3);
    writeln!(writer, "{:<width$}  COUNT", "KEY")?;
    for key in keys {
        writeln!(writer, "{:<width$}  {}", key.label, key.count)?;
    }
    Ok(())
}
