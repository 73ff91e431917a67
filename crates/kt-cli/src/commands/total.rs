//! Total command: keystroke count for a range.

use std::io::Write;

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::Args;

use kt_core::StatWindow;
use kt_engine::Engine;

use super::util::RangeArgs;

#[derive(Debug, Args)]
pub struct TotalArgs {
    #[command(flatten)]
    pub range: RangeArgs,
}

pub fn run<W: Write>(
    writer: &mut W,
    args: &TotalArgs,
    engine: &Engine,
    now: DateTime<Utc>,
) -> Result<i64> {
    let range = args.range.resolve(StatWindow::Lifetime, now)?;
    let total = engine.total(range)?;
    writeln!(writer, "{}: {total}", args.range.label(StatWindow::Lifetime))?;
    Ok(total)
}
