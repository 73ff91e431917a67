//! Export command: stored per-minute buckets as CSV.

use std::io::Write;

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use clap::Args;

use kt_core::StatWindow;
use kt_db::bucket_instant;
use kt_engine::Engine;

use super::util::RangeArgs;

#[derive(Debug, Args)]
pub struct ExportArgs {
    #[command(flatten)]
    pub range: RangeArgs,
}

/// Writes one CSV row per stored minute, oldest first. Returns the row count.
pub fn run<W: Write>(
    writer: &mut W,
    args: &ExportArgs,
    engine: &Engine,
    now: DateTime<Utc>,
) -> Result<usize> {
    let range = args.range.resolve(StatWindow::Lifetime, now)?;
    let rows = engine.bucket_rows(range).context("failed to read buckets")?;

    writeln!(
        writer,
        "bucket_start,minute,total_keys,backspace_count,sum_interval_ms,interval_samples"
    )?;
    for row in &rows {
        let minute = bucket_instant(row.bucket_start)
            .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Secs, true))
            .unwrap_or_default();
        let c = row.counters;
        // Stop quietly when the reader goes away (e.g. piped to `head`).
        if writeln!(
            writer,
            "{},{minute},{},{},{},{}",
            row.bucket_start, c.total_keys, c.backspace_count, c.sum_interval_ms, c.interval_samples
        )
        .is_err()
        {
            break;
        }
    }

    tracing::debug!(rows = rows.len(), "buckets exported");
    Ok(rows.len())
}
