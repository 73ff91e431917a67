//! Stats command: the full statistics summary.

use std::io::Write;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;

use kt_core::{KeyCount, KeypressStatistics, Streak};
use kt_engine::Engine;

use crate::Config;

#[derive(Debug, Args)]
pub struct StatsArgs {
    /// Output as JSON.
    #[arg(long)]
    pub json: bool,

    /// Number of keys in each ranking (overrides config).
    #[arg(long)]
    pub max_keys: Option<usize>,

    /// Minutes without typing that end a focus block (overrides config).
    #[arg(long)]
    pub idle_threshold: Option<i64>,
}

pub fn run<W: Write>(
    writer: &mut W,
    args: &StatsArgs,
    engine: &Engine,
    config: &Config,
    now: DateTime<Utc>,
) -> Result<()> {
    let mut options = config.snapshot_options();
    if let Some(max_keys) = args.max_keys {
        options.max_key_results = max_keys;
    }
    if let Some(threshold) = args.idle_threshold {
        if threshold < 0 {
            anyhow::bail!("idle threshold must not be negative: {threshold}");
        }
        options.idle_threshold_minutes = threshold;
    }

    let stats = engine.statistics_snapshot_at(now, options)?;

    if args.json {
        serde_json::to_writer_pretty(&mut *writer, &stats)
            .context("failed to serialize statistics")?;
        writeln!(writer)?;
        return Ok(());
    }
    render(writer, &stats)
}

/// Writes the human-readable summary.
pub fn render<W: Write>(writer: &mut W, stats: &KeypressStatistics) -> Result<()> {
    writeln!(
        writer,
        "Keystroke statistics ({}, generated {})",
        stats.timezone,
        stats.generated_at.format("%Y-%m-%d %H:%M UTC")
    )?;

    let totals = &stats.totals;
    section(writer, "Totals")?;
    row(writer, "Today", totals.today)?;
    row(writer, "Last 7 days", totals.last_7_days)?;
    row(writer, "Last 30 days", totals.last_30_days)?;
    row(writer, "This month", totals.this_month)?;
    row(writer, "Last month", totals.last_month)?;
    row(writer, "This year", totals.this_year)?;
    row(writer, "Lifetime", totals.lifetime)?;

    section(writer, "Daily average")?;
    row(writer, "7 days", format!("{:.1}", stats.average_7))?;
    row(writer, "30 days", format!("{:.1}", stats.average_30))?;

    section(writer, "Streaks")?;
    row(writer, "Current", format_streak(stats.current_streak, false))?;
    row(writer, "Longest", format_streak(stats.longest_streak, true))?;

    section(writer, "Hours")?;
    match stats.hourly {
        Some(hourly) => {
            row(writer, "Peak", format!("{:02}:00 ({})", hourly.peak.hour, hourly.peak.total))?;
            row(
                writer,
                "Quietest",
                format!("{:02}:00 ({})", hourly.quietest.hour, hourly.quietest.total),
            )?;
        }
        None => row(writer, "Peak", "-")?,
    }

    let focus = &stats.focus_today;
    section(writer, "Today")?;
    row(writer, "Active", format!("{} min", focus.active_minutes))?;
    row(writer, "Longest focus", format!("{} min", focus.longest_focus_minutes))?;
    row(
        writer,
        "Longest idle",
        format!(
            "{} min (threshold {} min)",
            focus.longest_idle_minutes, stats.idle_threshold_minutes
        ),
    )?;
    row(
        writer,
        "Backspace",
        format!("{:.1}%", stats.backspace_ratio_today * 100.0),
    )?;
    let interval = stats
        .average_interval_ms_today
        .map_or_else(|| "-".to_string(), |ms| format!("{ms:.0} ms"));
    row(writer, "Avg interval", interval)?;

    section(writer, "Top keys today")?;
    key_list(writer, &stats.top_keys_today)?;
    section(writer, "Top keys all time")?;
    key_list(writer, &stats.top_keys_all_time)?;
    Ok(())
}

fn section<W: Write>(writer: &mut W, title: &str) -> Result<()> {
    writeln!(writer)?;
    writeln!(writer, "{title}")?;
    Ok(())
}

fn row<W: Write>(writer: &mut W, label: &str, value: impl std::fmt::Display) -> Result<()> {
    writeln!(writer, "  {label:<14} {value}")?;
    Ok(())
}

fn format_streak(streak: Option<Streak>, with_end: bool) -> String {
    match streak {
        None => "-".to_string(),
        Some(s) => {
            let unit = if s.length == 1 { "day" } else { "days" };
            if with_end {
                format!("{} {unit} (ended {})", s.length, s.ended_on)
            } else {
                format!("{} {unit}", s.length)
            }
        }
    }
}

fn key_list<W: Write>(writer: &mut W, keys: &[KeyCount]) -> Result<()> {
    if keys.is_empty() {
        writeln!(writer, "  (none)")?;
        return Ok(());
    }
    let width = keys.iter().map(|k| k.label.chars().count()).max().unwrap_or(0);
    for key in keys {
        writeln!(writer, "  {:<width$}  {}", key.label, key.count)?;
    }
    Ok(())
}
