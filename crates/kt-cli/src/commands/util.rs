//! Shared utilities for CLI commands.

use std::sync::LazyLock;

use anyhow::Context;
use chrono::{DateTime, Duration, Local, Utc};
use clap::Args;
use kt_core::{StatWindow, TimeRange};
use regex::Regex;

/// Pre-compiled regex for relative time parsing.
static RELATIVE_TIME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)\s+(minute|hour|day|week)s?\s+ago$").unwrap());

/// Conservative bounds for relative time parsing (~1000 years in minutes).
const MAX_RELATIVE_MINUTES: i64 = 1000 * 365 * 24 * 60;

/// Time range selection shared by the query commands.
#[derive(Debug, Clone, Args)]
pub struct RangeArgs {
    /// Named window: today, 7d, 30d, month, last-month, year or all.
    #[arg(long, conflicts_with = "start")]
    pub range: Option<StatWindow>,

    /// Range start (ISO 8601 or relative, e.g. "2 hours ago").
    #[arg(long)]
    pub start: Option<String>,

    /// Range end (ISO 8601 or relative). Defaults to now.
    #[arg(long, requires = "start")]
    pub end: Option<String>,
}

impl RangeArgs {
    /// Resolves the selection in the local time zone, `None` meaning all time.
    pub fn resolve(&self, default: StatWindow, now: DateTime<Utc>) -> anyhow::Result<Option<TimeRange>> {
        if let Some(start) = &self.start {
            let start = parse_datetime(start, now)?;
            let end = match &self.end {
                Some(end) => parse_datetime(end, now)?,
                None => now,
            };
            if end < start {
                anyhow::bail!("range end {end} is before start {start}");
            }
            return Ok(Some(TimeRange::new(start, end)));
        }

        let window = self.range.unwrap_or(default);
        Ok(window.range(&now.with_timezone(&Local)))
    }

    /// Describes the selection for headings.
    pub fn label(&self, default: StatWindow) -> String {
        match (&self.start, &self.end) {
            (Some(start), Some(end)) => format!("{start} .. {end}"),
            (Some(start), None) => format!("{start} .. now"),
            _ => self.range.unwrap_or(default).to_string(),
        }
    }
}

/// Parse a datetime string as either ISO 8601 or relative time.
///
/// Supports:
/// - ISO 8601: "2026-01-15T10:30:00Z"
/// - Relative: "2 hours ago", "30 minutes ago", "1 day ago", "1 week ago"
pub fn parse_datetime(s: &str, now: DateTime<Utc>) -> anyhow::Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    let Some(caps) = RELATIVE_TIME_RE.captures(s.trim()) else {
        anyhow::bail!(
            "Invalid datetime: {s}. Use ISO 8601 (e.g., 2026-01-15T10:30:00Z) or relative (e.g., '2 hours ago')"
        );
    };

    let n: i64 = caps[1]
        .parse()
        .context("failed to parse number in relative time")?;

    let (max_for_unit, minutes_per_unit) = match &caps[2] {
        "minute" => (MAX_RELATIVE_MINUTES, 1),
        "hour" => (MAX_RELATIVE_MINUTES / 60, 60),
        "day" => (MAX_RELATIVE_MINUTES / (60 * 24), 60 * 24),
        "week" => (MAX_RELATIVE_MINUTES / (60 * 24 * 7), 60 * 24 * 7),
        unit => anyhow::bail!("Unknown time unit: {unit}"),
    };

    if n > max_for_unit {
        anyhow::bail!("Relative time value too large: {n} {}", &caps[2]);
    }

    Ok(now - Duration::minutes(n * minutes_per_unit))
}

/// Quotes a CSV field when it contains a separator, quote or line break.
pub fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-01-15T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn args(range: Option<StatWindow>, start: Option<&str>, end: Option<&str>) -> RangeArgs {
        RangeArgs {
            range,
            start: start.map(str::to_string),
            end: end.map(str::to_string),
        }
    }

    #[test]
    fn test_parse_datetime_iso8601() {
        let dt = parse_datetime("2026-01-15T10:30:00Z", now()).unwrap();
        assert_eq!(dt.to_rfc3339(), "2026-01-15T10:30:00+00:00");
    }

    #[test]
    fn test_parse_datetime_relative() {
        assert_eq!(
            parse_datetime("2 hours ago", now()).unwrap(),
            now() - Duration::hours(2)
        );
        assert_eq!(
            parse_datetime("1 week ago", now()).unwrap(),
            now() - Duration::weeks(1)
        );
        assert_eq!(
            parse_datetime("30 minutes ago", now()).unwrap(),
            now() - Duration::minutes(30)
        );
    }

    #[test]
    fn test_parse_datetime_rejects_garbage() {
        assert!(parse_datetime("yesterday-ish", now()).is_err());
        assert!(parse_datetime("99999999999 weeks ago", now()).is_err());
    }

    #[test]
    fn test_explicit_range_defaults_end_to_now() {
        let range = args(None, Some("1 hour ago"), None)
            .resolve(StatWindow::Lifetime, now())
            .unwrap()
            .unwrap();
        assert_eq!(range.start, now() - Duration::hours(1));
        assert_eq!(range.end, now());
    }

    #[test]
    fn test_inverted_range_is_rejected() {
        let result = args(None, Some("2026-01-15T11:00:00Z"), Some("2026-01-15T10:00:00Z"))
            .resolve(StatWindow::Lifetime, now());
        assert!(result.is_err());
    }

    #[test]
    fn test_named_window_falls_back_to_default() {
        assert_eq!(args(None, None, None).resolve(StatWindow::Lifetime, now()).unwrap(), None);
        let today = args(Some(StatWindow::Today), None, None)
            .resolve(StatWindow::Lifetime, now())
            .unwrap()
            .unwrap();
        assert_eq!(today.end, now());
        assert!(today.start <= now());
        assert_eq!(args(None, None, None).label(StatWindow::Today), "today");
    }

    #[test]
    fn test_csv_field_quotes_only_when_needed() {
        assert_eq!(csv_field("A"), "A");
        assert_eq!(csv_field(","), "\",\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }
}
