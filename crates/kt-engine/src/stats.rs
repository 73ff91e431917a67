//! Read-side statistics over the bucket store.
//!
//! Everything here is stateless: each function issues typed reads against a
//! [`Database`] and derives the presentation read-models. Storage failures are
//! logged and treated as empty results so a broken read never takes down the
//! caller.

use chrono::{DateTime, TimeZone, Utc};
use kt_core::{
    BucketCounters, KeyCount, KeypressStatistics, StatWindow, TimeRange, WindowTotals,
    current_streak, fill_hours, hourly_extremes, longest_streak, sort_key_counts,
    summarize_focus, top_keys,
};
use kt_core::window::local_midnight;
use kt_db::{BucketRow, Database, DbError};

/// Tunables for a statistics snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotOptions {
    /// How many keys to include in each ranking.
    pub max_key_results: usize,
    /// Gap in minutes after which a focus block ends.
    pub idle_threshold_minutes: i64,
}

impl Default for SnapshotOptions {
    fn default() -> Self {
        Self {
            max_key_results: 10,
            idle_threshold_minutes: kt_core::DEFAULT_IDLE_THRESHOLD_MINUTES,
        }
    }
}

/// Total keystrokes in the range, or over the whole history when `None`.
pub fn range_total(db: &Database, range: Option<&TimeRange>) -> i64 {
    let result = match range {
        Some(range) => db.sum_total_keys(range),
        None => db.lifetime_total(),
    };
    or_empty("range_total", result)
}

/// Per-key counts in the range, in display order.
pub fn sorted_key_frequencies(db: &Database, range: Option<&TimeRange>) -> Vec<KeyCount> {
    let mut counts = or_empty("key_frequencies", db.key_frequencies(range));
    sort_key_counts(&mut counts);
    counts
}

/// Stored per-minute rows in the range, or all of them when `None`, oldest first.
pub fn bucket_rows(db: &Database, range: Option<&TimeRange>) -> Vec<BucketRow> {
    or_empty("bucket_rows", db.bucket_rows(range))
}

/// Summary of what the store holds for the handle's user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreStatus {
    pub user_id: String,
    pub lifetime_total: i64,
    pub latest: Option<BucketRow>,
}

pub fn store_status(db: &Database) -> StoreStatus {
    StoreStatus {
        user_id: db.user_id().to_string(),
        lifetime_total: or_empty("lifetime_total", db.lifetime_total()),
        latest: or_empty("latest_bucket", db.latest_bucket()),
    }
}

/// Builds the full statistics read-model as of `now`.
///
/// Calendar windows, streak days and hours of day follow `now`'s time zone.
pub fn compute_statistics<Tz: TimeZone>(
    db: &Database,
    now: &DateTime<Tz>,
    timezone: &str,
    options: SnapshotOptions,
) -> KeypressStatistics {
    let tz = now.timezone();
    let window_total = |window: StatWindow| range_total(db, window.range(now).as_ref());

    let totals = WindowTotals {
        today: window_total(StatWindow::Today),
        last_7_days: window_total(StatWindow::Last7Days),
        last_30_days: window_total(StatWindow::Last30Days),
        this_month: window_total(StatWindow::ThisMonth),
        last_month: window_total(StatWindow::LastMonth),
        this_year: window_total(StatWindow::ThisYear),
        lifetime: window_total(StatWindow::Lifetime),
    };

    let days: Vec<_> = or_empty("daily_totals", db.daily_totals(&tz))
        .into_iter()
        .map(|day| day.date)
        .collect();
    let today = now.date_naive();

    let hours = fill_hours(&or_empty("hourly_totals", db.hourly_totals(&tz)));

    let today_range = TimeRange::new(local_midnight(&tz, today), now.with_timezone(&Utc));
    let marks = or_empty("minute_activity_marks", db.minute_activity_marks(&today_range));
    let focus_today = summarize_focus(
        &marks,
        today_range.start.timestamp(),
        now.timestamp(),
        options.idle_threshold_minutes,
    );

    let counters_today = or_empty("sum_counters", db.sum_counters(&today_range));

    KeypressStatistics {
        generated_at: now.with_timezone(&Utc),
        timezone: timezone.to_string(),
        totals,
        average_7: totals.average_7(),
        average_30: totals.average_30(),
        longest_streak: longest_streak(&days),
        current_streak: current_streak(&days, today),
        hourly: hourly_extremes(&hours),
        top_keys_today: top_keys(
            or_empty("key_frequencies", db.key_frequencies(Some(&today_range))),
            options.max_key_results,
        ),
        top_keys_all_time: top_keys(
            or_empty("key_frequencies", db.key_frequencies(None)),
            options.max_key_results,
        ),
        focus_today,
        idle_threshold_minutes: options.idle_threshold_minutes,
        backspace_ratio_today: backspace_ratio(&counters_today),
        average_interval_ms_today: counters_today.average_interval_ms(),
    }
}

#[allow(clippy::cast_precision_loss)]
fn backspace_ratio(counters: &BucketCounters) -> f64 {
    if counters.total_keys == 0 {
        return 0.0;
    }
    counters.backspace_count as f64 / counters.total_keys as f64
}

fn or_empty<T: Default>(query: &'static str, result: Result<T, DbError>) -> T {
    result.unwrap_or_else(|err| {
        tracing::warn!(query, error = %err, "statistics read failed; using empty result");
        T::default()
    })
}
