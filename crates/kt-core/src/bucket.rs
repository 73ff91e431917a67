//! In-memory accumulation of keystrokes into one-minute buckets.
//!
//! A [`BucketAccumulator`] holds everything known about the currently open
//! minute. Once flushed it becomes a [`FlushedBucket`], which is what the
//! storage layer persists. Persisted counters are combined with
//! [`BucketCounters::merge`], a commutative monoid, so flushing the same
//! minute twice (e.g. across a restart) adds up rather than overwrites.

use std::collections::BTreeMap;

use chrono::{DateTime, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::key_label::{self, UNKNOWN_LABEL};

/// Width of every bucket in seconds.
pub const BUCKET_SIZE_SECS: i64 = 60;

/// A single keystroke as reported by the event source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEvent {
    pub timestamp: DateTime<Utc>,
    pub label: String,
}

impl KeyEvent {
    pub fn new(timestamp: DateTime<Utc>, label: impl Into<String>) -> Self {
        Self {
            timestamp,
            label: label.into(),
        }
    }
}

/// Numeric per-bucket counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketCounters {
    pub total_keys: i64,
    pub backspace_count: i64,
    pub sum_interval_ms: i64,
    pub interval_samples: i64,
}

impl BucketCounters {
    /// Combines stored counters with incoming ones by summing every field.
    ///
    /// This is the same rule the database applies on conflict.
    #[must_use]
    pub const fn merge(existing: Self, incoming: Self) -> Self {
        Self {
            total_keys: existing.total_keys.saturating_add(incoming.total_keys),
            backspace_count: existing
                .backspace_count
                .saturating_add(incoming.backspace_count),
            sum_interval_ms: existing
                .sum_interval_ms
                .saturating_add(incoming.sum_interval_ms),
            interval_samples: existing
                .interval_samples
                .saturating_add(incoming.interval_samples),
        }
    }

    /// Mean gap between consecutive keystrokes, if any were sampled.
    #[allow(clippy::cast_precision_loss)]
    pub fn average_interval_ms(&self) -> Option<f64> {
        (self.interval_samples > 0)
            .then(|| self.sum_interval_ms as f64 / self.interval_samples as f64)
    }
}

/// Returns the epoch second at which the minute containing `timestamp` starts.
///
/// Alignment follows the calendar minute in `tz`. If the truncated local time
/// cannot be represented, or resolves to the other side of a DST repeat, falls
/// back to a plain 60-second epoch window.
pub fn bucket_start_for<Tz: TimeZone>(timestamp: DateTime<Utc>, tz: &Tz) -> i64 {
    let local = timestamp.with_timezone(tz);
    local
        .with_nanosecond(0)
        .and_then(|t| t.with_second(0))
        .map(|t| t.timestamp())
        .filter(|start| (0..BUCKET_SIZE_SECS).contains(&(timestamp.timestamp() - start)))
        .unwrap_or_else(|| timestamp.timestamp().div_euclid(BUCKET_SIZE_SECS) * BUCKET_SIZE_SECS)
}

/// Write-side state for the single open bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketAccumulator {
    start: i64,
    per_key_counts: BTreeMap<String, i64>,
    counters: BucketCounters,
    last_event_at: Option<DateTime<Utc>>,
}

impl BucketAccumulator {
    /// Opens an empty accumulator for the bucket starting at `start`.
    pub const fn new(start: i64) -> Self {
        Self {
            start,
            per_key_counts: BTreeMap::new(),
            counters: BucketCounters {
                total_keys: 0,
                backspace_count: 0,
                sum_interval_ms: 0,
                interval_samples: 0,
            },
            last_event_at: None,
        }
    }

    pub const fn start(&self) -> i64 {
        self.start
    }

    pub const fn end(&self) -> i64 {
        self.start + BUCKET_SIZE_SECS
    }

    pub const fn counters(&self) -> BucketCounters {
        self.counters
    }

    pub const fn is_empty(&self) -> bool {
        self.counters.total_keys == 0
    }

    pub fn per_key_counts(&self) -> &BTreeMap<String, i64> {
        &self.per_key_counts
    }

    /// Folds one keystroke into the bucket.
    ///
    /// The label is expected to be normalized already; an empty label is
    /// recorded as [`UNKNOWN_LABEL`]. Negative gaps from clock jitter count
    /// as zero.
    pub fn record(&mut self, timestamp: DateTime<Utc>, label: &str) {
        let label = if label.is_empty() { UNKNOWN_LABEL } else { label };

        self.counters.total_keys += 1;
        *self.per_key_counts.entry(label.to_string()).or_insert(0) += 1;
        if key_label::is_backspace(label) {
            self.counters.backspace_count += 1;
        }

        if let Some(previous) = self.last_event_at {
            let gap_ms = (timestamp - previous).num_milliseconds().max(0);
            self.counters.sum_interval_ms += gap_ms;
            self.counters.interval_samples += 1;
        }
        self.last_event_at = Some(timestamp);
    }

    /// Consumes the accumulator, producing the rows to persist.
    pub fn into_flushed(self) -> FlushedBucket {
        FlushedBucket {
            bucket_start: self.start,
            counters: self.counters,
            key_counts: self.per_key_counts.into_iter().collect(),
        }
    }
}

/// A closed bucket, ready to be written as one stats row plus one row per key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlushedBucket {
    pub bucket_start: i64,
    pub counters: BucketCounters,
    pub key_counts: Vec<(String, i64)>,
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::FixedOffset;
    use chrono_tz::America::Havana;

    fn at(secs: i64, millis: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(secs * 1000 + millis).unwrap()
    }

    #[test]
    fn total_equals_event_count_and_key_sum() {
        let mut acc = BucketAccumulator::new(1_700_000_040);
        let labels = ["A", "B", "A", "Backspace", "Space", "A"];
        for (i, label) in labels.iter().enumerate() {
            acc.record(at(1_700_000_040, i64::try_from(i).unwrap() * 100), label);
        }

        let counters = acc.counters();
        assert_eq!(counters.total_keys, 6);
        assert_eq!(acc.per_key_counts().values().sum::<i64>(), 6);
        assert_eq!(acc.per_key_counts()["A"], 3);
        assert_eq!(counters.backspace_count, 1);
        assert_eq!(counters.interval_samples, 5);
        assert_eq!(counters.sum_interval_ms, 500);
    }

    #[test]
    fn negative_gaps_are_clamped() {
        let mut acc = BucketAccumulator::new(0);
        acc.record(at(10, 500), "A");
        acc.record(at(10, 200), "B");
        assert_eq!(acc.counters().sum_interval_ms, 0);
        assert_eq!(acc.counters().interval_samples, 1);
    }

    #[test]
    fn empty_label_is_recorded_as_unknown() {
        let mut acc = BucketAccumulator::new(0);
        acc.record(at(1, 0), "");
        assert_eq!(acc.per_key_counts()["Unknown"], 1);
    }

    #[test]
    fn merge_sums_every_field() {
        let a = BucketCounters {
            total_keys: 5,
            backspace_count: 1,
            sum_interval_ms: 900,
            interval_samples: 4,
        };
        let b = BucketCounters {
            total_keys: 2,
            backspace_count: 0,
            sum_interval_ms: 100,
            interval_samples: 1,
        };
        let merged = BucketCounters::merge(a, b);
        assert_eq!(merged.total_keys, 7);
        assert_eq!(merged.backspace_count, 1);
        assert_eq!(merged.sum_interval_ms, 1000);
        assert_eq!(merged.interval_samples, 5);
    }

    #[test]
    fn merge_is_commutative_and_associative() {
        let a = BucketCounters {
            total_keys: 3,
            backspace_count: 1,
            sum_interval_ms: 10,
            interval_samples: 2,
        };
        let b = BucketCounters {
            total_keys: 4,
            ..BucketCounters::default()
        };
        let c = BucketCounters {
            total_keys: 1,
            sum_interval_ms: 7,
            interval_samples: 1,
            ..BucketCounters::default()
        };
        assert_eq!(BucketCounters::merge(a, b), BucketCounters::merge(b, a));
        assert_eq!(
            BucketCounters::merge(BucketCounters::merge(a, b), c),
            BucketCounters::merge(a, BucketCounters::merge(b, c)),
        );
        assert_eq!(BucketCounters::merge(a, BucketCounters::default()), a);
    }

    #[test]
    fn bucket_start_truncates_to_calendar_minute() {
        let ts = DateTime::parse_from_rfc3339("2025-03-04T10:15:42.750Z")
            .unwrap()
            .with_timezone(&Utc);
        let expected = DateTime::parse_from_rfc3339("2025-03-04T10:15:00Z")
            .unwrap()
            .timestamp();
        assert_eq!(bucket_start_for(ts, &Utc), expected);

        let ist = FixedOffset::east_opt(5 * 3600 + 30 * 60).unwrap();
        assert_eq!(bucket_start_for(ts, &ist), expected);
    }

    #[test]
    fn bucket_start_inside_repeated_hour_stays_in_its_minute() {
        // Havana falls back from 01:00 CDT to 00:00 CST on 2024-11-03, so
        // 00:30:45 local happens at both 04:30:45Z and 05:30:45Z.
        for (ts, expected) in [
            ("2024-11-03T04:30:45Z", "2024-11-03T04:30:00Z"),
            ("2024-11-03T05:30:45Z", "2024-11-03T05:30:00Z"),
        ] {
            let ts = DateTime::parse_from_rfc3339(ts).unwrap().with_timezone(&Utc);
            let expected = DateTime::parse_from_rfc3339(expected).unwrap().timestamp();
            let start = bucket_start_for(ts, &Havana);
            assert_eq!(start, expected);
            assert_eq!(start.rem_euclid(BUCKET_SIZE_SECS), 0);
            assert!(start <= ts.timestamp());
        }
    }

    #[test]
    fn bucket_start_handles_pre_epoch_instants() {
        let ts = at(-1, 0);
        assert_eq!(bucket_start_for(ts, &Utc), -60);
    }

    #[test]
    fn average_interval_requires_samples() {
        assert_eq!(BucketCounters::default().average_interval_ms(), None);
        let counters = BucketCounters {
            sum_interval_ms: 300,
            interval_samples: 2,
            ..BucketCounters::default()
        };
        assert_eq!(counters.average_interval_ms(), Some(150.0));
    }

    #[test]
    fn flushed_bucket_lists_one_row_per_key() {
        let mut acc = BucketAccumulator::new(120);
        acc.record(at(121, 0), "B");
        acc.record(at(122, 0), "A");
        acc.record(at(123, 0), "B");
        let flushed = acc.into_flushed();
        assert_eq!(flushed.bucket_start, 120);
        assert_eq!(
            flushed.key_counts,
            vec![("A".to_string(), 1), ("B".to_string(), 2)]
        );
    }
}
