//! Storage layer for keystroke aggregates.
//!
//! Provides persistence for per-minute buckets using `rusqlite`.
//!
//! # Thread Safety
//!
//! The [`Database`] type wraps a `rusqlite::Connection`, which is `Send` but not `Sync`.
//! A `Database` can be moved onto a worker thread but must not be shared across
//! threads. The aggregation engine owns exactly one instance on its worker.
//!
//! # Schema
//!
//! Two tables, both keyed by `(user_id, bucket_start, bucket_size_sec)`:
//!
//! - `bucket_stats` holds the numeric counters of each minute.
//! - `key_buckets` holds one press count per key per minute.
//!
//! `bucket_start` is an epoch-second value aligned to a calendar minute and
//! `bucket_size_sec` is always 60. Writes never overwrite: on conflict every
//! counter is added to the stored value, so flushing the same minute twice
//! (for instance after a restart) yields the true total.
//!
//! ## Local-time grouping
//!
//! Day and hour-of-day groupings depend on the caller's time zone. Rows are
//! summed in SQL into 15-minute UTC slots (every UTC offset in use is a
//! multiple of 15 minutes, so a slot never straddles a local hour) and the
//! slots are assigned to local days and hours in Rust.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, NaiveDate, TimeZone, Timelike, Utc};
use kt_core::{BUCKET_SIZE_SECS, BucketCounters, FlushedBucket, HourTotal, KeyCount, TimeRange};
use rusqlite::{Connection, OptionalExtension, params};
use thiserror::Error;

/// User id used when none is configured.
pub const DEFAULT_USER_ID: &str = "local";

/// Width of the SQL pre-aggregation slots used for local-time grouping.
const LOCAL_SLOT_SECS: i64 = 15 * 60;

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// A stored bucket start cannot be represented as a date.
    #[error("bucket start out of range: {0}")]
    TimestampOutOfRange(i64),
}

/// Database connection wrapper.
///
/// See the [module documentation](self) for thread safety considerations.
pub struct Database {
    conn: Connection,
    user_id: String,
}

/// One stored minute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketRow {
    pub bucket_start: i64,
    pub counters: BucketCounters,
}

/// Keystrokes recorded on one local calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayTotal {
    pub date: NaiveDate,
    pub total: i64,
}

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The database schema is automatically initialized on first open.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing. The database is destroyed when the connection closes.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self, DbError> {
        let db = Self {
            conn,
            user_id: DEFAULT_USER_ID.to_string(),
        };
        db.init()?;
        Ok(db)
    }

    /// Scopes every read and write of this handle to `user_id`.
    #[must_use]
    pub fn for_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = user_id.into();
        self
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Initializes the database schema.
    ///
    /// This is idempotent - safe to call on an already-initialized database.
    fn init(&self) -> Result<(), DbError> {
        self.conn.execute_batch(
            "
            -- One row per (user, minute); counters are cumulative.
            CREATE TABLE IF NOT EXISTS bucket_stats (
                user_id TEXT NOT NULL,
                bucket_start INTEGER NOT NULL,
                bucket_size_sec INTEGER NOT NULL,
                total_keys INTEGER NOT NULL DEFAULT 0,
                backspace_count INTEGER NOT NULL DEFAULT 0,
                sum_interval_ms INTEGER NOT NULL DEFAULT 0,
                interval_samples INTEGER NOT NULL DEFAULT 0,
                UNIQUE (user_id, bucket_start, bucket_size_sec)
            );

            CREATE INDEX IF NOT EXISTS idx_bucket_stats_user_start
                ON bucket_stats(user_id, bucket_start);

            -- One row per (user, minute, key); press_count is cumulative.
            CREATE TABLE IF NOT EXISTS key_buckets (
                user_id TEXT NOT NULL,
                bucket_start INTEGER NOT NULL,
                bucket_size_sec INTEGER NOT NULL,
                key_code TEXT NOT NULL,
                press_count INTEGER NOT NULL DEFAULT 0,
                UNIQUE (user_id, bucket_start, bucket_size_sec, key_code)
            );

            CREATE INDEX IF NOT EXISTS idx_key_buckets_user_start
                ON key_buckets(user_id, bucket_start);
            ",
        )?;
        Ok(())
    }

    /// Writes a flushed bucket: one stats row and one row per key, atomically.
    ///
    /// Existing rows for the same minute are added to, never replaced. On any
    /// error the whole transaction is rolled back.
    pub fn persist_bucket(&mut self, bucket: &FlushedBucket) -> Result<(), DbError> {
        let tx = self.conn.transaction()?;
        {
            let counters = bucket.counters;
            tx.execute(
                "
                INSERT INTO bucket_stats
                (user_id, bucket_start, bucket_size_sec, total_keys, backspace_count, sum_interval_ms, interval_samples)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(user_id, bucket_start, bucket_size_sec) DO UPDATE SET
                    total_keys = total_keys + excluded.total_keys,
                    backspace_count = backspace_count + excluded.backspace_count,
                    sum_interval_ms = sum_interval_ms + excluded.sum_interval_ms,
                    interval_samples = interval_samples + excluded.interval_samples
                ",
                params![
                    self.user_id,
                    bucket.bucket_start,
                    BUCKET_SIZE_SECS,
                    counters.total_keys,
                    counters.backspace_count,
                    counters.sum_interval_ms,
                    counters.interval_samples,
                ],
            )?;

            let mut key_stmt = tx.prepare(
                "
                INSERT INTO key_buckets (user_id, bucket_start, bucket_size_sec, key_code, press_count)
                VALUES (?, ?, ?, ?, ?)
                ON CONFLICT(user_id, bucket_start, bucket_size_sec, key_code) DO UPDATE SET
                    press_count = press_count + excluded.press_count
                ",
            )?;
            for (key, count) in &bucket.key_counts {
                key_stmt.execute(params![
                    self.user_id,
                    bucket.bucket_start,
                    BUCKET_SIZE_SECS,
                    key,
                    count,
                ])?;
            }
        }
        tx.commit()?;
        tracing::trace!(
            bucket_start = bucket.bucket_start,
            total_keys = bucket.counters.total_keys,
            keys = bucket.key_counts.len(),
            "bucket persisted"
        );
        Ok(())
    }

    /// Sums `total_keys` for buckets starting within the range.
    ///
    /// The range is inclusive of `start` and exclusive of `end`.
    pub fn sum_total_keys(&self, range: &TimeRange) -> Result<i64, DbError> {
        Ok(self.sum_counters(range)?.total_keys)
    }

    /// Sums every counter for buckets starting within the range.
    pub fn sum_counters(&self, range: &TimeRange) -> Result<BucketCounters, DbError> {
        if range.is_empty() {
            return Ok(BucketCounters::default());
        }
        let counters = self.conn.query_row(
            "
            SELECT COALESCE(SUM(total_keys), 0),
                   COALESCE(SUM(backspace_count), 0),
                   COALESCE(SUM(sum_interval_ms), 0),
                   COALESCE(SUM(interval_samples), 0)
            FROM bucket_stats
            WHERE user_id = ? AND bucket_size_sec = ? AND bucket_start >= ? AND bucket_start < ?
            ",
            params![
                self.user_id,
                BUCKET_SIZE_SECS,
                range.start.timestamp(),
                range.end.timestamp(),
            ],
            |row| {
                Ok(BucketCounters {
                    total_keys: row.get(0)?,
                    backspace_count: row.get(1)?,
                    sum_interval_ms: row.get(2)?,
                    interval_samples: row.get(3)?,
                })
            },
        )?;
        Ok(counters)
    }

    /// Sums `total_keys` over the user's whole history.
    pub fn lifetime_total(&self) -> Result<i64, DbError> {
        let total = self.conn.query_row(
            "
            SELECT COALESCE(SUM(total_keys), 0)
            FROM bucket_stats
            WHERE user_id = ? AND bucket_size_sec = ?
            ",
            params![self.user_id, BUCKET_SIZE_SECS],
            |row| row.get(0),
        )?;
        Ok(total)
    }

    /// Per-key press counts, summed over the range (or all time), unordered.
    pub fn key_frequencies(&self, range: Option<&TimeRange>) -> Result<Vec<KeyCount>, DbError> {
        let (start, end) = bounds(range);
        if end <= start {
            return Ok(Vec::new());
        }
        let mut stmt = self.conn.prepare(
            "
            SELECT key_code, SUM(press_count) AS presses
            FROM key_buckets
            WHERE user_id = ? AND bucket_size_sec = ? AND bucket_start >= ? AND bucket_start < ?
            GROUP BY key_code
            HAVING presses > 0
            ",
        )?;
        let rows = stmt.query_map(
            params![self.user_id, BUCKET_SIZE_SECS, start, end],
            |row| {
                Ok(KeyCount {
                    label: row.get(0)?,
                    count: row.get(1)?,
                })
            },
        )?;
        let mut counts = Vec::new();
        for row in rows {
            counts.push(row?);
        }
        Ok(counts)
    }

    /// The `limit` most pressed keys in the range (or all time), ranked.
    pub fn top_keys(&self, range: Option<&TimeRange>, limit: usize) -> Result<Vec<KeyCount>, DbError> {
        let counts = self.key_frequencies(range)?;
        Ok(kt_core::top_keys(counts, limit))
    }

    /// One entry per local calendar day with at least one keystroke, ascending.
    pub fn daily_totals<Tz: TimeZone>(&self, tz: &Tz) -> Result<Vec<DayTotal>, DbError> {
        let mut days: BTreeMap<NaiveDate, i64> = BTreeMap::new();
        for (slot, total) in self.local_slots()? {
            let date = DateTime::from_timestamp(slot, 0)
                .ok_or(DbError::TimestampOutOfRange(slot))?
                .with_timezone(tz)
                .date_naive();
            *days.entry(date).or_insert(0) += total;
        }
        Ok(days
            .into_iter()
            .filter(|(_, total)| *total > 0)
            .map(|(date, total)| DayTotal { date, total })
            .collect())
    }

    /// Totals per local hour of day across all history.
    ///
    /// Only hours with activity are returned; see [`kt_core::fill_hours`].
    pub fn hourly_totals<Tz: TimeZone>(&self, tz: &Tz) -> Result<Vec<HourTotal>, DbError> {
        let mut hours: BTreeMap<u32, i64> = BTreeMap::new();
        for (slot, total) in self.local_slots()? {
            let hour = DateTime::from_timestamp(slot, 0)
                .ok_or(DbError::TimestampOutOfRange(slot))?
                .with_timezone(tz)
                .hour();
            *hours.entry(hour).or_insert(0) += total;
        }
        Ok(hours
            .into_iter()
            .map(|(hour, total)| HourTotal { hour, total })
            .collect())
    }

    /// Start times of every active minute within the range, ascending.
    pub fn minute_activity_marks(&self, range: &TimeRange) -> Result<Vec<i64>, DbError> {
        if range.is_empty() {
            return Ok(Vec::new());
        }
        let mut stmt = self.conn.prepare(
            "
            SELECT DISTINCT bucket_start
            FROM bucket_stats
            WHERE user_id = ? AND bucket_size_sec = ? AND bucket_start >= ? AND bucket_start < ?
              AND total_keys > 0
            ORDER BY bucket_start ASC
            ",
        )?;
        let rows = stmt.query_map(
            params![
                self.user_id,
                BUCKET_SIZE_SECS,
                range.start.timestamp(),
                range.end.timestamp(),
            ],
            |row| row.get(0),
        )?;
        let mut marks = Vec::new();
        for row in rows {
            marks.push(row?);
        }
        Ok(marks)
    }

    /// Stored minutes within the range (or all time), ascending.
    pub fn bucket_rows(&self, range: Option<&TimeRange>) -> Result<Vec<BucketRow>, DbError> {
        let (start, end) = bounds(range);
        if end <= start {
            return Ok(Vec::new());
        }
        let mut stmt = self.conn.prepare(
            "
            SELECT bucket_start, total_keys, backspace_count, sum_interval_ms, interval_samples
            FROM bucket_stats
            WHERE user_id = ? AND bucket_size_sec = ? AND bucket_start >= ? AND bucket_start < ?
            ORDER BY bucket_start ASC
            ",
        )?;
        let rows = stmt.query_map(
            params![self.user_id, BUCKET_SIZE_SECS, start, end],
            bucket_row_from,
        )?;
        let mut buckets = Vec::new();
        for row in rows {
            buckets.push(row?);
        }
        Ok(buckets)
    }

    /// Looks up the stored row for a single minute.
    pub fn bucket_row(&self, bucket_start: i64) -> Result<Option<BucketRow>, DbError> {
        let row = self
            .conn
            .query_row(
                "
                SELECT bucket_start, total_keys, backspace_count, sum_interval_ms, interval_samples
                FROM bucket_stats
                WHERE user_id = ? AND bucket_size_sec = ? AND bucket_start = ?
                ",
                params![self.user_id, BUCKET_SIZE_SECS, bucket_start],
                bucket_row_from,
            )
            .optional()?;
        Ok(row)
    }

    /// Most recent stored minute, if any.
    pub fn latest_bucket(&self) -> Result<Option<BucketRow>, DbError> {
        let row = self
            .conn
            .query_row(
                "
                SELECT bucket_start, total_keys, backspace_count, sum_interval_ms, interval_samples
                FROM bucket_stats
                WHERE user_id = ? AND bucket_size_sec = ?
                ORDER BY bucket_start DESC
                LIMIT 1
                ",
                params![self.user_id, BUCKET_SIZE_SECS],
                bucket_row_from,
            )
            .optional()?;
        Ok(row)
    }

    /// Totals pre-aggregated into 15-minute UTC slots, ascending.
    fn local_slots(&self) -> Result<Vec<(i64, i64)>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT bucket_start - (((bucket_start % ?1) + ?1) % ?1) AS slot, SUM(total_keys)
            FROM bucket_stats
            WHERE user_id = ?2 AND bucket_size_sec = ?3
            GROUP BY slot
            ORDER BY slot ASC
            ",
        )?;
        let rows = stmt.query_map(
            params![LOCAL_SLOT_SECS, self.user_id, BUCKET_SIZE_SECS],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        let mut slots = Vec::new();
        for row in rows {
            slots.push(row?);
        }
        Ok(slots)
    }
}

fn bucket_row_from(row: &rusqlite::Row<'_>) -> rusqlite::Result<BucketRow> {
    Ok(BucketRow {
        bucket_start: row.get(0)?,
        counters: BucketCounters {
            total_keys: row.get(1)?,
            backspace_count: row.get(2)?,
            sum_interval_ms: row.get(3)?,
            interval_samples: row.get(4)?,
        },
    })
}

fn bounds(range: Option<&TimeRange>) -> (i64, i64) {
    range.map_or((i64::MIN, i64::MAX), |r| {
        (r.start.timestamp(), r.end.timestamp())
    })
}

/// Converts an epoch-second bucket start to a UTC instant.
pub fn bucket_instant(bucket_start: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(bucket_start, 0)
}
