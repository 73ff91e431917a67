//! The aggregation engine: a single worker thread that owns the open bucket
//! and the database connection.
//!
//! Every mutation and every read is a [`Command`] processed strictly in order
//! by the worker, so appends, scheduled flushes, explicit flushes and queries
//! are totally ordered against each other without any locking.
//!
//! # Flush triggers
//!
//! 1. An event for a later minute arrives: the open bucket is flushed before
//!    the new one opens.
//! 2. The scheduled tick fires: each bucket schedules a `FlushTick` for
//!    `bucket_end + grace`. A tick only acts if the bucket it was scheduled
//!    for is still the open one; otherwise it is stale and ignored.
//! 3. An explicit flush: `flush_pending`, any read, or shutdown.
//!
//! A bucket is taken out of its slot before it is written. If the write fails
//! the minute is logged and dropped; it is never retried.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use chrono::{DateTime, Local, TimeZone, Utc};
use kt_core::{
    BUCKET_SIZE_SECS, BucketAccumulator, KeyCount, KeyEvent, KeypressStatistics, TimeRange,
    bucket_start_for, normalize_label,
};
use kt_db::{BucketRow, Database, DbError};
use thiserror::Error;

use crate::stats::{self, SnapshotOptions, StoreStatus};

/// Shortest delay before a scheduled flush tick fires.
pub const MIN_TICK_DELAY: Duration = Duration::from_millis(100);

/// Engine errors.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The database could not be opened or initialized.
    #[error("failed to open keystroke store: {0}")]
    Open(#[from] DbError),
    /// The worker thread has exited and can no longer answer.
    #[error("aggregation worker is not running")]
    WorkerStopped,
    /// The worker thread could not be started.
    #[error("failed to spawn aggregation worker: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Configuration for the aggregation engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Extra time after a minute ends before its scheduled flush fires.
    /// Default: 500ms.
    pub flush_grace: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            flush_grace: Duration::from_millis(500),
        }
    }
}

/// Messages processed by the worker, in arrival order.
enum Command {
    Append(KeyEvent),
    FlushTick {
        bucket_start: i64,
    },
    FlushNow {
        reply: Sender<()>,
    },
    Total {
        range: Option<TimeRange>,
        reply: Sender<i64>,
    },
    KeyFrequencies {
        range: Option<TimeRange>,
        reply: Sender<Vec<KeyCount>>,
    },
    Snapshot {
        now: DateTime<Utc>,
        options: SnapshotOptions,
        reply: Sender<KeypressStatistics>,
    },
    BucketRows {
        range: Option<TimeRange>,
        reply: Sender<Vec<BucketRow>>,
    },
    Status {
        reply: Sender<StoreStatus>,
    },
    Shutdown,
}

/// Handle to the aggregation worker.
///
/// Dropping the handle flushes pending data and joins the worker.
pub struct Engine {
    tx: Sender<Command>,
    worker: Option<JoinHandle<()>>,
}

/// Cloneable, fire-and-forget event sink for producer threads.
#[derive(Clone)]
pub struct EventSender {
    tx: Sender<Command>,
}

impl EventSender {
    /// Queues an event; never blocks.
    pub fn append(&self, event: KeyEvent) {
        if self.tx.send(Command::Append(event)).is_err() {
            tracing::warn!("aggregation worker stopped; dropping keystroke");
        }
    }
}

impl Engine {
    /// Opens the database at `path` and starts a worker in the local time zone.
    pub fn open(
        path: &std::path::Path,
        user_id: &str,
        config: EngineConfig,
    ) -> Result<Self, EngineError> {
        let db = Database::open(path)?.for_user(user_id);
        Self::start(db, config)
    }

    /// Starts a worker over an already opened database, in the local time zone.
    pub fn start(db: Database, config: EngineConfig) -> Result<Self, EngineError> {
        let timezone = iana_time_zone::get_timezone().unwrap_or_else(|err| {
            tracing::debug!(error = %err, "could not resolve local time zone name");
            "Local".to_string()
        });
        Self::start_in(db, config, Local, timezone)
    }

    /// Starts a worker whose minute alignment and calendar use `tz`.
    pub fn start_in<Tz>(
        db: Database,
        config: EngineConfig,
        tz: Tz,
        timezone_name: impl Into<String>,
    ) -> Result<Self, EngineError>
    where
        Tz: TimeZone + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        let worker = Worker {
            db,
            tz,
            timezone_name: timezone_name.into(),
            config,
            open: None,
            next_tick: None,
        };
        let handle = thread::Builder::new()
            .name("kt-aggregator".to_string())
            .spawn(move || worker.run(&rx))
            .map_err(EngineError::Spawn)?;
        Ok(Self {
            tx,
            worker: Some(handle),
        })
    }

    /// Queues a keystroke; never blocks the caller.
    pub fn append(&self, event: KeyEvent) {
        self.sender().append(event);
    }

    /// Returns a cloneable sink for producers on other threads.
    pub fn sender(&self) -> EventSender {
        EventSender {
            tx: self.tx.clone(),
        }
    }

    /// Persists the open bucket, waiting until the write has been attempted.
    pub fn flush_pending(&self) -> Result<(), EngineError> {
        self.request(|reply| Command::FlushNow { reply })
    }

    /// Total keystrokes in the range, or over all history when `None`.
    pub fn total(&self, range: Option<TimeRange>) -> Result<i64, EngineError> {
        self.request(|reply| Command::Total { range, reply })
    }

    /// Per-key counts in the range, in display order.
    pub fn key_frequencies(&self, range: Option<TimeRange>) -> Result<Vec<KeyCount>, EngineError> {
        self.request(|reply| Command::KeyFrequencies { range, reply })
    }

    /// Stored per-minute rows in the range, oldest first.
    pub fn bucket_rows(&self, range: Option<TimeRange>) -> Result<Vec<BucketRow>, EngineError> {
        self.request(|reply| Command::BucketRows { range, reply })
    }

    /// Lifetime total and latest stored minute.
    pub fn status(&self) -> Result<StoreStatus, EngineError> {
        self.request(|reply| Command::Status { reply })
    }

    /// Full statistics as of now.
    pub fn statistics_snapshot(
        &self,
        max_key_results: usize,
        idle_threshold_minutes: i64,
    ) -> Result<KeypressStatistics, EngineError> {
        let options = SnapshotOptions {
            max_key_results,
            idle_threshold_minutes,
        };
        self.statistics_snapshot_at(Utc::now(), options)
    }

    /// Full statistics as of `now`.
    pub fn statistics_snapshot_at(
        &self,
        now: DateTime<Utc>,
        options: SnapshotOptions,
    ) -> Result<KeypressStatistics, EngineError> {
        self.request(|reply| Command::Snapshot {
            now,
            options,
            reply,
        })
    }

    /// Flushes pending data and stops the worker.
    pub fn shutdown(mut self) -> Result<(), EngineError> {
        self.stop()
    }

    fn stop(&mut self) -> Result<(), EngineError> {
        let Some(handle) = self.worker.take() else {
            return Ok(());
        };
        // The worker also flushes when the channel closes, so a failed send is fine.
        let _ = self.tx.send(Command::Shutdown);
        handle.join().map_err(|_| EngineError::WorkerStopped)
    }

    fn request<T>(&self, build: impl FnOnce(Sender<T>) -> Command) -> Result<T, EngineError> {
        let (reply, rx) = mpsc::channel();
        self.tx
            .send(build(reply))
            .map_err(|_| EngineError::WorkerStopped)?;
        rx.recv().map_err(|_| EngineError::WorkerStopped)
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if let Err(err) = self.stop() {
            tracing::error!(error = %err, "aggregation worker did not stop cleanly");
        }
    }
}

/// A flush scheduled for the end of a specific bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ScheduledTick {
    bucket_start: i64,
    due: Instant,
}

struct Worker<Tz: TimeZone> {
    db: Database,
    tz: Tz,
    timezone_name: String,
    config: EngineConfig,
    open: Option<BucketAccumulator>,
    next_tick: Option<ScheduledTick>,
}

impl<Tz: TimeZone> Worker<Tz> {
    fn run(mut self, rx: &Receiver<Command>) {
        tracing::debug!(timezone = %self.timezone_name, "aggregation worker started");
        loop {
            let command = match self.next_tick {
                Some(tick) => {
                    let wait = tick.due.saturating_duration_since(Instant::now());
                    match rx.recv_timeout(wait) {
                        Ok(command) => command,
                        Err(RecvTimeoutError::Timeout) => {
                            self.next_tick = None;
                            Command::FlushTick {
                                bucket_start: tick.bucket_start,
                            }
                        }
                        Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                None => match rx.recv() {
                    Ok(command) => command,
                    Err(_) => break,
                },
            };
            if !self.handle(command) {
                break;
            }
        }
        self.flush("shutdown");
        tracing::debug!("aggregation worker stopped");
    }

    /// Processes one command. Returns false when the worker should stop.
    fn handle(&mut self, command: Command) -> bool {
        match command {
            Command::Append(event) => self.append(&event),
            Command::FlushTick { bucket_start } => self.flush_tick(bucket_start),
            Command::FlushNow { reply } => {
                self.flush("explicit");
                let _ = reply.send(());
            }
            Command::Total { range, reply } => {
                self.flush("query");
                let _ = reply.send(stats::range_total(&self.db, range.as_ref()));
            }
            Command::KeyFrequencies { range, reply } => {
                self.flush("query");
                let _ = reply.send(stats::sorted_key_frequencies(&self.db, range.as_ref()));
            }
            Command::Snapshot {
                now,
                options,
                reply,
            } => {
                self.flush("query");
                let now = now.with_timezone(&self.tz);
                let snapshot =
                    stats::compute_statistics(&self.db, &now, &self.timezone_name, options);
                let _ = reply.send(snapshot);
            }
            Command::BucketRows { range, reply } => {
                self.flush("query");
                let _ = reply.send(stats::bucket_rows(&self.db, range.as_ref()));
            }
            Command::Status { reply } => {
                self.flush("query");
                let _ = reply.send(stats::store_status(&self.db));
            }
            Command::Shutdown => return false,
        }
        true
    }

    fn append(&mut self, event: &KeyEvent) {
        let label = normalize_label(&event.label);
        let bucket_start = bucket_start_for(event.timestamp, &self.tz);

        // Later minutes rotate the bucket; late events fold into the open one.
        if self
            .open
            .as_ref()
            .is_some_and(|open| bucket_start > open.start())
        {
            self.flush("boundary");
        }

        if self.open.is_none() {
            self.open = Some(BucketAccumulator::new(bucket_start));
            self.schedule_tick(bucket_start);
        }
        if let Some(open) = self.open.as_mut() {
            open.record(event.timestamp, &label);
        }
    }

    fn schedule_tick(&mut self, bucket_start: i64) {
        let bucket_end_ms = (bucket_start + BUCKET_SIZE_SECS).saturating_mul(1000);
        let until_end_ms = bucket_end_ms - Utc::now().timestamp_millis();
        let delay = Duration::from_millis(u64::try_from(until_end_ms).unwrap_or(0))
            .saturating_add(self.config.flush_grace)
            .max(MIN_TICK_DELAY);
        self.next_tick = Some(ScheduledTick {
            bucket_start,
            due: Instant::now() + delay,
        });
    }

    fn flush_tick(&mut self, bucket_start: i64) {
        let is_current = self
            .open
            .as_ref()
            .is_some_and(|open| open.start() == bucket_start);
        if is_current {
            self.flush("tick");
        } else {
            tracing::trace!(bucket_start, "stale flush tick ignored");
        }
    }

    fn flush(&mut self, reason: &'static str) {
        // Take the bucket out first so nothing can keep mutating it.
        let Some(open) = self.open.take() else {
            return;
        };
        if open.is_empty() {
            return;
        }

        let bucket = open.into_flushed();
        match self.db.persist_bucket(&bucket) {
            Ok(()) => tracing::debug!(
                reason,
                bucket_start = bucket.bucket_start,
                total_keys = bucket.counters.total_keys,
                "bucket flushed"
            ),
            Err(err) => tracing::error!(
                reason,
                bucket_start = bucket.bucket_start,
                total_keys = bucket.counters.total_keys,
                error = %err,
                "failed to persist bucket; dropping it"
            ),
        }
    }
}
