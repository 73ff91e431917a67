//! Core domain logic for keystroke statistics.
//!
//! This crate contains the storage-independent pieces:
//! - Key labels: normalizing raw key identifiers and ordering them
//! - Buckets: accumulating keystrokes per minute and merging counters
//! - Analytics: streaks, focus/idle periods, hourly extremes, key rankings
//! - Windows: calendar and rolling ranges in the local time zone

pub mod bucket;
pub mod focus;
pub mod hourly;
pub mod key_label;
pub mod ranking;
pub mod statistics;
pub mod streak;
pub mod window;

pub use bucket::{
    BUCKET_SIZE_SECS, BucketAccumulator, BucketCounters, FlushedBucket, KeyEvent, bucket_start_for,
};
pub use focus::{DEFAULT_IDLE_THRESHOLD_MINUTES, FocusSummary, summarize_focus};
pub use hourly::{HourTotal, HourlyExtremes, fill_hours, hourly_extremes};
pub use key_label::{KeyCategory, normalize_label};
pub use ranking::{KeyCount, sort_key_counts, top_keys};
pub use statistics::{KeypressStatistics, WindowTotals};
pub use streak::{Streak, current_streak, longest_streak};
pub use window::{StatWindow, TimeRange, UnknownWindow};
