//! Focus and idle periods within a single day.
//!
//! Inputs are the distinct, ascending start times (epoch seconds) of every
//! minute bucket with recorded activity.

use serde::{Deserialize, Serialize};

use crate::bucket::BUCKET_SIZE_SECS;

/// Default gap, in minutes, after which a focus block ends.
pub const DEFAULT_IDLE_THRESHOLD_MINUTES: i64 = 5;

/// Focus and idle metrics for one day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FocusSummary {
    /// Number of distinct minutes with at least one keystroke.
    pub active_minutes: i64,
    /// Longest block of activity, in minutes, both end minutes inclusive.
    pub longest_focus_minutes: i64,
    /// Longest stretch without activity, in whole minutes.
    pub longest_idle_minutes: i64,
}

/// Computes focus and idle metrics.
///
/// `day_start` and `now` are epoch seconds. Marks outside `[day_start, now]`
/// are the caller's responsibility; they are not filtered here.
pub fn summarize_focus(
    marks: &[i64],
    day_start: i64,
    now: i64,
    idle_threshold_minutes: i64,
) -> FocusSummary {
    FocusSummary {
        active_minutes: i64::try_from(marks.len()).unwrap_or(i64::MAX),
        longest_focus_minutes: longest_focus_minutes(marks, idle_threshold_minutes),
        longest_idle_minutes: longest_idle_minutes(marks, day_start, now),
    }
}

/// Longest run of marks whose consecutive gaps stay within the threshold.
pub fn longest_focus_minutes(marks: &[i64], idle_threshold_minutes: i64) -> i64 {
    let Some((&first, rest)) = marks.split_first() else {
        return 0;
    };
    let threshold_secs = idle_threshold_minutes.max(0) * 60;
    let block_minutes = |start: i64, end: i64| (end - start) / 60 + 1;

    let mut block_start = first;
    let mut previous = first;
    let mut longest = 0;
    for &mark in rest {
        if mark - previous > threshold_secs {
            longest = longest.max(block_minutes(block_start, previous));
            block_start = mark;
        }
        previous = mark;
    }
    longest.max(block_minutes(block_start, previous))
}

/// Longest stretch without activity between `day_start` and `now`.
///
/// Considers the lead-in before the first mark, the gaps between marks beyond
/// the bucket width, and the tail from the last mark to `now`.
pub fn longest_idle_minutes(marks: &[i64], day_start: i64, now: i64) -> i64 {
    let (Some(&first), Some(&last)) = (marks.first(), marks.last()) else {
        return (now - day_start).max(0) / 60;
    };

    let lead_in = first - day_start;
    let between = marks
        .windows(2)
        .map(|pair| pair[1] - pair[0] - BUCKET_SIZE_SECS)
        .max()
        .unwrap_or(0);
    let tail = now - last;

    lead_in.max(between).max(tail).max(0) / 60
}
