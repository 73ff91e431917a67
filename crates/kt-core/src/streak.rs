//! Consecutive-day streaks.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A run of consecutive active days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Streak {
    /// Number of days in the run.
    pub length: u32,
    /// Last day of the run.
    pub ended_on: NaiveDate,
}

/// Finds the longest run of consecutive days in an ascending list.
///
/// Duplicate days are ignored. When two runs have the same length, the
/// earlier one wins.
pub fn longest_streak(days: &[NaiveDate]) -> Option<Streak> {
    let mut best: Option<Streak> = None;
    let mut run = 0u32;
    let mut previous: Option<NaiveDate> = None;

    for &day in days {
        run = match previous {
            Some(prev) if day == prev => continue,
            Some(prev) if prev.succ_opt() == Some(day) => run + 1,
            _ => 1,
        };
        previous = Some(day);
        if best.is_none_or(|b| run > b.length) {
            best = Some(Streak {
                length: run,
                ended_on: day,
            });
        }
    }

    best
}

/// Returns the streak that includes `today`, if the latest active day is today.
///
/// A streak whose last day is yesterday is already broken.
pub fn current_streak(days: &[NaiveDate], today: NaiveDate) -> Option<Streak> {
    if days.last() != Some(&today) {
        return None;
    }

    let mut length = 0u32;
    let mut expected = today;
    for &day in days.iter().rev() {
        if day == expected {
            length += 1;
            match expected.pred_opt() {
                Some(prev) => expected = prev,
                None => break,
            }
        } else if day < expected {
            break;
        }
    }

    Some(Streak {
        length,
        ended_on: today,
    })
}
