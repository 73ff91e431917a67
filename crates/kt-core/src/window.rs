//! Calendar and rolling time windows.
//!
//! All windows are half-open `[start, end)` intervals expressed in UTC, but
//! their boundaries are computed from local calendar days in the caller's
//! time zone.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, LocalResult, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// A half-open time range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub const fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

/// Named statistics windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatWindow {
    Today,
    Last7Days,
    Last30Days,
    ThisMonth,
    LastMonth,
    ThisYear,
    Lifetime,
}

impl StatWindow {
    /// Resolves the window relative to `now`.
    ///
    /// Returns `None` for [`StatWindow::Lifetime`], which has no lower bound.
    pub fn range<Tz: TimeZone>(self, now: &DateTime<Tz>) -> Option<TimeRange> {
        let tz = now.timezone();
        let today = now.date_naive();
        let now_utc = now.with_timezone(&Utc);
        let trailing = |days: i64| {
            let first = today - Duration::days(days - 1);
            TimeRange::new(local_midnight(&tz, first), now_utc)
        };

        let range = match self {
            Self::Today => trailing(1),
            Self::Last7Days => trailing(7),
            Self::Last30Days => trailing(30),
            Self::ThisMonth => TimeRange::new(local_midnight(&tz, month_start(today)), now_utc),
            Self::LastMonth => {
                let this_month = month_start(today);
                let previous = month_start(this_month - Duration::days(1));
                TimeRange::new(local_midnight(&tz, previous), local_midnight(&tz, this_month))
            }
            Self::ThisYear => {
                let jan_first = today.with_ordinal(1).unwrap_or(today);
                TimeRange::new(local_midnight(&tz, jan_first), now_utc)
            }
            Self::Lifetime => return None,
        };
        Some(range)
    }
}

impl fmt::Display for StatWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Today => "today",
            Self::Last7Days => "7d",
            Self::Last30Days => "30d",
            Self::ThisMonth => "month",
            Self::LastMonth => "last-month",
            Self::ThisYear => "year",
            Self::Lifetime => "all",
        };
        write!(f, "{s}")
    }
}

impl FromStr for StatWindow {
    type Err = UnknownWindow;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "today" => Ok(Self::Today),
            "7d" | "week" | "last7days" => Ok(Self::Last7Days),
            "30d" | "last30days" => Ok(Self::Last30Days),
            "month" | "this-month" => Ok(Self::ThisMonth),
            "last-month" | "lastmonth" => Ok(Self::LastMonth),
            "year" | "this-year" => Ok(Self::ThisYear),
            "all" | "lifetime" | "all-time" => Ok(Self::Lifetime),
            _ => Err(UnknownWindow(s.to_string())),
        }
    }
}

/// Error type for unrecognized window names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownWindow(String);

impl fmt::Display for UnknownWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown window: {} (expected today, 7d, 30d, month, last-month, year or all)",
            self.0
        )
    }
}

impl std::error::Error for UnknownWindow {}

/// Converts a local date at midnight to UTC.
///
/// Ambiguous midnights (DST fall-back) resolve to the earlier instant; a
/// midnight skipped by a DST jump resolves to the first valid instant after it.
pub fn local_midnight<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> DateTime<Utc> {
    let midnight = date.and_time(NaiveTime::MIN);
    match tz.from_local_datetime(&midnight) {
        LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => dt.with_timezone(&Utc),
        LocalResult::None => {
            // Spring-forward gaps are at most a few hours; probe forward by the minute.
            (1..=24 * 60)
                .find_map(|minutes| {
                    tz.from_local_datetime(&(midnight + Duration::minutes(minutes)))
                        .earliest()
                })
                .map_or_else(
                    || DateTime::from_naive_utc_and_offset(midnight, Utc),
                    |dt| dt.with_timezone(&Utc),
                )
        }
    }
}

/// Local calendar date of an epoch-second instant.
pub fn local_date<Tz: TimeZone>(tz: &Tz, epoch_secs: i64) -> Option<NaiveDate> {
    DateTime::from_timestamp(epoch_secs, 0).map(|dt| dt.with_timezone(tz).date_naive())
}

fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}
