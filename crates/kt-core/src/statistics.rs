//! The statistics read-model handed to presentation code.
//!
//! Always recomputed from storage; never persisted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::focus::FocusSummary;
use crate::hourly::HourlyExtremes;
use crate::ranking::KeyCount;
use crate::streak::Streak;

/// Totals per statistics window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowTotals {
    pub today: i64,
    pub last_7_days: i64,
    pub last_30_days: i64,
    pub this_month: i64,
    pub last_month: i64,
    pub this_year: i64,
    pub lifetime: i64,
}

impl WindowTotals {
    /// Mean keys per day over the last 7 days, zero-activity days included.
    #[allow(clippy::cast_precision_loss)]
    pub fn average_7(&self) -> f64 {
        self.last_7_days as f64 / 7.0
    }

    /// Mean keys per day over the last 30 days, zero-activity days included.
    #[allow(clippy::cast_precision_loss)]
    pub fn average_30(&self) -> f64 {
        self.last_30_days as f64 / 30.0
    }
}

/// Everything the presentation layer shows about typing activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeypressStatistics {
    pub generated_at: DateTime<Utc>,
    pub timezone: String,
    pub totals: WindowTotals,
    pub average_7: f64,
    pub average_30: f64,
    pub longest_streak: Option<Streak>,
    pub current_streak: Option<Streak>,
    pub hourly: Option<HourlyExtremes>,
    pub top_keys_today: Vec<KeyCount>,
    pub top_keys_all_time: Vec<KeyCount>,
    pub focus_today: FocusSummary,
    pub idle_threshold_minutes: i64,
    /// Share of today's keystrokes that were backspace, `0.0..=1.0`.
    pub backspace_ratio_today: f64,
    /// Mean gap between keystrokes today, if any gaps were sampled.
    pub average_interval_ms_today: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn averages_use_fixed_denominators() {
        let totals = WindowTotals {
            last_7_days: 700,
            last_30_days: 600,
            ..WindowTotals::default()
        };
        assert!((totals.average_7() - 100.0).abs() < f64::EPSILON);
        assert!((totals.average_30() - 20.0).abs() < f64::EPSILON);
    }

    #[test]
    fn single_active_day_still_divides_by_seven() {
        let totals = WindowTotals {
            today: 140,
            last_7_days: 140,
            last_30_days: 140,
            ..WindowTotals::default()
        };
        assert!((totals.average_7() - 20.0).abs() < f64::EPSILON);
    }

    #[test]
    fn serializes_to_snake_case_json() {
        let stats = KeypressStatistics {
            generated_at: DateTime::from_timestamp(0, 0).unwrap(),
            timezone: "UTC".to_string(),
            totals: WindowTotals::default(),
            average_7: 0.0,
            average_30: 0.0,
            longest_streak: None,
            current_streak: None,
            hourly: None,
            top_keys_today: Vec::new(),
            top_keys_all_time: vec![KeyCount::new("A", 1)],
            focus_today: FocusSummary::default(),
            idle_threshold_minutes: 5,
            backspace_ratio_today: 0.0,
            average_interval_ms_today: None,
        };
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["totals"]["last_7_days"], 0);
        assert_eq!(json["top_keys_all_time"][0]["label"], "A");
        assert!(json["current_streak"].is_null());
    }
}
