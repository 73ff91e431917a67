//! Hour-of-day activity extremes.

use serde::{Deserialize, Serialize};

/// Total keystrokes for one hour of the day (0-23, local time).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourTotal {
    pub hour: u32,
    pub total: i64,
}

/// Busiest and quietest hours across history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourlyExtremes {
    pub peak: HourTotal,
    pub quietest: HourTotal,
}

/// Expands sparse per-hour totals into 24 slots, filling gaps with zero.
///
/// Hours outside 0-23 are ignored; repeated hours are summed.
pub fn fill_hours(totals: &[HourTotal]) -> [i64; 24] {
    let mut slots = [0i64; 24];
    for entry in totals {
        if let Some(slot) = usize::try_from(entry.hour)
            .ok()
            .and_then(|hour| slots.get_mut(hour))
        {
            *slot += entry.total;
        }
    }
    slots
}

/// Picks the busiest and quietest hours. Ties go to the lowest hour.
///
/// Returns `None` when there is no recorded activity at all.
pub fn hourly_extremes(slots: &[i64; 24]) -> Option<HourlyExtremes> {
    if slots.iter().all(|total| *total == 0) {
        return None;
    }

    let mut peak = HourTotal { hour: 0, total: slots[0] };
    let mut quietest = peak;
    for (hour, &total) in (0u32..).zip(slots.iter()) {
        if total > peak.total {
            peak = HourTotal { hour, total };
        }
        if total < quietest.total {
            quietest = HourTotal { hour, total };
        }
    }

    Some(HourlyExtremes { peak, quietest })
}
