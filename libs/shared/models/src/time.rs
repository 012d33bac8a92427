//! Wall-clock time ranges used by the slot, conflict and timeline rules.
//!
//! All ranges are half-open `[start, end)` on a single calendar day. Times carry
//! no timezone; the booking backend and this service share one fixed local offset.

use chrono::{Duration, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

pub const TIME_FORMAT: &str = "%H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeRange {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    pub fn is_valid(&self) -> bool {
        self.start < self.end
    }

    /// Ranges that merely touch (`a.end == b.start`) do not overlap.
    pub fn overlaps(&self, other: &TimeRange) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains(&self, other: &TimeRange) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }
}

/// Adds minutes without wrapping; `None` when the result passes midnight.
pub fn add_minutes(time: NaiveTime, minutes: i64) -> Option<NaiveTime> {
    let (result, overflow) = time.overflowing_add_signed(Duration::minutes(minutes));
    if overflow != 0 {
        None
    } else {
        Some(result)
    }
}

/// Rounds up to the next multiple of `granularity` minutes; `None` past midnight.
pub fn quantize_up(time: NaiveTime, granularity: i64) -> Option<NaiveTime> {
    if granularity <= 0 {
        return Some(time);
    }
    let seconds = i64::from(time.num_seconds_from_midnight());
    let step = granularity * 60;
    let rounded = (seconds + step - 1) / step * step;
    if rounded >= 24 * 3600 {
        return None;
    }
    NaiveTime::from_num_seconds_from_midnight_opt(rounded as u32, 0)
}

pub fn format_hms(time: NaiveTime) -> String {
    time.format(TIME_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn adjacent_ranges_do_not_overlap() {
        let a = TimeRange::new(t(9, 0), t(9, 30));
        let b = TimeRange::new(t(9, 30), t(10, 0));
        let c = TimeRange::new(t(9, 15), t(9, 45));

        assert!(!a.overlaps(&b));
        assert!(!b.overlaps(&a));
        assert!(a.overlaps(&c));
        assert!(c.overlaps(&b));
    }

    #[test]
    fn containment_is_inclusive_of_edges() {
        let day = TimeRange::new(t(7, 0), t(17, 0));
        assert!(day.contains(&TimeRange::new(t(7, 0), t(7, 10))));
        assert!(day.contains(&TimeRange::new(t(16, 50), t(17, 0))));
        assert!(!day.contains(&TimeRange::new(t(16, 55), t(17, 5))));
    }

    #[test]
    fn quantize_rounds_up_to_boundary() {
        assert_eq!(quantize_up(t(9, 0), 10), Some(t(9, 0)));
        assert_eq!(quantize_up(t(9, 1), 10), Some(t(9, 10)));
        assert_eq!(quantize_up(t(9, 59), 10), Some(t(10, 0)));
        assert_eq!(quantize_up(t(23, 55), 10), None);
    }

    #[test]
    fn add_minutes_refuses_to_wrap() {
        assert_eq!(add_minutes(t(9, 0), 20), Some(t(9, 20)));
        assert_eq!(add_minutes(t(23, 50), 20), None);
    }

    #[test]
    fn formats_with_seconds() {
        assert_eq!(format_hms(t(9, 5)), "09:05:00");
        assert_eq!(TimeRange::new(t(9, 0), t(9, 35)).duration_minutes(), 35);
    }
}
