//! Calendar / Service: decides whether a service runs on a given date.
//!
//! Dates are compact `YYYYMMDD` integers so that date comparison and map
//! lookups stay O(1) integer operations; day-of-week and
//! day-arithmetic, which are awkward to get right by hand (leap years,
//! month lengths), are delegated to `chrono` internally and never leak past
//! this module's boundary — grounded on `platy-transit-radar`'s `gtfstime`
//! module, which does the same `chrono`-backed civil-calendar plumbing
//! behind a GTFS-shaped public type.

use std::collections::HashMap;

use chrono::{Datelike, NaiveDate};

/// Compact `YYYYMMDD` date, e.g. `20250101` for 2025-01-01.
pub type Date = i32;

/// Sunday = 0 .. Saturday = 6.
pub type DayOfWeek = u8;

/// Splits a compact date into (year, month, day).
fn split(date: Date) -> (i32, u32, u32) {
    let year = date / 10_000;
    let month = (date / 100) % 100;
    let day = date % 100;
    (year, month as u32, day as u32)
}

fn to_naive(date: Date) -> NaiveDate {
    let (y, m, d) = split(date);
    NaiveDate::from_ymd_opt(y, m, d).unwrap_or_else(|| panic!("invalid calendar date {date}"))
}

fn from_naive(date: NaiveDate) -> Date {
    date.year() * 10_000 + date.month() as i32 * 100 + date.day() as i32
}

/// Day of week for a compact date, Sunday = 0.
pub fn day_of_week(date: Date) -> DayOfWeek {
    to_naive(date).weekday().num_days_from_sunday() as u8
}

/// Adds (or subtracts, for negative `delta_days`) whole days to a compact
/// date, returning the new date and day-of-week together since the
/// multi-day query (`query.rs`) always needs both.
pub fn shift_days(date: Date, delta_days: i64) -> (Date, DayOfWeek) {
    let shifted = to_naive(date) + chrono::Duration::days(delta_days);
    (from_naive(shifted), shifted.weekday().num_days_from_sunday() as u8)
}

/// A GTFS `calendar.txt` + `calendar_dates.txt` service definition.
///
/// An explicit `include`/`exclude` date entry always wins over the
/// weekday mask, and the weekday mask only applies within
/// `[start_date, end_date]`.
#[derive(Debug, Clone)]
pub struct Service {
    pub start_date: Date,
    pub end_date: Date,
    /// Indexed Sunday = 0 .. Saturday = 6.
    pub weekday_mask: [bool; 7],
    /// Dates added outside the weekday mask (`calendar_dates.txt`
    /// `exception_type = 1`).
    pub include_dates: Vec<Date>,
    /// Dates removed even though the weekday mask would otherwise apply
    /// (`exception_type = 2`).
    pub exclude_dates: Vec<Date>,
}

impl Service {
    pub fn runs_on(&self, date: Date, day_of_week: DayOfWeek) -> bool {
        if self.include_dates.contains(&date) {
            return true;
        }
        if self.exclude_dates.contains(&date) {
            return false;
        }
        (self.start_date..=self.end_date).contains(&date)
            && self.weekday_mask[day_of_week as usize]
    }
}

/// All services known to the timetable, keyed by the dense `ServiceIndex`
/// assigned at preparation time.
#[derive(Debug, Clone, Default)]
pub struct Calendar {
    services: Vec<Service>,
}

impl Calendar {
    pub fn new(services: Vec<Service>) -> Self {
        Self { services }
    }

    pub fn runs_on(&self, service: u32, date: Date, day_of_week: DayOfWeek) -> bool {
        self.services[service as usize].runs_on(date, day_of_week)
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

/// Convenience lookup from a GTFS `service_id` string to the dense index
/// assigned during preparation; used only by the loading boundary.
pub type ServiceIdMap = HashMap<String, u32>;

#[cfg(test)]
mod tests {
    use super::*;

    fn weekdays(days: &[usize]) -> [bool; 7] {
        let mut mask = [false; 7];
        for &d in days {
            mask[d] = true;
        }
        mask
    }

    #[test]
    fn weekday_mask_within_range() {
        let service = Service {
            start_date: 20250101,
            end_date: 20250131,
            weekday_mask: weekdays(&[1, 2, 3, 4, 5]), // Mon..Fri
            include_dates: vec![],
            exclude_dates: vec![],
        };
        // 2025-01-06 is a Monday.
        assert_eq!(day_of_week(20250106), 1);
        assert!(service.runs_on(20250106, 1));
        // 2025-01-05 is a Sunday.
        assert_eq!(day_of_week(20250105), 0);
        assert!(!service.runs_on(20250105, 0));
    }

    #[test]
    fn outside_date_range_never_runs() {
        let service = Service {
            start_date: 20250101,
            end_date: 20250131,
            weekday_mask: weekdays(&[0, 1, 2, 3, 4, 5, 6]),
            include_dates: vec![],
            exclude_dates: vec![],
        };
        assert!(!service.runs_on(20250201, day_of_week(20250201)));
    }

    #[test]
    fn exclude_overrides_mask() {
        let service = Service {
            start_date: 20250101,
            end_date: 20250131,
            weekday_mask: weekdays(&[0, 1, 2, 3, 4, 5, 6]),
            include_dates: vec![],
            exclude_dates: vec![20250115],
        };
        assert!(!service.runs_on(20250115, day_of_week(20250115)));
    }

    #[test]
    fn include_overrides_mask() {
        let service = Service {
            start_date: 20250101,
            end_date: 20250131,
            weekday_mask: weekdays(&[]),
            include_dates: vec![20250115],
            exclude_dates: vec![],
        };
        assert!(service.runs_on(20250115, day_of_week(20250115)));
    }

    #[test]
    fn shift_days_crosses_month_boundary() {
        let (date, dow) = shift_days(20250131, 1);
        assert_eq!(date, 20250201);
        assert_eq!(dow, day_of_week(20250201));
    }

    #[test]
    fn shift_days_negative() {
        let (date, _) = shift_days(20250101, -1);
        assert_eq!(date, 20241231);
    }
}
