use chrono::{Datelike, NaiveDate, Weekday};
use std::collections::HashSet;

use crate::errors::AppError;

/// A payroll/attendance month written as `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthSpan {
    pub first: NaiveDate,
    pub last: NaiveDate,
}

impl MonthSpan {
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        let invalid = || AppError::BadRequest(format!("Invalid month '{raw}', expected YYYY-MM"));
        let (year, month) = raw.trim().split_once('-').ok_or_else(invalid)?;
        let year: i32 = year.parse().map_err(|_| invalid())?;
        let month: u32 = month.parse().map_err(|_| invalid())?;
        let first = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(invalid)?;
        let next = if month == 12 {
            NaiveDate::from_ymd_opt(year + 1, 1, 1)
        } else {
            NaiveDate::from_ymd_opt(year, month + 1, 1)
        }
        .ok_or_else(invalid)?;
        let last = next.pred_opt().ok_or_else(invalid)?;
        Ok(MonthSpan { first, last })
    }

    pub fn label(&self) -> String {
        self.first.format("%Y-%m").to_string()
    }

    pub fn days(&self) -> i64 {
        (self.last - self.first).num_days() + 1
    }

    /// Inclusive overlap with `[start, end]` in days.
    pub fn overlap_days(&self, start: NaiveDate, end: NaiveDate) -> i64 {
        let from = start.max(self.first);
        let to = end.min(self.last);
        if to < from {
            0
        } else {
            (to - from).num_days() + 1
        }
    }
}

/// Working days between two dates, skipping Sundays and listed holidays.
pub fn working_days_between(start: NaiveDate, end: NaiveDate, holidays: &HashSet<NaiveDate>) -> i64 {
    start
        .iter_days()
        .take_while(|day| *day <= end)
        .filter(|day| day.weekday() != Weekday::Sun && !holidays.contains(day))
        .count() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn parses_month_boundaries() {
        let feb = MonthSpan::parse("2024-02").unwrap();
        assert_eq!(feb.first, date(2024, 2, 1));
        assert_eq!(feb.last, date(2024, 2, 29));
        assert_eq!(feb.days(), 29);

        let dec = MonthSpan::parse("2023-12").unwrap();
        assert_eq!(dec.last, date(2023, 12, 31));
        assert_eq!(dec.label(), "2023-12");
    }

    #[test]
    fn rejects_malformed_months() {
        assert!(MonthSpan::parse("2024").is_err());
        assert!(MonthSpan::parse("2024-13").is_err());
        assert!(MonthSpan::parse("abcd-01").is_err());
    }

    #[test]
    fn overlap_is_clamped_to_month() {
        let march = MonthSpan::parse("2024-03").unwrap();
        assert_eq!(march.overlap_days(date(2024, 2, 27), date(2024, 3, 2)), 2);
        assert_eq!(march.overlap_days(date(2024, 4, 1), date(2024, 4, 3)), 0);
    }

    #[test]
    fn working_days_skip_sundays_and_holidays() {
        // 2024-03-04 is a Monday; 2024-03-10 is a Sunday.
        let holidays = HashSet::from([date(2024, 3, 8)]);
        assert_eq!(working_days_between(date(2024, 3, 4), date(2024, 3, 10), &holidays), 5);
        assert_eq!(working_days_between(date(2024, 3, 10), date(2024, 3, 10), &HashSet::new()), 0);
    }
}
