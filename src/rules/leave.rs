use chrono::{Datelike, NaiveDate};
use std::collections::HashSet;

use super::calendar::working_days_between;
use crate::errors::AppError;

/// Chargeable days for a leave request. Sundays and holidays are free.
pub fn chargeable_days(
    start: NaiveDate,
    end: NaiveDate,
    half_day: bool,
    holidays: &HashSet<NaiveDate>,
) -> Result<f64, AppError> {
    if end < start {
        return Err(AppError::BadRequest(
            "End date must not be before start date".to_owned(),
        ));
    }
    if start.year() != end.year() {
        return Err(AppError::BadRequest(
            "Leave cannot span two calendar years; apply separately".to_owned(),
        ));
    }
    if half_day && start != end {
        return Err(AppError::BadRequest(
            "Half-day leave must start and end on the same date".to_owned(),
        ));
    }

    let days = working_days_between(start, end, holidays) as f64;
    let days = if half_day { days * 0.5 } else { days };
    if days <= 0.0 {
        return Err(AppError::BadRequest(
            "Requested range contains no working days".to_owned(),
        ));
    }
    Ok(days)
}

/// Rejects a request that would overdraw the balance once pending requests are counted.
pub fn ensure_balance(requested: f64, allocated: f64, used: f64, pending: f64) -> Result<(), AppError> {
    let available = allocated - used - pending;
    if requested > available {
        return Err(AppError::BadRequest(format!(
            "Insufficient leave balance: requested {requested}, available {available}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, d).unwrap()
    }

    #[test]
    fn counts_working_days_only() {
        // Thu 2024-03-07 .. Mon 2024-03-11 with the Friday a holiday.
        let holidays = HashSet::from([date(3, 8)]);
        assert_eq!(chargeable_days(date(3, 7), date(3, 11), false, &holidays).unwrap(), 3.0);
    }

    #[test]
    fn half_day_is_half() {
        assert_eq!(chargeable_days(date(3, 7), date(3, 7), true, &HashSet::new()).unwrap(), 0.5);
        assert!(chargeable_days(date(3, 7), date(3, 8), true, &HashSet::new()).is_err());
    }

    #[test]
    fn rejects_inverted_sunday_only_and_cross_year_ranges() {
        assert!(chargeable_days(date(3, 8), date(3, 7), false, &HashSet::new()).is_err());
        assert!(chargeable_days(date(3, 10), date(3, 10), false, &HashSet::new()).is_err());
        let dec = NaiveDate::from_ymd_opt(2023, 12, 30).unwrap();
        assert!(chargeable_days(dec, date(1, 2), false, &HashSet::new()).is_err());
    }

    #[test]
    fn pending_requests_reserve_balance() {
        assert!(ensure_balance(2.0, 12.0, 8.0, 2.0).is_ok());
        assert!(ensure_balance(2.5, 12.0, 8.0, 2.0).is_err());
    }
}
