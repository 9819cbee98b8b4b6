use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};

use super::round2;
use crate::{
    errors::AppError,
    structs::{attendance::AttendanceStatus, org::Shift},
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShiftRules {
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub grace_minutes: i64,
    pub half_day_hours: f64,
    pub full_day_hours: f64,
}

impl Default for ShiftRules {
    fn default() -> Self {
        ShiftRules {
            start: NaiveTime::from_hms_opt(9, 0, 0).unwrap_or_default(),
            end: NaiveTime::from_hms_opt(18, 0, 0).unwrap_or_default(),
            grace_minutes: 15,
            half_day_hours: 4.0,
            full_day_hours: 8.0,
        }
    }
}

impl From<&Shift> for ShiftRules {
    fn from(shift: &Shift) -> Self {
        ShiftRules {
            start: shift.start_time,
            end: shift.end_time,
            grace_minutes: shift.grace_minutes,
            half_day_hours: shift.half_day_hours,
            full_day_hours: shift.full_day_hours,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PunchOutcome {
    pub status: AttendanceStatus,
    pub worked_hours: f64,
    pub overtime_hours: f64,
}

impl ShiftRules {
    /// Night shifts end on the day after their work date.
    pub fn crosses_midnight(&self) -> bool {
        self.end <= self.start
    }

    pub fn shift_end(&self, work_date: NaiveDate) -> NaiveDateTime {
        let end = work_date.and_time(self.end);
        if self.crosses_midnight() {
            end + Duration::days(1)
        } else {
            end
        }
    }

    pub fn is_late(&self, punch_in: NaiveDateTime) -> bool {
        let cutoff = punch_in.date().and_time(self.start) + Duration::minutes(self.grace_minutes);
        punch_in > cutoff
    }

    pub fn status_on_punch_in(&self, punch_in: NaiveDateTime) -> AttendanceStatus {
        if self.is_late(punch_in) {
            AttendanceStatus::Late
        } else {
            AttendanceStatus::Present
        }
    }

    /// Final status once both punches are known.
    pub fn evaluate(
        &self,
        punch_in: NaiveDateTime,
        punch_out: NaiveDateTime,
    ) -> Result<PunchOutcome, AppError> {
        if punch_out <= punch_in {
            return Err(AppError::BadRequest(
                "Punch-out must be after punch-in".to_owned(),
            ));
        }
        let worked_hours = round2((punch_out - punch_in).num_seconds() as f64 / 3600.0);
        let status = if worked_hours < self.half_day_hours {
            AttendanceStatus::Absent
        } else if worked_hours < self.full_day_hours {
            AttendanceStatus::HalfDay
        } else {
            self.status_on_punch_in(punch_in)
        };
        let overtime_hours = round2((worked_hours - self.full_day_hours).max(0.0));
        Ok(PunchOutcome {
            status,
            worked_hours,
            overtime_hours,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 4)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn grace_period_is_inclusive() {
        let rules = ShiftRules::default();
        assert_eq!(rules.status_on_punch_in(at(9, 15)), AttendanceStatus::Present);
        assert_eq!(rules.status_on_punch_in(at(9, 16)), AttendanceStatus::Late);
    }

    #[test]
    fn short_days_degrade_status() {
        let rules = ShiftRules::default();
        let half = rules.evaluate(at(9, 0), at(14, 0)).unwrap();
        assert_eq!(half.status, AttendanceStatus::HalfDay);
        assert_eq!(half.worked_hours, 5.0);

        let absent = rules.evaluate(at(9, 0), at(11, 30)).unwrap();
        assert_eq!(absent.status, AttendanceStatus::Absent);
    }

    #[test]
    fn full_day_keeps_lateness_and_counts_overtime() {
        let rules = ShiftRules::default();
        let late = rules.evaluate(at(9, 30), at(19, 0)).unwrap();
        assert_eq!(late.status, AttendanceStatus::Late);
        assert_eq!(late.worked_hours, 9.5);
        assert_eq!(late.overtime_hours, 1.5);
    }

    #[test]
    fn night_shift_ends_next_day() {
        let night = ShiftRules {
            start: NaiveTime::from_hms_opt(22, 0, 0).unwrap(),
            end: NaiveTime::from_hms_opt(6, 0, 0).unwrap(),
            ..ShiftRules::default()
        };
        assert!(night.crosses_midnight());
        assert!(!ShiftRules::default().crosses_midnight());

        let work_date = at(0, 0).date();
        assert_eq!(
            night.shift_end(work_date),
            NaiveDate::from_ymd_opt(2024, 3, 5).unwrap().and_hms_opt(6, 0, 0).unwrap()
        );

        let done = night
            .evaluate(
                at(22, 0),
                NaiveDate::from_ymd_opt(2024, 3, 5).unwrap().and_hms_opt(6, 0, 0).unwrap(),
            )
            .unwrap();
        assert_eq!(done.status, AttendanceStatus::Present);
        assert_eq!(done.worked_hours, 8.0);
    }

    #[test]
    fn punch_out_before_punch_in_is_rejected() {
        assert!(ShiftRules::default().evaluate(at(10, 0), at(9, 0)).is_err());
    }
}
