use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::borrow::Cow;

use validator::{Validate, ValidationError};

#[derive(Deserialize, Serialize, Debug, Clone, FromRow)]
pub struct Department {
    pub id: i64,
    pub name: String,
    pub code: Option<String>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Deserialize, Debug, Validate)]
pub struct DepartmentInput {
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    #[validate(length(max = 20))]
    pub code: Option<String>,
    pub description: Option<String>,
}

#[derive(Deserialize, Serialize, Debug, Clone, FromRow)]
pub struct Shift {
    pub id: i64,
    pub name: String,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub grace_minutes: i64,
    pub half_day_hours: f64,
    pub full_day_hours: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Deserialize, Debug, Validate)]
#[validate(schema(function = "validate_shift_hours"))]
pub struct ShiftInput {
    #[validate(length(min = 1, max = 60))]
    pub name: String,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    #[validate(range(min = 0, max = 240))]
    pub grace_minutes: i64,
    #[validate(range(min = 0.0, max = 24.0))]
    pub half_day_hours: f64,
    #[validate(range(min = 0.5, max = 24.0))]
    pub full_day_hours: f64,
}

/// An end time at or before the start means the shift ends the next day.
fn validate_shift_hours(input: &ShiftInput) -> Result<(), ValidationError> {
    if input.half_day_hours > input.full_day_hours {
        return Err(ValidationError::new("shift_hours")
            .with_message(Cow::Borrowed("half_day_hours must not exceed full_day_hours")));
    }
    if input.start_time == input.end_time {
        return Err(ValidationError::new("shift_times")
            .with_message(Cow::Borrowed("Shift must not start and end at the same time")));
    }
    Ok(())
}

#[derive(Deserialize, Serialize, Debug, Clone, FromRow)]
pub struct Holiday {
    pub id: i64,
    pub name: String,
    pub holiday_date: NaiveDate,
}

#[derive(Deserialize, Debug, Validate)]
pub struct HolidayInput {
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    pub holiday_date: NaiveDate,
}

#[derive(Deserialize, Serialize, Debug, Clone, FromRow)]
pub struct RosterAssignment {
    pub id: i64,
    pub employee_id: i64,
    pub shift_id: i64,
    pub roster_date: NaiveDate,
}

#[derive(Deserialize, Debug)]
pub struct RosterInput {
    pub employee_id: i64,
    pub shift_id: i64,
    pub roster_date: NaiveDate,
}

#[derive(Deserialize, Debug)]
pub struct DateRangeQuery {
    pub employee_id: Option<i64>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::AppError;

    fn shift(start: u32, end: u32, half: f64, full: f64) -> ShiftInput {
        ShiftInput {
            name: "General".to_owned(),
            start_time: NaiveTime::from_hms_opt(start, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(end, 0, 0).unwrap(),
            grace_minutes: 15,
            half_day_hours: half,
            full_day_hours: full,
        }
    }

    #[test]
    fn half_day_cannot_exceed_full_day() {
        assert!(shift(9, 18, 4.0, 8.0).validate().is_ok());
        assert!(shift(22, 6, 4.0, 8.0).validate().is_ok());

        let errors = shift(9, 18, 9.0, 8.0).validate().unwrap_err();
        let AppError::BadRequest(message) = AppError::from(errors) else {
            panic!("expected a bad request");
        };
        assert!(message.contains("half_day_hours"));
    }

    #[test]
    fn zero_length_shift_is_rejected() {
        assert!(shift(9, 9, 4.0, 8.0).validate().is_err());
    }
}
