use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
pub enum AttendanceStatus {
    Present,
    Late,
    HalfDay,
    Absent,
}

#[derive(Deserialize, Serialize, Debug, Clone, FromRow)]
pub struct Attendance {
    pub id: i64,
    pub employee_id: i64,
    pub work_date: NaiveDate,
    pub punch_in: NaiveDateTime,
    pub punch_out: Option<NaiveDateTime>,
    pub status: AttendanceStatus,
    pub worked_hours: f64,
    pub overtime_hours: f64,
    pub remarks: Option<String>,
}

/// Punch request. `employee_id` and `at` are only honoured for HR roles.
#[derive(Deserialize, Debug, Default)]
pub struct PunchInput {
    pub employee_id: Option<i64>,
    pub at: Option<NaiveDateTime>,
    pub remarks: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct AttendanceUpdate {
    pub punch_in: NaiveDateTime,
    pub punch_out: Option<NaiveDateTime>,
    pub remarks: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct MonthQuery {
    pub employee_id: Option<i64>,
    pub month: String,
}

#[derive(Serialize, Debug, Clone, Default, PartialEq)]
pub struct AttendanceSummary {
    pub employee_id: i64,
    pub month: String,
    pub present: i64,
    pub late: i64,
    pub half_day: i64,
    pub absent: i64,
    pub worked_hours: f64,
    pub overtime_hours: f64,
}
