use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

#[derive(Deserialize, Serialize, Debug, Clone, FromRow)]
pub struct LeaveType {
    pub id: i64,
    pub name: String,
    pub code: String,
    pub annual_quota: f64,
    pub is_paid: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Deserialize, Debug, Validate)]
pub struct LeaveTypeInput {
    #[validate(length(min = 1, max = 60))]
    pub name: String,
    #[validate(length(min = 1, max = 10))]
    pub code: String,
    #[validate(range(min = 0.0, max = 366.0))]
    pub annual_quota: f64,
    #[serde(default = "default_true")]
    pub is_paid: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Deserialize, Serialize, Debug, Clone, FromRow)]
pub struct LeaveBalance {
    pub id: i64,
    pub employee_id: i64,
    pub leave_type_id: i64,
    pub year: i64,
    pub allocated: f64,
    pub used: f64,
}

#[derive(Deserialize, Debug, Validate)]
pub struct BalanceInput {
    pub employee_id: i64,
    pub leave_type_id: i64,
    #[validate(range(min = 2000, max = 2100))]
    pub year: i64,
    #[validate(range(min = 0.0, max = 366.0))]
    pub allocated: f64,
}

#[derive(Deserialize, Debug)]
pub struct BalanceQuery {
    pub employee_id: Option<i64>,
    pub year: Option<i64>,
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
pub enum LeaveStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
}

#[derive(Deserialize, Serialize, Debug, Clone, FromRow)]
pub struct LeaveApplication {
    pub id: i64,
    pub employee_id: i64,
    pub leave_type_id: i64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub half_day: bool,
    pub days: f64,
    pub reason: Option<String>,
    pub status: LeaveStatus,
    pub reviewed_by: Option<String>,
    pub review_comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Deserialize, Debug, Validate)]
pub struct LeaveApplyInput {
    pub employee_id: Option<i64>,
    pub leave_type_id: i64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub half_day: bool,
    #[validate(length(max = 500))]
    pub reason: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
pub struct LeaveDecision {
    pub comment: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
pub struct LeaveQuery {
    pub employee_id: Option<i64>,
    pub status: Option<LeaveStatus>,
}
