use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

#[derive(Deserialize, Serialize, Debug, Clone, FromRow)]
pub struct SalaryStructure {
    pub id: i64,
    pub employee_id: i64,
    pub basic: f64,
    pub hra: f64,
    pub conveyance: f64,
    pub medical_allowance: f64,
    pub special_allowance: f64,
    pub pf_enabled: bool,
    pub esi_enabled: bool,
    pub pt_enabled: bool,
    pub tds_percent: f64,
    pub overtime_enabled: bool,
    pub effective_from: NaiveDate,
    pub updated_at: DateTime<Utc>,
}

#[derive(Deserialize, Debug, Validate)]
pub struct SalaryStructureInput {
    #[validate(range(min = 0.0))]
    pub basic: f64,
    #[serde(default)]
    #[validate(range(min = 0.0))]
    pub hra: f64,
    #[serde(default)]
    #[validate(range(min = 0.0))]
    pub conveyance: f64,
    #[serde(default)]
    #[validate(range(min = 0.0))]
    pub medical_allowance: f64,
    #[serde(default)]
    #[validate(range(min = 0.0))]
    pub special_allowance: f64,
    #[serde(default)]
    pub pf_enabled: bool,
    #[serde(default)]
    pub esi_enabled: bool,
    #[serde(default)]
    pub pt_enabled: bool,
    #[serde(default)]
    #[validate(range(min = 0.0, max = 50.0))]
    pub tds_percent: f64,
    #[serde(default)]
    pub overtime_enabled: bool,
    pub effective_from: NaiveDate,
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
pub enum AdjustmentKind {
    Bonus,
    Deduction,
}

#[derive(Deserialize, Serialize, Debug, Clone, FromRow)]
pub struct PayrollAdjustment {
    pub id: i64,
    pub employee_id: i64,
    pub month: String,
    pub kind: AdjustmentKind,
    pub amount: f64,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Deserialize, Debug, Validate)]
pub struct AdjustmentInput {
    pub employee_id: i64,
    pub month: String,
    pub kind: AdjustmentKind,
    #[validate(range(exclusive_min = 0.0))]
    pub amount: f64,
    #[validate(length(max = 200))]
    pub description: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct PayrollMonthQuery {
    pub month: String,
    pub employee_id: Option<i64>,
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
pub enum PayrollStatus {
    Completed,
}

#[derive(Deserialize, Serialize, Debug, Clone, FromRow)]
pub struct PayrollRun {
    pub id: i64,
    pub employee_id: i64,
    pub month: String,
    pub working_days: f64,
    pub lop_days: f64,
    pub paid_days: f64,
    pub basic: f64,
    pub hra: f64,
    pub conveyance: f64,
    pub medical_allowance: f64,
    pub special_allowance: f64,
    pub overtime_hours: f64,
    pub overtime_pay: f64,
    pub bonus: f64,
    pub gross: f64,
    pub pf: f64,
    pub esi: f64,
    pub pt: f64,
    pub tds: f64,
    pub other_deductions: f64,
    pub total_deductions: f64,
    pub net: f64,
    pub status: PayrollStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Deserialize, Debug)]
pub struct PayrollRunRequest {
    pub month: String,
    pub employee_ids: Option<Vec<i64>>,
    #[serde(default)]
    pub rerun: bool,
}

#[derive(Serialize, Debug, Clone)]
pub struct SkippedEmployee {
    pub employee_id: i64,
    pub reason: String,
}

#[derive(Serialize, Debug, Clone)]
pub struct PayrollRunReport {
    pub month: String,
    pub processed: Vec<PayrollRun>,
    pub skipped: Vec<SkippedEmployee>,
}
