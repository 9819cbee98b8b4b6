use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

#[derive(Serialize, Debug, Clone, Default, PartialEq)]
pub struct StatutorySummary {
    pub month: String,
    pub headcount: i64,
    pub total_gross: f64,
    pub total_net: f64,
    pub employee_pf: f64,
    pub employer_pf: f64,
    pub employee_esi: f64,
    pub employer_esi: f64,
    pub professional_tax: f64,
    pub tds: f64,
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(rename_all = "UPPERCASE")]
pub enum FilingKind {
    Pf,
    Esi,
    Pt,
    Tds,
}

#[derive(Deserialize, Serialize, Debug, Clone, FromRow)]
pub struct StatutoryFiling {
    pub id: i64,
    pub month: String,
    pub kind: FilingKind,
    pub amount: f64,
    pub reference: Option<String>,
    pub filed_on: NaiveDate,
    pub created_at: DateTime<Utc>,
}

#[derive(Deserialize, Debug, Validate)]
pub struct FilingInput {
    pub month: String,
    pub kind: FilingKind,
    #[validate(range(min = 0.0))]
    pub amount: f64,
    #[validate(length(max = 80))]
    pub reference: Option<String>,
    pub filed_on: NaiveDate,
}

#[derive(Deserialize, Debug, Default)]
pub struct FilingQuery {
    pub month: Option<String>,
}
