use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use super::employee::EmploymentType;

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
pub enum JobStatus {
    Open,
    OnHold,
    Closed,
}

#[derive(Deserialize, Serialize, Debug, Clone, FromRow)]
pub struct JobOpening {
    pub id: i64,
    pub title: String,
    pub department_id: Option<i64>,
    pub location: Option<String>,
    pub employment_type: EmploymentType,
    pub openings: i64,
    pub description: Option<String>,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Deserialize, Debug, Validate)]
pub struct JobInput {
    #[validate(length(min = 1, max = 150))]
    pub title: String,
    pub department_id: Option<i64>,
    pub location: Option<String>,
    pub employment_type: Option<EmploymentType>,
    #[validate(range(min = 1, max = 1000))]
    pub openings: i64,
    pub description: Option<String>,
}

#[derive(Deserialize, Debug, Default, Validate)]
pub struct JobUpdate {
    #[validate(length(min = 1, max = 150))]
    pub title: Option<String>,
    pub location: Option<String>,
    #[validate(range(min = 1, max = 1000))]
    pub openings: Option<i64>,
    pub description: Option<String>,
    pub status: Option<JobStatus>,
}

#[derive(Deserialize, Debug, Default)]
pub struct JobQuery {
    pub status: Option<JobStatus>,
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
pub enum CandidateStage {
    Applied,
    Screening,
    Interview,
    Offered,
    Hired,
    Rejected,
}

impl CandidateStage {
    pub fn is_terminal(self) -> bool {
        matches!(self, CandidateStage::Hired | CandidateStage::Rejected)
    }

    /// Pipeline moves one step forward at a time; any open stage may reject.
    pub fn can_move_to(self, next: CandidateStage) -> bool {
        use CandidateStage::*;
        match (self, next) {
            (from, Rejected) => !from.is_terminal(),
            (Applied, Screening) | (Screening, Interview) | (Interview, Offered) => true,
            (Offered, Hired) => true,
            _ => false,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, FromRow)]
pub struct Candidate {
    pub id: i64,
    pub job_id: i64,
    pub full_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub resume_url: Option<String>,
    pub stage: CandidateStage,
    pub notes: Option<String>,
    pub employee_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Deserialize, Debug, Validate)]
pub struct CandidateInput {
    #[validate(length(min = 1, max = 150))]
    pub full_name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(max = 32))]
    pub phone: Option<String>,
    #[validate(url)]
    pub resume_url: Option<String>,
    pub notes: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct StageChange {
    pub stage: CandidateStage,
    pub notes: Option<String>,
}

#[derive(Deserialize, Debug, Validate)]
pub struct HireInput {
    #[validate(length(min = 1, max = 32))]
    pub employee_code: String,
    pub date_of_joining: NaiveDate,
    pub department_id: Option<i64>,
    pub designation: Option<String>,
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
pub enum InterviewResult {
    Scheduled,
    Passed,
    Failed,
}

#[derive(Deserialize, Serialize, Debug, Clone, FromRow)]
pub struct Interview {
    pub id: i64,
    pub candidate_id: i64,
    pub scheduled_at: NaiveDateTime,
    pub interviewer: String,
    pub mode: String,
    pub result: InterviewResult,
    pub rating: Option<i64>,
    pub feedback: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Deserialize, Debug, Validate)]
pub struct InterviewInput {
    pub scheduled_at: NaiveDateTime,
    #[validate(length(min = 1, max = 120))]
    pub interviewer: String,
    #[validate(length(min = 1, max = 30))]
    pub mode: Option<String>,
}

#[derive(Deserialize, Debug, Validate)]
pub struct InterviewFeedback {
    pub result: InterviewResult,
    #[validate(range(min = 1, max = 5))]
    pub rating: Option<i64>,
    pub feedback: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::CandidateStage::*;

    #[test]
    fn pipeline_only_advances_one_stage() {
        assert!(Applied.can_move_to(Screening));
        assert!(Offered.can_move_to(Hired));
        assert!(!Applied.can_move_to(Offered));
        assert!(!Screening.can_move_to(Applied));
    }

    #[test]
    fn terminal_stages_are_final() {
        assert!(Interview.can_move_to(Rejected));
        assert!(!Hired.can_move_to(Rejected));
        assert!(!Rejected.can_move_to(Screening));
    }
}
