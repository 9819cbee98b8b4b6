use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

#[derive(Deserialize, Serialize, Debug, Clone, FromRow)]
pub struct TrainingProgram {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub trainer: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub capacity: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Deserialize, Debug, Validate)]
pub struct ProgramInput {
    #[validate(length(min = 1, max = 150))]
    pub title: String,
    pub description: Option<String>,
    pub trainer: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[validate(range(min = 1))]
    pub capacity: Option<i64>,
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
pub enum EnrollmentStatus {
    Enrolled,
    Completed,
    Dropped,
}

#[derive(Deserialize, Serialize, Debug, Clone, FromRow)]
pub struct Enrollment {
    pub id: i64,
    pub program_id: i64,
    pub employee_id: i64,
    pub status: EnrollmentStatus,
    pub score: Option<f64>,
    pub completed_on: Option<NaiveDate>,
    pub enrolled_at: DateTime<Utc>,
}

#[derive(Deserialize, Debug)]
pub struct EnrollInput {
    pub employee_id: i64,
}

#[derive(Deserialize, Debug, Validate)]
pub struct CompletionInput {
    #[validate(range(min = 0.0, max = 100.0))]
    pub score: Option<f64>,
    pub completed_on: Option<NaiveDate>,
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
pub enum GoalStatus {
    NotStarted,
    InProgress,
    Completed,
}

impl GoalStatus {
    pub fn from_progress(progress: f64) -> Self {
        if progress >= 100.0 {
            GoalStatus::Completed
        } else if progress > 0.0 {
            GoalStatus::InProgress
        } else {
            GoalStatus::NotStarted
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, FromRow)]
pub struct Goal {
    pub id: i64,
    pub employee_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub target_date: Option<NaiveDate>,
    pub weight: f64,
    pub progress: f64,
    pub status: GoalStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Deserialize, Debug, Validate)]
pub struct GoalInput {
    pub employee_id: i64,
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    pub description: Option<String>,
    pub target_date: Option<NaiveDate>,
    #[validate(range(exclusive_min = 0.0, max = 100.0))]
    pub weight: Option<f64>,
}

#[derive(Deserialize, Debug, Validate)]
pub struct ProgressUpdate {
    #[validate(range(min = 0.0, max = 100.0))]
    pub progress: f64,
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
pub enum ReviewStatus {
    Draft,
    Submitted,
    Acknowledged,
}

#[derive(Deserialize, Serialize, Debug, Clone, FromRow)]
pub struct PerformanceReview {
    pub id: i64,
    pub employee_id: i64,
    pub reviewer: String,
    pub period: String,
    pub rating: i64,
    pub comments: Option<String>,
    pub status: ReviewStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Deserialize, Debug, Validate)]
pub struct ReviewInput {
    pub employee_id: i64,
    #[validate(length(min = 1, max = 20))]
    pub period: String,
    #[validate(range(min = 1, max = 5))]
    pub rating: i64,
    pub comments: Option<String>,
}

#[derive(Deserialize, Debug, Validate)]
pub struct ReviewUpdate {
    #[validate(range(min = 1, max = 5))]
    pub rating: i64,
    pub comments: Option<String>,
}

#[derive(Serialize, Debug, Clone)]
pub struct PerformanceSummary {
    pub employee_id: i64,
    pub goals: Vec<Goal>,
    pub weighted_progress: f64,
    pub latest_rating: Option<i64>,
    pub reviews: Vec<PerformanceReview>,
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
pub enum ExitStatus {
    Pending,
    Approved,
    Completed,
    Withdrawn,
}

#[derive(Deserialize, Serialize, Debug, Clone, FromRow)]
pub struct EmployeeExit {
    pub id: i64,
    pub employee_id: i64,
    pub resignation_date: NaiveDate,
    pub last_working_day: NaiveDate,
    pub reason: Option<String>,
    pub status: ExitStatus,
    pub exit_interview_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Deserialize, Debug, Validate)]
pub struct ResignationInput {
    pub employee_id: Option<i64>,
    pub resignation_date: NaiveDate,
    pub last_working_day: NaiveDate,
    #[validate(length(max = 1000))]
    pub reason: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
pub struct ExitNotes {
    pub exit_interview_notes: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::GoalStatus;

    #[test]
    fn goal_status_follows_progress() {
        assert_eq!(GoalStatus::from_progress(0.0), GoalStatus::NotStarted);
        assert_eq!(GoalStatus::from_progress(35.5), GoalStatus::InProgress);
        assert_eq!(GoalStatus::from_progress(100.0), GoalStatus::Completed);
    }
}
