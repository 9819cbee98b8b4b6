use chrono::Utc;
use sqlx::{Executor, Sqlite, SqlitePool};

use crate::{
    db,
    errors::AppError,
    structs::{
        employee::{Employee, EmployeeInput, EmploymentType},
        recruitment::{
            Candidate, CandidateInput, CandidateStage, HireInput, Interview, InterviewFeedback,
            InterviewInput, InterviewResult, JobInput, JobOpening, JobQuery, JobStatus, JobUpdate,
            StageChange,
        },
    },
};

pub async fn get_all_jobs(pool: &SqlitePool, query: &JobQuery) -> Result<Vec<JobOpening>, sqlx::Error> {
    sqlx::query_as::<_, JobOpening>(
        "SELECT * FROM job_openings WHERE (? IS NULL OR status = ?) ORDER BY created_at DESC",
    )
    .bind(query.status)
    .bind(query.status)
    .fetch_all(pool)
    .await
}

pub async fn get_job<'e, E>(executor: E, id: i64) -> Result<JobOpening, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, JobOpening>("SELECT * FROM job_openings WHERE id = ?")
        .bind(id)
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Job opening {id} not found")))
}

pub async fn create_job(pool: &SqlitePool, input: &JobInput) -> Result<JobOpening, AppError> {
    let now = Utc::now();
    let job = sqlx::query_as::<_, JobOpening>(
        "INSERT INTO job_openings (title, department_id, location, employment_type, openings,
            description, status, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING *",
    )
    .bind(input.title.trim())
    .bind(input.department_id)
    .bind(&input.location)
    .bind(input.employment_type.unwrap_or(EmploymentType::FullTime))
    .bind(input.openings)
    .bind(&input.description)
    .bind(JobStatus::Open)
    .bind(now)
    .bind(now)
    .fetch_one(pool)
    .await?;
    log::info!("Job opening created: {} ({})", job.title, job.id);
    Ok(job)
}

pub async fn update_job(pool: &SqlitePool, id: i64, update: &JobUpdate) -> Result<JobOpening, AppError> {
    sqlx::query_as::<_, JobOpening>(
        "UPDATE job_openings SET
            title = COALESCE(?, title),
            location = COALESCE(?, location),
            openings = COALESCE(?, openings),
            description = COALESCE(?, description),
            status = COALESCE(?, status),
            updated_at = ?
         WHERE id = ? RETURNING *",
    )
    .bind(&update.title)
    .bind(&update.location)
    .bind(update.openings)
    .bind(&update.description)
    .bind(update.status)
    .bind(Utc::now())
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Job opening {id} not found")))
}

pub async fn delete_job(pool: &SqlitePool, id: i64) -> Result<(), AppError> {
    let result = sqlx::query("DELETE FROM job_openings WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("Job opening {id} not found")));
    }
    log::info!("Job opening with id {} deleted", id);
    Ok(())
}

pub async fn get_candidates(pool: &SqlitePool, job_id: i64) -> Result<Vec<Candidate>, sqlx::Error> {
    sqlx::query_as::<_, Candidate>("SELECT * FROM candidates WHERE job_id = ? ORDER BY created_at")
        .bind(job_id)
        .fetch_all(pool)
        .await
}

pub async fn get_candidate<'e, E>(executor: E, id: i64) -> Result<Candidate, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, Candidate>("SELECT * FROM candidates WHERE id = ?")
        .bind(id)
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Candidate {id} not found")))
}

pub async fn create_candidate(pool: &SqlitePool, job_id: i64, input: &CandidateInput) -> Result<Candidate, AppError> {
    let job = get_job(pool, job_id).await?;
    if job.status != JobStatus::Open {
        return Err(AppError::BadRequest(format!(
            "Job opening {job_id} is not accepting candidates"
        )));
    }
    let now = Utc::now();
    let candidate = sqlx::query_as::<_, Candidate>(
        "INSERT INTO candidates (job_id, full_name, email, phone, resume_url, stage, notes, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING *",
    )
    .bind(job_id)
    .bind(input.full_name.trim())
    .bind(input.email.to_lowercase())
    .bind(&input.phone)
    .bind(&input.resume_url)
    .bind(CandidateStage::Applied)
    .bind(&input.notes)
    .bind(now)
    .bind(now)
    .fetch_one(pool)
    .await
    .map_err(|e| match AppError::from(e) {
        AppError::Conflict(_) => AppError::Conflict(format!(
            "{} has already applied to this opening",
            input.email
        )),
        other => other,
    })?;
    log::info!("Candidate {} applied to job {}", candidate.id, job_id);
    Ok(candidate)
}

/// Moves a candidate along the pipeline. Hiring goes through [`hire_candidate`].
pub async fn change_stage(pool: &SqlitePool, id: i64, change: &StageChange) -> Result<Candidate, AppError> {
    let candidate = get_candidate(pool, id).await?;
    if change.stage == CandidateStage::Hired {
        return Err(AppError::BadRequest(
            "Use the hire endpoint to hire a candidate".to_owned(),
        ));
    }
    if !candidate.stage.can_move_to(change.stage) {
        return Err(AppError::BadRequest(format!(
            "Cannot move candidate from {:?} to {:?}",
            candidate.stage, change.stage
        )));
    }
    let updated = sqlx::query_as::<_, Candidate>(
        "UPDATE candidates SET stage = ?, notes = COALESCE(?, notes), updated_at = ?
         WHERE id = ? RETURNING *",
    )
    .bind(change.stage)
    .bind(&change.notes)
    .bind(Utc::now())
    .bind(id)
    .fetch_one(pool)
    .await?;
    log::info!("Candidate {} moved to {:?}", id, updated.stage);
    Ok(updated)
}

/// Converts an offered candidate into an employee and closes the opening once filled.
pub async fn hire_candidate(pool: &SqlitePool, id: i64, input: &HireInput) -> Result<(Candidate, Employee), AppError> {
    let mut tx = pool.begin().await?;
    let candidate = get_candidate(&mut *tx, id).await?;
    if !candidate.stage.can_move_to(CandidateStage::Hired) {
        return Err(AppError::BadRequest(format!(
            "Only offered candidates can be hired (current: {:?})",
            candidate.stage
        )));
    }
    let job = get_job(&mut *tx, candidate.job_id).await?;
    if job.status != JobStatus::Open {
        return Err(AppError::BadRequest(format!(
            "Job opening {} is {:?}",
            job.id, job.status
        )));
    }
    let hires = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM candidates WHERE job_id = ? AND stage = ?",
    )
    .bind(job.id)
    .bind(CandidateStage::Hired)
    .fetch_one(&mut *tx)
    .await?;
    if hires >= job.openings {
        return Err(AppError::Conflict(format!(
            "Job opening {} is already filled",
            job.id
        )));
    }

    let (first_name, last_name) = match candidate.full_name.split_once(' ') {
        Some((first, rest)) => (first.to_owned(), rest.trim().to_owned()),
        None => (candidate.full_name.clone(), String::new()),
    };
    let employee = db::employees::create_employee(
        &mut *tx,
        &EmployeeInput {
            employee_code: input.employee_code.clone(),
            first_name,
            last_name,
            email: candidate.email.clone(),
            phone: candidate.phone.clone(),
            department_id: input.department_id.or(job.department_id),
            designation: input.designation.clone().or_else(|| Some(job.title.clone())),
            shift_id: None,
            manager_id: None,
            date_of_joining: input.date_of_joining,
            employment_type: Some(job.employment_type),
        },
    )
    .await?;

    let hired = sqlx::query_as::<_, Candidate>(
        "UPDATE candidates SET stage = ?, employee_id = ?, updated_at = ? WHERE id = ? RETURNING *",
    )
    .bind(CandidateStage::Hired)
    .bind(employee.id)
    .bind(Utc::now())
    .bind(id)
    .fetch_one(&mut *tx)
    .await?;

    if hires + 1 >= job.openings {
        sqlx::query("UPDATE job_openings SET status = ?, updated_at = ? WHERE id = ?")
            .bind(JobStatus::Closed)
            .bind(Utc::now())
            .bind(job.id)
            .execute(&mut *tx)
            .await?;
        log::info!("Job opening {} filled and closed", job.id);
    }
    tx.commit().await?;

    log::info!("Candidate {} hired as employee {}", id, employee.employee_code);
    Ok((hired, employee))
}

pub async fn get_interviews(pool: &SqlitePool, candidate_id: i64) -> Result<Vec<Interview>, sqlx::Error> {
    sqlx::query_as::<_, Interview>(
        "SELECT * FROM interviews WHERE candidate_id = ? ORDER BY scheduled_at",
    )
    .bind(candidate_id)
    .fetch_all(pool)
    .await
}

pub async fn schedule_interview(pool: &SqlitePool, candidate_id: i64, input: &InterviewInput) -> Result<Interview, AppError> {
    let candidate = get_candidate(pool, candidate_id).await?;
    if candidate.stage.is_terminal() {
        return Err(AppError::BadRequest(format!(
            "Candidate is already {:?}",
            candidate.stage
        )));
    }
    let interview = sqlx::query_as::<_, Interview>(
        "INSERT INTO interviews (candidate_id, scheduled_at, interviewer, mode, result, created_at)
         VALUES (?, ?, ?, ?, ?, ?) RETURNING *",
    )
    .bind(candidate_id)
    .bind(input.scheduled_at)
    .bind(&input.interviewer)
    .bind(input.mode.as_deref().unwrap_or("Onsite"))
    .bind(InterviewResult::Scheduled)
    .bind(Utc::now())
    .fetch_one(pool)
    .await?;
    Ok(interview)
}

pub async fn record_feedback(pool: &SqlitePool, id: i64, feedback: &InterviewFeedback) -> Result<Interview, AppError> {
    sqlx::query_as::<_, Interview>(
        "UPDATE interviews SET result = ?, rating = ?, feedback = ? WHERE id = ? RETURNING *",
    )
    .bind(feedback.result)
    .bind(feedback.rating)
    .bind(&feedback.feedback)
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Interview {id} not found")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support;
    use chrono::NaiveDate;

    async fn opening(pool: &SqlitePool, openings: i64) -> JobOpening {
        create_job(
            pool,
            &JobInput {
                title: "Staff Nurse".to_owned(),
                department_id: None,
                location: Some("Pune".to_owned()),
                employment_type: None,
                openings,
                description: None,
            },
        )
        .await
        .unwrap()
    }

    fn applicant(email: &str) -> CandidateInput {
        CandidateInput {
            full_name: "Meera Nair Iyer".to_owned(),
            email: email.to_owned(),
            phone: None,
            resume_url: None,
            notes: None,
        }
    }

    fn to(stage: CandidateStage) -> StageChange {
        StageChange { stage, notes: None }
    }

    #[actix_web::test]
    async fn duplicate_application_conflicts() {
        let (_dir, pool) = test_support::tenant_pool().await;
        let job = opening(&pool, 1).await;
        create_candidate(&pool, job.id, &applicant("meera@example.com")).await.unwrap();
        let again = create_candidate(&pool, job.id, &applicant("MEERA@example.com")).await;
        assert!(matches!(again, Err(AppError::Conflict(_))));
    }

    #[actix_web::test]
    async fn hiring_creates_employee_and_closes_job() {
        let (_dir, pool) = test_support::tenant_pool().await;
        let job = opening(&pool, 1).await;
        let candidate = create_candidate(&pool, job.id, &applicant("meera@example.com"))
            .await
            .unwrap();

        let skip = change_stage(&pool, candidate.id, &to(CandidateStage::Offered)).await;
        assert!(matches!(skip, Err(AppError::BadRequest(_))));
        for stage in [
            CandidateStage::Screening,
            CandidateStage::Interview,
            CandidateStage::Offered,
        ] {
            change_stage(&pool, candidate.id, &to(stage)).await.unwrap();
        }

        let (hired, employee) = hire_candidate(
            &pool,
            candidate.id,
            &HireInput {
                employee_code: "N100".to_owned(),
                date_of_joining: NaiveDate::from_ymd_opt(2024, 4, 1).unwrap(),
                department_id: None,
                designation: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(hired.stage, CandidateStage::Hired);
        assert_eq!(hired.employee_id, Some(employee.id));
        assert_eq!(employee.first_name, "Meera");
        assert_eq!(employee.last_name, "Nair Iyer");
        assert_eq!(employee.designation.as_deref(), Some("Staff Nurse"));

        let job = get_job(&pool, job.id).await.unwrap();
        assert_eq!(job.status, JobStatus::Closed);
        let late = create_candidate(&pool, job.id, &applicant("late@example.com")).await;
        assert!(matches!(late, Err(AppError::BadRequest(_))));
    }

    async fn offered(pool: &SqlitePool, job_id: i64, email: &str) -> Candidate {
        let candidate = create_candidate(pool, job_id, &applicant(email)).await.unwrap();
        for stage in [
            CandidateStage::Screening,
            CandidateStage::Interview,
            CandidateStage::Offered,
        ] {
            change_stage(pool, candidate.id, &to(stage)).await.unwrap();
        }
        candidate
    }

    fn hire(code: &str) -> HireInput {
        HireInput {
            employee_code: code.to_owned(),
            date_of_joining: NaiveDate::from_ymd_opt(2024, 4, 1).unwrap(),
            department_id: None,
            designation: None,
        }
    }

    #[actix_web::test]
    async fn closed_or_filled_opening_cannot_hire() {
        let (_dir, pool) = test_support::tenant_pool().await;
        let job = opening(&pool, 1).await;
        let first = offered(&pool, job.id, "first@example.com").await;
        let second = offered(&pool, job.id, "second@example.com").await;

        hire_candidate(&pool, first.id, &hire("N200")).await.unwrap();
        let closed = hire_candidate(&pool, second.id, &hire("N201")).await;
        assert!(matches!(closed, Err(AppError::BadRequest(_))));

        update_job(
            &pool,
            job.id,
            &JobUpdate {
                status: Some(JobStatus::Open),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        let filled = hire_candidate(&pool, second.id, &hire("N201")).await;
        assert!(matches!(filled, Err(AppError::Conflict(_))));

        let second = get_candidate(&pool, second.id).await.unwrap();
        assert_eq!(second.stage, CandidateStage::Offered);
        assert_eq!(second.employee_id, None);
    }
}
