//! Training programs, goals and reviews, and employee exits.

use chrono::Utc;
use sqlx::SqlitePool;

use crate::{
    db,
    errors::AppError,
    rules::round2,
    structs::{
        employee::EmployeeStatus,
        talent::{
            CompletionInput, EmployeeExit, Enrollment, EnrollmentStatus, ExitStatus, Goal,
            GoalInput, GoalStatus, PerformanceReview, PerformanceSummary, ProgramInput,
            ResignationInput, ReviewInput, ReviewStatus, ReviewUpdate, TrainingProgram,
        },
    },
};

fn check_program_dates(input: &ProgramInput) -> Result<(), AppError> {
    if input.end_date < input.start_date {
        return Err(AppError::BadRequest(
            "Program end date must not be before its start date".to_owned(),
        ));
    }
    Ok(())
}

pub async fn get_all_programs(pool: &SqlitePool) -> Result<Vec<TrainingProgram>, sqlx::Error> {
    sqlx::query_as::<_, TrainingProgram>("SELECT * FROM training_programs ORDER BY start_date DESC")
        .fetch_all(pool)
        .await
}

pub async fn get_program(pool: &SqlitePool, id: i64) -> Result<TrainingProgram, AppError> {
    sqlx::query_as::<_, TrainingProgram>("SELECT * FROM training_programs WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Training program {id} not found")))
}

pub async fn create_program(pool: &SqlitePool, input: &ProgramInput) -> Result<TrainingProgram, AppError> {
    check_program_dates(input)?;
    let now = Utc::now();
    let program = sqlx::query_as::<_, TrainingProgram>(
        "INSERT INTO training_programs (title, description, trainer, start_date, end_date, capacity, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?) RETURNING *",
    )
    .bind(input.title.trim())
    .bind(&input.description)
    .bind(&input.trainer)
    .bind(input.start_date)
    .bind(input.end_date)
    .bind(input.capacity)
    .bind(now)
    .bind(now)
    .fetch_one(pool)
    .await?;
    log::info!("Training program created: {}", program.title);
    Ok(program)
}

pub async fn update_program(pool: &SqlitePool, id: i64, input: &ProgramInput) -> Result<TrainingProgram, AppError> {
    check_program_dates(input)?;
    sqlx::query_as::<_, TrainingProgram>(
        "UPDATE training_programs SET title = ?, description = ?, trainer = ?, start_date = ?,
            end_date = ?, capacity = ?, updated_at = ?
         WHERE id = ? RETURNING *",
    )
    .bind(input.title.trim())
    .bind(&input.description)
    .bind(&input.trainer)
    .bind(input.start_date)
    .bind(input.end_date)
    .bind(input.capacity)
    .bind(Utc::now())
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Training program {id} not found")))
}

pub async fn delete_program(pool: &SqlitePool, id: i64) -> Result<(), AppError> {
    let result = sqlx::query("DELETE FROM training_programs WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("Training program {id} not found")));
    }
    log::info!("Training program with id {} deleted", id);
    Ok(())
}

pub async fn get_enrollments(pool: &SqlitePool, program_id: i64) -> Result<Vec<Enrollment>, sqlx::Error> {
    sqlx::query_as::<_, Enrollment>(
        "SELECT * FROM training_enrollments WHERE program_id = ? ORDER BY enrolled_at",
    )
    .bind(program_id)
    .fetch_all(pool)
    .await
}

/// Dropped enrollments do not take a seat.
pub async fn enroll(pool: &SqlitePool, program_id: i64, employee_id: i64) -> Result<Enrollment, AppError> {
    db::employees::ensure_exists(pool, employee_id).await?;
    let mut tx = pool.begin().await?;
    let program = sqlx::query_as::<_, TrainingProgram>("SELECT * FROM training_programs WHERE id = ?")
        .bind(program_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Training program {program_id} not found")))?;

    if let Some(capacity) = program.capacity {
        let seated = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM training_enrollments WHERE program_id = ? AND status != ?",
        )
        .bind(program_id)
        .bind(EnrollmentStatus::Dropped)
        .fetch_one(&mut *tx)
        .await?;
        if seated >= capacity {
            return Err(AppError::Conflict(format!(
                "Training program '{}' is full",
                program.title
            )));
        }
    }

    let enrollment = sqlx::query_as::<_, Enrollment>(
        "INSERT INTO training_enrollments (program_id, employee_id, status, enrolled_at)
         VALUES (?, ?, ?, ?) RETURNING *",
    )
    .bind(program_id)
    .bind(employee_id)
    .bind(EnrollmentStatus::Enrolled)
    .bind(Utc::now())
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| match AppError::from(e) {
        AppError::Conflict(_) => {
            AppError::Conflict(format!("Employee {employee_id} is already enrolled"))
        }
        other => other,
    })?;
    tx.commit().await?;
    log::info!("Employee {} enrolled in program {}", employee_id, program_id);
    Ok(enrollment)
}

pub async fn complete_enrollment(
    pool: &SqlitePool,
    program_id: i64,
    enrollment_id: i64,
    input: &CompletionInput,
) -> Result<Enrollment, AppError> {
    sqlx::query_as::<_, Enrollment>(
        "UPDATE training_enrollments SET status = ?, score = ?, completed_on = ?
         WHERE id = ? AND program_id = ? AND status = ? RETURNING *",
    )
    .bind(EnrollmentStatus::Completed)
    .bind(input.score)
    .bind(input.completed_on.unwrap_or_else(|| Utc::now().date_naive()))
    .bind(enrollment_id)
    .bind(program_id)
    .bind(EnrollmentStatus::Enrolled)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Active enrollment not found".to_owned()))
}

pub async fn drop_enrollment(pool: &SqlitePool, program_id: i64, enrollment_id: i64) -> Result<Enrollment, AppError> {
    sqlx::query_as::<_, Enrollment>(
        "UPDATE training_enrollments SET status = ? WHERE id = ? AND program_id = ? AND status = ? RETURNING *",
    )
    .bind(EnrollmentStatus::Dropped)
    .bind(enrollment_id)
    .bind(program_id)
    .bind(EnrollmentStatus::Enrolled)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Active enrollment not found".to_owned()))
}

pub async fn get_goals(pool: &SqlitePool, employee_id: i64) -> Result<Vec<Goal>, sqlx::Error> {
    sqlx::query_as::<_, Goal>("SELECT * FROM goals WHERE employee_id = ? ORDER BY id")
        .bind(employee_id)
        .fetch_all(pool)
        .await
}

pub async fn get_goal(pool: &SqlitePool, id: i64) -> Result<Goal, AppError> {
    sqlx::query_as::<_, Goal>("SELECT * FROM goals WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Goal {id} not found")))
}

pub async fn create_goal(pool: &SqlitePool, input: &GoalInput) -> Result<Goal, AppError> {
    db::employees::ensure_exists(pool, input.employee_id).await?;
    let now = Utc::now();
    let goal = sqlx::query_as::<_, Goal>(
        "INSERT INTO goals (employee_id, title, description, target_date, weight, progress, status, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, 0, ?, ?, ?) RETURNING *",
    )
    .bind(input.employee_id)
    .bind(input.title.trim())
    .bind(&input.description)
    .bind(input.target_date)
    .bind(input.weight.unwrap_or(1.0))
    .bind(GoalStatus::NotStarted)
    .bind(now)
    .bind(now)
    .fetch_one(pool)
    .await?;
    Ok(goal)
}

pub async fn update_progress(pool: &SqlitePool, id: i64, progress: f64) -> Result<Goal, AppError> {
    let progress = round2(progress.clamp(0.0, 100.0));
    sqlx::query_as::<_, Goal>(
        "UPDATE goals SET progress = ?, status = ?, updated_at = ? WHERE id = ? RETURNING *",
    )
    .bind(progress)
    .bind(GoalStatus::from_progress(progress))
    .bind(Utc::now())
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Goal {id} not found")))
}

pub async fn delete_goal(pool: &SqlitePool, id: i64) -> Result<(), AppError> {
    let result = sqlx::query("DELETE FROM goals WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("Goal {id} not found")));
    }
    Ok(())
}

pub async fn get_reviews(pool: &SqlitePool, employee_id: i64) -> Result<Vec<PerformanceReview>, sqlx::Error> {
    sqlx::query_as::<_, PerformanceReview>(
        "SELECT * FROM performance_reviews WHERE employee_id = ? ORDER BY period DESC",
    )
    .bind(employee_id)
    .fetch_all(pool)
    .await
}

pub async fn get_review(pool: &SqlitePool, id: i64) -> Result<PerformanceReview, AppError> {
    sqlx::query_as::<_, PerformanceReview>("SELECT * FROM performance_reviews WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Review {id} not found")))
}

pub async fn create_review(pool: &SqlitePool, reviewer: &str, input: &ReviewInput) -> Result<PerformanceReview, AppError> {
    db::employees::ensure_exists(pool, input.employee_id).await?;
    let now = Utc::now();
    sqlx::query_as::<_, PerformanceReview>(
        "INSERT INTO performance_reviews (employee_id, reviewer, period, rating, comments, status, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?) RETURNING *",
    )
    .bind(input.employee_id)
    .bind(reviewer)
    .bind(input.period.trim())
    .bind(input.rating)
    .bind(&input.comments)
    .bind(ReviewStatus::Draft)
    .bind(now)
    .bind(now)
    .fetch_one(pool)
    .await
    .map_err(|e| match AppError::from(e) {
        AppError::Conflict(_) => AppError::Conflict(format!(
            "A review for period {} already exists",
            input.period
        )),
        other => other,
    })
}

/// Only drafts can be edited.
pub async fn update_review(pool: &SqlitePool, id: i64, update: &ReviewUpdate) -> Result<PerformanceReview, AppError> {
    let review = get_review(pool, id).await?;
    if review.status != ReviewStatus::Draft {
        return Err(AppError::BadRequest(format!(
            "Review is {:?} and can no longer be edited",
            review.status
        )));
    }
    let updated = sqlx::query_as::<_, PerformanceReview>(
        "UPDATE performance_reviews SET rating = ?, comments = COALESCE(?, comments), updated_at = ?
         WHERE id = ? RETURNING *",
    )
    .bind(update.rating)
    .bind(&update.comments)
    .bind(Utc::now())
    .bind(id)
    .fetch_one(pool)
    .await?;
    Ok(updated)
}

/// Draft → Submitted → Acknowledged.
pub async fn advance_review(pool: &SqlitePool, id: i64, next: ReviewStatus) -> Result<PerformanceReview, AppError> {
    let review = get_review(pool, id).await?;
    let allowed = matches!(
        (review.status, next),
        (ReviewStatus::Draft, ReviewStatus::Submitted)
            | (ReviewStatus::Submitted, ReviewStatus::Acknowledged)
    );
    if !allowed {
        return Err(AppError::BadRequest(format!(
            "Cannot move review from {:?} to {:?}",
            review.status, next
        )));
    }
    let updated = sqlx::query_as::<_, PerformanceReview>(
        "UPDATE performance_reviews SET status = ?, updated_at = ? WHERE id = ? RETURNING *",
    )
    .bind(next)
    .bind(Utc::now())
    .bind(id)
    .fetch_one(pool)
    .await?;
    log::info!("Review {} is now {:?}", id, next);
    Ok(updated)
}

pub fn weighted_progress(goals: &[Goal]) -> f64 {
    let total_weight: f64 = goals.iter().map(|g| g.weight).sum();
    if total_weight <= 0.0 {
        return 0.0;
    }
    let weighted: f64 = goals.iter().map(|g| g.weight * g.progress).sum();
    round2(weighted / total_weight)
}

pub async fn performance_summary(pool: &SqlitePool, employee_id: i64) -> Result<PerformanceSummary, AppError> {
    db::employees::ensure_exists(pool, employee_id).await?;
    let goals = get_goals(pool, employee_id).await?;
    let reviews = get_reviews(pool, employee_id).await?;
    let latest_rating = reviews
        .iter()
        .find(|r| r.status != ReviewStatus::Draft)
        .map(|r| r.rating);
    Ok(PerformanceSummary {
        employee_id,
        weighted_progress: weighted_progress(&goals),
        latest_rating,
        goals,
        reviews,
    })
}

pub async fn get_exits(pool: &SqlitePool, status: Option<ExitStatus>) -> Result<Vec<EmployeeExit>, sqlx::Error> {
    sqlx::query_as::<_, EmployeeExit>(
        "SELECT * FROM employee_exits WHERE (? IS NULL OR status = ?) ORDER BY last_working_day",
    )
    .bind(status)
    .bind(status)
    .fetch_all(pool)
    .await
}

pub async fn get_exit(pool: &SqlitePool, id: i64) -> Result<EmployeeExit, AppError> {
    sqlx::query_as::<_, EmployeeExit>("SELECT * FROM employee_exits WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Exit record {id} not found")))
}

/// A withdrawn resignation may be submitted again.
pub async fn resign(pool: &SqlitePool, employee_id: i64, input: &ResignationInput) -> Result<EmployeeExit, AppError> {
    if input.last_working_day < input.resignation_date {
        return Err(AppError::BadRequest(
            "Last working day must not be before the resignation date".to_owned(),
        ));
    }
    let employee = db::employees::get_employee(pool, employee_id).await?;
    if employee.status == EmployeeStatus::Exited {
        return Err(AppError::BadRequest(format!(
            "Employee {} has already exited",
            employee.employee_code
        )));
    }

    let mut tx = pool.begin().await?;
    let now = Utc::now();
    let record = sqlx::query_as::<_, EmployeeExit>(
        "INSERT INTO employee_exits (employee_id, resignation_date, last_working_day, reason, status, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT (employee_id) DO UPDATE SET
            resignation_date = excluded.resignation_date,
            last_working_day = excluded.last_working_day,
            reason = excluded.reason,
            status = excluded.status,
            updated_at = excluded.updated_at
         WHERE employee_exits.status = ?
         RETURNING *",
    )
    .bind(employee_id)
    .bind(input.resignation_date)
    .bind(input.last_working_day)
    .bind(&input.reason)
    .bind(ExitStatus::Pending)
    .bind(now)
    .bind(now)
    .bind(ExitStatus::Withdrawn)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| {
        AppError::Conflict(format!(
            "Employee {} already has an open resignation",
            employee.employee_code
        ))
    })?;
    db::employees::set_status(&mut *tx, employee_id, EmployeeStatus::OnNotice).await?;
    tx.commit().await?;

    log::info!(
        "Resignation recorded for employee {}; last day {}",
        employee.employee_code,
        record.last_working_day
    );
    Ok(record)
}

async fn move_exit(pool: &SqlitePool, id: i64, from: ExitStatus, to: ExitStatus) -> Result<EmployeeExit, AppError> {
    let record = get_exit(pool, id).await?;
    if record.status != from {
        return Err(AppError::BadRequest(format!(
            "Exit is {:?}; expected {:?}",
            record.status, from
        )));
    }
    let updated = sqlx::query_as::<_, EmployeeExit>(
        "UPDATE employee_exits SET status = ?, updated_at = ? WHERE id = ? RETURNING *",
    )
    .bind(to)
    .bind(Utc::now())
    .bind(id)
    .fetch_one(pool)
    .await?;
    Ok(updated)
}

pub async fn approve_exit(pool: &SqlitePool, id: i64) -> Result<EmployeeExit, AppError> {
    move_exit(pool, id, ExitStatus::Pending, ExitStatus::Approved).await
}

pub async fn withdraw_exit(pool: &SqlitePool, id: i64) -> Result<EmployeeExit, AppError> {
    let record = get_exit(pool, id).await?;
    if !matches!(record.status, ExitStatus::Pending | ExitStatus::Approved) {
        return Err(AppError::BadRequest(format!(
            "Exit is {:?} and cannot be withdrawn",
            record.status
        )));
    }
    let mut tx = pool.begin().await?;
    let updated = sqlx::query_as::<_, EmployeeExit>(
        "UPDATE employee_exits SET status = ?, updated_at = ? WHERE id = ? RETURNING *",
    )
    .bind(ExitStatus::Withdrawn)
    .bind(Utc::now())
    .bind(id)
    .fetch_one(&mut *tx)
    .await?;
    db::employees::set_status(&mut *tx, record.employee_id, EmployeeStatus::Active).await?;
    tx.commit().await?;
    Ok(updated)
}

/// Marks the employee as exited and disables every login linked to them.
pub async fn complete_exit(pool: &SqlitePool, id: i64, notes: Option<&str>) -> Result<EmployeeExit, AppError> {
    let record = get_exit(pool, id).await?;
    if record.status != ExitStatus::Approved {
        return Err(AppError::BadRequest(format!(
            "Only approved exits can be completed (current: {:?})",
            record.status
        )));
    }
    let mut tx = pool.begin().await?;
    let completed = sqlx::query_as::<_, EmployeeExit>(
        "UPDATE employee_exits SET status = ?, exit_interview_notes = COALESCE(?, exit_interview_notes), updated_at = ?
         WHERE id = ? RETURNING *",
    )
    .bind(ExitStatus::Completed)
    .bind(notes)
    .bind(Utc::now())
    .bind(id)
    .fetch_one(&mut *tx)
    .await?;
    db::employees::set_status(&mut *tx, record.employee_id, EmployeeStatus::Exited).await?;
    let disabled = db::users::deactivate_for_employee(&mut *tx, record.employee_id).await?;
    tx.commit().await?;

    log::info!(
        "Exit {} completed for employee {}; {} login(s) disabled",
        id,
        record.employee_id,
        disabled
    );
    Ok(completed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{auth::Role, db::test_support, structs::talent::ProgressUpdate};
    use chrono::NaiveDate;

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, d).unwrap()
    }

    #[actix_web::test]
    async fn full_program_rejects_enrollment() {
        let (_dir, pool) = test_support::tenant_pool().await;
        let first = test_support::employee(&pool, "T001").await;
        let second = test_support::employee(&pool, "T002").await;
        let program = create_program(
            &pool,
            &ProgramInput {
                title: "Fire Safety".to_owned(),
                description: None,
                trainer: None,
                start_date: date(5, 1),
                end_date: date(5, 2),
                capacity: Some(1),
            },
        )
        .await
        .unwrap();

        let seat = enroll(&pool, program.id, first.id).await.unwrap();
        assert!(matches!(enroll(&pool, program.id, first.id).await, Err(AppError::Conflict(_))));
        assert!(matches!(enroll(&pool, program.id, second.id).await, Err(AppError::Conflict(_))));

        let done = complete_enrollment(
            &pool,
            program.id,
            seat.id,
            &CompletionInput {
                score: Some(88.0),
                completed_on: Some(date(5, 2)),
            },
        )
        .await
        .unwrap();
        assert_eq!(done.status, EnrollmentStatus::Completed);
    }

    #[actix_web::test]
    async fn weighted_progress_uses_goal_weights() {
        let (_dir, pool) = test_support::tenant_pool().await;
        let employee = test_support::employee(&pool, "G001").await;
        for (title, weight, progress) in [("Audit", 3.0, 100.0), ("Onboarding", 1.0, 20.0)] {
            let goal = create_goal(
                &pool,
                &GoalInput {
                    employee_id: employee.id,
                    title: title.to_owned(),
                    description: None,
                    target_date: None,
                    weight: Some(weight),
                },
            )
            .await
            .unwrap();
            let update = ProgressUpdate { progress };
            update_progress(&pool, goal.id, update.progress).await.unwrap();
        }
        let summary = performance_summary(&pool, employee.id).await.unwrap();
        assert_eq!(summary.weighted_progress, 80.0);
        assert_eq!(summary.goals[0].status, GoalStatus::Completed);
        assert_eq!(summary.goals[1].status, GoalStatus::InProgress);
    }

    #[actix_web::test]
    async fn completed_exit_disables_logins() {
        let (_dir, pool) = test_support::tenant_pool().await;
        let employee = test_support::employee(&pool, "X001").await;
        let user = db::users::create_user(
            &pool,
            "x001@example.com",
            "Sup3r$ecretPass",
            Role::Employee,
            Some(employee.id),
        )
        .await
        .unwrap();

        let record = resign(
            &pool,
            employee.id,
            &ResignationInput {
                employee_id: None,
                resignation_date: date(6, 1),
                last_working_day: date(6, 30),
                reason: None,
            },
        )
        .await
        .unwrap();
        assert!(matches!(complete_exit(&pool, record.id, None).await, Err(AppError::BadRequest(_))));
        approve_exit(&pool, record.id).await.unwrap();
        complete_exit(&pool, record.id, Some("Relocating")).await.unwrap();

        let employee = db::employees::get_employee(&pool, employee.id).await.unwrap();
        assert_eq!(employee.status, EmployeeStatus::Exited);
        assert!(!db::users::get_user(&pool, user.id).await.unwrap().is_active);
    }
}
