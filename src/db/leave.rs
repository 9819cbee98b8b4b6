use chrono::{Datelike, NaiveDate, Utc};
use sqlx::{Executor, Sqlite, SqlitePool};

use crate::{
    db,
    errors::AppError,
    rules::{
        calendar::{working_days_between, MonthSpan},
        leave::{chargeable_days, ensure_balance},
    },
    structs::leave::{
        BalanceInput, BalanceQuery, LeaveApplication, LeaveApplyInput, LeaveBalance, LeaveQuery,
        LeaveStatus, LeaveType, LeaveTypeInput,
    },
};

pub async fn get_all_leave_types(pool: &SqlitePool) -> Result<Vec<LeaveType>, sqlx::Error> {
    sqlx::query_as::<_, LeaveType>("SELECT * FROM leave_types ORDER BY name")
        .fetch_all(pool)
        .await
}

pub async fn get_leave_type<'e, E>(executor: E, id: i64) -> Result<LeaveType, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, LeaveType>("SELECT * FROM leave_types WHERE id = ?")
        .bind(id)
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| AppError::NotFound("Leave type not found".to_owned()))
}

pub async fn create_leave_type(pool: &SqlitePool, input: &LeaveTypeInput) -> Result<LeaveType, AppError> {
    let leave_type = sqlx::query_as::<_, LeaveType>(
        "INSERT INTO leave_types (name, code, annual_quota, is_paid, created_at)
         VALUES (?, ?, ?, ?, ?) RETURNING *",
    )
    .bind(input.name.trim())
    .bind(input.code.trim().to_uppercase())
    .bind(input.annual_quota)
    .bind(input.is_paid)
    .bind(Utc::now())
    .fetch_one(pool)
    .await
    .map_err(|e| match AppError::from(e) {
        AppError::Conflict(_) => AppError::Conflict(format!(
            "Leave type '{}' or code '{}' already exists",
            input.name, input.code
        )),
        other => other,
    })?;
    log::info!("Leave type created: {}", leave_type.code);
    Ok(leave_type)
}

/// Existing balances keep their allocation; only new ones pick up the new quota.
pub async fn update_leave_type(pool: &SqlitePool, id: i64, input: &LeaveTypeInput) -> Result<LeaveType, AppError> {
    sqlx::query_as::<_, LeaveType>(
        "UPDATE leave_types SET name = ?, code = ?, annual_quota = ?, is_paid = ?
         WHERE id = ? RETURNING *",
    )
    .bind(input.name.trim())
    .bind(input.code.trim().to_uppercase())
    .bind(input.annual_quota)
    .bind(input.is_paid)
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Leave type not found".to_owned()))
}

pub async fn delete_leave_type(pool: &SqlitePool, id: i64) -> Result<(), AppError> {
    let result = sqlx::query("DELETE FROM leave_types WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .map_err(|e| match AppError::from(e) {
            AppError::Conflict(_) => {
                AppError::Conflict("Leave type is referenced by applications".to_owned())
            }
            other => other,
        })?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Leave type not found".to_owned()));
    }
    log::info!("Leave type with id {} deleted", id);
    Ok(())
}

pub async fn get_balances(pool: &SqlitePool, query: &BalanceQuery) -> Result<Vec<LeaveBalance>, sqlx::Error> {
    sqlx::query_as::<_, LeaveBalance>(
        "SELECT * FROM leave_balances
         WHERE (? IS NULL OR employee_id = ?)
           AND (? IS NULL OR year = ?)
         ORDER BY employee_id, year, leave_type_id",
    )
    .bind(query.employee_id)
    .bind(query.employee_id)
    .bind(query.year)
    .bind(query.year)
    .fetch_all(pool)
    .await
}

/// Balance row for the year, created from the type's annual quota on first use.
pub async fn balance_for(
    conn: &mut sqlx::SqliteConnection,
    employee_id: i64,
    leave_type_id: i64,
    year: i64,
) -> Result<LeaveBalance, AppError> {
    sqlx::query(
        "INSERT INTO leave_balances (employee_id, leave_type_id, year, allocated, used)
         SELECT ?, id, ?, annual_quota, 0 FROM leave_types WHERE id = ?
         ON CONFLICT (employee_id, leave_type_id, year) DO NOTHING",
    )
    .bind(employee_id)
    .bind(year)
    .bind(leave_type_id)
    .execute(&mut *conn)
    .await?;

    sqlx::query_as::<_, LeaveBalance>(
        "SELECT * FROM leave_balances WHERE employee_id = ? AND leave_type_id = ? AND year = ?",
    )
    .bind(employee_id)
    .bind(leave_type_id)
    .bind(year)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::NotFound("Leave type not found".to_owned()))
}

/// HR override of the yearly allocation.
pub async fn set_balance(pool: &SqlitePool, input: &BalanceInput) -> Result<LeaveBalance, AppError> {
    db::employees::ensure_exists(pool, input.employee_id).await?;
    get_leave_type(pool, input.leave_type_id).await?;
    let balance = sqlx::query_as::<_, LeaveBalance>(
        "INSERT INTO leave_balances (employee_id, leave_type_id, year, allocated, used)
         VALUES (?, ?, ?, ?, 0)
         ON CONFLICT (employee_id, leave_type_id, year) DO UPDATE SET allocated = excluded.allocated
         RETURNING *",
    )
    .bind(input.employee_id)
    .bind(input.leave_type_id)
    .bind(input.year)
    .bind(input.allocated)
    .fetch_one(pool)
    .await?;
    if balance.allocated < balance.used {
        log::warn!(
            "Balance {} allocated {} is below used {}",
            balance.id,
            balance.allocated,
            balance.used
        );
    }
    Ok(balance)
}

pub async fn get_applications(pool: &SqlitePool, query: &LeaveQuery) -> Result<Vec<LeaveApplication>, sqlx::Error> {
    sqlx::query_as::<_, LeaveApplication>(
        "SELECT * FROM leave_applications
         WHERE (? IS NULL OR employee_id = ?)
           AND (? IS NULL OR status = ?)
         ORDER BY start_date DESC, id DESC",
    )
    .bind(query.employee_id)
    .bind(query.employee_id)
    .bind(query.status)
    .bind(query.status)
    .fetch_all(pool)
    .await
}

pub async fn get_application<'e, E>(executor: E, id: i64) -> Result<LeaveApplication, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, LeaveApplication>("SELECT * FROM leave_applications WHERE id = ?")
        .bind(id)
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Leave application {id} not found")))
}

async fn pending_days<'e, E>(executor: E, employee_id: i64, leave_type_id: i64, year: i64) -> Result<f64, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_scalar::<_, f64>(
        "SELECT TOTAL(days) FROM leave_applications
         WHERE employee_id = ? AND leave_type_id = ? AND status = ?
           AND strftime('%Y', start_date) = printf('%04d', ?)",
    )
    .bind(employee_id)
    .bind(leave_type_id)
    .bind(LeaveStatus::Pending)
    .bind(year)
    .fetch_one(executor)
    .await
}

pub async fn apply(pool: &SqlitePool, employee_id: i64, input: &LeaveApplyInput) -> Result<LeaveApplication, AppError> {
    db::employees::ensure_exists(pool, employee_id).await?;
    let holidays = db::org::holiday_set(pool, input.start_date, input.end_date).await?;
    let days = chargeable_days(input.start_date, input.end_date, input.half_day, &holidays)?;
    let year = i64::from(input.start_date.year());

    let mut tx = pool.begin().await?;
    let leave_type = get_leave_type(&mut *tx, input.leave_type_id).await?;

    let overlapping = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM leave_applications
         WHERE employee_id = ? AND status IN (?, ?) AND start_date <= ? AND end_date >= ?",
    )
    .bind(employee_id)
    .bind(LeaveStatus::Pending)
    .bind(LeaveStatus::Approved)
    .bind(input.end_date)
    .bind(input.start_date)
    .fetch_one(&mut *tx)
    .await?;
    if overlapping > 0 {
        return Err(AppError::Conflict(
            "An overlapping leave application already exists".to_owned(),
        ));
    }

    if leave_type.is_paid {
        let balance = balance_for(&mut tx, employee_id, leave_type.id, year).await?;
        let pending = pending_days(&mut *tx, employee_id, leave_type.id, year).await?;
        ensure_balance(days, balance.allocated, balance.used, pending)?;
    }

    let now = Utc::now();
    let application = sqlx::query_as::<_, LeaveApplication>(
        "INSERT INTO leave_applications (employee_id, leave_type_id, start_date, end_date, half_day,
            days, reason, status, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING *",
    )
    .bind(employee_id)
    .bind(leave_type.id)
    .bind(input.start_date)
    .bind(input.end_date)
    .bind(input.half_day)
    .bind(days)
    .bind(&input.reason)
    .bind(LeaveStatus::Pending)
    .bind(now)
    .bind(now)
    .fetch_one(&mut *tx)
    .await?;
    tx.commit().await?;

    log::info!(
        "Leave application {} for employee {}: {} day(s) of {}",
        application.id,
        employee_id,
        days,
        leave_type.code
    );
    Ok(application)
}

async fn set_decision<'e, E>(
    executor: E,
    id: i64,
    status: LeaveStatus,
    reviewer: &str,
    comment: Option<&str>,
) -> Result<LeaveApplication, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, LeaveApplication>(
        "UPDATE leave_applications SET status = ?, reviewed_by = ?, review_comment = ?, updated_at = ?
         WHERE id = ? RETURNING *",
    )
    .bind(status)
    .bind(reviewer)
    .bind(comment)
    .bind(Utc::now())
    .bind(id)
    .fetch_one(executor)
    .await
}

/// Approves a pending application and charges its days to the balance.
pub async fn approve(pool: &SqlitePool, id: i64, reviewer: &str, comment: Option<&str>) -> Result<LeaveApplication, AppError> {
    let mut tx = pool.begin().await?;
    let application = get_application(&mut *tx, id).await?;
    if application.status != LeaveStatus::Pending {
        return Err(AppError::BadRequest(format!(
            "Only pending applications can be approved (current: {:?})",
            application.status
        )));
    }

    let leave_type = get_leave_type(&mut *tx, application.leave_type_id).await?;
    if leave_type.is_paid {
        let year = i64::from(application.start_date.year());
        let balance = balance_for(&mut tx, application.employee_id, leave_type.id, year).await?;
        ensure_balance(application.days, balance.allocated, balance.used, 0.0)?;
        sqlx::query("UPDATE leave_balances SET used = used + ? WHERE id = ?")
            .bind(application.days)
            .bind(balance.id)
            .execute(&mut *tx)
            .await?;
    }

    let approved = set_decision(&mut *tx, id, LeaveStatus::Approved, reviewer, comment).await?;
    tx.commit().await?;
    log::info!("Leave application {} approved by {}", id, reviewer);
    Ok(approved)
}

pub async fn reject(pool: &SqlitePool, id: i64, reviewer: &str, comment: Option<&str>) -> Result<LeaveApplication, AppError> {
    let mut tx = pool.begin().await?;
    let application = get_application(&mut *tx, id).await?;
    if application.status != LeaveStatus::Pending {
        return Err(AppError::BadRequest(format!(
            "Only pending applications can be rejected (current: {:?})",
            application.status
        )));
    }
    let rejected = set_decision(&mut *tx, id, LeaveStatus::Rejected, reviewer, comment).await?;
    tx.commit().await?;
    log::info!("Leave application {} rejected by {}", id, reviewer);
    Ok(rejected)
}

/// Cancelling an approved application gives the days back.
pub async fn cancel(pool: &SqlitePool, id: i64, actor: &str) -> Result<LeaveApplication, AppError> {
    let mut tx = pool.begin().await?;
    let application = get_application(&mut *tx, id).await?;
    match application.status {
        LeaveStatus::Pending => {}
        LeaveStatus::Approved => {
            let leave_type = get_leave_type(&mut *tx, application.leave_type_id).await?;
            if leave_type.is_paid {
                sqlx::query(
                    "UPDATE leave_balances SET used = MAX(used - ?, 0)
                     WHERE employee_id = ? AND leave_type_id = ? AND year = ?",
                )
                .bind(application.days)
                .bind(application.employee_id)
                .bind(application.leave_type_id)
                .bind(i64::from(application.start_date.year()))
                .execute(&mut *tx)
                .await?;
            }
        }
        other => {
            return Err(AppError::BadRequest(format!(
                "Application is already {other:?}"
            )))
        }
    }
    let cancelled = sqlx::query_as::<_, LeaveApplication>(
        "UPDATE leave_applications SET status = ?, updated_at = ? WHERE id = ? RETURNING *",
    )
    .bind(LeaveStatus::Cancelled)
    .bind(Utc::now())
    .bind(id)
    .fetch_one(&mut *tx)
    .await?;
    tx.commit().await?;
    log::info!("Leave application {} cancelled by {}", id, actor);
    Ok(cancelled)
}

/// Approved unpaid leave days falling inside the month, for loss of pay.
pub async fn unpaid_leave_days(pool: &SqlitePool, employee_id: i64, month: &MonthSpan) -> Result<f64, sqlx::Error> {
    let ranges = sqlx::query_as::<_, (NaiveDate, NaiveDate, bool)>(
        "SELECT a.start_date, a.end_date, a.half_day
         FROM leave_applications a JOIN leave_types t ON t.id = a.leave_type_id
         WHERE a.employee_id = ? AND a.status = ? AND t.is_paid = 0
           AND a.start_date <= ? AND a.end_date >= ?",
    )
    .bind(employee_id)
    .bind(LeaveStatus::Approved)
    .bind(month.last)
    .bind(month.first)
    .fetch_all(pool)
    .await?;
    if ranges.is_empty() {
        return Ok(0.0);
    }

    let holidays = db::org::holiday_set(pool, month.first, month.last).await?;
    let days = ranges
        .into_iter()
        .map(|(start, end, half_day)| {
            let days = working_days_between(start.max(month.first), end.min(month.last), &holidays) as f64;
            if half_day {
                days * 0.5
            } else {
                days
            }
        })
        .sum();
    Ok(days)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support;

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, d).unwrap()
    }

    async fn casual_leave(pool: &SqlitePool, quota: f64, is_paid: bool) -> LeaveType {
        create_leave_type(
            pool,
            &LeaveTypeInput {
                name: if is_paid { "Casual" } else { "Unpaid" }.to_owned(),
                code: if is_paid { "CL" } else { "LWP" }.to_owned(),
                annual_quota: quota,
                is_paid,
            },
        )
        .await
        .unwrap()
    }

    fn request(leave_type_id: i64, start: NaiveDate, end: NaiveDate) -> LeaveApplyInput {
        LeaveApplyInput {
            employee_id: None,
            leave_type_id,
            start_date: start,
            end_date: end,
            half_day: false,
            reason: None,
        }
    }

    async fn used(pool: &SqlitePool, employee_id: i64) -> f64 {
        let balances = get_balances(
            pool,
            &BalanceQuery {
                employee_id: Some(employee_id),
                year: Some(2024),
            },
        )
        .await
        .unwrap();
        balances.iter().map(|b| b.used).sum()
    }

    #[actix_web::test]
    async fn over_balance_is_rejected_and_balance_unchanged() {
        let (_dir, pool) = test_support::tenant_pool().await;
        let employee = test_support::employee(&pool, "L001").await;
        let casual = casual_leave(&pool, 2.0, true).await;

        let too_long = apply(&pool, employee.id, &request(casual.id, date(3, 4), date(3, 6))).await;
        assert!(matches!(too_long, Err(AppError::BadRequest(_))));
        assert_eq!(used(&pool, employee.id).await, 0.0);
        let listed = get_applications(&pool, &LeaveQuery::default()).await.unwrap();
        assert!(listed.is_empty());
    }

    #[actix_web::test]
    async fn approve_and_cancel_move_used_days() {
        let (_dir, pool) = test_support::tenant_pool().await;
        let employee = test_support::employee(&pool, "L002").await;
        let casual = casual_leave(&pool, 12.0, true).await;

        let application = apply(&pool, employee.id, &request(casual.id, date(3, 4), date(3, 5)))
            .await
            .unwrap();
        assert_eq!(application.days, 2.0);
        let overlap = apply(&pool, employee.id, &request(casual.id, date(3, 5), date(3, 5))).await;
        assert!(matches!(overlap, Err(AppError::Conflict(_))));

        approve(&pool, application.id, "hr@example.com", None).await.unwrap();
        assert_eq!(used(&pool, employee.id).await, 2.0);
        let twice = approve(&pool, application.id, "hr@example.com", None).await;
        assert!(matches!(twice, Err(AppError::BadRequest(_))));

        let cancelled = cancel(&pool, application.id, "hr@example.com").await.unwrap();
        assert_eq!(cancelled.status, LeaveStatus::Cancelled);
        assert_eq!(used(&pool, employee.id).await, 0.0);
    }

    #[actix_web::test]
    async fn unpaid_days_are_clipped_to_month() {
        let (_dir, pool) = test_support::tenant_pool().await;
        let employee = test_support::employee(&pool, "L003").await;
        let unpaid = casual_leave(&pool, 0.0, false).await;

        // Thu 2024-02-29 .. Mon 2024-03-04: Fri, Sat and Mon fall in March.
        let application = apply(&pool, employee.id, &request(unpaid.id, date(2, 29), date(3, 4)))
            .await
            .unwrap();
        approve(&pool, application.id, "hr@example.com", None).await.unwrap();

        let march = MonthSpan::parse("2024-03").unwrap();
        assert_eq!(unpaid_leave_days(&pool, employee.id, &march).await.unwrap(), 3.0);
    }
}
