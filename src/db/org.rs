use chrono::{NaiveDate, Utc};
use sqlx::SqlitePool;
use std::collections::HashSet;

use crate::{
    errors::AppError,
    structs::org::{
        DateRangeQuery, Department, DepartmentInput, Holiday, HolidayInput, RosterAssignment,
        RosterInput, Shift, ShiftInput,
    },
};

pub async fn get_all_departments(pool: &SqlitePool) -> Result<Vec<Department>, sqlx::Error> {
    sqlx::query_as::<_, Department>("SELECT * FROM departments ORDER BY name")
        .fetch_all(pool)
        .await
}

pub async fn get_department(pool: &SqlitePool, id: i64) -> Result<Department, AppError> {
    sqlx::query_as::<_, Department>("SELECT * FROM departments WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Department not found".to_owned()))
}

pub async fn create_department(pool: &SqlitePool, input: &DepartmentInput) -> Result<Department, AppError> {
    let now = Utc::now();
    let department = sqlx::query_as::<_, Department>(
        "INSERT INTO departments (name, code, description, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?) RETURNING *",
    )
    .bind(input.name.trim())
    .bind(&input.code)
    .bind(&input.description)
    .bind(now)
    .bind(now)
    .fetch_one(pool)
    .await
    .map_err(|e| match AppError::from(e) {
        AppError::Conflict(_) => {
            AppError::Conflict(format!("Department '{}' already exists", input.name))
        }
        other => other,
    })?;
    log::info!("Department created: {}", department.name);
    Ok(department)
}

pub async fn update_department(
    pool: &SqlitePool,
    id: i64,
    input: &DepartmentInput,
) -> Result<Department, AppError> {
    sqlx::query_as::<_, Department>(
        "UPDATE departments SET name = ?, code = ?, description = ?, updated_at = ?
         WHERE id = ? RETURNING *",
    )
    .bind(input.name.trim())
    .bind(&input.code)
    .bind(&input.description)
    .bind(Utc::now())
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Department not found".to_owned()))
}

pub async fn delete_department(pool: &SqlitePool, id: i64) -> Result<(), AppError> {
    let result = sqlx::query("DELETE FROM departments WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .map_err(|e| match AppError::from(e) {
            AppError::Conflict(_) => {
                AppError::Conflict("Department still has employees assigned".to_owned())
            }
            other => other,
        })?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Department not found".to_owned()));
    }
    log::info!("Department with id {} deleted", id);
    Ok(())
}

pub async fn get_all_shifts(pool: &SqlitePool) -> Result<Vec<Shift>, sqlx::Error> {
    sqlx::query_as::<_, Shift>("SELECT * FROM shifts ORDER BY start_time")
        .fetch_all(pool)
        .await
}

pub async fn get_shift(pool: &SqlitePool, id: i64) -> Result<Shift, AppError> {
    sqlx::query_as::<_, Shift>("SELECT * FROM shifts WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Shift not found".to_owned()))
}

pub async fn create_shift(pool: &SqlitePool, input: &ShiftInput) -> Result<Shift, AppError> {
    let now = Utc::now();
    let shift = sqlx::query_as::<_, Shift>(
        "INSERT INTO shifts (name, start_time, end_time, grace_minutes, half_day_hours, full_day_hours, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?) RETURNING *",
    )
    .bind(&input.name)
    .bind(input.start_time)
    .bind(input.end_time)
    .bind(input.grace_minutes)
    .bind(input.half_day_hours)
    .bind(input.full_day_hours)
    .bind(now)
    .bind(now)
    .fetch_one(pool)
    .await?;
    log::info!("Shift created: {}", shift.name);
    Ok(shift)
}

pub async fn update_shift(pool: &SqlitePool, id: i64, input: &ShiftInput) -> Result<Shift, AppError> {
    sqlx::query_as::<_, Shift>(
        "UPDATE shifts SET name = ?, start_time = ?, end_time = ?, grace_minutes = ?,
            half_day_hours = ?, full_day_hours = ?, updated_at = ?
         WHERE id = ? RETURNING *",
    )
    .bind(&input.name)
    .bind(input.start_time)
    .bind(input.end_time)
    .bind(input.grace_minutes)
    .bind(input.half_day_hours)
    .bind(input.full_day_hours)
    .bind(Utc::now())
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Shift not found".to_owned()))
}

pub async fn delete_shift(pool: &SqlitePool, id: i64) -> Result<(), AppError> {
    let result = sqlx::query("DELETE FROM shifts WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Shift not found".to_owned()));
    }
    log::info!("Shift with id {} deleted", id);
    Ok(())
}

/// Roster entry for the day, else the employee's default shift.
pub async fn effective_shift(
    pool: &SqlitePool,
    employee_id: i64,
    date: NaiveDate,
) -> Result<Option<Shift>, sqlx::Error> {
    sqlx::query_as::<_, Shift>(
        "SELECT s.* FROM shifts s
         WHERE s.id = COALESCE(
            (SELECT r.shift_id FROM roster_assignments r WHERE r.employee_id = ? AND r.roster_date = ?),
            (SELECT e.shift_id FROM employees e WHERE e.id = ?)
         )",
    )
    .bind(employee_id)
    .bind(date)
    .bind(employee_id)
    .fetch_optional(pool)
    .await
}

pub async fn get_roster(pool: &SqlitePool, query: &DateRangeQuery) -> Result<Vec<RosterAssignment>, sqlx::Error> {
    sqlx::query_as::<_, RosterAssignment>(
        "SELECT * FROM roster_assignments
         WHERE (? IS NULL OR employee_id = ?)
           AND (? IS NULL OR roster_date >= ?)
           AND (? IS NULL OR roster_date <= ?)
         ORDER BY roster_date, employee_id",
    )
    .bind(query.employee_id)
    .bind(query.employee_id)
    .bind(query.from)
    .bind(query.from)
    .bind(query.to)
    .bind(query.to)
    .fetch_all(pool)
    .await
}

/// Assigning the same employee and date again replaces the shift.
pub async fn assign_roster(pool: &SqlitePool, input: &RosterInput) -> Result<RosterAssignment, AppError> {
    let assignment = sqlx::query_as::<_, RosterAssignment>(
        "INSERT INTO roster_assignments (employee_id, shift_id, roster_date) VALUES (?, ?, ?)
         ON CONFLICT (employee_id, roster_date) DO UPDATE SET shift_id = excluded.shift_id
         RETURNING *",
    )
    .bind(input.employee_id)
    .bind(input.shift_id)
    .bind(input.roster_date)
    .fetch_one(pool)
    .await?;
    Ok(assignment)
}

pub async fn delete_roster(pool: &SqlitePool, id: i64) -> Result<(), AppError> {
    let result = sqlx::query("DELETE FROM roster_assignments WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Roster entry not found".to_owned()));
    }
    Ok(())
}

pub async fn get_holidays(pool: &SqlitePool, year: Option<i32>) -> Result<Vec<Holiday>, sqlx::Error> {
    sqlx::query_as::<_, Holiday>(
        "SELECT * FROM holidays WHERE (? IS NULL OR strftime('%Y', holiday_date) = printf('%04d', ?))
         ORDER BY holiday_date",
    )
    .bind(year)
    .bind(year)
    .fetch_all(pool)
    .await
}

pub async fn holiday_set(
    pool: &SqlitePool,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<HashSet<NaiveDate>, sqlx::Error> {
    let dates = sqlx::query_scalar::<_, NaiveDate>(
        "SELECT holiday_date FROM holidays WHERE holiday_date BETWEEN ? AND ?",
    )
    .bind(from)
    .bind(to)
    .fetch_all(pool)
    .await?;
    Ok(dates.into_iter().collect())
}

pub async fn create_holiday(pool: &SqlitePool, input: &HolidayInput) -> Result<Holiday, AppError> {
    let holiday = sqlx::query_as::<_, Holiday>(
        "INSERT INTO holidays (name, holiday_date) VALUES (?, ?) RETURNING *",
    )
    .bind(&input.name)
    .bind(input.holiday_date)
    .fetch_one(pool)
    .await?;
    Ok(holiday)
}

pub async fn delete_holiday(pool: &SqlitePool, id: i64) -> Result<(), AppError> {
    let result = sqlx::query("DELETE FROM holidays WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Holiday not found".to_owned()));
    }
    Ok(())
}
