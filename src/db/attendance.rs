use chrono::{NaiveDate, NaiveDateTime};
use sqlx::SqlitePool;

use crate::{
    db,
    errors::AppError,
    rules::{attendance::ShiftRules, calendar::MonthSpan},
    structs::{
        attendance::{Attendance, AttendanceStatus, AttendanceSummary},
        org::DateRangeQuery,
    },
};

async fn rules_for(pool: &SqlitePool, employee_id: i64, work_date: NaiveDate) -> Result<ShiftRules, sqlx::Error> {
    let shift = db::org::effective_shift(pool, employee_id, work_date).await?;
    Ok(shift.as_ref().map(ShiftRules::from).unwrap_or_default())
}

async fn open_on(pool: &SqlitePool, employee_id: i64, work_date: NaiveDate) -> Result<Option<Attendance>, sqlx::Error> {
    sqlx::query_as::<_, Attendance>(
        "SELECT * FROM attendance WHERE employee_id = ? AND work_date = ? AND punch_out IS NULL",
    )
    .bind(employee_id)
    .bind(work_date)
    .fetch_optional(pool)
    .await
}

/// The punch a punch-out closes: today's open row, or yesterday's when that
/// day's shift runs past midnight into `at`.
async fn open_punch(pool: &SqlitePool, employee_id: i64, at: NaiveDateTime) -> Result<Option<Attendance>, sqlx::Error> {
    if let Some(open) = open_on(pool, employee_id, at.date()).await? {
        return Ok(Some(open));
    }
    let Some(previous) = at.date().pred_opt() else {
        return Ok(None);
    };
    let rules = rules_for(pool, employee_id, previous).await?;
    if rules.shift_end(previous).date() != at.date() {
        return Ok(None);
    }
    open_on(pool, employee_id, previous).await
}

pub async fn get_attendance(pool: &SqlitePool, id: i64) -> Result<Attendance, AppError> {
    sqlx::query_as::<_, Attendance>("SELECT * FROM attendance WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Attendance record not found".to_owned()))
}

pub async fn get_attendance_list(pool: &SqlitePool, query: &DateRangeQuery) -> Result<Vec<Attendance>, sqlx::Error> {
    sqlx::query_as::<_, Attendance>(
        "SELECT * FROM attendance
         WHERE (? IS NULL OR employee_id = ?)
           AND (? IS NULL OR work_date >= ?)
           AND (? IS NULL OR work_date <= ?)
         ORDER BY work_date DESC, employee_id",
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

pub async fn punch_in(
    pool: &SqlitePool,
    employee_id: i64,
    at: NaiveDateTime,
    remarks: Option<&str>,
) -> Result<Attendance, AppError> {
    db::employees::ensure_exists(pool, employee_id).await?;
    let rules = rules_for(pool, employee_id, at.date()).await?;
    let status = rules.status_on_punch_in(at);

    let record = sqlx::query_as::<_, Attendance>(
        "INSERT INTO attendance (employee_id, work_date, punch_in, status, remarks)
         VALUES (?, ?, ?, ?, ?) RETURNING *",
    )
    .bind(employee_id)
    .bind(at.date())
    .bind(at)
    .bind(status)
    .bind(remarks)
    .fetch_one(pool)
    .await
    .map_err(|e| match AppError::from(e) {
        AppError::Conflict(_) => AppError::Conflict(format!(
            "Employee {employee_id} already punched in on {}",
            at.date()
        )),
        other => other,
    })?;
    log::info!(
        "Punch-in for employee {} at {} ({:?})",
        employee_id,
        at,
        record.status
    );
    Ok(record)
}

pub async fn punch_out(
    pool: &SqlitePool,
    employee_id: i64,
    at: NaiveDateTime,
    remarks: Option<&str>,
) -> Result<Attendance, AppError> {
    let open = match open_punch(pool, employee_id, at).await? {
        Some(open) => open,
        None => {
            let closed: Option<i64> = sqlx::query_scalar(
                "SELECT id FROM attendance WHERE employee_id = ? AND work_date = ?",
            )
            .bind(employee_id)
            .bind(at.date())
            .fetch_optional(pool)
            .await?;
            return Err(match closed {
                Some(_) => AppError::Conflict("Already punched out for today".to_owned()),
                None => AppError::BadRequest("No punch-in recorded for today".to_owned()),
            });
        }
    };

    let rules = rules_for(pool, employee_id, open.work_date).await?;
    let outcome = rules.evaluate(open.punch_in, at)?;

    let record = sqlx::query_as::<_, Attendance>(
        "UPDATE attendance SET punch_out = ?, status = ?, worked_hours = ?, overtime_hours = ?,
            remarks = COALESCE(?, remarks)
         WHERE id = ? RETURNING *",
    )
    .bind(at)
    .bind(outcome.status)
    .bind(outcome.worked_hours)
    .bind(outcome.overtime_hours)
    .bind(remarks)
    .bind(open.id)
    .fetch_one(pool)
    .await?;
    log::info!(
        "Punch-out for employee {}: {} h ({:?})",
        employee_id,
        record.worked_hours,
        record.status
    );
    Ok(record)
}

/// HR correction of both punches; status and hours are derived again.
pub async fn regularize(
    pool: &SqlitePool,
    id: i64,
    punch_in: NaiveDateTime,
    punch_out: Option<NaiveDateTime>,
    remarks: Option<&str>,
) -> Result<Attendance, AppError> {
    let current = get_attendance(pool, id).await?;
    if punch_in.date() != current.work_date {
        return Err(AppError::BadRequest(
            "Punch-in must stay on the original work date".to_owned(),
        ));
    }
    let rules = rules_for(pool, current.employee_id, current.work_date).await?;
    let (status, worked_hours, overtime_hours) = match punch_out {
        Some(out) => {
            let outcome = rules.evaluate(punch_in, out)?;
            (outcome.status, outcome.worked_hours, outcome.overtime_hours)
        }
        None => (rules.status_on_punch_in(punch_in), 0.0, 0.0),
    };

    let record = sqlx::query_as::<_, Attendance>(
        "UPDATE attendance SET punch_in = ?, punch_out = ?, status = ?, worked_hours = ?,
            overtime_hours = ?, remarks = COALESCE(?, remarks)
         WHERE id = ? RETURNING *",
    )
    .bind(punch_in)
    .bind(punch_out)
    .bind(status)
    .bind(worked_hours)
    .bind(overtime_hours)
    .bind(remarks)
    .bind(id)
    .fetch_one(pool)
    .await?;
    log::info!("Attendance {} regularized", id);
    Ok(record)
}

pub async fn month_summary(
    pool: &SqlitePool,
    employee_id: i64,
    month: &MonthSpan,
) -> Result<AttendanceSummary, sqlx::Error> {
    let (present, late, half_day, absent, worked_hours, overtime_hours) =
        sqlx::query_as::<_, (i64, i64, i64, i64, f64, f64)>(
            "SELECT
                COALESCE(SUM(CASE WHEN status = ? THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN status = ? THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN status = ? THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN status = ? THEN 1 ELSE 0 END), 0),
                TOTAL(worked_hours),
                TOTAL(overtime_hours)
             FROM attendance
             WHERE employee_id = ? AND work_date BETWEEN ? AND ?",
        )
        .bind(AttendanceStatus::Present)
        .bind(AttendanceStatus::Late)
        .bind(AttendanceStatus::HalfDay)
        .bind(AttendanceStatus::Absent)
        .bind(employee_id)
        .bind(month.first)
        .bind(month.last)
        .fetch_one(pool)
        .await?;

    Ok(AttendanceSummary {
        employee_id,
        month: month.label(),
        present,
        late,
        half_day,
        absent,
        worked_hours,
        overtime_hours,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{db::test_support, structs::org::ShiftInput};
    use chrono::{NaiveDate, NaiveTime};

    fn at(d: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, d)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[actix_web::test]
    async fn punch_cycle_derives_status_from_shift() {
        let (_dir, pool) = test_support::tenant_pool().await;
        let employee = test_support::employee(&pool, "E001").await;

        let first = punch_in(&pool, employee.id, at(4, 9, 40), None).await.unwrap();
        assert_eq!(first.status, AttendanceStatus::Late);
        let again = punch_in(&pool, employee.id, at(4, 10, 0), None).await;
        assert!(matches!(again, Err(AppError::Conflict(_))));

        let done = punch_out(&pool, employee.id, at(4, 19, 40), Some("stayed late"))
            .await
            .unwrap();
        assert_eq!(done.status, AttendanceStatus::Late);
        assert_eq!(done.worked_hours, 10.0);
        assert_eq!(done.overtime_hours, 2.0);

        let missing = punch_out(&pool, employee.id, at(5, 18, 0), None).await;
        assert!(matches!(missing, Err(AppError::BadRequest(_))));
    }

    #[actix_web::test]
    async fn roster_shift_overrides_default() {
        let (_dir, pool) = test_support::tenant_pool().await;
        let employee = test_support::employee(&pool, "E002").await;
        let night = db::org::create_shift(
            &pool,
            &ShiftInput {
                name: "Late".to_owned(),
                start_time: NaiveTime::from_hms_opt(11, 0, 0).unwrap(),
                end_time: NaiveTime::from_hms_opt(20, 0, 0).unwrap(),
                grace_minutes: 10,
                half_day_hours: 4.0,
                full_day_hours: 8.0,
            },
        )
        .await
        .unwrap();
        db::org::assign_roster(
            &pool,
            &crate::structs::org::RosterInput {
                employee_id: employee.id,
                shift_id: night.id,
                roster_date: at(6, 0, 0).date(),
            },
        )
        .await
        .unwrap();

        let record = punch_in(&pool, employee.id, at(6, 11, 5), None).await.unwrap();
        assert_eq!(record.status, AttendanceStatus::Present);
    }

    #[actix_web::test]
    async fn night_shift_punch_out_closes_previous_day() {
        let (_dir, pool) = test_support::tenant_pool().await;
        let employee = test_support::employee(&pool, "E004").await;
        let night = db::org::create_shift(
            &pool,
            &ShiftInput {
                name: "Night".to_owned(),
                start_time: NaiveTime::from_hms_opt(22, 0, 0).unwrap(),
                end_time: NaiveTime::from_hms_opt(6, 0, 0).unwrap(),
                grace_minutes: 15,
                half_day_hours: 4.0,
                full_day_hours: 8.0,
            },
        )
        .await
        .unwrap();
        db::org::assign_roster(
            &pool,
            &crate::structs::org::RosterInput {
                employee_id: employee.id,
                shift_id: night.id,
                roster_date: at(4, 0, 0).date(),
            },
        )
        .await
        .unwrap();

        let started = punch_in(&pool, employee.id, at(4, 22, 0), None).await.unwrap();
        assert_eq!(started.status, AttendanceStatus::Present);

        let done = punch_out(&pool, employee.id, at(5, 6, 0), None).await.unwrap();
        assert_eq!(done.id, started.id);
        assert_eq!(done.work_date, at(4, 0, 0).date());
        assert_eq!(done.status, AttendanceStatus::Present);
        assert_eq!(done.worked_hours, 8.0);

        let twice = punch_out(&pool, employee.id, at(5, 6, 30), None).await;
        assert!(matches!(twice, Err(AppError::BadRequest(_))));
    }

    #[actix_web::test]
    async fn day_shift_does_not_close_yesterdays_punch() {
        let (_dir, pool) = test_support::tenant_pool().await;
        let employee = test_support::employee(&pool, "E005").await;
        punch_in(&pool, employee.id, at(4, 9, 0), None).await.unwrap();

        let next_day = punch_out(&pool, employee.id, at(5, 9, 0), None).await;
        assert!(matches!(next_day, Err(AppError::BadRequest(_))));
    }

    #[actix_web::test]
    async fn summary_counts_statuses() {
        let (_dir, pool) = test_support::tenant_pool().await;
        let employee = test_support::employee(&pool, "E003").await;
        punch_in(&pool, employee.id, at(4, 9, 0), None).await.unwrap();
        punch_out(&pool, employee.id, at(4, 17, 0), None).await.unwrap();
        punch_in(&pool, employee.id, at(5, 9, 0), None).await.unwrap();
        punch_out(&pool, employee.id, at(5, 14, 0), None).await.unwrap();

        let summary = month_summary(&pool, employee.id, &MonthSpan::parse("2024-03").unwrap())
            .await
            .unwrap();
        assert_eq!(summary.present, 1);
        assert_eq!(summary.half_day, 1);
        assert_eq!(summary.absent, 0);
        assert_eq!(summary.worked_hours, 13.0);
    }
}
