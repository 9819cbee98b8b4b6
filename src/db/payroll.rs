use chrono::Utc;
use sqlx::{Executor, Sqlite, SqlitePool};

use crate::{
    db,
    errors::AppError,
    rules::{
        calendar::MonthSpan,
        payroll::{self, PayrollInputs, Payslip},
    },
    structs::payroll::{
        AdjustmentInput, AdjustmentKind, PayrollAdjustment, PayrollMonthQuery, PayrollRun,
        PayrollRunReport, PayrollRunRequest, PayrollStatus, SalaryStructure, SalaryStructureInput,
        SkippedEmployee,
    },
};

pub async fn get_structure(pool: &SqlitePool, employee_id: i64) -> Result<SalaryStructure, AppError> {
    find_structure(pool, employee_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("No salary structure for employee {employee_id}")))
}

async fn find_structure(pool: &SqlitePool, employee_id: i64) -> Result<Option<SalaryStructure>, sqlx::Error> {
    sqlx::query_as::<_, SalaryStructure>("SELECT * FROM salary_structures WHERE employee_id = ?")
        .bind(employee_id)
        .fetch_optional(pool)
        .await
}

pub async fn upsert_structure(
    pool: &SqlitePool,
    employee_id: i64,
    input: &SalaryStructureInput,
) -> Result<SalaryStructure, AppError> {
    db::employees::ensure_exists(pool, employee_id).await?;
    let structure = sqlx::query_as::<_, SalaryStructure>(
        "INSERT INTO salary_structures (employee_id, basic, hra, conveyance, medical_allowance,
            special_allowance, pf_enabled, esi_enabled, pt_enabled, tds_percent, overtime_enabled,
            effective_from, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT (employee_id) DO UPDATE SET
            basic = excluded.basic,
            hra = excluded.hra,
            conveyance = excluded.conveyance,
            medical_allowance = excluded.medical_allowance,
            special_allowance = excluded.special_allowance,
            pf_enabled = excluded.pf_enabled,
            esi_enabled = excluded.esi_enabled,
            pt_enabled = excluded.pt_enabled,
            tds_percent = excluded.tds_percent,
            overtime_enabled = excluded.overtime_enabled,
            effective_from = excluded.effective_from,
            updated_at = excluded.updated_at
         RETURNING *",
    )
    .bind(employee_id)
    .bind(input.basic)
    .bind(input.hra)
    .bind(input.conveyance)
    .bind(input.medical_allowance)
    .bind(input.special_allowance)
    .bind(input.pf_enabled)
    .bind(input.esi_enabled)
    .bind(input.pt_enabled)
    .bind(input.tds_percent)
    .bind(input.overtime_enabled)
    .bind(input.effective_from)
    .bind(Utc::now())
    .fetch_one(pool)
    .await?;
    log::info!("Salary structure saved for employee {}", employee_id);
    Ok(structure)
}

pub async fn get_adjustments(pool: &SqlitePool, query: &PayrollMonthQuery) -> Result<Vec<PayrollAdjustment>, AppError> {
    let month = MonthSpan::parse(&query.month)?;
    let adjustments = sqlx::query_as::<_, PayrollAdjustment>(
        "SELECT * FROM payroll_adjustments
         WHERE month = ? AND (? IS NULL OR employee_id = ?)
         ORDER BY employee_id, id",
    )
    .bind(month.label())
    .bind(query.employee_id)
    .bind(query.employee_id)
    .fetch_all(pool)
    .await?;
    Ok(adjustments)
}

pub async fn create_adjustment(pool: &SqlitePool, input: &AdjustmentInput) -> Result<PayrollAdjustment, AppError> {
    let month = MonthSpan::parse(&input.month)?;
    db::employees::ensure_exists(pool, input.employee_id).await?;
    let adjustment = sqlx::query_as::<_, PayrollAdjustment>(
        "INSERT INTO payroll_adjustments (employee_id, month, kind, amount, description, created_at)
         VALUES (?, ?, ?, ?, ?, ?) RETURNING *",
    )
    .bind(input.employee_id)
    .bind(month.label())
    .bind(input.kind)
    .bind(input.amount)
    .bind(&input.description)
    .bind(Utc::now())
    .fetch_one(pool)
    .await?;
    log::info!(
        "{:?} of {} recorded for employee {} in {}",
        adjustment.kind,
        adjustment.amount,
        adjustment.employee_id,
        adjustment.month
    );
    Ok(adjustment)
}

pub async fn get_adjustment(pool: &SqlitePool, id: i64) -> Result<PayrollAdjustment, AppError> {
    sqlx::query_as::<_, PayrollAdjustment>("SELECT * FROM payroll_adjustments WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Payroll adjustment not found".to_owned()))
}

pub async fn delete_adjustment(pool: &SqlitePool, id: i64) -> Result<(), AppError> {
    let result = sqlx::query("DELETE FROM payroll_adjustments WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Payroll adjustment not found".to_owned()));
    }
    Ok(())
}

async fn adjustment_total(
    pool: &SqlitePool,
    employee_id: i64,
    month: &MonthSpan,
    kind: AdjustmentKind,
) -> Result<f64, sqlx::Error> {
    sqlx::query_scalar::<_, f64>(
        "SELECT TOTAL(amount) FROM payroll_adjustments WHERE employee_id = ? AND month = ? AND kind = ?",
    )
    .bind(employee_id)
    .bind(month.label())
    .bind(kind)
    .fetch_one(pool)
    .await
}

/// Working days, loss of pay and overtime gathered from attendance, leave and adjustments.
pub async fn gather_inputs(pool: &SqlitePool, employee_id: i64, month: &MonthSpan) -> Result<PayrollInputs, sqlx::Error> {
    let attendance = db::attendance::month_summary(pool, employee_id, month).await?;
    let unpaid_leave = db::leave::unpaid_leave_days(pool, employee_id, month).await?;
    let bonus = adjustment_total(pool, employee_id, month, AdjustmentKind::Bonus).await?;
    let other_deductions = adjustment_total(pool, employee_id, month, AdjustmentKind::Deduction).await?;

    Ok(PayrollInputs {
        working_days: month.days() as f64,
        lop_days: unpaid_leave + attendance.absent as f64 + 0.5 * attendance.half_day as f64,
        overtime_hours: attendance.overtime_hours,
        bonus,
        other_deductions,
    })
}

async fn insert_run<'e, E>(executor: E, employee_id: i64, month: &str, slip: &Payslip) -> Result<PayrollRun, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, PayrollRun>(
        "INSERT INTO payroll_runs (employee_id, month, working_days, lop_days, paid_days, basic, hra,
            conveyance, medical_allowance, special_allowance, overtime_hours, overtime_pay, bonus,
            gross, pf, esi, pt, tds, other_deductions, total_deductions, net, status, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING *",
    )
    .bind(employee_id)
    .bind(month)
    .bind(slip.working_days)
    .bind(slip.lop_days)
    .bind(slip.paid_days)
    .bind(slip.basic)
    .bind(slip.hra)
    .bind(slip.conveyance)
    .bind(slip.medical_allowance)
    .bind(slip.special_allowance)
    .bind(slip.overtime_hours)
    .bind(slip.overtime_pay)
    .bind(slip.bonus)
    .bind(slip.gross)
    .bind(slip.pf)
    .bind(slip.esi)
    .bind(slip.pt)
    .bind(slip.tds)
    .bind(slip.other_deductions)
    .bind(slip.total_deductions)
    .bind(slip.net)
    .bind(PayrollStatus::Completed)
    .bind(Utc::now())
    .fetch_one(executor)
    .await
}

async fn existing_runs(pool: &SqlitePool, month: &str) -> Result<Vec<i64>, sqlx::Error> {
    sqlx::query_scalar::<_, i64>("SELECT employee_id FROM payroll_runs WHERE month = ?")
        .bind(month)
        .fetch_all(pool)
        .await
}

/// Computes and stores the month's payroll. Employees without a salary
/// structure are skipped; already processed employees need `rerun`.
pub async fn run_payroll(pool: &SqlitePool, request: &PayrollRunRequest) -> Result<PayrollRunReport, AppError> {
    let month = MonthSpan::parse(&request.month)?;
    let label = month.label();

    let employee_ids = match &request.employee_ids {
        Some(ids) if !ids.is_empty() => {
            for id in ids {
                db::employees::ensure_exists(pool, *id).await?;
            }
            ids.clone()
        }
        _ => db::employees::active_employee_ids(pool).await?,
    };

    let already_run: Vec<i64> = existing_runs(pool, &label)
        .await?
        .into_iter()
        .filter(|id| employee_ids.contains(id))
        .collect();
    if !already_run.is_empty() && !request.rerun {
        return Err(AppError::Conflict(format!(
            "Payroll for {label} already processed for employees {already_run:?}; set rerun to replace it"
        )));
    }

    let mut computed = Vec::new();
    let mut skipped = Vec::new();
    for employee_id in employee_ids {
        let Some(structure) = find_structure(pool, employee_id).await? else {
            skipped.push(SkippedEmployee {
                employee_id,
                reason: "No salary structure".to_owned(),
            });
            continue;
        };
        let inputs = gather_inputs(pool, employee_id, &month).await?;
        computed.push((employee_id, payroll::compute(&structure, &inputs)));
    }

    let mut tx = pool.begin().await?;
    let mut processed = Vec::with_capacity(computed.len());
    for (employee_id, slip) in &computed {
        sqlx::query("DELETE FROM payroll_runs WHERE employee_id = ? AND month = ?")
            .bind(*employee_id)
            .bind(&label)
            .execute(&mut *tx)
            .await?;
        processed.push(insert_run(&mut *tx, *employee_id, &label, slip).await?);
    }
    tx.commit().await?;

    log::info!(
        "Payroll {} processed for {} employee(s), {} skipped",
        label,
        processed.len(),
        skipped.len()
    );
    Ok(PayrollRunReport {
        month: label,
        processed,
        skipped,
    })
}

pub async fn get_runs(pool: &SqlitePool, query: &PayrollMonthQuery) -> Result<Vec<PayrollRun>, AppError> {
    let month = MonthSpan::parse(&query.month)?;
    let runs = sqlx::query_as::<_, PayrollRun>(
        "SELECT * FROM payroll_runs
         WHERE month = ? AND (? IS NULL OR employee_id = ?)
         ORDER BY employee_id",
    )
    .bind(month.label())
    .bind(query.employee_id)
    .bind(query.employee_id)
    .fetch_all(pool)
    .await?;
    Ok(runs)
}

pub async fn get_run(pool: &SqlitePool, id: i64) -> Result<PayrollRun, AppError> {
    sqlx::query_as::<_, PayrollRun>("SELECT * FROM payroll_runs WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Payroll run {id} not found")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{db::test_support, rules::round2};
    use chrono::NaiveDate;

    fn structure_input() -> SalaryStructureInput {
        SalaryStructureInput {
            basic: 20_000.0,
            hra: 8_000.0,
            conveyance: 1_600.0,
            medical_allowance: 1_250.0,
            special_allowance: 3_150.0,
            pf_enabled: true,
            esi_enabled: true,
            pt_enabled: true,
            tds_percent: 5.0,
            overtime_enabled: true,
            effective_from: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        }
    }

    fn request(rerun: bool) -> PayrollRunRequest {
        PayrollRunRequest {
            month: "2024-03".to_owned(),
            employee_ids: None,
            rerun,
        }
    }

    #[actix_web::test]
    async fn zero_lop_gross_and_net_add_up() {
        let (_dir, pool) = test_support::tenant_pool().await;
        let employee = test_support::employee(&pool, "P001").await;
        test_support::employee(&pool, "P002").await;
        upsert_structure(&pool, employee.id, &structure_input()).await.unwrap();

        let report = run_payroll(&pool, &request(false)).await.unwrap();
        assert_eq!(report.processed.len(), 1);
        assert_eq!(report.skipped.len(), 1);

        let run = &report.processed[0];
        assert_eq!(run.lop_days, 0.0);
        assert_eq!(run.paid_days, 31.0);
        let components = run.basic
            + run.hra
            + run.conveyance
            + run.medical_allowance
            + run.special_allowance
            + run.overtime_pay
            + run.bonus;
        assert_eq!(run.gross, round2(components));
        assert_eq!(run.gross, 34_000.0);
        assert_eq!(run.net, round2(run.gross - (run.pf + run.esi + run.pt + run.tds)));
        assert_eq!(run.esi, 0.0);
    }

    #[actix_web::test]
    async fn second_run_needs_rerun_and_replaces() {
        let (_dir, pool) = test_support::tenant_pool().await;
        let employee = test_support::employee(&pool, "P003").await;
        upsert_structure(&pool, employee.id, &structure_input()).await.unwrap();
        run_payroll(&pool, &request(false)).await.unwrap();

        let again = run_payroll(&pool, &request(false)).await;
        assert!(matches!(again, Err(AppError::Conflict(_))));

        create_adjustment(
            &pool,
            &AdjustmentInput {
                employee_id: employee.id,
                month: "2024-03".to_owned(),
                kind: AdjustmentKind::Bonus,
                amount: 1_000.0,
                description: None,
            },
        )
        .await
        .unwrap();
        let report = run_payroll(&pool, &request(true)).await.unwrap();
        assert_eq!(report.processed[0].bonus, 1_000.0);

        let runs = get_runs(
            &pool,
            &PayrollMonthQuery {
                month: "2024-03".to_owned(),
                employee_id: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].gross, 35_000.0);
    }
}
