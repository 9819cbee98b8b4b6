use chrono::Utc;
use sqlx::SqlitePool;

use crate::{
    errors::AppError,
    rules::{
        calendar::MonthSpan,
        payroll::{EMPLOYER_ESI_RATE, ESI_WAGE_CEILING},
        round2,
    },
    structs::compliance::{FilingInput, FilingQuery, StatutoryFiling, StatutorySummary},
};

/// Statutory totals for a processed payroll month. Employer PF matches the
/// employee share; employer ESI applies to the same wages employee ESI did.
pub async fn statutory_summary(pool: &SqlitePool, month: &MonthSpan) -> Result<StatutorySummary, sqlx::Error> {
    let (headcount, total_gross, total_net, employee_pf, employee_esi, esi_wages, professional_tax, tds) =
        sqlx::query_as::<_, (i64, f64, f64, f64, f64, f64, f64, f64)>(
            "SELECT COUNT(*), TOTAL(gross), TOTAL(net), TOTAL(pf), TOTAL(esi),
                TOTAL(CASE WHEN esi > 0 AND gross <= ? THEN gross ELSE 0 END),
                TOTAL(pt), TOTAL(tds)
             FROM payroll_runs WHERE month = ?",
        )
        .bind(ESI_WAGE_CEILING)
        .bind(month.label())
        .fetch_one(pool)
        .await?;

    Ok(StatutorySummary {
        month: month.label(),
        headcount,
        total_gross: round2(total_gross),
        total_net: round2(total_net),
        employee_pf: round2(employee_pf),
        employer_pf: round2(employee_pf),
        employee_esi: round2(employee_esi),
        employer_esi: round2(esi_wages * EMPLOYER_ESI_RATE),
        professional_tax: round2(professional_tax),
        tds: round2(tds),
    })
}

pub async fn get_filings(pool: &SqlitePool, query: &FilingQuery) -> Result<Vec<StatutoryFiling>, AppError> {
    let month = query
        .month
        .as_deref()
        .map(MonthSpan::parse)
        .transpose()?
        .map(|m| m.label());
    let filings = sqlx::query_as::<_, StatutoryFiling>(
        "SELECT * FROM statutory_filings WHERE (? IS NULL OR month = ?) ORDER BY month DESC, kind",
    )
    .bind(&month)
    .bind(&month)
    .fetch_all(pool)
    .await?;
    Ok(filings)
}

pub async fn create_filing(pool: &SqlitePool, input: &FilingInput) -> Result<StatutoryFiling, AppError> {
    let month = MonthSpan::parse(&input.month)?;
    let filing = sqlx::query_as::<_, StatutoryFiling>(
        "INSERT INTO statutory_filings (month, kind, amount, reference, filed_on, created_at)
         VALUES (?, ?, ?, ?, ?, ?) RETURNING *",
    )
    .bind(month.label())
    .bind(input.kind)
    .bind(input.amount)
    .bind(&input.reference)
    .bind(input.filed_on)
    .bind(Utc::now())
    .fetch_one(pool)
    .await
    .map_err(|e| match AppError::from(e) {
        AppError::Conflict(_) => AppError::Conflict(format!(
            "{:?} filing for {} is already recorded",
            input.kind,
            month.label()
        )),
        other => other,
    })?;
    log::info!("{:?} filing recorded for {}", filing.kind, filing.month);
    Ok(filing)
}

pub async fn delete_filing(pool: &SqlitePool, id: i64) -> Result<(), AppError> {
    let result = sqlx::query("DELETE FROM statutory_filings WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Filing not found".to_owned()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::{self, test_support},
        structs::{compliance::FilingKind, payroll::{PayrollRunRequest, SalaryStructureInput}},
    };
    use chrono::NaiveDate;

    fn salary(basic: f64) -> SalaryStructureInput {
        SalaryStructureInput {
            basic,
            hra: 0.0,
            conveyance: 0.0,
            medical_allowance: 0.0,
            special_allowance: 0.0,
            pf_enabled: true,
            esi_enabled: true,
            pt_enabled: true,
            tds_percent: 0.0,
            overtime_enabled: false,
            effective_from: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        }
    }

    #[actix_web::test]
    async fn summary_adds_employer_contributions() {
        let (_dir, pool) = test_support::tenant_pool().await;
        let low = test_support::employee(&pool, "C001").await;
        let high = test_support::employee(&pool, "C002").await;
        db::payroll::upsert_structure(&pool, low.id, &salary(12_000.0)).await.unwrap();
        db::payroll::upsert_structure(&pool, high.id, &salary(30_000.0)).await.unwrap();
        db::payroll::run_payroll(
            &pool,
            &PayrollRunRequest {
                month: "2024-03".to_owned(),
                employee_ids: None,
                rerun: false,
            },
        )
        .await
        .unwrap();

        let summary = statutory_summary(&pool, &MonthSpan::parse("2024-03").unwrap())
            .await
            .unwrap();
        assert_eq!(summary.headcount, 2);
        assert_eq!(summary.total_gross, 42_000.0);
        assert_eq!(summary.employee_pf, 5_040.0);
        assert_eq!(summary.employer_pf, 5_040.0);
        assert_eq!(summary.employee_esi, 90.0);
        assert_eq!(summary.employer_esi, 390.0);
        assert_eq!(summary.professional_tax, 350.0);
    }

    #[actix_web::test]
    async fn one_filing_per_kind_and_month() {
        let (_dir, pool) = test_support::tenant_pool().await;
        let input = FilingInput {
            month: "2024-03".to_owned(),
            kind: FilingKind::Pf,
            amount: 5_040.0,
            reference: Some("ECR-0324".to_owned()),
            filed_on: NaiveDate::from_ymd_opt(2024, 4, 10).unwrap(),
        };
        create_filing(&pool, &input).await.unwrap();
        assert!(matches!(create_filing(&pool, &input).await, Err(AppError::Conflict(_))));
        let listed = get_filings(&pool, &FilingQuery { month: Some("2024-03".to_owned()) })
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
    }
}
