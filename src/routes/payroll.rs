use actix_web::{
    delete, get, post, put,
    web::{self, Data, Json, Query},
    HttpResponse, Responder,
};
use tera::Context;
use validator::Validate;

use crate::{
    audit::snapshot,
    auth::{HR_ROLES, MANAGER_ROLES},
    db,
    errors::AppError,
    reports,
    structs::payroll::{AdjustmentInput, PayrollMonthQuery, PayrollRun, PayrollRunRequest, SalaryStructureInput},
    tenancy::TenantDb,
    AppState,
};

#[get("/payroll/structures/{employee_id}")]
pub async fn get_structure_handler(tenant: TenantDb, path: web::Path<i64>) -> Result<impl Responder, AppError> {
    let employee_id = path.into_inner();
    tenant.require_employee_access(employee_id)?;
    let structure = db::payroll::get_structure(&tenant.pool, employee_id).await?;
    Ok(HttpResponse::Ok().json(structure))
}

#[put("/payroll/structures/{employee_id}")]
pub async fn upsert_structure_handler(
    tenant: TenantDb,
    path: web::Path<i64>,
    Json(input): Json<SalaryStructureInput>,
) -> Result<impl Responder, AppError> {
    tenant.require(HR_ROLES)?;
    input.validate()?;
    let employee_id = path.into_inner();
    let before = db::payroll::get_structure(&tenant.pool, employee_id).await.ok();
    let structure = db::payroll::upsert_structure(&tenant.pool, employee_id, &input).await?;
    tenant
        .audit(
            "upsert",
            "salary_structure",
            Some(structure.id),
            before.as_ref().and_then(snapshot),
            snapshot(&structure),
        )
        .await;
    Ok(HttpResponse::Ok().json(structure))
}

#[get("/payroll/adjustments")]
pub async fn list_adjustments_handler(
    tenant: TenantDb,
    Query(query): Query<PayrollMonthQuery>,
) -> Result<impl Responder, AppError> {
    tenant.require(HR_ROLES)?;
    let adjustments = db::payroll::get_adjustments(&tenant.pool, &query).await?;
    Ok(HttpResponse::Ok().json(adjustments))
}

#[post("/payroll/adjustments")]
pub async fn create_adjustment_handler(
    tenant: TenantDb,
    Json(input): Json<AdjustmentInput>,
) -> Result<impl Responder, AppError> {
    tenant.require(HR_ROLES)?;
    input.validate()?;
    let adjustment = db::payroll::create_adjustment(&tenant.pool, &input).await?;
    tenant
        .audit("create", "payroll_adjustment", Some(adjustment.id), None, snapshot(&adjustment))
        .await;
    Ok(HttpResponse::Created().json(adjustment))
}

#[delete("/payroll/adjustments/{id}")]
pub async fn delete_adjustment_handler(tenant: TenantDb, path: web::Path<i64>) -> Result<impl Responder, AppError> {
    tenant.require(HR_ROLES)?;
    let id = path.into_inner();
    let before = db::payroll::get_adjustment(&tenant.pool, id).await?;
    db::payroll::delete_adjustment(&tenant.pool, id).await?;
    tenant
        .audit("delete", "payroll_adjustment", Some(id), snapshot(&before), None)
        .await;
    Ok(HttpResponse::NoContent().finish())
}

#[post("/payroll/run")]
pub async fn run_payroll_handler(
    tenant: TenantDb,
    Json(request): Json<PayrollRunRequest>,
) -> Result<impl Responder, AppError> {
    tenant.require(HR_ROLES)?;
    let report = db::payroll::run_payroll(&tenant.pool, &request).await?;
    for run in &report.processed {
        tenant
            .audit("run", "payroll_run", Some(run.id), None, snapshot(run))
            .await;
    }
    Ok(HttpResponse::Ok().json(report))
}

#[get("/payroll/runs")]
pub async fn list_runs_handler(
    tenant: TenantDb,
    Query(mut query): Query<PayrollMonthQuery>,
) -> Result<impl Responder, AppError> {
    if !tenant.claims.has_role(HR_ROLES) {
        query.employee_id = Some(tenant.claims.acting_employee(query.employee_id)?);
    }
    let runs = db::payroll::get_runs(&tenant.pool, &query).await?;
    Ok(HttpResponse::Ok().json(runs))
}

async fn visible_run(tenant: &TenantDb, id: i64) -> Result<PayrollRun, AppError> {
    let run = db::payroll::get_run(&tenant.pool, id).await?;
    if !tenant.claims.has_role(MANAGER_ROLES) {
        tenant.require_employee_access(run.employee_id)?;
    }
    Ok(run)
}

#[get("/payroll/runs/{id}")]
pub async fn get_run_handler(tenant: TenantDb, path: web::Path<i64>) -> Result<impl Responder, AppError> {
    let run = visible_run(&tenant, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(run))
}

async fn render_payslip(tenant: &TenantDb, run: &PayrollRun) -> Result<(String, String), AppError> {
    let employee = db::employees::get_employee(&tenant.pool, run.employee_id).await?;
    let mut context = Context::new();
    context.insert("tenant", &tenant.tenant);
    context.insert("employee", &employee);
    context.insert("run", run);
    let html = reports::render("payslip.html", &context)?;
    Ok((html, employee.email))
}

#[get("/payroll/runs/{id}/payslip")]
pub async fn payslip_handler(tenant: TenantDb, path: web::Path<i64>) -> Result<impl Responder, AppError> {
    let run = visible_run(&tenant, path.into_inner()).await?;
    let (html, _) = render_payslip(&tenant, &run).await?;
    Ok(reports::html_attachment(
        html,
        &format!("payslip-{}-{}.html", run.employee_id, run.month),
    ))
}

#[post("/payroll/runs/{id}/email")]
pub async fn email_payslip_handler(
    state: Data<AppState>,
    tenant: TenantDb,
    path: web::Path<i64>,
) -> Result<impl Responder, AppError> {
    tenant.require(HR_ROLES)?;
    let run = db::payroll::get_run(&tenant.pool, path.into_inner()).await?;
    let (html, email) = render_payslip(&tenant, &run).await?;
    state
        .mailer
        .send(&email, &format!("Payslip for {}", run.month), html)
        .await?;
    tenant
        .audit("email", "payslip", Some(run.id), None, None)
        .await;
    Ok(HttpResponse::Accepted().finish())
}
