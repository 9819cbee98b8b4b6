use actix_web::{
    delete, get, post,
    web::{self, Json, Query},
    HttpResponse, Responder,
};
use serde::Deserialize;
use tera::Context;
use validator::Validate;

use crate::{
    audit::snapshot,
    auth::HR_ROLES,
    db,
    errors::AppError,
    reports,
    rules::calendar::MonthSpan,
    structs::compliance::{FilingInput, FilingQuery},
    tenancy::TenantDb,
};

#[derive(Deserialize, Debug)]
pub struct ReportQuery {
    month: String,
}

#[get("/compliance/summary")]
pub async fn statutory_summary_handler(
    tenant: TenantDb,
    Query(query): Query<ReportQuery>,
) -> Result<impl Responder, AppError> {
    tenant.require(HR_ROLES)?;
    let month = MonthSpan::parse(&query.month)?;
    let summary = db::compliance::statutory_summary(&tenant.pool, &month).await?;
    Ok(HttpResponse::Ok().json(summary))
}

#[get("/compliance/report")]
pub async fn statutory_report_handler(
    tenant: TenantDb,
    Query(query): Query<ReportQuery>,
) -> Result<impl Responder, AppError> {
    tenant.require(HR_ROLES)?;
    let month = MonthSpan::parse(&query.month)?;
    let summary = db::compliance::statutory_summary(&tenant.pool, &month).await?;
    let filings = db::compliance::get_filings(
        &tenant.pool,
        &FilingQuery {
            month: Some(month.label()),
        },
    )
    .await?;

    let mut context = Context::new();
    context.insert("tenant", &tenant.tenant);
    context.insert("summary", &summary);
    context.insert("filings", &filings);
    let html = reports::render("compliance_report.html", &context)?;
    Ok(reports::html_attachment(
        html,
        &format!("statutory-{}-{}.html", tenant.tenant.name, summary.month),
    ))
}

#[get("/compliance/filings")]
pub async fn list_filings_handler(
    tenant: TenantDb,
    Query(query): Query<FilingQuery>,
) -> Result<impl Responder, AppError> {
    tenant.require(HR_ROLES)?;
    let filings = db::compliance::get_filings(&tenant.pool, &query).await?;
    Ok(HttpResponse::Ok().json(filings))
}

#[post("/compliance/filings")]
pub async fn create_filing_handler(
    tenant: TenantDb,
    Json(input): Json<FilingInput>,
) -> Result<impl Responder, AppError> {
    tenant.require(HR_ROLES)?;
    input.validate()?;
    let filing = db::compliance::create_filing(&tenant.pool, &input).await?;
    tenant
        .audit("create", "statutory_filing", Some(filing.id), None, snapshot(&filing))
        .await;
    Ok(HttpResponse::Created().json(filing))
}

#[delete("/compliance/filings/{id}")]
pub async fn delete_filing_handler(tenant: TenantDb, path: web::Path<i64>) -> Result<impl Responder, AppError> {
    tenant.require(HR_ROLES)?;
    let id = path.into_inner();
    db::compliance::delete_filing(&tenant.pool, id).await?;
    tenant
        .audit("delete", "statutory_filing", Some(id), None, None)
        .await;
    Ok(HttpResponse::NoContent().finish())
}
