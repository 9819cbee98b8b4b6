use actix_web::{
    get, post,
    web::{self, Json, Query},
    HttpResponse, Responder,
};
use serde::Deserialize;
use validator::Validate;

use crate::{
    audit::snapshot,
    auth::HR_ROLES,
    db,
    errors::AppError,
    structs::talent::{ExitNotes, ExitStatus, ResignationInput},
    tenancy::TenantDb,
};

#[derive(Deserialize, Debug, Default)]
pub struct ExitQuery {
    status: Option<ExitStatus>,
}

#[get("/exits")]
pub async fn list_exits_handler(tenant: TenantDb, Query(query): Query<ExitQuery>) -> Result<impl Responder, AppError> {
    tenant.require(HR_ROLES)?;
    let exits = db::talent::get_exits(&tenant.pool, query.status).await?;
    Ok(HttpResponse::Ok().json(exits))
}

#[get("/exits/{id}")]
pub async fn get_exit_handler(tenant: TenantDb, path: web::Path<i64>) -> Result<impl Responder, AppError> {
    let record = db::talent::get_exit(&tenant.pool, path.into_inner()).await?;
    tenant.require_employee_access(record.employee_id)?;
    Ok(HttpResponse::Ok().json(record))
}

#[post("/exits")]
pub async fn resign_handler(tenant: TenantDb, Json(input): Json<ResignationInput>) -> Result<impl Responder, AppError> {
    input.validate()?;
    let employee_id = tenant.claims.acting_employee(input.employee_id)?;
    let record = db::talent::resign(&tenant.pool, employee_id, &input).await?;
    tenant
        .audit("resign", "employee_exit", Some(record.id), None, snapshot(&record))
        .await;
    Ok(HttpResponse::Created().json(record))
}

#[post("/exits/{id}/approve")]
pub async fn approve_exit_handler(tenant: TenantDb, path: web::Path<i64>) -> Result<impl Responder, AppError> {
    tenant.require(HR_ROLES)?;
    let id = path.into_inner();
    let record = db::talent::approve_exit(&tenant.pool, id).await?;
    tenant
        .audit("approve", "employee_exit", Some(id), None, snapshot(&record))
        .await;
    Ok(HttpResponse::Ok().json(record))
}

#[post("/exits/{id}/withdraw")]
pub async fn withdraw_exit_handler(tenant: TenantDb, path: web::Path<i64>) -> Result<impl Responder, AppError> {
    let id = path.into_inner();
    let before = db::talent::get_exit(&tenant.pool, id).await?;
    tenant.require_employee_access(before.employee_id)?;
    let record = db::talent::withdraw_exit(&tenant.pool, id).await?;
    tenant
        .audit("withdraw", "employee_exit", Some(id), snapshot(&before), snapshot(&record))
        .await;
    Ok(HttpResponse::Ok().json(record))
}

#[post("/exits/{id}/complete")]
pub async fn complete_exit_handler(
    tenant: TenantDb,
    path: web::Path<i64>,
    body: Option<Json<ExitNotes>>,
) -> Result<impl Responder, AppError> {
    tenant.require(HR_ROLES)?;
    let id = path.into_inner();
    let notes = body.map(Json::into_inner).unwrap_or_default();
    let before = db::talent::get_exit(&tenant.pool, id).await?;
    let record =
        db::talent::complete_exit(&tenant.pool, id, notes.exit_interview_notes.as_deref()).await?;
    tenant
        .audit("complete", "employee_exit", Some(id), snapshot(&before), snapshot(&record))
        .await;
    Ok(HttpResponse::Ok().json(record))
}
