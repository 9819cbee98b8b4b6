use actix_web::{
    delete, get, post, put,
    web::{self, Json},
    HttpResponse, Responder,
};
use validator::Validate;

use crate::{
    audit::snapshot,
    auth::{HR_ROLES, MANAGER_ROLES},
    db,
    errors::AppError,
    structs::talent::{CompletionInput, EnrollInput, ProgramInput},
    tenancy::TenantDb,
};

#[get("/training/programs")]
pub async fn list_programs_handler(tenant: TenantDb) -> Result<impl Responder, AppError> {
    let programs = db::talent::get_all_programs(&tenant.pool).await?;
    Ok(HttpResponse::Ok().json(programs))
}

#[get("/training/programs/{id}")]
pub async fn get_program_handler(tenant: TenantDb, path: web::Path<i64>) -> Result<impl Responder, AppError> {
    let program = db::talent::get_program(&tenant.pool, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(program))
}

#[post("/training/programs")]
pub async fn create_program_handler(
    tenant: TenantDb,
    Json(input): Json<ProgramInput>,
) -> Result<impl Responder, AppError> {
    tenant.require(HR_ROLES)?;
    input.validate()?;
    let program = db::talent::create_program(&tenant.pool, &input).await?;
    tenant
        .audit("create", "training_program", Some(program.id), None, snapshot(&program))
        .await;
    Ok(HttpResponse::Created().json(program))
}

#[put("/training/programs/{id}")]
pub async fn update_program_handler(
    tenant: TenantDb,
    path: web::Path<i64>,
    Json(input): Json<ProgramInput>,
) -> Result<impl Responder, AppError> {
    tenant.require(HR_ROLES)?;
    input.validate()?;
    let id = path.into_inner();
    let before = db::talent::get_program(&tenant.pool, id).await?;
    let program = db::talent::update_program(&tenant.pool, id, &input).await?;
    tenant
        .audit("update", "training_program", Some(id), snapshot(&before), snapshot(&program))
        .await;
    Ok(HttpResponse::Ok().json(program))
}

#[delete("/training/programs/{id}")]
pub async fn delete_program_handler(tenant: TenantDb, path: web::Path<i64>) -> Result<impl Responder, AppError> {
    tenant.require(HR_ROLES)?;
    let id = path.into_inner();
    let before = db::talent::get_program(&tenant.pool, id).await?;
    db::talent::delete_program(&tenant.pool, id).await?;
    tenant
        .audit("delete", "training_program", Some(id), snapshot(&before), None)
        .await;
    Ok(HttpResponse::NoContent().finish())
}

#[get("/training/programs/{id}/enrollments")]
pub async fn list_enrollments_handler(tenant: TenantDb, path: web::Path<i64>) -> Result<impl Responder, AppError> {
    tenant.require(MANAGER_ROLES)?;
    let program_id = path.into_inner();
    db::talent::get_program(&tenant.pool, program_id).await?;
    let enrollments = db::talent::get_enrollments(&tenant.pool, program_id).await?;
    Ok(HttpResponse::Ok().json(enrollments))
}

#[post("/training/programs/{id}/enrollments")]
pub async fn enroll_handler(
    tenant: TenantDb,
    path: web::Path<i64>,
    Json(input): Json<EnrollInput>,
) -> Result<impl Responder, AppError> {
    tenant.require(MANAGER_ROLES)?;
    let enrollment = db::talent::enroll(&tenant.pool, path.into_inner(), input.employee_id).await?;
    tenant
        .audit("enroll", "training_enrollment", Some(enrollment.id), None, snapshot(&enrollment))
        .await;
    Ok(HttpResponse::Created().json(enrollment))
}

#[post("/training/programs/{id}/enrollments/{enrollment_id}/complete")]
pub async fn complete_enrollment_handler(
    tenant: TenantDb,
    path: web::Path<(i64, i64)>,
    Json(input): Json<CompletionInput>,
) -> Result<impl Responder, AppError> {
    tenant.require(MANAGER_ROLES)?;
    input.validate()?;
    let (program_id, enrollment_id) = path.into_inner();
    let enrollment =
        db::talent::complete_enrollment(&tenant.pool, program_id, enrollment_id, &input).await?;
    tenant
        .audit("complete", "training_enrollment", Some(enrollment_id), None, snapshot(&enrollment))
        .await;
    Ok(HttpResponse::Ok().json(enrollment))
}

#[post("/training/programs/{id}/enrollments/{enrollment_id}/drop")]
pub async fn drop_enrollment_handler(
    tenant: TenantDb,
    path: web::Path<(i64, i64)>,
) -> Result<impl Responder, AppError> {
    tenant.require(MANAGER_ROLES)?;
    let (program_id, enrollment_id) = path.into_inner();
    let enrollment = db::talent::drop_enrollment(&tenant.pool, program_id, enrollment_id).await?;
    tenant
        .audit("drop", "training_enrollment", Some(enrollment_id), None, snapshot(&enrollment))
        .await;
    Ok(HttpResponse::Ok().json(enrollment))
}
