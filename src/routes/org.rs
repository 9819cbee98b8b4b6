use actix_web::{
    delete, get, post, put,
    web::{self, Json, Query},
    HttpResponse, Responder,
};
use serde::Deserialize;
use validator::Validate;

use crate::{
    audit::snapshot,
    auth::{HR_ROLES, MANAGER_ROLES},
    db,
    errors::AppError,
    structs::org::{DateRangeQuery, DepartmentInput, HolidayInput, RosterInput, ShiftInput},
    tenancy::TenantDb,
};

#[derive(Deserialize, Default)]
pub struct YearQuery {
    year: Option<i32>,
}

#[get("/departments")]
pub async fn list_departments_handler(tenant: TenantDb) -> Result<impl Responder, AppError> {
    let departments = db::org::get_all_departments(&tenant.pool).await?;
    Ok(HttpResponse::Ok().json(departments))
}

#[get("/departments/{id}")]
pub async fn get_department_handler(tenant: TenantDb, path: web::Path<i64>) -> Result<impl Responder, AppError> {
    let department = db::org::get_department(&tenant.pool, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(department))
}

#[post("/departments")]
pub async fn create_department_handler(
    tenant: TenantDb,
    Json(input): Json<DepartmentInput>,
) -> Result<impl Responder, AppError> {
    tenant.require(HR_ROLES)?;
    input.validate()?;
    let department = db::org::create_department(&tenant.pool, &input).await?;
    tenant
        .audit("create", "department", Some(department.id), None, snapshot(&department))
        .await;
    Ok(HttpResponse::Created().json(department))
}

#[put("/departments/{id}")]
pub async fn update_department_handler(
    tenant: TenantDb,
    path: web::Path<i64>,
    Json(input): Json<DepartmentInput>,
) -> Result<impl Responder, AppError> {
    tenant.require(HR_ROLES)?;
    input.validate()?;
    let id = path.into_inner();
    let before = db::org::get_department(&tenant.pool, id).await?;
    let department = db::org::update_department(&tenant.pool, id, &input).await?;
    tenant
        .audit("update", "department", Some(id), snapshot(&before), snapshot(&department))
        .await;
    Ok(HttpResponse::Ok().json(department))
}

#[delete("/departments/{id}")]
pub async fn delete_department_handler(tenant: TenantDb, path: web::Path<i64>) -> Result<impl Responder, AppError> {
    tenant.require(HR_ROLES)?;
    let id = path.into_inner();
    let before = db::org::get_department(&tenant.pool, id).await?;
    db::org::delete_department(&tenant.pool, id).await?;
    tenant
        .audit("delete", "department", Some(id), snapshot(&before), None)
        .await;
    Ok(HttpResponse::NoContent().finish())
}

#[get("/shifts")]
pub async fn list_shifts_handler(tenant: TenantDb) -> Result<impl Responder, AppError> {
    let shifts = db::org::get_all_shifts(&tenant.pool).await?;
    Ok(HttpResponse::Ok().json(shifts))
}

#[get("/shifts/{id}")]
pub async fn get_shift_handler(tenant: TenantDb, path: web::Path<i64>) -> Result<impl Responder, AppError> {
    let shift = db::org::get_shift(&tenant.pool, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(shift))
}

#[post("/shifts")]
pub async fn create_shift_handler(tenant: TenantDb, Json(input): Json<ShiftInput>) -> Result<impl Responder, AppError> {
    tenant.require(HR_ROLES)?;
    input.validate()?;
    let shift = db::org::create_shift(&tenant.pool, &input).await?;
    tenant
        .audit("create", "shift", Some(shift.id), None, snapshot(&shift))
        .await;
    Ok(HttpResponse::Created().json(shift))
}

#[put("/shifts/{id}")]
pub async fn update_shift_handler(
    tenant: TenantDb,
    path: web::Path<i64>,
    Json(input): Json<ShiftInput>,
) -> Result<impl Responder, AppError> {
    tenant.require(HR_ROLES)?;
    input.validate()?;
    let id = path.into_inner();
    let before = db::org::get_shift(&tenant.pool, id).await?;
    let shift = db::org::update_shift(&tenant.pool, id, &input).await?;
    tenant
        .audit("update", "shift", Some(id), snapshot(&before), snapshot(&shift))
        .await;
    Ok(HttpResponse::Ok().json(shift))
}

#[delete("/shifts/{id}")]
pub async fn delete_shift_handler(tenant: TenantDb, path: web::Path<i64>) -> Result<impl Responder, AppError> {
    tenant.require(HR_ROLES)?;
    let id = path.into_inner();
    let before = db::org::get_shift(&tenant.pool, id).await?;
    db::org::delete_shift(&tenant.pool, id).await?;
    tenant
        .audit("delete", "shift", Some(id), snapshot(&before), None)
        .await;
    Ok(HttpResponse::NoContent().finish())
}

#[get("/roster")]
pub async fn list_roster_handler(
    tenant: TenantDb,
    Query(mut query): Query<DateRangeQuery>,
) -> Result<impl Responder, AppError> {
    if !tenant.claims.has_role(MANAGER_ROLES) {
        query.employee_id = Some(tenant.claims.acting_employee(query.employee_id)?);
    }
    let roster = db::org::get_roster(&tenant.pool, &query).await?;
    Ok(HttpResponse::Ok().json(roster))
}

#[post("/roster")]
pub async fn assign_roster_handler(
    tenant: TenantDb,
    Json(input): Json<RosterInput>,
) -> Result<impl Responder, AppError> {
    tenant.require(MANAGER_ROLES)?;
    db::employees::ensure_exists(&tenant.pool, input.employee_id).await?;
    db::org::get_shift(&tenant.pool, input.shift_id).await?;
    let assignment = db::org::assign_roster(&tenant.pool, &input).await?;
    tenant
        .audit("assign", "roster", Some(assignment.id), None, snapshot(&assignment))
        .await;
    Ok(HttpResponse::Created().json(assignment))
}

#[delete("/roster/{id}")]
pub async fn delete_roster_handler(tenant: TenantDb, path: web::Path<i64>) -> Result<impl Responder, AppError> {
    tenant.require(MANAGER_ROLES)?;
    let id = path.into_inner();
    db::org::delete_roster(&tenant.pool, id).await?;
    tenant.audit("delete", "roster", Some(id), None, None).await;
    Ok(HttpResponse::NoContent().finish())
}

#[get("/holidays")]
pub async fn list_holidays_handler(
    tenant: TenantDb,
    Query(query): Query<YearQuery>,
) -> Result<impl Responder, AppError> {
    let holidays = db::org::get_holidays(&tenant.pool, query.year).await?;
    Ok(HttpResponse::Ok().json(holidays))
}

#[post("/holidays")]
pub async fn create_holiday_handler(
    tenant: TenantDb,
    Json(input): Json<HolidayInput>,
) -> Result<impl Responder, AppError> {
    tenant.require(HR_ROLES)?;
    input.validate()?;
    let holiday = db::org::create_holiday(&tenant.pool, &input).await?;
    tenant
        .audit("create", "holiday", Some(holiday.id), None, snapshot(&holiday))
        .await;
    Ok(HttpResponse::Created().json(holiday))
}

#[delete("/holidays/{id}")]
pub async fn delete_holiday_handler(tenant: TenantDb, path: web::Path<i64>) -> Result<impl Responder, AppError> {
    tenant.require(HR_ROLES)?;
    let id = path.into_inner();
    db::org::delete_holiday(&tenant.pool, id).await?;
    tenant.audit("delete", "holiday", Some(id), None, None).await;
    Ok(HttpResponse::NoContent().finish())
}
