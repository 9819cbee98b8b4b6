use actix_web::{
    get, post, put,
    web::{self, Json, Query},
    HttpResponse, Responder,
};
use chrono::{Local, NaiveDateTime};

use crate::{
    audit::snapshot,
    auth::{HR_ROLES, MANAGER_ROLES},
    db,
    errors::AppError,
    rules::calendar::MonthSpan,
    structs::{
        attendance::{AttendanceUpdate, MonthQuery, PunchInput},
        org::DateRangeQuery,
    },
    tenancy::TenantDb,
};

/// Resolves who is punching and when. Only HR may back-date a punch.
fn punch_target(tenant: &TenantDb, input: &PunchInput) -> Result<(i64, NaiveDateTime), AppError> {
    let employee_id = tenant.claims.acting_employee(input.employee_id)?;
    let at = match input.at {
        Some(at) if tenant.claims.has_role(HR_ROLES) => at,
        Some(_) => {
            return Err(AppError::Forbidden(
                "Only HR can record a punch for another time".to_owned(),
            ))
        }
        None => Local::now().naive_local(),
    };
    Ok((employee_id, at))
}

#[post("/attendance/punch-in")]
pub async fn punch_in_handler(
    tenant: TenantDb,
    body: Option<Json<PunchInput>>,
) -> Result<impl Responder, AppError> {
    let input = body.map(Json::into_inner).unwrap_or_default();
    let (employee_id, at) = punch_target(&tenant, &input)?;
    let record =
        db::attendance::punch_in(&tenant.pool, employee_id, at, input.remarks.as_deref()).await?;
    tenant
        .audit("punch_in", "attendance", Some(record.id), None, snapshot(&record))
        .await;
    Ok(HttpResponse::Created().json(record))
}

#[post("/attendance/punch-out")]
pub async fn punch_out_handler(
    tenant: TenantDb,
    body: Option<Json<PunchInput>>,
) -> Result<impl Responder, AppError> {
    let input = body.map(Json::into_inner).unwrap_or_default();
    let (employee_id, at) = punch_target(&tenant, &input)?;
    let record =
        db::attendance::punch_out(&tenant.pool, employee_id, at, input.remarks.as_deref()).await?;
    tenant
        .audit("punch_out", "attendance", Some(record.id), None, snapshot(&record))
        .await;
    Ok(HttpResponse::Ok().json(record))
}

#[put("/attendance/{id}")]
pub async fn regularize_handler(
    tenant: TenantDb,
    path: web::Path<i64>,
    Json(update): Json<AttendanceUpdate>,
) -> Result<impl Responder, AppError> {
    tenant.require(HR_ROLES)?;
    let id = path.into_inner();
    let before = db::attendance::get_attendance(&tenant.pool, id).await?;
    let record = db::attendance::regularize(
        &tenant.pool,
        id,
        update.punch_in,
        update.punch_out,
        update.remarks.as_deref(),
    )
    .await?;
    tenant
        .audit("regularize", "attendance", Some(id), snapshot(&before), snapshot(&record))
        .await;
    Ok(HttpResponse::Ok().json(record))
}

#[get("/attendance")]
pub async fn list_attendance_handler(
    tenant: TenantDb,
    Query(mut query): Query<DateRangeQuery>,
) -> Result<impl Responder, AppError> {
    if !tenant.claims.has_role(MANAGER_ROLES) {
        query.employee_id = Some(tenant.claims.acting_employee(query.employee_id)?);
    }
    if let (Some(from), Some(to)) = (query.from, query.to) {
        if to < from {
            return Err(AppError::BadRequest("'to' must not be before 'from'".to_owned()));
        }
    }
    let records = db::attendance::get_attendance_list(&tenant.pool, &query).await?;
    Ok(HttpResponse::Ok().json(records))
}

#[get("/attendance/summary")]
pub async fn attendance_summary_handler(
    tenant: TenantDb,
    Query(query): Query<MonthQuery>,
) -> Result<impl Responder, AppError> {
    let employee_id = match query.employee_id {
        Some(id) if tenant.claims.has_role(MANAGER_ROLES) => id,
        requested => tenant.claims.acting_employee(requested)?,
    };
    let month = MonthSpan::parse(&query.month)?;
    db::employees::ensure_exists(&tenant.pool, employee_id).await?;
    let summary = db::attendance::month_summary(&tenant.pool, employee_id, &month).await?;
    Ok(HttpResponse::Ok().json(summary))
}
