use actix_web::{
    delete, get, post, put,
    web::{self, Json, Query},
    HttpResponse, Responder,
};
use serde_json::json;
use validator::Validate;

use crate::{
    audit::snapshot,
    auth::{HR_ROLES, MANAGER_ROLES},
    db,
    errors::AppError,
    structs::recruitment::{
        CandidateInput, HireInput, InterviewFeedback, InterviewInput, JobInput, JobQuery, JobUpdate,
        StageChange,
    },
    tenancy::TenantDb,
};

#[get("/jobs")]
pub async fn list_jobs_handler(tenant: TenantDb, Query(query): Query<JobQuery>) -> Result<impl Responder, AppError> {
    let jobs = db::recruitment::get_all_jobs(&tenant.pool, &query).await?;
    Ok(HttpResponse::Ok().json(jobs))
}

#[get("/jobs/{id}")]
pub async fn get_job_handler(tenant: TenantDb, path: web::Path<i64>) -> Result<impl Responder, AppError> {
    let job = db::recruitment::get_job(&tenant.pool, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(job))
}

#[post("/jobs")]
pub async fn create_job_handler(tenant: TenantDb, Json(input): Json<JobInput>) -> Result<impl Responder, AppError> {
    tenant.require(HR_ROLES)?;
    input.validate()?;
    let job = db::recruitment::create_job(&tenant.pool, &input).await?;
    tenant
        .audit("create", "job_opening", Some(job.id), None, snapshot(&job))
        .await;
    Ok(HttpResponse::Created().json(job))
}

#[put("/jobs/{id}")]
pub async fn update_job_handler(
    tenant: TenantDb,
    path: web::Path<i64>,
    Json(update): Json<JobUpdate>,
) -> Result<impl Responder, AppError> {
    tenant.require(HR_ROLES)?;
    update.validate()?;
    let id = path.into_inner();
    let before = db::recruitment::get_job(&tenant.pool, id).await?;
    let job = db::recruitment::update_job(&tenant.pool, id, &update).await?;
    tenant
        .audit("update", "job_opening", Some(id), snapshot(&before), snapshot(&job))
        .await;
    Ok(HttpResponse::Ok().json(job))
}

#[delete("/jobs/{id}")]
pub async fn delete_job_handler(tenant: TenantDb, path: web::Path<i64>) -> Result<impl Responder, AppError> {
    tenant.require(HR_ROLES)?;
    let id = path.into_inner();
    let before = db::recruitment::get_job(&tenant.pool, id).await?;
    db::recruitment::delete_job(&tenant.pool, id).await?;
    tenant
        .audit("delete", "job_opening", Some(id), snapshot(&before), None)
        .await;
    Ok(HttpResponse::NoContent().finish())
}

#[get("/jobs/{id}/candidates")]
pub async fn list_candidates_handler(tenant: TenantDb, path: web::Path<i64>) -> Result<impl Responder, AppError> {
    tenant.require(MANAGER_ROLES)?;
    let job_id = path.into_inner();
    db::recruitment::get_job(&tenant.pool, job_id).await?;
    let candidates = db::recruitment::get_candidates(&tenant.pool, job_id).await?;
    Ok(HttpResponse::Ok().json(candidates))
}

#[post("/jobs/{id}/candidates")]
pub async fn create_candidate_handler(
    tenant: TenantDb,
    path: web::Path<i64>,
    Json(input): Json<CandidateInput>,
) -> Result<impl Responder, AppError> {
    tenant.require(HR_ROLES)?;
    input.validate()?;
    let candidate = db::recruitment::create_candidate(&tenant.pool, path.into_inner(), &input).await?;
    tenant
        .audit("create", "candidate", Some(candidate.id), None, snapshot(&candidate))
        .await;
    Ok(HttpResponse::Created().json(candidate))
}

#[get("/candidates/{id}")]
pub async fn get_candidate_handler(tenant: TenantDb, path: web::Path<i64>) -> Result<impl Responder, AppError> {
    tenant.require(MANAGER_ROLES)?;
    let candidate = db::recruitment::get_candidate(&tenant.pool, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(candidate))
}

#[put("/candidates/{id}/stage")]
pub async fn change_stage_handler(
    tenant: TenantDb,
    path: web::Path<i64>,
    Json(change): Json<StageChange>,
) -> Result<impl Responder, AppError> {
    tenant.require(HR_ROLES)?;
    let id = path.into_inner();
    let before = db::recruitment::get_candidate(&tenant.pool, id).await?;
    let candidate = db::recruitment::change_stage(&tenant.pool, id, &change).await?;
    tenant
        .audit("stage", "candidate", Some(id), snapshot(&before), snapshot(&candidate))
        .await;
    Ok(HttpResponse::Ok().json(candidate))
}

#[post("/candidates/{id}/hire")]
pub async fn hire_candidate_handler(
    tenant: TenantDb,
    path: web::Path<i64>,
    Json(input): Json<HireInput>,
) -> Result<impl Responder, AppError> {
    tenant.require(HR_ROLES)?;
    input.validate()?;
    let id = path.into_inner();
    let before = db::recruitment::get_candidate(&tenant.pool, id).await?;
    let (candidate, employee) = db::recruitment::hire_candidate(&tenant.pool, id, &input).await?;
    tenant
        .audit("hire", "candidate", Some(id), snapshot(&before), snapshot(&candidate))
        .await;
    tenant
        .audit("create", "employee", Some(employee.id), None, snapshot(&employee))
        .await;
    Ok(HttpResponse::Created().json(json!({
        "candidate": candidate,
        "employee": employee,
    })))
}

#[get("/candidates/{id}/interviews")]
pub async fn list_interviews_handler(tenant: TenantDb, path: web::Path<i64>) -> Result<impl Responder, AppError> {
    tenant.require(MANAGER_ROLES)?;
    let candidate_id = path.into_inner();
    db::recruitment::get_candidate(&tenant.pool, candidate_id).await?;
    let interviews = db::recruitment::get_interviews(&tenant.pool, candidate_id).await?;
    Ok(HttpResponse::Ok().json(interviews))
}

#[post("/candidates/{id}/interviews")]
pub async fn schedule_interview_handler(
    tenant: TenantDb,
    path: web::Path<i64>,
    Json(input): Json<InterviewInput>,
) -> Result<impl Responder, AppError> {
    tenant.require(MANAGER_ROLES)?;
    input.validate()?;
    let interview = db::recruitment::schedule_interview(&tenant.pool, path.into_inner(), &input).await?;
    tenant
        .audit("schedule", "interview", Some(interview.id), None, snapshot(&interview))
        .await;
    Ok(HttpResponse::Created().json(interview))
}

#[put("/interviews/{id}/feedback")]
pub async fn interview_feedback_handler(
    tenant: TenantDb,
    path: web::Path<i64>,
    Json(feedback): Json<InterviewFeedback>,
) -> Result<impl Responder, AppError> {
    tenant.require(MANAGER_ROLES)?;
    feedback.validate()?;
    let id = path.into_inner();
    let interview = db::recruitment::record_feedback(&tenant.pool, id, &feedback).await?;
    tenant
        .audit("feedback", "interview", Some(id), None, snapshot(&interview))
        .await;
    Ok(HttpResponse::Ok().json(interview))
}
