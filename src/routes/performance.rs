use actix_web::{
    delete, get, post, put,
    web::{self, Json, Query},
    HttpResponse, Responder,
};
use serde::Deserialize;
use validator::Validate;

use crate::{
    audit::snapshot,
    auth::{Claims, MANAGER_ROLES},
    db,
    errors::AppError,
    structs::talent::{GoalInput, ProgressUpdate, ReviewInput, ReviewStatus, ReviewUpdate},
    tenancy::TenantDb,
};

#[derive(Deserialize, Debug)]
pub struct EmployeeFilter {
    employee_id: Option<i64>,
}

/// Managers read anyone's goals and reviews; others only their own.
fn target_employee(tenant: &TenantDb, requested: Option<i64>) -> Result<i64, AppError> {
    match requested {
        Some(id) if tenant.claims.has_role(MANAGER_ROLES) => Ok(id),
        other => tenant.claims.acting_employee(other),
    }
}

fn check_access(tenant: &TenantDb, employee_id: i64) -> Result<(), AppError> {
    if tenant.claims.has_role(MANAGER_ROLES) {
        Ok(())
    } else {
        tenant.require_employee_access(employee_id)
    }
}

/// Reviews are written by managers about someone else.
fn check_reviewer(claims: &Claims, employee_id: i64) -> Result<(), AppError> {
    claims.require(MANAGER_ROLES)?;
    if claims.employee_id == Some(employee_id) {
        return Err(AppError::Forbidden("You cannot review yourself".to_owned()));
    }
    Ok(())
}

#[get("/performance/goals")]
pub async fn list_goals_handler(
    tenant: TenantDb,
    Query(filter): Query<EmployeeFilter>,
) -> Result<impl Responder, AppError> {
    let employee_id = target_employee(&tenant, filter.employee_id)?;
    let goals = db::talent::get_goals(&tenant.pool, employee_id).await?;
    Ok(HttpResponse::Ok().json(goals))
}

#[post("/performance/goals")]
pub async fn create_goal_handler(tenant: TenantDb, Json(input): Json<GoalInput>) -> Result<impl Responder, AppError> {
    tenant.require(MANAGER_ROLES)?;
    input.validate()?;
    let goal = db::talent::create_goal(&tenant.pool, &input).await?;
    tenant
        .audit("create", "goal", Some(goal.id), None, snapshot(&goal))
        .await;
    Ok(HttpResponse::Created().json(goal))
}

#[put("/performance/goals/{id}/progress")]
pub async fn update_progress_handler(
    tenant: TenantDb,
    path: web::Path<i64>,
    Json(update): Json<ProgressUpdate>,
) -> Result<impl Responder, AppError> {
    update.validate()?;
    let id = path.into_inner();
    let before = db::talent::get_goal(&tenant.pool, id).await?;
    check_access(&tenant, before.employee_id)?;
    let goal = db::talent::update_progress(&tenant.pool, id, update.progress).await?;
    tenant
        .audit("progress", "goal", Some(id), snapshot(&before), snapshot(&goal))
        .await;
    Ok(HttpResponse::Ok().json(goal))
}

#[delete("/performance/goals/{id}")]
pub async fn delete_goal_handler(tenant: TenantDb, path: web::Path<i64>) -> Result<impl Responder, AppError> {
    tenant.require(MANAGER_ROLES)?;
    let id = path.into_inner();
    let before = db::talent::get_goal(&tenant.pool, id).await?;
    db::talent::delete_goal(&tenant.pool, id).await?;
    tenant
        .audit("delete", "goal", Some(id), snapshot(&before), None)
        .await;
    Ok(HttpResponse::NoContent().finish())
}

#[get("/performance/reviews")]
pub async fn list_reviews_handler(
    tenant: TenantDb,
    Query(filter): Query<EmployeeFilter>,
) -> Result<impl Responder, AppError> {
    let employee_id = target_employee(&tenant, filter.employee_id)?;
    let reviews = db::talent::get_reviews(&tenant.pool, employee_id).await?;
    Ok(HttpResponse::Ok().json(reviews))
}

#[post("/performance/reviews")]
pub async fn create_review_handler(
    tenant: TenantDb,
    Json(input): Json<ReviewInput>,
) -> Result<impl Responder, AppError> {
    check_reviewer(&tenant.claims, input.employee_id)?;
    input.validate()?;
    let review = db::talent::create_review(&tenant.pool, &tenant.claims.sub, &input).await?;
    tenant
        .audit("create", "performance_review", Some(review.id), None, snapshot(&review))
        .await;
    Ok(HttpResponse::Created().json(review))
}

#[put("/performance/reviews/{id}")]
pub async fn update_review_handler(
    tenant: TenantDb,
    path: web::Path<i64>,
    Json(update): Json<ReviewUpdate>,
) -> Result<impl Responder, AppError> {
    tenant.require(MANAGER_ROLES)?;
    update.validate()?;
    let id = path.into_inner();
    let before = db::talent::get_review(&tenant.pool, id).await?;
    check_reviewer(&tenant.claims, before.employee_id)?;
    let review = db::talent::update_review(&tenant.pool, id, &update).await?;
    tenant
        .audit("update", "performance_review", Some(id), snapshot(&before), snapshot(&review))
        .await;
    Ok(HttpResponse::Ok().json(review))
}

#[post("/performance/reviews/{id}/submit")]
pub async fn submit_review_handler(tenant: TenantDb, path: web::Path<i64>) -> Result<impl Responder, AppError> {
    tenant.require(MANAGER_ROLES)?;
    let id = path.into_inner();
    let before = db::talent::get_review(&tenant.pool, id).await?;
    check_reviewer(&tenant.claims, before.employee_id)?;
    let review = db::talent::advance_review(&tenant.pool, id, ReviewStatus::Submitted).await?;
    tenant
        .audit("submit", "performance_review", Some(id), snapshot(&before), snapshot(&review))
        .await;
    Ok(HttpResponse::Ok().json(review))
}

/// Acknowledgement comes from the reviewed employee.
#[post("/performance/reviews/{id}/acknowledge")]
pub async fn acknowledge_review_handler(tenant: TenantDb, path: web::Path<i64>) -> Result<impl Responder, AppError> {
    let id = path.into_inner();
    let before = db::talent::get_review(&tenant.pool, id).await?;
    tenant.require_employee_access(before.employee_id)?;
    let review = db::talent::advance_review(&tenant.pool, id, ReviewStatus::Acknowledged).await?;
    tenant
        .audit("acknowledge", "performance_review", Some(id), snapshot(&before), snapshot(&review))
        .await;
    Ok(HttpResponse::Ok().json(review))
}

#[get("/performance/summary/{employee_id}")]
pub async fn performance_summary_handler(tenant: TenantDb, path: web::Path<i64>) -> Result<impl Responder, AppError> {
    let employee_id = path.into_inner();
    check_access(&tenant, employee_id)?;
    let summary = db::talent::performance_summary(&tenant.pool, employee_id).await?;
    Ok(HttpResponse::Ok().json(summary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;

    fn claims(role: Role, employee_id: Option<i64>) -> Claims {
        Claims {
            sub: "lead@example.com".to_owned(),
            uid: 3,
            role,
            tenant: Some("acme".to_owned()),
            employee_id,
            iat: 0,
            exp: 0,
        }
    }

    #[test]
    fn nobody_reviews_themselves() {
        let manager = claims(Role::Manager, Some(5));
        assert!(check_reviewer(&manager, 6).is_ok());
        assert!(matches!(check_reviewer(&manager, 5), Err(AppError::Forbidden(_))));

        let hr = claims(Role::Hr, Some(8));
        assert!(matches!(check_reviewer(&hr, 8), Err(AppError::Forbidden(_))));
        assert!(check_reviewer(&claims(Role::Admin, None), 8).is_ok());

        assert!(matches!(
            check_reviewer(&claims(Role::Employee, Some(9)), 6),
            Err(AppError::Forbidden(_))
        ));
    }
}
