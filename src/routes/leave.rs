use actix_web::{
    delete, get, post, put,
    web::{self, Data, Json, Query},
    HttpResponse, Responder,
};
use tera::Context;
use validator::Validate;

use crate::{
    audit::snapshot,
    auth::{Claims, ADMIN_ROLES, HR_ROLES, MANAGER_ROLES},
    db,
    errors::AppError,
    reports,
    structs::leave::{
        BalanceInput, BalanceQuery, LeaveApplication, LeaveApplyInput, LeaveDecision, LeaveQuery,
        LeaveTypeInput,
    },
    tenancy::TenantDb,
    AppState,
};

#[get("/leave/types")]
pub async fn list_leave_types_handler(tenant: TenantDb) -> Result<impl Responder, AppError> {
    let types = db::leave::get_all_leave_types(&tenant.pool).await?;
    Ok(HttpResponse::Ok().json(types))
}

#[post("/leave/types")]
pub async fn create_leave_type_handler(
    tenant: TenantDb,
    Json(input): Json<LeaveTypeInput>,
) -> Result<impl Responder, AppError> {
    tenant.require(HR_ROLES)?;
    input.validate()?;
    let leave_type = db::leave::create_leave_type(&tenant.pool, &input).await?;
    tenant
        .audit("create", "leave_type", Some(leave_type.id), None, snapshot(&leave_type))
        .await;
    Ok(HttpResponse::Created().json(leave_type))
}

#[put("/leave/types/{id}")]
pub async fn update_leave_type_handler(
    tenant: TenantDb,
    path: web::Path<i64>,
    Json(input): Json<LeaveTypeInput>,
) -> Result<impl Responder, AppError> {
    tenant.require(HR_ROLES)?;
    input.validate()?;
    let id = path.into_inner();
    let before = db::leave::get_leave_type(&tenant.pool, id).await?;
    let leave_type = db::leave::update_leave_type(&tenant.pool, id, &input).await?;
    tenant
        .audit("update", "leave_type", Some(id), snapshot(&before), snapshot(&leave_type))
        .await;
    Ok(HttpResponse::Ok().json(leave_type))
}

#[delete("/leave/types/{id}")]
pub async fn delete_leave_type_handler(tenant: TenantDb, path: web::Path<i64>) -> Result<impl Responder, AppError> {
    tenant.require(HR_ROLES)?;
    let id = path.into_inner();
    let before = db::leave::get_leave_type(&tenant.pool, id).await?;
    db::leave::delete_leave_type(&tenant.pool, id).await?;
    tenant
        .audit("delete", "leave_type", Some(id), snapshot(&before), None)
        .await;
    Ok(HttpResponse::NoContent().finish())
}

#[get("/leave/balances")]
pub async fn list_balances_handler(
    tenant: TenantDb,
    Query(mut query): Query<BalanceQuery>,
) -> Result<impl Responder, AppError> {
    if !tenant.claims.has_role(MANAGER_ROLES) {
        query.employee_id = Some(tenant.claims.acting_employee(query.employee_id)?);
    }
    let balances = db::leave::get_balances(&tenant.pool, &query).await?;
    Ok(HttpResponse::Ok().json(balances))
}

#[put("/leave/balances")]
pub async fn set_balance_handler(
    tenant: TenantDb,
    Json(input): Json<BalanceInput>,
) -> Result<impl Responder, AppError> {
    tenant.require(HR_ROLES)?;
    input.validate()?;
    db::employees::ensure_exists(&tenant.pool, input.employee_id).await?;
    db::leave::get_leave_type(&tenant.pool, input.leave_type_id).await?;
    let balance = db::leave::set_balance(&tenant.pool, &input).await?;
    tenant
        .audit("override", "leave_balance", Some(balance.id), None, snapshot(&balance))
        .await;
    Ok(HttpResponse::Ok().json(balance))
}

#[get("/leave/applications")]
pub async fn list_applications_handler(
    tenant: TenantDb,
    Query(mut query): Query<LeaveQuery>,
) -> Result<impl Responder, AppError> {
    if !tenant.claims.has_role(MANAGER_ROLES) {
        query.employee_id = Some(tenant.claims.acting_employee(query.employee_id)?);
    }
    let applications = db::leave::get_applications(&tenant.pool, &query).await?;
    Ok(HttpResponse::Ok().json(applications))
}

#[get("/leave/applications/{id}")]
pub async fn get_application_handler(tenant: TenantDb, path: web::Path<i64>) -> Result<impl Responder, AppError> {
    let application = db::leave::get_application(&tenant.pool, path.into_inner()).await?;
    if !tenant.claims.has_role(MANAGER_ROLES) {
        tenant.require_employee_access(application.employee_id)?;
    }
    Ok(HttpResponse::Ok().json(application))
}

#[post("/leave/applications")]
pub async fn apply_leave_handler(
    tenant: TenantDb,
    Json(input): Json<LeaveApplyInput>,
) -> Result<impl Responder, AppError> {
    input.validate()?;
    let employee_id = tenant.claims.acting_employee(input.employee_id)?;
    let application = db::leave::apply(&tenant.pool, employee_id, &input).await?;
    tenant
        .audit("apply", "leave_application", Some(application.id), None, snapshot(&application))
        .await;
    Ok(HttpResponse::Created().json(application))
}

/// HR and admins decide on anyone's leave, managers only on their direct
/// reports'. Nobody but an admin decides on their own.
fn may_decide(claims: &Claims, employee_id: i64, manager_id: Option<i64>) -> Result<(), AppError> {
    claims.require(MANAGER_ROLES)?;
    if claims.employee_id == Some(employee_id) && !claims.has_role(ADMIN_ROLES) {
        return Err(AppError::Forbidden(
            "You cannot decide on your own leave application".to_owned(),
        ));
    }
    if !claims.has_role(HR_ROLES) && (claims.employee_id.is_none() || manager_id != claims.employee_id) {
        return Err(AppError::Forbidden(
            "You can only decide on leave of your direct reports".to_owned(),
        ));
    }
    Ok(())
}

async fn check_reviewer(tenant: &TenantDb, application: &LeaveApplication) -> Result<(), AppError> {
    tenant.require(MANAGER_ROLES)?;
    let manager_id = if tenant.claims.has_role(HR_ROLES) {
        None
    } else {
        db::employees::get_employee(&tenant.pool, application.employee_id)
            .await?
            .manager_id
    };
    may_decide(&tenant.claims, application.employee_id, manager_id)
}

async fn notify_decision(state: &AppState, tenant: &TenantDb, application: &LeaveApplication) {
    let employee = match db::employees::get_employee(&tenant.pool, application.employee_id).await {
        Ok(employee) => employee,
        Err(e) => {
            log::warn!("No employee to notify for leave {}: {}", application.id, e);
            return;
        }
    };
    let mut context = Context::new();
    context.insert("employee", &employee);
    context.insert("application", application);
    match reports::render("leave_decision_email.html", &context) {
        Ok(html) => {
            state
                .mailer
                .notify(
                    &employee.email,
                    &format!("Leave request {:?}", application.status),
                    html,
                )
                .await
        }
        Err(e) => log::warn!("Leave decision mail for {} not sent: {}", application.id, e),
    }
}

#[post("/leave/applications/{id}/approve")]
pub async fn approve_leave_handler(
    state: Data<AppState>,
    tenant: TenantDb,
    path: web::Path<i64>,
    body: Option<Json<LeaveDecision>>,
) -> Result<impl Responder, AppError> {
    let id = path.into_inner();
    let decision = body.map(Json::into_inner).unwrap_or_default();
    let before = db::leave::get_application(&tenant.pool, id).await?;
    check_reviewer(&tenant, &before).await?;
    let application =
        db::leave::approve(&tenant.pool, id, &tenant.claims.sub, decision.comment.as_deref()).await?;
    tenant
        .audit("approve", "leave_application", Some(id), snapshot(&before), snapshot(&application))
        .await;
    notify_decision(&state, &tenant, &application).await;
    Ok(HttpResponse::Ok().json(application))
}

#[post("/leave/applications/{id}/reject")]
pub async fn reject_leave_handler(
    state: Data<AppState>,
    tenant: TenantDb,
    path: web::Path<i64>,
    body: Option<Json<LeaveDecision>>,
) -> Result<impl Responder, AppError> {
    let id = path.into_inner();
    let decision = body.map(Json::into_inner).unwrap_or_default();
    let before = db::leave::get_application(&tenant.pool, id).await?;
    check_reviewer(&tenant, &before).await?;
    let application =
        db::leave::reject(&tenant.pool, id, &tenant.claims.sub, decision.comment.as_deref()).await?;
    tenant
        .audit("reject", "leave_application", Some(id), snapshot(&before), snapshot(&application))
        .await;
    notify_decision(&state, &tenant, &application).await;
    Ok(HttpResponse::Ok().json(application))
}

#[post("/leave/applications/{id}/cancel")]
pub async fn cancel_leave_handler(tenant: TenantDb, path: web::Path<i64>) -> Result<impl Responder, AppError> {
    let id = path.into_inner();
    let before = db::leave::get_application(&tenant.pool, id).await?;
    if !tenant.claims.has_role(HR_ROLES) {
        tenant.require_employee_access(before.employee_id)?;
    }
    let application = db::leave::cancel(&tenant.pool, id, &tenant.claims.sub).await?;
    tenant
        .audit("cancel", "leave_application", Some(id), snapshot(&before), snapshot(&application))
        .await;
    Ok(HttpResponse::Ok().json(application))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;

    fn claims(role: Role, employee_id: Option<i64>) -> Claims {
        Claims {
            sub: "reviewer@example.com".to_owned(),
            uid: 7,
            role,
            tenant: Some("acme".to_owned()),
            employee_id,
            iat: 0,
            exp: 0,
        }
    }

    #[test]
    fn managers_decide_only_for_direct_reports() {
        let manager = claims(Role::Manager, Some(10));
        assert!(may_decide(&manager, 20, Some(10)).is_ok());
        assert!(matches!(may_decide(&manager, 21, Some(11)), Err(AppError::Forbidden(_))));
        assert!(matches!(may_decide(&manager, 22, None), Err(AppError::Forbidden(_))));
        assert!(matches!(may_decide(&manager, 10, Some(10)), Err(AppError::Forbidden(_))));

        let unlinked = claims(Role::Manager, None);
        assert!(matches!(may_decide(&unlinked, 20, None), Err(AppError::Forbidden(_))));
    }

    #[test]
    fn hr_and_admins_are_unrestricted_by_reporting_line() {
        let hr = claims(Role::Hr, Some(1));
        assert!(may_decide(&hr, 21, Some(11)).is_ok());
        assert!(matches!(may_decide(&hr, 1, None), Err(AppError::Forbidden(_))));

        let admin = claims(Role::Admin, Some(2));
        assert!(may_decide(&admin, 2, None).is_ok());

        assert!(matches!(
            may_decide(&claims(Role::Employee, Some(3)), 20, Some(3)),
            Err(AppError::Forbidden(_))
        ));
    }
}
