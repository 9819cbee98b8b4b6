use actix_web::{
    get, post, put,
    web::{self, Data, Json, Query},
    HttpResponse, Responder,
};
use tera::Context;
use validator::Validate;

use crate::{
    audit::{self, snapshot, AuditEntry},
    auth::{AuthUser, Role, ADMIN_ROLES},
    db::{self, master::TenantRow},
    errors::AppError,
    reports,
    structs::{
        employee::TenantUser,
        master::{AuditQuery, LimitQuery, NewTenant, TenantUpdate},
    },
    tenancy::{current_claims, db_name_for, validate_tenant_name},
    utils::check_password_strength,
    AppState,
};

const SUPER_ADMIN: &[Role] = &[Role::SuperAdmin];

async fn provision_with_admin(state: &AppState, db_name: &str, input: &NewTenant) -> Result<TenantUser, AppError> {
    let pool = state.tenants.provision(db_name).await?;
    db::users::create_user(
        &pool,
        &input.admin_email,
        &input.admin_password,
        Role::Admin,
        None,
    )
    .await
}

#[post("/tenants")]
pub async fn onboard_tenant_handler(
    state: Data<AppState>,
    AuthUser(claims): AuthUser,
    Json(input): Json<NewTenant>,
) -> Result<impl Responder, AppError> {
    claims.require(SUPER_ADMIN)?;
    input.validate()?;
    let name = input.name.trim().to_lowercase();
    validate_tenant_name(&name)?;
    check_password_strength(&input.admin_password)?;

    if db::master::find_tenant_by_name(&state.master, &name).await?.is_some() {
        return Err(AppError::Conflict(format!("Tenant '{name}' already exists")));
    }

    let db_name = db_name_for(&name);
    let tenant = db::master::create_tenant(
        &state.master,
        TenantRow {
            name: &name,
            db_name: &db_name,
            display_name: input.display_name.trim(),
            contact_email: input.contact_email.as_deref(),
            contact_phone: input.contact_phone.as_deref(),
            address: input.address.as_deref(),
        },
    )
    .await?;

    let admin = match provision_with_admin(&state, &db_name, &input).await {
        Ok(admin) => admin,
        Err(e) => {
            log::error!("Onboarding of tenant {} failed, rolling back: {}", name, e);
            state.tenants.discard(&db_name).await;
            if let Err(cleanup) = db::master::delete_tenant(&state.master, tenant.id).await {
                log::error!("Could not remove tenant row {}: {}", tenant.id, cleanup);
            }
            return Err(e);
        }
    };

    audit::record(
        &state.master,
        AuditEntry {
            tenant: Some(tenant.name.clone()),
            actor: claims.sub.clone(),
            action: "create".to_owned(),
            entity: "tenant".to_owned(),
            entity_id: Some(tenant.id),
            before: None,
            after: snapshot(&tenant),
        },
    )
    .await;

    let mut context = Context::new();
    context.insert("tenant", &tenant);
    context.insert("admin_email", &admin.email);
    let html = reports::render("welcome_email.html", &context)?;
    state
        .mailer
        .notify(
            &admin.email,
            &format!("Welcome to {}", tenant.display_name),
            html,
        )
        .await;

    log::info!("Tenant {} onboarded by {}", tenant.name, claims.sub);
    Ok(HttpResponse::Created().json(tenant))
}

#[get("/tenants")]
pub async fn list_tenants_handler(
    state: Data<AppState>,
    AuthUser(claims): AuthUser,
) -> Result<impl Responder, AppError> {
    claims.require(SUPER_ADMIN)?;
    let tenants = db::master::get_all_tenants(&state.master).await?;
    Ok(HttpResponse::Ok().json(tenants))
}

#[get("/tenants/{id}")]
pub async fn get_tenant_handler(
    state: Data<AppState>,
    AuthUser(claims): AuthUser,
    path: web::Path<i64>,
) -> Result<impl Responder, AppError> {
    claims.require(SUPER_ADMIN)?;
    let tenant = db::master::get_tenant_by_id(&state.master, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(tenant))
}

#[put("/tenants/{id}")]
pub async fn update_tenant_handler(
    state: Data<AppState>,
    AuthUser(claims): AuthUser,
    path: web::Path<i64>,
    Json(update): Json<TenantUpdate>,
) -> Result<impl Responder, AppError> {
    claims.require(SUPER_ADMIN)?;
    update.validate()?;
    let id = path.into_inner();

    let before = db::master::get_tenant_by_id(&state.master, id).await?;
    let tenant = db::master::update_tenant(&state.master, id, &update).await?;
    if !tenant.is_active {
        state.tenants.evict(&tenant.db_name).await;
    }

    audit::record(
        &state.master,
        AuditEntry {
            tenant: Some(tenant.name.clone()),
            actor: claims.sub.clone(),
            action: "update".to_owned(),
            entity: "tenant".to_owned(),
            entity_id: Some(id),
            before: snapshot(&before),
            after: snapshot(&tenant),
        },
    )
    .await;
    Ok(HttpResponse::Ok().json(tenant))
}

/// Tenant admins only ever see their own tenant's trail.
#[get("/audit-logs")]
pub async fn audit_logs_handler(
    state: Data<AppState>,
    AuthUser(claims): AuthUser,
    Query(mut query): Query<AuditQuery>,
) -> Result<impl Responder, AppError> {
    let claims = current_claims(&state, claims).await?;
    claims.require(ADMIN_ROLES)?;
    if claims.role != Role::SuperAdmin {
        query.tenant = claims.tenant.clone();
    }
    let logs = db::master::list_audit_logs(&state.master, &query).await?;
    Ok(HttpResponse::Ok().json(logs))
}

#[get("/error-logs")]
pub async fn error_logs_handler(
    state: Data<AppState>,
    AuthUser(claims): AuthUser,
    Query(query): Query<LimitQuery>,
) -> Result<impl Responder, AppError> {
    claims.require(SUPER_ADMIN)?;
    let logs = db::master::list_error_logs(&state.master, query.limit).await?;
    Ok(HttpResponse::Ok().json(logs))
}
