use actix_web::{
    get, post, put,
    web::{self, Data, Json},
    HttpResponse, Responder,
};
use serde::Deserialize;
use serde_json::json;
use validator::Validate;

use crate::{
    audit::snapshot,
    auth::{issue_token, AuthUser, Role, TokenSubject, ADMIN_ROLES},
    db,
    errors::AppError,
    structs::employee::{NewUserInput, UserUpdate},
    tenancy::{current_claims, TenantDb},
    utils::{check_password_strength, hash_password, verify_password},
    AppState,
};

#[derive(Deserialize, Validate)]
pub struct AdminLogin {
    #[validate(email)]
    email: String,
    password: String,
}

#[derive(Deserialize, Validate)]
pub struct TenantLogin {
    #[validate(length(min = 2, max = 63))]
    tenant: String,
    #[validate(email)]
    email: String,
    password: String,
}

#[derive(Deserialize)]
pub struct PasswordChange {
    current_password: String,
    new_password: String,
}

fn invalid_credentials() -> AppError {
    AppError::Unauthorized("Invalid credentials".to_owned())
}

#[post("/admin/login")]
pub async fn admin_login_handler(
    state: Data<AppState>,
    Json(form): Json<AdminLogin>,
) -> Result<impl Responder, AppError> {
    form.validate()?;
    let lc_email = form.email.to_lowercase();

    let user = db::master::find_global_user(&state.master, &lc_email)
        .await?
        .ok_or_else(invalid_credentials)?;
    if !user.is_active || !verify_password(&form.password, &user.pwd_hash)? {
        log::warn!("Failed super admin login for {}", lc_email);
        return Err(invalid_credentials());
    }

    let token = issue_token(
        &state.config,
        TokenSubject {
            uid: user.id,
            email: &user.email,
            role: Role::SuperAdmin,
            tenant: None,
            employee_id: None,
        },
    )?;
    log::info!("Super admin {} logged in", user.email);
    Ok(HttpResponse::Ok().json(token))
}

#[post("/auth/login")]
pub async fn login_handler(
    state: Data<AppState>,
    Json(form): Json<TenantLogin>,
) -> Result<impl Responder, AppError> {
    form.validate()?;
    let lc_email = form.email.to_lowercase();
    let (tenant, pool) = state.tenants.resolve(&form.tenant).await?;

    let user = db::users::find_by_email(&pool, &lc_email)
        .await?
        .ok_or_else(invalid_credentials)?;
    if !verify_password(&form.password, &user.pwd_hash)? {
        log::warn!("Failed login for {} on tenant {}", lc_email, tenant.name);
        return Err(invalid_credentials());
    }
    if !user.is_active {
        return Err(AppError::Unauthorized("Account is disabled".to_owned()));
    }

    let token = issue_token(
        &state.config,
        TokenSubject {
            uid: user.id,
            email: &user.email,
            role: user.role,
            tenant: Some(&tenant.name),
            employee_id: user.employee_id,
        },
    )?;
    log::info!("User {} logged in to tenant {}", user.email, tenant.name);
    Ok(HttpResponse::Ok().json(token))
}

#[get("/auth/me")]
pub async fn me_handler(state: Data<AppState>, AuthUser(claims): AuthUser) -> Result<impl Responder, AppError> {
    let claims = current_claims(&state, claims).await?;
    Ok(HttpResponse::Ok().json(json!({
        "email": claims.sub,
        "user_id": claims.uid,
        "role": claims.role,
        "tenant": claims.tenant,
        "employee_id": claims.employee_id,
        "expires_at": claims.exp,
    })))
}

#[post("/auth/change-password")]
pub async fn change_password_handler(
    state: Data<AppState>,
    AuthUser(claims): AuthUser,
    Json(form): Json<PasswordChange>,
) -> Result<impl Responder, AppError> {
    check_password_strength(&form.new_password)?;

    match &claims.tenant {
        None => {
            let user = db::master::find_global_user(&state.master, &claims.sub)
                .await?
                .filter(|user| user.is_active)
                .ok_or_else(invalid_credentials)?;
            if !verify_password(&form.current_password, &user.pwd_hash)? {
                return Err(invalid_credentials());
            }
            let pwd_hash = hash_password(&form.new_password)?;
            db::master::update_global_password(&state.master, user.id, &pwd_hash).await?;
        }
        Some(tenant) => {
            let (_, pool) = state.tenants.resolve(tenant).await?;
            let user = db::users::find_user(&pool, claims.uid)
                .await?
                .filter(|user| user.is_active)
                .ok_or_else(|| AppError::Unauthorized("Account is disabled".to_owned()))?;
            if !verify_password(&form.current_password, &user.pwd_hash)? {
                return Err(invalid_credentials());
            }
            db::users::update_password(&pool, user.id, &form.new_password).await?;
        }
    }
    Ok(HttpResponse::NoContent().finish())
}

#[get("/users")]
pub async fn list_users_handler(tenant: TenantDb) -> Result<impl Responder, AppError> {
    tenant.require(ADMIN_ROLES)?;
    let users = db::users::get_all_users(&tenant.pool).await?;
    Ok(HttpResponse::Ok().json(users))
}

#[post("/users")]
pub async fn create_user_handler(
    tenant: TenantDb,
    Json(input): Json<NewUserInput>,
) -> Result<impl Responder, AppError> {
    tenant.require(ADMIN_ROLES)?;
    input.validate()?;
    check_password_strength(&input.password)?;
    if input.role == Role::SuperAdmin {
        return Err(AppError::BadRequest(
            "Tenant users cannot be super admins".to_owned(),
        ));
    }
    if let Some(employee_id) = input.employee_id {
        db::employees::ensure_exists(&tenant.pool, employee_id).await?;
    }

    let user = db::users::create_user(
        &tenant.pool,
        &input.email,
        &input.password,
        input.role,
        input.employee_id,
    )
    .await?;
    tenant
        .audit("create", "user", Some(user.id), None, snapshot(&user))
        .await;
    Ok(HttpResponse::Created().json(user))
}

#[put("/users/{id}")]
pub async fn update_user_handler(
    tenant: TenantDb,
    path: web::Path<i64>,
    Json(update): Json<UserUpdate>,
) -> Result<impl Responder, AppError> {
    tenant.require(ADMIN_ROLES)?;
    let id = path.into_inner();
    if update.role == Some(Role::SuperAdmin) {
        return Err(AppError::BadRequest(
            "Tenant users cannot be super admins".to_owned(),
        ));
    }
    if id == tenant.claims.uid && update.is_active == Some(false) {
        return Err(AppError::BadRequest(
            "You cannot deactivate your own account".to_owned(),
        ));
    }
    if let Some(Some(employee_id)) = update.employee_id {
        db::employees::ensure_exists(&tenant.pool, employee_id).await?;
    }

    let before = db::users::get_user(&tenant.pool, id).await?;
    let user = db::users::update_user(&tenant.pool, id, &update).await?;
    tenant
        .audit("update", "user", Some(id), snapshot(&before), snapshot(&user))
        .await;
    Ok(HttpResponse::Ok().json(user))
}
