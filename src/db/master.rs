use chrono::Utc;
use sqlx::SqlitePool;

use crate::{
    audit::{AuditEntry, ErrorEntry},
    errors::AppError,
    structs::master::{AuditLog, AuditQuery, ErrorLog, GlobalUser, Tenant, TenantUpdate},
};

const DEFAULT_LOG_LIMIT: i64 = 100;
const MAX_LOG_LIMIT: i64 = 1000;

fn clamp_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_LOG_LIMIT).clamp(1, MAX_LOG_LIMIT)
}

pub async fn get_all_tenants(pool: &SqlitePool) -> Result<Vec<Tenant>, sqlx::Error> {
    sqlx::query_as::<_, Tenant>("SELECT * FROM tenants ORDER BY name")
        .fetch_all(pool)
        .await
}

pub async fn get_tenant_by_id(pool: &SqlitePool, id: i64) -> Result<Tenant, AppError> {
    sqlx::query_as::<_, Tenant>("SELECT * FROM tenants WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Tenant not found".to_owned()))
}

pub async fn find_tenant_by_name(pool: &SqlitePool, name: &str) -> Result<Option<Tenant>, sqlx::Error> {
    sqlx::query_as::<_, Tenant>("SELECT * FROM tenants WHERE name = ?")
        .bind(name)
        .fetch_optional(pool)
        .await
}

pub struct TenantRow<'a> {
    pub name: &'a str,
    pub db_name: &'a str,
    pub display_name: &'a str,
    pub contact_email: Option<&'a str>,
    pub contact_phone: Option<&'a str>,
    pub address: Option<&'a str>,
}

pub async fn create_tenant(pool: &SqlitePool, row: TenantRow<'_>) -> Result<Tenant, AppError> {
    let now = Utc::now();
    let tenant = sqlx::query_as::<_, Tenant>(
        "INSERT INTO tenants (name, db_name, display_name, contact_email, contact_phone, address, is_active, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, 1, ?, ?) RETURNING *",
    )
    .bind(row.name)
    .bind(row.db_name)
    .bind(row.display_name)
    .bind(row.contact_email)
    .bind(row.contact_phone)
    .bind(row.address)
    .bind(now)
    .bind(now)
    .fetch_one(pool)
    .await
    .map_err(|e| match AppError::from(e) {
        AppError::Conflict(_) => AppError::Conflict(format!("Tenant '{}' already exists", row.name)),
        other => other,
    })?;
    log::info!("Tenant created: {} ({})", tenant.name, tenant.db_name);
    Ok(tenant)
}

pub async fn delete_tenant(pool: &SqlitePool, id: i64) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM tenants WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    log::info!("Tenant row {} removed", id);
    Ok(())
}

pub async fn update_tenant(pool: &SqlitePool, id: i64, update: &TenantUpdate) -> Result<Tenant, AppError> {
    let tenant = sqlx::query_as::<_, Tenant>(
        "UPDATE tenants SET
            display_name = COALESCE(?, display_name),
            contact_email = COALESCE(?, contact_email),
            contact_phone = COALESCE(?, contact_phone),
            address = COALESCE(?, address),
            is_active = COALESCE(?, is_active),
            updated_at = ?
         WHERE id = ? RETURNING *",
    )
    .bind(&update.display_name)
    .bind(&update.contact_email)
    .bind(&update.contact_phone)
    .bind(&update.address)
    .bind(update.is_active)
    .bind(Utc::now())
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Tenant not found".to_owned()))?;
    log::info!("Tenant updated: {}", tenant.name);
    Ok(tenant)
}

pub async fn count_global_users(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM global_users")
        .fetch_one(pool)
        .await
}

pub async fn find_global_user(pool: &SqlitePool, email: &str) -> Result<Option<GlobalUser>, sqlx::Error> {
    sqlx::query_as::<_, GlobalUser>("SELECT * FROM global_users WHERE email = ?")
        .bind(email)
        .fetch_optional(pool)
        .await
}

pub async fn create_global_user(
    pool: &SqlitePool,
    email: &str,
    full_name: &str,
    pwd_hash: &str,
) -> Result<GlobalUser, AppError> {
    let now = Utc::now();
    let user = sqlx::query_as::<_, GlobalUser>(
        "INSERT INTO global_users (email, full_name, pwd_hash, is_active, created_at, updated_at)
         VALUES (?, ?, ?, 1, ?, ?) RETURNING *",
    )
    .bind(email)
    .bind(full_name)
    .bind(pwd_hash)
    .bind(now)
    .bind(now)
    .fetch_one(pool)
    .await?;
    log::info!("Global user created: {}", user.email);
    Ok(user)
}

pub async fn update_global_password(pool: &SqlitePool, id: i64, pwd_hash: &str) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE global_users SET pwd_hash = ?, updated_at = ? WHERE id = ?")
        .bind(pwd_hash)
        .bind(Utc::now())
        .bind(id)
        .execute(pool)
        .await?;
    log::info!("Password changed for global user ID: {}", id);
    Ok(())
}

pub async fn insert_audit_log(pool: &SqlitePool, entry: &AuditEntry) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO audit_logs (tenant, actor, action, entity, entity_id, before_state, after_state, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&entry.tenant)
    .bind(&entry.actor)
    .bind(&entry.action)
    .bind(&entry.entity)
    .bind(entry.entity_id)
    .bind(entry.before.as_ref().map(|v| v.to_string()))
    .bind(entry.after.as_ref().map(|v| v.to_string()))
    .bind(Utc::now())
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn list_audit_logs(pool: &SqlitePool, query: &AuditQuery) -> Result<Vec<AuditLog>, sqlx::Error> {
    sqlx::query_as::<_, AuditLog>(
        "SELECT * FROM audit_logs
         WHERE (? IS NULL OR tenant = ?)
           AND (? IS NULL OR entity = ?)
           AND (? IS NULL OR entity_id = ?)
         ORDER BY id DESC LIMIT ?",
    )
    .bind(&query.tenant)
    .bind(&query.tenant)
    .bind(&query.entity)
    .bind(&query.entity)
    .bind(query.entity_id)
    .bind(query.entity_id)
    .bind(clamp_limit(query.limit))
    .fetch_all(pool)
    .await
}

pub async fn insert_error_log(pool: &SqlitePool, entry: &ErrorEntry) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO error_logs (tenant, method, path, status, message, created_at)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&entry.tenant)
    .bind(&entry.method)
    .bind(&entry.path)
    .bind(entry.status)
    .bind(&entry.message)
    .bind(Utc::now())
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn list_error_logs(pool: &SqlitePool, limit: Option<i64>) -> Result<Vec<ErrorLog>, sqlx::Error> {
    sqlx::query_as::<_, ErrorLog>("SELECT * FROM error_logs ORDER BY id DESC LIMIT ?")
        .bind(clamp_limit(limit))
        .fetch_all(pool)
        .await
}
