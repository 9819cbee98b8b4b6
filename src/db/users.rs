use chrono::Utc;
use sqlx::{Executor, Sqlite, SqlitePool};

use crate::{
    auth::Role,
    errors::AppError,
    structs::employee::{TenantUser, UserUpdate},
    utils::hash_password,
};

pub async fn find_user(pool: &SqlitePool, id: i64) -> Result<Option<TenantUser>, sqlx::Error> {
    sqlx::query_as::<_, TenantUser>("SELECT * FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn find_by_email(pool: &SqlitePool, email: &str) -> Result<Option<TenantUser>, sqlx::Error> {
    sqlx::query_as::<_, TenantUser>("SELECT * FROM users WHERE email = ?")
        .bind(email)
        .fetch_optional(pool)
        .await
}

pub async fn get_user(pool: &SqlitePool, id: i64) -> Result<TenantUser, AppError> {
    find_user(pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_owned()))
}

pub async fn get_all_users(pool: &SqlitePool) -> Result<Vec<TenantUser>, sqlx::Error> {
    sqlx::query_as::<_, TenantUser>("SELECT * FROM users ORDER BY email")
        .fetch_all(pool)
        .await
}

pub async fn create_user(
    pool: &SqlitePool,
    email: &str,
    password: &str,
    role: Role,
    employee_id: Option<i64>,
) -> Result<TenantUser, AppError> {
    let now = Utc::now();
    let pwd_hash = hash_password(password)?;
    let user = sqlx::query_as::<_, TenantUser>(
        "INSERT INTO users (email, pwd_hash, role, employee_id, is_active, created_at, updated_at)
         VALUES (?, ?, ?, ?, 1, ?, ?) RETURNING *",
    )
    .bind(email.to_lowercase())
    .bind(pwd_hash)
    .bind(role)
    .bind(employee_id)
    .bind(now)
    .bind(now)
    .fetch_one(pool)
    .await
    .map_err(|e| match AppError::from(e) {
        AppError::Conflict(_) => AppError::Conflict(format!("User {email} already exists")),
        other => other,
    })?;
    log::info!("User created: {} ({:?})", user.email, user.role);
    Ok(user)
}

pub async fn update_user(pool: &SqlitePool, id: i64, update: &UserUpdate) -> Result<TenantUser, AppError> {
    let user = sqlx::query_as::<_, TenantUser>(
        "UPDATE users SET
            role = COALESCE(?, role),
            employee_id = CASE WHEN ? THEN ? ELSE employee_id END,
            is_active = COALESCE(?, is_active),
            updated_at = ?
         WHERE id = ? RETURNING *",
    )
    .bind(update.role)
    .bind(update.employee_id.is_some())
    .bind(update.employee_id.flatten())
    .bind(update.is_active)
    .bind(Utc::now())
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound("User not found".to_owned()))?;
    log::info!("User updated: {}", user.email);
    Ok(user)
}

pub async fn update_password(pool: &SqlitePool, id: i64, password: &str) -> Result<(), AppError> {
    let pwd_hash = hash_password(password)?;
    sqlx::query("UPDATE users SET pwd_hash = ?, updated_at = ? WHERE id = ?")
        .bind(pwd_hash)
        .bind(Utc::now())
        .bind(id)
        .execute(pool)
        .await?;
    log::info!("Password changed for user ID: {}", id);
    Ok(())
}

pub async fn deactivate_for_employee<'e, E>(executor: E, employee_id: i64) -> Result<u64, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query("UPDATE users SET is_active = 0, updated_at = ? WHERE employee_id = ?")
        .bind(Utc::now())
        .bind(employee_id)
        .execute(executor)
        .await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support;

    #[actix_web::test]
    async fn employee_link_is_cleared_only_by_null() {
        let (_dir, pool) = test_support::tenant_pool().await;
        let employee = test_support::employee(&pool, "E010").await;
        let user = create_user(&pool, "linked@example.com", "Str0ng#Pass", Role::Employee, Some(employee.id))
            .await
            .unwrap();

        let untouched: UserUpdate = serde_json::from_str(r#"{"role":"manager"}"#).unwrap();
        let user = update_user(&pool, user.id, &untouched).await.unwrap();
        assert_eq!(user.role, Role::Manager);
        assert_eq!(user.employee_id, Some(employee.id));

        let cleared: UserUpdate = serde_json::from_str(r#"{"employee_id":null}"#).unwrap();
        assert_eq!(cleared.employee_id, Some(None));
        let user = update_user(&pool, user.id, &cleared).await.unwrap();
        assert_eq!(user.employee_id, None);
        assert_eq!(user.role, Role::Manager);
    }
}
