use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{types::Json, FromRow};
use validator::Validate;

#[derive(Deserialize, Serialize, Debug, Clone, FromRow)]
pub struct Tenant {
    pub id: i64,
    pub name: String,
    pub db_name: String,
    pub display_name: String,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub address: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Deserialize, Serialize, Debug, Clone, FromRow)]
pub struct GlobalUser {
    pub id: i64,
    pub email: String,
    pub full_name: String,
    #[serde(skip_serializing)]
    pub pwd_hash: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Onboarding request: registry row, tenant database and its first admin.
#[derive(Deserialize, Debug, Validate)]
pub struct NewTenant {
    #[validate(length(min = 2, max = 63))]
    pub name: String,
    #[validate(length(min = 1, max = 200))]
    pub display_name: String,
    #[validate(email)]
    pub contact_email: Option<String>,
    #[validate(length(max = 32))]
    pub contact_phone: Option<String>,
    pub address: Option<String>,
    #[validate(email)]
    pub admin_email: String,
    pub admin_password: String,
}

#[derive(Deserialize, Debug, Default, Validate)]
pub struct TenantUpdate {
    #[validate(length(min = 1, max = 200))]
    pub display_name: Option<String>,
    #[validate(email)]
    pub contact_email: Option<String>,
    #[validate(length(max = 32))]
    pub contact_phone: Option<String>,
    pub address: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Serialize, Debug, Clone, FromRow)]
pub struct AuditLog {
    pub id: i64,
    pub tenant: Option<String>,
    pub actor: String,
    pub action: String,
    pub entity: String,
    pub entity_id: Option<i64>,
    pub before_state: Option<Json<Value>>,
    pub after_state: Option<Json<Value>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Deserialize, Debug, Default)]
pub struct AuditQuery {
    pub tenant: Option<String>,
    pub entity: Option<String>,
    pub entity_id: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Serialize, Debug, Clone, FromRow)]
pub struct ErrorLog {
    pub id: i64,
    pub tenant: Option<String>,
    pub method: String,
    pub path: String,
    pub status: i64,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Deserialize, Debug, Default)]
pub struct LimitQuery {
    pub limit: Option<i64>,
}
