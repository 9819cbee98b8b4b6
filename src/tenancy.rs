//! Tenant resolution: tenant name → registry row → that tenant's own SQLite database.

use actix_web::{dev::Payload, web::Data, FromRequest, HttpRequest};
use serde_json::Value;
use sqlx::{
    migrate::Migrator,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    SqlitePool,
};
use std::{
    collections::HashMap,
    future::Future,
    path::{Path, PathBuf},
    pin::Pin,
    time::Duration,
};
use tokio::sync::RwLock;

use crate::{
    audit::{self, AuditEntry},
    auth::{self, Claims, Role},
    db,
    errors::AppError,
    structs::master::Tenant,
    AppState,
};

pub const TENANT_HEADER: &str = "X-Tenant-ID";

static MASTER_MIGRATOR: Migrator = sqlx::migrate!("./migrations/master");
static TENANT_MIGRATOR: Migrator = sqlx::migrate!("./migrations/tenant");

fn connect_options(path: &Path, create: bool) -> SqliteConnectOptions {
    SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(create)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true)
        .read_only(false)
        .busy_timeout(Duration::from_secs(5))
}

pub async fn open_master(data_dir: &Path) -> Result<SqlitePool, AppError> {
    tokio::fs::create_dir_all(data_dir).await?;
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(connect_options(&data_dir.join("master.db"), true))
        .await?;
    MASTER_MIGRATOR.run(&pool).await?;
    log::info!("Master database migrated successfully");
    Ok(pool)
}

/// Tenant names are lowercase slugs; they double as the database file stem.
pub fn validate_tenant_name(name: &str) -> Result<(), AppError> {
    let valid_len = (2..=63).contains(&name.len());
    let starts_ok = name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_lowercase() || c.is_ascii_digit());
    let chars_ok = name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if valid_len && starts_ok && chars_ok {
        Ok(())
    } else {
        Err(AppError::BadRequest(
            "Tenant name must be 2-63 characters of a-z, 0-9 or '-' and start with a letter or digit"
                .to_owned(),
        ))
    }
}

pub fn db_name_for(tenant_name: &str) -> String {
    format!("tenant_{}", tenant_name.replace('-', "_"))
}

pub struct TenantRegistry {
    master: SqlitePool,
    data_dir: PathBuf,
    pools: RwLock<HashMap<String, SqlitePool>>,
}

impl TenantRegistry {
    pub fn new(master: SqlitePool, data_dir: PathBuf) -> Self {
        TenantRegistry {
            master,
            data_dir,
            pools: RwLock::new(HashMap::new()),
        }
    }

    fn database_path(&self, db_name: &str) -> PathBuf {
        self.data_dir.join("tenants").join(format!("{db_name}.db"))
    }

    pub fn upload_dir(&self, db_name: &str) -> PathBuf {
        self.data_dir.join("uploads").join(db_name)
    }

    async fn open(&self, db_name: &str, create: bool) -> Result<SqlitePool, AppError> {
        let path = self.database_path(db_name);
        if !create && !tokio::fs::try_exists(&path).await? {
            log::error!("Tenant database file missing: {}", path.display());
            return Err(AppError::NotFound("Tenant database not found".to_owned()));
        }
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options(&path, create))
            .await?;
        TENANT_MIGRATOR.run(&pool).await?;
        log::info!("Opened tenant database {}", db_name);
        Ok(pool)
    }

    async fn cache(&self, db_name: &str, pool: SqlitePool) -> SqlitePool {
        let mut pools = self.pools.write().await;
        pools.entry(db_name.to_owned()).or_insert(pool).clone()
    }

    /// Creates the tenant database (if needed) and applies the tenant schema.
    pub async fn provision(&self, db_name: &str) -> Result<SqlitePool, AppError> {
        let pool = self.open(db_name, true).await?;
        Ok(self.cache(db_name, pool).await)
    }

    pub async fn resolve(&self, name: &str) -> Result<(Tenant, SqlitePool), AppError> {
        let tenant = db::master::find_tenant_by_name(&self.master, name)
            .await?
            .ok_or_else(|| AppError::NotFound("Tenant not found".to_owned()))?;
        if !tenant.is_active {
            return Err(AppError::Forbidden("Tenant is deactivated".to_owned()));
        }
        if let Some(pool) = self.pools.read().await.get(&tenant.db_name) {
            return Ok((tenant, pool.clone()));
        }
        let pool = self.open(&tenant.db_name, false).await?;
        let pool = self.cache(&tenant.db_name, pool).await;
        Ok((tenant, pool))
    }

    pub async fn evict(&self, db_name: &str) {
        let removed = self.pools.write().await.remove(db_name);
        if let Some(pool) = removed {
            pool.close().await;
            log::info!("Closed tenant database {}", db_name);
        }
    }

    /// Closes and deletes a tenant database that never finished onboarding.
    pub async fn discard(&self, db_name: &str) {
        self.evict(db_name).await;
        let path = self.database_path(db_name);
        for suffix in ["", "-wal", "-shm"] {
            let mut file = path.clone().into_os_string();
            file.push(suffix);
            match tokio::fs::remove_file(&file).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => log::warn!("Could not remove {:?}: {}", file, e),
            }
        }
        log::info!("Discarded tenant database {}", db_name);
    }
}

/// Picks the tenant a request targets from the token and the optional header.
fn tenant_for(claims: &Claims, header: Option<&str>) -> Result<String, AppError> {
    match (&claims.tenant, header) {
        (Some(own), Some(requested)) if own != requested => Err(AppError::Forbidden(
            "Token is not valid for this tenant".to_owned(),
        )),
        (Some(own), _) => Ok(own.clone()),
        (None, Some(requested)) if claims.role == Role::SuperAdmin => Ok(requested.to_owned()),
        (None, _) => Err(AppError::BadRequest(format!(
            "{TENANT_HEADER} header is required"
        ))),
    }
}

/// Replaces the role and employee link a tenant token was issued with by the
/// stored ones. Disabled or removed accounts are rejected.
pub async fn refresh_claims(pool: &SqlitePool, mut claims: Claims) -> Result<Claims, AppError> {
    if claims.role == Role::SuperAdmin {
        return Ok(claims);
    }
    let user = db::users::find_user(pool, claims.uid)
        .await?
        .filter(|user| user.is_active)
        .ok_or_else(|| AppError::Unauthorized("Account is disabled".to_owned()))?;
    claims.role = user.role;
    claims.employee_id = user.employee_id;
    Ok(claims)
}

/// Same refresh for handlers that take a bare token; global tokens pass through.
pub async fn current_claims(state: &AppState, claims: Claims) -> Result<Claims, AppError> {
    match claims.tenant.clone() {
        Some(name) => {
            let (_, pool) = state.tenants.resolve(&name).await?;
            refresh_claims(&pool, claims).await
        }
        None => Ok(claims),
    }
}

/// Request-scoped handle on the caller's tenant database.
pub struct TenantDb {
    pub pool: SqlitePool,
    pub tenant: Tenant,
    pub claims: Claims,
    master: SqlitePool,
}

impl TenantDb {
    pub fn require(&self, roles: &[Role]) -> Result<(), AppError> {
        self.claims.require(roles)
    }

    pub fn require_employee_access(&self, employee_id: i64) -> Result<(), AppError> {
        if self.claims.can_access_employee(employee_id) {
            Ok(())
        } else {
            Err(AppError::Forbidden(
                "You can only access your own employee record".to_owned(),
            ))
        }
    }

    pub async fn audit(
        &self,
        action: &str,
        entity: &str,
        entity_id: Option<i64>,
        before: Option<Value>,
        after: Option<Value>,
    ) {
        audit::record(
            &self.master,
            AuditEntry {
                tenant: Some(self.tenant.name.clone()),
                actor: self.claims.sub.clone(),
                action: action.to_owned(),
                entity: entity.to_owned(),
                entity_id,
                before,
                after,
            },
        )
        .await;
    }
}

impl FromRequest for TenantDb {
    type Error = AppError;
    type Future = Pin<Box<dyn Future<Output = Result<Self, Self::Error>>>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let claims = auth::authenticate(req);
        let state = req.app_data::<Data<AppState>>().cloned();
        let header = req
            .headers()
            .get(TENANT_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);

        Box::pin(async move {
            let claims = claims?;
            let state = state.ok_or(AppError::InternalServerError)?;
            let name = tenant_for(&claims, header.as_deref())?;
            let (tenant, pool) = state.tenants.resolve(&name).await?;

            let claims = refresh_claims(&pool, claims).await?;

            Ok(TenantDb {
                pool,
                tenant,
                claims,
                master: state.master.clone(),
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(role: Role, tenant: Option<&str>) -> Claims {
        Claims {
            sub: "x@example.com".to_owned(),
            uid: 1,
            role,
            tenant: tenant.map(str::to_owned),
            employee_id: None,
            iat: 0,
            exp: 0,
        }
    }

    #[test]
    fn tenant_names_are_slugs() {
        assert!(validate_tenant_name("city-hospital").is_ok());
        assert!(validate_tenant_name("a").is_err());
        assert!(validate_tenant_name("-lead").is_err());
        assert!(validate_tenant_name("Upper").is_err());
        assert!(validate_tenant_name("../etc").is_err());
        assert_eq!(db_name_for("city-hospital"), "tenant_city_hospital");
    }

    #[test]
    fn header_cannot_escape_token_tenant() {
        let user = claims(Role::Admin, Some("acme"));
        assert_eq!(tenant_for(&user, None).unwrap(), "acme");
        assert_eq!(tenant_for(&user, Some("acme")).unwrap(), "acme");
        assert!(matches!(tenant_for(&user, Some("globex")), Err(AppError::Forbidden(_))));

        let root = claims(Role::SuperAdmin, None);
        assert_eq!(tenant_for(&root, Some("globex")).unwrap(), "globex");
        assert!(matches!(tenant_for(&root, None), Err(AppError::BadRequest(_))));
    }

    #[actix_web::test]
    async fn resolve_unknown_tenant_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let master = open_master(dir.path()).await.unwrap();
        let registry = TenantRegistry::new(master, dir.path().to_path_buf());
        let err = registry.resolve("nobody").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[actix_web::test]
    async fn provisioned_pool_is_reused() {
        let dir = tempfile::tempdir().unwrap();
        let master = open_master(dir.path()).await.unwrap();
        db::master::create_tenant(
            &master,
            db::master::TenantRow {
                name: "acme",
                db_name: "tenant_acme",
                display_name: "Acme",
                contact_email: None,
                contact_phone: None,
                address: None,
            },
        )
        .await
        .unwrap();
        let registry = TenantRegistry::new(master, dir.path().to_path_buf());
        registry.provision("tenant_acme").await.unwrap();
        assert!(dir.path().join("tenants/tenant_acme.db").exists());

        let (tenant, pool) = registry.resolve("acme").await.unwrap();
        assert_eq!(tenant.db_name, "tenant_acme");
        let departments: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM departments")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(departments, 0);

        registry.evict("tenant_acme").await;
        assert!(registry.pools.read().await.is_empty());
    }
}
