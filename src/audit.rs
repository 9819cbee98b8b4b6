//! Append-only audit trail and server-error log, both kept in the master database.

use actix_web::{
    body::MessageBody,
    dev::{ServiceRequest, ServiceResponse},
    middleware::Next,
    web::Data,
    Error,
};
use serde::Serialize;
use serde_json::Value;
use sqlx::SqlitePool;

use crate::{auth, db, tenancy::TENANT_HEADER, AppState};

#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub tenant: Option<String>,
    pub actor: String,
    pub action: String,
    pub entity: String,
    pub entity_id: Option<i64>,
    pub before: Option<Value>,
    pub after: Option<Value>,
}

#[derive(Debug, Clone)]
pub struct ErrorEntry {
    pub tenant: Option<String>,
    pub method: String,
    pub path: String,
    pub status: i64,
    pub message: String,
}

pub fn snapshot<T: Serialize>(value: &T) -> Option<Value> {
    serde_json::to_value(value).ok()
}

/// Audit failures never fail the business operation.
pub async fn record(master: &SqlitePool, entry: AuditEntry) {
    if let Err(e) = db::master::insert_audit_log(master, &entry).await {
        log::error!(
            "Failed to write audit log for {} {} {:?}: {}",
            entry.action,
            entry.entity,
            entry.entity_id,
            e
        );
    }
}

pub async fn record_error(master: &SqlitePool, entry: ErrorEntry) {
    if let Err(e) = db::master::insert_error_log(master, &entry).await {
        log::error!("Failed to write error log for {} {}: {}", entry.method, entry.path, e);
    }
}

/// Copies every 5xx response into `error_logs`.
pub async fn error_log_middleware(
    req: ServiceRequest,
    next: Next<impl MessageBody>,
) -> Result<ServiceResponse<impl MessageBody>, Error> {
    let state = req.app_data::<Data<AppState>>().cloned();
    let method = req.method().to_string();
    let path = req.path().to_owned();
    let tenant = auth::authenticate(req.request())
        .ok()
        .and_then(|claims| claims.tenant)
        .or_else(|| {
            req.headers()
                .get(TENANT_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned)
        });

    let res = next.call(req).await?;

    if res.status().is_server_error() {
        if let Some(state) = state {
            let message = res
                .response()
                .error()
                .map(|e| e.to_string())
                .unwrap_or_else(|| res.status().to_string());
            log::error!("{} {} failed with {}: {}", method, path, res.status(), message);
            record_error(
                &state.master,
                ErrorEntry {
                    tenant,
                    method,
                    path,
                    status: i64::from(res.status().as_u16()),
                    message,
                },
            )
            .await;
        }
    }
    Ok(res)
}
