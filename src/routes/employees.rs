use actix_files::NamedFile;
use actix_web::{
    delete, get,
    http::header::{ContentDisposition, DispositionParam, DispositionType},
    post, put,
    web::{self, Bytes, Data, Json, Query},
    HttpResponse, Responder,
};
use chrono::Utc;
use validator::Validate;

use crate::{
    audit::snapshot,
    auth::{HR_ROLES, MANAGER_ROLES},
    db::{self, satellites::Satellite},
    errors::AppError,
    structs::employee::{
        BankDetail, Certification, Education, EmployeeInput, EmployeeQuery, EmployeeUpdate,
        Experience, FamilyMember, MedicalRecord, Skill, UploadQuery,
    },
    tenancy::TenantDb,
    AppState,
};

#[get("/employees")]
pub async fn list_employees_handler(
    tenant: TenantDb,
    Query(query): Query<EmployeeQuery>,
) -> Result<impl Responder, AppError> {
    tenant.require(MANAGER_ROLES)?;
    let employees = db::employees::get_all_employees(&tenant.pool, &query).await?;
    Ok(HttpResponse::Ok().json(employees))
}

#[get("/employees/{id}")]
pub async fn get_employee_handler(tenant: TenantDb, path: web::Path<i64>) -> Result<impl Responder, AppError> {
    let id = path.into_inner();
    if !tenant.claims.has_role(MANAGER_ROLES) {
        tenant.require_employee_access(id)?;
    }
    let employee = db::employees::get_employee(&tenant.pool, id).await?;
    Ok(HttpResponse::Ok().json(employee))
}

#[post("/employees")]
pub async fn create_employee_handler(
    tenant: TenantDb,
    Json(input): Json<EmployeeInput>,
) -> Result<impl Responder, AppError> {
    tenant.require(HR_ROLES)?;
    input.validate()?;
    let employee = db::employees::create_employee(&tenant.pool, &input).await?;
    tenant
        .audit("create", "employee", Some(employee.id), None, snapshot(&employee))
        .await;
    Ok(HttpResponse::Created().json(employee))
}

#[put("/employees/{id}")]
pub async fn update_employee_handler(
    tenant: TenantDb,
    path: web::Path<i64>,
    Json(update): Json<EmployeeUpdate>,
) -> Result<impl Responder, AppError> {
    tenant.require(HR_ROLES)?;
    update.validate()?;
    let id = path.into_inner();
    if update.manager_id == Some(id) {
        return Err(AppError::BadRequest(
            "An employee cannot be their own manager".to_owned(),
        ));
    }
    let before = db::employees::get_employee(&tenant.pool, id).await?;
    let employee = db::employees::update_employee(&tenant.pool, id, &update).await?;
    tenant
        .audit("update", "employee", Some(id), snapshot(&before), snapshot(&employee))
        .await;
    Ok(HttpResponse::Ok().json(employee))
}

#[delete("/employees/{id}")]
pub async fn delete_employee_handler(tenant: TenantDb, path: web::Path<i64>) -> Result<impl Responder, AppError> {
    tenant.require(HR_ROLES)?;
    let id = path.into_inner();
    let before = db::employees::get_employee(&tenant.pool, id).await?;
    let documents = db::employees::get_documents(&tenant.pool, id).await?;
    db::employees::delete_employee(&tenant.pool, id).await?;
    for document in documents {
        remove_stored_file(&document.stored_path).await;
    }
    tenant
        .audit("delete", "employee", Some(id), snapshot(&before), None)
        .await;
    Ok(HttpResponse::NoContent().finish())
}

async fn list_records<T: Satellite>(tenant: TenantDb, path: web::Path<i64>) -> Result<HttpResponse, AppError> {
    let employee_id = path.into_inner();
    tenant.require_employee_access(employee_id)?;
    db::employees::ensure_exists(&tenant.pool, employee_id).await?;
    let records = db::satellites::list::<T>(&tenant.pool, employee_id).await?;
    Ok(HttpResponse::Ok().json(records))
}

async fn get_record<T: Satellite>(tenant: TenantDb, path: web::Path<(i64, i64)>) -> Result<HttpResponse, AppError> {
    let (employee_id, id) = path.into_inner();
    tenant.require_employee_access(employee_id)?;
    let record = db::satellites::get::<T>(&tenant.pool, employee_id, id).await?;
    Ok(HttpResponse::Ok().json(record))
}

async fn create_record<T: Satellite>(
    tenant: TenantDb,
    path: web::Path<i64>,
    Json(input): Json<T::Input>,
) -> Result<HttpResponse, AppError> {
    let employee_id = path.into_inner();
    tenant.require_employee_access(employee_id)?;
    input.validate()?;
    T::validate_input(&input)?;
    db::employees::ensure_exists(&tenant.pool, employee_id).await?;
    let record = db::satellites::create::<T>(&tenant.pool, employee_id, input).await?;
    let after = snapshot(&record);
    let id = after.as_ref().and_then(|v| v.get("id")).and_then(|v| v.as_i64());
    tenant.audit("create", T::ENTITY, id, None, after).await;
    Ok(HttpResponse::Created().json(record))
}

async fn update_record<T: Satellite>(
    tenant: TenantDb,
    path: web::Path<(i64, i64)>,
    Json(input): Json<T::Input>,
) -> Result<HttpResponse, AppError> {
    let (employee_id, id) = path.into_inner();
    tenant.require_employee_access(employee_id)?;
    input.validate()?;
    T::validate_input(&input)?;
    let before = db::satellites::get::<T>(&tenant.pool, employee_id, id).await?;
    let record = db::satellites::update::<T>(&tenant.pool, employee_id, id, input).await?;
    tenant
        .audit("update", T::ENTITY, Some(id), snapshot(&before), snapshot(&record))
        .await;
    Ok(HttpResponse::Ok().json(record))
}

async fn delete_record<T: Satellite>(tenant: TenantDb, path: web::Path<(i64, i64)>) -> Result<HttpResponse, AppError> {
    let (employee_id, id) = path.into_inner();
    tenant.require_employee_access(employee_id)?;
    let before = db::satellites::get::<T>(&tenant.pool, employee_id, id).await?;
    db::satellites::delete::<T>(&tenant.pool, employee_id, id).await?;
    tenant
        .audit("delete", T::ENTITY, Some(id), snapshot(&before), None)
        .await;
    Ok(HttpResponse::NoContent().finish())
}

fn satellite<T: Satellite>(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource(format!("/employees/{{employee_id}}/{}", T::ENTITY))
            .route(web::get().to(list_records::<T>))
            .route(web::post().to(create_record::<T>)),
    )
    .service(
        web::resource(format!("/employees/{{employee_id}}/{}/{{id}}", T::ENTITY))
            .route(web::get().to(get_record::<T>))
            .route(web::put().to(update_record::<T>))
            .route(web::delete().to(delete_record::<T>)),
    );
}

pub fn configure_satellites(cfg: &mut web::ServiceConfig) {
    satellite::<BankDetail>(cfg);
    satellite::<Education>(cfg);
    satellite::<Experience>(cfg);
    satellite::<FamilyMember>(cfg);
    satellite::<MedicalRecord>(cfg);
    satellite::<Skill>(cfg);
    satellite::<Certification>(cfg);
}

/// Keeps `[A-Za-z0-9._-]`, so stored names never leave the upload directory.
fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.').to_owned();
    if cleaned.is_empty() {
        "document".to_owned()
    } else {
        cleaned
    }
}

async fn remove_stored_file(path: &str) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        log::warn!("Could not remove stored document {}: {}", path, e);
    }
}

#[post("/employees/{id}/documents")]
pub async fn upload_document_handler(
    state: Data<AppState>,
    tenant: TenantDb,
    path: web::Path<i64>,
    Query(query): Query<UploadQuery>,
    body: Bytes,
) -> Result<impl Responder, AppError> {
    let employee_id = path.into_inner();
    tenant.require_employee_access(employee_id)?;
    if body.is_empty() {
        return Err(AppError::BadRequest("Document body is empty".to_owned()));
    }
    let doc_type = query.doc_type.trim();
    if doc_type.is_empty() || doc_type.len() > 50 {
        return Err(AppError::BadRequest(
            "doc_type must be 1-50 characters".to_owned(),
        ));
    }
    db::employees::ensure_exists(&tenant.pool, employee_id).await?;

    let file_name = sanitize_file_name(&query.file_name);
    let dir = state
        .tenants
        .upload_dir(&tenant.tenant.db_name)
        .join(employee_id.to_string());
    tokio::fs::create_dir_all(&dir).await?;
    let stamp = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    let stored = dir.join(format!("{stamp}_{file_name}"));
    tokio::fs::write(&stored, &body).await?;

    let document = db::employees::create_document(
        &tenant.pool,
        employee_id,
        doc_type,
        &file_name,
        &stored.to_string_lossy(),
        body.len() as i64,
    )
    .await?;
    tenant
        .audit("upload", "document", Some(document.id), None, snapshot(&document))
        .await;
    Ok(HttpResponse::Created().json(document))
}

#[get("/employees/{id}/documents")]
pub async fn list_documents_handler(tenant: TenantDb, path: web::Path<i64>) -> Result<impl Responder, AppError> {
    let employee_id = path.into_inner();
    tenant.require_employee_access(employee_id)?;
    let documents = db::employees::get_documents(&tenant.pool, employee_id).await?;
    Ok(HttpResponse::Ok().json(documents))
}

#[get("/employees/{id}/documents/{doc_id}")]
pub async fn download_document_handler(
    tenant: TenantDb,
    path: web::Path<(i64, i64)>,
) -> Result<NamedFile, AppError> {
    let (employee_id, doc_id) = path.into_inner();
    tenant.require_employee_access(employee_id)?;
    let document = db::employees::get_document(&tenant.pool, employee_id, doc_id).await?;
    let file = NamedFile::open_async(&document.stored_path)
        .await
        .map_err(|e| {
            log::error!("Stored document {} is unreadable: {}", document.stored_path, e);
            AppError::NotFound("Document file is missing".to_owned())
        })?;
    Ok(file.set_content_disposition(ContentDisposition {
        disposition: DispositionType::Attachment,
        parameters: vec![DispositionParam::Filename(document.file_name)],
    }))
}

#[delete("/employees/{id}/documents/{doc_id}")]
pub async fn delete_document_handler(
    tenant: TenantDb,
    path: web::Path<(i64, i64)>,
) -> Result<impl Responder, AppError> {
    let (employee_id, doc_id) = path.into_inner();
    tenant.require(HR_ROLES)?;
    let document = db::employees::get_document(&tenant.pool, employee_id, doc_id).await?;
    db::employees::delete_document(&tenant.pool, document.id).await?;
    remove_stored_file(&document.stored_path).await;
    tenant
        .audit("delete", "document", Some(document.id), snapshot(&document), None)
        .await;
    Ok(HttpResponse::NoContent().finish())
}

#[cfg(test)]
mod tests {
    use super::sanitize_file_name;

    #[test]
    fn file_names_stay_inside_upload_dir() {
        assert_eq!(sanitize_file_name("offer letter.pdf"), "offer_letter.pdf");
        assert_eq!(sanitize_file_name("../../etc/passwd"), "_.._etc_passwd");
        assert_eq!(sanitize_file_name("..."), "document");
    }
}
