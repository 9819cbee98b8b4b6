use chrono::Utc;
use sqlx::{Executor, Sqlite, SqlitePool};

use crate::{
    errors::AppError,
    structs::employee::{
        Employee, EmployeeDocument, EmployeeInput, EmployeeQuery, EmployeeStatus, EmployeeUpdate,
        EmploymentType,
    },
};

pub async fn get_all_employees(pool: &SqlitePool, query: &EmployeeQuery) -> Result<Vec<Employee>, sqlx::Error> {
    sqlx::query_as::<_, Employee>(
        "SELECT * FROM employees
         WHERE (? IS NULL OR department_id = ?)
           AND (? IS NULL OR status = ?)
         ORDER BY employee_code",
    )
    .bind(query.department_id)
    .bind(query.department_id)
    .bind(query.status)
    .bind(query.status)
    .fetch_all(pool)
    .await
}

pub async fn get_employee(pool: &SqlitePool, id: i64) -> Result<Employee, AppError> {
    sqlx::query_as::<_, Employee>("SELECT * FROM employees WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Employee {id} not found")))
}

pub async fn ensure_exists(pool: &SqlitePool, id: i64) -> Result<(), AppError> {
    let found = sqlx::query_scalar::<_, i64>("SELECT id FROM employees WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    found
        .map(|_| ())
        .ok_or_else(|| AppError::NotFound(format!("Employee {id} not found")))
}

pub async fn active_employee_ids(pool: &SqlitePool) -> Result<Vec<i64>, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        "SELECT id FROM employees WHERE status != 'Exited' ORDER BY id",
    )
    .fetch_all(pool)
    .await
}

pub async fn create_employee<'e, E>(executor: E, input: &EmployeeInput) -> Result<Employee, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let now = Utc::now();
    let employee = sqlx::query_as::<_, Employee>(
        "INSERT INTO employees (employee_code, first_name, last_name, email, phone, department_id,
            designation, shift_id, manager_id, date_of_joining, employment_type, status, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING *",
    )
    .bind(input.employee_code.trim())
    .bind(input.first_name.trim())
    .bind(input.last_name.trim())
    .bind(input.email.to_lowercase())
    .bind(&input.phone)
    .bind(input.department_id)
    .bind(&input.designation)
    .bind(input.shift_id)
    .bind(input.manager_id)
    .bind(input.date_of_joining)
    .bind(input.employment_type.unwrap_or(EmploymentType::FullTime))
    .bind(EmployeeStatus::Active)
    .bind(now)
    .bind(now)
    .fetch_one(executor)
    .await
    .map_err(|e| match AppError::from(e) {
        AppError::Conflict(_) => AppError::Conflict(
            "An employee with this code or email already exists, or a referenced department/shift/manager is missing"
                .to_owned(),
        ),
        other => other,
    })?;
    log::info!("Employee created: {} ({})", employee.employee_code, employee.id);
    Ok(employee)
}

pub async fn update_employee(pool: &SqlitePool, id: i64, update: &EmployeeUpdate) -> Result<Employee, AppError> {
    let employee = sqlx::query_as::<_, Employee>(
        "UPDATE employees SET
            first_name = COALESCE(?, first_name),
            last_name = COALESCE(?, last_name),
            email = COALESCE(?, email),
            phone = COALESCE(?, phone),
            department_id = COALESCE(?, department_id),
            designation = COALESCE(?, designation),
            shift_id = COALESCE(?, shift_id),
            manager_id = COALESCE(?, manager_id),
            employment_type = COALESCE(?, employment_type),
            status = COALESCE(?, status),
            updated_at = ?
         WHERE id = ? RETURNING *",
    )
    .bind(&update.first_name)
    .bind(&update.last_name)
    .bind(update.email.as_ref().map(|e| e.to_lowercase()))
    .bind(&update.phone)
    .bind(update.department_id)
    .bind(&update.designation)
    .bind(update.shift_id)
    .bind(update.manager_id)
    .bind(update.employment_type)
    .bind(update.status)
    .bind(Utc::now())
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Employee {id} not found")))?;
    log::info!("Employee updated: {}", employee.employee_code);
    Ok(employee)
}

pub async fn set_status<'e, E>(executor: E, id: i64, status: EmployeeStatus) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query("UPDATE employees SET status = ?, updated_at = ? WHERE id = ?")
        .bind(status)
        .bind(Utc::now())
        .bind(id)
        .execute(executor)
        .await?;
    Ok(())
}

pub async fn delete_employee(pool: &SqlitePool, id: i64) -> Result<(), AppError> {
    let result = sqlx::query("DELETE FROM employees WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("Employee {id} not found")));
    }
    log::info!("Employee with id {} deleted", id);
    Ok(())
}

pub async fn get_documents(pool: &SqlitePool, employee_id: i64) -> Result<Vec<EmployeeDocument>, sqlx::Error> {
    sqlx::query_as::<_, EmployeeDocument>(
        "SELECT * FROM employee_documents WHERE employee_id = ? ORDER BY uploaded_at DESC",
    )
    .bind(employee_id)
    .fetch_all(pool)
    .await
}

pub async fn get_document(pool: &SqlitePool, employee_id: i64, id: i64) -> Result<EmployeeDocument, AppError> {
    sqlx::query_as::<_, EmployeeDocument>(
        "SELECT * FROM employee_documents WHERE id = ? AND employee_id = ?",
    )
    .bind(id)
    .bind(employee_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Document not found".to_owned()))
}

pub async fn create_document(
    pool: &SqlitePool,
    employee_id: i64,
    doc_type: &str,
    file_name: &str,
    stored_path: &str,
    size_bytes: i64,
) -> Result<EmployeeDocument, AppError> {
    let document = sqlx::query_as::<_, EmployeeDocument>(
        "INSERT INTO employee_documents (employee_id, doc_type, file_name, stored_path, size_bytes, uploaded_at)
         VALUES (?, ?, ?, ?, ?, ?) RETURNING *",
    )
    .bind(employee_id)
    .bind(doc_type)
    .bind(file_name)
    .bind(stored_path)
    .bind(size_bytes)
    .bind(Utc::now())
    .fetch_one(pool)
    .await?;
    Ok(document)
}

pub async fn delete_document(pool: &SqlitePool, id: i64) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM employee_documents WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}
