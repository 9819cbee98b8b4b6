pub mod attendance;
pub mod compliance;
pub mod employees;
pub mod leave;
pub mod master;
pub mod org;
pub mod payroll;
pub mod recruitment;
pub mod satellites;
pub mod talent;
pub mod users;

#[cfg(test)]
pub mod test_support {
    use chrono::NaiveDate;
    use sqlx::SqlitePool;
    use tempfile::TempDir;

    use crate::{
        structs::employee::{Employee, EmployeeInput},
        tenancy::{open_master, TenantRegistry},
    };

    /// Fresh migrated tenant database in a temporary directory.
    pub async fn tenant_pool() -> (TempDir, SqlitePool) {
        let dir = tempfile::tempdir().unwrap();
        let master = open_master(dir.path()).await.unwrap();
        let pool = TenantRegistry::new(master, dir.path().to_path_buf())
            .provision("tenant_test")
            .await
            .unwrap();
        (dir, pool)
    }

    pub fn employee_input(code: &str) -> EmployeeInput {
        EmployeeInput {
            employee_code: code.to_owned(),
            first_name: "Asha".to_owned(),
            last_name: code.to_owned(),
            email: format!("{}@example.com", code.to_lowercase()),
            phone: None,
            department_id: None,
            designation: Some("Engineer".to_owned()),
            shift_id: None,
            manager_id: None,
            date_of_joining: NaiveDate::from_ymd_opt(2023, 1, 2).unwrap(),
            employment_type: None,
        }
    }

    pub async fn employee(pool: &SqlitePool, code: &str) -> Employee {
        super::employees::create_employee(pool, &employee_input(code))
            .await
            .unwrap()
    }
}
