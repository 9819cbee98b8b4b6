use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::auth::Role;

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
pub enum EmployeeStatus {
    Active,
    OnNotice,
    Exited,
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
pub enum EmploymentType {
    FullTime,
    PartTime,
    Contract,
    Intern,
}

#[derive(Deserialize, Serialize, Debug, Clone, FromRow)]
pub struct Employee {
    pub id: i64,
    pub employee_code: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub department_id: Option<i64>,
    pub designation: Option<String>,
    pub shift_id: Option<i64>,
    pub manager_id: Option<i64>,
    pub date_of_joining: NaiveDate,
    pub employment_type: EmploymentType,
    pub status: EmployeeStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Deserialize, Debug, Validate)]
pub struct EmployeeInput {
    #[validate(length(min = 1, max = 32))]
    pub employee_code: String,
    #[validate(length(min = 1, max = 80))]
    pub first_name: String,
    #[validate(length(min = 1, max = 80))]
    pub last_name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(max = 32))]
    pub phone: Option<String>,
    pub department_id: Option<i64>,
    pub designation: Option<String>,
    pub shift_id: Option<i64>,
    pub manager_id: Option<i64>,
    pub date_of_joining: NaiveDate,
    pub employment_type: Option<EmploymentType>,
}

#[derive(Deserialize, Debug, Default, Validate)]
pub struct EmployeeUpdate {
    #[validate(length(min = 1, max = 80))]
    pub first_name: Option<String>,
    #[validate(length(min = 1, max = 80))]
    pub last_name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(max = 32))]
    pub phone: Option<String>,
    pub department_id: Option<i64>,
    pub designation: Option<String>,
    pub shift_id: Option<i64>,
    pub manager_id: Option<i64>,
    pub employment_type: Option<EmploymentType>,
    pub status: Option<EmployeeStatus>,
}

#[derive(Deserialize, Debug, Default)]
pub struct EmployeeQuery {
    pub department_id: Option<i64>,
    pub status: Option<EmployeeStatus>,
}

/// Login account inside a tenant database.
#[derive(Deserialize, Serialize, Debug, Clone, FromRow)]
pub struct TenantUser {
    pub id: i64,
    pub email: String,
    #[serde(skip_serializing)]
    pub pwd_hash: String,
    pub role: Role,
    pub employee_id: Option<i64>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Deserialize, Debug, Validate)]
pub struct NewUserInput {
    #[validate(email)]
    pub email: String,
    pub password: String,
    pub role: Role,
    pub employee_id: Option<i64>,
}

/// Absent leaves a field alone, `null` clears it.
fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Deserialize, Debug, Default)]
pub struct UserUpdate {
    pub role: Option<Role>,
    #[serde(default, deserialize_with = "nullable")]
    pub employee_id: Option<Option<i64>>,
    pub is_active: Option<bool>,
}

#[derive(Deserialize, Serialize, Debug, Clone, FromRow)]
pub struct BankDetail {
    pub id: i64,
    pub employee_id: i64,
    pub account_holder: String,
    pub bank_name: String,
    pub account_number: String,
    pub ifsc_code: String,
    pub branch: Option<String>,
    pub is_primary: bool,
}

#[derive(Deserialize, Debug, Validate)]
pub struct BankDetailInput {
    #[validate(length(min = 1, max = 120))]
    pub account_holder: String,
    #[validate(length(min = 1, max = 120))]
    pub bank_name: String,
    #[validate(length(min = 6, max = 34))]
    pub account_number: String,
    #[validate(length(equal = 11))]
    pub ifsc_code: String,
    pub branch: Option<String>,
    #[serde(default)]
    pub is_primary: bool,
}

#[derive(Deserialize, Serialize, Debug, Clone, FromRow)]
pub struct Education {
    pub id: i64,
    pub employee_id: i64,
    pub degree: String,
    pub institution: String,
    pub field_of_study: Option<String>,
    pub start_year: Option<i64>,
    pub end_year: Option<i64>,
    pub grade: Option<String>,
}

#[derive(Deserialize, Debug, Validate)]
pub struct EducationInput {
    #[validate(length(min = 1, max = 120))]
    pub degree: String,
    #[validate(length(min = 1, max = 200))]
    pub institution: String,
    pub field_of_study: Option<String>,
    #[validate(range(min = 1950, max = 2100))]
    pub start_year: Option<i64>,
    #[validate(range(min = 1950, max = 2100))]
    pub end_year: Option<i64>,
    pub grade: Option<String>,
}

#[derive(Deserialize, Serialize, Debug, Clone, FromRow)]
pub struct Experience {
    pub id: i64,
    pub employee_id: i64,
    pub company: String,
    pub designation: String,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub responsibilities: Option<String>,
}

#[derive(Deserialize, Debug, Validate)]
pub struct ExperienceInput {
    #[validate(length(min = 1, max = 200))]
    pub company: String,
    #[validate(length(min = 1, max = 120))]
    pub designation: String,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub responsibilities: Option<String>,
}

#[derive(Deserialize, Serialize, Debug, Clone, FromRow)]
pub struct FamilyMember {
    pub id: i64,
    pub employee_id: i64,
    pub name: String,
    pub relationship: String,
    pub date_of_birth: Option<NaiveDate>,
    pub phone: Option<String>,
    pub is_dependent: bool,
}

#[derive(Deserialize, Debug, Validate)]
pub struct FamilyMemberInput {
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    #[validate(length(min = 1, max = 40))]
    pub relationship: String,
    pub date_of_birth: Option<NaiveDate>,
    #[validate(length(max = 32))]
    pub phone: Option<String>,
    #[serde(default)]
    pub is_dependent: bool,
}

#[derive(Deserialize, Serialize, Debug, Clone, FromRow)]
pub struct MedicalRecord {
    pub id: i64,
    pub employee_id: i64,
    pub blood_group: Option<String>,
    pub allergies: Option<String>,
    pub conditions: Option<String>,
    pub emergency_contact: Option<String>,
    pub emergency_phone: Option<String>,
}

#[derive(Deserialize, Debug, Validate)]
pub struct MedicalRecordInput {
    #[validate(length(max = 5))]
    pub blood_group: Option<String>,
    pub allergies: Option<String>,
    pub conditions: Option<String>,
    pub emergency_contact: Option<String>,
    #[validate(length(max = 32))]
    pub emergency_phone: Option<String>,
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
pub enum Proficiency {
    Beginner,
    Intermediate,
    Advanced,
    Expert,
}

#[derive(Deserialize, Serialize, Debug, Clone, FromRow)]
pub struct Skill {
    pub id: i64,
    pub employee_id: i64,
    pub name: String,
    pub proficiency: Proficiency,
    pub years_experience: Option<f64>,
}

#[derive(Deserialize, Debug, Validate)]
pub struct SkillInput {
    #[validate(length(min = 1, max = 80))]
    pub name: String,
    pub proficiency: Proficiency,
    #[validate(range(min = 0.0, max = 60.0))]
    pub years_experience: Option<f64>,
}

#[derive(Deserialize, Serialize, Debug, Clone, FromRow)]
pub struct Certification {
    pub id: i64,
    pub employee_id: i64,
    pub name: String,
    pub issuer: String,
    pub issue_date: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
    pub credential_id: Option<String>,
}

#[derive(Deserialize, Debug, Validate)]
pub struct CertificationInput {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(min = 1, max = 200))]
    pub issuer: String,
    pub issue_date: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
    pub credential_id: Option<String>,
}

#[derive(Deserialize, Serialize, Debug, Clone, FromRow)]
pub struct EmployeeDocument {
    pub id: i64,
    pub employee_id: i64,
    pub doc_type: String,
    pub file_name: String,
    #[serde(skip_serializing)]
    pub stored_path: String,
    pub size_bytes: i64,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Deserialize, Debug)]
pub struct UploadQuery {
    pub doc_type: String,
    pub file_name: String,
}
