//! One-to-many employee detail tables (bank details, education, ...).
//!
//! Every table has `id`, `employee_id` and a fixed list of value columns, so
//! the queries are shared and each record type only names its columns and
//! binds its input in the same order.

use serde::{de::DeserializeOwned, Serialize};
use sqlx::{
    query::QueryAs,
    sqlite::{SqliteArguments, SqliteRow},
    FromRow, Sqlite, SqlitePool,
};
use validator::Validate;

use crate::{
    errors::AppError,
    structs::employee::{
        BankDetail, BankDetailInput, Certification, CertificationInput, Education, EducationInput,
        Experience, ExperienceInput, FamilyMember, FamilyMemberInput, MedicalRecord,
        MedicalRecordInput, Skill, SkillInput,
    },
};

pub type RecordQuery<'q, T> = QueryAs<'q, Sqlite, T, SqliteArguments<'q>>;

pub trait Satellite: for<'r> FromRow<'r, SqliteRow> + Serialize + Send + Unpin + 'static {
    const TABLE: &'static str;
    /// Audit entity name and URL segment.
    const ENTITY: &'static str;
    const COLUMNS: &'static [&'static str];

    type Input: DeserializeOwned + Validate + Send + 'static;

    fn bind_input<'q>(input: Self::Input, query: RecordQuery<'q, Self>) -> RecordQuery<'q, Self>
    where
        Self: Sized;

    fn validate_input(_input: &Self::Input) -> Result<(), AppError> {
        Ok(())
    }
}

fn insert_sql<T: Satellite>() -> String {
    let placeholders = vec!["?"; T::COLUMNS.len() + 1].join(", ");
    format!(
        "INSERT INTO {} (employee_id, {}) VALUES ({}) RETURNING *",
        T::TABLE,
        T::COLUMNS.join(", "),
        placeholders
    )
}

fn update_sql<T: Satellite>() -> String {
    let assignments = T::COLUMNS
        .iter()
        .map(|column| format!("{column} = ?"))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "UPDATE {} SET {} WHERE id = ? AND employee_id = ? RETURNING *",
        T::TABLE,
        assignments
    )
}

fn not_found<T: Satellite>() -> AppError {
    AppError::NotFound(format!("{} record not found", T::ENTITY))
}

pub async fn list<T: Satellite>(pool: &SqlitePool, employee_id: i64) -> Result<Vec<T>, sqlx::Error> {
    let sql = format!("SELECT * FROM {} WHERE employee_id = ? ORDER BY id", T::TABLE);
    sqlx::query_as::<_, T>(&sql)
        .bind(employee_id)
        .fetch_all(pool)
        .await
}

pub async fn get<T: Satellite>(pool: &SqlitePool, employee_id: i64, id: i64) -> Result<T, AppError> {
    let sql = format!("SELECT * FROM {} WHERE id = ? AND employee_id = ?", T::TABLE);
    sqlx::query_as::<_, T>(&sql)
        .bind(id)
        .bind(employee_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(not_found::<T>)
}

pub async fn create<T: Satellite>(pool: &SqlitePool, employee_id: i64, input: T::Input) -> Result<T, AppError> {
    let sql = insert_sql::<T>();
    let query = sqlx::query_as::<_, T>(&sql).bind(employee_id);
    let record = T::bind_input(input, query).fetch_one(pool).await?;
    log::info!("{} record created for employee {}", T::ENTITY, employee_id);
    Ok(record)
}

pub async fn update<T: Satellite>(
    pool: &SqlitePool,
    employee_id: i64,
    id: i64,
    input: T::Input,
) -> Result<T, AppError> {
    let sql = update_sql::<T>();
    let query = sqlx::query_as::<_, T>(&sql);
    T::bind_input(input, query)
        .bind(id)
        .bind(employee_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(not_found::<T>)
}

pub async fn delete<T: Satellite>(pool: &SqlitePool, employee_id: i64, id: i64) -> Result<(), AppError> {
    let sql = format!("DELETE FROM {} WHERE id = ? AND employee_id = ?", T::TABLE);
    let result = sqlx::query(&sql)
        .bind(id)
        .bind(employee_id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(not_found::<T>());
    }
    log::info!("{} record {} deleted for employee {}", T::ENTITY, id, employee_id);
    Ok(())
}

impl Satellite for BankDetail {
    const TABLE: &'static str = "bank_details";
    const ENTITY: &'static str = "bank-details";
    const COLUMNS: &'static [&'static str] = &[
        "account_holder",
        "bank_name",
        "account_number",
        "ifsc_code",
        "branch",
        "is_primary",
    ];
    type Input = BankDetailInput;

    fn bind_input<'q>(input: BankDetailInput, query: RecordQuery<'q, Self>) -> RecordQuery<'q, Self> {
        query
            .bind(input.account_holder)
            .bind(input.bank_name)
            .bind(input.account_number)
            .bind(input.ifsc_code.to_uppercase())
            .bind(input.branch)
            .bind(input.is_primary)
    }
}

impl Satellite for Education {
    const TABLE: &'static str = "education";
    const ENTITY: &'static str = "education";
    const COLUMNS: &'static [&'static str] = &[
        "degree",
        "institution",
        "field_of_study",
        "start_year",
        "end_year",
        "grade",
    ];
    type Input = EducationInput;

    fn bind_input<'q>(input: EducationInput, query: RecordQuery<'q, Self>) -> RecordQuery<'q, Self> {
        query
            .bind(input.degree)
            .bind(input.institution)
            .bind(input.field_of_study)
            .bind(input.start_year)
            .bind(input.end_year)
            .bind(input.grade)
    }

    fn validate_input(input: &EducationInput) -> Result<(), AppError> {
        match (input.start_year, input.end_year) {
            (Some(start), Some(end)) if end < start => Err(AppError::BadRequest(
                "end_year must not be before start_year".to_owned(),
            )),
            _ => Ok(()),
        }
    }
}

impl Satellite for Experience {
    const TABLE: &'static str = "experience";
    const ENTITY: &'static str = "experience";
    const COLUMNS: &'static [&'static str] = &[
        "company",
        "designation",
        "start_date",
        "end_date",
        "responsibilities",
    ];
    type Input = ExperienceInput;

    fn bind_input<'q>(input: ExperienceInput, query: RecordQuery<'q, Self>) -> RecordQuery<'q, Self> {
        query
            .bind(input.company)
            .bind(input.designation)
            .bind(input.start_date)
            .bind(input.end_date)
            .bind(input.responsibilities)
    }

    fn validate_input(input: &ExperienceInput) -> Result<(), AppError> {
        match input.end_date {
            Some(end) if end < input.start_date => Err(AppError::BadRequest(
                "end_date must not be before start_date".to_owned(),
            )),
            _ => Ok(()),
        }
    }
}

impl Satellite for FamilyMember {
    const TABLE: &'static str = "family_members";
    const ENTITY: &'static str = "family";
    const COLUMNS: &'static [&'static str] = &[
        "name",
        "relationship",
        "date_of_birth",
        "phone",
        "is_dependent",
    ];
    type Input = FamilyMemberInput;

    fn bind_input<'q>(input: FamilyMemberInput, query: RecordQuery<'q, Self>) -> RecordQuery<'q, Self> {
        query
            .bind(input.name)
            .bind(input.relationship)
            .bind(input.date_of_birth)
            .bind(input.phone)
            .bind(input.is_dependent)
    }
}

impl Satellite for MedicalRecord {
    const TABLE: &'static str = "medical_records";
    const ENTITY: &'static str = "medical";
    const COLUMNS: &'static [&'static str] = &[
        "blood_group",
        "allergies",
        "conditions",
        "emergency_contact",
        "emergency_phone",
    ];
    type Input = MedicalRecordInput;

    fn bind_input<'q>(input: MedicalRecordInput, query: RecordQuery<'q, Self>) -> RecordQuery<'q, Self> {
        query
            .bind(input.blood_group)
            .bind(input.allergies)
            .bind(input.conditions)
            .bind(input.emergency_contact)
            .bind(input.emergency_phone)
    }
}

impl Satellite for Skill {
    const TABLE: &'static str = "skills";
    const ENTITY: &'static str = "skills";
    const COLUMNS: &'static [&'static str] = &["name", "proficiency", "years_experience"];
    type Input = SkillInput;

    fn bind_input<'q>(input: SkillInput, query: RecordQuery<'q, Self>) -> RecordQuery<'q, Self> {
        query
            .bind(input.name)
            .bind(input.proficiency)
            .bind(input.years_experience)
    }
}

impl Satellite for Certification {
    const TABLE: &'static str = "certifications";
    const ENTITY: &'static str = "certifications";
    const COLUMNS: &'static [&'static str] = &[
        "name",
        "issuer",
        "issue_date",
        "expiry_date",
        "credential_id",
    ];
    type Input = CertificationInput;

    fn bind_input<'q>(input: CertificationInput, query: RecordQuery<'q, Self>) -> RecordQuery<'q, Self> {
        query
            .bind(input.name)
            .bind(input.issuer)
            .bind(input.issue_date)
            .bind(input.expiry_date)
            .bind(input.credential_id)
    }

    fn validate_input(input: &CertificationInput) -> Result<(), AppError> {
        match (input.issue_date, input.expiry_date) {
            (Some(issued), Some(expires)) if expires < issued => Err(AppError::BadRequest(
                "expiry_date must not be before issue_date".to_owned(),
            )),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_sql_matches_column_order() {
        assert_eq!(
            insert_sql::<Skill>(),
            "INSERT INTO skills (employee_id, name, proficiency, years_experience) VALUES (?, ?, ?, ?) RETURNING *"
        );
        assert_eq!(
            update_sql::<Skill>(),
            "UPDATE skills SET name = ?, proficiency = ?, years_experience = ? WHERE id = ? AND employee_id = ? RETURNING *"
        );
    }
}
