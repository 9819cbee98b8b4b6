use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use sqlx::{migrate::MigrateError, Error as SqlxError};
use std::env::VarError;
use thiserror::Error;
use validator::ValidationErrors;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    DatabaseError(SqlxError),

    #[error("Migration error: {0}")]
    MigrationError(#[from] MigrateError),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Password error: {0}")]
    PasswordError(String),

    #[error("Token error: {0}")]
    TokenError(#[from] jsonwebtoken::errors::Error),

    #[error("Template error: {0}")]
    TemplateError(#[from] tera::Error),

    #[error("Mail error: {0}")]
    MailError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Internal server error")]
    InternalServerError,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Environment variable error: {0}")]
    EnvVarError(#[from] VarError),
}

impl From<SqlxError> for AppError {
    fn from(err: SqlxError) -> Self {
        match &err {
            SqlxError::RowNotFound => AppError::NotFound("Record not found".to_owned()),
            SqlxError::Database(db) if db.is_unique_violation() => {
                AppError::Conflict("Record already exists".to_owned())
            }
            SqlxError::Database(db) if db.is_foreign_key_violation() => {
                AppError::Conflict("Record is referenced by or references missing data".to_owned())
            }
            _ => AppError::DatabaseError(err),
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        let mut fields = Vec::new();
        let mut messages = Vec::new();
        for (field, errs) in errors.field_errors() {
            if field == "__all__" {
                messages.extend(errs.iter().filter_map(|e| e.message.as_ref().map(|m| m.to_string())));
            } else {
                fields.push(field.to_string());
            }
        }
        if !fields.is_empty() {
            fields.sort();
            messages.push(format!("Invalid fields: {}", fields.join(", ")));
        }
        if messages.is_empty() {
            messages.push("Invalid input".to_owned());
        }
        AppError::BadRequest(messages.join("; "))
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) | AppError::TokenError(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::DatabaseError(_)
            | AppError::MigrationError(_)
            | AppError::PasswordError(_)
            | AppError::TemplateError(_)
            | AppError::MailError(_)
            | AppError::ConfigError(_)
            | AppError::InternalServerError
            | AppError::IoError(_)
            | AppError::EnvVarError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            AppError::TokenError(_) => "Invalid or expired token".to_owned(),
            AppError::DatabaseError(_) | AppError::MigrationError(_) => {
                "Database error".to_owned()
            }
            other => other.to_string(),
        };
        HttpResponse::build(self.status_code()).json(serde_json::json!({ "error": message }))
    }
}

impl From<AppError> for std::io::Error {
    fn from(err: AppError) -> Self {
        std::io::Error::new(std::io::ErrorKind::Other, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_not_found_maps_to_404() {
        let err = AppError::from(SqlxError::RowNotFound);
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn token_errors_do_not_leak_details() {
        let err = AppError::from(jsonwebtoken::errors::Error::from(
            jsonwebtoken::errors::ErrorKind::ExpiredSignature,
        ));
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
    }
}
