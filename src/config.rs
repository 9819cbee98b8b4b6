use std::{env, path::PathBuf};

use crate::errors::AppError;

const MIN_JWT_SECRET_LEN: usize = 32;

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub starttls: bool,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub data_dir: PathBuf,
    pub jwt_secret: String,
    pub jwt_ttl_secs: i64,
    pub bootstrap_admin: Option<(String, String)>,
    pub smtp: Option<SmtpConfig>,
    pub mail_from: String,
    pub max_upload_bytes: usize,
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn parsed<T: std::str::FromStr>(key: &str, default: T) -> Result<T, AppError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::ConfigError(format!("{key} has an invalid value: {raw}"))),
        Err(_) => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let jwt_secret = env::var("JWT_SECRET").map_err(|e| {
            log::error!("FATAL: JWT_SECRET environment variable not set");
            AppError::EnvVarError(e)
        })?;
        if jwt_secret.len() < MIN_JWT_SECRET_LEN {
            return Err(AppError::ConfigError(format!(
                "JWT_SECRET must be at least {MIN_JWT_SECRET_LEN} bytes"
            )));
        }

        let bootstrap_admin = match (
            env::var("BOOTSTRAP_ADMIN_EMAIL"),
            env::var("BOOTSTRAP_ADMIN_PASSWORD"),
        ) {
            (Ok(email), Ok(password)) => Some((email.to_lowercase(), password)),
            _ => None,
        };

        let smtp = match env::var("SMTP_HOST") {
            Ok(host) if !host.is_empty() => Some(SmtpConfig {
                host,
                port: parsed("SMTP_PORT", 587)?,
                username: env::var("SMTP_USERNAME").ok(),
                password: env::var("SMTP_PASSWORD").ok(),
                starttls: parsed("SMTP_STARTTLS", true)?,
            }),
            _ => None,
        };

        Ok(Config {
            bind_addr: var_or("HRM_BIND_ADDR", "0.0.0.0:8080"),
            data_dir: PathBuf::from(var_or("HRM_DATA_DIR", "data")),
            jwt_secret,
            jwt_ttl_secs: parsed("JWT_TTL_SECS", 8 * 60 * 60)?,
            bootstrap_admin,
            smtp,
            mail_from: var_or("SMTP_FROM", "no-reply@localhost"),
            max_upload_bytes: parsed("MAX_UPLOAD_BYTES", 10 * 1024 * 1024)?,
        })
    }

    #[cfg(test)]
    pub fn for_tests(data_dir: &std::path::Path) -> Self {
        Config {
            bind_addr: "127.0.0.1:0".to_owned(),
            data_dir: data_dir.to_path_buf(),
            jwt_secret: "test-secret-that-is-long-enough-for-hs256".to_owned(),
            jwt_ttl_secs: 3600,
            bootstrap_admin: Some(("root@example.com".to_owned(), "Sup3r$ecretPass".to_owned())),
            smtp: None,
            mail_from: "hr@example.com".to_owned(),
            max_upload_bytes: 1024,
        }
    }
}
