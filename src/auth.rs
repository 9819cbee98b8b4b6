//! Bearer-token authentication.
//!
//! Tokens are HS256 JWTs. Tenant users carry their tenant name in the
//! `tenant` claim; master (super admin) tokens carry none and pick a tenant
//! per request through the `X-Tenant-ID` header.

use actix_utils::future::{ready, Ready};
use actix_web::{dev::Payload, http::header::AUTHORIZATION, web::Data, FromRequest, HttpRequest};
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::{config::Config, errors::AppError, AppState};

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum Role {
    SuperAdmin,
    Admin,
    Hr,
    Manager,
    Employee,
}

pub const ADMIN_ROLES: &[Role] = &[Role::SuperAdmin, Role::Admin];
pub const HR_ROLES: &[Role] = &[Role::SuperAdmin, Role::Admin, Role::Hr];
pub const MANAGER_ROLES: &[Role] = &[Role::SuperAdmin, Role::Admin, Role::Hr, Role::Manager];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub uid: i64,
    pub role: Role,
    pub tenant: Option<String>,
    pub employee_id: Option<i64>,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn has_role(&self, roles: &[Role]) -> bool {
        roles.contains(&self.role)
    }

    pub fn require(&self, roles: &[Role]) -> Result<(), AppError> {
        if self.has_role(roles) {
            Ok(())
        } else {
            Err(AppError::Forbidden(
                "You do not have permission to perform this action".to_owned(),
            ))
        }
    }

    /// The employee a self-service request acts on: HR may name anyone,
    /// everyone else is pinned to their own linked employee record.
    pub fn acting_employee(&self, requested: Option<i64>) -> Result<i64, AppError> {
        match (requested, self.employee_id) {
            (Some(id), _) if self.has_role(HR_ROLES) => Ok(id),
            (Some(id), Some(own)) if id == own => Ok(id),
            (Some(_), _) => Err(AppError::Forbidden(
                "You can only act on your own employee record".to_owned(),
            )),
            (None, Some(own)) => Ok(own),
            (None, None) => Err(AppError::BadRequest(
                "employee_id is required for accounts without a linked employee".to_owned(),
            )),
        }
    }

    pub fn can_access_employee(&self, employee_id: i64) -> bool {
        self.has_role(HR_ROLES) || self.employee_id == Some(employee_id)
    }
}

pub struct TokenSubject<'a> {
    pub uid: i64,
    pub email: &'a str,
    pub role: Role,
    pub tenant: Option<&'a str>,
    pub employee_id: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
    pub role: Role,
    pub tenant: Option<String>,
}

pub fn issue_token(config: &Config, subject: TokenSubject<'_>) -> Result<TokenResponse, AppError> {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: subject.email.to_owned(),
        uid: subject.uid,
        role: subject.role,
        tenant: subject.tenant.map(str::to_owned),
        employee_id: subject.employee_id,
        iat: now,
        exp: now + config.jwt_ttl_secs,
    };
    let access_token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )?;
    Ok(TokenResponse {
        access_token,
        token_type: "Bearer",
        expires_in: config.jwt_ttl_secs,
        role: claims.role,
        tenant: claims.tenant,
    })
}

pub fn decode_token(config: &Config, token: &str) -> Result<Claims, AppError> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(data.claims)
}

pub fn authenticate(req: &HttpRequest) -> Result<Claims, AppError> {
    let state = req.app_data::<Data<AppState>>().ok_or_else(|| {
        log::error!("AppState missing from application data");
        AppError::InternalServerError
    })?;
    let header = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Missing bearer token".to_owned()))?;
    let token = header
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::Unauthorized("Authorization must use the Bearer scheme".to_owned()))?;
    decode_token(&state.config, token.trim())
}

/// Any authenticated caller, master or tenant.
pub struct AuthUser(pub Claims);

impl FromRequest for AuthUser {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(authenticate(req).map(AuthUser))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(role: Role, employee_id: Option<i64>) -> Claims {
        Claims {
            sub: "someone@example.com".to_owned(),
            uid: 1,
            role,
            tenant: Some("acme".to_owned()),
            employee_id,
            iat: 0,
            exp: 0,
        }
    }

    #[test]
    fn token_round_trip_keeps_tenant_scope() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::for_tests(dir.path());
        let token = issue_token(
            &config,
            TokenSubject {
                uid: 7,
                email: "hr@acme.test",
                role: Role::Hr,
                tenant: Some("acme"),
                employee_id: Some(3),
            },
        )
        .unwrap();
        let decoded = decode_token(&config, &token.access_token).unwrap();
        assert_eq!(decoded.uid, 7);
        assert_eq!(decoded.role, Role::Hr);
        assert_eq!(decoded.tenant.as_deref(), Some("acme"));
    }

    #[test]
    fn tampered_secret_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::for_tests(dir.path());
        let token = issue_token(
            &config,
            TokenSubject {
                uid: 1,
                email: "a@b.c",
                role: Role::Admin,
                tenant: Some("acme"),
                employee_id: None,
            },
        )
        .unwrap();
        let mut other = config.clone();
        other.jwt_secret = "a-completely-different-signing-secret".to_owned();
        assert!(decode_token(&other, &token.access_token).is_err());
    }

    #[test]
    fn employees_are_pinned_to_their_own_record() {
        let employee = claims(Role::Employee, Some(5));
        assert_eq!(employee.acting_employee(None).unwrap(), 5);
        assert_eq!(employee.acting_employee(Some(5)).unwrap(), 5);
        assert!(employee.acting_employee(Some(6)).is_err());

        let hr = claims(Role::Hr, None);
        assert_eq!(hr.acting_employee(Some(6)).unwrap(), 6);
        assert!(hr.acting_employee(None).is_err());
        assert!(hr.require(ADMIN_ROLES).is_err());
    }
}
