//! Bearer-token authentication for the HTTP message API

mod claims;
mod jwt;

pub use claims::Claims;
pub use jwt::JwtValidator;

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};

use crate::error::AppError;
use crate::server::AppState;

/// Authenticated caller, extracted from `Authorization: Bearer <jwt>`
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
    pub claims: Claims,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = extract_bearer(parts)
            .ok_or_else(|| AppError::Auth("Missing authentication token".to_string()))?;

        let claims = state.jwt_validator.validate(token).map_err(|e| {
            tracing::warn!(error = %e, "JWT validation failed");
            e
        })?;

        Ok(AuthUser {
            user_id: claims.sub.clone(),
            claims,
        })
    }
}

fn extract_bearer(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}
