use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use crate::auth::provider::Identity;
use crate::error::AppError;
use crate::state::AppState;

fn bearer(parts: &Parts) -> Result<Option<&str>, AppError> {
    let Some(header) = parts.headers.get(AUTHORIZATION) else {
        return Ok(None);
    };
    let auth = header
        .to_str()
        .map_err(|_| AppError::Unauthorized("Invalid Authorization header".into()))?;
    // Expect "Bearer <token>"
    auth.strip_prefix("Bearer ")
        .or_else(|| auth.strip_prefix("bearer "))
        .map(Some)
        .ok_or_else(|| AppError::Unauthorized("Invalid Authorization header".into()))
}

/// Optional viewer: anonymous when no Authorization header is sent.
///
/// Actions that need a login check this themselves so they can say which
/// action was refused.
pub struct Viewer(pub Option<Identity>);

#[async_trait]
impl FromRequestParts<AppState> for Viewer {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match bearer(parts)? {
            Some(token) => Ok(Viewer(Some(state.sessions.resolve(token).await?))),
            None => Ok(Viewer(None)),
        }
    }
}

/// Extracts and validates the access token, returning the identity.
pub struct AuthUser(pub Identity);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer(parts)?
            .ok_or_else(|| AppError::Unauthorized("Missing Authorization header".into()))?;
        Ok(AuthUser(state.sessions.resolve(token).await?))
    }
}
