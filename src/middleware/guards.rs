use std::{marker::PhantomData, sync::Arc};

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};

use crate::{
    auth::{Claims, RequiredRole},
    error::AppError,
    state::AppState,
};

// Bearer token -> verified claims, cached in the request extensions.
impl FromRequestParts<Arc<AppState>> for Claims {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        if let Some(claims) = parts.extensions.get::<Claims>().cloned() {
            return Ok(claims);
        }

        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| AppError::unauthorized("Missing/invalid Authorization header"))?;

        let claims = state.auth_providers.active()?.verify(token).await?;
        parts.extensions.insert(claims.clone());
        Ok(claims)
    }
}

/// Any signed-in session, whatever its roles.
pub type AuthGuard = Claims;

pub struct AuthRoleGuard<R: RequiredRole> {
    pub claims: Claims,
    _marker: PhantomData<R>,
}

impl<R> FromRequestParts<Arc<AppState>> for AuthRoleGuard<R>
where
    R: RequiredRole,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let claims = Claims::from_request_parts(parts, state).await?;

        if !claims.has_role(R::required()) {
            tracing::debug!(user_id = %claims.sub, required = R::required().as_str(), "role check failed");
            return Err(R::rejection());
        }

        Ok(Self {
            claims,
            _marker: PhantomData,
        })
    }
}
