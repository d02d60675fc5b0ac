use axum::{
    async_trait,
    extract::{FromRequestParts, State},
    http::{header::AUTHORIZATION, request::Parts},
    response::Response,
};

use crate::models::CallerId;
use crate::services::CallerResolver;
use crate::state::AppState;
use crate::store::Store;
use crate::utils::error::{AppError, AppResult};
use crate::utils::response::{empty_success, success};

/// Raw credential from an `Authorization: Bearer <token>` header.
#[derive(Debug, Clone)]
pub struct BearerToken(pub String);

#[async_trait]
impl<T: Send + Sync> FromRequestParts<T> for BearerToken {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &T) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .ok_or_else(|| AppError::AuthError("Missing bearer token".to_string()))?;
        let value = header
            .to_str()
            .map_err(|_| AppError::AuthError("Malformed authorization header".to_string()))?;

        match value.split_once(' ') {
            Some((scheme, token))
                if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() =>
            {
                Ok(Self(token.trim().to_string()))
            }
            _ => Err(AppError::AuthError(
                "Authorization header must use the Bearer scheme".to_string(),
            )),
        }
    }
}

/// The authenticated caller of a request.
#[derive(Debug, Clone, Copy)]
pub struct Caller(pub CallerId);

#[async_trait]
impl<S: Store> FromRequestParts<AppState<S>> for Caller {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState<S>,
    ) -> Result<Self, Self::Rejection> {
        let BearerToken(token) = BearerToken::from_request_parts(parts, state).await?;
        let caller = state.auth.resolve_caller(&token).await?;
        Ok(Self(caller))
    }
}

pub async fn refresh_session<S: Store>(
    State(state): State<AppState<S>>,
    BearerToken(token): BearerToken,
) -> AppResult<Response> {
    let issued = state.auth.refresh(&token).await?;
    Ok(success(issued, "Session refreshed"))
}

pub async fn logout<S: Store>(
    State(state): State<AppState<S>>,
    BearerToken(token): BearerToken,
) -> AppResult<Response> {
    state.auth.logout(&token).await?;
    Ok(empty_success("Logged out"))
}
