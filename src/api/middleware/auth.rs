use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};

use crate::api::state::AppState;
use crate::error::AppError;
use crate::models::Creator;
use crate::services::{auth, authorization};

/// Any creator holding a valid session token
#[derive(Debug, Clone)]
pub struct CurrentCreator(pub Creator);

/// A creator listed in the configured administrator emails
#[derive(Debug, Clone)]
pub struct AdminCreator(pub Creator);

/// Extracts the token from an `Authorization: Bearer <token>` header
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;

    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }

    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentCreator {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers).ok_or(AppError::Unauthorized)?;
        let creator = auth::authenticate(state.creators.as_ref(), &state.tokens, token).await?;

        Ok(Self(creator))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AdminCreator {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let CurrentCreator(creator) = CurrentCreator::from_request_parts(parts, state).await?;

        if !authorization::is_admin(&creator, &state.settings.admin_emails) {
            tracing::warn!(creator_id = creator.id, "Non-admin attempted an admin action");
            return Err(AppError::Forbidden(
                "Administrator privileges required".to_string(),
            ));
        }

        Ok(Self(creator))
    }
}
