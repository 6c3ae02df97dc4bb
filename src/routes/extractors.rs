//! Request extractors for the two credential forms.
//!
//! Identity extraction order: a `Bearer` token is tried as a signed
//! token first and falls through to machine-key validation when it is
//! not one; then the `X-API-Key` header; then the `api_key` query
//! parameter. Mandatory extractors reject with `unauthorized`,
//! optional ones hand the pipeline an anonymous request.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use std::sync::Arc;

use crate::auth::Principal;
use crate::context::AppContext;
use crate::error::AppError;
use crate::models::ROLE_ADMIN;

/// Principal from either credential form; `None` when absent. The
/// pipeline decides whether absence is fatal, after service
/// resolution.
pub struct OptionalAuth(pub Option<Principal>);

/// Verified token claims; machine keys are not accepted. Used by the
/// operator-facing auth and dashboard surfaces.
pub struct RequireToken(pub crate::auth::Claims);

/// Token claims for an operator holding the admin role.
pub struct RequireAdmin(pub crate::auth::Claims);

#[async_trait]
impl FromRequestParts<Arc<AppContext>> for OptionalAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppContext>,
    ) -> Result<Self, Self::Rejection> {
        Ok(OptionalAuth(extract_principal(state, parts).await))
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppContext>> for RequireToken {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppContext>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .ok_or_else(|| AppError::unauthorized("missing bearer token"))?;

        let claims = state.auth.tokens.verify(&token).await?;
        Ok(RequireToken(claims))
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppContext>> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppContext>,
    ) -> Result<Self, Self::Rejection> {
        let RequireToken(claims) = RequireToken::from_request_parts(parts, state).await?;

        if claims.role != ROLE_ADMIN {
            return Err(AppError::Forbidden("admin role required".to_string()));
        }

        Ok(RequireAdmin(claims))
    }
}

/// Unified identity extraction over both credential forms. Silent on
/// failure: the caller decides whether absence is fatal.
pub async fn extract_principal(ctx: &AppContext, parts: &Parts) -> Option<Principal> {
    if let Some(bearer) = bearer_token(parts) {
        if let Ok(claims) = ctx.auth.tokens.verify(&bearer).await {
            return Some(Principal::Operator(claims));
        }

        // Not a signed token; a machine key may travel in the same
        // header.
        if let Ok(key) = ctx.auth.api_keys.validate(&bearer).await {
            return Some(Principal::MachineKey {
                key_id: key.id,
                user_id: key.user_id,
            });
        }
    }

    if let Some(presented) = api_key_from_parts(parts) {
        if let Ok(key) = ctx.auth.api_keys.validate(&presented).await {
            return Some(Principal::MachineKey {
                key_id: key.id,
                user_id: key.user_id,
            });
        }
    }

    None
}

/// Raw token from `Authorization: Bearer <x>`, if present.
pub fn bearer_token(parts: &Parts) -> Option<String> {
    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .filter(|v| !v.is_empty())
        .map(|v| v.to_string())
}

/// Machine key from the `X-API-Key` header or `api_key` query
/// parameter; empty strings count as absent.
fn api_key_from_parts(parts: &Parts) -> Option<String> {
    if let Some(key) = parts
        .headers
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
    {
        return Some(key.to_string());
    }

    parts.uri.query().and_then(|query| {
        query.split('&').find_map(|pair| {
            pair.strip_prefix("api_key=")
                .filter(|v| !v.is_empty())
                .map(|v| v.to_string())
        })
    })
}
