//! Operator authentication endpoints: login, logout, profile and
//! password self-service.

use axum::{extract::State, http::request::Parts, Json};
use std::sync::Arc;

use crate::auth::crypto::{hash_password, verify_password};
use crate::context::AppContext;
use crate::error::{AppError, AppResult};
use crate::models::{
    ApiResponse, ChangePasswordRequest, LoginRequest, LoginResponse, UpdateProfileRequest,
    UserInfo,
};
use crate::store::{Store as _, StoreError, UserRepository as _};

use super::extractors::{bearer_token, RequireToken};

/// POST /auth/login
///
/// Exchanges (username, password) for a bearer token. Unknown user,
/// wrong password and disabled account all answer with the same
/// invalid-credentials envelope.
pub async fn login(
    State(ctx): State<Arc<AppContext>>,
    Json(request): Json<LoginRequest>,
) -> AppResult<Json<ApiResponse<LoginResponse>>> {
    if request.username.is_empty() || request.password.is_empty() {
        return Err(AppError::invalid_params("username and password are required"));
    }

    let user = match ctx.store.users().get_by_username(&request.username).await {
        Ok(user) => user,
        Err(StoreError::NotFound) => return Err(AppError::InvalidCredentials),
        Err(other) => return Err(other.into()),
    };

    if !user.is_active() {
        return Err(AppError::InvalidCredentials);
    }

    if !verify_password(&request.password, &user.password) {
        return Err(AppError::InvalidCredentials);
    }

    let grant = ctx.auth.tokens.issue(&user)?;

    tracing::info!(user_id = user.id, username = %user.username, "operator logged in");

    Ok(Json(ApiResponse::ok(LoginResponse {
        access_token: grant.access_token,
        expires_in: grant.expires_in,
        token_type: "Bearer".to_string(),
        user: user.to_info(),
    })))
}

/// POST /auth/logout
///
/// Revokes the presented token for its remaining lifetime.
pub async fn logout(
    State(ctx): State<Arc<AppContext>>,
    parts: Parts,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let token = bearer_token(&parts)
        .ok_or_else(|| AppError::unauthorized("missing bearer token"))?;

    // Verification first: logout is a token-authenticated operation.
    let claims = ctx.auth.tokens.verify(&token).await?;
    ctx.auth.tokens.revoke(&token).await;

    tracing::info!(user_id = claims.user_id, "operator logged out");

    Ok(Json(ApiResponse::ok(
        serde_json::json!({ "message": "logged out" }),
    )))
}

/// GET /auth/profile
pub async fn profile(
    State(ctx): State<Arc<AppContext>>,
    RequireToken(claims): RequireToken,
) -> AppResult<Json<ApiResponse<UserInfo>>> {
    let user = ctx.store.users().get_by_id(claims.user_id).await?;
    Ok(Json(ApiResponse::ok(user.to_info())))
}

/// POST /auth/profile/update
pub async fn update_profile(
    State(ctx): State<Arc<AppContext>>,
    RequireToken(claims): RequireToken,
    Json(request): Json<UpdateProfileRequest>,
) -> AppResult<Json<ApiResponse<UserInfo>>> {
    let mut user = ctx.store.users().get_by_id(claims.user_id).await?;

    if !request.email.is_empty() && request.email != user.email {
        ensure_email_free(&ctx, &request.email, user.id).await?;
        user.email = request.email;
    }

    ctx.store.users().update(&user).await?;
    Ok(Json(ApiResponse::ok(user.to_info())))
}

/// POST /auth/password/change
pub async fn change_password(
    State(ctx): State<Arc<AppContext>>,
    RequireToken(claims): RequireToken,
    Json(request): Json<ChangePasswordRequest>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    if request.new_password.len() < 6 {
        return Err(AppError::invalid_params(
            "new password must be at least 6 characters",
        ));
    }

    let mut user = ctx.store.users().get_by_id(claims.user_id).await?;

    if !verify_password(&request.current_password, &user.password) {
        return Err(AppError::invalid_params("current password is incorrect"));
    }

    if request.current_password == request.new_password {
        return Err(AppError::invalid_params(
            "new password must differ from the current one",
        ));
    }

    user.password = hash_password(&request.new_password)
        .map_err(|e| AppError::internal(format!("password hashing failed: {e}")))?;

    ctx.store.users().update(&user).await?;

    tracing::info!(user_id = user.id, "password changed");

    Ok(Json(ApiResponse::ok(
        serde_json::json!({ "message": "password changed" }),
    )))
}

pub(super) async fn ensure_email_free(
    ctx: &AppContext,
    email: &str,
    own_id: i64,
) -> Result<(), AppError> {
    match ctx.store.users().get_by_email(email).await {
        Ok(existing) if existing.id != own_id => {
            Err(AppError::Duplicate("email is already in use".to_string()))
        }
        Ok(_) => Ok(()),
        Err(StoreError::NotFound) => Ok(()),
        Err(other) => Err(other.into()),
    }
}
