//! Operator dashboard: machine-key management, admin user and
//! catalog management, quota administration, own access logs and
//! quota usage.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use std::sync::Arc;

use crate::auth::crypto::hash_password;
use crate::auth::permission::{
    can_access_resource, PERM_APIKEY_DELETE, PERM_APIKEY_UPDATE,
};
use crate::context::AppContext;
use crate::error::{AppError, AppResult};
use crate::models::{
    AccessLog, ApiKey, ApiResponse, CreateUserRequest, DeleteApiKeyRequest, DeleteUserRequest,
    GenerateApiKeyRequest, QuotaView, ResetPasswordRequest, ResetQuotaRequest,
    RotateApiKeyRequest, ServiceDefinition, SetQuotaRequest, UpdateApiKeyRequest,
    UpdateServiceRequest, UpdateUserRequest, UsageStats, User, UserInfo, UserListResponse,
    ROLE_ADMIN, SERVICE_STATUS_DISABLED, SERVICE_STATUS_ENABLED, SYSTEM_ADMIN_ID,
    USER_STATUS_ACTIVE, USER_STATUS_DISABLED,
};
use crate::store::{
    AccessLogRepository as _, ApiKeyRepository as _, ServiceRepository as _, Store as _,
    StoreError, UserRepository as _,
};

use super::auth::ensure_email_free;
use super::extractors::{RequireAdmin, RequireToken};

// ---------------------------------------------------------------------------
// Machine keys
// ---------------------------------------------------------------------------

/// GET /dashboard/apikeys/list - own keys, secrets decrypted.
pub async fn list_api_keys(
    State(ctx): State<Arc<AppContext>>,
    RequireToken(claims): RequireToken,
) -> AppResult<Json<ApiResponse<Vec<ApiKey>>>> {
    let keys = ctx.auth.api_keys.list_for_owner(claims.user_id).await?;
    Ok(Json(ApiResponse::ok(keys)))
}

/// POST /dashboard/apikeys/generate - the response carries the
/// cleartext secret; it is not retrievable again except via the
/// owner's list.
pub async fn generate_api_key(
    State(ctx): State<Arc<AppContext>>,
    RequireToken(claims): RequireToken,
    Json(request): Json<GenerateApiKeyRequest>,
) -> AppResult<Json<ApiResponse<ApiKey>>> {
    if request.key_name.is_empty() || request.key_name.len() > 100 {
        return Err(AppError::invalid_params(
            "key_name must be between 1 and 100 characters",
        ));
    }

    let key = ctx
        .auth
        .api_keys
        .create(claims.user_id, &request.key_name, request.expires_at)
        .await?;

    tracing::info!(user_id = claims.user_id, key_id = key.id, "api key created");

    Ok(Json(ApiResponse::ok(key)))
}

/// POST /dashboard/apikeys/update
pub async fn update_api_key(
    State(ctx): State<Arc<AppContext>>,
    RequireToken(claims): RequireToken,
    Json(request): Json<UpdateApiKeyRequest>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let key = ctx.auth.api_keys.get(request.id).await?;
    ensure_key_access(&claims, &key, PERM_APIKEY_UPDATE)?;

    ctx.auth
        .api_keys
        .update(request.id, request.key_name, request.status, request.expires_at)
        .await?;

    Ok(Json(ApiResponse::ok(
        serde_json::json!({ "message": "api key updated" }),
    )))
}

/// POST /dashboard/apikeys/rotate - replaces the secret atomically
/// and returns the new cleartext exactly once.
pub async fn rotate_api_key(
    State(ctx): State<Arc<AppContext>>,
    RequireToken(claims): RequireToken,
    Json(request): Json<RotateApiKeyRequest>,
) -> AppResult<Json<ApiResponse<ApiKey>>> {
    let key = ctx.auth.api_keys.get(request.id).await?;
    ensure_key_access(&claims, &key, PERM_APIKEY_UPDATE)?;

    let rotated = ctx.auth.api_keys.rotate(request.id).await?;

    tracing::info!(user_id = claims.user_id, key_id = rotated.id, "api key rotated");

    Ok(Json(ApiResponse::ok(rotated)))
}

/// POST /dashboard/apikeys/delete
pub async fn delete_api_key(
    State(ctx): State<Arc<AppContext>>,
    RequireToken(claims): RequireToken,
    Json(request): Json<DeleteApiKeyRequest>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let key = ctx.auth.api_keys.get(request.id).await?;
    ensure_key_access(&claims, &key, PERM_APIKEY_DELETE)?;

    ctx.auth.api_keys.delete(request.id).await?;

    Ok(Json(ApiResponse::ok(
        serde_json::json!({ "message": "api key deleted" }),
    )))
}

fn ensure_key_access(
    claims: &crate::auth::Claims,
    key: &ApiKey,
    action: &str,
) -> Result<(), AppError> {
    if !can_access_resource(&claims.role, claims.user_id, key.user_id, action) {
        return Err(AppError::Forbidden(
            "api key belongs to another operator".to_string(),
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// User management (admin)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_page_size")]
    pub page_size: i64,
}

fn default_page() -> i64 {
    1
}

fn default_page_size() -> i64 {
    20
}

impl PageQuery {
    fn clamp(&self) -> (i64, i64) {
        let page = self.page.max(1);
        let page_size = self.page_size.clamp(1, 100);
        (page, page_size)
    }
}

/// GET /dashboard/user/list
pub async fn list_users(
    State(ctx): State<Arc<AppContext>>,
    RequireAdmin(_): RequireAdmin,
    Query(query): Query<PageQuery>,
) -> AppResult<Json<ApiResponse<UserListResponse>>> {
    let (page, page_size) = query.clamp();
    let offset = (page - 1) * page_size;

    let users = ctx.store.users().list(offset, page_size).await?;
    let total = ctx.store.users().count().await?;

    Ok(Json(ApiResponse::ok(UserListResponse {
        users: users.iter().map(User::to_info).collect(),
        total,
        page,
        page_size,
    })))
}

/// POST /dashboard/user/create
pub async fn create_user(
    State(ctx): State<Arc<AppContext>>,
    RequireAdmin(_): RequireAdmin,
    Json(request): Json<CreateUserRequest>,
) -> AppResult<Json<ApiResponse<UserInfo>>> {
    if request.username.len() < 3 || request.username.len() > 50 {
        return Err(AppError::invalid_params(
            "username must be between 3 and 50 characters",
        ));
    }
    if request.password.len() < 6 {
        return Err(AppError::invalid_params(
            "password must be at least 6 characters",
        ));
    }
    if !crate::models::is_valid_role(&request.role) {
        return Err(AppError::invalid_params("unknown role"));
    }

    match ctx.store.users().get_by_username(&request.username).await {
        Ok(_) => return Err(AppError::Duplicate("username already exists".to_string())),
        Err(StoreError::NotFound) => {}
        Err(other) => return Err(other.into()),
    }
    if !request.email.is_empty() {
        ensure_email_free(&ctx, &request.email, 0).await?;
    }

    let mut user = User {
        id: 0,
        username: request.username,
        password: hash_password(&request.password)
            .map_err(|e| AppError::internal(format!("password hashing failed: {e}")))?,
        email: request.email,
        role: request.role,
        status: USER_STATUS_ACTIVE,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };

    ctx.store.users().create(&mut user).await?;

    tracing::info!(user_id = user.id, username = %user.username, "operator created");

    Ok(Json(ApiResponse::ok(user.to_info())))
}

/// POST /dashboard/user/update/:id
pub async fn update_user(
    State(ctx): State<Arc<AppContext>>,
    RequireAdmin(_): RequireAdmin,
    Path(user_id): Path<i64>,
    Json(request): Json<UpdateUserRequest>,
) -> AppResult<Json<ApiResponse<UserInfo>>> {
    let mut user = ctx.store.users().get_by_id(user_id).await?;

    if let Some(role) = &request.role {
        if !crate::models::is_valid_role(role) {
            return Err(AppError::invalid_params("unknown role"));
        }
        // The system admin keeps its role, no matter who asks.
        if user_id == SYSTEM_ADMIN_ID && role != ROLE_ADMIN {
            return Err(AppError::Forbidden(
                "the system admin cannot be demoted".to_string(),
            ));
        }
        user.role = role.clone();
    }

    if let Some(email) = &request.email {
        if !email.is_empty() && *email != user.email {
            ensure_email_free(&ctx, email, user.id).await?;
            user.email = email.clone();
        }
    }

    if let Some(status) = request.status {
        if status != USER_STATUS_ACTIVE && status != USER_STATUS_DISABLED {
            return Err(AppError::invalid_params("invalid status"));
        }
        if user_id == SYSTEM_ADMIN_ID && status == USER_STATUS_DISABLED {
            return Err(AppError::Forbidden(
                "the system admin cannot be disabled".to_string(),
            ));
        }
        user.status = status;
    }

    ctx.store.users().update(&user).await?;
    Ok(Json(ApiResponse::ok(user.to_info())))
}

/// POST /dashboard/user/delete - admins are not deletable; the
/// cascade removes the operator's keys and quota rows.
pub async fn delete_user(
    State(ctx): State<Arc<AppContext>>,
    RequireAdmin(_): RequireAdmin,
    Json(request): Json<DeleteUserRequest>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let user = ctx.store.users().get_by_id(request.user_id).await?;

    if user.is_admin() {
        return Err(AppError::Forbidden(
            "admin operators cannot be deleted".to_string(),
        ));
    }

    ctx.store.users().delete(request.user_id).await?;

    tracing::info!(user_id = request.user_id, "operator deleted");

    Ok(Json(ApiResponse::ok(
        serde_json::json!({ "message": "user deleted" }),
    )))
}

/// POST /dashboard/user/reset-password
pub async fn reset_password(
    State(ctx): State<Arc<AppContext>>,
    RequireAdmin(_): RequireAdmin,
    Json(request): Json<ResetPasswordRequest>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    if request.new_password.len() < 6 {
        return Err(AppError::invalid_params(
            "new password must be at least 6 characters",
        ));
    }

    let mut user = ctx.store.users().get_by_id(request.user_id).await?;
    user.password = hash_password(&request.new_password)
        .map_err(|e| AppError::internal(format!("password hashing failed: {e}")))?;

    ctx.store.users().update(&user).await?;

    tracing::info!(user_id = user.id, "password reset by admin");

    Ok(Json(ApiResponse::ok(
        serde_json::json!({ "message": "password reset" }),
    )))
}

// ---------------------------------------------------------------------------
// Catalog management (admin)
// ---------------------------------------------------------------------------

/// GET /dashboard/services/list - the whole catalog, disabled entries
/// included.
pub async fn list_service_definitions(
    State(ctx): State<Arc<AppContext>>,
    RequireAdmin(_): RequireAdmin,
    Query(query): Query<PageQuery>,
) -> AppResult<Json<ApiResponse<Vec<ServiceDefinition>>>> {
    let (page, page_size) = query.clamp();
    let offset = (page - 1) * page_size;

    let services = ctx.store.services().list(offset, page_size).await?;
    Ok(Json(ApiResponse::ok(services)))
}

/// POST /dashboard/services/update/:id - edits policy knobs and
/// pushes them into the live registry so the next invocation sees
/// them. The handler binding is untouched.
pub async fn update_service(
    State(ctx): State<Arc<AppContext>>,
    RequireAdmin(_): RequireAdmin,
    Path(service_id): Path<i64>,
    Json(request): Json<UpdateServiceRequest>,
) -> AppResult<Json<ApiResponse<ServiceDefinition>>> {
    let mut definition = ctx.store.services().get_by_id(service_id).await?;

    if let Some(description) = request.description {
        if !description.is_empty() {
            definition.description = description;
        }
    }
    if let Some(status) = request.status {
        if status != SERVICE_STATUS_ENABLED && status != SERVICE_STATUS_DISABLED {
            return Err(AppError::invalid_params("invalid status"));
        }
        definition.status = status;
    }
    if let Some(allow_anonymous) = request.allow_anonymous {
        definition.allow_anonymous = allow_anonymous;
    }
    if let Some(rate_limit) = request.rate_limit {
        if rate_limit < 0 {
            return Err(AppError::invalid_params("rate_limit cannot be negative"));
        }
        definition.rate_limit = rate_limit;
    }
    if let Some(quota_cost) = request.quota_cost {
        if quota_cost < 0 {
            return Err(AppError::invalid_params("quota_cost cannot be negative"));
        }
        definition.quota_cost = quota_cost;
    }
    if let Some(default_limit) = request.default_limit {
        if default_limit < -1 {
            return Err(AppError::invalid_params("default_limit must be >= -1"));
        }
        definition.default_limit = default_limit;
    }

    ctx.store.services().update(&definition).await?;
    ctx.registry.refresh(definition.clone()).await;

    tracing::info!(service = %definition.service_name, "service definition updated");

    Ok(Json(ApiResponse::ok(definition)))
}

/// POST /dashboard/quotas/set - assign a daily limit for an operator
/// on a service, creating the record when none exists yet.
pub async fn set_quota(
    State(ctx): State<Arc<AppContext>>,
    RequireAdmin(_): RequireAdmin,
    Json(request): Json<SetQuotaRequest>,
) -> AppResult<Json<ApiResponse<QuotaView>>> {
    if request.limit_value < -1 {
        return Err(AppError::invalid_params("limit_value must be >= -1"));
    }

    // Both sides of the assignment must exist.
    ctx.store.users().get_by_id(request.user_id).await?;
    ctx.store
        .services()
        .get_by_name(&request.service_name)
        .await?;

    let quota = ctx
        .quotas
        .set_limit(request.user_id, &request.service_name, request.limit_value)
        .await?;

    Ok(Json(ApiResponse::ok(quota.to_view())))
}

/// POST /dashboard/quotas/reset
pub async fn reset_quota(
    State(ctx): State<Arc<AppContext>>,
    RequireAdmin(_): RequireAdmin,
    Json(request): Json<ResetQuotaRequest>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    ctx.quotas
        .reset(request.user_id, &request.service_name)
        .await?;

    tracing::info!(
        user_id = request.user_id,
        service = %request.service_name,
        "quota usage reset"
    );

    Ok(Json(ApiResponse::ok(
        serde_json::json!({ "message": "quota reset" }),
    )))
}

// ---------------------------------------------------------------------------
// Own access logs & quotas
// ---------------------------------------------------------------------------

/// GET /dashboard/logs/list
pub async fn list_access_logs(
    State(ctx): State<Arc<AppContext>>,
    RequireToken(claims): RequireToken,
    Query(query): Query<PageQuery>,
) -> AppResult<Json<ApiResponse<Vec<AccessLog>>>> {
    let (page, page_size) = query.clamp();
    let offset = (page - 1) * page_size;

    let logs = ctx
        .store
        .access_logs()
        .get_by_user_id(claims.user_id, offset, page_size)
        .await?;

    Ok(Json(ApiResponse::ok(logs)))
}

#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    pub service_name: String,
    /// YYYY-MM-DD, inclusive.
    pub start_date: String,
    pub end_date: String,
}

/// GET /dashboard/logs/stats
pub async fn usage_stats(
    State(ctx): State<Arc<AppContext>>,
    RequireToken(claims): RequireToken,
    Query(query): Query<StatsQuery>,
) -> AppResult<Json<ApiResponse<UsageStats>>> {
    let start = parse_day_start(&query.start_date)?;
    let end = parse_day_end(&query.end_date)?;

    if end < start {
        return Err(AppError::invalid_params("end_date is before start_date"));
    }

    let stats = ctx
        .store
        .access_logs()
        .usage_stats(claims.user_id, &query.service_name, start, end)
        .await?;

    Ok(Json(ApiResponse::ok(stats)))
}

/// GET /dashboard/quotas/list
pub async fn list_quotas(
    State(ctx): State<Arc<AppContext>>,
    RequireToken(claims): RequireToken,
) -> AppResult<Json<ApiResponse<Vec<QuotaView>>>> {
    let quotas = ctx.quotas.list_for_user(claims.user_id).await?;
    Ok(Json(ApiResponse::ok(
        quotas.iter().map(|q| q.to_view()).collect(),
    )))
}

fn parse_day_start(date: &str) -> Result<DateTime<Utc>, AppError> {
    let day = NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|_| AppError::invalid_params("dates must be YYYY-MM-DD"))?;
    Ok(day.and_time(chrono::NaiveTime::MIN).and_utc())
}

fn parse_day_end(date: &str) -> Result<DateTime<Utc>, AppError> {
    // Last second of the named day; the range is inclusive.
    Ok(parse_day_start(date)? + chrono::Duration::seconds(86_399))
}
