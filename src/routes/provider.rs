//! Functional-service surface: catalog endpoints and the invocation
//! pipeline.
//!
//! Pipeline stages, in order, each aborting the chain on error:
//! resolve → authenticate → rate-limit → quota-admit → handle →
//! respond → account. Accounting never blocks the response path.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, OriginalUri, Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::accounting::QuotaCharge;
use crate::auth::Principal;
use crate::context::AppContext;
use crate::error::{AppError, AppResult};
use crate::models::{
    ApiResponse, NewAccessLog, ServiceDefinition, ServiceSummary, CODE_INVALID_PARAMS,
};
use crate::registry::{RegisteredService, ServiceRequest};
use crate::utils::client_ip;

use super::extractors::OptionalAuth;

/// GET /provider/status
pub async fn status(
    State(ctx): State<Arc<AppContext>>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    Ok(Json(ApiResponse::ok(json!({
        "status": "ok",
        "service_count": ctx.registry.count().await,
        "service_names": ctx.registry.names().await,
        "timestamp": chrono::Utc::now().timestamp(),
    }))))
}

/// GET /provider/services - enabled catalog entries only.
pub async fn list_services(
    State(ctx): State<Arc<AppContext>>,
) -> AppResult<Json<ApiResponse<Vec<ServiceSummary>>>> {
    let services = ctx.registry.list().await;

    let mut summaries: Vec<ServiceSummary> = services
        .iter()
        .filter(|s| s.definition.is_enabled())
        .map(|s| ServiceSummary {
            service_name: s.definition.service_name.clone(),
            description: s.definition.description.clone(),
            allow_anonymous: s.definition.allow_anonymous,
        })
        .collect();
    summaries.sort_by(|a, b| a.service_name.cmp(&b.service_name));

    Ok(Json(ApiResponse::ok(summaries)))
}

/// GET /provider/:service/info
pub async fn service_info(
    State(ctx): State<Arc<AppContext>>,
    Path(service): Path<String>,
) -> AppResult<Json<ApiResponse<ServiceDefinition>>> {
    let registered = resolve(&ctx, &service).await?;
    Ok(Json(ApiResponse::ok(registered.definition)))
}

/// POST /provider/:service/execute - authentication is mandatory.
#[allow(clippy::too_many_arguments)]
pub async fn execute(
    State(ctx): State<Arc<AppContext>>,
    Path(service): Path<String>,
    OptionalAuth(principal): OptionalAuth,
    connect: Option<ConnectInfo<SocketAddr>>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    body: Option<Json<serde_json::Value>>,
) -> AppResult<Response> {
    let addr = client_ip(&headers, connect.map(|c| c.0.ip()));
    let body = body.map(|Json(v)| v).unwrap_or(serde_json::Value::Null);

    dispatch(
        &ctx,
        &service,
        principal,
        addr,
        uri.path().to_string(),
        body,
        true,
    )
    .await
}

/// POST /provider/:service/public - authentication is optional;
/// anonymous callers are admitted only where the definition allows
/// them.
pub async fn execute_public(
    State(ctx): State<Arc<AppContext>>,
    Path(service): Path<String>,
    OptionalAuth(principal): OptionalAuth,
    connect: Option<ConnectInfo<SocketAddr>>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    body: Option<Json<serde_json::Value>>,
) -> AppResult<Response> {
    let addr = client_ip(&headers, connect.map(|c| c.0.ip()));
    let body = body.map(|Json(v)| v).unwrap_or(serde_json::Value::Null);

    dispatch(
        &ctx,
        &service,
        principal,
        addr,
        uri.path().to_string(),
        body,
        false,
    )
    .await
}

/// Stage 1: registry lookup plus enabled check.
async fn resolve(ctx: &AppContext, name: &str) -> Result<RegisteredService, AppError> {
    let registered = ctx
        .registry
        .get(name)
        .await
        .ok_or_else(|| AppError::NotFound(format!("service {name} does not exist")))?;

    if !registered.definition.is_enabled() {
        return Err(AppError::ServiceDisabled);
    }

    Ok(registered)
}

/// Stages 2–6 after authentication has produced (or not produced) a
/// principal.
async fn dispatch(
    ctx: &AppContext,
    service_name: &str,
    principal: Option<Principal>,
    addr: String,
    endpoint: String,
    body: serde_json::Value,
    mandatory: bool,
) -> AppResult<Response> {
    let registered = resolve(ctx, service_name).await?;
    let definition = &registered.definition;

    // Stage 2: the execute surface always demands a credential; the
    // public surface tolerates anonymity where the definition does.
    if principal.is_none() && (mandatory || !definition.allow_anonymous) {
        return Err(AppError::unauthorized("authentication required"));
    }

    // Stage 3: fixed-window rate limit, keyed by principal when
    // present, source address otherwise.
    let allowed = match &principal {
        Some(p) => {
            ctx.rate_limiter
                .check_user(p.user_id(), definition.rate_limit)
                .await
        }
        None => ctx.rate_limiter.check_ip(&addr, definition.rate_limit).await,
    };
    if !allowed {
        tracing::warn!(
            service = %definition.service_name,
            key = %principal.as_ref().map(|p| p.user_id().to_string()).unwrap_or(addr),
            "rate limit exceeded"
        );
        return Err(AppError::RateLimitExceeded);
    }

    // Stage 4: quota admission, identified invocations only.
    let admitted = match &principal {
        Some(p) if definition.quota_cost > 0 => {
            ctx.quotas.admit(p.user_id(), definition).await?;
            true
        }
        _ => false,
    };

    // Stage 5: the handler itself. Handler faults are caller faults.
    let request = ServiceRequest {
        body,
        principal: principal.clone(),
    };
    let (status, envelope) = match (*registered.handler)(request).await {
        Ok(data) => (StatusCode::OK, ApiResponse::ok(data)),
        Err(err) => (
            StatusCode::BAD_REQUEST,
            ApiResponse::error(CODE_INVALID_PARAMS, err.to_string()),
        ),
    };

    // Stage 6: asynchronous accounting; the charge only exists when
    // admission ran.
    let entry = NewAccessLog {
        api_key_id: principal.as_ref().map(Principal::api_key_id).unwrap_or(0),
        user_id: principal.as_ref().map(Principal::user_id).unwrap_or(0),
        service_name: definition.service_name.clone(),
        endpoint,
        status: status.as_u16() as i64,
        cost: definition.quota_cost,
    };
    let charge = admitted.then(|| QuotaCharge {
        user_id: principal.as_ref().map(Principal::user_id).unwrap_or(0),
        service_name: definition.service_name.clone(),
        cost: definition.quota_cost,
    });
    ctx.accounting.record(entry, charge);

    Ok((status, Json(envelope)).into_response())
}
