//! HTTP surface.
//!
//! Structure:
//! - mod.rs: router assembly, health endpoint
//! - extractors.rs: credential extractors (token / machine key)
//! - middleware.rs: request logging, CORS
//! - auth.rs: login, logout, profile, password
//! - dashboard.rs: machine keys, user admin, logs, quotas
//! - provider.rs: service catalog and the invocation pipeline

pub mod auth;
pub mod dashboard;
pub mod extractors;
pub mod middleware;
pub mod provider;

use axum::{
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::context::AppContext;
use crate::models::ApiResponse;

/// Assembles the full router; everything lives under `/api/v1`.
pub fn build_router(ctx: Arc<AppContext>) -> Router {
    let auth_routes = Router::new()
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/profile", get(auth::profile))
        .route("/profile/update", post(auth::update_profile))
        .route("/password/change", post(auth::change_password));

    let dashboard_routes = Router::new()
        .route("/apikeys/list", get(dashboard::list_api_keys))
        .route("/apikeys/generate", post(dashboard::generate_api_key))
        .route("/apikeys/update", post(dashboard::update_api_key))
        .route("/apikeys/rotate", post(dashboard::rotate_api_key))
        .route("/apikeys/delete", post(dashboard::delete_api_key))
        .route("/user/list", get(dashboard::list_users))
        .route("/user/create", post(dashboard::create_user))
        .route("/user/update/:id", post(dashboard::update_user))
        .route("/user/delete", post(dashboard::delete_user))
        .route("/user/reset-password", post(dashboard::reset_password))
        .route("/services/list", get(dashboard::list_service_definitions))
        .route("/services/update/:id", post(dashboard::update_service))
        .route("/quotas/set", post(dashboard::set_quota))
        .route("/quotas/reset", post(dashboard::reset_quota))
        .route("/logs/list", get(dashboard::list_access_logs))
        .route("/logs/stats", get(dashboard::usage_stats))
        .route("/quotas/list", get(dashboard::list_quotas));

    let provider_routes = Router::new()
        .route("/status", get(provider::status))
        .route("/services", get(provider::list_services))
        .route("/:service/info", get(provider::service_info))
        .route("/:service/execute", post(provider::execute))
        .route("/:service/public", post(provider::execute_public));

    Router::new()
        .route("/api/v1/health", get(health))
        .nest("/api/v1/auth", auth_routes)
        .nest("/api/v1/dashboard", dashboard_routes)
        .nest("/api/v1/provider", provider_routes)
        .layer(axum::middleware::from_fn(middleware::request_logging))
        .layer(middleware::cors_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

/// GET /api/v1/health
async fn health() -> Json<ApiResponse<serde_json::Value>> {
    Json(ApiResponse::ok(json!({
        "status": "ok",
        "service": "apigate",
        "version": env!("CARGO_PKG_VERSION"),
    })))
}
