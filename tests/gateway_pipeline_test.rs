//! End-to-end tests for the service invocation pipeline.

mod test_utils;

use std::sync::Arc;

use axum::http::StatusCode;
use serde_json::json;

use apigate::models::{ServiceQuota, ServiceSpec, WINDOW_DAILY};
use apigate::registry::HandlerError;
use apigate::store::{
    AccessLogRepository as _, QuotaRepository as _, ServiceRepository as _, Store as _,
};

use test_utils::{settle_accounting, spawn_app};

#[tokio::test]
async fn authenticated_echo_invocation_succeeds_and_is_logged() {
    let app = spawn_app().await;
    let token = app.admin_token().await;

    let (status, body) = app
        .post(
            "/api/v1/provider/echo/execute",
            Some(&token),
            json!({ "message": "Hello" }),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["code"], 0);
    assert_eq!(body["data"]["message"], "Hello");
    assert!(body["data"]["timestamp"].as_i64().unwrap() > 0);

    settle_accounting().await;

    let logs = app
        .context
        .store
        .access_logs()
        .get_by_user_id(1, 0, 10)
        .await
        .unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].service_name, "echo");
    assert_eq!(logs[0].cost, 1);
    assert_eq!(logs[0].status, 200);
    assert_eq!(logs[0].endpoint, "/api/v1/provider/echo/execute");
}

#[tokio::test]
async fn anonymous_public_invocation_is_allowed() {
    let app = spawn_app().await;

    let (status, body) = app
        .post("/api/v1/provider/echo/public", None, json!({ "message": "hi" }))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["code"], 0);
    assert_eq!(body["data"]["message"], "hi");
}

#[tokio::test]
async fn execute_without_credentials_is_unauthorized() {
    let app = spawn_app().await;

    let (status, body) = app
        .post("/api/v1/provider/echo/execute", None, json!({ "message": "x" }))
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], 1002);
}

#[tokio::test]
async fn unknown_service_is_not_found() {
    let app = spawn_app().await;

    let (status, body) = app
        .post("/api/v1/provider/nope/public", None, json!({}))
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], 1004);
}

#[tokio::test]
async fn handler_fault_maps_to_invalid_parameters() {
    let app = spawn_app().await;
    let token = app.admin_token().await;

    // echo requires a message field.
    let (status, body) = app
        .post("/api/v1/provider/echo/execute", Some(&token), json!({}))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 1001);

    settle_accounting().await;

    // The failed invocation is still accounted.
    let logs = app
        .context
        .store
        .access_logs()
        .get_by_user_id(1, 0, 10)
        .await
        .unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].status, 400);
}

#[tokio::test]
async fn quota_exhaustion_denies_the_fourth_call() {
    let app = spawn_app().await;
    let token = app.admin_token().await;

    // Pre-provision a tight daily quota for the admin on echo.
    let mut quota = ServiceQuota {
        id: 0,
        user_id: 1,
        service_name: "echo".to_string(),
        time_window: WINDOW_DAILY.to_string(),
        usage: 0,
        limit_value: 3,
        reset_time: chrono::Utc::now() + chrono::Duration::hours(24),
        created_at: chrono::Utc::now(),
        updated_at: chrono::Utc::now(),
    };
    app.context.store.quotas().create(&mut quota).await.unwrap();

    for i in 0..3 {
        let (status, body) = app
            .post(
                "/api/v1/provider/echo/execute",
                Some(&token),
                json!({ "message": format!("call {i}") }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "call {i} should pass: {body}");
        // The increment is asynchronous; let it land before the next
        // admission check reads the counter.
        settle_accounting().await;
    }

    let (status, body) = app
        .post(
            "/api/v1/provider/echo/execute",
            Some(&token),
            json!({ "message": "one too many" }),
        )
        .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], 1011);

    let quota = app
        .context
        .store
        .quotas()
        .get(1, "echo", WINDOW_DAILY)
        .await
        .unwrap();
    assert_eq!(quota.usage, 3);
}

#[tokio::test]
async fn rate_limit_trips_on_the_third_call_within_a_window() {
    let app = spawn_app().await;

    // A dedicated service with a 2/min window.
    app.context
        .registry
        .register(
            "burst",
            Arc::new(|_req| Box::pin(async { Ok(json!({ "ok": true })) })),
            ServiceSpec {
                description: "test service".to_string(),
                allow_anonymous: true,
                rate_limit: 2,
                quota_cost: 0,
                ..ServiceSpec::default()
            },
        )
        .await
        .unwrap();

    let (s1, _) = app.post("/api/v1/provider/burst/public", None, json!({})).await;
    let (s2, _) = app.post("/api/v1/provider/burst/public", None, json!({})).await;
    let (s3, body) = app.post("/api/v1/provider/burst/public", None, json!({})).await;

    assert_eq!(s1, StatusCode::OK);
    assert_eq!(s2, StatusCode::OK);
    assert_eq!(s3, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["code"], 1010);
}

#[tokio::test]
async fn disabled_service_is_rejected_with_its_own_code() {
    let app = spawn_app().await;

    // Disable echo in the store; a fresh app against the same store
    // adopts the stored policy at registration time.
    let mut definition = app
        .context
        .store
        .services()
        .get_by_name("echo")
        .await
        .unwrap();
    definition.status = 0;
    app.context.store.services().update(&definition).await.unwrap();

    let second = apigate::build_app(apigate::config::Config::default(), app.context.store.clone())
        .await
        .unwrap();

    let request = axum::http::Request::builder()
        .method("POST")
        .uri("/api/v1/provider/echo/public")
        .header("Content-Type", "application/json")
        .body(axum::body::Body::from(json!({ "message": "x" }).to_string()))
        .unwrap();

    let response = tower::ServiceExt::oneshot(second.router, request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let bytes = http_body_util::BodyExt::collect(response.into_body())
        .await
        .unwrap()
        .to_bytes();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["code"], 1012);
}

#[tokio::test]
async fn machine_key_authenticates_an_invocation() {
    let app = spawn_app().await;
    let token = app.admin_token().await;

    let (status, body) = app
        .post(
            "/api/v1/dashboard/apikeys/generate",
            Some(&token),
            json!({ "key_name": "ci" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let secret = body["data"]["api_key"].as_str().unwrap().to_string();
    assert_eq!(secret.len(), 32);

    // Via X-API-Key header.
    let (status, body) = app
        .request(
            "POST",
            "/api/v1/provider/echo/execute",
            None,
            Some(&secret),
            Some(json!({ "message": "from machine" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["message"], "from machine");

    // Via query parameter.
    let (status, _) = app
        .post(
            &format!("/api/v1/provider/echo/execute?api_key={secret}"),
            None,
            json!({ "message": "again" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    // Via Authorization: Bearer fall-through.
    let (status, _) = app
        .post(
            "/api/v1/provider/echo/execute",
            Some(&secret),
            json!({ "message": "bearer form" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    settle_accounting().await;

    // Machine-key invocations carry the key id in the access log.
    let logs = app
        .context
        .store
        .access_logs()
        .get_by_user_id(1, 0, 10)
        .await
        .unwrap();
    assert_eq!(logs.len(), 3);
    assert!(logs.iter().all(|l| l.api_key_id > 0));
}

#[tokio::test]
async fn anonymous_allowed_with_valid_token_still_populates_principal() {
    let app = spawn_app().await;
    let token = app.admin_token().await;

    let (status, _) = app
        .post(
            "/api/v1/provider/echo/public",
            Some(&token),
            json!({ "message": "identified" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    settle_accounting().await;

    // Identified call on the public endpoint: logged under the user
    // and charged against its quota.
    let logs = app
        .context
        .store
        .access_logs()
        .get_by_user_id(1, 0, 10)
        .await
        .unwrap();
    assert_eq!(logs.len(), 1);

    let quota = app
        .context
        .store
        .quotas()
        .get(1, "echo", WINDOW_DAILY)
        .await
        .unwrap();
    assert_eq!(quota.usage, 1);
}

#[tokio::test]
async fn catalog_endpoints_expose_enabled_services() {
    let app = spawn_app().await;

    let (status, body) = app.get("/api/v1/provider/services", None).await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["service_name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["echo", "time"]);

    let (status, body) = app.get("/api/v1/provider/echo/info", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["service_name"], "echo");
    assert_eq!(body["data"]["rate_limit"], 60);
    assert_eq!(body["data"]["quota_cost"], 1);

    let (status, body) = app.get("/api/v1/provider/status", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["service_count"], 2);
}

#[tokio::test]
async fn registering_a_duplicate_name_fails() {
    let app = spawn_app().await;

    let result = app
        .context
        .registry
        .register(
            "echo",
            Arc::new(|_req| {
                Box::pin(async { Err::<serde_json::Value, _>(HandlerError::new("unreachable")) })
            }),
            ServiceSpec::default(),
        )
        .await;

    assert!(result.is_err());
    assert_eq!(app.context.registry.count().await, 2);
}
