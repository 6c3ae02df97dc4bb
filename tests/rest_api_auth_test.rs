//! Tests for the operator authentication surface.

mod test_utils;

use axum::http::StatusCode;
use serde_json::json;

use test_utils::spawn_app;

#[tokio::test]
async fn login_returns_a_usable_token() {
    let app = spawn_app().await;

    let (status, body) = app.login("admin", &app.admin_password).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["code"], 0);
    assert_eq!(body["data"]["token_type"], "Bearer");
    assert_eq!(body["data"]["user"]["username"], "admin");
    assert_eq!(body["data"]["user"]["role"], "admin");
    assert!(body["data"]["expires_in"].as_i64().unwrap() > 0);

    let token = body["data"]["access_token"].as_str().unwrap();
    let (status, profile) = app.get("/api/v1/auth/profile", Some(token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["data"]["username"], "admin");
}

#[tokio::test]
async fn wrong_password_and_unknown_user_answer_identically() {
    let app = spawn_app().await;

    let (status_a, body_a) = app.login("admin", "wrong-password").await;
    let (status_b, body_b) = app.login("no-such-user", "wrong-password").await;

    assert_eq!(status_a, StatusCode::UNAUTHORIZED);
    assert_eq!(status_b, StatusCode::UNAUTHORIZED);
    assert_eq!(body_a["code"], 1007);
    assert_eq!(body_b["code"], body_a["code"]);
    assert_eq!(body_b["message"], body_a["message"]);
}

#[tokio::test]
async fn logout_revokes_the_token_for_its_remaining_lifetime() {
    let app = spawn_app().await;
    let token = app.admin_token().await;

    let (status, _) = app
        .post("/api/v1/auth/logout", Some(&token), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.get("/api/v1/auth/profile", Some(&token)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], 1009);

    // Revocation also blocks service invocation.
    let (status, _) = app
        .post(
            "/api/v1/provider/echo/execute",
            Some(&token),
            json!({ "message": "x" }),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn profile_email_can_be_updated() {
    let app = spawn_app().await;
    let token = app.admin_token().await;

    let (status, body) = app
        .post(
            "/api/v1/auth/profile/update",
            Some(&token),
            json!({ "email": "root@example.com" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["email"], "root@example.com");

    let (_, profile) = app.get("/api/v1/auth/profile", Some(&token)).await;
    assert_eq!(profile["data"]["email"], "root@example.com");
}

#[tokio::test]
async fn password_change_requires_the_current_password() {
    let app = spawn_app().await;
    let token = app.admin_token().await;

    let (status, body) = app
        .post(
            "/api/v1/auth/password/change",
            Some(&token),
            json!({ "current_password": "not-it", "new_password": "brand-new-pass" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 1001);

    let (status, _) = app
        .post(
            "/api/v1/auth/password/change",
            Some(&token),
            json!({
                "current_password": app.admin_password,
                "new_password": "brand-new-pass"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    // Old password no longer works, the new one does.
    let (status, _) = app.login("admin", &app.admin_password).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = app.login("admin", "brand-new-pass").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn protected_endpoints_reject_missing_and_garbage_tokens() {
    let app = spawn_app().await;

    let (status, _) = app.get("/api/v1/auth/profile", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app.get("/api/v1/auth/profile", Some("garbage")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], 1009);
}

#[tokio::test]
async fn health_needs_no_credentials() {
    let app = spawn_app().await;

    let (status, body) = app.get("/api/v1/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["code"], 0);
    assert_eq!(body["data"]["status"], "ok");
}
