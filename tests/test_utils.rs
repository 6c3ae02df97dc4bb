//! Shared helpers for the integration tests: an in-memory gateway
//! driven through `tower::ServiceExt::oneshot`.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use apigate::config::Config;
use apigate::context::AppContext;
use apigate::store::sqlite::SqliteStore;
use apigate::store::DynStore;

pub struct TestApp {
    pub router: Router,
    pub context: Arc<AppContext>,
    pub admin_password: String,
}

pub async fn spawn_app() -> TestApp {
    let sqlite = SqliteStore::open_in_memory()
        .await
        .expect("failed to open in-memory store");
    sqlite.migrate().await.expect("failed to migrate");
    let store: DynStore = Arc::new(sqlite);

    let app = apigate::build_app(Config::default(), store)
        .await
        .expect("failed to build app");

    TestApp {
        router: app.router,
        context: app.context,
        admin_password: app
            .admin_password
            .expect("fresh store must provision an admin"),
    }
}

impl TestApp {
    /// Sends one request and returns (status, parsed envelope).
    pub async fn request(
        &self,
        method: &str,
        uri: &str,
        bearer: Option<&str>,
        api_key: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(token) = bearer {
            builder = builder.header("Authorization", format!("Bearer {token}"));
        }
        if let Some(key) = api_key {
            builder = builder.header("X-API-Key", key);
        }

        let request = match body {
            Some(json) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("request failed");

        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value: Value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("response is not JSON")
        };

        (status, value)
    }

    pub async fn get(&self, uri: &str, bearer: Option<&str>) -> (StatusCode, Value) {
        self.request("GET", uri, bearer, None, None).await
    }

    pub async fn post(
        &self,
        uri: &str,
        bearer: Option<&str>,
        body: Value,
    ) -> (StatusCode, Value) {
        self.request("POST", uri, bearer, None, Some(body)).await
    }

    pub async fn login(&self, username: &str, password: &str) -> (StatusCode, Value) {
        self.post(
            "/api/v1/auth/login",
            None,
            serde_json::json!({ "username": username, "password": password }),
        )
        .await
    }

    /// Logs in as the provisioned admin and returns the bearer token.
    pub async fn admin_token(&self) -> String {
        let (status, body) = self.login("admin", &self.admin_password).await;
        assert_eq!(status, StatusCode::OK, "admin login failed: {body}");
        body["data"]["access_token"]
            .as_str()
            .expect("login response carries a token")
            .to_string()
    }
}

/// Accounting is fire-and-forget; give its task a moment to land.
pub async fn settle_accounting() {
    tokio::time::sleep(std::time::Duration::from_millis(150)).await;
}
