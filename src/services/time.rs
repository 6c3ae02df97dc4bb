use std::sync::Arc;

use serde_json::json;

use crate::models::ServiceSpec;
use crate::registry::{HandlerError, ServiceRegistry, ServiceRequest};

pub async fn register(registry: &ServiceRegistry) -> anyhow::Result<()> {
    registry
        .register(
            "time",
            Arc::new(|req| Box::pin(handle(req))),
            ServiceSpec {
                description: "Returns the current server time".to_string(),
                allow_anonymous: true,
                rate_limit: 60,
                quota_cost: 1,
                ..ServiceSpec::default()
            },
        )
        .await
}

async fn handle(_req: ServiceRequest) -> Result<serde_json::Value, HandlerError> {
    let now = chrono::Utc::now();

    Ok(json!({
        "timestamp": now.timestamp(),
        "iso8601": now.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        "date": now.format("%Y-%m-%d").to_string(),
        "time": now.format("%H:%M:%S").to_string(),
        "timezone": "UTC",
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reports_all_time_fields() {
        let result = handle(ServiceRequest {
            body: json!({}),
            principal: None,
        })
        .await
        .unwrap();

        assert!(result["timestamp"].as_i64().unwrap() > 0);
        assert!(result["iso8601"].as_str().unwrap().ends_with('Z'));
        assert_eq!(result["timezone"], "UTC");
        assert_eq!(result["date"].as_str().unwrap().len(), 10);
        assert_eq!(result["time"].as_str().unwrap().len(), 8);
    }
}
