use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;

use crate::models::ServiceSpec;
use crate::registry::{HandlerError, ServiceRegistry, ServiceRequest};

#[derive(Debug, Deserialize)]
struct EchoRequest {
    message: String,
}

pub async fn register(registry: &ServiceRegistry) -> anyhow::Result<()> {
    registry
        .register(
            "echo",
            Arc::new(|req| Box::pin(handle(req))),
            ServiceSpec {
                description: "Echoes the request message back with a server timestamp".to_string(),
                allow_anonymous: true,
                rate_limit: 60,
                quota_cost: 1,
                ..ServiceSpec::default()
            },
        )
        .await
}

async fn handle(req: ServiceRequest) -> Result<serde_json::Value, HandlerError> {
    let request: EchoRequest = serde_json::from_value(req.body)
        .map_err(|e| HandlerError::new(format!("invalid request body: {e}")))?;

    if request.message.is_empty() {
        return Err(HandlerError::new("message cannot be empty"));
    }

    Ok(json!({
        "message": request.message,
        "timestamp": chrono::Utc::now().timestamp(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn echoes_the_message() {
        let result = handle(ServiceRequest {
            body: json!({"message": "Hello"}),
            principal: None,
        })
        .await
        .unwrap();

        assert_eq!(result["message"], "Hello");
        assert!(result["timestamp"].as_i64().unwrap() > 0);
    }

    #[tokio::test]
    async fn missing_message_is_a_handler_error() {
        assert!(handle(ServiceRequest {
            body: json!({}),
            principal: None,
        })
        .await
        .is_err());

        assert!(handle(ServiceRequest {
            body: json!({"message": ""}),
            principal: None,
        })
        .await
        .is_err());
    }
}
