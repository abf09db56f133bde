//! Liveness endpoints

use axum::{routing::get, Json, Router};
use serde::Serialize;

/// GET /test response
#[derive(Serialize)]
pub struct TestResponse {
    pub message: &'static str,
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// GET /test
async fn test() -> Json<TestResponse> {
    Json(TestResponse {
        message: "API is working",
    })
}

/// GET /health
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Health routes
pub fn router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new()
        .route("/test", get(test))
        .route("/health", get(health))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::routes::test_support::{app, send};
    use axum::http::StatusCode;

    #[tokio::test]
    async fn health_returns_ok() {
        let Json(body) = health().await;
        assert_eq!(body.status, "ok");
    }

    #[tokio::test]
    async fn test_route_reports_api_working() {
        let (router, _) = app();
        let (status, body) = send(router, "GET", "/test", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!({"message": "API is working"}));
    }
}
