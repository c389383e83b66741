//! HTTP routes served alongside the poll loop.
//!
//! ## Routes
//!
//! - `GET /health` - Pipeline liveness (JSON)
//!
//! Any other path is a 404.

mod health;

use axum::Router;
use axum::routing::get;
use killwatch_core::HealthMonitor;
use std::sync::Arc;

/// Build the health router.
pub fn router(health: Arc<HealthMonitor>) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .with_state(health)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use killwatch_core::Category;
    use std::time::{Duration, Instant};
    use tower::ServiceExt;

    async fn get(app: Router, path: &str) -> (StatusCode, Vec<u8>) {
        let response = app
            .oneshot(Request::builder().uri(path).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, body.to_vec())
    }

    #[tokio::test]
    async fn test_healthy_returns_ok() {
        let health = Arc::new(HealthMonitor::new());
        let (status, body) = get(router(health), "/health").await;

        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["details"]["poll"]["status"], "healthy");
        assert!(json["details"]["externalCall"]["age"].is_u64());
        assert!(json["details"]["delivery"].is_object());
    }

    #[test]
    fn test_stale_stage_returns_unavailable() {
        let start = Instant::now();
        let monitor = HealthMonitor::starting_at(start);
        let now = start + Duration::from_secs(90);
        monitor.touch_at(Category::Poll, now);
        monitor.touch_at(Category::ExternalCall, now);

        let (status, body) = health::respond(monitor.snapshot_at(now));

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        let json = serde_json::to_value(&body.0).unwrap();
        assert_eq!(json["status"], "unhealthy");
        assert_eq!(json["details"]["poll"]["status"], "healthy");
        assert_eq!(json["details"]["delivery"]["status"], "unhealthy");
    }

    #[tokio::test]
    async fn test_unknown_path_is_not_found() {
        let health = Arc::new(HealthMonitor::new());
        let (status, _) = get(router(health), "/status").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
