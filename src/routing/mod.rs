//! Route aggregate.
//!
//! # Routes
//! - `GET /ping` → `pong`
//! - `GET /healthz` → per-resource health, 200 when all are up, 503 otherwise

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Map, Value};

use crate::resources::{Resource, ResourceSet};

type Handles = Arc<Vec<Arc<dyn Resource>>>;

/// Build the route aggregate served by the listener.
pub fn setup(resources: &ResourceSet) -> Router {
    let handles: Handles = Arc::new(resources.handles());

    Router::new()
        .route("/ping", get(ping))
        .route("/healthz", get(healthz))
        .with_state(handles)
}

async fn ping() -> &'static str {
    "pong"
}

async fn healthz(State(handles): State<Handles>) -> impl IntoResponse {
    let mut report = Map::new();
    let mut healthy = true;

    for handle in handles.iter() {
        let state = match handle.ping().await {
            Ok(()) => Value::from("up"),
            Err(e) => {
                healthy = false;
                tracing::warn!(resource = handle.name(), error = %e, "Health check failed");
                Value::from(format!("down: {e}"))
            }
        };
        report.insert(handle.name().to_string(), state);
    }

    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    let body = json!({
        "status": if healthy { "ok" } else { "degraded" },
        "resources": report,
    });
    (status, Json(body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    use crate::error::BoxError;

    struct StubResource {
        name: &'static str,
        up: bool,
    }

    #[async_trait]
    impl Resource for StubResource {
        fn name(&self) -> &str {
            self.name
        }

        async fn ping(&self) -> Result<(), BoxError> {
            if self.up {
                Ok(())
            } else {
                Err("connection refused".into())
            }
        }

        async fn close(&self) {}
    }

    async fn get_json(router: Router, uri: &str) -> (StatusCode, Value) {
        let response = router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn ping_answers_pong() {
        let response = setup(&ResourceSet::new())
            .oneshot(Request::builder().uri("/ping").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"pong");
    }

    #[tokio::test]
    async fn healthz_reports_each_resource() {
        let mut resources = ResourceSet::new();
        resources.push(Arc::new(StubResource { name: "store", up: true }));
        let (status, body) = get_json(setup(&resources), "/healthz").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["resources"]["store"], "up");

        resources.push(Arc::new(StubResource { name: "cache", up: false }));
        let (status, body) = get_json(setup(&resources), "/healthz").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["status"], "degraded");
        assert_eq!(body["resources"]["cache"], "down: connection refused");
    }
}
