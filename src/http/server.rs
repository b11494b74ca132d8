//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Wrap the route aggregate in the middleware stack
//! - Serve accepted connections until the shutdown token fires
//!
//! Layer order, outermost first:
//! request id → telemetry → body limit → timeout → recovery → routes.

use std::net::SocketAddr;
use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::timeout::TimeoutLayer;

use crate::config::AppConfig;
use crate::http::recovery::{recover, Recovery};
use crate::http::request::{propagate_request_id_layer, set_request_id_layer};
use crate::http::telemetry::request_telemetry;
use crate::lifecycle::Shutdown;

/// HTTP server for the route aggregate.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    /// Create a new HTTP server around `routes`.
    pub fn new(routes: Router, config: &AppConfig) -> Self {
        Self {
            router: Self::build_router(routes, config),
        }
    }

    /// Apply the middleware stack to `routes`.
    #[allow(deprecated)]
    pub fn build_router(routes: Router, config: &AppConfig) -> Router {
        routes
            .layer(middleware::from_fn_with_state(
                Recovery::new(config.server.stack_traces),
                recover,
            ))
            .layer(TimeoutLayer::new(Duration::from_secs(
                config.server.request_timeout_secs,
            )))
            .layer(DefaultBodyLimit::max(config.server.max_body_size))
            .layer(middleware::from_fn(request_telemetry))
            .layer(propagate_request_id_layer())
            .layer(set_request_id_layer())
    }

    /// The fully layered router.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve on `listener` until `shutdown` fires, then wait for in-flight
    /// requests to finish.
    ///
    /// The accept loop stops as soon as the token is triggered.
    pub async fn run(self, listener: TcpListener, shutdown: Shutdown) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.wait().await })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
