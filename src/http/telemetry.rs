//! Request telemetry middleware.
//!
//! Emits exactly one record per request once everything downstream,
//! recovery included, has finished, so the logged status is the final one.
//! A request whose future is dropped because the client went away is still
//! recorded, as a `499` carrying a private error.

use std::time::Instant;

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;

use crate::http::context::{ErrorScope, RequestContext, RequestErrors};
use crate::http::recovery::CLIENT_CLOSED_REQUEST;
use crate::observability::metrics;

pub async fn request_telemetry(mut req: Request, next: Next) -> Response {
    let mut record = RequestRecord::begin(&req);
    req.extensions_mut().insert(record.errors.clone());

    let response = next.run(req).await;

    record.finish(response.status().as_u16());
    response
}

/// Pending telemetry for one request. Emitted by `finish`, or on drop when
/// the request never completed.
struct RequestRecord {
    ctx: RequestContext,
    errors: RequestErrors,
    start: Instant,
    done: bool,
}

impl RequestRecord {
    fn begin(req: &Request) -> Self {
        metrics::request_started();
        Self {
            ctx: RequestContext::capture(req),
            errors: RequestErrors::default(),
            start: Instant::now(),
            done: false,
        }
    }

    fn finish(&mut self, status: u16) {
        if std::mem::replace(&mut self.done, true) {
            return;
        }

        let ctx = &self.ctx;
        let cost = self.start.elapsed();
        tracing::info!(
            status,
            method = %ctx.method,
            path = %ctx.path,
            query = %ctx.query,
            ip = %ctx.client_ip,
            user_agent = %ctx.user_agent,
            request_id = %ctx.request_id,
            errors = %self.errors.joined(ErrorScope::Private),
            cost = cost.as_secs_f64(),
            "{}",
            ctx.path
        );
        metrics::record_request(ctx.method.as_str(), status, cost);
    }
}

impl Drop for RequestRecord {
    fn drop(&mut self) {
        if !self.done {
            self.errors.private("client closed connection");
            self.finish(CLIENT_CLOSED_REQUEST);
        }
    }
}
