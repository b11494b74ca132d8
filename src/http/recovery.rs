//! Panic recovery middleware.
//!
//! Contains every handler fault at this boundary:
//! - a caught panic, or an [`AppError`](crate::http::error::AppError)
//!   response carrying a [`Fault`]
//! - a client disconnect is logged, recorded on the request and answered with
//!   an empty `499` and `Connection: close`; delivery is best-effort since
//!   the peer is usually gone
//! - anything else is logged, optionally with a stack trace, and becomes a
//!   bare `500`
//!
//! A panic's stack trace is taken by a panic hook while the faulting frame
//! is still on the stack. An `AppError` trace is taken where it is caught.

use std::backtrace::Backtrace;
use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Once;

use axum::extract::{Request, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use futures_util::FutureExt;

use crate::http::context::{RequestDump, RequestErrors};
use crate::http::error::Fault;

/// nginx's "client closed request".
pub(crate) const CLIENT_CLOSED_REQUEST: u16 = 499;

thread_local! {
    static PANIC_TRACE: RefCell<Option<Backtrace>> = const { RefCell::new(None) };
}

/// Chain a hook that keeps a backtrace of the latest panic on its thread.
fn capture_panic_traces() {
    static INSTALLED: Once = Once::new();
    INSTALLED.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            let trace = Backtrace::force_capture();
            let _ = PANIC_TRACE.try_with(|slot| slot.replace(Some(trace)));
            previous(info);
        }));
    });
}

fn take_panic_trace() -> Option<Backtrace> {
    PANIC_TRACE.try_with(RefCell::take).ok().flatten()
}

/// Recovery layer settings.
#[derive(Debug, Clone, Copy, Default)]
pub struct Recovery {
    /// Attach a stack trace to non-benign fault records.
    pub stack: bool,
}

impl Recovery {
    pub fn new(stack: bool) -> Self {
        Self { stack }
    }
}

pub async fn recover(State(recovery): State<Recovery>, req: Request, next: Next) -> Response {
    let dump = RequestDump::capture(&req);
    let path = req.uri().path().to_string();
    let errors = req.extensions().get::<RequestErrors>().cloned();
    if recovery.stack {
        capture_panic_traces();
    }

    let (fault, trace) = match AssertUnwindSafe(next.run(req)).catch_unwind().await {
        Ok(mut response) => match response.extensions_mut().remove::<Fault>() {
            Some(fault) => (fault, None),
            None => return response,
        },
        Err(payload) => (Fault::from_panic(payload), take_panic_trace()),
    };

    if let Some(errors) = &errors {
        errors.private(fault.message.clone());
    }

    if fault.is_disconnect() {
        tracing::error!(
            error = %fault,
            request = %dump,
            "{}",
            path
        );
        return client_closed();
    }

    if recovery.stack {
        tracing::error!(
            error = %fault,
            origin = ?fault.origin,
            request = %dump,
            stack = %trace.unwrap_or_else(Backtrace::force_capture),
            "[Recovery from panic]"
        );
    } else {
        tracing::error!(
            error = %fault,
            origin = ?fault.origin,
            request = %dump,
            "[Recovery from panic]"
        );
    }
    StatusCode::INTERNAL_SERVER_ERROR.into_response()
}

fn client_closed() -> Response {
    let status =
        StatusCode::from_u16(CLIENT_CLOSED_REQUEST).unwrap_or(StatusCode::BAD_REQUEST);
    let mut response = status.into_response();
    response
        .headers_mut()
        .insert(header::CONNECTION, HeaderValue::from_static("close"));
    response
}
