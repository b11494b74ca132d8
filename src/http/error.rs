//! Handler errors and fault classification.
//!
//! Handlers return `Result<T, AppError>`. An `AppError` renders as a bare
//! 500 carrying a [`Fault`] extension; the recovery layer inspects that
//! extension (or a caught panic) and decides the final outcome.

use std::any::Any;
use std::error::Error as StdError;
use std::io;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::error::BoxError;

/// How a fault should be treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// The client hung up; no response can be delivered.
    Disconnect,
    /// Anything else.
    Internal,
}

/// Where a fault came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultOrigin {
    Error,
    Panic,
}

/// A classified handler fault.
#[derive(Debug, Clone)]
pub struct Fault {
    pub kind: FaultKind,
    pub origin: FaultOrigin,
    pub message: String,
}

impl Fault {
    pub fn from_error(err: &(dyn StdError + 'static)) -> Self {
        Self {
            kind: classify(err),
            origin: FaultOrigin::Error,
            message: err.to_string(),
        }
    }

    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else if let Some(e) = payload.downcast_ref::<io::Error>() {
            return Self {
                kind: classify(e),
                origin: FaultOrigin::Panic,
                message: e.to_string(),
            };
        } else {
            "non-string panic payload".to_string()
        };

        Self {
            kind: if is_disconnect_message(&message) {
                FaultKind::Disconnect
            } else {
                FaultKind::Internal
            },
            origin: FaultOrigin::Panic,
            message,
        }
    }

    pub fn is_disconnect(&self) -> bool {
        self.kind == FaultKind::Disconnect
    }
}

impl std::fmt::Display for Fault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

/// Walk the source chain looking for a peer-closed or peer-reset connection.
pub fn classify(err: &(dyn StdError + 'static)) -> FaultKind {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(io_err) = e.downcast_ref::<io::Error>() {
            if matches!(
                io_err.kind(),
                io::ErrorKind::BrokenPipe | io::ErrorKind::ConnectionReset
            ) {
                return FaultKind::Disconnect;
            }
        }
        if is_disconnect_message(&e.to_string()) {
            return FaultKind::Disconnect;
        }
        current = e.source();
    }
    FaultKind::Internal
}

fn is_disconnect_message(message: &str) -> bool {
    let message = message.to_lowercase();
    message.contains("broken pipe") || message.contains("connection reset by peer")
}

/// Error returned by request handlers.
#[derive(Debug)]
pub struct AppError(BoxError);

impl AppError {
    pub fn new(err: impl Into<BoxError>) -> Self {
        Self(err.into())
    }

    pub fn kind(&self) -> FaultKind {
        classify(&*self.0)
    }
}

impl<E> From<E> for AppError
where
    E: Into<BoxError>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut response = StatusCode::INTERNAL_SERVER_ERROR.into_response();
        response
            .extensions_mut()
            .insert(Fault::from_error(&*self.0));
        response
    }
}
