//! Per-request context shared between middleware and handlers.
//!
//! # Responsibilities
//! - Capture request metadata for the telemetry record
//! - Carry the accumulated error list through the handler chain
//! - Dump the request head for fault logs

use std::fmt::Write as _;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};

use axum::extract::{ConnectInfo, Request};
use axum::http::{header, HeaderMap, Method, Uri, Version};

use crate::http::request::X_REQUEST_ID;

/// Visibility of a recorded request error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorScope {
    /// Logged only.
    Private,
    /// May be shown to the client by the handler.
    Public,
}

/// Errors accumulated while handling one request.
///
/// Inserted into the request extensions by the telemetry layer; clones share
/// the same list.
#[derive(Debug, Clone, Default)]
pub struct RequestErrors {
    entries: Arc<Mutex<Vec<(ErrorScope, String)>>>,
}

impl RequestErrors {
    pub fn push(&self, scope: ErrorScope, message: impl Into<String>) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((scope, message.into()));
    }

    pub fn private(&self, message: impl Into<String>) {
        self.push(ErrorScope::Private, message);
    }

    pub fn public(&self, message: impl Into<String>) {
        self.push(ErrorScope::Public, message);
    }

    pub fn is_empty(&self) -> bool {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }

    /// Entries of `scope`, one per line as `Error #NN: message`.
    pub fn joined(&self, scope: ErrorScope) -> String {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let mut out = String::new();
        for (i, (_, message)) in entries.iter().filter(|(s, _)| *s == scope).enumerate() {
            if i > 0 {
                out.push('\n');
            }
            let _ = write!(out, "Error #{:02}: {}", i + 1, message);
        }
        out
    }
}

/// Request metadata captured before the handler runs.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub method: Method,
    pub path: String,
    pub query: String,
    pub client_ip: String,
    pub user_agent: String,
    pub request_id: String,
}

impl RequestContext {
    pub fn capture(req: &Request) -> Self {
        let headers = req.headers();
        let peer = req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);

        Self {
            method: req.method().clone(),
            path: req.uri().path().to_string(),
            query: req.uri().query().unwrap_or_default().to_string(),
            client_ip: client_ip(headers, peer),
            user_agent: header_str(headers, header::USER_AGENT.as_str()),
            request_id: header_str(headers, X_REQUEST_ID),
        }
    }
}

fn header_str(headers: &HeaderMap, name: &str) -> String {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

/// First `X-Forwarded-For` hop, then `X-Real-IP`, then the peer address.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty());
    if let Some(ip) = forwarded {
        return ip.to_string();
    }

    let real = headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|ip| !ip.is_empty());
    if let Some(ip) = real {
        return ip.to_string();
    }

    peer.map(|addr| addr.ip().to_string()).unwrap_or_default()
}

/// The request line and headers, without the body.
#[derive(Debug, Clone)]
pub struct RequestDump {
    method: Method,
    uri: Uri,
    version: Version,
    headers: HeaderMap,
}

impl RequestDump {
    pub fn capture(req: &Request) -> Self {
        Self {
            method: req.method().clone(),
            uri: req.uri().clone(),
            version: req.version(),
            headers: req.headers().clone(),
        }
    }
}

impl std::fmt::Display for RequestDump {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let target = self
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        write!(f, "{} {} {:?}\r\n", self.method, target, self.version)?;
        for (name, value) in &self.headers {
            if *name == header::AUTHORIZATION {
                write!(f, "{name}: *\r\n")?;
            } else {
                write!(f, "{name}: {}\r\n", String::from_utf8_lossy(value.as_bytes()))?;
            }
        }
        write!(f, "\r\n")
    }
}
