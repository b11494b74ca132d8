//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::io::{self, Write};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::Request;
use serde_json::Value;

use web_scaffold::config::{AppConfig, LogFormat};
use web_scaffold::resources::{Connector, Resource};
use web_scaffold::{BoxError, Logger};

/// In-memory log destination.
#[derive(Clone, Default)]
pub struct Capture(Arc<Mutex<Vec<u8>>>);

impl Capture {
    /// Every record written so far, parsed.
    pub fn records(&self) -> Vec<Value> {
        let bytes = self.0.lock().unwrap().clone();
        String::from_utf8(bytes)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    /// Records whose message equals `message`.
    pub fn with_message(&self, message: &str) -> Vec<Value> {
        self.records()
            .into_iter()
            .filter(|r| r["message"] == message)
            .collect()
    }
}

impl Write for Capture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// A logger writing JSON records into a [`Capture`].
pub fn capture_logger(level: &str) -> (Logger, Capture) {
    let logger = Logger::new();
    let capture = Capture::default();
    logger
        .init_writer(level, LogFormat::Json, capture.clone())
        .unwrap();
    (logger, capture)
}

/// Parse every record in a JSON log file.
pub fn read_records(path: &Path) -> Vec<Value> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

/// Config bound to an ephemeral loopback port, logging to `dir/app.log`.
pub fn test_config(dir: &Path) -> AppConfig {
    let mut config = AppConfig::default();
    config.app.name = "test-app".into();
    config.app.host = "127.0.0.1".into();
    config.app.port = 0;
    config.log.level = "debug".into();
    config.log.filename = dir.join("app.log").display().to_string();
    config
}

/// A request as the listener would hand it over, with a peer address.
pub fn request(uri: &str) -> Request<Body> {
    let peer: SocketAddr = "203.0.113.9:40000".parse().unwrap();
    let mut req = Request::builder().uri(uri).body(Body::empty()).unwrap();
    req.extensions_mut().insert(ConnectInfo(peer));
    req
}

/// Names recorded by fake resources, in the order things happened.
pub type Journal = Arc<Mutex<Vec<String>>>;

/// Connector for a fake resource that journals connect and close calls.
pub struct FakeConnector {
    pub name: &'static str,
    pub journal: Journal,
    pub fail: bool,
    pub delay: Duration,
}

impl FakeConnector {
    pub fn new(name: &'static str, journal: &Journal) -> Self {
        Self {
            name,
            journal: Arc::clone(journal),
            fail: false,
            delay: Duration::ZERO,
        }
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }
}

#[async_trait]
impl Connector for FakeConnector {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn connect(&self) -> Result<Arc<dyn Resource>, BoxError> {
        self.journal
            .lock()
            .unwrap()
            .push(format!("connect {}", self.name));
        tokio::time::sleep(self.delay).await;
        if self.fail {
            return Err(format!("{} unreachable", self.name).into());
        }
        Ok(Arc::new(FakeResource {
            name: self.name,
            journal: Arc::clone(&self.journal),
        }))
    }
}

pub struct FakeResource {
    name: &'static str,
    journal: Journal,
}

#[async_trait]
impl Resource for FakeResource {
    fn name(&self) -> &str {
        self.name
    }

    async fn ping(&self) -> Result<(), BoxError> {
        Ok(())
    }

    async fn close(&self) {
        self.journal
            .lock()
            .unwrap()
            .push(format!("close {}", self.name));
    }
}
