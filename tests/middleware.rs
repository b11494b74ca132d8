//! Request telemetry and panic recovery, exercised through the full
//! middleware stack.

use std::io;
use std::time::Duration;

use axum::body::to_bytes;
use axum::http::{header, StatusCode};
use axum::routing::get;
use axum::{Extension, Router};
use tower::ServiceExt;

use web_scaffold::config::AppConfig;
use web_scaffold::http::{AppError, HttpServer, RequestErrors, X_REQUEST_ID};

mod common;

async fn slow() -> &'static str {
    tokio::time::sleep(Duration::from_millis(50)).await;
    "done"
}

async fn boom() -> &'static str {
    panic!("index out of range")
}

#[inline(never)]
fn overflow_the_ledger() -> &'static str {
    panic!("ledger overflow")
}

async fn ledger() -> &'static str {
    overflow_the_ledger()
}

async fn hangup() -> Result<&'static str, AppError> {
    Err(io::Error::from(io::ErrorKind::BrokenPipe).into())
}

async fn broken() -> Result<&'static str, AppError> {
    Err(AppError::new("nil pointer"))
}

async fn noted(Extension(errors): Extension<RequestErrors>) -> &'static str {
    errors.private("cache miss");
    errors.public("try again");
    "ok"
}

fn app(config: &AppConfig) -> Router {
    let routes = Router::new()
        .route("/slow", get(slow))
        .route("/boom", get(boom))
        .route("/ledger", get(ledger))
        .route("/hangup", get(hangup))
        .route("/broken", get(broken))
        .route("/noted", get(noted))
        .route("/ping", get(|| async { "pong" }));
    HttpServer::build_router(routes, config)
}

#[tokio::test]
async fn one_record_per_request() {
    let (logger, capture) = common::capture_logger("debug");
    let _guard = tracing::subscriber::set_default(logger.subscriber());

    let mut req = common::request("/slow?q=1&page=2");
    req.headers_mut()
        .insert(header::USER_AGENT, "curl/8.5.0".parse().unwrap());

    let response = app(&AppConfig::default()).oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let request_id = response.headers()[X_REQUEST_ID].to_str().unwrap().to_string();

    let records = capture.with_message("/slow");
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record["level"], "INFO");
    assert_eq!(record["status"], 200);
    assert_eq!(record["method"], "GET");
    assert_eq!(record["path"], "/slow");
    assert_eq!(record["query"], "q=1&page=2");
    assert_eq!(record["ip"], "203.0.113.9");
    assert_eq!(record["user_agent"], "curl/8.5.0");
    assert_eq!(record["request_id"], request_id.as_str());
    assert_eq!(record["errors"], "");
    assert!(record["cost"].as_f64().unwrap() >= 0.05);
    assert!(record["caller"]
        .as_str()
        .unwrap()
        .starts_with("http/telemetry.rs:"));
}

#[tokio::test]
async fn forwarded_address_wins() {
    let (logger, capture) = common::capture_logger("info");
    let _guard = tracing::subscriber::set_default(logger.subscriber());

    let mut req = common::request("/ping");
    req.headers_mut()
        .insert("x-forwarded-for", "198.51.100.4, 10.0.0.1".parse().unwrap());
    req.headers_mut().insert(X_REQUEST_ID, "abc-123".parse().unwrap());

    let response = app(&AppConfig::default()).oneshot(req).await.unwrap();
    assert_eq!(response.headers()[X_REQUEST_ID], "abc-123");

    let record = &capture.with_message("/ping")[0];
    assert_eq!(record["ip"], "198.51.100.4");
    assert_eq!(record["request_id"], "abc-123");
}

#[tokio::test]
async fn level_threshold_drops_request_records() {
    let (logger, capture) = common::capture_logger("warn");
    let _guard = tracing::subscriber::set_default(logger.subscriber());

    let response = app(&AppConfig::default())
        .oneshot(common::request("/ping"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(capture.records().is_empty());
}

#[tokio::test]
async fn panic_becomes_500_and_server_keeps_serving() {
    let (logger, capture) = common::capture_logger("info");
    let _guard = tracing::subscriber::set_default(logger.subscriber());
    let app = app(&AppConfig::default());

    let response = app.clone().oneshot(common::request("/boom")).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert!(body.is_empty());

    let faults = capture.with_message("[Recovery from panic]");
    assert_eq!(faults.len(), 1);
    assert_eq!(faults[0]["level"], "ERROR");
    assert_eq!(faults[0]["error"], "index out of range");
    assert!(faults[0]["request"].as_str().unwrap().starts_with("GET /boom"));
    assert!(faults[0].get("stack").is_some());

    let record = &capture.with_message("/boom")[0];
    assert_eq!(record["status"], 500);
    assert_eq!(record["errors"], "Error #01: index out of range");

    let response = app.oneshot(common::request("/ping")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn stack_trace_is_optional() {
    let (logger, capture) = common::capture_logger("info");
    let _guard = tracing::subscriber::set_default(logger.subscriber());
    let mut config = AppConfig::default();
    config.server.stack_traces = false;

    let response = app(&config).oneshot(common::request("/broken")).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let faults = capture.with_message("[Recovery from panic]");
    assert_eq!(faults.len(), 1);
    assert_eq!(faults[0]["error"], "nil pointer");
    assert!(faults[0].get("stack").is_none());
}

#[tokio::test]
async fn disconnect_is_logged_without_stack() {
    let (logger, capture) = common::capture_logger("info");
    let _guard = tracing::subscriber::set_default(logger.subscriber());

    let mut req = common::request("/hangup");
    req.headers_mut()
        .insert(header::AUTHORIZATION, "Bearer secret".parse().unwrap());

    let response = app(&AppConfig::default()).oneshot(req).await.unwrap();
    assert_eq!(response.status().as_u16(), 499);
    assert_eq!(response.headers()[header::CONNECTION], "close");

    let records = capture.records();
    let errors: Vec<_> = records.iter().filter(|r| r["level"] == "ERROR").collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0]["message"], "/hangup");
    assert!(errors[0].get("stack").is_none());
    let dump = errors[0]["request"].as_str().unwrap();
    assert!(dump.contains("authorization: *"));
    assert!(!dump.contains("secret"));

    let telemetry: Vec<_> = records.iter().filter(|r| r["level"] == "INFO").collect();
    assert_eq!(telemetry.len(), 1);
    assert_eq!(telemetry[0]["status"], 499);
    assert_eq!(telemetry[0]["errors"], "Error #01: broken pipe");
}

#[tokio::test]
async fn handler_errors_reach_the_request_record() {
    let (logger, capture) = common::capture_logger("info");
    let _guard = tracing::subscriber::set_default(logger.subscriber());

    let response = app(&AppConfig::default())
        .oneshot(common::request("/noted"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let record = &capture.with_message("/noted")[0];
    assert_eq!(record["errors"], "Error #01: cache miss");
}

#[tokio::test]
async fn panic_stack_names_the_faulting_function() {
    let (logger, capture) = common::capture_logger("info");
    let _guard = tracing::subscriber::set_default(logger.subscriber());
    let mut config = AppConfig::default();
    config.server.stack_traces = true;

    let response = app(&config).oneshot(common::request("/ledger")).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let faults = capture.with_message("[Recovery from panic]");
    assert_eq!(faults.len(), 1);
    assert_eq!(faults[0]["error"], "ledger overflow");
    let stack = faults[0]["stack"].as_str().unwrap();
    assert!(stack.contains("overflow_the_ledger"), "{stack}");
}
