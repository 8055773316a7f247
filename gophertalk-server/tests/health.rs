//! Health reporter: reachability only, never cached, never leaks a connection

mod common;

use std::time::Duration;

use axum::http::{Method, StatusCode};
use common::test_app;
use serde_json::Value;

#[tokio::test]
async fn reports_ok_when_reachable() {
    let app = test_app();
    let (status, body) = app.send(Method::GET, "/api/health-check", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::String("OK".into()));
    app.assert_released();
}

#[tokio::test]
async fn reports_failure_then_recovers() {
    let app = test_app();

    app.store.set_reachable(false);
    let (status, body) = app.send(Method::GET, "/api/health-check", None, None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, Value::String("DB connection failed".into()));
    app.assert_released();

    app.store.set_reachable(true);
    let (status, _) = app.send(Method::GET, "/api/health-check", None, None).await;
    assert_eq!(status, StatusCode::OK, "status must be derived fresh on every request");
}

#[tokio::test]
async fn broken_idle_connection_is_replaced() {
    let app = test_app();
    app.send(Method::GET, "/api/health-check", None, None).await;
    assert_eq!(app.store.open_connections(), 1);

    // The idle connection fails its recycle ping and is discarded
    app.store.set_reachable(false);
    app.send(Method::GET, "/api/health-check", None, None).await;
    assert_eq!(app.store.open_connections(), 0);

    app.store.set_reachable(true);
    let (status, _) = app.send(Method::GET, "/api/health-check", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.store.open_connections(), 1);
}

#[tokio::test]
async fn saturated_pool_reports_failure() {
    let app = test_app();
    let max = app.pool.config().max_connections as usize;

    let mut held = Vec::new();
    for _ in 0..max {
        held.push(app.pool.acquire().await.unwrap());
    }

    let started = tokio::time::Instant::now();
    let (status, _) = app.send(Method::GET, "/api/health-check", None, None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(started.elapsed() >= Duration::from_millis(150));

    drop(held);
    let (status, _) = app.send(Method::GET, "/api/health-check", None, None).await;
    assert_eq!(status, StatusCode::OK);
    app.assert_released();
}

#[tokio::test]
async fn needs_no_credentials() {
    let app = test_app();
    // Unknown method on the health route is not a 401
    let (status, _) = app.send(Method::POST, "/api/health-check", None, None).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}
