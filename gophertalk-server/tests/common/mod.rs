//! Shared fixtures: the full application over the in-memory backend

#![allow(dead_code)]

use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use gophertalk_server::auth::{TokenPair, TokenService};
use gophertalk_server::db::{MemoryManager, MemoryStore, Pool, PoolConfig};
use gophertalk_server::http::{api_modules, App, Module, ServerConfig};
use gophertalk_server::AppState;
use serde_json::{json, Value};
use tower::ServiceExt;

pub const SECRET: &[u8] = b"integration-test-secret";
pub const PASSWORD: &str = "Secret42$";

pub struct TestApp {
    pub store: MemoryStore,
    pub pool: Pool<MemoryManager>,
    pub tokens: TokenService,
    pub router: Router,
}

pub fn pool_config(max_connections: u32) -> PoolConfig {
    PoolConfig {
        max_connections,
        acquire_timeout: Duration::from_millis(200),
    }
}

pub fn state(max_connections: u32) -> (MemoryStore, AppState<MemoryManager>) {
    let store = MemoryStore::new();
    let pool = Pool::new(store.manager(), pool_config(max_connections)).unwrap();
    (store, AppState::new(pool, TokenService::new(SECRET)))
}

pub fn test_app() -> TestApp {
    test_app_with(Vec::new())
}

/// The standard modules plus `extra`.
pub fn test_app_with(extra: Vec<Module<AppState<MemoryManager>>>) -> TestApp {
    let (store, state) = state(4);
    let pool = state.pool().clone();
    let tokens = state.tokens().clone();

    let mut modules = api_modules();
    modules.extend(extra);
    let bound = App::new(state, ServerConfig::default())
        .bind_routes(modules)
        .expect("modules do not overlap");

    TestApp {
        store,
        pool,
        tokens,
        router: bound.router(),
    }
}

impl TestApp {
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.raw(request).await
    }

    pub async fn raw(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, body)
    }

    /// Register `user_name` and return its id and tokens.
    pub async fn register(&self, user_name: &str) -> (i64, TokenPair) {
        let (status, body) = self
            .send(
                Method::POST,
                "/api/auth/register",
                None,
                Some(json!({
                    "user_name": user_name,
                    "password": PASSWORD,
                    "password_confirm": PASSWORD,
                    "first_name": "Ada",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "register failed: {body}");

        let tokens: TokenPair = serde_json::from_value(body).unwrap();
        let id = self.tokens.verify_access(&tokens.access_token).unwrap();
        (id, tokens)
    }

    pub async fn create_post(&self, token: &str, text: &str, reply_to_id: Option<i64>) -> Value {
        let (status, body) = self
            .send(
                Method::POST,
                "/api/posts",
                Some(token),
                Some(json!({ "text": text, "reply_to_id": reply_to_id })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "create post failed: {body}");
        body
    }

    /// No connection is checked out.
    pub fn assert_released(&self) {
        let status = self.pool.status();
        assert_eq!(status.in_use, 0, "connection leaked: {status:?}");
    }
}
