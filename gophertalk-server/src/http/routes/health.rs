//! Health check endpoint
//!
//! Reports datastore reachability only: acquire, trivial round trip, release.
//! Never cached, never propagates the failure.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;

use crate::db::Manager;
use crate::http::registry::Module;
use crate::state::AppState;

pub const PREFIX: &str = "/api/health-check";

/// GET /api/health-check
async fn health_check<M: Manager>(State(state): State<AppState<M>>) -> Response {
    match state.pool().health_check().await {
        Ok(()) => (StatusCode::OK, "OK").into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "health check failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "DB connection failed").into_response()
        }
    }
}

pub fn module<M: Manager>() -> Module<AppState<M>> {
    Module::new(
        "health",
        PREFIX,
        Router::new().route("/", get(health_check::<M>)),
    )
}
