//! HTTP layer
//!
//! Axum server with:
//! - Static prefix table, one capability module per prefix
//! - CORS (localhost only by default)
//! - Request tracing and a panic boundary
//! - Malformed JSON rejected before dispatch
//! - Graceful shutdown that drains before the pool closes
//! - JSON error responses

pub mod error;
pub mod extractors;
pub mod middleware;
pub mod registry;
pub mod routes;
pub mod server;

pub use error::ApiError;
pub use registry::{Module, RouteError, RouteTable};
pub use routes::api_modules;
pub use server::{shutdown_signal, App, BoundApp, ListeningApp, Phase, ServerConfig, ServerError};
