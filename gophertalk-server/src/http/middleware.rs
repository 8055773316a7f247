//! Global middleware applied ahead of module dispatch

use std::any::Any;

use axum::body::{to_bytes, Body};
use axum::extract::Request;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, Uri};
use axum::middleware::Next;
use axum::response::Response;
use serde::de::IgnoredAny;
use tower_http::cors::{Any as AnyHeaders, CorsLayer};

use super::error::error_body;

/// Largest request body the JSON check will buffer.
pub const MAX_JSON_BODY: usize = 1024 * 1024;

/// Browser origins allowed when CORS is not permissive.
const LOCAL_ORIGINS: [&str; 4] = [
    "http://localhost:3000",
    "http://127.0.0.1:3000",
    "http://localhost:5173",
    "http://127.0.0.1:5173",
];

pub fn cors(permissive: bool) -> CorsLayer {
    if permissive {
        tracing::warn!("CORS: Permissive mode enabled - all origins allowed");
        return CorsLayer::permissive();
    }

    CorsLayer::new()
        .allow_origin(LOCAL_ORIGINS.map(HeaderValue::from_static))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(AnyHeaders)
}

fn declares_json(headers: &HeaderMap) -> bool {
    let Some(content_type) = headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok()) else {
        return false;
    };
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    essence == "application/json" || (essence.starts_with("application/") && essence.ends_with("+json"))
}

/// Reject a request that declares a JSON body which does not parse.
///
/// Runs before routing into a module, so a malformed body never reaches a
/// handler and never costs a pooled connection. Empty bodies pass through.
pub async fn reject_malformed_json(request: Request, next: Next) -> Response {
    if !declares_json(request.headers()) {
        return next.run(request).await;
    }

    let (parts, body) = request.into_parts();
    let bytes = match to_bytes(body, MAX_JSON_BODY).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::debug!(error = %e, "failed to buffer request body");
            return error_body(
                StatusCode::PAYLOAD_TOO_LARGE,
                "payload_too_large",
                "request body is too large",
            );
        }
    };

    if !bytes.is_empty() {
        if let Err(e) = serde_json::from_slice::<IgnoredAny>(&bytes) {
            tracing::debug!(error = %e, uri = %parts.uri, "rejecting malformed JSON body");
            return error_body(
                StatusCode::BAD_REQUEST,
                "bad_request",
                &format!("malformed JSON body: {e}"),
            );
        }
    }

    next.run(Request::from_parts(parts, Body::from(bytes))).await
}

/// Panic boundary response: logged, answered with a generic 500.
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic payload");
    tracing::error!(panic = detail, "handler panicked");

    error_body(
        StatusCode::INTERNAL_SERVER_ERROR,
        "internal_error",
        "an internal error occurred",
    )
}

/// Fallback for paths no module owns.
pub async fn not_found(uri: Uri) -> Response {
    error_body(
        StatusCode::NOT_FOUND,
        "not_found",
        &format!("no route for {}", uri.path()),
    )
}
