//! Cross-origin headers applied to every response

use crate::error::ApiError;
use axum::{
    extract::Request,
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

pub const ALLOW_ORIGIN: &str = "*";
pub const ALLOW_CREDENTIALS: &str = "true";
pub const ALLOW_HEADERS: &str = "Content-Type, Content-Length, Accept-Encoding, X-CSRF-Token, Authorization, accept, origin, Cache-Control, X-Requested-With";
pub const ALLOW_METHODS: &str = "POST, GET, OPTIONS, PUT, DELETE";

/// Middleware adding the fixed CORS headers to every response.
///
/// `tower_http::cors::CorsLayer` refuses to pair a wildcard origin with
/// credentials, and only sends the allow-lists on preflights.
pub async fn cors_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    apply(response.headers_mut());
    response
}

/// `OPTIONS` handler for known routes: a preflight gets 204, a bare
/// `OPTIONS` is not an allowed method. Unknown paths never reach this and
/// fall through to the 404 fallback.
pub async fn preflight(headers: HeaderMap) -> Response {
    if headers.contains_key(header::ACCESS_CONTROL_REQUEST_METHOD) {
        StatusCode::NO_CONTENT.into_response()
    } else {
        ApiError::MethodNotAllowed(Method::OPTIONS).into_response()
    }
}

fn apply(headers: &mut HeaderMap) {
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static(ALLOW_ORIGIN),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
        HeaderValue::from_static(ALLOW_CREDENTIALS),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(ALLOW_HEADERS),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOW_METHODS),
    );
}
