//! HTTP handlers

pub mod health;
pub mod users;

pub use health::health;

use crate::error::ApiError;
use axum::http::{Method, Uri};

/// Fallback for unsupported methods on a known path
pub async fn method_not_allowed(method: Method) -> ApiError {
    ApiError::MethodNotAllowed(method)
}

/// Fallback for unknown paths
pub async fn not_found(uri: Uri) -> ApiError {
    ApiError::RouteNotFound(uri)
}
