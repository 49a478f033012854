//! API error type and the JSON error envelope

use crate::storage::StorageError;
use axum::{
    http::{Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use user_types::ErrorEnvelope;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("{0}")]
    Decode(#[from] serde_json::Error),

    #[error("method not allowed: {0}")]
    MethodNotAllowed(Method),

    #[error("no route for {0}")]
    RouteNotFound(Uri),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Storage(StorageError::NotFound) | ApiError::RouteNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            ApiError::Storage(StorageError::NotImplemented) => StatusCode::NOT_IMPLEMENTED,
            ApiError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::Storage(_) | ApiError::Decode(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match &self {
            ApiError::Storage(StorageError::Connectivity(_) | StorageError::Database(_)) => {
                tracing::error!("Request failed: {}", self)
            }
            _ => tracing::warn!("Request failed ({}): {}", status, self),
        }

        (status, Json(ErrorEnvelope::new(self.to_string()))).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
