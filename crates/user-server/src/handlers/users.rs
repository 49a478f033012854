//! User handlers

use crate::error::ApiResult;
use crate::AppState;
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tracing::info;
use user_types::{CreateUserRequest, User};

pub async fn list(State(state): State<AppState>) -> ApiResult<Json<Vec<User>>> {
    let users = state.store.get_users().await?;
    Ok(Json(users))
}

/// The body is decoded as JSON whatever its `Content-Type`.
pub async fn create(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<String>)> {
    let req: CreateUserRequest = serde_json::from_slice(&body)?;
    let user = User::from(req);

    let id = state.store.create_user(&user).await?;
    info!("Created user {}", id);

    Ok((StatusCode::CREATED, Json(id)))
}

pub async fn get(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<User>> {
    let user = state.store.get_user(&id).await?;
    Ok(Json(user))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<User>> {
    let user = state.store.update_user(&id, &[]).await?;
    Ok(Json(user))
}

pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<User>> {
    let user = state.store.delete_user(&id).await?;
    info!("Deleted user {}", user.sub);
    Ok(Json(user))
}
