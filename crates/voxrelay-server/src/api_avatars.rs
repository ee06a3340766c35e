//! Avatar HTTP handlers.

use crate::api::ApiError;
use crate::AppState;
use axum::{
    extract::{Extension, Json},
    http::StatusCode,
};
use std::sync::Arc;
use voxrelay_types::{Avatar, NewAvatar};

/// Lists every registered avatar.
pub async fn list_avatars_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<Vec<Avatar>>, ApiError> {
    let pool = state.pool.clone();
    let avatars = tokio::task::spawn_blocking(move || {
        let conn = pool
            .get()
            .map_err(|e| ApiError::InternalServerError(format!("db pool error: {}", e)))?;
        voxrelay_db::list_avatars(&conn)
            .map_err(|e| ApiError::InternalServerError(format!("db error: {}", e)))
    })
    .await
    .map_err(|e| ApiError::InternalServerError(format!("task error: {}", e)))??;

    Ok(Json(avatars))
}

/// Registers a new avatar: a display name, a reference image for the
/// lip-sync generator, and a voice code for the speech backend.
pub async fn create_avatar_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<NewAvatar>,
) -> Result<(StatusCode, Json<Avatar>), ApiError> {
    if payload.avatar_name.trim().is_empty() {
        return Err(ApiError::BadRequest("avatarName must not be empty".into()));
    }
    if payload.voice_code.trim().is_empty() {
        return Err(ApiError::BadRequest("voiceCode must not be empty".into()));
    }

    let pool = state.pool.clone();
    let avatar = tokio::task::spawn_blocking(move || {
        let conn = pool
            .get()
            .map_err(|e| ApiError::InternalServerError(format!("db pool error: {}", e)))?;
        voxrelay_db::create_avatar(&conn, &payload)
            .map_err(|e| ApiError::InternalServerError(format!("db error: {}", e)))
    })
    .await
    .map_err(|e| ApiError::InternalServerError(format!("task error: {}", e)))??;

    tracing::info!(avatar = %avatar.avatar_name, id = avatar.avatar_id, "avatar created");
    Ok((StatusCode::CREATED, Json(avatar)))
}
