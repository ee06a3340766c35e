//! Session HTTP handlers: booking a session/room code and validating one
//! before a client joins.

use crate::api::ApiError;
use crate::AppState;
use axum::{
    extract::{Extension, Json, Path},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use voxrelay_db::DbError;
use voxrelay_types::{Avatar, Session};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    pub session_id: String,
    pub job_id: String,
    pub avatar_id: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateSessionResponse {
    pub session_id: String,
    pub job_id: String,
    pub avatar: Option<Avatar>,
}

/// Creates a session record. The session id doubles as the room code
/// handed to conference clients, so duplicates are a conflict.
pub async fn create_session_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<Session>), ApiError> {
    if payload.session_id.trim().is_empty() {
        return Err(ApiError::BadRequest("sessionId must not be empty".into()));
    }
    if payload.job_id.trim().is_empty() {
        return Err(ApiError::BadRequest("jobId must not be empty".into()));
    }

    let session = Session {
        session_id: payload.session_id,
        job_id: payload.job_id,
        avatar_id: payload.avatar_id,
    };

    let pool = state.pool.clone();
    let stored = session.clone();
    tokio::task::spawn_blocking(move || {
        let conn = pool
            .get()
            .map_err(|e| ApiError::InternalServerError(format!("db pool error: {}", e)))?;
        voxrelay_db::insert_session(&conn, &stored).map_err(|e| match e {
            DbError::DuplicateSession(id) => {
                ApiError::Conflict(format!("session already exists: {}", id))
            }
            other => ApiError::InternalServerError(format!("db error: {}", other)),
        })
    })
    .await
    .map_err(|e| ApiError::InternalServerError(format!("task error: {}", e)))??;

    tracing::info!(session = %session.session_id, "session created");
    Ok((StatusCode::CREATED, Json(session)))
}

/// Validates a session id before a client joins its room, returning the
/// session details and the avatar it is configured with.
pub async fn validate_session_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<ValidateSessionResponse>, ApiError> {
    let pool = state.pool.clone();
    let looked_up = session_id.clone();

    let result = tokio::task::spawn_blocking(move || {
        let conn = pool
            .get()
            .map_err(|e| ApiError::InternalServerError(format!("db pool error: {}", e)))?;
        let Some(session) = voxrelay_db::get_session(&conn, &looked_up)
            .map_err(|e| ApiError::InternalServerError(format!("db error: {}", e)))?
        else {
            return Ok(None);
        };
        let avatar = voxrelay_db::get_avatar(&conn, session.avatar_id)
            .map_err(|e| ApiError::InternalServerError(format!("db error: {}", e)))?;
        Ok(Some((session, avatar)))
    })
    .await
    .map_err(|e| ApiError::InternalServerError(format!("task error: {}", e)))??;

    let Some((session, avatar)) = result else {
        return Err(ApiError::NotFound(format!(
            "session not found: {}",
            session_id
        )));
    };

    Ok(Json(ValidateSessionResponse {
        session_id: session.session_id,
        job_id: session.job_id,
        avatar,
    }))
}
