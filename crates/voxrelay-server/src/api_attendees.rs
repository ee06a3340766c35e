//! Attendee HTTP handlers: bulk recording of who joined a session, kept
//! for post-call reporting.

use crate::api::ApiError;
use crate::AppState;
use axum::{
    extract::{Extension, Json},
    http::StatusCode,
};
use std::sync::Arc;
use voxrelay_types::Attendee;

/// Records a batch of attendee join entries in one transaction. An entry
/// with no join time gets the current UTC timestamp.
pub async fn add_attendees_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(mut attendees): Json<Vec<Attendee>>,
) -> Result<(StatusCode, Json<Vec<Attendee>>), ApiError> {
    if attendees.is_empty() {
        return Err(ApiError::BadRequest(
            "attendee list must not be empty".into(),
        ));
    }
    for attendee in &mut attendees {
        if attendee.user_name.trim().is_empty() || attendee.session_id.trim().is_empty() {
            return Err(ApiError::BadRequest(
                "userName and sessionId must not be empty".into(),
            ));
        }
        if attendee.join_time.trim().is_empty() {
            attendee.join_time = chrono::Utc::now().to_rfc3339();
        }
    }

    let pool = state.pool.clone();
    let stored = attendees.clone();
    tokio::task::spawn_blocking(move || {
        let conn = pool
            .get()
            .map_err(|e| ApiError::InternalServerError(format!("db pool error: {}", e)))?;
        voxrelay_db::add_attendees(&conn, &stored)
            .map_err(|e| ApiError::InternalServerError(format!("db error: {}", e)))
    })
    .await
    .map_err(|e| ApiError::InternalServerError(format!("task error: {}", e)))??;

    tracing::info!(count = attendees.len(), "attendees recorded");
    Ok((StatusCode::CREATED, Json(attendees)))
}
