//! Shared types for the voxrelay platform.
//!
//! This crate provides the domain records exchanged between the database
//! layer and the HTTP/WebSocket surface: interpreter sessions, avatars,
//! attendee join records, and the voice reference resolved for a room.
//!
//! No crate in the workspace depends on anything *except* `voxrelay-types`
//! for cross-cutting type definitions. This keeps the dependency graph
//! clean and prevents circular dependencies.

use serde::{Deserialize, Serialize};

/// An avatar record: a synthetic speaker identity with a reference image
/// and a voice code understood by the speech synthesis backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Avatar {
    /// Internal database ID.
    pub avatar_id: i64,
    /// Display name of the avatar.
    pub avatar_name: String,
    /// Reference image path or URL used by the lip-sync generator.
    pub avatar_img: String,
    /// Opaque voice identifier passed to the speech synthesis service.
    pub voice_code: String,
}

/// Parameters for creating a new avatar (the ID is assigned by the database).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAvatar {
    pub avatar_name: String,
    pub avatar_img: String,
    pub voice_code: String,
}

/// An interpreter session. The `session_id` doubles as the room code that
/// clients join over the WebSocket gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Caller-supplied unique session/room code.
    pub session_id: String,
    /// External job reference this session was booked for.
    pub job_id: String,
    /// The avatar whose voice and face the session uses.
    pub avatar_id: i64,
}

/// An attendee join record, persisted for reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attendee {
    pub user_name: String,
    pub session_id: String,
    /// ISO 8601 join timestamp. Filled in by the server when omitted.
    #[serde(default)]
    pub join_time: String,
    pub designation: String,
}

/// The voice configuration resolved for a room: which synthesized voice to
/// speak with and which reference image to animate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceRef {
    /// Opaque voice identifier for the speech synthesis service.
    pub voice_code: String,
    /// Reference image for the lip-sync generator.
    pub avatar_img: String,
}
