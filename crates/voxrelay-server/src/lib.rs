//! Voxrelay server library logic.
//!
//! Wires the in-memory room core (`voxrelay-rooms`), the external voice
//! collaborators (`voxrelay-voice`), and the session/avatar store
//! (`voxrelay-db`) into an axum application: HTTP CRUD for sessions,
//! avatars, and attendees, plus the WebSocket conferencing gateway.

pub mod api;
pub mod api_attendees;
pub mod api_avatars;
pub mod api_sessions;
pub mod api_ws;
pub mod config;
pub mod pipeline;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Extension, Json, Router,
};
use pipeline::{DbVoiceDirectory, SynthesisPipeline};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use voxrelay_db::DbPool;
use voxrelay_rooms::{MicCoordinator, RoomRegistry};
use voxrelay_voice::{LipSyncClient, ModelAssets, SpeechClient};

/// The concrete pipeline wired to the live collaborators.
pub type LivePipeline = SynthesisPipeline<DbVoiceDirectory, SpeechClient, LipSyncClient>;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: DbPool,
    /// In-memory room membership registry.
    pub registry: RoomRegistry,
    /// Per-room speaking-rights coordinator.
    pub mic: MicCoordinator,
    /// Active WebSocket connections.
    pub connections: api_ws::ConnectionManager,
    /// The transcription → audio/video pipeline.
    pub pipeline: Arc<LivePipeline>,
    /// One-time model warm-up, present when lip-sync is enabled.
    pub assets: Option<Arc<ModelAssets>>,
}

impl AppState {
    /// Builds the application state, wiring the room core into the
    /// synthesis pipeline. `lipsync` is `None` when avatar video
    /// generation is disabled.
    pub fn new(
        pool: DbPool,
        speech: SpeechClient,
        lipsync: Option<LipSyncClient>,
        assets: Option<Arc<ModelAssets>>,
    ) -> Self {
        let registry = RoomRegistry::new();
        let mic = MicCoordinator::new(&registry);
        let connections = api_ws::ConnectionManager::new();

        let pipeline = Arc::new(SynthesisPipeline::new(
            registry.clone(),
            connections.clone(),
            DbVoiceDirectory::new(pool.clone()),
            speech,
            lipsync,
        ));

        Self {
            pool,
            registry,
            mic,
            connections,
            pipeline,
            assets,
        }
    }
}

/// Maximum request body size (2 MiB). Protects against OOM from oversized
/// payloads.
const MAX_REQUEST_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Health check handler.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/sessions", post(api_sessions::create_session_handler))
        .route(
            "/api/sessions/{sessionId}/validate",
            get(api_sessions::validate_session_handler),
        )
        .route(
            "/api/avatars",
            get(api_avatars::list_avatars_handler).post(api_avatars::create_avatar_handler),
        )
        .route("/api/attendees", post(api_attendees::add_attendees_handler))
        .route("/ws", get(api_ws::ws_handler))
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(Extension(Arc::new(state)))
}
