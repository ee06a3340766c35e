//! HTTP surface tests: health, session booking/validation, avatars, and
//! attendee recording.

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;
use voxrelay_server::{app, AppState};
use voxrelay_voice::{SpeechClient, SpeechConfig};

fn test_app(dir: &tempfile::TempDir) -> axum::Router {
    let db_path = dir.path().join("http_test.db");
    let pool = voxrelay_db::create_pool(
        db_path.to_str().expect("utf-8 temp path"),
        voxrelay_db::PoolSettings::default(),
    )
    .expect("pool should open");
    {
        let conn = pool.get().expect("connection should be available");
        voxrelay_db::run_migrations(&conn).expect("migrations should succeed");
    }

    let speech = SpeechClient::new(SpeechConfig {
        endpoint: "http://127.0.0.1:1/tts".to_string(),
        api_key: "test-key".to_string(),
        ..Default::default()
    })
    .expect("client should build");

    app(AppState::new(pool, speech, None, None))
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should be readable");
    serde_json::from_slice(&bytes).expect("body should be JSON")
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request should build")
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("request should build")
}

#[tokio::test]
async fn health_reports_ok() {
    let dir = tempfile::tempdir().expect("tempdir");
    let app = test_app(&dir);

    let response = app.oneshot(get("/health")).await.expect("request succeeds");
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn session_lifecycle_create_conflict_validate() {
    let dir = tempfile::tempdir().expect("tempdir");
    let app = test_app(&dir);

    // An avatar must exist for the session to reference.
    let response = app
        .clone()
        .oneshot(post(
            "/api/avatars",
            json!({
                "avatarName": "Jenny",
                "avatarImg": "faces/jenny.jpg",
                "voiceCode": "en-US-JennyNeural"
            }),
        ))
        .await
        .expect("request succeeds");
    assert_eq!(response.status(), StatusCode::CREATED);
    let avatar = body_json(response).await;
    let avatar_id = avatar["avatarId"].as_i64().expect("avatarId assigned");

    let session = json!({
        "sessionId": "room-42",
        "jobId": "job-7",
        "avatarId": avatar_id
    });
    let response = app
        .clone()
        .oneshot(post("/api/sessions", session.clone()))
        .await
        .expect("request succeeds");
    assert_eq!(response.status(), StatusCode::CREATED);

    // The session id is the room code clients join; a duplicate booking is
    // a conflict, not a silent overwrite.
    let response = app
        .clone()
        .oneshot(post("/api/sessions", session))
        .await
        .expect("request succeeds");
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = app
        .clone()
        .oneshot(get("/api/sessions/room-42/validate"))
        .await
        .expect("request succeeds");
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["jobId"], "job-7");
    assert_eq!(body["avatar"]["voiceCode"], "en-US-JennyNeural");

    let response = app
        .oneshot(get("/api/sessions/no-such-room/validate"))
        .await
        .expect("request succeeds");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn avatar_listing_reflects_creations() {
    let dir = tempfile::tempdir().expect("tempdir");
    let app = test_app(&dir);

    let response = app
        .clone()
        .oneshot(get("/api/avatars"))
        .await
        .expect("request succeeds");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!([]));

    let response = app
        .clone()
        .oneshot(post(
            "/api/avatars",
            json!({
                "avatarName": "Elvira",
                "avatarImg": "faces/elvira.jpg",
                "voiceCode": "es-ES-ElviraNeural"
            }),
        ))
        .await
        .expect("request succeeds");
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .oneshot(get("/api/avatars"))
        .await
        .expect("request succeeds");
    let avatars = body_json(response).await;
    assert_eq!(avatars.as_array().map(Vec::len), Some(1));
    assert_eq!(avatars[0]["avatarName"], "Elvira");
}

#[tokio::test]
async fn avatar_creation_validates_input() {
    let dir = tempfile::tempdir().expect("tempdir");
    let app = test_app(&dir);

    let response = app
        .oneshot(post(
            "/api/avatars",
            json!({
                "avatarName": "",
                "avatarImg": "faces/x.jpg",
                "voiceCode": "en-US-JennyNeural"
            }),
        ))
        .await
        .expect("request succeeds");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn attendees_are_recorded_with_default_join_time() {
    let dir = tempfile::tempdir().expect("tempdir");
    let app = test_app(&dir);

    let response = app
        .clone()
        .oneshot(post(
            "/api/attendees",
            json!([
                {"userName": "Alice", "sessionId": "room-42", "designation": "interpreter"},
                {"userName": "Bob", "sessionId": "room-42", "joinTime": "2026-01-05T09:00:00Z", "designation": "client"}
            ]),
        ))
        .await
        .expect("request succeeds");
    assert_eq!(response.status(), StatusCode::CREATED);
    let recorded = body_json(response).await;
    assert!(!recorded[0]["joinTime"].as_str().unwrap().is_empty());
    assert_eq!(recorded[1]["joinTime"], "2026-01-05T09:00:00Z");

    let response = app
        .oneshot(post("/api/attendees", json!([])))
        .await
        .expect("request succeeds");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
