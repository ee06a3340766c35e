//! WebSocket conferencing gateway.
//!
//! Maps transport-level connection events (connect, join, leave,
//! disconnect, message) onto the room registry, mic coordinator, and
//! synthesis pipeline, and fans outbound events back to connections.
//!
//! Each connection gets a bounded outbound channel; a slow consumer drops
//! messages rather than stalling the whole room.

use crate::AppState;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Extension,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;
use voxrelay_rooms::{ConnectionId, JoinOutcome, MicDecision, MicRelease, RoomRegistry};

/// Outbound channel capacity per connection. A full queue drops messages
/// for that connection only.
const OUTBOUND_QUEUE_CAPACITY: usize = 256;

/// Maximum accepted transcription text size in bytes.
const MAX_TRANSCRIPTION_BYTES: usize = 2048;

/// Messages a client may send over the WebSocket.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum IncomingMessage {
    /// Enter a room, creating it if this is the first participant.
    Join {
        room_code: String,
        display_name: String,
    },
    /// Leave a room explicitly.
    Leave { room_code: String },
    /// Request exclusive speaking rights.
    HoldMic { room_code: String },
    /// Give up speaking rights.
    ReleaseMic { room_code: String },
    /// Submit transcribed speech for synthesis and broadcast.
    Transcription {
        room_code: String,
        text: String,
        #[serde(default)]
        language: Option<String>,
    },
}

/// Messages the server sends to clients.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum OutgoingMessage {
    /// A participant entered the room. Broadcast, including to the joiner.
    UserJoined { display_name: String },
    /// A participant left the room (explicitly or by disconnect).
    UserLeft { display_name: String },
    /// Speaking rights were granted. Broadcast to the room.
    MicGranted { display_name: String },
    /// Speaking rights were released. Broadcast to the room.
    MicReleased { display_name: String },
    /// The room's active speaker changed; `None` means the mic is idle.
    ActiveSpeaker { display_name: Option<String> },
    /// A hold request was denied. Sent to the requester only.
    MicDenied { current_holder: String },
    /// Live caption for an accepted transcription. Broadcast.
    Transcription { display_name: String, text: String },
    /// Synthesized speech for the most recent transcription, base64 WAV.
    SynthesizedAudio { display_name: String, audio: String },
    /// Lip-synced avatar video for the most recent audio, base64 MP4.
    LipSyncComplete { display_name: String, video: String },
    /// Request-level failure notice. Sent to the affected connection only.
    Error { message: String },
}

/// Registry of live WebSocket connections and their outbound queues.
#[derive(Debug, Clone, Default)]
pub struct ConnectionManager {
    senders: Arc<RwLock<HashMap<ConnectionId, mpsc::Sender<String>>>>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, connection_id: ConnectionId, sender: mpsc::Sender<String>) {
        self.senders.write().await.insert(connection_id, sender);
    }

    pub async fn unregister(&self, connection_id: ConnectionId) {
        self.senders.write().await.remove(&connection_id);
    }

    pub async fn connection_count(&self) -> usize {
        self.senders.read().await.len()
    }

    /// Queues a serialized message for one connection. Drops the message if
    /// the connection is gone or its queue is full.
    pub async fn send_raw(&self, connection_id: ConnectionId, text: String) {
        let senders = self.senders.read().await;
        let Some(sender) = senders.get(&connection_id) else {
            return;
        };
        if let Err(e) = sender.try_send(text) {
            tracing::warn!(connection = %connection_id, "dropping outbound message: {}", e);
        }
    }
}

fn encode(message: &OutgoingMessage) -> Option<String> {
    match serde_json::to_string(message) {
        Ok(text) => Some(text),
        Err(e) => {
            tracing::error!("failed to serialize outbound message: {}", e);
            None
        }
    }
}

/// Sends a message to a single connection.
pub async fn send_to(
    connections: &ConnectionManager,
    connection_id: ConnectionId,
    message: &OutgoingMessage,
) {
    if let Some(text) = encode(message) {
        connections.send_raw(connection_id, text).await;
    }
}

/// Sends a message to every participant of a room. A room that no longer
/// exists has no targets, so the message evaporates.
pub async fn broadcast_to_room(
    registry: &RoomRegistry,
    connections: &ConnectionManager,
    room_code: &str,
    message: &OutgoingMessage,
) {
    let Some(text) = encode(message) else {
        return;
    };
    for participant in registry.participants(room_code) {
        connections
            .send_raw(participant.connection_id, text.clone())
            .await;
    }
}

/// WebSocket upgrade handler. Assigns the connection its identity and may
/// kick off the one-time model warm-up.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Extension(state): Extension<Arc<AppState>>,
) -> impl IntoResponse {
    let connection_id = Uuid::new_v4();

    // Connect carries no room side effects, but it is the natural moment
    // to make sure the lip-sync model is on disk before anyone speaks.
    if let Some(assets) = state.assets.clone() {
        tokio::spawn(async move {
            if let Err(e) = assets.ensure_fetched().await {
                tracing::error!("model warm-up failed: {}", e);
            }
        });
    }

    ws.on_upgrade(move |socket| handle_socket(socket, state, connection_id))
}

/// Runs one WebSocket connection to completion.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>, connection_id: ConnectionId) {
    tracing::info!(connection = %connection_id, "websocket connected");

    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (tx, mut rx) = mpsc::channel::<String>(OUTBOUND_QUEUE_CAPACITY);
    state.connections.register(connection_id, tx).await;

    let mut send_task = tokio::spawn(async move {
        while let Some(text) = rx.recv().await {
            if ws_sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    loop {
        tokio::select! {
            incoming = ws_receiver.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<IncomingMessage>(&text) {
                            Ok(event) => handle_event(&state, connection_id, event).await,
                            Err(e) => {
                                tracing::debug!(connection = %connection_id, "unparseable message: {}", e);
                                send_to(
                                    &state.connections,
                                    connection_id,
                                    &OutgoingMessage::Error {
                                        message: "Unrecognized message".to_string(),
                                    },
                                )
                                .await;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {} // ping/pong handled by axum, binary ignored
                    Some(Err(e)) => {
                        tracing::debug!(connection = %connection_id, "websocket error: {}", e);
                        break;
                    }
                }
            }
            _ = &mut send_task => break,
        }
    }

    send_task.abort();
    handle_disconnect(&state, connection_id).await;
    tracing::info!(connection = %connection_id, "websocket disconnected");
}

/// Dispatches one parsed inbound event.
pub async fn handle_event(state: &AppState, connection_id: ConnectionId, event: IncomingMessage) {
    match event {
        IncomingMessage::Join {
            room_code,
            display_name,
        } => {
            let outcome = state.registry.join(&room_code, connection_id, &display_name);
            if outcome == JoinOutcome::Joined {
                broadcast_to_room(
                    &state.registry,
                    &state.connections,
                    &room_code,
                    &OutgoingMessage::UserJoined { display_name },
                )
                .await;
            }
        }

        IncomingMessage::Leave { room_code } => {
            // Membership removal and mic release are one registry
            // operation, so the departure already says whether a mic
            // broadcast is due.
            if let Some(departure) = state.registry.leave(&room_code, connection_id) {
                if !departure.room_deleted {
                    if let Some(display_name) = departure.mic_released {
                        broadcast_to_room(
                            &state.registry,
                            &state.connections,
                            &room_code,
                            &OutgoingMessage::MicReleased { display_name },
                        )
                        .await;
                        broadcast_to_room(
                            &state.registry,
                            &state.connections,
                            &room_code,
                            &OutgoingMessage::ActiveSpeaker { display_name: None },
                        )
                        .await;
                    }
                    broadcast_to_room(
                        &state.registry,
                        &state.connections,
                        &room_code,
                        &OutgoingMessage::UserLeft {
                            display_name: departure.display_name,
                        },
                    )
                    .await;
                }
            }
        }

        IncomingMessage::HoldMic { room_code } => {
            match state.mic.request_hold(&room_code, connection_id) {
                MicDecision::Granted { display_name } => {
                    broadcast_to_room(
                        &state.registry,
                        &state.connections,
                        &room_code,
                        &OutgoingMessage::MicGranted {
                            display_name: display_name.clone(),
                        },
                    )
                    .await;
                    broadcast_to_room(
                        &state.registry,
                        &state.connections,
                        &room_code,
                        &OutgoingMessage::ActiveSpeaker {
                            display_name: Some(display_name),
                        },
                    )
                    .await;
                }
                MicDecision::Denied { current_holder } => {
                    send_to(
                        &state.connections,
                        connection_id,
                        &OutgoingMessage::MicDenied { current_holder },
                    )
                    .await;
                }
                MicDecision::NotInRoom => {
                    send_to(
                        &state.connections,
                        connection_id,
                        &OutgoingMessage::Error {
                            message: format!("Not a participant of room {}", room_code),
                        },
                    )
                    .await;
                }
            }
        }

        IncomingMessage::ReleaseMic { room_code } => {
            if let MicRelease::Released { display_name } =
                state.mic.release(&room_code, connection_id)
            {
                broadcast_to_room(
                    &state.registry,
                    &state.connections,
                    &room_code,
                    &OutgoingMessage::MicReleased { display_name },
                )
                .await;
                broadcast_to_room(
                    &state.registry,
                    &state.connections,
                    &room_code,
                    &OutgoingMessage::ActiveSpeaker { display_name: None },
                )
                .await;
            }
        }

        IncomingMessage::Transcription {
            room_code,
            text,
            language,
        } => {
            if text.trim().is_empty() || text.len() > MAX_TRANSCRIPTION_BYTES {
                send_to(
                    &state.connections,
                    connection_id,
                    &OutgoingMessage::Error {
                        message: format!(
                            "Transcription text must be 1..={} bytes",
                            MAX_TRANSCRIPTION_BYTES
                        ),
                    },
                )
                .await;
                return;
            }

            let Some(display_name) = state
                .registry
                .participants(&room_code)
                .into_iter()
                .find(|p| p.connection_id == connection_id)
                .map(|p| p.display_name)
            else {
                send_to(
                    &state.connections,
                    connection_id,
                    &OutgoingMessage::Error {
                        message: format!("Not a participant of room {}", room_code),
                    },
                )
                .await;
                return;
            };

            // The busy check and all broadcasting happen inside the
            // pipeline; spawning keeps this connection's read loop free
            // while synthesis runs.
            let pipeline = Arc::clone(&state.pipeline);
            tokio::spawn(async move {
                pipeline
                    .handle_transcription(
                        &room_code,
                        connection_id,
                        &display_name,
                        &text,
                        language.as_deref(),
                    )
                    .await;
            });
        }
    }
}

/// Cleans up after a closed connection: membership across all rooms, the
/// mic if it held one, and the outbound queue.
pub async fn handle_disconnect(state: &AppState, connection_id: ConnectionId) {
    let exits = state.registry.remove_connection(connection_id);

    for exit in exits {
        if exit.room_deleted {
            continue;
        }

        if let Some(display_name) = exit.mic_released {
            broadcast_to_room(
                &state.registry,
                &state.connections,
                &exit.room_code,
                &OutgoingMessage::MicReleased { display_name },
            )
            .await;
            broadcast_to_room(
                &state.registry,
                &state.connections,
                &exit.room_code,
                &OutgoingMessage::ActiveSpeaker { display_name: None },
            )
            .await;
        }

        broadcast_to_room(
            &state.registry,
            &state.connections,
            &exit.room_code,
            &OutgoingMessage::UserLeft {
                display_name: exit.display_name,
            },
        )
        .await;
    }

    state.connections.unregister(connection_id).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incoming_messages_parse_from_wire_form() {
        let join: IncomingMessage = serde_json::from_str(
            r#"{"type":"join","roomCode":"R1","displayName":"Alice"}"#,
        )
        .unwrap();
        match join {
            IncomingMessage::Join {
                room_code,
                display_name,
            } => {
                assert_eq!(room_code, "R1");
                assert_eq!(display_name, "Alice");
            }
            other => panic!("unexpected variant: {:?}", other),
        }

        let transcription: IncomingMessage = serde_json::from_str(
            r#"{"type":"transcription","roomCode":"R1","text":"hello"}"#,
        )
        .unwrap();
        match transcription {
            IncomingMessage::Transcription { language, .. } => assert!(language.is_none()),
            other => panic!("unexpected variant: {:?}", other),
        }
    }

    #[test]
    fn outgoing_messages_use_camel_case_tags() {
        let text = serde_json::to_string(&OutgoingMessage::MicDenied {
            current_holder: "Alice".to_string(),
        })
        .unwrap();
        assert_eq!(text, r#"{"type":"micDenied","currentHolder":"Alice"}"#);

        let idle = serde_json::to_string(&OutgoingMessage::ActiveSpeaker { display_name: None })
            .unwrap();
        assert_eq!(idle, r#"{"type":"activeSpeaker","displayName":null}"#);
    }
}
