//! The transcription → audio → video synthesis pipeline.
//!
//! Converts one transcription event into synthesized audio (and, when an
//! avatar is configured, a lip-synced video), broadcasting results to the
//! room. The per-room in-flight claim taken at the start guarantees that
//! no two synthesis operations overlap within a room, while rooms remain
//! fully independent of each other.
//!
//! The external collaborators sit behind small trait seams so tests can
//! substitute them; the live wiring uses [`SpeechClient`],
//! [`LipSyncClient`], and the database-backed voice directory.

use crate::api_ws::{broadcast_to_room, send_to, ConnectionManager, OutgoingMessage};
use base64::Engine;
use std::future::Future;
use voxrelay_db::DbPool;
use voxrelay_rooms::{ConnectionId, RoomRegistry, SynthesisClaim, SynthesisGuard};
use voxrelay_types::VoiceRef;
use voxrelay_voice::{LipSyncClient, SpeechClient, VoiceError};

/// Resolves the voice configuration for a room code.
///
/// Absence of a mapping is an expected per-request failure; backend errors
/// are logged by the implementation and surface as `None` as well.
pub trait ResolveVoice {
    fn resolve_voice(&self, room_code: &str) -> impl Future<Output = Option<VoiceRef>> + Send;
}

/// Turns text into audio bytes with a bounded deadline.
pub trait SynthesizeSpeech {
    fn synthesize(
        &self,
        text: &str,
        voice_code: &str,
        language: &str,
    ) -> impl Future<Output = Result<Vec<u8>, VoiceError>> + Send;

    /// Language used when a transcription does not carry one.
    fn default_language(&self) -> &str;
}

/// Turns a reference image plus audio into video bytes with a bounded
/// deadline.
pub trait GenerateLipSync {
    fn generate(
        &self,
        reference_image: &str,
        audio: &[u8],
    ) -> impl Future<Output = Result<Vec<u8>, VoiceError>> + Send;
}

impl SynthesizeSpeech for SpeechClient {
    fn synthesize(
        &self,
        text: &str,
        voice_code: &str,
        language: &str,
    ) -> impl Future<Output = Result<Vec<u8>, VoiceError>> + Send {
        SpeechClient::synthesize(self, text, voice_code, language)
    }

    fn default_language(&self) -> &str {
        SpeechClient::default_language(self)
    }
}

impl GenerateLipSync for LipSyncClient {
    fn generate(
        &self,
        reference_image: &str,
        audio: &[u8],
    ) -> impl Future<Output = Result<Vec<u8>, VoiceError>> + Send {
        LipSyncClient::generate(self, reference_image, audio)
    }
}

/// Voice directory backed by the session/avatar store.
#[derive(Debug, Clone)]
pub struct DbVoiceDirectory {
    pool: DbPool,
}

impl DbVoiceDirectory {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

impl ResolveVoice for DbVoiceDirectory {
    fn resolve_voice(&self, room_code: &str) -> impl Future<Output = Option<VoiceRef>> + Send {
        let pool = self.pool.clone();
        let code = room_code.to_string();
        async move {
            let result = tokio::task::spawn_blocking(move || {
                let conn = pool.get().map_err(|e| format!("pool error: {}", e))?;
                voxrelay_db::resolve_voice(&conn, &code).map_err(|e| format!("db error: {}", e))
            })
            .await;

            match result {
                Ok(Ok(voice)) => voice,
                Ok(Err(e)) => {
                    tracing::error!("voice lookup failed: {}", e);
                    None
                }
                Err(e) => {
                    tracing::error!("voice lookup task failed: {}", e);
                    None
                }
            }
        }
    }
}

/// Orchestrates transcription → speech → (optional) lip-sync → broadcast,
/// serialized per room by the registry's synthesis claim.
pub struct SynthesisPipeline<D, S, L> {
    registry: RoomRegistry,
    connections: ConnectionManager,
    directory: D,
    speech: S,
    lipsync: Option<L>,
}

impl<D, S, L> SynthesisPipeline<D, S, L>
where
    D: ResolveVoice,
    S: SynthesizeSpeech,
    L: GenerateLipSync,
{
    pub fn new(
        registry: RoomRegistry,
        connections: ConnectionManager,
        directory: D,
        speech: S,
        lipsync: Option<L>,
    ) -> Self {
        Self {
            registry,
            connections,
            directory,
            speech,
            lipsync,
        }
    }

    /// Handles one transcription event end to end.
    ///
    /// Rejects with a busy notice if a synthesis operation is already in
    /// flight for the room — never queued, never silently dropped. On
    /// acceptance the caption is broadcast immediately, before any audio
    /// exists, so participants see the live text without waiting on the
    /// backends.
    pub async fn handle_transcription(
        &self,
        room_code: &str,
        sender: ConnectionId,
        display_name: &str,
        text: &str,
        language: Option<&str>,
    ) {
        let guard = match self.registry.begin_synthesis(room_code) {
            SynthesisClaim::Started(guard) => guard,
            SynthesisClaim::Busy => {
                tracing::debug!(room = room_code, user = display_name, "synthesis busy");
                send_to(
                    &self.connections,
                    sender,
                    &OutgoingMessage::Error {
                        message: "Synthesis already in progress for this room, try again shortly"
                            .to_string(),
                    },
                )
                .await;
                return;
            }
            SynthesisClaim::RoomNotFound => {
                send_to(
                    &self.connections,
                    sender,
                    &OutgoingMessage::Error {
                        message: format!("Unknown room: {}", room_code),
                    },
                )
                .await;
                return;
            }
        };

        self.run(guard, room_code, sender, display_name, text, language)
            .await;
    }

    /// Runs one accepted synthesis attempt. The claim guard travels through
    /// the whole attempt and clears the in-flight flag when dropped — on
    /// success, on failure, and on panic alike.
    async fn run(
        &self,
        _guard: SynthesisGuard,
        room_code: &str,
        sender: ConnectionId,
        display_name: &str,
        text: &str,
        language: Option<&str>,
    ) {
        let language = language.unwrap_or_else(|| self.speech.default_language());

        // Live caption first: participants see the text before audio is ready.
        broadcast_to_room(
            &self.registry,
            &self.connections,
            room_code,
            &OutgoingMessage::Transcription {
                display_name: display_name.to_string(),
                text: text.to_string(),
            },
        )
        .await;

        let Some(voice) = self.directory.resolve_voice(room_code).await else {
            tracing::warn!(room = room_code, "no voice configured for room");
            send_to(
                &self.connections,
                sender,
                &OutgoingMessage::Error {
                    message: format!("No voice configured for room {}", room_code),
                },
            )
            .await;
            return;
        };

        let audio = match self
            .speech
            .synthesize(text, &voice.voice_code, language)
            .await
        {
            Ok(audio) => audio,
            Err(e) => {
                tracing::warn!(room = room_code, "speech synthesis failed: {}", e);
                send_to(
                    &self.connections,
                    sender,
                    &OutgoingMessage::Error {
                        message: "Speech synthesis failed".to_string(),
                    },
                )
                .await;
                return;
            }
        };

        broadcast_to_room(
            &self.registry,
            &self.connections,
            room_code,
            &OutgoingMessage::SynthesizedAudio {
                display_name: display_name.to_string(),
                audio: base64::engine::general_purpose::STANDARD.encode(&audio),
            },
        )
        .await;

        // Audio delivery stands regardless of what happens to the video.
        let Some(lipsync) = &self.lipsync else {
            return;
        };

        match lipsync.generate(&voice.avatar_img, &audio).await {
            Ok(video) => {
                broadcast_to_room(
                    &self.registry,
                    &self.connections,
                    room_code,
                    &OutgoingMessage::LipSyncComplete {
                        display_name: display_name.to_string(),
                        video: base64::engine::general_purpose::STANDARD.encode(&video),
                    },
                )
                .await;
            }
            Err(e) => {
                tracing::warn!(room = room_code, "lip-sync generation failed: {}", e);
                send_to(
                    &self.connections,
                    sender,
                    &OutgoingMessage::Error {
                        message: "Failed to generate lip-synced video".to_string(),
                    },
                )
                .await;
            }
        }
    }
}
