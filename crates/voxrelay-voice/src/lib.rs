//! External voice collaborators for the voxrelay platform.
//!
//! The relay core never synthesizes audio or video itself; it talks to
//! opaque services with bounded deadlines. This crate holds those clients:
//! an HTTP speech synthesis client (`SpeechClient`), a subprocess-based
//! lip-sync video generator (`LipSyncClient`), and the idempotent model
//! artifact fetcher (`ModelAssets`) used for connection warm-up.
//!
//! Every call either completes within its deadline or fails — an unbounded
//! external call must never wedge a room's speaking pipeline.

pub mod assets;
pub mod config;
pub mod error;
pub mod lipsync;
pub mod speech;

pub use assets::ModelAssets;
pub use config::{LipSyncConfig, SpeechConfig};
pub use error::VoiceError;
pub use lipsync::LipSyncClient;
pub use speech::SpeechClient;
