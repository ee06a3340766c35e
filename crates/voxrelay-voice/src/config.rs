use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

fn default_speech_timeout_secs() -> u64 {
    30
}

fn default_lipsync_timeout_secs() -> u64 {
    120
}

fn default_language() -> String {
    "en-US".to_string()
}

/// Configuration for the HTTP speech synthesis service.
#[derive(Clone, Serialize, Deserialize)]
pub struct SpeechConfig {
    /// Synthesis endpoint URL (e.g. an Azure Cognitive Services region
    /// endpoint: `https://eastus.tts.speech.microsoft.com/cognitiveservices/v1`).
    pub endpoint: String,
    #[serde(skip_serializing)]
    pub api_key: String,
    /// Default synthesis language when a request does not carry one.
    #[serde(default = "default_language")]
    pub default_language: String,
    /// Deadline for one synthesis request, in seconds.
    #[serde(default = "default_speech_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            api_key: String::new(),
            default_language: default_language(),
            timeout_secs: default_speech_timeout_secs(),
        }
    }
}

impl fmt::Debug for SpeechConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpeechConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"[REDACTED]")
            .field("default_language", &self.default_language)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Configuration for the subprocess-based lip-sync video generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LipSyncConfig {
    /// Whether avatar video generation is enabled at all.
    #[serde(default)]
    pub enabled: bool,
    /// Path to the inference wrapper binary/script.
    #[serde(default)]
    pub binary: PathBuf,
    /// Local path where the model checkpoint lives (or is downloaded to).
    #[serde(default = "default_model_path")]
    pub model_path: PathBuf,
    /// HTTP URL the model checkpoint is fetched from at warm-up.
    #[serde(default)]
    pub model_url: String,
    /// Directory containing avatar reference images.
    #[serde(default = "default_faces_dir")]
    pub faces_dir: PathBuf,
    /// Deadline for one video generation, in seconds.
    #[serde(default = "default_lipsync_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_model_path() -> PathBuf {
    PathBuf::from("assets/models/wav2lip_gan.pth")
}

fn default_faces_dir() -> PathBuf {
    PathBuf::from("assets/faces")
}

impl Default for LipSyncConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            binary: PathBuf::new(),
            model_path: default_model_path(),
            model_url: String::new(),
            faces_dir: default_faces_dir(),
            timeout_secs: default_lipsync_timeout_secs(),
        }
    }
}
