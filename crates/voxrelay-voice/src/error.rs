use thiserror::Error;

#[derive(Error, Debug)]
pub enum VoiceError {
    #[error("speech synthesis failed: {0}")]
    Speech(String),

    #[error("speech synthesis timed out after {0} seconds")]
    SpeechTimeout(u64),

    #[error("lip-sync generation failed: {0}")]
    LipSync(String),

    #[error("lip-sync generation timed out after {0} seconds")]
    LipSyncTimeout(u64),

    #[error("model asset fetch failed: {0}")]
    Asset(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}
