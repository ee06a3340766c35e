//! HTTP speech synthesis client.
//!
//! Sends SSML to a Cognitive-Services-style REST endpoint and returns the
//! synthesized RIFF/WAV bytes. Both the connect and the overall request are
//! bounded by the configured deadline; a hung backend surfaces as
//! [`VoiceError::SpeechTimeout`], never as a stuck pipeline.

use crate::config::SpeechConfig;
use crate::error::VoiceError;
use std::time::Duration;

/// Maximum text input size for synthesis (64 KiB). Prevents resource
/// exhaustion from oversized requests.
const MAX_SPEECH_INPUT_BYTES: usize = 64 * 1024;

/// Output format requested from the synthesis backend.
const OUTPUT_FORMAT: &str = "riff-16khz-16bit-mono-pcm";

/// Client for the external speech synthesis service.
#[derive(Debug, Clone)]
pub struct SpeechClient {
    config: SpeechConfig,
    http: reqwest::Client,
}

impl SpeechClient {
    /// Creates a client from the given configuration.
    ///
    /// # Errors
    ///
    /// Returns [`VoiceError::Config`] if the endpoint is empty or the HTTP
    /// client cannot be constructed.
    pub fn new(config: SpeechConfig) -> Result<Self, VoiceError> {
        if config.endpoint.is_empty() {
            return Err(VoiceError::Config(
                "speech endpoint is not configured".to_string(),
            ));
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| VoiceError::Config(format!("failed to build http client: {}", e)))?;

        Ok(Self { config, http })
    }

    /// Returns the default language used when a request carries none.
    pub fn default_language(&self) -> &str {
        &self.config.default_language
    }

    /// Synthesizes speech for `text` with the given voice and language.
    ///
    /// Returns RIFF/WAV audio bytes (16 kHz, 16-bit mono PCM).
    pub async fn synthesize(
        &self,
        text: &str,
        voice_code: &str,
        language: &str,
    ) -> Result<Vec<u8>, VoiceError> {
        if text.len() > MAX_SPEECH_INPUT_BYTES {
            return Err(VoiceError::Speech(format!(
                "text exceeds maximum size: {} bytes (limit: {} bytes)",
                text.len(),
                MAX_SPEECH_INPUT_BYTES
            )));
        }

        let body = build_ssml(text, voice_code, language);

        let request = self
            .http
            .post(&self.config.endpoint)
            .header("Ocp-Apim-Subscription-Key", &self.config.api_key)
            .header("Content-Type", "application/ssml+xml")
            .header("X-Microsoft-OutputFormat", OUTPUT_FORMAT)
            .body(body)
            .send();

        let response = tokio::time::timeout(Duration::from_secs(self.config.timeout_secs), request)
            .await
            .map_err(|_| VoiceError::SpeechTimeout(self.config.timeout_secs))?
            .map_err(|e| {
                if e.is_timeout() {
                    VoiceError::SpeechTimeout(self.config.timeout_secs)
                } else {
                    VoiceError::Speech(format!("request failed: {}", e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(VoiceError::Speech(format!(
                "backend returned {}: {}",
                status, detail
            )));
        }

        let audio = response
            .bytes()
            .await
            .map_err(|e| VoiceError::Speech(format!("failed to read audio body: {}", e)))?;

        tracing::debug!(voice = voice_code, bytes = audio.len(), "speech synthesized");
        Ok(audio.to_vec())
    }
}

/// Builds the SSML request body with XML-escaped text.
fn build_ssml(text: &str, voice_code: &str, language: &str) -> String {
    format!(
        "<speak version='1.0' xml:lang='{lang}'>\
         <voice xml:lang='{lang}' name='{voice}'>{text}</voice>\
         </speak>",
        lang = xml_escape(language),
        voice = xml_escape(voice_code),
        text = xml_escape(text),
    )
}

fn xml_escape(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('\'', "&apos;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ssml_escapes_user_text() {
        let ssml = build_ssml("a < b & c", "en-US-JennyNeural", "en-US");
        assert!(ssml.contains("a &lt; b &amp; c"));
        assert!(ssml.contains("name='en-US-JennyNeural'"));
        assert!(!ssml.contains("a < b"));
    }

    #[test]
    fn client_rejects_empty_endpoint() {
        let err = SpeechClient::new(SpeechConfig::default()).expect_err("must reject");
        assert!(matches!(err, VoiceError::Config(_)));
    }

    #[tokio::test]
    async fn oversized_text_is_rejected_before_any_request() {
        let client = SpeechClient::new(SpeechConfig {
            endpoint: "http://127.0.0.1:1/tts".to_string(),
            ..Default::default()
        })
        .expect("client should build");

        let huge = "x".repeat(MAX_SPEECH_INPUT_BYTES + 1);
        let err = client
            .synthesize(&huge, "en-US-JennyNeural", "en-US")
            .await
            .expect_err("oversized input must fail fast");
        assert!(matches!(err, VoiceError::Speech(_)));
    }
}
