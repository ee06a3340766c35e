//! Subprocess-based lip-sync video generation.
//!
//! The neural lip-sync model runs as an external inference process: audio
//! is staged to a temp file, the wrapper is invoked with the reference
//! image and checkpoint, and the resulting video is read back. The process
//! is GPU-bound and slow, so it runs strictly off the event path with a
//! hard deadline.

use crate::config::LipSyncConfig;
use crate::error::VoiceError;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// Client for the external lip-sync video generator.
#[derive(Debug, Clone)]
pub struct LipSyncClient {
    config: LipSyncConfig,
}

impl LipSyncClient {
    /// Creates a client from the given configuration.
    ///
    /// # Errors
    ///
    /// Returns [`VoiceError::Config`] if the wrapper binary path is empty.
    pub fn new(config: LipSyncConfig) -> Result<Self, VoiceError> {
        if config.binary.as_os_str().is_empty() {
            return Err(VoiceError::Config(
                "lip-sync binary path is not configured".to_string(),
            ));
        }
        Ok(Self { config })
    }

    /// Generates a lip-synced video of `reference_image` speaking `audio`.
    ///
    /// `reference_image` may be absolute or relative to the configured
    /// faces directory. Returns the encoded video bytes.
    pub async fn generate(
        &self,
        reference_image: &str,
        audio: &[u8],
    ) -> Result<Vec<u8>, VoiceError> {
        if !self.config.model_path.exists() {
            return Err(VoiceError::LipSync(format!(
                "model checkpoint not found: {:?} (has the warm-up fetch run?)",
                self.config.model_path
            )));
        }

        let image_path = self.resolve_image(reference_image);
        if !image_path.exists() {
            return Err(VoiceError::LipSync(format!(
                "reference image not found: {:?}",
                image_path
            )));
        }

        // Stage audio in a scratch dir; the dir (and everything in it) is
        // removed when `workdir` drops, including on error paths.
        let workdir = tempfile::tempdir()
            .map_err(|e| VoiceError::LipSync(format!("failed to create temp dir: {}", e)))?;
        let audio_path = workdir.path().join("input.wav");
        let output_path = workdir.path().join("result.mp4");

        tokio::fs::write(&audio_path, audio)
            .await
            .map_err(|e| VoiceError::LipSync(format!("failed to stage audio: {}", e)))?;

        let mut command = Command::new(&self.config.binary);
        command
            .arg("--checkpoint_path")
            .arg(&self.config.model_path)
            .arg("--face")
            .arg(&image_path)
            .arg("--audio")
            .arg(&audio_path)
            .arg("--outfile")
            .arg(&output_path)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // The wait future is dropped on timeout; the child must die
            // with it, not linger as an orphaned GPU job.
            .kill_on_drop(true);

        let child = command
            .spawn()
            .map_err(|e| VoiceError::LipSync(format!("failed to spawn generator: {}", e)))?;

        let deadline = Duration::from_secs(self.config.timeout_secs);
        let output = tokio::time::timeout(deadline, child.wait_with_output())
            .await
            .map_err(|_| VoiceError::LipSyncTimeout(self.config.timeout_secs))?
            .map_err(|e| VoiceError::LipSync(format!("failed to wait for generator: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(VoiceError::LipSync(format!("generator failed: {}", stderr)));
        }

        let video = tokio::fs::read(&output_path)
            .await
            .map_err(|e| VoiceError::LipSync(format!("failed to read output video: {}", e)))?;

        tracing::debug!(image = %image_path.display(), bytes = video.len(), "lip-sync video generated");
        Ok(video)
    }

    fn resolve_image(&self, reference_image: &str) -> PathBuf {
        let path = Path::new(reference_image);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.config.faces_dir.join(path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_rejects_empty_binary() {
        let err = LipSyncClient::new(LipSyncConfig::default()).expect_err("must reject");
        assert!(matches!(err, VoiceError::Config(_)));
    }

    #[tokio::test]
    async fn missing_model_fails_before_spawning() {
        let client = LipSyncClient::new(LipSyncConfig {
            enabled: true,
            binary: PathBuf::from("/usr/bin/true"),
            model_path: PathBuf::from("/nonexistent/model.pth"),
            ..Default::default()
        })
        .expect("client should build");

        let err = client
            .generate("face.jpg", b"RIFF")
            .await
            .expect_err("missing model must fail");
        assert!(matches!(err, VoiceError::LipSync(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn hung_generator_times_out() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().expect("temp dir");
        let script = dir.path().join("slow-generator.sh");
        std::fs::write(&script, "#!/bin/sh\nsleep 30\n").expect("write script");
        let mut perms = std::fs::metadata(&script).expect("stat script").permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&script, perms).expect("chmod script");

        let model = dir.path().join("model.pth");
        std::fs::write(&model, b"weights").expect("write model");
        std::fs::write(dir.path().join("face.jpg"), b"jpeg").expect("write face");

        let client = LipSyncClient::new(LipSyncConfig {
            enabled: true,
            binary: script,
            model_path: model,
            faces_dir: dir.path().to_path_buf(),
            timeout_secs: 1,
            ..Default::default()
        })
        .expect("client should build");

        let err = client
            .generate("face.jpg", b"RIFF")
            .await
            .expect_err("a hung generator must hit the deadline");
        assert!(matches!(err, VoiceError::LipSyncTimeout(1)));
    }

    #[tokio::test]
    async fn missing_reference_image_fails_before_spawning() {
        let model = tempfile::NamedTempFile::new().expect("temp model file");
        let client = LipSyncClient::new(LipSyncConfig {
            enabled: true,
            binary: PathBuf::from("/usr/bin/true"),
            model_path: model.path().to_path_buf(),
            faces_dir: PathBuf::from("/nonexistent/faces"),
            ..Default::default()
        })
        .expect("client should build");

        let err = client
            .generate("ghost.jpg", b"RIFF")
            .await
            .expect_err("missing image must fail");
        assert!(matches!(err, VoiceError::LipSync(_)));
    }
}
