//! Idempotent model artifact fetching for connection warm-up.
//!
//! The lip-sync checkpoint is large and lives in blob storage; it is
//! fetched over HTTP once and cached on disk. Concurrent warm-ups coalesce
//! on a `OnceCell`, so a burst of new connections triggers at most one
//! download.

use crate::error::VoiceError;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::sync::OnceCell;

/// Deadline for the one-time model download.
const FETCH_TIMEOUT: Duration = Duration::from_secs(600);

/// Fetches and caches a model artifact at a local path.
#[derive(Debug)]
pub struct ModelAssets {
    url: String,
    local_path: PathBuf,
    http: reqwest::Client,
    fetched: OnceCell<()>,
}

impl ModelAssets {
    pub fn new(url: impl Into<String>, local_path: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            local_path: local_path.into(),
            http: reqwest::Client::new(),
            fetched: OnceCell::new(),
        }
    }

    /// Returns the local path the artifact is cached at.
    pub fn local_path(&self) -> &Path {
        &self.local_path
    }

    /// Ensures the artifact is present locally, downloading it on first
    /// call. Subsequent calls (and concurrent callers) are no-ops once a
    /// fetch has succeeded; a failed fetch is retried on the next call.
    pub async fn ensure_fetched(&self) -> Result<(), VoiceError> {
        self.fetched
            .get_or_try_init(|| self.fetch())
            .await
            .map(|_| ())
    }

    async fn fetch(&self) -> Result<(), VoiceError> {
        if self.local_path.exists() {
            tracing::info!(path = %self.local_path.display(), "model already present locally");
            return Ok(());
        }

        if self.url.is_empty() {
            return Err(VoiceError::Config(
                "model_url is not configured and the model is not present locally".to_string(),
            ));
        }

        tracing::info!(url = %self.url, path = %self.local_path.display(), "downloading model artifact");

        if let Some(parent) = self.local_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| VoiceError::Asset(format!("failed to create model dir: {}", e)))?;
        }

        let response = tokio::time::timeout(FETCH_TIMEOUT, self.http.get(&self.url).send())
            .await
            .map_err(|_| VoiceError::Asset("model download timed out".to_string()))?
            .map_err(|e| VoiceError::Asset(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(VoiceError::Asset(format!("backend returned {}", status)));
        }

        // Stream to a sibling temp file, then rename: a crashed download
        // must not leave a truncated file that later passes the exists()
        // check.
        let tmp_path = self.local_path.with_extension("download");
        let mut file = tokio::fs::File::create(&tmp_path)
            .await
            .map_err(|e| VoiceError::Asset(format!("failed to create temp file: {}", e)))?;

        let mut stream = response;
        while let Some(chunk) = stream
            .chunk()
            .await
            .map_err(|e| VoiceError::Asset(format!("download interrupted: {}", e)))?
        {
            file.write_all(&chunk)
                .await
                .map_err(|e| VoiceError::Asset(format!("failed to write model file: {}", e)))?;
        }
        file.flush()
            .await
            .map_err(|e| VoiceError::Asset(format!("failed to flush model file: {}", e)))?;
        drop(file);

        tokio::fs::rename(&tmp_path, &self.local_path)
            .await
            .map_err(|e| VoiceError::Asset(format!("failed to move model into place: {}", e)))?;

        tracing::info!(path = %self.local_path.display(), "model downloaded and saved locally");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn present_file_skips_download() {
        let file = tempfile::NamedTempFile::new().expect("temp file");
        let assets = ModelAssets::new("", file.path());

        assets
            .ensure_fetched()
            .await
            .expect("existing file needs no download");
    }

    #[tokio::test]
    async fn missing_file_without_url_is_config_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let assets = ModelAssets::new("", dir.path().join("model.pth"));

        let err = assets.ensure_fetched().await.expect_err("must fail");
        assert!(matches!(err, VoiceError::Config(_)));
    }

    #[tokio::test]
    async fn successful_check_is_cached() {
        let file = tempfile::NamedTempFile::new().expect("temp file");
        let assets = ModelAssets::new("", file.path());

        assets.ensure_fetched().await.expect("first call succeeds");
        // Second call hits the OnceCell, not the filesystem.
        assets.ensure_fetched().await.expect("second call succeeds");
    }
}
