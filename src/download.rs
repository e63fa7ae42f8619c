//! Model downloading and on-disk caching
//!
//! Async downloading of the cascade's model files from their `HuggingFace`
//! repository, with streaming writes, SHA256 integrity helpers, and atomic
//! placement (temp file → final location) so a crashed download never leaves
//! a truncated model in the cache.

use crate::error::{PipelineError, Result};
use crate::models::ModelKind;
use futures_util::stream::TryStreamExt;
use reqwest::Client;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio_util::io::StreamReader;

/// Model downloader backed by a local cache directory
#[derive(Debug)]
pub struct ModelDownloader {
    client: Client,
    cache_dir: PathBuf,
}

impl ModelDownloader {
    /// Create a downloader using the platform cache directory
    ///
    /// `model_dir` overrides the default location (useful for tests and for
    /// air-gapped deployments with pre-seeded models).
    ///
    /// # Errors
    /// - Failed to create HTTP client
    /// - No usable cache directory on this platform
    /// - Failed to create the cache directory
    pub fn new(model_dir: Option<PathBuf>) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(300)) // 5 minute timeout
            .build()
            .map_err(|e| PipelineError::network(format!("Failed to create HTTP client: {e}")))?;

        let cache_dir = match model_dir {
            Some(dir) => dir,
            None => dirs::cache_dir()
                .ok_or_else(|| {
                    PipelineError::invalid_config("No cache directory available on this platform")
                })?
                .join("gridcut-bgremove")
                .join("models"),
        };

        fs::create_dir_all(&cache_dir)?;

        Ok(Self { client, cache_dir })
    }

    /// Local path where the given model is (or will be) cached
    #[must_use]
    pub fn model_path(&self, kind: ModelKind) -> PathBuf {
        self.cache_dir.join(kind.file_name())
    }

    /// Whether the given model is already present in the cache
    #[must_use]
    pub fn is_cached(&self, kind: ModelKind) -> bool {
        self.model_path(kind).exists()
    }

    /// Ensure the given model is present locally, downloading if needed
    ///
    /// A cached file is verified against the digest recorded at download
    /// time; on mismatch the corrupt file is discarded and downloaded again.
    /// Returns the path to the cached model file.
    ///
    /// # Errors
    /// - Network errors during download
    /// - File system errors while writing the cache
    pub async fn ensure_model(&self, kind: ModelKind) -> Result<PathBuf> {
        let final_path = self.model_path(kind);
        if final_path.exists() {
            if self.verify_cached(kind)? {
                log::debug!("Model already cached: {}", final_path.display());
                return Ok(final_path);
            }
            log::warn!("Cached {kind} model failed its integrity check, re-downloading");
            fs::remove_file(&final_path)?;
        }

        let url = kind.url();
        log::info!("Downloading {kind} model from: {url}");

        // Download to a temp file in the same directory, then rename into
        // place so readers only ever see complete files.
        let temp_path = self
            .cache_dir
            .join(format!(".tmp-{file}", file = kind.file_name()));

        match self.download_file(&url, &temp_path).await {
            Ok(()) => {
                let digest = Self::file_sha256(&temp_path)?;
                fs::write(self.digest_path(kind), &digest)?;
                fs::rename(&temp_path, &final_path)?;
                log::info!("Successfully downloaded {kind} model (sha256 {digest})");
                Ok(final_path)
            },
            Err(e) => {
                if temp_path.exists() {
                    if let Err(cleanup_err) = fs::remove_file(&temp_path) {
                        log::warn!("Failed to cleanup temp download: {cleanup_err}");
                    }
                }
                Err(e)
            },
        }
    }

    /// Ensure all cascade models are present locally
    ///
    /// # Errors
    /// - Any single model download failing aborts the remainder
    pub async fn ensure_all(&self) -> Result<()> {
        for kind in ModelKind::ALL {
            self.ensure_model(kind).await?;
        }
        Ok(())
    }

    /// Download a single file with a streaming body
    async fn download_file(&self, url: &str, local_path: &Path) -> Result<()> {
        log::debug!("Downloading: {url} -> {path}", path = local_path.display());

        if let Some(parent) = local_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| PipelineError::network(format!("Failed to download {url}: {e}")))?;

        if !response.status().is_success() {
            return Err(PipelineError::network(format!(
                "HTTP error {status} for {url}",
                status = response.status()
            )));
        }

        let mut file = tokio::fs::File::create(local_path).await?;

        let mut stream = StreamReader::new(
            response
                .bytes_stream()
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e)),
        );

        let mut downloaded = 0u64;
        let mut buffer = vec![0; 8192]; // 8KB buffer

        loop {
            let bytes_read = tokio::io::AsyncReadExt::read(&mut stream, &mut buffer)
                .await
                .map_err(|e| {
                    PipelineError::network(format!("Failed to read download stream: {e}"))
                })?;

            if bytes_read == 0 {
                break; // EOF
            }

            file.write_all(buffer.get(..bytes_read).unwrap_or(&[]))
                .await?;

            downloaded += bytes_read as u64;
        }

        file.flush().await?;

        log::debug!(
            "Downloaded {downloaded} bytes to {path}",
            path = local_path.display()
        );
        Ok(())
    }

    /// Compute the SHA256 digest of a cached file as a hex string
    ///
    /// # Errors
    /// - File read errors
    pub fn file_sha256(path: &Path) -> Result<String> {
        let data = fs::read(path)?;
        let mut hasher = Sha256::new();
        hasher.update(&data);
        Ok(format!("{digest:x}", digest = hasher.finalize()))
    }

    /// Sidecar file holding the digest recorded when the model was fetched
    fn digest_path(&self, kind: ModelKind) -> PathBuf {
        self.cache_dir
            .join(format!("{file}.sha256", file = kind.file_name()))
    }

    /// Check a cached model against its recorded digest
    ///
    /// Returns `true` when the digests match or when no digest was recorded
    /// (pre-seeded model directories have none).
    ///
    /// # Errors
    /// - File read errors
    pub fn verify_cached(&self, kind: ModelKind) -> Result<bool> {
        let digest_path = self.digest_path(kind);
        if !digest_path.exists() {
            return Ok(true);
        }

        let expected = fs::read_to_string(&digest_path)?;
        let actual = Self::file_sha256(&self.model_path(kind))?;
        if expected.trim() == actual {
            Ok(true)
        } else {
            log::warn!(
                "Integrity check failed for {path}: expected {expected}, got {actual}",
                path = self.model_path(kind).display(),
                expected = expected.trim()
            );
            Ok(false)
        }
    }

    /// Remove all cached model files and their recorded digests
    ///
    /// # Errors
    /// - File system errors during removal
    pub fn clear_cache(&self) -> Result<()> {
        for kind in ModelKind::ALL {
            for path in [self.model_path(kind), self.digest_path(kind)] {
                if path.exists() {
                    fs::remove_file(&path)?;
                }
            }
        }
        Ok(())
    }
}
