//! Download stage: fetch a URL and persist the bytes as a new artifact.

use async_trait::async_trait;
use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

use super::codec::extension_for;
use super::fetch::Fetcher;
use super::stage::StageTransform;
use crate::error::{PipelineError, PipelineResult};
use crate::types::{DownloadResult, Stage};

/// Extension used when the fetched bytes are not a recognised image format.
const FALLBACK_EXTENSION: &str = "jpg";

/// Fetches one URL per item and writes it into the content directory.
pub struct Downloader {
    fetcher: Arc<dyn Fetcher>,
    storage_dir: PathBuf,
    timeout: Duration,
}

impl Downloader {
    pub fn new(fetcher: Arc<dyn Fetcher>, storage_dir: PathBuf, timeout: Duration) -> Self {
        Self {
            fetcher,
            storage_dir,
            timeout,
        }
    }

    async fn fetch_bounded(&self, url: &str) -> PipelineResult<Vec<u8>> {
        // The fetcher gets the timeout too, but not every implementation honours it.
        match tokio::time::timeout(self.timeout, self.fetcher.fetch(url, self.timeout)).await {
            Ok(result) => result,
            Err(_) => Err(PipelineError::Timeout {
                item: url.to_string(),
                stage: Stage::Download,
                timeout_ms: self.timeout.as_millis() as u64,
            }),
        }
    }
}

#[async_trait]
impl StageTransform for Downloader {
    type Input = String;
    type Output = DownloadResult;

    fn stage(&self) -> Stage {
        Stage::Download
    }

    fn describe(&self, url: &String) -> String {
        url.clone()
    }

    async fn apply(&self, url: String, worker: &str) -> PipelineResult<DownloadResult> {
        let start = Instant::now();
        let bytes = self.fetch_bounded(&url).await?;

        let extension = image::guess_format(&bytes)
            .map(extension_for)
            .unwrap_or(FALLBACK_EXTENSION);
        let stored_path = self.storage_dir.join(artifact_name(worker, extension));

        tokio::fs::create_dir_all(&self.storage_dir)
            .await
            .map_err(|source| PipelineError::Io {
                path: self.storage_dir.clone(),
                source,
            })?;
        tokio::fs::write(&stored_path, &bytes)
            .await
            .map_err(|source| PipelineError::Io {
                path: stored_path.clone(),
                source,
            })?;
        let size_bytes = tokio::fs::metadata(&stored_path)
            .await
            .map_err(|source| PipelineError::Io {
                path: stored_path.clone(),
                source,
            })?
            .len();

        tracing::debug!(
            worker,
            %url,
            size_bytes,
            "Stored {:?}",
            stored_path
        );

        Ok(DownloadResult {
            source_url: url,
            stored_path,
            size_bytes,
            elapsed_ms: start.elapsed().as_millis() as u64,
            worker: worker.to_string(),
            timestamp: Utc::now(),
        })
    }
}

/// `{worker}_{unix_millis}_{random}.{extension}`
fn artifact_name(worker: &str, extension: &str) -> String {
    let nonce = Uuid::new_v4().simple().to_string();
    format!(
        "{worker}_{}_{}.{extension}",
        Utc::now().timestamp_millis(),
        &nonce[..8]
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageFormat};
    use std::io::Cursor;
    use std::path::Path;

    /// Serves fixed bytes for every URL, or fails for URLs containing "broken".
    struct StaticFetcher {
        body: Vec<u8>,
        delay: Duration,
    }

    #[async_trait]
    impl Fetcher for StaticFetcher {
        async fn fetch(&self, url: &str, _timeout: Duration) -> PipelineResult<Vec<u8>> {
            tokio::time::sleep(self.delay).await;
            if url.contains("broken") {
                return Err(PipelineError::HttpStatus {
                    url: url.to_string(),
                    status: 500,
                });
            }
            Ok(self.body.clone())
        }
    }

    fn png_bytes() -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::new_rgb8(8, 8)
            .write_to(&mut buf, ImageFormat::Png)
            .unwrap();
        buf.into_inner()
    }

    fn downloader(dir: &Path, body: Vec<u8>, delay: Duration) -> Downloader {
        Downloader::new(
            Arc::new(StaticFetcher { body, delay }),
            dir.join("downloads"),
            Duration::from_millis(200),
        )
    }

    #[tokio::test]
    async fn test_download_stores_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let body = png_bytes();
        let stage = downloader(dir.path(), body.clone(), Duration::ZERO);

        let result = stage
            .apply("https://example.com/a".to_string(), "download-1")
            .await
            .unwrap();

        assert_eq!(result.source_url, "https://example.com/a");
        assert_eq!(result.size_bytes, body.len() as u64);
        assert_eq!(result.worker, "download-1");
        assert_eq!(std::fs::read(&result.stored_path).unwrap(), body);
        assert!(result.stored_path.starts_with(dir.path().join("downloads")));

        let name = result.stored_path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("download-1_"));
        assert!(name.ends_with(".png"));
    }

    #[tokio::test]
    async fn test_unrecognised_bytes_use_fallback_extension() {
        let dir = tempfile::tempdir().unwrap();
        let stage = downloader(dir.path(), b"opaque".to_vec(), Duration::ZERO);
        let result = stage
            .apply("https://example.com/b".to_string(), "download-0")
            .await
            .unwrap();
        assert_eq!(result.stored_path.extension().unwrap(), "jpg");
    }

    #[tokio::test]
    async fn test_filenames_do_not_collide() {
        let dir = tempfile::tempdir().unwrap();
        let stage = downloader(dir.path(), png_bytes(), Duration::ZERO);
        let a = stage.apply("https://e.com/1".into(), "download-0").await.unwrap();
        let b = stage.apply("https://e.com/2".into(), "download-0").await.unwrap();
        assert_ne!(a.stored_path, b.stored_path);
    }

    #[tokio::test]
    async fn test_fetch_failure_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let stage = downloader(dir.path(), png_bytes(), Duration::ZERO);
        let err = stage
            .apply("https://example.com/broken".to_string(), "download-0")
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::HttpStatus { status: 500, .. }));
        assert!(!dir.path().join("downloads").exists());
    }

    #[tokio::test]
    async fn test_slow_fetch_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let stage = downloader(dir.path(), png_bytes(), Duration::from_secs(5));
        let err = stage
            .apply("https://example.com/slow".to_string(), "download-0")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Timeout {
                stage: Stage::Download,
                timeout_ms: 200,
                ..
            }
        ));
    }
}
