//! Resize stage: scale an artifact to a fixed width, keeping its aspect ratio.

use async_trait::async_trait;
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::time::Instant;

use super::codec::{derived_path, extension_for, ImageCodec};
use super::stage::StageTransform;
use crate::error::{PipelineError, PipelineResult};
use crate::types::{Dimensions, ResizeResult, Stage};

/// Resizes each artifact to `target_width`, writing `{stem}_resized.{ext}`.
pub struct Resizer {
    target_width: u32,
}

impl Resizer {
    pub fn new(target_width: u32) -> Self {
        Self { target_width }
    }
}

/// Height that keeps the aspect ratio at `target_width`, rounded to the
/// nearest pixel and never below 1.
///
/// Returns `None` for a zero-width source.
pub fn proportional_height(width: u32, height: u32, target_width: u32) -> Option<u32> {
    if width == 0 {
        return None;
    }
    let scaled = (height as f64 * target_width as f64 / width as f64).round();
    Some(scaled.max(1.0) as u32)
}

fn resize_file(path: &Path, target_width: u32) -> PipelineResult<(PathBuf, Dimensions, Dimensions)> {
    let decoded = ImageCodec::open(path)?;
    let original = decoded.dimensions();

    let new_height = match proportional_height(original.width, original.height, target_width) {
        Some(h) if original.height > 0 => h,
        _ => {
            return Err(PipelineError::InvalidDimensions {
                path: path.to_path_buf(),
                width: original.width,
                height: original.height,
            })
        }
    };
    let resized_dims = Dimensions::new(target_width, new_height);
    let resized = ImageCodec::resize(&decoded.image, resized_dims);

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_else(|| extension_for(decoded.format));
    let output_path = derived_path(path, "resized", extension);
    ImageCodec::save(&resized, &output_path, decoded.format)?;

    Ok((output_path, original, resized_dims))
}

#[async_trait]
impl StageTransform for Resizer {
    type Input = PathBuf;
    type Output = ResizeResult;

    fn stage(&self) -> Stage {
        Stage::Resize
    }

    fn describe(&self, path: &PathBuf) -> String {
        path.display().to_string()
    }

    async fn apply(&self, path: PathBuf, worker: &str) -> PipelineResult<ResizeResult> {
        let start = Instant::now();
        let target_width = self.target_width;
        let source = path.clone();

        let (output_path, original, resized) =
            tokio::task::spawn_blocking(move || resize_file(&source, target_width))
                .await
                .map_err(|e| PipelineError::Panicked {
                    item: path.display().to_string(),
                    message: format!("Task join error: {}", e),
                })??;

        tracing::debug!(worker, "Resized {:?} {} -> {}", path, original, resized);

        Ok(ResizeResult {
            source_path: path,
            output_path,
            original,
            resized,
            elapsed_ms: start.elapsed().as_millis() as u64,
            worker: worker.to_string(),
            timestamp: Utc::now(),
        })
    }
}
