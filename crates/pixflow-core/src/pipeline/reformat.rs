//! Reformat stage: re-encode every artifact as PNG.

use async_trait::async_trait;
use chrono::Utc;
use image::{DynamicImage, ImageFormat};
use std::path::{Path, PathBuf};
use std::time::Instant;

use super::codec::{derived_path, format_to_string, DecodedImage, ImageCodec};
use super::stage::StageTransform;
use crate::error::{PipelineError, PipelineResult};
use crate::types::{ReformatResult, Stage};

/// Encoding every artifact ends up in.
pub const CANONICAL_FORMAT: ImageFormat = ImageFormat::Png;

/// Converts artifacts to [`CANONICAL_FORMAT`], skipping ones already in it.
#[derive(Debug, Default)]
pub struct Reformatter;

impl Reformatter {
    pub fn new() -> Self {
        Self
    }
}

struct Converted {
    output_path: PathBuf,
    original_format: String,
    converted: bool,
}

/// Alpha-carrying and palette layouts go through RGBA8, everything else
/// through RGB8.
fn normalize(decoded: DecodedImage) -> DynamicImage {
    if decoded.has_alpha() || decoded.indexed {
        DynamicImage::ImageRgba8(decoded.image.to_rgba8())
    } else {
        DynamicImage::ImageRgb8(decoded.image.to_rgb8())
    }
}

fn reformat_file(path: &Path) -> PipelineResult<Converted> {
    let decoded = ImageCodec::open(path)?;
    let original_format = format_to_string(decoded.format);

    if decoded.format == CANONICAL_FORMAT {
        return Ok(Converted {
            output_path: path.to_path_buf(),
            original_format,
            converted: false,
        });
    }

    let output_path = derived_path(path, "reformatted", "png");
    let normalized = normalize(decoded);
    ImageCodec::save(&normalized, &output_path, CANONICAL_FORMAT)?;

    Ok(Converted {
        output_path,
        original_format,
        converted: true,
    })
}

#[async_trait]
impl StageTransform for Reformatter {
    type Input = PathBuf;
    type Output = ReformatResult;

    fn stage(&self) -> Stage {
        Stage::Reformat
    }

    fn describe(&self, path: &PathBuf) -> String {
        path.display().to_string()
    }

    async fn apply(&self, path: PathBuf, worker: &str) -> PipelineResult<ReformatResult> {
        let start = Instant::now();
        let source = path.clone();

        let converted = tokio::task::spawn_blocking(move || reformat_file(&source))
            .await
            .map_err(|e| PipelineError::Panicked {
                item: path.display().to_string(),
                message: format!("Task join error: {}", e),
            })??;

        if converted.converted {
            tracing::debug!(worker, "Converted {:?} to png", path);
        } else {
            tracing::debug!(worker, "Already png, skipping {:?}", path);
        }

        Ok(ReformatResult {
            source_path: path,
            output_path: converted.output_path,
            original_format: converted.original_format,
            new_format: format_to_string(CANONICAL_FORMAT),
            converted: converted.converted,
            elapsed_ms: start.elapsed().as_millis() as u64,
            worker: worker.to_string(),
            timestamp: Utc::now(),
        })
    }
}
