//! Image decode, resize, and encode built on the `image` crate.
//!
//! Everything here is synchronous and CPU-bound; stage transforms call into it
//! from `spawn_blocking`.

use image::codecs::bmp::BmpDecoder;
use image::imageops::FilterType;
use image::{ColorType, DynamicImage, GenericImageView, ImageFormat};
use std::io::Cursor;
use std::path::Path;

use crate::error::{PipelineError, PipelineResult};
use crate::types::Dimensions;

/// Result of decoding an image.
#[derive(Debug)]
pub struct DecodedImage {
    /// The decoded image data
    pub image: DynamicImage,
    /// Detected encoding of the source bytes
    pub format: ImageFormat,
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
    /// Pixel layout after decoding
    pub color: ColorType,
    /// Source stored palette indices rather than direct colour
    pub indexed: bool,
}

impl DecodedImage {
    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.width, self.height)
    }

    /// Whether the decoded pixel layout carries an alpha channel.
    ///
    /// Palettes are expanded on decode; check [`indexed`](Self::indexed) for
    /// the source layout.
    pub fn has_alpha(&self) -> bool {
        self.color.has_alpha()
    }
}

/// Stateless image codec.
pub struct ImageCodec;

impl ImageCodec {
    /// Decode in-memory bytes, detecting the format from content.
    ///
    /// `path` is used for error context and as a format hint when the content
    /// is not recognised.
    pub fn decode(bytes: &[u8], path: &Path) -> PipelineResult<DecodedImage> {
        let mut reader = image::ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| PipelineError::Decode {
                path: path.to_path_buf(),
                message: format!("Cannot detect image format: {}", e),
            })?;
        let format = match reader.format() {
            Some(f) => f,
            None => {
                let f = ImageFormat::from_path(path).map_err(|_| PipelineError::Decode {
                    path: path.to_path_buf(),
                    message: "Unrecognised image format".to_string(),
                })?;
                reader.set_format(f);
                f
            }
        };
        let image = reader.decode().map_err(|e| PipelineError::Decode {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let (width, height) = image.dimensions();
        let color = image.color();
        Ok(DecodedImage {
            image,
            format,
            width,
            height,
            color,
            indexed: is_indexed(bytes, format),
        })
    }

    /// Read and decode a file.
    pub fn open(path: &Path) -> PipelineResult<DecodedImage> {
        let bytes = std::fs::read(path).map_err(|source| PipelineError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::decode(&bytes, path)
    }

    /// Resample to exactly `dims`.
    pub fn resize(image: &DynamicImage, dims: Dimensions) -> DynamicImage {
        image.resize_exact(dims.width, dims.height, FilterType::Lanczos3)
    }

    /// Encode `image` as `format` and write it to `path`.
    pub fn save(image: &DynamicImage, path: &Path, format: ImageFormat) -> PipelineResult<()> {
        image
            .save_with_format(path, format)
            .map_err(|e| PipelineError::Encode {
                path: path.to_path_buf(),
                message: e.to_string(),
            })
    }
}

/// Whether the source bytes use a palette.
///
/// GIF is always indexed. BMP carries a colour table for bit depths up to 8.
fn is_indexed(bytes: &[u8], format: ImageFormat) -> bool {
    match format {
        ImageFormat::Gif => true,
        ImageFormat::Bmp => BmpDecoder::new(Cursor::new(bytes))
            .map(|decoder| decoder.get_palette().is_some())
            .unwrap_or(false),
        _ => false,
    }
}

/// Convert an ImageFormat to a string representation.
pub fn format_to_string(format: ImageFormat) -> String {
    match format {
        ImageFormat::Jpeg => "jpeg".to_string(),
        ImageFormat::Png => "png".to_string(),
        ImageFormat::WebP => "webp".to_string(),
        ImageFormat::Gif => "gif".to_string(),
        ImageFormat::Tiff => "tiff".to_string(),
        ImageFormat::Bmp => "bmp".to_string(),
        ImageFormat::Ico => "ico".to_string(),
        ImageFormat::Pnm => "pnm".to_string(),
        ImageFormat::Avif => "avif".to_string(),
        _ => "unknown".to_string(),
    }
}

/// Preferred file extension for a format.
pub fn extension_for(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Jpeg => "jpg",
        other => other.extensions_str().first().copied().unwrap_or("img"),
    }
}

/// Sibling path `{stem}_{suffix}.{extension}` next to `source`.
pub fn derived_path(source: &Path, suffix: &str, extension: &str) -> std::path::PathBuf {
    let stem = source
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("artifact");
    source.with_file_name(format!("{stem}_{suffix}.{extension}"))
}
