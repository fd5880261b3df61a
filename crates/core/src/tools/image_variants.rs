//! JPEG preview variants of an extracted frame.

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::DynamicImage;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use super::error::ToolError;
use crate::geometry::Resolution;

/// Size bound and JPEG quality of one variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariantSpec {
    pub max_width: u32,
    pub quality: u8,
}

fn image_error(path: &Path, e: impl std::fmt::Display) -> ToolError {
    ToolError::Image {
        path: path.to_path_buf(),
        reason: e.to_string(),
    }
}

/// Scales `image` down to `max_width` keeping the aspect ratio; never upscales.
fn bounded(image: &DynamicImage, max_width: u32) -> DynamicImage {
    if image.width() <= max_width || max_width == 0 {
        return image.clone();
    }
    let height = ((image.height() as u64 * max_width as u64) / image.width() as u64).max(1) as u32;
    image.resize_exact(max_width, height, FilterType::Triangle)
}

fn write_jpeg(image: &DynamicImage, path: &Path, quality: u8) -> Result<(), ToolError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = File::create(path)?;
    let mut encoder = JpegEncoder::new_with_quality(BufWriter::new(file), quality.clamp(1, 100));
    encoder
        .encode_image(&image.to_rgb8())
        .map_err(|e| image_error(path, e))
}

/// Renders each spec of `source` to the matching output path.
///
/// Returns the source frame's resolution.
pub fn render_variants_blocking(
    source: &Path,
    outputs: &[(VariantSpec, PathBuf)],
) -> Result<Resolution, ToolError> {
    let frame = image::open(source).map_err(|e| image_error(source, e))?;
    for (spec, path) in outputs {
        write_jpeg(&bounded(&frame, spec.max_width), path, spec.quality)?;
    }
    Ok(Resolution::new(frame.width(), frame.height()))
}

/// Async wrapper running the encode on the blocking pool.
pub async fn render_variants(
    source: PathBuf,
    outputs: Vec<(VariantSpec, PathBuf)>,
) -> Result<Resolution, ToolError> {
    tokio::task::spawn_blocking(move || render_variants_blocking(&source, &outputs))
        .await
        .map_err(|e| ToolError::Io(std::io::Error::other(e)))?
}
