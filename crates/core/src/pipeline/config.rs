//! Configuration for the pipeline.

use serde::{Deserialize, Serialize};

use crate::tools::VariantSpec;

/// `[media]` section: encode limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Frames sampled per job for thumbnails.
    #[serde(default = "default_thumbnail_count")]
    pub thumbnail_count: u32,

    /// Upper bound for the short side of the encoded output.
    #[serde(default = "default_max_short_side")]
    pub max_short_side: u32,

    /// Frame rates above this are halved until they fit.
    #[serde(default = "default_max_frame_rate")]
    pub max_frame_rate: u32,

    /// Quality level passed to the compressor (CRF-like, lower is better).
    #[serde(default = "default_quality_level")]
    pub quality_level: u32,

    /// Extension of compressed outputs, dot included.
    #[serde(default = "default_compressed_extension")]
    pub compressed_extension: String,
}

fn default_thumbnail_count() -> u32 {
    3
}

fn default_max_short_side() -> u32 {
    720
}

fn default_max_frame_rate() -> u32 {
    30
}

fn default_quality_level() -> u32 {
    24
}

fn default_compressed_extension() -> String {
    ".mp4".to_string()
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            thumbnail_count: default_thumbnail_count(),
            max_short_side: default_max_short_side(),
            max_frame_rate: default_max_frame_rate(),
            quality_level: default_quality_level(),
            compressed_extension: default_compressed_extension(),
        }
    }
}

impl MediaConfig {
    /// Sets the thumbnail count.
    pub fn with_thumbnail_count(mut self, count: u32) -> Self {
        self.thumbnail_count = count;
        self
    }
}

/// `[thumbnails]` section: JPEG preview variants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThumbnailConfig {
    #[serde(default = "default_compressed_max_width")]
    pub compressed_max_width: u32,
    #[serde(default = "default_compressed_quality")]
    pub compressed_quality: u8,
    #[serde(default = "default_placeholder_max_width")]
    pub placeholder_max_width: u32,
    #[serde(default = "default_placeholder_quality")]
    pub placeholder_quality: u8,
}

fn default_compressed_max_width() -> u32 {
    1280
}

fn default_compressed_quality() -> u8 {
    80
}

fn default_placeholder_max_width() -> u32 {
    40
}

fn default_placeholder_quality() -> u8 {
    30
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self {
            compressed_max_width: default_compressed_max_width(),
            compressed_quality: default_compressed_quality(),
            placeholder_max_width: default_placeholder_max_width(),
            placeholder_quality: default_placeholder_quality(),
        }
    }
}

impl ThumbnailConfig {
    pub fn compressed(&self) -> VariantSpec {
        VariantSpec {
            max_width: self.compressed_max_width,
            quality: self.compressed_quality,
        }
    }

    pub fn placeholder(&self) -> VariantSpec {
        VariantSpec {
            max_width: self.placeholder_max_width,
            quality: self.placeholder_quality,
        }
    }
}

/// `[pipeline]` section: selection and recovery policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Claims allowed per job; `Error` jobs below this are picked up again.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Jobs in `Processing` untouched for this long are reset.
    #[serde(default = "default_stale_processing")]
    pub stale_processing_secs: u64,
}

fn default_max_attempts() -> u32 {
    1
}

fn default_stale_processing() -> u64 {
    6 * 60 * 60 // 6 hours
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            stale_processing_secs: default_stale_processing(),
        }
    }
}

impl PipelineConfig {
    /// Sets the attempt cap.
    pub fn with_max_attempts(mut self, max: u32) -> Self {
        self.max_attempts = max;
        self
    }
}
