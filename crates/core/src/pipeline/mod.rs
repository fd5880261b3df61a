//! Pipeline module - the job and sequence workflows.

mod config;
mod runner;
mod scratch;
mod thumbnails;
mod types;

pub use config::{MediaConfig, PipelineConfig, ThumbnailConfig};
pub use runner::MediaPipeline;
pub use scratch::ScratchSpace;
pub use thumbnails::{thumbnail_timestamps, ThumbnailGenerator};
pub use types::{FailureKind, PipelineError, RunOutcome, RunReport};
