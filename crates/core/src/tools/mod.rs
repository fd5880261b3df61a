//! Tools module - external subprocesses and image work.
//!
//! Every subprocess goes through the [`ToolRunner`] trait so tests can swap
//! in a scripted runner. On top of it sit the [`MediaProber`] and the
//! [`TransformRunner`]. JPEG previews are rendered in-process with `image`.

mod config;
mod error;
mod image_variants;
mod prober;
mod runner;
mod transform;

pub use config::{ToolCommand, ToolsConfig};
pub use error::ToolError;
pub use image_variants::{render_variants, render_variants_blocking, VariantSpec};
pub use prober::{parse_probe_output, MediaProbe, MediaProber};
pub use runner::{run_checked, SystemToolRunner, ToolInvocation, ToolOutput, ToolRunner};
pub use transform::{
    format_timestamp, render_concat_manifest, with_extension, write_concat_manifest,
    TransformRunner,
};
