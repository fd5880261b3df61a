//! Compress, concatenate and extract-frame invocations.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;

use super::config::ToolsConfig;
use super::error::ToolError;
use super::runner::{run_checked, ToolInvocation, ToolRunner};
use crate::geometry::EncodeTarget;

/// Builds argument vectors for the transform tools and runs them.
///
/// Positional conventions:
/// - compress: `input output_base output_ext width height quality [frame_rate]`
/// - concatenate: `manifest output`
/// - extract_frame: `output_png input timestamp`
#[derive(Clone)]
pub struct TransformRunner {
    runner: Arc<dyn ToolRunner>,
    tools: ToolsConfig,
}

/// Appends `ext` (with its dot) to `base`.
pub fn with_extension(base: &Path, ext: &str) -> PathBuf {
    let mut s = base.as_os_str().to_os_string();
    s.push(ext);
    PathBuf::from(s)
}

fn arg(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

/// Formats a timestamp in seconds with millisecond precision.
pub fn format_timestamp(secs: f64) -> String {
    format!("{:.3}", secs.max(0.0))
}

impl TransformRunner {
    pub fn new(runner: Arc<dyn ToolRunner>, tools: ToolsConfig) -> Self {
        Self { runner, tools }
    }

    pub fn compress_invocation(
        &self,
        input: &Path,
        output_base: &Path,
        output_ext: &str,
        target: &EncodeTarget,
        quality: u32,
    ) -> ToolInvocation {
        let mut args = vec![
            arg(input),
            arg(output_base),
            output_ext.to_string(),
            target.width.to_string(),
            target.height.to_string(),
            quality.to_string(),
        ];
        if target.frame_rate > 0 {
            args.push(target.frame_rate.to_string());
        }
        ToolInvocation::new("compress", &self.tools.compress, args)
    }

    /// Compresses `input` to `output_base + output_ext`; returns the output path.
    pub async fn compress(
        &self,
        input: &Path,
        output_base: &Path,
        output_ext: &str,
        target: &EncodeTarget,
        quality: u32,
    ) -> Result<PathBuf, ToolError> {
        let invocation = self.compress_invocation(input, output_base, output_ext, target, quality);
        run_checked(self.runner.as_ref(), &invocation).await?;
        expect_output(&invocation.tool, with_extension(output_base, output_ext)).await
    }

    /// Concatenates the files listed in `manifest` into `output`.
    pub async fn concatenate(&self, manifest: &Path, output: &Path) -> Result<PathBuf, ToolError> {
        let invocation = ToolInvocation::new(
            "concatenate",
            &self.tools.concatenate,
            vec![arg(manifest), arg(output)],
        );
        run_checked(self.runner.as_ref(), &invocation).await?;
        expect_output(&invocation.tool, output.to_path_buf()).await
    }

    /// Writes one frame of `input` at `timestamp_secs` to `output_png`.
    pub async fn extract_frame(
        &self,
        output_png: &Path,
        input: &Path,
        timestamp_secs: f64,
    ) -> Result<PathBuf, ToolError> {
        let invocation = ToolInvocation::new(
            "extract_frame",
            &self.tools.extract_frame,
            vec![arg(output_png), arg(input), format_timestamp(timestamp_secs)],
        );
        run_checked(self.runner.as_ref(), &invocation).await?;
        expect_output(&invocation.tool, output_png.to_path_buf()).await
    }
}

/// A zero exit without the promised file is still a tool failure.
async fn expect_output(tool: &str, path: PathBuf) -> Result<PathBuf, ToolError> {
    match fs::metadata(&path).await {
        Ok(meta) if meta.is_file() => Ok(path),
        _ => Err(ToolError::non_zero_exit(
            tool,
            Some(0),
            Some(format!("expected output {} was not written", path.display())),
        )),
    }
}

/// Renders a concat manifest: one `file '<path>'` line per member, in order.
pub fn render_concat_manifest(members: &[PathBuf]) -> String {
    members
        .iter()
        .map(|p| format!("file '{}'\n", p.to_string_lossy().replace('\'', r"'\''")))
        .collect()
}

/// Writes a concat manifest under `dir` with a random 8-hex name.
pub async fn write_concat_manifest(dir: &Path, members: &[PathBuf]) -> Result<PathBuf, ToolError> {
    fs::create_dir_all(dir).await?;
    let name = uuid::Uuid::new_v4().simple().to_string();
    let path = dir.join(format!("{}.txt", &name[..8]));
    fs::write(&path, render_concat_manifest(members)).await?;
    Ok(path)
}
