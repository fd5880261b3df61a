//! Mock tool runner for testing.

use async_trait::async_trait;
use image::{ImageBuffer, Rgb};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::fs;
use tokio::sync::RwLock;

use crate::tools::{ToolError, ToolInvocation, ToolOutput, ToolRunner};

/// Probe output returned when no scripted output matches.
pub const DEFAULT_PROBE_OUTPUT: &str =
    "width=1920\nheight=1080\navg_frame_rate=30/1\nduration=12.000000\n";

/// Size of the frames written by `extract_frame`.
pub const FRAME_SIZE: (u32, u32) = (64, 36);

/// Scripted implementation of [`ToolRunner`].
///
/// Instead of spawning processes it writes plausible output files:
/// - `compress` writes `output_base + output_ext`
/// - `concatenate` writes its output argument
/// - `extract_frame` writes a small PNG
/// - `probe` prints scripted `key=value` output
///
/// # Example
///
/// ```rust,ignore
/// use mediapress_core::testing::MockToolRunner;
///
/// let runner = MockToolRunner::new();
/// runner.set_probe_output("b.mp4", "width=640 height=480 avg_frame_rate=25/1 duration=4").await;
/// runner.fail_tool("compress", 1).await;
///
/// // ... run the pipeline ...
/// let calls = runner.invocations_of("concatenate").await;
/// assert!(calls.is_empty());
/// ```
#[derive(Debug, Default)]
pub struct MockToolRunner {
    invocations: Arc<RwLock<Vec<ToolInvocation>>>,
    /// Exit codes forced per tool name.
    failures: Arc<RwLock<HashMap<String, i32>>>,
    /// Probe output keyed by file name suffix of the probed path.
    probe_outputs: Arc<RwLock<Vec<(String, String)>>>,
    default_probe: Arc<RwLock<Option<String>>>,
}

impl MockToolRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every call of `tool` exit with `code`.
    pub async fn fail_tool(&self, tool: &str, code: i32) {
        self.failures.write().await.insert(tool.to_string(), code);
    }

    pub async fn clear_failures(&self) {
        self.failures.write().await.clear();
    }

    /// Probe output for any path ending in `suffix`. Later calls win.
    pub async fn set_probe_output(&self, suffix: &str, output: &str) {
        self.probe_outputs
            .write()
            .await
            .push((suffix.to_string(), output.to_string()));
    }

    /// Replaces [`DEFAULT_PROBE_OUTPUT`].
    pub async fn set_default_probe_output(&self, output: &str) {
        *self.default_probe.write().await = Some(output.to_string());
    }

    pub async fn recorded_invocations(&self) -> Vec<ToolInvocation> {
        self.invocations.read().await.clone()
    }

    pub async fn invocations_of(&self, tool: &str) -> Vec<ToolInvocation> {
        self.invocations
            .read()
            .await
            .iter()
            .filter(|i| i.tool == tool)
            .cloned()
            .collect()
    }

    async fn probe_output(&self, path: &str) -> String {
        let scripted = self.probe_outputs.read().await;
        if let Some((_, output)) = scripted.iter().rev().find(|(s, _)| path.ends_with(s.as_str())) {
            return output.clone();
        }
        self.default_probe
            .read()
            .await
            .clone()
            .unwrap_or_else(|| DEFAULT_PROBE_OUTPUT.to_string())
    }
}

fn arg<'a>(invocation: &'a ToolInvocation, index: usize) -> Result<&'a str, ToolError> {
    invocation
        .args
        .get(index)
        .map(String::as_str)
        .ok_or_else(|| ToolError::parse(invocation.tool.clone(), format!("missing argument {}", index)))
}

async fn write_file(path: &Path, data: &[u8]) -> Result<(), ToolError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    fs::write(path, data).await?;
    Ok(())
}

fn write_frame(path: &Path) -> Result<(), ToolError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let (width, height) = FRAME_SIZE;
    let frame: ImageBuffer<Rgb<u8>, Vec<u8>> =
        ImageBuffer::from_fn(width, height, |x, y| Rgb([x as u8 * 4, y as u8 * 7, 128]));
    frame.save(path).map_err(|e| ToolError::Image {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

#[async_trait]
impl ToolRunner for MockToolRunner {
    async fn run(&self, invocation: &ToolInvocation) -> Result<ToolOutput, ToolError> {
        self.invocations.write().await.push(invocation.clone());

        if let Some(code) = self.failures.read().await.get(&invocation.tool).copied() {
            return Ok(ToolOutput {
                exit_code: Some(code),
                stdout_lines: Vec::new(),
                stderr_tail: vec![format!("{} failed (mock)", invocation.tool)],
            });
        }

        let mut stdout_lines = Vec::new();
        match invocation.tool.as_str() {
            "probe" => {
                let output = self.probe_output(arg(invocation, 0)?).await;
                stdout_lines = output.lines().map(str::to_string).collect();
            }
            "compress" => {
                let output = format!("{}{}", arg(invocation, 1)?, arg(invocation, 2)?);
                let input = fs::read(arg(invocation, 0)?).await.unwrap_or_default();
                let mut data = b"compressed:".to_vec();
                data.extend_from_slice(&input[..input.len().min(64)]);
                write_file(Path::new(&output), &data).await?;
            }
            "concatenate" => {
                let manifest = fs::read(arg(invocation, 0)?).await?;
                write_file(Path::new(arg(invocation, 1)?), &manifest).await?;
            }
            "extract_frame" => {
                write_frame(Path::new(arg(invocation, 0)?))?;
            }
            _ => {}
        }

        Ok(ToolOutput {
            exit_code: Some(0),
            stdout_lines,
            stderr_tail: Vec::new(),
        })
    }
}
