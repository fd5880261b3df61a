//! Subprocess execution behind a trait.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::debug;

use super::config::ToolCommand;
use super::error::ToolError;
use crate::metrics;

/// Number of stderr lines kept for error reports.
const STDERR_TAIL_LINES: usize = 20;

/// One call of an external tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    /// Logical tool name (`probe`, `compress`, ...).
    pub tool: String,
    pub command: ToolCommand,
    /// Per-call positional arguments, appended after the command's own args.
    pub args: Vec<String>,
}

impl ToolInvocation {
    pub fn new(tool: impl Into<String>, command: &ToolCommand, args: Vec<String>) -> Self {
        Self {
            tool: tool.into(),
            command: command.clone(),
            args,
        }
    }

    /// Full argument vector as passed to the program.
    pub fn argv(&self) -> Vec<String> {
        self.command
            .args
            .iter()
            .cloned()
            .chain(self.args.iter().cloned())
            .collect()
    }
}

/// What a finished tool left behind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    /// `None` when the process was killed by a signal.
    pub exit_code: Option<i32>,
    pub stdout_lines: Vec<String>,
    pub stderr_tail: Vec<String>,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    pub fn stdout(&self) -> String {
        self.stdout_lines.join("\n")
    }
}

/// Runs external tools to completion.
#[async_trait]
pub trait ToolRunner: Send + Sync {
    /// Runs the tool and waits for it to exit. A non-zero exit is not an
    /// error at this level; see [`run_checked`].
    async fn run(&self, invocation: &ToolInvocation) -> Result<ToolOutput, ToolError>;
}

/// Runs a tool and turns a non-zero exit into [`ToolError::NonZeroExit`].
pub async fn run_checked(
    runner: &dyn ToolRunner,
    invocation: &ToolInvocation,
) -> Result<ToolOutput, ToolError> {
    let result = runner.run(invocation).await;
    let ok = matches!(&result, Ok(output) if output.success());
    metrics::TOOL_INVOCATIONS_TOTAL
        .with_label_values(&[invocation.tool.as_str(), if ok { "success" } else { "failure" }])
        .inc();

    let output = result?;
    if !output.success() {
        let tail = (!output.stderr_tail.is_empty()).then(|| output.stderr_tail.join("\n"));
        return Err(ToolError::non_zero_exit(
            invocation.tool.clone(),
            output.exit_code,
            tail,
        ));
    }
    Ok(output)
}

/// Spawns real processes with `tokio::process`.
#[derive(Debug, Clone, Default)]
pub struct SystemToolRunner;

impl SystemToolRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ToolRunner for SystemToolRunner {
    async fn run(&self, invocation: &ToolInvocation) -> Result<ToolOutput, ToolError> {
        let argv = invocation.argv();
        debug!(tool = %invocation.tool, program = %invocation.command.program.display(), args = ?argv, "Running tool");

        let mut child = Command::new(&invocation.command.program)
            .args(&argv)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    ToolError::NotFound {
                        path: invocation.command.program.clone(),
                    }
                } else {
                    ToolError::Io(e)
                }
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| std::io::Error::other("stdout not captured"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| std::io::Error::other("stderr not captured"))?;

        let read_stdout = async {
            let mut lines = BufReader::new(stdout).lines();
            let mut collected = Vec::new();
            while let Some(line) = lines.next_line().await? {
                collected.push(line);
            }
            Ok::<_, std::io::Error>(collected)
        };

        let read_stderr = async {
            let mut lines = BufReader::new(stderr).lines();
            let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES);
            while let Some(line) = lines.next_line().await? {
                if tail.len() == STDERR_TAIL_LINES {
                    tail.pop_front();
                }
                tail.push_back(line);
            }
            Ok::<_, std::io::Error>(tail)
        };

        let (stdout_lines, stderr_tail) = tokio::try_join!(read_stdout, read_stderr)?;
        let status = child.wait().await?;

        debug!(tool = %invocation.tool, code = ?status.code(), "Tool exited");

        Ok(ToolOutput {
            exit_code: status.code(),
            stdout_lines,
            stderr_tail: stderr_tail.into_iter().collect(),
        })
    }
}
