//! Error types for the tools module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while running or interpreting external tools.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Program could not be found.
    #[error("Tool not found: {path}")]
    NotFound { path: PathBuf },

    /// Program exited with a non-zero status.
    #[error("{tool} exited with code {code:?}")]
    NonZeroExit {
        tool: String,
        code: Option<i32>,
        stderr_tail: Option<String>,
    },

    /// Expected token missing or unparseable in captured output.
    #[error("Failed to parse {tool} output: {reason}")]
    Parse { tool: String, reason: String },

    /// Image decoding or encoding failed.
    #[error("Image processing failed for {path}: {reason}")]
    Image { path: PathBuf, reason: String },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ToolError {
    /// Creates a non-zero exit error.
    pub fn non_zero_exit(tool: impl Into<String>, code: Option<i32>, stderr_tail: Option<String>) -> Self {
        Self::NonZeroExit {
            tool: tool.into(),
            code,
            stderr_tail,
        }
    }

    /// Creates a parse error.
    pub fn parse(tool: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Parse {
            tool: tool.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error came from interpreting output rather than running a tool.
    pub fn is_parse(&self) -> bool {
        matches!(self, Self::Parse { .. })
    }
}
