//! Configuration for the external tools.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// An external command: program plus fixed leading arguments.
///
/// Per-call arguments are appended after `args`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCommand {
    pub program: PathBuf,
    #[serde(default)]
    pub args: Vec<String>,
}

impl ToolCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }
}

/// `[tools]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default = "default_probe")]
    pub probe: ToolCommand,
    #[serde(default = "default_compress")]
    pub compress: ToolCommand,
    #[serde(default = "default_concatenate")]
    pub concatenate: ToolCommand,
    #[serde(default = "default_extract_frame")]
    pub extract_frame: ToolCommand,
}

fn default_probe() -> ToolCommand {
    ToolCommand::new("scripts/probe.sh")
}

fn default_compress() -> ToolCommand {
    ToolCommand::new("scripts/compress.sh")
}

fn default_concatenate() -> ToolCommand {
    ToolCommand::new("scripts/concatenate.sh")
}

fn default_extract_frame() -> ToolCommand {
    ToolCommand::new("scripts/extract_frame.sh")
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            probe: default_probe(),
            compress: default_compress(),
            concatenate: default_concatenate(),
            extract_frame: default_extract_frame(),
        }
    }
}

impl ToolsConfig {
    /// Every configured command with its config key.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &ToolCommand)> {
        [
            ("probe", &self.probe),
            ("compress", &self.compress),
            ("concatenate", &self.concatenate),
            ("extract_frame", &self.extract_frame),
        ]
        .into_iter()
    }
}
