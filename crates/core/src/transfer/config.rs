//! Configuration for the transfer module.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Which backend serves remote paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferBackend {
    Http,
    LocalMirror,
}

/// `[transfer]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferConfig {
    pub backend: TransferBackend,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http: Option<HttpRemoteConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_mirror: Option<LocalMirrorConfig>,

    /// Retry configuration.
    #[serde(default)]
    pub retry: RetryConfig,
}

/// Remote HTTP server holding the media tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpRemoteConfig {
    /// Base URL; remote paths are appended to it.
    pub url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(default, skip_serializing)]
    pub password: Option<String>,

    /// Request timeout in seconds.
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,
}

fn default_http_timeout() -> u64 {
    600
}

/// Directory standing in for the remote tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalMirrorConfig {
    pub root: PathBuf,

    /// Buffer size for file copies in bytes.
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
}

impl LocalMirrorConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            buffer_size: default_buffer_size(),
        }
    }
}

fn default_buffer_size() -> usize {
    8 * 1024 * 1024 // 8 MB
}

/// Retry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum attempts per transfer, the first one included.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay between attempts in milliseconds.
    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,

    /// Maximum delay between attempts in milliseconds.
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,

    /// Exponential backoff multiplier.
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> u64 {
    1000
}

fn default_max_delay() -> u64 {
    30_000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay(),
            max_delay_ms: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

impl RetryConfig {
    /// Sets the maximum attempts.
    pub fn with_max_attempts(mut self, max: u32) -> Self {
        self.max_attempts = max;
        self
    }

    /// Disables the delay between attempts.
    pub fn without_delay(mut self) -> Self {
        self.initial_delay_ms = 0;
        self.max_delay_ms = 0;
        self
    }
}
