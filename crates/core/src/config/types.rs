use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::pipeline::{MediaConfig, PipelineConfig, ThumbnailConfig};
use crate::tools::ToolsConfig;
use crate::transfer::{RetryConfig, TransferConfig};

pub use crate::transfer::{HttpRemoteConfig, LocalMirrorConfig, TransferBackend};

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub transfer: TransferConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub remote: RemotePathsConfig,
    #[serde(default)]
    pub scratch: ScratchConfig,
    #[serde(default)]
    pub media: MediaConfig,
    #[serde(default)]
    pub thumbnails: ThumbnailConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub reconcile: ReconcileConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Job store configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("mediapress.db")
}

/// Remote path prefixes, forward-slash relative to the transfer root.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct RemotePathsConfig {
    #[serde(default = "default_remote_originals")]
    pub originals_dir: String,
    #[serde(default = "default_remote_compressed")]
    pub compressed_dir: String,
    /// Holds `Originals/`, `Compressed/` and `Placeholders/` subfolders.
    #[serde(default = "default_remote_thumbnails")]
    pub thumbnails_dir: String,
}

impl Default for RemotePathsConfig {
    fn default() -> Self {
        Self {
            originals_dir: default_remote_originals(),
            compressed_dir: default_remote_compressed(),
            thumbnails_dir: default_remote_thumbnails(),
        }
    }
}

impl RemotePathsConfig {
    /// Remote path of a compressed file name.
    pub fn compressed(&self, file_name: &str) -> String {
        join_remote(&self.compressed_dir, file_name)
    }

    /// Remote path of a thumbnail variant (`Originals`, `Compressed`, `Placeholders`).
    pub fn thumbnail(&self, variant: &str, file_name: &str) -> String {
        join_remote(&join_remote(&self.thumbnails_dir, variant), file_name)
    }
}

/// Joins two forward-slash path segments without doubling separators.
pub fn join_remote(prefix: &str, name: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    let name = name.trim_start_matches('/');
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", prefix, name)
    }
}

fn default_remote_originals() -> String {
    "Resources/Videos/Originals".to_string()
}

fn default_remote_compressed() -> String {
    "Resources/Videos/Compressed".to_string()
}

fn default_remote_thumbnails() -> String {
    "Resources/Thumbnails".to_string()
}

/// Local scratch directories. Files in here are scoped per job id.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScratchConfig {
    #[serde(default = "default_scratch_originals")]
    pub originals_dir: PathBuf,
    #[serde(default = "default_scratch_compressed")]
    pub compressed_dir: PathBuf,
    #[serde(default = "default_scratch_thumbnails")]
    pub thumbnails_dir: PathBuf,
}

impl Default for ScratchConfig {
    fn default() -> Self {
        Self {
            originals_dir: default_scratch_originals(),
            compressed_dir: default_scratch_compressed(),
            thumbnails_dir: default_scratch_thumbnails(),
        }
    }
}

fn scratch_root() -> PathBuf {
    std::env::temp_dir().join("mediapress")
}

fn default_scratch_originals() -> PathBuf {
    scratch_root().join("originals")
}

fn default_scratch_compressed() -> PathBuf {
    scratch_root().join("compressed")
}

fn default_scratch_thumbnails() -> PathBuf {
    scratch_root().join("thumbnails")
}

/// Reconciliation sweep configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ReconcileConfig {
    /// Local backup mirror to cross-check alongside the remote.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_root: Option<PathBuf>,
}

/// Metrics output configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MetricsConfig {
    /// Where to write the Prometheus text exposition after each run
    /// (for the node-exporter textfile collector).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub textfile_path: Option<PathBuf>,
}

/// Sanitized config for logging (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub store: StoreConfig,
    pub transfer: SanitizedTransferConfig,
    pub remote: RemotePathsConfig,
    pub scratch: ScratchConfig,
    pub media: MediaConfig,
    pub thumbnails: ThumbnailConfig,
    pub tools: ToolsConfig,
    pub pipeline: PipelineConfig,
}

/// Sanitized transfer config (password hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedTransferConfig {
    pub backend: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_url: Option<String>,
    pub http_credentials_configured: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_mirror_root: Option<PathBuf>,
    pub retry: RetryConfig,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            store: config.store.clone(),
            transfer: SanitizedTransferConfig {
                backend: match config.transfer.backend {
                    TransferBackend::Http => "http".to_string(),
                    TransferBackend::LocalMirror => "local_mirror".to_string(),
                },
                http_url: config.transfer.http.as_ref().map(|h| h.url.clone()),
                http_credentials_configured: config
                    .transfer
                    .http
                    .as_ref()
                    .map(|h| h.username.is_some() && h.password.is_some())
                    .unwrap_or(false),
                local_mirror_root: config.transfer.local_mirror.as_ref().map(|l| l.root.clone()),
                retry: config.transfer.retry.clone(),
            },
            remote: config.remote.clone(),
            scratch: config.scratch.clone(),
            media: config.media.clone(),
            thumbnails: config.thumbnails.clone(),
            tools: config.tools.clone(),
            pipeline: config.pipeline.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_remote() {
        assert_eq!(join_remote("a/b/", "/c.mp4"), "a/b/c.mp4");
        assert_eq!(join_remote("", "c.mp4"), "c.mp4");
        assert_eq!(join_remote("a", "c.mp4"), "a/c.mp4");
    }

    #[test]
    fn test_remote_thumbnail_path() {
        let remote = RemotePathsConfig::default();
        assert_eq!(
            remote.thumbnail("Placeholders", "abc_0.jpg"),
            "Resources/Thumbnails/Placeholders/abc_0.jpg"
        );
        assert_eq!(
            remote.compressed("abc.mp4"),
            "Resources/Videos/Compressed/abc.mp4"
        );
    }

    #[test]
    fn test_sanitized_config_hides_password() {
        let config = crate::config::load_config_from_str(
            r#"
[transfer]
backend = "http"

[transfer.http]
url = "https://media.example.org"
username = "uploader"
password = "super-secret"
"#,
        )
        .unwrap();

        let sanitized = SanitizedConfig::from(&config);
        let json = serde_json::to_string(&sanitized).unwrap();
        assert!(!json.contains("super-secret"));
        assert!(sanitized.transfer.http_credentials_configured);
        assert_eq!(sanitized.transfer.backend, "http");
    }
}
