//! Testing utilities and mock implementations.
//!
//! This module provides mock implementations of the external seams (the
//! transfer backend and the subprocess runner), so the whole pipeline can be
//! exercised without a file server or ffmpeg.
//!
//! # Example
//!
//! ```rust,ignore
//! use mediapress_core::testing::{fixtures, MockToolRunner, MockTransfer};
//!
//! let transfer = Arc::new(MockTransfer::new());
//! let runner = Arc::new(MockToolRunner::new());
//! let config = fixtures::config(temp.path());
//! ```

mod mock_tool_runner;
mod mock_transfer;

pub use mock_tool_runner::{MockToolRunner, DEFAULT_PROBE_OUTPUT, FRAME_SIZE};
pub use mock_transfer::MockTransfer;

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::path::Path;

    use crate::config::{load_config_from_str, Config, LocalMirrorConfig, ScratchConfig};

    /// Probe output for the given geometry, 30 fps and `duration` seconds.
    pub fn probe_output(width: u32, height: u32, duration: f64) -> String {
        format!(
            "width={}\nheight={}\navg_frame_rate=30/1\nduration={:.6}\n",
            width, height, duration
        )
    }

    /// A local-mirror config whose scratch space lives under `root`.
    ///
    /// Retries are limited to one attempt without delay.
    pub fn config(root: &Path) -> Config {
        let toml = r#"
[transfer]
backend = "local_mirror"

[transfer.local_mirror]
root = "remote"

[transfer.retry]
max_attempts = 1
initial_delay_ms = 0
max_delay_ms = 0
"#;
        let mut config = load_config_from_str(toml).unwrap_or_else(|e| panic!("fixture config: {}", e));
        config.transfer.local_mirror = Some(LocalMirrorConfig::new(root.join("remote")));
        config.scratch = ScratchConfig {
            originals_dir: root.join("scratch/originals"),
            compressed_dir: root.join("scratch/compressed"),
            thumbnails_dir: root.join("scratch/thumbnails"),
        };
        config.store.path = root.join("mediapress.db");
        config
    }
}
