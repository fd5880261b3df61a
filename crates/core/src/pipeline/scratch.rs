//! Scoped local files of one run.

use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

/// Tracks every local path a run creates and removes them all at the end.
///
/// Call [`ScratchSpace::cleanup`] on every exit path; if a run unwinds
/// before that, `Drop` removes what is left synchronously.
#[derive(Debug, Default)]
pub struct ScratchSpace {
    files: Vec<PathBuf>,
    dirs: Vec<PathBuf>,
    cleaned: bool,
}

impl ScratchSpace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a file path and returns it.
    pub fn track(&mut self, path: PathBuf) -> PathBuf {
        self.files.push(path.clone());
        path
    }

    /// Registers a directory tree and returns it.
    pub fn track_dir(&mut self, path: PathBuf) -> PathBuf {
        self.dirs.push(path.clone());
        path
    }

    pub fn tracked(&self) -> impl Iterator<Item = &Path> {
        self.files.iter().chain(self.dirs.iter()).map(PathBuf::as_path)
    }

    /// Removes all tracked paths. Returns how many existed.
    pub async fn cleanup(&mut self) -> usize {
        let mut removed = 0;
        for file in &self.files {
            match fs::remove_file(file).await {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = %file.display(), error = %e, "Failed to remove scratch file"),
            }
        }
        for dir in &self.dirs {
            match fs::remove_dir_all(dir).await {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = %dir.display(), error = %e, "Failed to remove scratch directory"),
            }
        }
        self.cleaned = true;
        debug!(removed, "Scratch cleaned");
        removed
    }
}

impl Drop for ScratchSpace {
    fn drop(&mut self) {
        if self.cleaned {
            return;
        }
        for file in &self.files {
            let _ = std::fs::remove_file(file);
        }
        for dir in &self.dirs {
            let _ = std::fs::remove_dir_all(dir);
        }
    }
}
