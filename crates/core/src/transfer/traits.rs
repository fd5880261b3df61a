//! Trait definitions for the transfer module.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::error::TransferError;

/// One entry of a remote directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEntry {
    /// Full remote path (prefix included).
    pub path: String,
    pub size: u64,
    pub is_dir: bool,
}

impl RemoteEntry {
    /// Final path segment.
    pub fn name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

/// A backend that can move blobs between local paths and remote paths.
///
/// Remote paths are forward-slash separated and relative to the backend's
/// root. Implementations move bytes only; size verification and retries are
/// layered on top by [`super::VerifiedTransfer`].
#[async_trait]
pub trait TransferGateway: Send + Sync {
    /// Returns the name of this backend.
    fn name(&self) -> &str;

    /// Size in bytes of a remote blob.
    async fn remote_size(&self, remote: &str) -> Result<u64, TransferError>;

    /// Downloads a remote blob to `local`, creating parent directories.
    /// Returns the number of bytes written.
    async fn download(&self, remote: &str, local: &Path) -> Result<u64, TransferError>;

    /// Uploads `local` to `remote`, replacing anything already there.
    /// Returns the number of bytes sent.
    async fn upload(&self, local: &Path, remote: &str) -> Result<u64, TransferError>;

    /// Lists the direct children of a remote directory.
    async fn list(&self, prefix: &str) -> Result<Vec<RemoteEntry>, TransferError>;

    /// Deletes a remote blob.
    async fn delete(&self, remote: &str) -> Result<(), TransferError>;
}
