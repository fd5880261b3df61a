//! Mock transfer backend for testing.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tokio::fs;
use tokio::sync::RwLock;

use crate::transfer::{RemoteEntry, TransferError, TransferGateway};

/// In-memory implementation of [`TransferGateway`].
///
/// Provides controllable behavior for testing:
/// - Seed and inspect remote blobs
/// - Truncate downloads or uploads to break size checks
/// - Fail transfers with transport errors, before or after the bytes land
///
/// # Example
///
/// ```rust,ignore
/// use mediapress_core::testing::MockTransfer;
///
/// let transfer = MockTransfer::new();
/// transfer.put_blob("Resources/Videos/Originals/a.mov", vec![0u8; 128]).await;
///
/// // Make the next transfer fail once
/// transfer.fail_next_transfers(1).await;
/// ```
#[derive(Debug, Default)]
pub struct MockTransfer {
    blobs: Arc<RwLock<BTreeMap<String, Vec<u8>>>>,
    /// Bytes dropped from the end of every download.
    download_truncation: Arc<RwLock<usize>>,
    /// Bytes dropped from the end of every upload.
    upload_truncation: Arc<RwLock<usize>>,
    /// Report a transport error after a complete transfer.
    fail_after_complete: Arc<RwLock<bool>>,
    /// Number of upcoming transfers that fail before moving any bytes.
    failing_transfers: Arc<RwLock<u32>>,
    /// Fail every upload before moving any bytes.
    fail_uploads: Arc<RwLock<bool>>,
    downloads: Arc<RwLock<u32>>,
    uploads: Arc<RwLock<Vec<String>>>,
    deleted: Arc<RwLock<Vec<String>>>,
}

impl MockTransfer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a remote blob.
    pub async fn put_blob(&self, remote: &str, data: Vec<u8>) {
        self.blobs.write().await.insert(remote.to_string(), data);
    }

    pub async fn blob(&self, remote: &str) -> Option<Vec<u8>> {
        self.blobs.read().await.get(remote).cloned()
    }

    /// All remote paths, sorted.
    pub async fn paths(&self) -> Vec<String> {
        self.blobs.read().await.keys().cloned().collect()
    }

    pub async fn truncate_downloads(&self, bytes: usize) {
        *self.download_truncation.write().await = bytes;
    }

    pub async fn truncate_uploads(&self, bytes: usize) {
        *self.upload_truncation.write().await = bytes;
    }

    pub async fn fail_after_complete(&self, fail: bool) {
        *self.fail_after_complete.write().await = fail;
    }

    pub async fn fail_next_transfers(&self, count: u32) {
        *self.failing_transfers.write().await = count;
    }

    pub async fn fail_uploads(&self, fail: bool) {
        *self.fail_uploads.write().await = fail;
    }

    /// Number of download calls, failed ones included.
    pub async fn download_count(&self) -> u32 {
        *self.downloads.read().await
    }

    /// Remote paths of upload calls, in call order.
    pub async fn recorded_uploads(&self) -> Vec<String> {
        self.uploads.read().await.clone()
    }

    pub async fn recorded_deletes(&self) -> Vec<String> {
        self.deleted.read().await.clone()
    }

    async fn take_failure(&self) -> Result<(), TransferError> {
        let mut remaining = self.failing_transfers.write().await;
        if *remaining > 0 {
            *remaining -= 1;
            return Err(TransferError::transport("mock connection reset"));
        }
        Ok(())
    }

    async fn after_complete(&self, bytes: u64) -> Result<u64, TransferError> {
        if *self.fail_after_complete.read().await {
            return Err(TransferError::transport("mock connection closed late"));
        }
        Ok(bytes)
    }
}

#[async_trait]
impl TransferGateway for MockTransfer {
    fn name(&self) -> &str {
        "mock"
    }

    async fn remote_size(&self, remote: &str) -> Result<u64, TransferError> {
        self.blobs
            .read()
            .await
            .get(remote)
            .map(|data| data.len() as u64)
            .ok_or_else(|| TransferError::not_found(remote))
    }

    async fn download(&self, remote: &str, local: &Path) -> Result<u64, TransferError> {
        *self.downloads.write().await += 1;
        self.take_failure().await?;

        let mut data = self
            .blob(remote)
            .await
            .ok_or_else(|| TransferError::not_found(remote))?;
        let cut = *self.download_truncation.read().await;
        data.truncate(data.len().saturating_sub(cut));

        if let Some(parent) = local.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(local, &data).await?;
        self.after_complete(data.len() as u64).await
    }

    async fn upload(&self, local: &Path, remote: &str) -> Result<u64, TransferError> {
        self.uploads.write().await.push(remote.to_string());
        if *self.fail_uploads.read().await {
            return Err(TransferError::transport("mock upload refused"));
        }
        self.take_failure().await?;

        let mut data = fs::read(local).await.map_err(|_| TransferError::LocalNotFound {
            path: local.to_path_buf(),
        })?;
        let cut = *self.upload_truncation.read().await;
        data.truncate(data.len().saturating_sub(cut));
        let len = data.len() as u64;

        self.put_blob(remote, data).await;
        self.after_complete(len).await
    }

    async fn list(&self, prefix: &str) -> Result<Vec<RemoteEntry>, TransferError> {
        let dir = format!("{}/", prefix.trim_end_matches('/'));
        let blobs = self.blobs.read().await;

        let mut entries: BTreeMap<String, RemoteEntry> = BTreeMap::new();
        for (path, data) in blobs.iter() {
            let Some(rest) = path.strip_prefix(&dir) else {
                continue;
            };
            match rest.split_once('/') {
                None => {
                    entries.insert(
                        path.clone(),
                        RemoteEntry {
                            path: path.clone(),
                            size: data.len() as u64,
                            is_dir: false,
                        },
                    );
                }
                Some((child, _)) => {
                    let child_path = format!("{}{}", dir, child);
                    entries.entry(child_path.clone()).or_insert(RemoteEntry {
                        path: child_path,
                        size: 0,
                        is_dir: true,
                    });
                }
            }
        }
        Ok(entries.into_values().collect())
    }

    async fn delete(&self, remote: &str) -> Result<(), TransferError> {
        self.deleted.write().await.push(remote.to_string());
        self.blobs
            .write()
            .await
            .remove(remote)
            .map(|_| ())
            .ok_or_else(|| TransferError::not_found(remote))
    }
}
