//! Size-verified transfers on top of any [`TransferGateway`].

use std::path::Path;
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, warn};

use super::error::TransferError;
use super::retry::RetryPolicy;
use super::traits::{RemoteEntry, TransferGateway};
use crate::metrics;

/// Wraps a backend with the integrity policy used by the pipeline.
///
/// - Downloads size the remote before the stream opens and compare the local
///   file against it afterwards.
/// - Uploads size the local file first and compare the remote afterwards.
/// - A transport error is forgiven when the bytes already match exactly.
/// - Mismatches and transport errors are retried by the [`RetryPolicy`];
///   partial local files are removed before the next attempt.
#[derive(Clone)]
pub struct VerifiedTransfer {
    inner: Arc<dyn TransferGateway>,
    retry: RetryPolicy,
}

impl VerifiedTransfer {
    pub fn new(inner: Arc<dyn TransferGateway>, retry: RetryPolicy) -> Self {
        Self { inner, retry }
    }

    /// The wrapped backend.
    pub fn backend(&self) -> &Arc<dyn TransferGateway> {
        &self.inner
    }

    /// Downloads `remote` to `local` and checks the size. Returns the size.
    pub async fn download(&self, remote: &str, local: &Path) -> Result<u64, TransferError> {
        let label = format!("download {}", remote);
        let bytes = self
            .retry
            .run(&label, |attempt| self.download_once(remote, local, attempt))
            .await?;

        metrics::TRANSFER_BYTES_TOTAL
            .with_label_values(&["download"])
            .inc_by(bytes);
        Ok(bytes)
    }

    async fn download_once(
        &self,
        remote: &str,
        local: &Path,
        attempt: u32,
    ) -> Result<u64, TransferError> {
        let expected = self.inner.remote_size(remote).await?;
        debug!(remote = %remote, expected, attempt, "Starting download");

        let result = self.inner.download(remote, local).await;
        let actual = local_size(local).await;

        if actual == Some(expected) {
            if let Err(e) = result {
                warn!(
                    remote = %remote,
                    error = %e,
                    "Download reported an error but the local file is complete"
                );
            }
            return Ok(expected);
        }

        remove_partial(local).await;
        match result {
            Err(e) => Err(e),
            Ok(_) => Err(TransferError::size_mismatch(
                remote,
                expected,
                actual.unwrap_or(0),
            )),
        }
    }

    /// Uploads `local` to `remote` and checks the remote size. Returns the size.
    pub async fn upload(&self, local: &Path, remote: &str) -> Result<u64, TransferError> {
        let label = format!("upload {}", remote);
        let bytes = self
            .retry
            .run(&label, |attempt| self.upload_once(local, remote, attempt))
            .await?;

        metrics::TRANSFER_BYTES_TOTAL
            .with_label_values(&["upload"])
            .inc_by(bytes);
        Ok(bytes)
    }

    async fn upload_once(
        &self,
        local: &Path,
        remote: &str,
        attempt: u32,
    ) -> Result<u64, TransferError> {
        let expected = local_size(local)
            .await
            .ok_or_else(|| TransferError::LocalNotFound {
                path: local.to_path_buf(),
            })?;
        debug!(remote = %remote, expected, attempt, "Starting upload");

        let result = self.inner.upload(local, remote).await;
        let actual = self.inner.remote_size(remote).await;

        match (result, actual) {
            (Ok(_), Ok(actual)) if actual == expected => Ok(expected),
            (Err(e), Ok(actual)) if actual == expected => {
                warn!(
                    remote = %remote,
                    error = %e,
                    "Upload reported an error but the remote size matches"
                );
                Ok(expected)
            }
            (Err(e), _) => Err(e),
            (Ok(_), Ok(actual)) => Err(TransferError::size_mismatch(remote, expected, actual)),
            (Ok(_), Err(TransferError::NotFound { .. })) => {
                Err(TransferError::size_mismatch(remote, expected, 0))
            }
            (Ok(_), Err(e)) => Err(e),
        }
    }

    /// Lists a remote directory.
    pub async fn list(&self, prefix: &str) -> Result<Vec<RemoteEntry>, TransferError> {
        let label = format!("list {}", prefix);
        self.retry.run(&label, |_| self.inner.list(prefix)).await
    }

    /// Deletes a remote blob.
    pub async fn delete(&self, remote: &str) -> Result<(), TransferError> {
        let label = format!("delete {}", remote);
        self.retry.run(&label, |_| self.inner.delete(remote)).await
    }
}

async fn local_size(path: &Path) -> Option<u64> {
    fs::metadata(path).await.ok().map(|m| m.len())
}

async fn remove_partial(path: &Path) {
    if let Err(e) = fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "Failed to remove partial download");
        }
    }
}
