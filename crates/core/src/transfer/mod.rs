//! Transfer module - moves blobs between scratch space and the remote tree.
//!
//! Two backends implement [`TransferGateway`]: a local directory mirror and
//! an HTTP file server. [`VerifiedTransfer`] adds size checks and bounded
//! retries on top of whichever backend is configured.

mod config;
mod error;
mod http;
mod local;
mod retry;
mod traits;
mod verified;

use std::sync::Arc;

pub use config::{HttpRemoteConfig, LocalMirrorConfig, RetryConfig, TransferBackend, TransferConfig};
pub use error::TransferError;
pub use http::HttpTransfer;
pub use local::LocalMirrorTransfer;
pub use retry::RetryPolicy;
pub use traits::{RemoteEntry, TransferGateway};
pub use verified::VerifiedTransfer;

/// Builds the backend selected by `config.backend`.
pub fn build_gateway(config: &TransferConfig) -> Result<Arc<dyn TransferGateway>, TransferError> {
    match config.backend {
        TransferBackend::Http => {
            let http = config
                .http
                .clone()
                .ok_or_else(|| TransferError::transport("missing [transfer.http] section"))?;
            Ok(Arc::new(HttpTransfer::new(http)?))
        }
        TransferBackend::LocalMirror => {
            let local = config
                .local_mirror
                .clone()
                .ok_or_else(|| TransferError::transport("missing [transfer.local_mirror] section"))?;
            Ok(Arc::new(LocalMirrorTransfer::new(local)))
        }
    }
}

/// Builds the verified gateway the pipeline uses.
pub fn build_verified(config: &TransferConfig) -> Result<VerifiedTransfer, TransferError> {
    let backend = build_gateway(config)?;
    Ok(VerifiedTransfer::new(
        backend,
        RetryPolicy::new(config.retry.clone()),
    ))
}
