//! Error types for the transfer module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while moving blobs to or from the remote.
#[derive(Debug, Error)]
pub enum TransferError {
    /// Remote path does not exist.
    #[error("Remote path not found: {path}")]
    NotFound { path: String },

    /// Local source file for an upload does not exist.
    #[error("Local file not found: {path}")]
    LocalNotFound { path: PathBuf },

    /// Transferred size does not match the expected size.
    #[error("Size mismatch for {path}: expected {expected} bytes, got {actual}")]
    SizeMismatch {
        path: String,
        expected: u64,
        actual: u64,
    },

    /// Remote server answered with an unexpected status.
    #[error("Remote returned HTTP {status} for {path}")]
    Status { path: String, status: u16 },

    /// Transport-level failure.
    #[error("Transport error: {reason}")]
    Transport { reason: String },

    /// Remote listing could not be understood.
    #[error("Invalid listing for {path}: {reason}")]
    InvalidListing { path: String, reason: String },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransferError {
    /// Creates a not found error.
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound { path: path.into() }
    }

    /// Creates a transport error.
    pub fn transport(reason: impl Into<String>) -> Self {
        Self::Transport {
            reason: reason.into(),
        }
    }

    /// Creates a size mismatch error.
    pub fn size_mismatch(path: impl Into<String>, expected: u64, actual: u64) -> Self {
        Self::SizeMismatch {
            path: path.into(),
            expected,
            actual,
        }
    }

    /// Whether this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { .. } | Self::Io(_) | Self::SizeMismatch { .. } => true,
            Self::Status { status, .. } => *status >= 500 || *status == 429,
            Self::NotFound { .. } | Self::LocalNotFound { .. } | Self::InvalidListing { .. } => {
                false
            }
        }
    }

    /// Whether this error means the bytes on one side are not what was expected.
    pub fn is_integrity(&self) -> bool {
        matches!(self, Self::SizeMismatch { .. })
    }
}
