//! Error types for the job store.

use thiserror::Error;

/// Errors that can occur during job store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Record not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Cannot perform operation due to the job's current status.
    #[error("Cannot {operation} job {job_id}: current status is {status}")]
    InvalidState {
        job_id: String,
        status: String,
        operation: String,
    },

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}
