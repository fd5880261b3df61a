//! Job store trait.

use chrono::{DateTime, Utc};

use super::error::StoreError;
use super::types::{Job, JobStatus, NewJob, SelectionPolicy, Thumbnail, VideoSequence};

/// Persistence for jobs, their thumbnails and sequences.
pub trait JobStore: Send + Sync {
    /// Create a job in `Unprocessed`.
    fn create_job(&self, request: NewJob) -> Result<Job, StoreError>;

    /// Get a job by ID.
    fn get(&self, id: &str) -> Result<Option<Job>, StoreError>;

    /// All jobs, oldest first.
    fn list_all(&self) -> Result<Vec<Job>, StoreError>;

    /// Oldest selectable job that is not the target of a sequence.
    fn select_oldest(&self, policy: &SelectionPolicy) -> Result<Option<Job>, StoreError>;

    /// Atomically move a job from `expected` to `Processing`, counting the attempt.
    ///
    /// An `Error` job is only claimed while under the policy's attempt cap.
    /// Returns `false` if the job was no longer claimable.
    fn claim(
        &self,
        id: &str,
        expected: JobStatus,
        policy: &SelectionPolicy,
    ) -> Result<bool, StoreError>;

    /// Persist `status`, `last_error` and `compressed_path`.
    fn update_status(&self, job: &Job) -> Result<(), StoreError>;

    /// Persist probed and derived media fields.
    fn update_metadata(&self, job: &Job) -> Result<(), StoreError>;

    /// Insert a thumbnail row.
    fn insert_thumbnail(&self, thumbnail: &Thumbnail) -> Result<(), StoreError>;

    /// Delete all thumbnails of a job. Returns how many were removed.
    fn delete_thumbnails(&self, job_id: &str) -> Result<usize, StoreError>;

    /// Thumbnails of a job ordered by index.
    fn list_thumbnails(&self, job_id: &str) -> Result<Vec<Thumbnail>, StoreError>;

    /// All thumbnails, used by the reconciliation sweep.
    fn list_all_thumbnails(&self) -> Result<Vec<Thumbnail>, StoreError>;

    /// Create a sequence of existing member jobs stitched into `target_job_id`.
    fn create_sequence(
        &self,
        target_job_id: &str,
        member_ids: &[String],
    ) -> Result<VideoSequence, StoreError>;

    /// Oldest sequence whose target is selectable and whose members are all
    /// `Complete` with a compressed path.
    fn select_ready_sequence(
        &self,
        policy: &SelectionPolicy,
    ) -> Result<Option<VideoSequence>, StoreError>;

    /// Operator request to redo a job from scratch.
    fn mark_reprocess(&self, id: &str) -> Result<Job, StoreError>;

    /// Reset jobs stuck in `Processing` since before `older_than` to
    /// `Unprocessed`. Returns their IDs.
    fn reset_stale_processing(&self, older_than: DateTime<Utc>) -> Result<Vec<String>, StoreError>;
}
