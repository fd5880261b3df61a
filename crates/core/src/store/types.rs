//! Job, thumbnail and sequence records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::geometry::Resolution;

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Waiting for its first run.
    Unprocessed,
    /// Claimed by a run.
    Processing,
    /// Published.
    Complete,
    /// Last run failed.
    Error,
    /// Operator asked for a redo from scratch.
    Reprocess,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Unprocessed => "unprocessed",
            JobStatus::Processing => "processing",
            JobStatus::Complete => "complete",
            JobStatus::Error => "error",
            JobStatus::Reprocess => "reprocess",
        }
    }

    /// Terminal states end a run.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Complete | JobStatus::Error)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unprocessed" => Ok(JobStatus::Unprocessed),
            "processing" => Ok(JobStatus::Processing),
            "complete" => Ok(JobStatus::Complete),
            "error" => Ok(JobStatus::Error),
            "reprocess" => Ok(JobStatus::Reprocess),
            other => Err(format!("unknown job status: {}", other)),
        }
    }
}

/// One media asset moving through the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub status: JobStatus,
    /// Remote path of the uploaded original. `None` for stitched jobs.
    pub original_path: Option<String>,
    /// Extension of the original, dot included (e.g. `.mov`).
    pub original_extension: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub x_scale: Option<u32>,
    pub y_scale: Option<u32>,
    pub duration_secs: Option<f64>,
    pub frame_rate: Option<f64>,
    /// Remote path of the published output.
    pub compressed_path: Option<String>,
    /// Number of times the job has been claimed.
    pub attempts: u32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Output file name for the given extension.
    pub fn compressed_file_name(&self, extension: &str) -> String {
        format!("{}{}", self.id, extension)
    }

    /// Recorded geometry, if probed.
    pub fn resolution(&self) -> Option<Resolution> {
        Some(Resolution::new(self.width?, self.height?))
    }

    /// Whether the job is published and can feed a sequence.
    pub fn is_ready(&self) -> bool {
        self.status == JobStatus::Complete && self.compressed_path.is_some()
    }
}

/// Request to create a new job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewJob {
    pub original_path: Option<String>,
    pub original_extension: String,
}

impl NewJob {
    /// A job for an uploaded original; the extension comes from the path.
    pub fn from_remote_path(remote: &str) -> Self {
        let file_name = remote.rsplit('/').next().unwrap_or(remote);
        let original_extension = match file_name.rfind('.') {
            Some(idx) if idx > 0 => file_name[idx..].to_string(),
            _ => String::new(),
        };
        Self {
            original_path: Some(remote.to_string()),
            original_extension,
        }
    }

    /// A job whose output is produced by stitching other jobs.
    pub fn stitched(extension: &str) -> Self {
        Self {
            original_path: None,
            original_extension: extension.to_string(),
        }
    }
}

/// Which jobs may be picked up by a run.
///
/// `Unprocessed` and `Reprocess` always qualify; `Error` qualifies while
/// `attempts < max_attempts`. `Complete` and `Processing` never do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionPolicy {
    pub max_attempts: u32,
}

impl SelectionPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self { max_attempts }
    }

    pub fn selectable(&self, job: &Job) -> bool {
        match job.status {
            JobStatus::Unprocessed | JobStatus::Reprocess => true,
            JobStatus::Error => job.attempts < self.max_attempts,
            JobStatus::Processing | JobStatus::Complete => false,
        }
    }
}

/// Derived image triple at one timestamp of a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thumbnail {
    pub id: String,
    pub job_id: String,
    pub index: u32,
    pub timestamp_secs: f64,
    pub original_path: String,
    pub compressed_path: String,
    pub placeholder_path: String,
    pub x_scale: u32,
    pub y_scale: u32,
}

/// Ordered group of jobs stitched into a target job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoSequence {
    pub id: String,
    pub target_job_id: String,
    pub member_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
}
