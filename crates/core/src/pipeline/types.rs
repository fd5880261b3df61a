//! Outcomes and errors of pipeline runs.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::geometry::Resolution;
use crate::store::StoreError;
use crate::tools::ToolError;
use crate::transfer::TransferError;

/// Classification of a failed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The store could not be queried or claimed.
    Selection,
    /// Size mismatch after a transfer.
    TransferIntegrity,
    /// A tool exited non-zero or left no output.
    ToolInvocation,
    /// Probe output was missing a token or unparseable.
    ProbeParse,
    /// Sequence members disagree on dimensions.
    GeometryMismatch,
    Unknown,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Selection => "selection",
            FailureKind::TransferIntegrity => "transfer_integrity",
            FailureKind::ToolInvocation => "tool_invocation",
            FailureKind::ProbeParse => "probe_parse",
            FailureKind::GeometryMismatch => "geometry_mismatch",
            FailureKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one pipeline invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
    /// Nothing to do.
    Idle,
    /// Another run claimed the selected job first.
    LostClaim,
    Completed {
        job_id: String,
    },
    /// `job_id` is `None` when selection itself failed.
    Failed {
        job_id: Option<String>,
        kind: FailureKind,
    },
}

impl RunOutcome {
    /// Label used for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            RunOutcome::Idle => "idle",
            RunOutcome::LostClaim => "lost_claim",
            RunOutcome::Completed { .. } => "completed",
            RunOutcome::Failed { .. } => "failed",
        }
    }
}

/// Everything `run_once` did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    /// Jobs reset from a stale `Processing` claim.
    pub recovered: Vec<String>,
    pub job: RunOutcome,
    pub sequence: RunOutcome,
}

/// Errors raised inside a claimed run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("transfer error: {0}")]
    Transfer(#[from] TransferError),

    #[error("tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("sequence member {member_id} is {actual:?}, expected {expected:?}")]
    GeometryMismatch {
        member_id: String,
        expected: Resolution,
        actual: Resolution,
    },

    #[error("job {job_id} has no original to download")]
    MissingSource { job_id: String },

    #[error("sequence member {member_id} is missing or not published")]
    MissingMember { member_id: String },

    #[error("sequence {sequence_id} has no members")]
    EmptySequence { sequence_id: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    pub fn kind(&self) -> FailureKind {
        match self {
            PipelineError::Transfer(e) if e.is_integrity() => FailureKind::TransferIntegrity,
            PipelineError::Tool(e) if e.is_parse() => FailureKind::ProbeParse,
            PipelineError::Tool(_) => FailureKind::ToolInvocation,
            PipelineError::GeometryMismatch { .. } => FailureKind::GeometryMismatch,
            PipelineError::Store(_)
            | PipelineError::Transfer(_)
            | PipelineError::MissingSource { .. }
            | PipelineError::MissingMember { .. }
            | PipelineError::EmptySequence { .. }
            | PipelineError::Io(_) => FailureKind::Unknown,
        }
    }
}
