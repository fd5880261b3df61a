//! Reconciliation sweep.
//!
//! Compares what the job store references against what the remote tree
//! (and optionally a local backup mirror) actually holds. Files nobody
//! references are orphans; referenced paths with no file are missing. The
//! sweep only reports; deleting orphans is a separate, explicit call.

use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{join_remote, RemotePathsConfig};
use crate::store::{JobStore, StoreError};
use crate::transfer::{RemoteEntry, TransferError, TransferGateway};

/// Thumbnail variant folders under the thumbnails prefix.
pub const THUMBNAIL_VARIANTS: [&str; 3] = ["Originals", "Compressed", "Placeholders"];

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("transfer error: {0}")]
    Transfer(#[from] TransferError),
}

/// Where a listing came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetLocation {
    Remote,
    Backup,
}

impl fmt::Display for AssetLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetLocation::Remote => f.write_str("remote"),
            AssetLocation::Backup => f.write_str("backup"),
        }
    }
}

/// Differences found under one prefix of one location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrefixDiff {
    pub location: AssetLocation,
    pub prefix: String,
    /// Files present but referenced by no job or thumbnail.
    pub orphans: Vec<RemoteEntry>,
    /// Paths referenced by the store with no file present.
    pub missing: Vec<String>,
}

impl PrefixDiff {
    pub fn is_clean(&self) -> bool {
        self.orphans.is_empty() && self.missing.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub diffs: Vec<PrefixDiff>,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.diffs.iter().all(PrefixDiff::is_clean)
    }

    pub fn orphan_count(&self) -> usize {
        self.diffs.iter().map(|d| d.orphans.len()).sum()
    }

    pub fn missing_count(&self) -> usize {
        self.diffs.iter().map(|d| d.missing.len()).sum()
    }
}

pub struct ReconciliationSweep {
    store: Arc<dyn JobStore>,
    remote: Arc<dyn TransferGateway>,
    backup: Option<Arc<dyn TransferGateway>>,
    paths: RemotePathsConfig,
}

impl ReconciliationSweep {
    pub fn new(
        store: Arc<dyn JobStore>,
        remote: Arc<dyn TransferGateway>,
        paths: RemotePathsConfig,
    ) -> Self {
        Self {
            store,
            remote,
            backup: None,
            paths,
        }
    }

    /// Also checks a backup mirror laid out like the remote tree.
    pub fn with_backup(mut self, backup: Arc<dyn TransferGateway>) -> Self {
        self.backup = Some(backup);
        self
    }

    /// Prefixes holding files the store references.
    pub fn prefixes(&self) -> Vec<String> {
        let mut prefixes = vec![
            self.paths.originals_dir.clone(),
            self.paths.compressed_dir.clone(),
        ];
        prefixes.extend(
            THUMBNAIL_VARIANTS
                .iter()
                .map(|variant| join_remote(&self.paths.thumbnails_dir, variant)),
        );
        prefixes
    }

    /// Every remote path the store references.
    fn referenced(&self) -> Result<BTreeSet<String>, ReconcileError> {
        let mut referenced = BTreeSet::new();
        for job in self.store.list_all()? {
            referenced.extend(job.original_path);
            referenced.extend(job.compressed_path);
        }
        for thumbnail in self.store.list_all_thumbnails()? {
            referenced.insert(thumbnail.original_path);
            referenced.insert(thumbnail.compressed_path);
            referenced.insert(thumbnail.placeholder_path);
        }
        Ok(referenced)
    }

    /// Builds the report. Nothing is modified.
    pub async fn scan(&self) -> Result<ReconcileReport, ReconcileError> {
        let referenced = self.referenced()?;
        debug!(referenced = referenced.len(), "Collected store references");

        let mut report = ReconcileReport::default();
        for prefix in self.prefixes() {
            report.diffs.push(
                diff_prefix(
                    AssetLocation::Remote,
                    self.remote.as_ref(),
                    &prefix,
                    &referenced,
                )
                .await?,
            );
            if let Some(backup) = &self.backup {
                report.diffs.push(
                    diff_prefix(AssetLocation::Backup, backup.as_ref(), &prefix, &referenced)
                        .await?,
                );
            }
        }

        info!(
            orphans = report.orphan_count(),
            missing = report.missing_count(),
            "Reconciliation scan finished"
        );
        Ok(report)
    }

    /// Deletes the orphans of one diff. Returns how many were removed.
    pub async fn delete_orphans(&self, diff: &PrefixDiff) -> Result<usize, ReconcileError> {
        let gateway = match diff.location {
            AssetLocation::Remote => self.remote.as_ref(),
            AssetLocation::Backup => match &self.backup {
                Some(backup) => backup.as_ref(),
                None => return Ok(0),
            },
        };

        let mut deleted = 0;
        for orphan in &diff.orphans {
            match gateway.delete(&orphan.path).await {
                Ok(()) => deleted += 1,
                Err(TransferError::NotFound { .. }) => {
                    warn!(path = %orphan.path, "Orphan already gone");
                }
                Err(e) => return Err(e.into()),
            }
        }
        info!(location = %diff.location, prefix = %diff.prefix, deleted, "Deleted orphans");
        Ok(deleted)
    }
}

async fn diff_prefix(
    location: AssetLocation,
    gateway: &dyn TransferGateway,
    prefix: &str,
    referenced: &BTreeSet<String>,
) -> Result<PrefixDiff, ReconcileError> {
    let entries = match gateway.list(prefix).await {
        Ok(entries) => entries,
        Err(TransferError::NotFound { .. }) => Vec::new(),
        Err(e) => return Err(e.into()),
    };

    let present: BTreeSet<&str> = entries
        .iter()
        .filter(|e| !e.is_dir)
        .map(|e| e.path.as_str())
        .collect();
    let orphans = entries
        .iter()
        .filter(|e| !e.is_dir && !referenced.contains(&e.path))
        .cloned()
        .collect();
    let missing = referenced
        .iter()
        .filter(|path| parent_of(path) == prefix.trim_end_matches('/'))
        .filter(|path| !present.contains(path.as_str()))
        .cloned()
        .collect();

    Ok(PrefixDiff {
        location,
        prefix: prefix.to_string(),
        orphans,
        missing,
    })
}

fn parent_of(path: &str) -> &str {
    path.rsplit_once('/').map(|(parent, _)| parent).unwrap_or("")
}
