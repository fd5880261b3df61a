//! Thumbnail generation for a job.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::debug;

use super::config::ThumbnailConfig;
use super::types::PipelineError;
use crate::config::RemotePathsConfig;
use crate::metrics;
use crate::store::{JobStore, Thumbnail};
use crate::tools::{render_variants, TransformRunner};
use crate::transfer::VerifiedTransfer;

/// Evenly spaced sample points: `duration / count * i` for `i` in `0..count`.
pub fn thumbnail_timestamps(duration_secs: f64, count: u32) -> Vec<f64> {
    if count == 0 || !duration_secs.is_finite() || duration_secs <= 0.0 {
        return Vec::new();
    }
    let segment = duration_secs / count as f64;
    (0..count).map(|i| segment * i as f64).collect()
}

/// Extracts frames, renders previews, uploads them and records the rows.
pub struct ThumbnailGenerator {
    store: Arc<dyn JobStore>,
    transfer: VerifiedTransfer,
    transforms: TransformRunner,
    config: ThumbnailConfig,
    remote: RemotePathsConfig,
    scratch_root: PathBuf,
}

impl ThumbnailGenerator {
    pub fn new(
        store: Arc<dyn JobStore>,
        transfer: VerifiedTransfer,
        transforms: TransformRunner,
        config: ThumbnailConfig,
        remote: RemotePathsConfig,
        scratch_root: PathBuf,
    ) -> Self {
        Self {
            store,
            transfer,
            transforms,
            config,
            remote,
            scratch_root,
        }
    }

    /// Local directory holding a job's frames.
    pub fn job_dir(&self, job_id: &str) -> PathBuf {
        self.scratch_root.join(job_id)
    }

    /// Generates `count` thumbnails of `source`. Returns the inserted rows.
    ///
    /// The job's existing rows and local directory are purged first, so a
    /// retried or resumed run ends with exactly `count` rows.
    pub async fn generate(
        &self,
        job_id: &str,
        source: &Path,
        duration_secs: f64,
        count: u32,
    ) -> Result<Vec<Thumbnail>, PipelineError> {
        let stale = self.store.delete_thumbnails(job_id)?;
        if stale > 0 {
            debug!(job_id = %job_id, stale, "Removed thumbnails of an earlier attempt");
        }

        let dir = self.job_dir(job_id);
        match fs::remove_dir_all(&dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        let timestamps = thumbnail_timestamps(duration_secs, count);
        if timestamps.is_empty() {
            debug!(job_id = %job_id, duration_secs, count, "No thumbnails to generate");
            return Ok(Vec::new());
        }

        for sub in ["original", "compressed", "placeholder"] {
            fs::create_dir_all(dir.join(sub)).await?;
        }

        let mut thumbnails = Vec::with_capacity(timestamps.len());
        for (index, timestamp) in timestamps.into_iter().enumerate() {
            let thumbnail = self
                .generate_one(job_id, source, &dir, index as u32, timestamp)
                .await?;
            self.store.insert_thumbnail(&thumbnail)?;
            metrics::THUMBNAILS_GENERATED.inc();
            thumbnails.push(thumbnail);
        }
        Ok(thumbnails)
    }

    async fn generate_one(
        &self,
        job_id: &str,
        source: &Path,
        dir: &Path,
        index: u32,
        timestamp_secs: f64,
    ) -> Result<Thumbnail, PipelineError> {
        let frame = dir.join("original").join(format!("{}.png", index));
        let compressed = dir.join("compressed").join(format!("{}.jpg", index));
        let placeholder = dir.join("placeholder").join(format!("{}.jpg", index));

        self.transforms
            .extract_frame(&frame, source, timestamp_secs)
            .await?;
        let resolution = render_variants(
            frame.clone(),
            vec![
                (self.config.compressed(), compressed.clone()),
                (self.config.placeholder(), placeholder.clone()),
            ],
        )
        .await?;

        let original_path = self
            .remote
            .thumbnail("Originals", &format!("{}_{}.png", job_id, index));
        let compressed_path = self
            .remote
            .thumbnail("Compressed", &format!("{}_{}.jpg", job_id, index));
        let placeholder_path = self
            .remote
            .thumbnail("Placeholders", &format!("{}_{}.jpg", job_id, index));

        self.transfer.upload(&frame, &original_path).await?;
        self.transfer.upload(&compressed, &compressed_path).await?;
        self.transfer.upload(&placeholder, &placeholder_path).await?;

        let aspect = resolution.aspect();
        Ok(Thumbnail {
            id: uuid::Uuid::new_v4().to_string(),
            job_id: job_id.to_string(),
            index,
            timestamp_secs,
            original_path,
            compressed_path,
            placeholder_path,
            x_scale: aspect.x,
            y_scale: aspect.y,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{NewJob, SqliteJobStore};
    use crate::testing::{MockToolRunner, MockTransfer};
    use crate::tools::ToolsConfig;
    use crate::transfer::{RetryConfig, RetryPolicy};
    use tempfile::TempDir;

    fn generator(temp: &TempDir, store: Arc<SqliteJobStore>) -> ThumbnailGenerator {
        let transfer = VerifiedTransfer::new(
            Arc::new(MockTransfer::new()),
            RetryPolicy::new(RetryConfig::default().with_max_attempts(1).without_delay()),
        );
        ThumbnailGenerator::new(
            store,
            transfer,
            TransformRunner::new(Arc::new(MockToolRunner::new()), ToolsConfig::default()),
            ThumbnailConfig::default(),
            RemotePathsConfig::default(),
            temp.path().join("thumbnails"),
        )
    }

    #[tokio::test]
    async fn test_regenerating_replaces_rows() {
        let temp = TempDir::new().unwrap();
        let store = Arc::new(SqliteJobStore::in_memory().unwrap());
        let job = store
            .create_job(NewJob::from_remote_path("Originals/a.mov"))
            .unwrap();
        let generator = generator(&temp, store.clone());
        let source = temp.path().join("a.mov");

        generator.generate(&job.id, &source, 12.0, 3).await.unwrap();
        generator.generate(&job.id, &source, 12.0, 3).await.unwrap();

        let rows = store.list_thumbnails(&job.id).unwrap();
        assert_eq!(rows.iter().map(|t| t.index).collect::<Vec<_>>(), vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_zero_count_clears_rows() {
        let temp = TempDir::new().unwrap();
        let store = Arc::new(SqliteJobStore::in_memory().unwrap());
        let job = store
            .create_job(NewJob::from_remote_path("Originals/a.mov"))
            .unwrap();
        let generator = generator(&temp, store.clone());
        let source = temp.path().join("a.mov");

        generator.generate(&job.id, &source, 12.0, 2).await.unwrap();
        let rows = generator.generate(&job.id, &source, 12.0, 0).await.unwrap();
        assert!(rows.is_empty());
        assert!(store.list_thumbnails(&job.id).unwrap().is_empty());
    }

    #[test]
    fn test_timestamps_evenly_spaced() {
        assert_eq!(thumbnail_timestamps(30.0, 3), vec![0.0, 10.0, 20.0]);
        assert_eq!(thumbnail_timestamps(5.0, 1), vec![0.0]);
    }

    #[test]
    fn test_no_timestamps_for_zero_count_or_duration() {
        assert!(thumbnail_timestamps(30.0, 0).is_empty());
        assert!(thumbnail_timestamps(0.0, 3).is_empty());
        assert!(thumbnail_timestamps(f64::NAN, 3).is_empty());
    }
}
