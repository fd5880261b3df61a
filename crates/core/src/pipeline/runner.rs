//! The media pipeline.
//!
//! One run handles at most one job and then at most one sequence:
//! - Job: select → claim → download → probe → thumbnails → compress →
//!   re-probe → upload → complete
//! - Sequence: select → claim target → download members → check geometry →
//!   concatenate → probe → thumbnails → upload → complete
//!
//! Every local file a run creates is tracked in a [`ScratchSpace`] and
//! removed on every exit path. Failures mark the job `Error` and end the run
//! normally.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio::fs;
use tracing::{debug, error, info, info_span, warn, Instrument};

use super::config::{MediaConfig, PipelineConfig};
use super::scratch::ScratchSpace;
use super::thumbnails::ThumbnailGenerator;
use super::types::{FailureKind, PipelineError, RunOutcome, RunReport};
use crate::config::{Config, RemotePathsConfig, ScratchConfig};
use crate::geometry::{derive_encode_target, Resolution};
use crate::metrics;
use crate::store::{Job, JobStatus, JobStore, SelectionPolicy, StoreError, VideoSequence};
use crate::tools::{
    with_extension, write_concat_manifest, MediaProbe, MediaProber, ToolRunner, TransformRunner,
};
use crate::transfer::VerifiedTransfer;

/// Runs the job and sequence pipelines against a store.
pub struct MediaPipeline {
    store: Arc<dyn JobStore>,
    transfer: VerifiedTransfer,
    prober: MediaProber,
    transforms: TransformRunner,
    thumbnails: ThumbnailGenerator,
    media: MediaConfig,
    remote: RemotePathsConfig,
    scratch: ScratchConfig,
    pipeline: PipelineConfig,
}

impl MediaPipeline {
    pub fn new(
        config: &Config,
        store: Arc<dyn JobStore>,
        transfer: VerifiedTransfer,
        runner: Arc<dyn ToolRunner>,
    ) -> Self {
        let transforms = TransformRunner::new(Arc::clone(&runner), config.tools.clone());
        let thumbnails = ThumbnailGenerator::new(
            Arc::clone(&store),
            transfer.clone(),
            transforms.clone(),
            config.thumbnails.clone(),
            config.remote.clone(),
            config.scratch.thumbnails_dir.clone(),
        );

        Self {
            prober: MediaProber::new(runner, config.tools.probe.clone()),
            store,
            transfer,
            transforms,
            thumbnails,
            media: config.media.clone(),
            remote: config.remote.clone(),
            scratch: config.scratch.clone(),
            pipeline: config.pipeline.clone(),
        }
    }

    fn policy(&self) -> SelectionPolicy {
        SelectionPolicy::new(self.pipeline.max_attempts)
    }

    /// Stale recovery, one job pass, then one sequence pass.
    pub async fn run_once(&self) -> RunReport {
        let recovered = match self.recover_stale() {
            Ok(ids) => ids,
            Err(e) => {
                error!(error = %e, "Stale claim recovery failed");
                Vec::new()
            }
        };
        let job = self.run_single_job().await;
        let sequence = self.run_sequence().await;

        RunReport {
            recovered,
            job,
            sequence,
        }
    }

    /// Resets jobs stuck in `Processing` longer than the configured window.
    pub fn recover_stale(&self) -> Result<Vec<String>, StoreError> {
        let window = chrono::Duration::seconds(self.pipeline.stale_processing_secs as i64);
        let ids = self.store.reset_stale_processing(Utc::now() - window)?;
        for id in &ids {
            warn!(job_id = %id, "Reset job stuck in processing");
            metrics::STALE_CLAIMS_RESET.inc();
        }
        Ok(ids)
    }

    /// Processes the oldest selectable job, if any.
    pub async fn run_single_job(&self) -> RunOutcome {
        let outcome = match self.store.select_oldest(&self.policy()) {
            Ok(None) => {
                debug!("No job to process");
                RunOutcome::Idle
            }
            Ok(Some(job)) => match self.claim(job) {
                Ok(Some(job)) => {
                    let span = info_span!("job", job_id = %job.id);
                    self.process_job(job).instrument(span).await
                }
                Ok(None) => RunOutcome::LostClaim,
                Err((job_id, e)) => {
                    error!(job_id = %job_id, error = %e, "Failed to claim job");
                    RunOutcome::Failed {
                        job_id: Some(job_id),
                        kind: FailureKind::Selection,
                    }
                }
            },
            Err(e) => {
                error!(error = %e, "Failed to select a job");
                RunOutcome::Failed {
                    job_id: None,
                    kind: FailureKind::Selection,
                }
            }
        };
        record_outcome("job", &outcome);
        outcome
    }

    /// Stitches the oldest ready sequence, if any.
    pub async fn run_sequence(&self) -> RunOutcome {
        let outcome = match self.select_sequence() {
            Ok(None) => {
                debug!("No sequence to stitch");
                RunOutcome::Idle
            }
            Ok(Some((sequence, target))) => match self.claim(target) {
                Ok(Some(target)) => {
                    let span = info_span!("sequence", sequence_id = %sequence.id, job_id = %target.id);
                    self.process_sequence(target, sequence).instrument(span).await
                }
                Ok(None) => RunOutcome::LostClaim,
                Err((job_id, e)) => {
                    error!(job_id = %job_id, error = %e, "Failed to claim sequence target");
                    RunOutcome::Failed {
                        job_id: Some(job_id),
                        kind: FailureKind::Selection,
                    }
                }
            },
            Err(e) => {
                error!(error = %e, "Failed to select a sequence");
                RunOutcome::Failed {
                    job_id: None,
                    kind: FailureKind::Selection,
                }
            }
        };
        record_outcome("sequence", &outcome);
        outcome
    }

    fn select_sequence(&self) -> Result<Option<(VideoSequence, Job)>, StoreError> {
        let Some(sequence) = self.store.select_ready_sequence(&self.policy())? else {
            return Ok(None);
        };
        let target = self
            .store
            .get(&sequence.target_job_id)?
            .ok_or_else(|| StoreError::NotFound(sequence.target_job_id.clone()))?;
        Ok(Some((sequence, target)))
    }

    /// Purges thumbnails of a `Reprocess` job, then claims it.
    ///
    /// Returns the claimed job, `None` when another run got there first.
    fn claim(&self, mut job: Job) -> Result<Option<Job>, (String, StoreError)> {
        let expected = job.status;
        if expected == JobStatus::Reprocess {
            let purged = self
                .store
                .delete_thumbnails(&job.id)
                .map_err(|e| (job.id.clone(), e))?;
            debug!(job_id = %job.id, purged, "Purged thumbnails before reprocessing");
        }

        if !self
            .store
            .claim(&job.id, expected, &self.policy())
            .map_err(|e| (job.id.clone(), e))?
        {
            info!(job_id = %job.id, "Job was claimed by another run");
            return Ok(None);
        }

        job.status = JobStatus::Processing;
        job.attempts += 1;
        job.last_error = None;
        Ok(Some(job))
    }

    async fn process_job(&self, mut job: Job) -> RunOutcome {
        info!(attempt = job.attempts, "Processing job");
        let mut scratch = ScratchSpace::new();
        let result = self.execute_job(&mut job, &mut scratch).await;
        scratch.cleanup().await;
        self.finish(job, result)
    }

    async fn process_sequence(&self, mut target: Job, sequence: VideoSequence) -> RunOutcome {
        info!(members = sequence.member_ids.len(), "Stitching sequence");
        let mut scratch = ScratchSpace::new();
        let result = self
            .execute_sequence(&mut target, &sequence, &mut scratch)
            .await;
        scratch.cleanup().await;
        self.finish(target, result)
    }

    async fn execute_job(
        &self,
        job: &mut Job,
        scratch: &mut ScratchSpace,
    ) -> Result<(), PipelineError> {
        let remote = job
            .original_path
            .clone()
            .ok_or_else(|| PipelineError::MissingSource {
                job_id: job.id.clone(),
            })?;
        self.ensure_scratch_dirs().await?;

        let source = scratch.track(
            self.scratch
                .originals_dir
                .join(format!("{}{}", job.id, job.original_extension)),
        );
        let bytes = timed("download", self.transfer.download(&remote, &source)).await?;
        debug!(remote = %remote, bytes, "Downloaded original");

        let probe = timed("probe", self.prober.probe(&source)).await?;
        self.record_probe(job, &probe)?;

        self.generate_thumbnails(job, &source, probe.duration_secs, scratch)
            .await?;

        let target = derive_encode_target(
            probe.resolution(),
            probe.frame_rate,
            self.media.max_short_side,
            self.media.max_frame_rate,
        );
        info!(
            width = target.width,
            height = target.height,
            frame_rate = target.frame_rate,
            "Compressing"
        );
        let ext = self.media.compressed_extension.as_str();
        let output_base = self.scratch.compressed_dir.join(&job.id);
        let output = scratch.track(with_extension(&output_base, ext));
        timed(
            "compress",
            self.transforms.compress(
                &source,
                &output_base,
                ext,
                &target,
                self.media.quality_level,
            ),
        )
        .await?;

        let compressed = timed("probe", self.prober.probe(&output)).await?;
        self.record_probe(job, &compressed)?;

        self.publish(job, &output).await
    }

    async fn execute_sequence(
        &self,
        target: &mut Job,
        sequence: &VideoSequence,
        scratch: &mut ScratchSpace,
    ) -> Result<(), PipelineError> {
        if sequence.member_ids.is_empty() {
            return Err(PipelineError::EmptySequence {
                sequence_id: sequence.id.clone(),
            });
        }
        self.ensure_scratch_dirs().await?;
        let ext = self.media.compressed_extension.as_str();

        let mut members = Vec::with_capacity(sequence.member_ids.len());
        for member_id in &sequence.member_ids {
            let remote = self
                .store
                .get(member_id)?
                .filter(Job::is_ready)
                .and_then(|m| m.compressed_path)
                .ok_or_else(|| PipelineError::MissingMember {
                    member_id: member_id.clone(),
                })?;
            let local = scratch.track(
                self.scratch
                    .compressed_dir
                    .join(format!("{}{}", member_id, ext)),
            );
            timed("download", self.transfer.download(&remote, &local)).await?;
            members.push((member_id.as_str(), local));
        }

        let mut baseline: Option<Resolution> = None;
        for (member_id, path) in &members {
            let actual = timed("probe", self.prober.probe(path)).await?.resolution();
            match baseline {
                None => baseline = Some(actual),
                Some(expected) if expected != actual => {
                    return Err(PipelineError::GeometryMismatch {
                        member_id: member_id.to_string(),
                        expected,
                        actual,
                    });
                }
                Some(_) => {}
            }
        }

        let paths: Vec<PathBuf> = members.into_iter().map(|(_, path)| path).collect();
        let manifest = write_concat_manifest(&self.scratch.compressed_dir, &paths).await?;
        scratch.track(manifest.clone());

        let output = scratch.track(
            self.scratch
                .compressed_dir
                .join(format!("{}{}", target.id, ext)),
        );
        timed(
            "concatenate",
            self.transforms.concatenate(&manifest, &output),
        )
        .await?;

        let probe = timed("probe", self.prober.probe(&output)).await?;
        self.record_probe(target, &probe)?;

        self.generate_thumbnails(target, &output, probe.duration_secs, scratch)
            .await?;

        self.publish(target, &output).await
    }

    async fn ensure_scratch_dirs(&self) -> Result<(), PipelineError> {
        fs::create_dir_all(&self.scratch.originals_dir).await?;
        fs::create_dir_all(&self.scratch.compressed_dir).await?;
        Ok(())
    }

    /// Stores display geometry, scale, duration and frame rate on the job.
    fn record_probe(&self, job: &mut Job, probe: &MediaProbe) -> Result<(), PipelineError> {
        let resolution = probe.resolution();
        let aspect = resolution.aspect();
        job.width = Some(resolution.width);
        job.height = Some(resolution.height);
        job.x_scale = Some(aspect.x);
        job.y_scale = Some(aspect.y);
        job.duration_secs = Some(probe.duration_secs);
        job.frame_rate = Some(probe.frame_rate);
        self.store.update_metadata(job)?;
        Ok(())
    }

    async fn generate_thumbnails(
        &self,
        job: &Job,
        source: &Path,
        duration_secs: f64,
        scratch: &mut ScratchSpace,
    ) -> Result<(), PipelineError> {
        scratch.track_dir(self.thumbnails.job_dir(&job.id));
        let generated = timed(
            "thumbnails",
            self.thumbnails.generate(
                &job.id,
                source,
                duration_secs,
                self.media.thumbnail_count,
            ),
        )
        .await?;
        debug!(count = generated.len(), "Generated thumbnails");
        Ok(())
    }

    async fn publish(&self, job: &mut Job, output: &Path) -> Result<(), PipelineError> {
        let remote = self
            .remote
            .compressed(&job.compressed_file_name(&self.media.compressed_extension));
        let bytes = timed("upload", self.transfer.upload(output, &remote)).await?;
        info!(remote = %remote, bytes, "Published");
        job.compressed_path = Some(remote);
        Ok(())
    }

    /// Persists the terminal status of a claimed job.
    fn finish(&self, mut job: Job, result: Result<(), PipelineError>) -> RunOutcome {
        let outcome = match result {
            Ok(()) => {
                job.status = JobStatus::Complete;
                job.last_error = None;
                RunOutcome::Completed {
                    job_id: job.id.clone(),
                }
            }
            Err(e) => {
                let kind = e.kind();
                error!(kind = %kind, error = %e, "Job failed");
                job.status = JobStatus::Error;
                job.last_error = Some(e.to_string());
                RunOutcome::Failed {
                    job_id: Some(job.id.clone()),
                    kind,
                }
            }
        };

        if let Err(e) = self.store.update_status(&job) {
            error!(error = %e, status = %job.status, "Failed to persist job status");
            return RunOutcome::Failed {
                job_id: Some(job.id),
                kind: FailureKind::Unknown,
            };
        }

        if let RunOutcome::Completed { .. } = outcome {
            info!("Job complete");
        }
        outcome
    }
}

async fn timed<T, E>(stage: &str, fut: impl Future<Output = Result<T, E>>) -> Result<T, E> {
    let start = Instant::now();
    let result = fut.await;
    metrics::STAGE_DURATION
        .with_label_values(&[stage])
        .observe(start.elapsed().as_secs_f64());
    result
}

fn record_outcome(pipeline: &str, outcome: &RunOutcome) {
    metrics::PIPELINE_RUNS_TOTAL
        .with_label_values(&[pipeline, outcome.label()])
        .inc();
    if let RunOutcome::Failed { kind, .. } = outcome {
        metrics::JOB_FAILURES_TOTAL
            .with_label_values(&[kind.as_str()])
            .inc();
    }
}
