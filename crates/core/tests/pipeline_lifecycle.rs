//! Pipeline lifecycle integration tests.
//!
//! These tests drive jobs and sequences through the whole pipeline with a
//! mock transfer backend and a scripted tool runner:
//! unprocessed -> processing -> complete | error

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;

use mediapress_core::{
    testing::{fixtures, MockToolRunner, MockTransfer},
    transfer::{RetryPolicy, TransferGateway},
    Config, FailureKind, Job, JobStatus, JobStore, MediaPipeline, NewJob, RunOutcome,
    SelectionPolicy, SqliteJobStore, VerifiedTransfer,
};

const ORIGINALS: &str = "Resources/Videos/Originals";

/// Test helper holding the pipeline and its collaborators.
struct TestHarness {
    store: Arc<SqliteJobStore>,
    transfer: Arc<MockTransfer>,
    runner: Arc<MockToolRunner>,
    config: Config,
    temp_dir: TempDir,
}

impl TestHarness {
    fn new() -> Self {
        Self::with_config(|_| {})
    }

    fn with_config(adjust: impl FnOnce(&mut Config)) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let mut config = fixtures::config(temp_dir.path());
        adjust(&mut config);

        let store = Arc::new(
            SqliteJobStore::new(&config.store.path).expect("Failed to create job store"),
        );

        Self {
            store,
            transfer: Arc::new(MockTransfer::new()),
            runner: Arc::new(MockToolRunner::new()),
            config,
            temp_dir,
        }
    }

    fn pipeline(&self) -> MediaPipeline {
        let transfer = VerifiedTransfer::new(
            self.transfer.clone(),
            RetryPolicy::new(self.config.transfer.retry.clone()),
        );
        MediaPipeline::new(
            &self.config,
            self.store.clone(),
            transfer,
            self.runner.clone(),
        )
    }

    /// Uploads an original and queues a job for it.
    async fn enqueue(&self, name: &str) -> Job {
        let remote = format!("{}/{}", ORIGINALS, name);
        self.transfer
            .put_blob(&remote, name.as_bytes().repeat(64))
            .await;
        self.store
            .create_job(NewJob::from_remote_path(&remote))
            .expect("Failed to create job")
    }

    fn job(&self, id: &str) -> Job {
        self.store.get(id).unwrap().expect("job should exist")
    }

    /// Every file left anywhere under the scratch directories.
    fn scratch_leftovers(&self) -> Vec<PathBuf> {
        let mut found = Vec::new();
        walk(&self.temp_dir.path().join("scratch"), &mut found);
        found
    }

    fn assert_scratch_clean(&self) {
        let leftovers = self.scratch_leftovers();
        assert!(leftovers.is_empty(), "scratch not cleaned: {:?}", leftovers);
    }
}

fn walk(dir: &Path, found: &mut Vec<PathBuf>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            walk(&path, found);
        } else {
            found.push(path);
        }
    }
}

fn policy() -> SelectionPolicy {
    SelectionPolicy::new(1)
}

fn failed(job: &Job, kind: FailureKind) -> RunOutcome {
    RunOutcome::Failed {
        job_id: Some(job.id.clone()),
        kind,
    }
}

// =============================================================================
// Single job
// =============================================================================

#[tokio::test]
async fn test_job_happy_path() {
    let h = TestHarness::new();
    let job = h.enqueue("clip.mov").await;

    let outcome = h.pipeline().run_single_job().await;
    assert_eq!(
        outcome,
        RunOutcome::Completed {
            job_id: job.id.clone()
        }
    );

    let done = h.job(&job.id);
    assert_eq!(done.status, JobStatus::Complete);
    assert_eq!(done.attempts, 1);
    assert!(done.last_error.is_none());
    assert_eq!((done.width, done.height), (Some(1920), Some(1080)));
    assert_eq!((done.x_scale, done.y_scale), (Some(16), Some(9)));
    assert_eq!(done.duration_secs, Some(12.0));

    let compressed = format!("Resources/Videos/Compressed/{}.mp4", job.id);
    assert_eq!(done.compressed_path.as_deref(), Some(compressed.as_str()));
    assert!(h.transfer.blob(&compressed).await.is_some());

    // 1920x1080 bounded to a 720 short side, 30 fps kept
    let compress = h.runner.invocations_of("compress").await;
    assert_eq!(compress.len(), 1);
    assert_eq!(compress[0].args[3..], ["1280", "720", "24", "30"]);

    let thumbnails = h.store.list_thumbnails(&job.id).unwrap();
    assert_eq!(thumbnails.len(), 3);
    let timestamps: Vec<f64> = thumbnails.iter().map(|t| t.timestamp_secs).collect();
    assert_eq!(timestamps, vec![0.0, 4.0, 8.0]);
    assert_eq!(
        thumbnails[1].placeholder_path,
        format!("Resources/Thumbnails/Placeholders/{}_1.jpg", job.id)
    );
    assert_eq!((thumbnails[0].x_scale, thumbnails[0].y_scale), (16, 9));
    for t in &thumbnails {
        assert!(h.transfer.blob(&t.original_path).await.is_some());
        assert!(h.transfer.blob(&t.compressed_path).await.is_some());
        assert!(h.transfer.blob(&t.placeholder_path).await.is_some());
    }

    h.assert_scratch_clean();
}

#[tokio::test]
async fn test_rotated_source_uses_display_geometry() {
    let h = TestHarness::new();
    let job = h.enqueue("portrait.mov").await;
    // Local copies are named after the job id
    h.runner
        .set_probe_output(
            &format!("{}.mov", job.id),
            "width=1920\nheight=1080\navg_frame_rate=60/1\nduration=6.0\nTAG:rotate=90\n",
        )
        .await;

    h.pipeline().run_single_job().await;

    let compress = h.runner.invocations_of("compress").await;
    assert_eq!(compress[0].args[3..], ["720", "1280", "24", "30"]);
    let thumbnails = h.store.list_thumbnails(&job.id).unwrap();
    assert_eq!(thumbnails[1].timestamp_secs, 2.0);
}

#[tokio::test]
async fn test_nothing_to_do_is_idle() {
    let h = TestHarness::new();
    assert_eq!(h.pipeline().run_single_job().await, RunOutcome::Idle);
    assert_eq!(h.pipeline().run_sequence().await, RunOutcome::Idle);
}

#[tokio::test]
async fn test_complete_job_is_never_selected() {
    let h = TestHarness::new();
    h.enqueue("clip.mov").await;
    let pipeline = h.pipeline();

    assert!(matches!(
        pipeline.run_single_job().await,
        RunOutcome::Completed { .. }
    ));
    assert_eq!(pipeline.run_single_job().await, RunOutcome::Idle);
    assert_eq!(h.runner.invocations_of("compress").await.len(), 1);
}

#[tokio::test]
async fn test_jobs_are_processed_oldest_first() {
    let h = TestHarness::new();
    let first = h.enqueue("first.mov").await;
    let second = h.enqueue("second.mov").await;
    let pipeline = h.pipeline();

    assert_eq!(
        pipeline.run_single_job().await,
        RunOutcome::Completed { job_id: first.id }
    );
    assert_eq!(
        pipeline.run_single_job().await,
        RunOutcome::Completed { job_id: second.id }
    );
}

// =============================================================================
// Failures and cleanup
// =============================================================================

#[tokio::test]
async fn test_download_failure_marks_error_and_cleans_up() {
    let h = TestHarness::new();
    let job = h
        .store
        .create_job(NewJob::from_remote_path("Resources/Videos/Originals/gone.mov"))
        .unwrap();

    let outcome = h.pipeline().run_single_job().await;
    assert_eq!(outcome, failed(&job, FailureKind::Unknown));

    let errored = h.job(&job.id);
    assert_eq!(errored.status, JobStatus::Error);
    assert!(errored.last_error.unwrap().contains("gone.mov"));
    h.assert_scratch_clean();
}

#[tokio::test]
async fn test_truncated_download_is_integrity_failure() {
    let h = TestHarness::new();
    let job = h.enqueue("clip.mov").await;
    h.transfer.truncate_downloads(7).await;

    let outcome = h.pipeline().run_single_job().await;
    assert_eq!(outcome, failed(&job, FailureKind::TransferIntegrity));
    assert!(h.runner.recorded_invocations().await.is_empty());
    h.assert_scratch_clean();
}

#[tokio::test]
async fn test_probe_failure_marks_error_and_cleans_up() {
    let h = TestHarness::new();
    let job = h.enqueue("clip.mov").await;
    h.runner
        .set_probe_output(&format!("{}.mov", job.id), "codec_name=h264\nwidth=0\n")
        .await;

    let outcome = h.pipeline().run_single_job().await;
    assert_eq!(outcome, failed(&job, FailureKind::ProbeParse));
    assert_eq!(h.job(&job.id).status, JobStatus::Error);
    h.assert_scratch_clean();
}

#[tokio::test]
async fn test_compress_failure_marks_error_and_cleans_up() {
    let h = TestHarness::new();
    let job = h.enqueue("clip.mov").await;
    h.runner.fail_tool("compress", 1).await;

    let outcome = h.pipeline().run_single_job().await;
    assert_eq!(outcome, failed(&job, FailureKind::ToolInvocation));

    let errored = h.job(&job.id);
    assert_eq!(errored.status, JobStatus::Error);
    assert!(errored.compressed_path.is_none());
    // Thumbnails ran before the compressor, so their directory existed
    h.assert_scratch_clean();
}

#[tokio::test]
async fn test_upload_failure_marks_error_and_cleans_up() {
    let h = TestHarness::new();
    let job = h.enqueue("clip.mov").await;
    h.transfer.fail_uploads(true).await;

    let outcome = h.pipeline().run_single_job().await;
    assert_eq!(outcome, failed(&job, FailureKind::Unknown));
    assert_eq!(h.job(&job.id).status, JobStatus::Error);
    h.assert_scratch_clean();
}

#[tokio::test]
async fn test_error_jobs_respect_attempt_cap() {
    let h = TestHarness::new();
    let job = h.enqueue("clip.mov").await;
    h.runner.fail_tool("compress", 1).await;
    let pipeline = h.pipeline();

    assert_eq!(
        pipeline.run_single_job().await,
        failed(&job, FailureKind::ToolInvocation)
    );
    // Default cap of one attempt: errors are not retried
    assert_eq!(pipeline.run_single_job().await, RunOutcome::Idle);
}

#[tokio::test]
async fn test_error_jobs_retried_under_cap() {
    let h = TestHarness::with_config(|c| c.pipeline.max_attempts = 2);
    let job = h.enqueue("clip.mov").await;
    h.runner.fail_tool("compress", 1).await;
    let pipeline = h.pipeline();

    assert!(matches!(
        pipeline.run_single_job().await,
        RunOutcome::Failed { .. }
    ));
    // Thumbnails run before the compressor, so the failed attempt left rows
    assert_eq!(h.store.list_thumbnails(&job.id).unwrap().len(), 3);

    h.runner.clear_failures().await;
    assert_eq!(
        pipeline.run_single_job().await,
        RunOutcome::Completed {
            job_id: job.id.clone()
        }
    );
    let done = h.job(&job.id);
    assert_eq!(done.attempts, 2);
    assert!(done.last_error.is_none());
    assert_eq!(h.store.list_thumbnails(&job.id).unwrap().len(), 3);
    assert_eq!(pipeline.run_single_job().await, RunOutcome::Idle);
}

// =============================================================================
// Reprocess and recovery
// =============================================================================

#[tokio::test]
async fn test_reprocess_regenerates_thumbnails() {
    let h = TestHarness::new();
    let job = h.enqueue("clip.mov").await;
    let pipeline = h.pipeline();
    pipeline.run_single_job().await;
    assert_eq!(h.store.list_thumbnails(&job.id).unwrap().len(), 3);

    h.store.mark_reprocess(&job.id).unwrap();
    assert_eq!(
        pipeline.run_single_job().await,
        RunOutcome::Completed {
            job_id: job.id.clone()
        }
    );
    assert_eq!(h.store.list_thumbnails(&job.id).unwrap().len(), 3);
    assert_eq!(h.job(&job.id).attempts, 2);
}

#[tokio::test]
async fn test_reprocess_purges_thumbnails_before_claim() {
    let h = TestHarness::new();
    let job = h.enqueue("clip.mov").await;
    let pipeline = h.pipeline();
    pipeline.run_single_job().await;

    // Remove the original so the redo fails right after the claim
    h.transfer
        .delete(&format!("{}/clip.mov", ORIGINALS))
        .await
        .unwrap();
    h.store.mark_reprocess(&job.id).unwrap();

    assert!(matches!(
        pipeline.run_single_job().await,
        RunOutcome::Failed { .. }
    ));
    assert!(h.store.list_thumbnails(&job.id).unwrap().is_empty());
}

#[tokio::test]
async fn test_stale_processing_is_recovered_by_run_once() {
    let h = TestHarness::with_config(|c| c.pipeline.stale_processing_secs = 0);
    let job = h.enqueue("clip.mov").await;
    assert!(h.store.claim(&job.id, JobStatus::Unprocessed, &policy()).unwrap());
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;

    let report = h.pipeline().run_once().await;
    assert_eq!(report.recovered, vec![job.id.clone()]);
    assert_eq!(
        report.job,
        RunOutcome::Completed {
            job_id: job.id.clone()
        }
    );
    assert_eq!(report.sequence, RunOutcome::Idle);
    assert_eq!(h.store.list_thumbnails(&job.id).unwrap().len(), 3);
}

#[tokio::test]
async fn test_resumed_job_keeps_one_set_of_thumbnails() {
    let h = TestHarness::with_config(|c| {
        c.pipeline.max_attempts = 2;
        c.pipeline.stale_processing_secs = 0;
    });
    let job = h.enqueue("clip.mov").await;
    h.runner.fail_tool("compress", 1).await;
    let pipeline = h.pipeline();
    assert!(matches!(
        pipeline.run_single_job().await,
        RunOutcome::Failed { .. }
    ));
    assert_eq!(h.store.list_thumbnails(&job.id).unwrap().len(), 3);

    // A second run claimed it and died before finishing
    assert!(h
        .store
        .claim(&job.id, JobStatus::Error, &SelectionPolicy::new(2))
        .unwrap());
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;

    h.runner.clear_failures().await;
    let report = pipeline.run_once().await;
    assert_eq!(report.recovered, vec![job.id.clone()]);
    assert_eq!(
        report.job,
        RunOutcome::Completed {
            job_id: job.id.clone()
        }
    );

    let thumbnails = h.store.list_thumbnails(&job.id).unwrap();
    assert_eq!(
        thumbnails.iter().map(|t| t.index).collect::<Vec<_>>(),
        vec![0, 1, 2]
    );
}

#[tokio::test]
async fn test_fresh_processing_claim_is_left_alone() {
    let h = TestHarness::new();
    let job = h.enqueue("clip.mov").await;
    assert!(h.store.claim(&job.id, JobStatus::Unprocessed, &policy()).unwrap());

    let report = h.pipeline().run_once().await;
    assert!(report.recovered.is_empty());
    assert_eq!(report.job, RunOutcome::Idle);
    assert_eq!(h.job(&job.id).status, JobStatus::Processing);
}

// =============================================================================
// Sequences
// =============================================================================

/// Publishes `names` as complete jobs and queues a sequence of them.
async fn stitched(h: &TestHarness, names: &[&str]) -> (Vec<Job>, Job) {
    let pipeline = h.pipeline();
    let mut members = Vec::new();
    for name in names {
        let job = h.enqueue(name).await;
        assert!(matches!(
            pipeline.run_single_job().await,
            RunOutcome::Completed { .. }
        ));
        members.push(job);
    }

    let target = h.store.create_job(NewJob::stitched(".mp4")).unwrap();
    let ids: Vec<String> = members.iter().map(|m| m.id.clone()).collect();
    h.store.create_sequence(&target.id, &ids).unwrap();
    (members, target)
}

#[tokio::test]
async fn test_sequence_happy_path() {
    let h = TestHarness::new();
    let (members, target) = stitched(&h, &["a.mov", "b.mov", "c.mov"]).await;
    let pipeline = h.pipeline();

    // Targets are only picked up by the sequence pass
    assert_eq!(pipeline.run_single_job().await, RunOutcome::Idle);
    assert_eq!(
        pipeline.run_sequence().await,
        RunOutcome::Completed {
            job_id: target.id.clone()
        }
    );

    let concat = h.runner.invocations_of("concatenate").await;
    assert_eq!(concat.len(), 1);
    assert!(concat[0].args[1].ends_with(&format!("{}.mp4", target.id)));

    let done = h.job(&target.id);
    assert_eq!(done.status, JobStatus::Complete);
    assert_eq!(
        done.compressed_path,
        Some(format!("Resources/Videos/Compressed/{}.mp4", target.id))
    );
    assert_eq!(h.store.list_thumbnails(&target.id).unwrap().len(), 3);

    // The mock concatenator copies the manifest: members in sequence order
    let stitched = h.transfer.blob(done.compressed_path.as_deref().unwrap()).await.unwrap();
    let manifest = String::from_utf8(stitched).unwrap();
    let order: Vec<usize> = members
        .iter()
        .map(|m| manifest.find(&format!("{}.mp4", m.id)).unwrap())
        .collect();
    assert!(order.windows(2).all(|w| w[0] < w[1]));

    h.assert_scratch_clean();
    assert_eq!(pipeline.run_sequence().await, RunOutcome::Idle);
}

#[tokio::test]
async fn test_sequence_waits_for_members() {
    let h = TestHarness::new();
    let (_, target) = stitched(&h, &["a.mov"]).await;
    let pending = h.enqueue("late.mov").await;
    let other_target = h.store.create_job(NewJob::stitched(".mp4")).unwrap();
    h.store
        .create_sequence(&other_target.id, &[pending.id.clone()])
        .unwrap();

    let pipeline = h.pipeline();
    assert_eq!(
        pipeline.run_sequence().await,
        RunOutcome::Completed { job_id: target.id }
    );
    // `late.mov` is still unprocessed
    assert_eq!(pipeline.run_sequence().await, RunOutcome::Idle);
}

#[tokio::test]
async fn test_sequence_geometry_mismatch_fails_before_concatenate() {
    let h = TestHarness::new();
    let (members, target) = stitched(&h, &["a.mov", "b.mov"]).await;
    h.runner
        .set_probe_output(
            &format!("{}.mp4", members[1].id),
            &fixtures::probe_output(1280, 720, 5.0),
        )
        .await;

    let outcome = h.pipeline().run_sequence().await;
    assert_eq!(outcome, failed(&target, FailureKind::GeometryMismatch));
    assert!(h.runner.invocations_of("concatenate").await.is_empty());

    let errored = h.job(&target.id);
    assert_eq!(errored.status, JobStatus::Error);
    assert!(errored.last_error.unwrap().contains(&members[1].id));
    h.assert_scratch_clean();
}

#[tokio::test]
async fn test_sequence_concatenate_failure_cleans_up() {
    let h = TestHarness::new();
    let (_, target) = stitched(&h, &["a.mov", "b.mov"]).await;
    h.runner.fail_tool("concatenate", 2).await;

    let outcome = h.pipeline().run_sequence().await;
    assert_eq!(outcome, failed(&target, FailureKind::ToolInvocation));
    h.assert_scratch_clean();
}
