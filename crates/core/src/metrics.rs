//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Pipeline runs (results, stage durations)
//! - Transfers (bytes moved, retries)
//! - External tools (invocations by tool and result)

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Pipeline Metrics
// =============================================================================

/// Pipeline runs by kind and result.
pub static PIPELINE_RUNS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("mediapress_pipeline_runs_total", "Total pipeline runs"),
        &["pipeline", "result"], // pipeline: "job", "sequence"; result: "idle", "completed", "failed", "lost_claim"
    )
    .unwrap()
});

/// Failed jobs by failure kind.
pub static JOB_FAILURES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("mediapress_job_failures_total", "Total failed jobs by kind"),
        &["kind"],
    )
    .unwrap()
});

/// Stage duration in seconds.
pub static STAGE_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "mediapress_stage_duration_seconds",
            "Duration of individual pipeline stages",
        )
        .buckets(vec![
            0.1, 0.5, 1.0, 5.0, 15.0, 30.0, 60.0, 300.0, 900.0, 1800.0, 3600.0,
        ]),
        &["stage"], // "download", "probe", "thumbnails", "compress", "concatenate", "upload"
    )
    .unwrap()
});

/// Jobs reset from a stale Processing claim.
pub static STALE_CLAIMS_RESET: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "mediapress_stale_claims_reset_total",
        "Total jobs reset after being stuck in processing",
    )
    .unwrap()
});

/// Thumbnails generated.
pub static THUMBNAILS_GENERATED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "mediapress_thumbnails_generated_total",
        "Total thumbnails generated",
    )
    .unwrap()
});

// =============================================================================
// Transfer Metrics
// =============================================================================

/// Bytes moved by direction.
pub static TRANSFER_BYTES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "mediapress_transfer_bytes_total",
            "Total bytes moved by verified transfers",
        ),
        &["direction"], // "download", "upload"
    )
    .unwrap()
});

/// Transfer attempts that were retried.
pub static TRANSFER_RETRIES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "mediapress_transfer_retries_total",
        "Total transfer attempts that were retried",
    )
    .unwrap()
});

// =============================================================================
// Tool Metrics
// =============================================================================

/// Tool invocations by tool and result.
pub static TOOL_INVOCATIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "mediapress_tool_invocations_total",
            "Total external tool invocations",
        ),
        &["tool", "result"], // result: "success", "failure"
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Pipeline
        Box::new(PIPELINE_RUNS_TOTAL.clone()),
        Box::new(JOB_FAILURES_TOTAL.clone()),
        Box::new(STAGE_DURATION.clone()),
        Box::new(STALE_CLAIMS_RESET.clone()),
        Box::new(THUMBNAILS_GENERATED.clone()),
        // Transfers
        Box::new(TRANSFER_BYTES_TOTAL.clone()),
        Box::new(TRANSFER_RETRIES_TOTAL.clone()),
        // Tools
        Box::new(TOOL_INVOCATIONS_TOTAL.clone()),
    ]
}
