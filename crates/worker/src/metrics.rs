//! Prometheus metrics for the worker.
//!
//! The worker is a short-lived process, so instead of serving `/metrics` it
//! writes the text exposition to a file picked up by the node-exporter
//! textfile collector.

use std::path::Path;

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use prometheus::{self, Encoder, IntGauge, IntGaugeVec, Opts, Registry, TextEncoder};

use mediapress_core::{JobStatus, JobStore};

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

/// Jobs by current status (collected dynamically).
pub static JOBS_BY_STATUS: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("mediapress_jobs_by_status", "Current job count by status"),
        &["status"],
    )
    .unwrap()
});

/// Unix time of the last finished run.
pub static LAST_RUN_TIMESTAMP: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "mediapress_last_run_timestamp_seconds",
        "Unix time the last worker run finished",
    )
    .unwrap()
});

fn register_metrics(registry: &Registry) {
    registry
        .register(Box::new(JOBS_BY_STATUS.clone()))
        .unwrap();
    registry
        .register(Box::new(LAST_RUN_TIMESTAMP.clone()))
        .unwrap();

    // Core metrics (pipeline, transfers, tools)
    for metric in mediapress_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .context("Failed to encode metrics")?;
    String::from_utf8(buffer).context("Metrics are not UTF-8")
}

/// Refreshes the gauges from the store.
pub fn collect_dynamic_metrics(store: &dyn JobStore) -> Result<()> {
    let jobs = store.list_all().context("Failed to list jobs")?;
    for status in [
        JobStatus::Unprocessed,
        JobStatus::Processing,
        JobStatus::Complete,
        JobStatus::Error,
        JobStatus::Reprocess,
    ] {
        let count = jobs.iter().filter(|j| j.status == status).count();
        JOBS_BY_STATUS
            .with_label_values(&[status.as_str()])
            .set(count as i64);
    }
    LAST_RUN_TIMESTAMP.set(chrono::Utc::now().timestamp());
    Ok(())
}

/// Writes the exposition atomically: temp file, then rename.
pub fn write_textfile(path: &Path) -> Result<()> {
    let text = encode_metrics()?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {:?}", parent))?;
    }
    let tmp = path.with_extension("prom.tmp");
    std::fs::write(&tmp, text).with_context(|| format!("Failed to write {:?}", tmp))?;
    std::fs::rename(&tmp, path).with_context(|| format!("Failed to rename to {:?}", path))?;
    Ok(())
}
