mod metrics;

use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use sha2::{Digest, Sha256};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use mediapress_core::config::join_remote;
use mediapress_core::transfer::LocalMirrorConfig;
use mediapress_core::{
    build_gateway, build_verified, load_config, validate_config, Config, JobStore,
    LocalMirrorTransfer, MediaPipeline, NewJob, ReconciliationSweep, RunOutcome, SanitizedConfig,
    SqliteJobStore, SystemToolRunner,
};

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser, Debug)]
#[command(name = "mediapress")]
#[command(about = "Compress, thumbnail, stitch and republish uploaded videos", long_about = None)]
struct Cli {
    /// Config file (falls back to MEDIAPRESS_CONFIG, then mediapress.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Recover stale claims, process one job, then stitch one sequence
    Run,
    /// Queue an uploaded original for processing
    Enqueue {
        /// Remote path of the original, or a file name under the originals prefix
        remote_path: String,
    },
    /// Stitch published jobs, in order, into a new job
    Stitch {
        #[arg(required = true, num_args = 1..)]
        member_ids: Vec<String>,
    },
    /// Redo a job from scratch, purging its thumbnails
    Reprocess { job_id: String },
    /// Compare store records with remote and backup listings
    Reconcile {
        /// Offer to delete orphaned files, prefix by prefix
        #[arg(long)]
        delete_orphans: bool,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.json_logs);

    if let Err(e) = run(cli).await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

fn config_path(cli: &Cli) -> PathBuf {
    cli.config
        .clone()
        .or_else(|| std::env::var("MEDIAPRESS_CONFIG").ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("mediapress.toml"))
}

async fn run(cli: Cli) -> Result<()> {
    let config_path = config_path(&cli);
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;
    validate_config(&config).context("Configuration validation failed")?;

    let sanitized = SanitizedConfig::from(&config);
    let config_json = serde_json::to_string(&sanitized).unwrap_or_default();
    let config_hash = format!("{:x}", Sha256::digest(config_json.as_bytes()));
    info!(
        version = VERSION,
        config_hash = &config_hash[..16],
        "Configuration loaded"
    );
    info!("Effective configuration: {}", config_json);

    let store: Arc<dyn JobStore> = Arc::new(
        SqliteJobStore::new(&config.store.path).context("Failed to open job store")?,
    );

    match cli.command {
        Command::Run => run_pipeline(&config, store).await,
        Command::Enqueue { remote_path } => enqueue(&config, store.as_ref(), &remote_path),
        Command::Stitch { member_ids } => stitch(&config, store.as_ref(), &member_ids),
        Command::Reprocess { job_id } => {
            let job = store
                .mark_reprocess(&job_id)
                .with_context(|| format!("Failed to mark job {} for reprocessing", job_id))?;
            info!(job_id = %job.id, "Job marked for reprocessing");
            println!("{}", job.id);
            Ok(())
        }
        Command::Reconcile { delete_orphans } => reconcile(&config, store, delete_orphans).await,
    }
}

async fn run_pipeline(config: &Config, store: Arc<dyn JobStore>) -> Result<()> {
    let transfer = build_verified(&config.transfer).context("Failed to create transfer backend")?;
    info!("Using transfer backend: {}", transfer.backend().name());

    let pipeline = MediaPipeline::new(
        config,
        Arc::clone(&store),
        transfer,
        Arc::new(SystemToolRunner::new()),
    );
    let report = pipeline.run_once().await;

    for (pipeline, outcome) in [("job", &report.job), ("sequence", &report.sequence)] {
        match outcome {
            RunOutcome::Failed { job_id, kind } => warn!(
                pipeline,
                job_id = job_id.as_deref().unwrap_or("-"),
                kind = %kind,
                "Run failed"
            ),
            other => info!(pipeline, outcome = other.label(), "Run finished"),
        }
    }
    println!("{}", serde_json::to_string_pretty(&report)?);

    if let Some(path) = &config.metrics.textfile_path {
        metrics::collect_dynamic_metrics(store.as_ref())?;
        metrics::write_textfile(path)?;
        info!("Metrics written to {:?}", path);
    }
    Ok(())
}

fn enqueue(config: &Config, store: &dyn JobStore, remote_path: &str) -> Result<()> {
    let remote = if remote_path.contains('/') {
        remote_path.to_string()
    } else {
        join_remote(&config.remote.originals_dir, remote_path)
    };
    let job = store
        .create_job(NewJob::from_remote_path(&remote))
        .context("Failed to create job")?;
    info!(job_id = %job.id, remote = %remote, "Job queued");
    println!("{}", job.id);
    Ok(())
}

fn stitch(config: &Config, store: &dyn JobStore, member_ids: &[String]) -> Result<()> {
    for id in member_ids {
        if store.get(id)?.is_none() {
            bail!("Unknown job {}", id);
        }
    }
    let target = store
        .create_job(NewJob::stitched(&config.media.compressed_extension))
        .context("Failed to create target job")?;
    let sequence = store
        .create_sequence(&target.id, member_ids)
        .context("Failed to create sequence")?;
    info!(
        sequence_id = %sequence.id,
        target_job_id = %target.id,
        members = member_ids.len(),
        "Sequence queued"
    );
    println!("{}", target.id);
    Ok(())
}

async fn reconcile(config: &Config, store: Arc<dyn JobStore>, delete_orphans: bool) -> Result<()> {
    let backend = build_gateway(&config.transfer).context("Failed to create transfer backend")?;
    let mut sweep = ReconciliationSweep::new(store, backend, config.remote.clone());
    if let Some(root) = &config.reconcile.backup_root {
        info!("Checking backup mirror at {:?}", root);
        sweep = sweep.with_backup(Arc::new(LocalMirrorTransfer::new(LocalMirrorConfig::new(
            root.clone(),
        ))));
    }

    let report = sweep.scan().await.context("Reconciliation scan failed")?;
    for diff in &report.diffs {
        println!(
            "[{}] {}: {} orphaned, {} missing",
            diff.location,
            diff.prefix,
            diff.orphans.len(),
            diff.missing.len()
        );
        for orphan in &diff.orphans {
            println!("  orphan  {} ({} bytes)", orphan.path, orphan.size);
        }
        for missing in &diff.missing {
            println!("  missing {}", missing);
        }
    }

    if !delete_orphans {
        return Ok(());
    }

    for diff in report.diffs.iter().filter(|d| !d.orphans.is_empty()) {
        let question = format!(
            "Delete {} orphaned files under {} ({})?",
            diff.orphans.len(),
            diff.prefix,
            diff.location
        );
        if confirm(&question)? {
            let deleted = sweep.delete_orphans(diff).await?;
            println!("Deleted {} files", deleted);
        } else {
            println!("Skipped");
        }
    }
    Ok(())
}

/// Asks a y/n question on stdin. Anything but `y`/`yes` is a no.
fn confirm(question: &str) -> Result<bool> {
    print!("{} [y/N] ", question);
    std::io::stdout().flush()?;
    let mut answer = String::new();
    std::io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}
