pub mod config;
pub mod geometry;
pub mod metrics;
pub mod pipeline;
pub mod reconcile;
pub mod store;
pub mod testing;
pub mod tools;
pub mod transfer;

pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, RemotePathsConfig,
    SanitizedConfig, ScratchConfig,
};
pub use geometry::{derive_encode_target, AspectRatio, EncodeTarget, Resolution};
pub use pipeline::{
    FailureKind, MediaConfig, MediaPipeline, PipelineConfig, PipelineError, RunOutcome, RunReport,
    ThumbnailConfig,
};
pub use reconcile::{
    AssetLocation, PrefixDiff, ReconcileError, ReconcileReport, ReconciliationSweep,
};
pub use store::{
    Job, JobStatus, JobStore, NewJob, SelectionPolicy, SqliteJobStore, StoreError, Thumbnail,
    VideoSequence,
};
pub use tools::{MediaProber, SystemToolRunner, ToolError, ToolRunner, TransformRunner};
pub use transfer::{
    build_gateway, build_verified, LocalMirrorTransfer, TransferError, TransferGateway,
    VerifiedTransfer,
};
