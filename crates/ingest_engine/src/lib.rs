//! Ingest engine: stage client IO, scheduling policies and the batch controller.
mod client;
mod controller;
mod export;
mod filename;
mod persist;
mod policy;
mod preview;
mod token;
mod types;

pub use client::{ClientSettings, ReqwestStageClient, StageClient};
pub use controller::{BatchController, JobObserver, RunSummary};
pub use export::{export_results, ExportError, ExportSummary, MANIFEST_FILENAME};
pub use filename::result_filename;
pub use persist::{ensure_output_dir, PersistError, ResultWriter};
pub use policy::{ProgressSink, RunOutcome, SchedulingPolicy, WorkItem};
pub use preview::{PreviewError, PreviewStore};
pub use token::RunToken;
pub use types::{
    CombinedOutput, EngineError, FailureKind, HostStatus, InputFile, QualityPreset, RunParams,
    StageError, StageKind,
};
