use serde_json::Value;

use crate::{JobEvent, JobId, PreviewHandle, RunId};

/// Job to create when a run starts; the preview is already acquired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewJob {
    pub filename: String,
    pub preview: PreviewHandle,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Msg {
    /// A new run replaces the job list with one Pending job per file.
    RunStarted { run_id: RunId, jobs: Vec<NewJob> },
    /// Scheduling policy progress for one job of a run.
    Job {
        run_id: RunId,
        job_id: JobId,
        event: JobEvent,
    },
    /// The policy of a run returned.
    RunFinished { run_id: RunId },
    /// User clicked Stop.
    StopRequested,
    /// User removed the job at `index`.
    RemoveJob { index: usize },
    /// User edited the structured result of the job at `index`.
    EditStructuredData { index: usize, value: Value },
}
