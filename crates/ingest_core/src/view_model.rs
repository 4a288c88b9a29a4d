use std::path::PathBuf;

use serde_json::Value;

use crate::{JobId, JobStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatusCounts {
    pub pending: usize,
    pub processing: usize,
    pub success: usize,
    pub error: usize,
}

impl StatusCounts {
    pub(crate) fn record(&mut self, status: JobStatus) {
        match status {
            JobStatus::Pending => self.pending += 1,
            JobStatus::Processing => self.processing += 1,
            JobStatus::Success => self.success += 1,
            JobStatus::Error => self.error += 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AppViewModel {
    pub running: bool,
    pub jobs: Vec<JobRowView>,
    pub counts: StatusCounts,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JobRowView {
    pub index: usize,
    pub job_id: JobId,
    pub filename: String,
    pub status: JobStatus,
    pub has_raw_output: bool,
    pub structured_data: Option<Value>,
    pub error: Option<String>,
    pub elapsed_ms: Option<u64>,
    pub preview_path: Option<PathBuf>,
}
