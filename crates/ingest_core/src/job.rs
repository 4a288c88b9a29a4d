use std::fmt;
use std::path::PathBuf;

use serde_json::Value;

use crate::{JobId, PreviewId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JobStatus {
    #[default]
    Pending,
    Processing,
    Success,
    Error,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Success => "success",
            JobStatus::Error => "error",
        };
        f.write_str(label)
    }
}

/// Locally addressable copy of a job's input, owned by exactly one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewHandle {
    pub id: PreviewId,
    pub path: PathBuf,
}

/// Everything that can happen to a single job.
#[derive(Debug, Clone, PartialEq)]
pub enum JobEvent {
    /// A stage call is about to be issued for this job.
    Started,
    /// OCR produced markdown; the job keeps its current status.
    RawOutput(String),
    /// OCR finished and parsing is deferred to a later phase.
    Parked,
    /// The in-flight call was aborted by cancellation.
    Cancelled,
    Succeeded {
        structured_data: Value,
        elapsed_ms: u64,
    },
    Failed(String),
    /// Manual edit of the structured result.
    Edited(Value),
}

impl JobEvent {
    fn name(&self) -> &'static str {
        match self {
            JobEvent::Started => "started",
            JobEvent::RawOutput(_) => "raw_output",
            JobEvent::Parked => "parked",
            JobEvent::Cancelled => "cancelled",
            JobEvent::Succeeded { .. } => "succeeded",
            JobEvent::Failed(_) => "failed",
            JobEvent::Edited(_) => "edited",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedEvent {
    pub status: JobStatus,
    pub event: &'static str,
}

impl fmt::Display for RejectedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "event `{}` not allowed in status {}", self.event, self.status)
    }
}

impl std::error::Error for RejectedEvent {}

/// Transition table. `None` means the event is not accepted in that status.
fn next_status(status: JobStatus, event: &JobEvent) -> Option<JobStatus> {
    use JobStatus::*;
    match (status, event) {
        (Pending, JobEvent::Started) => Some(Processing),
        (Processing, JobEvent::RawOutput(_)) => Some(Processing),
        (Processing, JobEvent::Parked) => Some(Pending),
        (Processing, JobEvent::Cancelled) => Some(Pending),
        (Processing, JobEvent::Succeeded { .. }) => Some(Success),
        (Processing, JobEvent::Failed(_)) => Some(Error),
        (Success, JobEvent::Edited(_)) => Some(Success),
        _ => None,
    }
}

/// One submitted file and its observable pipeline state.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    id: JobId,
    filename: String,
    status: JobStatus,
    raw_output: Option<String>,
    structured_data: Option<Value>,
    error: Option<String>,
    elapsed_ms: Option<u64>,
    preview: Option<PreviewHandle>,
}

impl Job {
    pub fn new(id: JobId, filename: impl Into<String>, preview: Option<PreviewHandle>) -> Self {
        Self {
            id,
            filename: filename.into(),
            status: JobStatus::Pending,
            raw_output: None,
            structured_data: None,
            error: None,
            elapsed_ms: None,
            preview,
        }
    }

    /// Single mutation entry point for a job.
    pub fn apply(&mut self, event: JobEvent) -> Result<JobStatus, RejectedEvent> {
        let next = next_status(self.status, &event).ok_or(RejectedEvent {
            status: self.status,
            event: event.name(),
        })?;

        match event {
            JobEvent::Started | JobEvent::Parked | JobEvent::Cancelled => {}
            JobEvent::RawOutput(markdown) => self.raw_output = Some(markdown),
            JobEvent::Succeeded {
                structured_data,
                elapsed_ms,
            } => {
                self.structured_data = Some(structured_data);
                self.elapsed_ms = Some(elapsed_ms);
            }
            JobEvent::Failed(message) => self.error = Some(message),
            JobEvent::Edited(value) => self.structured_data = Some(value),
        }
        if next != JobStatus::Error {
            self.error = None;
        }
        self.status = next;
        Ok(next)
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn raw_output(&self) -> Option<&str> {
        self.raw_output.as_deref()
    }

    pub fn structured_data(&self) -> Option<&Value> {
        self.structured_data.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn elapsed_ms(&self) -> Option<u64> {
        self.elapsed_ms
    }

    pub fn preview(&self) -> Option<&PreviewHandle> {
        self.preview.as_ref()
    }

    pub(crate) fn take_preview(&mut self) -> Option<PreviewHandle> {
        self.preview.take()
    }
}
