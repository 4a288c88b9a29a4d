//! Ingest core: pure job state machine and view-model helpers.
mod effect;
mod job;
mod msg;
mod state;
mod submit;
mod update;
mod view_model;

pub use effect::Effect;
pub use job::{Job, JobEvent, JobStatus, PreviewHandle, RejectedEvent};
pub use msg::{Msg, NewJob};
pub use state::{AppState, JobId, PreviewId, RunId};
pub use submit::{filter_duplicate_submissions, SubmissionStats};
pub use update::update;
pub use view_model::{AppViewModel, JobRowView, StatusCounts};
