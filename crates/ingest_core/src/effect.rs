use crate::{PreviewId, RunId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Signal the cancellation token of `run_id`.
    CancelRun { run_id: RunId },
    /// Free the preview resource owned by a removed or superseded job.
    ReleasePreview { preview_id: PreviewId },
}
