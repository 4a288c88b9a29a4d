use std::future::Future;

use ingest_core::RunId;
use tokio_util::sync::CancellationToken;

use crate::{StageError, StageKind};

/// Cancellation token of one run, tagged with the run it belongs to.
#[derive(Debug, Clone)]
pub struct RunToken {
    run_id: RunId,
    cancel: CancellationToken,
}

impl RunToken {
    pub fn new(run_id: RunId) -> Self {
        Self {
            run_id,
            cancel: CancellationToken::new(),
        }
    }

    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }

    /// Runs a stage call, aborting it as soon as the token fires.
    ///
    /// A result that completes after cancellation is discarded.
    pub async fn guard<T, F>(&self, stage: StageKind, call: F) -> Result<T, StageError>
    where
        F: Future<Output = Result<T, StageError>>,
    {
        if self.is_cancelled() {
            return Err(StageError::cancelled(stage));
        }
        let result = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(StageError::cancelled(stage)),
            result = call => result,
        };
        if self.is_cancelled() {
            return Err(StageError::cancelled(stage));
        }
        result
    }
}
