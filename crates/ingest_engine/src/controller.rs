use std::sync::{Arc, Mutex, MutexGuard};

use ingest_core::{
    update, AppState, AppViewModel, Effect, JobEvent, JobId, Msg, NewJob, RunId, StatusCounts,
};
use ingest_logging::{ingest_debug, ingest_info};
use serde_json::Value;

use crate::policy::{ProgressSink, RunOutcome, WorkItem};
use crate::{EngineError, InputFile, PreviewStore, RunParams, RunToken, StageClient};

/// Observer notified with a fresh view after every state change.
pub trait JobObserver: Send + Sync {
    fn on_change(&self, view: &AppViewModel);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub run_id: RunId,
    pub outcome: RunOutcome,
    pub counts: StatusCounts,
}

struct Shared {
    state: AppState,
    previews: PreviewStore,
    active: Option<RunToken>,
    next_run_id: RunId,
}

/// Owns the job list, the active run token and the preview resources.
///
/// At most one run is active; starting a new run cancels and replaces the
/// previous one.
pub struct BatchController {
    client: Arc<dyn StageClient>,
    shared: Mutex<Shared>,
    observer: Option<Arc<dyn JobObserver>>,
}

struct RunSink<'a> {
    controller: &'a BatchController,
    run_id: RunId,
}

impl ProgressSink for RunSink<'_> {
    fn emit(&self, job_id: JobId, event: JobEvent) {
        self.controller.dispatch(Msg::Job {
            run_id: self.run_id,
            job_id,
            event,
        });
    }

    fn is_live(&self, job_id: JobId) -> bool {
        let shared = self.controller.lock();
        shared.state.active_run() == Some(self.run_id) && shared.state.job_by_id(job_id).is_some()
    }
}

impl BatchController {
    pub fn new(client: Arc<dyn StageClient>) -> Self {
        Self::with_previews(client, PreviewStore::new())
    }

    pub fn with_previews(client: Arc<dyn StageClient>, previews: PreviewStore) -> Self {
        Self {
            client,
            shared: Mutex::new(Shared {
                state: AppState::new(),
                previews,
                active: None,
                next_run_id: 0,
            }),
            observer: None,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn JobObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Replaces the job list with one Pending job per file and drives the
    /// selected policy until it completes or is cancelled.
    pub async fn start(
        &self,
        files: Vec<InputFile>,
        params: RunParams,
    ) -> Result<RunSummary, EngineError> {
        let (token, items) = self.begin_run(files)?;
        let run_id = token.run_id();

        let sink = RunSink {
            controller: self,
            run_id,
        };
        let outcome = params
            .policy
            .run(self.client.as_ref(), &token, &params, &sink, &items)
            .await;

        self.dispatch(Msg::RunFinished { run_id });
        let mut shared = self.lock();
        if shared
            .active
            .as_ref()
            .is_some_and(|active| active.run_id() == run_id)
        {
            shared.active = None;
        }
        Ok(RunSummary {
            run_id,
            outcome,
            counts: shared.state.view().counts,
        })
    }

    /// Cancels the active run. Safe to call at any time.
    pub fn stop(&self) {
        self.dispatch(Msg::StopRequested);
    }

    /// Deletes the job at `index` and releases its preview.
    pub fn remove(&self, index: usize) -> bool {
        let (removed, view) = {
            let mut shared = self.lock();
            let before = shared.state.jobs().len();
            let view = Self::apply(&mut shared, Msg::RemoveJob { index });
            (shared.state.jobs().len() < before, view)
        };
        self.notify(view);
        removed
    }

    /// Overwrites the structured data of a successful job; no-op otherwise.
    pub fn update(&self, index: usize, value: Value) {
        self.dispatch(Msg::EditStructuredData { index, value });
    }

    pub fn view(&self) -> AppViewModel {
        self.lock().state.view()
    }

    pub fn is_running(&self) -> bool {
        self.lock().state.is_running()
    }

    pub fn preview_count(&self) -> usize {
        self.lock().previews.len()
    }

    fn begin_run(&self, files: Vec<InputFile>) -> Result<(RunToken, Vec<WorkItem>), EngineError> {
        let (token, items, view) = {
            let mut shared = self.lock();

            let mut jobs = Vec::with_capacity(files.len());
            for file in &files {
                match shared.previews.acquire(file) {
                    Ok(preview) => jobs.push(NewJob {
                        filename: file.filename.clone(),
                        preview,
                    }),
                    Err(err) => {
                        for job in &jobs {
                            shared.previews.release(job.preview.id);
                        }
                        return Err(err.into());
                    }
                }
            }

            shared.next_run_id += 1;
            let token = RunToken::new(shared.next_run_id);
            let view = Self::apply(
                &mut shared,
                Msg::RunStarted {
                    run_id: token.run_id(),
                    jobs,
                },
            );
            shared.active = Some(token.clone());

            let items = shared
                .state
                .jobs()
                .iter()
                .zip(files)
                .map(|(job, file)| WorkItem {
                    job_id: job.id(),
                    file,
                })
                .collect();
            (token, items, view)
        };

        self.notify(view);
        Ok((token, items))
    }

    fn dispatch(&self, msg: Msg) {
        let view = Self::apply(&mut self.lock(), msg);
        self.notify(view);
    }

    /// Runs the pure update and executes its effects. Returns a view when
    /// the state changed.
    fn apply(shared: &mut Shared, msg: Msg) -> Option<AppViewModel> {
        let state = std::mem::take(&mut shared.state);
        let (state, effects) = update(state, msg);
        shared.state = state;

        for effect in effects {
            match effect {
                Effect::CancelRun { run_id } => {
                    if let Some(active) = shared
                        .active
                        .take_if(|active| active.run_id() == run_id)
                    {
                        ingest_info!("Cancelling run {}", run_id);
                        active.cancel();
                    }
                }
                Effect::ReleasePreview { preview_id } => {
                    if shared.previews.release(preview_id) {
                        ingest_debug!("Released preview {}", preview_id);
                    }
                }
            }
        }

        shared.state.consume_dirty().then(|| shared.state.view())
    }

    fn notify(&self, view: Option<AppViewModel>) {
        if let (Some(observer), Some(view)) = (&self.observer, view) {
            observer.on_change(&view);
        }
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for BatchController {
    fn drop(&mut self) {
        let shared = self
            .shared
            .get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(active) = shared.active.take() {
            active.cancel();
        }
        shared.previews.release_all();
    }
}
