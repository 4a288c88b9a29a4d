use crate::view_model::{AppViewModel, JobRowView, StatusCounts};
use crate::{Job, JobStatus, NewJob, PreviewHandle};

pub type JobId = u64;
pub type RunId = u64;
pub type PreviewId = u64;

/// Dense, index-ordered job list plus the identity of the active run.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AppState {
    jobs: Vec<Job>,
    active_run: Option<RunId>,
    next_job_id: JobId,
    dirty: bool,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn view(&self) -> AppViewModel {
        let mut counts = StatusCounts::default();
        let jobs = self
            .jobs
            .iter()
            .enumerate()
            .map(|(index, job)| {
                counts.record(job.status());
                JobRowView {
                    index,
                    job_id: job.id(),
                    filename: job.filename().to_string(),
                    status: job.status(),
                    has_raw_output: job.raw_output().is_some(),
                    structured_data: job.structured_data().cloned(),
                    error: job.error().map(ToOwned::to_owned),
                    elapsed_ms: job.elapsed_ms(),
                    preview_path: job.preview().map(|p| p.path.clone()),
                }
            })
            .collect();

        AppViewModel {
            running: self.active_run.is_some(),
            jobs,
            counts,
        }
    }

    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    pub fn job(&self, index: usize) -> Option<&Job> {
        self.jobs.get(index)
    }

    pub fn job_by_id(&self, job_id: JobId) -> Option<&Job> {
        self.jobs.iter().find(|job| job.id() == job_id)
    }

    pub fn active_run(&self) -> Option<RunId> {
        self.active_run
    }

    pub fn is_running(&self) -> bool {
        self.active_run.is_some()
    }

    /// Returns whether state changed since the last call, clearing the flag.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::replace(&mut self.dirty, false)
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Replaces the job list wholesale, returning the previews of the old jobs.
    pub(crate) fn begin_run(&mut self, run_id: RunId, new_jobs: Vec<NewJob>) -> Vec<PreviewHandle> {
        let released = self
            .jobs
            .iter_mut()
            .filter_map(Job::take_preview)
            .collect();
        let mut next_id = self.next_job_id;
        self.jobs = new_jobs
            .into_iter()
            .map(|new_job| {
                next_id += 1;
                Job::new(next_id, new_job.filename, Some(new_job.preview))
            })
            .collect();
        self.next_job_id = next_id;
        self.active_run = Some(run_id);
        self.mark_dirty();
        released
    }

    /// Ends the active run; every job still Processing returns to Pending.
    pub(crate) fn end_run(&mut self) -> Option<RunId> {
        let run_id = self.active_run.take()?;
        for job in self
            .jobs
            .iter_mut()
            .filter(|job| job.status() == JobStatus::Processing)
        {
            let _ = job.apply(crate::JobEvent::Cancelled);
        }
        self.mark_dirty();
        Some(run_id)
    }

    pub(crate) fn job_by_id_mut(&mut self, job_id: JobId) -> Option<&mut Job> {
        self.jobs.iter_mut().find(|job| job.id() == job_id)
    }

    pub(crate) fn job_mut(&mut self, index: usize) -> Option<&mut Job> {
        self.jobs.get_mut(index)
    }

    pub(crate) fn remove_job(&mut self, index: usize) -> Option<Job> {
        (index < self.jobs.len()).then(|| self.jobs.remove(index))
    }
}
