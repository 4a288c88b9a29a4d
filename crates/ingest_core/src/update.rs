use ingest_logging::{ingest_debug, ingest_info, ingest_warn};

use crate::{AppState, Effect, Msg};

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: AppState, msg: Msg) -> (AppState, Vec<Effect>) {
    let effects = match msg {
        Msg::RunStarted { run_id, jobs } => {
            let mut effects = Vec::with_capacity(state.jobs().len() + 1);
            if let Some(previous) = state.active_run() {
                ingest_info!("Run {} superseded by run {}", previous, run_id);
                effects.push(Effect::CancelRun { run_id: previous });
            }
            let job_count = jobs.len();
            let released = state.begin_run(run_id, jobs);
            effects.extend(released.into_iter().map(|preview| Effect::ReleasePreview {
                preview_id: preview.id,
            }));
            ingest_info!("Run {} started with {} jobs", run_id, job_count);
            effects
        }
        Msg::Job {
            run_id,
            job_id,
            event,
        } => {
            if state.active_run() != Some(run_id) {
                ingest_debug!("Dropping event for inactive run {} job {}", run_id, job_id);
                return (state, Vec::new());
            }
            let Some(job) = state.job_by_id_mut(job_id) else {
                ingest_debug!("Dropping event for removed job {}", job_id);
                return (state, Vec::new());
            };
            let from = job.status();
            match job.apply(event) {
                Ok(to) => {
                    ingest_debug!("Job {} ({}): {} -> {}", job_id, job.filename(), from, to);
                    state.mark_dirty();
                }
                Err(rejected) => {
                    ingest_warn!("Job {} rejected transition: {}", job_id, rejected);
                }
            }
            Vec::new()
        }
        Msg::RunFinished { run_id } => {
            if state.active_run() == Some(run_id) {
                state.end_run();
                ingest_info!("Run {} finished", run_id);
            }
            Vec::new()
        }
        Msg::StopRequested => match state.end_run() {
            Some(run_id) => {
                ingest_info!("Run {} stopped", run_id);
                vec![Effect::CancelRun { run_id }]
            }
            None => Vec::new(),
        },
        Msg::RemoveJob { index } => match state.remove_job(index) {
            Some(mut job) => {
                ingest_info!("Removed job {} ({})", index, job.filename());
                state.mark_dirty();
                job.take_preview()
                    .map(|preview| Effect::ReleasePreview {
                        preview_id: preview.id,
                    })
                    .into_iter()
                    .collect()
            }
            None => Vec::new(),
        },
        Msg::EditStructuredData { index, value } => {
            if let Some(job) = state.job_mut(index) {
                match job.apply(crate::JobEvent::Edited(value)) {
                    Ok(_) => state.mark_dirty(),
                    Err(rejected) => ingest_debug!("Ignoring edit of job {}: {}", index, rejected),
                }
            }
            Vec::new()
        }
    };

    (state, effects)
}
