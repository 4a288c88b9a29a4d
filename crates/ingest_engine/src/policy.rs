use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::time::Instant;

use ingest_core::{JobEvent, JobId};
use ingest_logging::{ingest_debug, ingest_info, ingest_warn};
use serde::{Deserialize, Serialize};

use crate::{InputFile, RunParams, RunToken, StageClient, StageError};

/// Receives per-job progress from a running policy.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, job_id: JobId, event: JobEvent);

    /// False once the job has left the run, e.g. after a removal.
    fn is_live(&self, job_id: JobId) -> bool;
}

/// One job as seen by a policy: its identity and its input.
#[derive(Debug, Clone)]
pub struct WorkItem {
    pub job_id: JobId,
    pub file: InputFile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    Cancelled,
}

/// How jobs are sequenced through the OCR and parse stages.
///
/// All policies walk the jobs in input order, one job at a time, and never retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SchedulingPolicy {
    /// One combined OCR+parse call per job; both models stay resident.
    #[default]
    Performance,
    /// OCR every job, unload once, then parse every job.
    Batch,
    /// OCR, unload, parse for each job in turn.
    LowVram,
}

impl SchedulingPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            SchedulingPolicy::Performance => "performance",
            SchedulingPolicy::Batch => "batch",
            SchedulingPolicy::LowVram => "low-vram",
        }
    }

    pub async fn run(
        self,
        client: &dyn StageClient,
        token: &RunToken,
        params: &RunParams,
        sink: &dyn ProgressSink,
        items: &[WorkItem],
    ) -> RunOutcome {
        let pipeline = Pipeline {
            client,
            token,
            params,
            sink,
        };
        ingest_info!(
            "Run {}: {} policy over {} jobs",
            token.run_id(),
            self,
            items.len()
        );
        let outcome = match self {
            SchedulingPolicy::Performance => pipeline.performance(items).await,
            SchedulingPolicy::Batch => pipeline.batch(items).await,
            SchedulingPolicy::LowVram => pipeline.low_vram(items).await,
        };
        ingest_info!("Run {}: {:?}", token.run_id(), outcome);
        outcome
    }
}

impl fmt::Display for SchedulingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SchedulingPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "performance" => Ok(SchedulingPolicy::Performance),
            "batch" => Ok(SchedulingPolicy::Batch),
            "low-vram" | "lowvram" => Ok(SchedulingPolicy::LowVram),
            other => Err(format!(
                "unknown scheduling policy `{other}` (expected performance, batch or low-vram)"
            )),
        }
    }
}

enum Step<T> {
    Done(T),
    Failed,
    Cancelled,
}

struct Pipeline<'a> {
    client: &'a dyn StageClient,
    token: &'a RunToken,
    params: &'a RunParams,
    sink: &'a dyn ProgressSink,
}

impl Pipeline<'_> {
    /// Shared per-stage primitive: awaits one stage call for a Processing job
    /// and resolves failures and cancellation onto that job.
    async fn step<T>(
        &self,
        item: &WorkItem,
        call: impl Future<Output = Result<T, StageError>>,
    ) -> Step<T> {
        match call.await {
            Ok(value) => Step::Done(value),
            Err(err) if err.is_cancelled() => {
                ingest_debug!("Job {} cancelled during {}", item.job_id, err.stage);
                self.sink.emit(item.job_id, JobEvent::Cancelled);
                Step::Cancelled
            }
            Err(err) => {
                ingest_warn!("Job {} ({}) failed: {}", item.job_id, item.file.filename, err);
                self.sink.emit(item.job_id, JobEvent::Failed(err.message));
                Step::Failed
            }
        }
    }

    /// Advisory unload. Only cancellation is reported back.
    async fn unload(&self) -> Step<()> {
        match self.client.unload(self.token).await {
            Ok(()) => {
                ingest_debug!("Run {}: vision model unloaded", self.token.run_id());
                Step::Done(())
            }
            Err(err) if err.is_cancelled() => Step::Cancelled,
            Err(err) => {
                ingest_warn!("Run {}: unload failed, continuing: {}", self.token.run_id(), err);
                Step::Done(())
            }
        }
    }

    fn removed(&self, item: &WorkItem) -> bool {
        let removed = !self.sink.is_live(item.job_id);
        if removed {
            ingest_debug!("Job {} ({}) was removed, skipping", item.job_id, item.file.filename);
        }
        removed
    }

    fn start(&self, item: &WorkItem) -> Instant {
        self.sink.emit(item.job_id, JobEvent::Started);
        Instant::now()
    }

    fn succeed(&self, item: &WorkItem, structured_data: serde_json::Value, elapsed_ms: u64) {
        self.sink.emit(
            item.job_id,
            JobEvent::Succeeded {
                structured_data,
                elapsed_ms,
            },
        );
    }

    async fn performance(&self, items: &[WorkItem]) -> RunOutcome {
        for item in items {
            if self.token.is_cancelled() {
                return RunOutcome::Cancelled;
            }
            if self.removed(item) {
                continue;
            }
            let started = self.start(item);
            let call = self
                .client
                .combined_process(&item.file, self.params, self.token);
            match self.step(item, call).await {
                Step::Done(output) => {
                    self.sink.emit(item.job_id, JobEvent::RawOutput(output.markdown));
                    self.succeed(item, output.structured_data, elapsed_ms(started));
                }
                Step::Failed => {}
                Step::Cancelled => return RunOutcome::Cancelled,
            }
        }
        RunOutcome::Completed
    }

    async fn batch(&self, items: &[WorkItem]) -> RunOutcome {
        let mut extracted = Vec::with_capacity(items.len());
        for item in items {
            if self.token.is_cancelled() {
                return RunOutcome::Cancelled;
            }
            if self.removed(item) {
                continue;
            }
            let started = self.start(item);
            let call = self
                .client
                .extract(&item.file, self.params.quality, self.token);
            match self.step(item, call).await {
                Step::Done(markdown) => {
                    self.sink
                        .emit(item.job_id, JobEvent::RawOutput(markdown.clone()));
                    self.sink.emit(item.job_id, JobEvent::Parked);
                    extracted.push((item, markdown, elapsed_ms(started)));
                }
                Step::Failed => {}
                Step::Cancelled => return RunOutcome::Cancelled,
            }
        }
        ingest_info!(
            "Run {}: OCR phase done, {} of {} jobs extracted",
            self.token.run_id(),
            extracted.len(),
            items.len()
        );

        if let Step::Cancelled = self.unload().await {
            return RunOutcome::Cancelled;
        }

        for (item, markdown, ocr_ms) in extracted {
            if self.token.is_cancelled() {
                return RunOutcome::Cancelled;
            }
            if self.removed(item) {
                continue;
            }
            let started = self.start(item);
            let call = self
                .client
                .parse(&markdown, &item.file.filename, self.params, self.token);
            match self.step(item, call).await {
                Step::Done(data) => self.succeed(item, data, ocr_ms + elapsed_ms(started)),
                Step::Failed => {}
                Step::Cancelled => return RunOutcome::Cancelled,
            }
        }
        RunOutcome::Completed
    }

    async fn low_vram(&self, items: &[WorkItem]) -> RunOutcome {
        for item in items {
            if self.token.is_cancelled() {
                return RunOutcome::Cancelled;
            }
            if self.removed(item) {
                continue;
            }
            let started = self.start(item);
            let call = self
                .client
                .extract(&item.file, self.params.quality, self.token);
            let markdown = match self.step(item, call).await {
                Step::Done(markdown) => markdown,
                Step::Failed => continue,
                Step::Cancelled => return RunOutcome::Cancelled,
            };
            self.sink
                .emit(item.job_id, JobEvent::RawOutput(markdown.clone()));
            if self.removed(item) {
                continue;
            }

            if let Step::Cancelled = self.unload().await {
                self.sink.emit(item.job_id, JobEvent::Cancelled);
                return RunOutcome::Cancelled;
            }

            let call = self
                .client
                .parse(&markdown, &item.file.filename, self.params, self.token);
            match self.step(item, call).await {
                Step::Done(data) => self.succeed(item, data, elapsed_ms(started)),
                Step::Failed => {}
                Step::Cancelled => return RunOutcome::Cancelled,
            }
        }
        RunOutcome::Completed
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
