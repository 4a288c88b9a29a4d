use std::collections::HashMap;
use std::sync::Mutex;

use ingest_core::{AppViewModel, JobId, JobRowView, JobStatus};
use ingest_engine::{HostStatus, JobObserver};
use serde_json::{json, Value};

/// Prints one line to stderr whenever a job changes status.
#[derive(Default)]
pub struct TerminalObserver {
    seen: Mutex<HashMap<JobId, JobStatus>>,
}

impl JobObserver for TerminalObserver {
    fn on_change(&self, view: &AppViewModel) {
        let mut seen = self.seen.lock().unwrap_or_else(|p| p.into_inner());
        for line in status_changes(&mut seen, view) {
            eprintln!("{line}");
        }
    }
}

/// Lines describing every job whose status differs from `seen`. Updates `seen`.
pub fn status_changes(seen: &mut HashMap<JobId, JobStatus>, view: &AppViewModel) -> Vec<String> {
    let total = view.jobs.len();
    let done = view.counts.success + view.counts.error;
    let mut lines = Vec::new();
    for row in &view.jobs {
        if seen.insert(row.job_id, row.status) == Some(row.status) {
            continue;
        }
        lines.push(format!("[{done}/{total}] {}", describe(row)));
    }
    seen.retain(|id, _| view.jobs.iter().any(|row| row.job_id == *id));
    lines
}

fn describe(row: &JobRowView) -> String {
    match (row.status, row.elapsed_ms, row.error.as_deref()) {
        (JobStatus::Success, Some(ms), _) => format!("{}: success ({ms} ms)", row.filename),
        (JobStatus::Error, _, Some(error)) => format!("{}: error: {error}", row.filename),
        (status, _, _) => format!("{}: {status}", row.filename),
    }
}

/// Results of a run as a JSON array, in job order.
pub fn results_json(view: &AppViewModel) -> Value {
    Value::Array(
        view.jobs
            .iter()
            .map(|row| {
                json!({
                    "filename": row.filename,
                    "status": row.status.to_string(),
                    "elapsed_ms": row.elapsed_ms,
                    "error": row.error,
                    "data": row.structured_data,
                })
            })
            .collect(),
    )
}

pub fn host_status_lines(status: &HostStatus) -> Vec<String> {
    let mut lines = vec![
        format!("status:       {}", status.status),
        format!("accelerator:  {}", yes_no(status.cuda_available)),
        format!("model loaded: {}", yes_no(status.model_loaded)),
    ];
    if let Some(gpu) = &status.gpu_name {
        lines.push(format!("gpu:          {gpu}"));
    }
    if let Some(line) = usage("vram", status.vram_used, status.vram_total) {
        lines.push(line);
    }
    if let Some(line) = usage("ram", status.ram_used, status.ram_total) {
        lines.push(line);
    }
    lines
}

fn usage(label: &str, used: Option<u64>, total: Option<u64>) -> Option<String> {
    let total = total?;
    let used = used.unwrap_or(0);
    Some(format!("{:<14}{used} / {total} MiB", format!("{label}:")))
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ingest_core::StatusCounts;

    fn row(job_id: JobId, filename: &str, status: JobStatus) -> JobRowView {
        JobRowView {
            index: job_id as usize - 1,
            job_id,
            filename: filename.to_string(),
            status,
            has_raw_output: false,
            structured_data: None,
            error: None,
            elapsed_ms: None,
            preview_path: None,
        }
    }

    #[test]
    fn reports_only_changed_jobs() {
        let mut seen = HashMap::new();
        let mut view = AppViewModel {
            running: true,
            jobs: vec![
                row(1, "a.pdf", JobStatus::Pending),
                row(2, "b.pdf", JobStatus::Pending),
            ],
            counts: StatusCounts {
                pending: 2,
                ..StatusCounts::default()
            },
        };
        assert_eq!(status_changes(&mut seen, &view).len(), 2);

        view.jobs[0].status = JobStatus::Success;
        view.jobs[0].elapsed_ms = Some(1200);
        view.counts = StatusCounts {
            pending: 1,
            success: 1,
            ..StatusCounts::default()
        };

        assert_eq!(
            status_changes(&mut seen, &view),
            vec!["[1/2] a.pdf: success (1200 ms)".to_string()]
        );
        assert!(status_changes(&mut seen, &view).is_empty());
    }

    #[test]
    fn results_keep_job_order_and_errors() {
        let mut failed = row(2, "b.pdf", JobStatus::Error);
        failed.error = Some("OCR failed".to_string());
        let mut ok = row(1, "a.pdf", JobStatus::Success);
        ok.structured_data = Some(json!({"name": "Ada"}));
        let view = AppViewModel {
            jobs: vec![ok, failed],
            ..AppViewModel::default()
        };

        let value = results_json(&view);

        assert_eq!(value[0]["filename"], "a.pdf");
        assert_eq!(value[0]["data"]["name"], "Ada");
        assert_eq!(value[1]["status"], "error");
        assert_eq!(value[1]["error"], "OCR failed");
    }

    #[test]
    fn host_status_skips_unknown_memory() {
        let status = HostStatus {
            status: "healthy".to_string(),
            cuda_available: false,
            ram_total: Some(32000),
            ram_used: Some(8000),
            ..HostStatus::default()
        };

        let lines = host_status_lines(&status);

        assert!(lines.iter().any(|l| l == "ram:          8000 / 32000 MiB"));
        assert!(!lines.iter().any(|l| l.starts_with("vram")));
        assert!(!lines.iter().any(|l| l.starts_with("gpu")));
    }
}
