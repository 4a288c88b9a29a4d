mod support;

use std::sync::{Arc, Once};

use ingest_core::{AppViewModel, JobStatus};
use ingest_engine::{
    BatchController, RunOutcome, RunParams, RunSummary, SchedulingPolicy, StageKind,
};
use pretty_assertions::assert_eq;
use support::{data_for, files, Call, ScriptedClient};

const ALL_POLICIES: [SchedulingPolicy; 3] = [
    SchedulingPolicy::Performance,
    SchedulingPolicy::Batch,
    SchedulingPolicy::LowVram,
];

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(ingest_logging::initialize_for_tests);
}

async fn run(
    client: ScriptedClient,
    policy: SchedulingPolicy,
    names: &[&str],
) -> (Arc<ScriptedClient>, AppViewModel, RunSummary) {
    init_logging();
    let client = Arc::new(client);
    let controller = BatchController::new(client.clone());
    let params = RunParams {
        policy,
        ..RunParams::default()
    };
    let summary = controller.start(files(names), params).await.unwrap();
    (client, controller.view(), summary)
}

fn statuses(view: &AppViewModel) -> Vec<JobStatus> {
    view.jobs.iter().map(|job| job.status).collect()
}

fn filenames(view: &AppViewModel) -> Vec<String> {
    view.jobs.iter().map(|job| job.filename.clone()).collect()
}

/// The stage that first touches a file under `policy`.
fn first_stage(policy: SchedulingPolicy) -> StageKind {
    match policy {
        SchedulingPolicy::Performance => StageKind::Combined,
        SchedulingPolicy::Batch | SchedulingPolicy::LowVram => StageKind::Extract,
    }
}

#[tokio::test]
async fn performance_processes_every_job_with_one_call_each() {
    let (client, view, summary) = run(
        ScriptedClient::new(),
        SchedulingPolicy::Performance,
        &["a.pdf", "b.png", "c.jpg"],
    )
    .await;

    assert_eq!(summary.outcome, RunOutcome::Completed);
    assert_eq!(summary.counts.success, 3);
    assert_eq!(filenames(&view), vec!["a.pdf", "b.png", "c.jpg"]);
    for job in &view.jobs {
        assert_eq!(job.status, JobStatus::Success);
        assert!(job.elapsed_ms.is_some());
        assert!(job.has_raw_output);
        assert_eq!(job.structured_data, Some(data_for(&job.filename)));
    }
    assert_eq!(
        client.calls(),
        vec![
            Call::Combined("a.pdf".into()),
            Call::Combined("b.png".into()),
            Call::Combined("c.jpg".into()),
        ]
    );
    assert!(!view.running);
}

#[tokio::test]
async fn performance_failure_does_not_halt_later_jobs() {
    let client = ScriptedClient::new().fail(StageKind::Combined, "b.pdf", "CUDA out of memory");
    let (_client, view, summary) =
        run(client, SchedulingPolicy::Performance, &["a.pdf", "b.pdf", "c.pdf"]).await;

    assert_eq!(
        statuses(&view),
        vec![JobStatus::Success, JobStatus::Error, JobStatus::Success]
    );
    assert_eq!(view.jobs[1].error.as_deref(), Some("CUDA out of memory"));
    assert_eq!(view.jobs[1].elapsed_ms, None);
    assert_eq!(summary.counts.error, 1);
}

#[tokio::test]
async fn batch_excludes_failed_extract_from_parse_phase() {
    let client = ScriptedClient::new().fail(StageKind::Extract, "a.pdf", "OCR failed");
    let (client, view, _summary) = run(client, SchedulingPolicy::Batch, &["a.pdf", "b.pdf"]).await;

    assert_eq!(
        client.calls(),
        vec![
            Call::Extract("a.pdf".into()),
            Call::Extract("b.pdf".into()),
            Call::Unload,
            Call::Parse("b.pdf".into()),
        ]
    );
    assert_eq!(statuses(&view), vec![JobStatus::Error, JobStatus::Success]);
    assert_eq!(view.jobs[0].error.as_deref(), Some("OCR failed"));
    assert!(!view.jobs[0].has_raw_output);
    assert!(view.jobs[1].has_raw_output);
    assert!(view.jobs[1].elapsed_ms.is_some());
}

#[tokio::test]
async fn batch_unloads_exactly_once_even_when_every_extract_fails() {
    let client = ScriptedClient::new()
        .fail(StageKind::Extract, "a.pdf", "bad scan")
        .fail(StageKind::Extract, "b.pdf", "bad scan");
    let (client, view, summary) = run(client, SchedulingPolicy::Batch, &["a.pdf", "b.pdf"]).await;

    assert_eq!(client.unload_count(), 1);
    assert!(!client
        .calls()
        .iter()
        .any(|call| matches!(call, Call::Parse(_))));
    assert_eq!(statuses(&view), vec![JobStatus::Error, JobStatus::Error]);
    assert_eq!(summary.outcome, RunOutcome::Completed);
}

#[tokio::test]
async fn batch_unload_failure_is_swallowed() {
    let client = ScriptedClient::new().unload_fails();
    let (client, view, _summary) = run(client, SchedulingPolicy::Batch, &["a.pdf", "b.pdf"]).await;

    assert_eq!(client.unload_count(), 1);
    assert_eq!(statuses(&view), vec![JobStatus::Success, JobStatus::Success]);
    assert!(view.jobs.iter().all(|job| job.error.is_none()));
}

#[tokio::test]
async fn batch_parse_failure_marks_only_that_job() {
    let client = ScriptedClient::new().fail(StageKind::Parse, "a.pdf", "LLM returned invalid JSON");
    let (_client, view, _summary) =
        run(client, SchedulingPolicy::Batch, &["a.pdf", "b.pdf"]).await;

    assert_eq!(statuses(&view), vec![JobStatus::Error, JobStatus::Success]);
    assert_eq!(
        view.jobs[0].error.as_deref(),
        Some("LLM returned invalid JSON")
    );
    assert!(view.jobs[0].has_raw_output);
}

#[tokio::test]
async fn low_vram_unloads_once_per_successful_extract() {
    let client = ScriptedClient::new().fail(StageKind::Extract, "b.pdf", "OCR failed");
    let (client, view, _summary) = run(
        client,
        SchedulingPolicy::LowVram,
        &["a.pdf", "b.pdf", "c.pdf"],
    )
    .await;

    assert_eq!(
        client.calls(),
        vec![
            Call::Extract("a.pdf".into()),
            Call::Unload,
            Call::Parse("a.pdf".into()),
            Call::Extract("b.pdf".into()),
            Call::Extract("c.pdf".into()),
            Call::Unload,
            Call::Parse("c.pdf".into()),
        ]
    );
    assert_eq!(client.unload_count(), 2);
    assert_eq!(
        statuses(&view),
        vec![JobStatus::Success, JobStatus::Error, JobStatus::Success]
    );
}

#[tokio::test]
async fn low_vram_unload_failure_does_not_block_parse() {
    let client = ScriptedClient::new().unload_fails();
    let (client, view, _summary) = run(client, SchedulingPolicy::LowVram, &["a.pdf"]).await;

    assert_eq!(client.unload_count(), 1);
    assert_eq!(statuses(&view), vec![JobStatus::Success]);
}

#[tokio::test]
async fn malformed_first_stage_response_becomes_job_error_under_every_policy() {
    for policy in ALL_POLICIES {
        let client = ScriptedClient::new().malformed(first_stage(policy), "a.pdf");
        let (_client, view, summary) = run(client, policy, &["a.pdf", "b.pdf"]).await;

        assert_eq!(
            statuses(&view),
            vec![JobStatus::Error, JobStatus::Success],
            "policy {policy}"
        );
        let message = view.jobs[0].error.as_deref().unwrap_or_default();
        assert!(!message.is_empty(), "policy {policy}");
        assert_eq!(summary.outcome, RunOutcome::Completed);
    }
}

#[tokio::test]
async fn job_order_matches_input_regardless_of_failures() {
    let names = ["d.pdf", "a.pdf", "c.pdf", "b.pdf"];
    for policy in ALL_POLICIES {
        let client = ScriptedClient::new()
            .fail(first_stage(policy), "a.pdf", "failed")
            .fail(first_stage(policy), "b.pdf", "failed");
        let (_client, view, _summary) = run(client, policy, &names).await;

        assert_eq!(filenames(&view), names.to_vec(), "policy {policy}");
        assert_eq!(
            statuses(&view),
            vec![
                JobStatus::Success,
                JobStatus::Error,
                JobStatus::Success,
                JobStatus::Error
            ],
            "policy {policy}"
        );
    }
}

#[tokio::test]
async fn every_job_may_fail_and_the_run_still_completes() {
    for policy in ALL_POLICIES {
        let client = ScriptedClient::new()
            .fail(first_stage(policy), "a.pdf", "down")
            .fail(first_stage(policy), "b.pdf", "down");
        let (_client, view, summary) = run(client, policy, &["a.pdf", "b.pdf"]).await;

        assert_eq!(summary.outcome, RunOutcome::Completed);
        assert_eq!(summary.counts.error, 2);
        assert!(!view.running);
    }
}
