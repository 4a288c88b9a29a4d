mod args;
mod render;
mod settings;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use ingest_core::filter_duplicate_submissions;
use ingest_engine::{export_results, BatchController, InputFile, ReqwestStageClient, RunOutcome};
use ingest_logging::{ingest_info, ingest_warn, LevelFilter, LogDestination};

use args::{Cli, Command, RunArgs};
use render::TerminalObserver;
use settings::Settings;

const DEFAULT_LOG_FILE: &str = "vision_ingest.log";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli);

    let mut settings = settings::load_settings(cli.config.as_deref());
    if let Some(server) = &cli.server {
        settings.server_url = server.clone();
    }

    match cli.command {
        Command::Run(args) => run(settings, args).await,
        Command::Status => status(&settings).await,
    }
}

fn init_logging(cli: &Cli) {
    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let (destination, path) = match &cli.log_file {
        Some(path) => (LogDestination::Both, path.clone()),
        None => (LogDestination::Terminal, PathBuf::from(DEFAULT_LOG_FILE)),
    };
    ingest_logging::initialize(destination, level, &path);
}

async fn run(mut settings: Settings, args: RunArgs) -> anyhow::Result<()> {
    settings.apply_run_args(&args);

    let mut files = Vec::with_capacity(args.files.len());
    for path in &args.files {
        let file =
            InputFile::read(path).with_context(|| format!("reading {}", path.display()))?;
        files.push(file);
    }
    let (files, stats) = filter_duplicate_submissions(files, |file| {
        (file.filename.clone(), file.size())
    });
    if stats.skipped > 0 {
        ingest_warn!("Skipped {} duplicate file(s)", stats.skipped);
    }
    if files.is_empty() {
        bail!("no files to process");
    }

    let client = ReqwestStageClient::new(settings.client_settings())?;
    let controller = Arc::new(
        BatchController::new(Arc::new(client)).with_observer(Arc::new(TerminalObserver::default())),
    );

    let interrupt = {
        let controller = Arc::clone(&controller);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                ingest_warn!("Interrupted; stopping run");
                controller.stop();
            }
        })
    };

    ingest_info!(
        "Processing {} file(s) with {} policy against {}",
        files.len(),
        settings.run.policy,
        settings.server_url
    );
    let summary = controller.start(files, settings.run.clone()).await;
    interrupt.abort();
    let summary = summary?;

    let view = controller.view();
    match &settings.output_dir {
        Some(dir) => {
            let exported_utc = chrono::Utc::now().to_rfc3339();
            let export = export_results(dir, &view, &exported_utc)
                .with_context(|| format!("exporting results to {}", dir.display()))?;
            ingest_info!(
                "Wrote {} result file(s) and {:?}",
                export.written.len(),
                export.manifest_path
            );
        }
        None => {
            println!("{}", serde_json::to_string_pretty(&render::results_json(&view))?);
        }
    }

    let counts = summary.counts;
    match summary.outcome {
        RunOutcome::Completed => ingest_info!(
            "Run {} finished: {} succeeded, {} failed",
            summary.run_id,
            counts.success,
            counts.error
        ),
        RunOutcome::Cancelled => ingest_warn!(
            "Run {} stopped: {} succeeded, {} failed, {} pending",
            summary.run_id,
            counts.success,
            counts.error,
            counts.pending
        ),
    }
    Ok(())
}

async fn status(settings: &Settings) -> anyhow::Result<()> {
    let client = ReqwestStageClient::new(settings.client_settings())?;
    let status = client
        .host_status()
        .await
        .with_context(|| format!("querying {}", settings.server_url))?;
    for line in render::host_status_lines(&status) {
        println!("{line}");
    }
    Ok(())
}
