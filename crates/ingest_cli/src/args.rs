use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use ingest_engine::{QualityPreset, SchedulingPolicy};

/// vision-ingest - turn scanned documents into structured JSON
#[derive(Parser, Debug)]
#[command(name = "vision-ingest")]
#[command(version)]
#[command(about = "Run documents through the OCR and parse stages of a vision host", long_about = None)]
pub struct Cli {
    /// Settings file (RON). Defaults to ./vision_ingest.ron when present
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Model host URL (e.g., http://localhost:8000)
    #[arg(short = 's', long = "server", global = true)]
    pub server: Option<String>,

    /// Also write logs to this file
    #[arg(long = "log-file", global = true)]
    pub log_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Process documents and print or export the structured results
    Run(RunArgs),
    /// Show accelerator and model residency of the host
    Status,
}

#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// PDF or image files to process, in order
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Scheduling policy: performance, batch or low-vram
    #[arg(short = 'p', long = "policy")]
    pub policy: Option<SchedulingPolicy>,

    /// Language model used for parsing
    #[arg(short = 'm', long = "model")]
    pub model: Option<String>,

    /// Document template (e.g., resume, invoice, receipt)
    #[arg(short = 't', long = "template")]
    pub template: Option<String>,

    /// Maximum tokens the language model may produce
    #[arg(long = "context-window")]
    pub context_window: Option<u32>,

    /// OCR quality preset: tiny, small, base or large
    #[arg(short = 'q', long = "quality")]
    pub quality: Option<QualityPreset>,

    /// Export results and a manifest into this directory instead of stdout
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
}
