use std::path::{Path, PathBuf};

use ingest_core::{AppViewModel, JobStatus};
use ingest_logging::ingest_info;
use serde::Serialize;

use crate::filename::result_filename;
use crate::persist::{PersistError, ResultWriter};

pub const MANIFEST_FILENAME: &str = "manifest.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub written: Vec<PathBuf>,
    pub manifest_path: PathBuf,
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("persist error: {0}")]
    Persist(#[from] PersistError),
}

#[derive(Debug, Serialize)]
struct Manifest<'a> {
    exported_utc: &'a str,
    jobs: Vec<ManifestEntry<'a>>,
}

#[derive(Debug, Serialize)]
struct ManifestEntry<'a> {
    filename: &'a str,
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    elapsed_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    output: Option<String>,
}

/// Writes one JSON file per successful job plus a manifest covering every job.
pub fn export_results(
    output_dir: &Path,
    view: &AppViewModel,
    exported_utc: &str,
) -> Result<ExportSummary, ExportError> {
    let writer = ResultWriter::new(output_dir);
    let mut written = Vec::new();
    let mut entries = Vec::with_capacity(view.jobs.len());

    for row in &view.jobs {
        let output = match (&row.structured_data, row.status) {
            (Some(data), JobStatus::Success) => {
                let name = result_filename(&row.filename, row.job_id);
                written.push(writer.write_json(&name, data)?);
                Some(name)
            }
            _ => None,
        };
        entries.push(ManifestEntry {
            filename: &row.filename,
            status: row.status.to_string(),
            elapsed_ms: row.elapsed_ms,
            error: row.error.as_deref(),
            output,
        });
    }

    let manifest = Manifest {
        exported_utc,
        jobs: entries,
    };
    let manifest_path = writer.write_json(MANIFEST_FILENAME, &manifest)?;
    ingest_info!(
        "Exported {} results to {}",
        written.len(),
        output_dir.display()
    );

    Ok(ExportSummary {
        written,
        manifest_path,
    })
}
