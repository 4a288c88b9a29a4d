use std::fmt;
use std::path::Path;
use std::str::FromStr;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{PreviewError, SchedulingPolicy};

/// A submitted document: its display name and its bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputFile {
    pub filename: String,
    pub bytes: Bytes,
}

impl InputFile {
    pub fn new(filename: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            filename: filename.into(),
            bytes: bytes.into(),
        }
    }

    /// Reads a file from disk, naming it after the final path component.
    pub fn read(path: &Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self::new(filename, bytes))
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// OCR resolution preset understood by the vision host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityPreset {
    Tiny,
    Small,
    #[default]
    Base,
    Large,
}

impl QualityPreset {
    pub fn as_str(self) -> &'static str {
        match self {
            QualityPreset::Tiny => "tiny",
            QualityPreset::Small => "small",
            QualityPreset::Base => "base",
            QualityPreset::Large => "large",
        }
    }
}

impl fmt::Display for QualityPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QualityPreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tiny" => Ok(QualityPreset::Tiny),
            "small" => Ok(QualityPreset::Small),
            "base" => Ok(QualityPreset::Base),
            "large" => Ok(QualityPreset::Large),
            other => Err(format!(
                "unknown quality preset `{other}` (expected tiny, small, base or large)"
            )),
        }
    }
}

/// Parameters shared by every stage call of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunParams {
    pub model: String,
    pub template: String,
    pub context_window: u32,
    pub quality: QualityPreset,
    pub policy: SchedulingPolicy,
}

impl Default for RunParams {
    fn default() -> Self {
        Self {
            model: "gpt-oss:latest".to_string(),
            template: "resume".to_string(),
            context_window: 32_768,
            quality: QualityPreset::Base,
            policy: SchedulingPolicy::Performance,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CombinedOutput {
    pub markdown: String,
    pub structured_data: Value,
}

/// Snapshot of the model host, as reported by its health endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct HostStatus {
    pub status: String,
    pub cuda_available: bool,
    pub model_loaded: bool,
    pub gpu_name: Option<String>,
    pub vram_total: Option<u64>,
    pub vram_used: Option<u64>,
    pub ram_total: Option<u64>,
    pub ram_used: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKind {
    Extract,
    Combined,
    Parse,
    Unload,
    Status,
}

impl StageKind {
    /// Message used when the host gives no better explanation.
    pub fn fallback_message(self) -> &'static str {
        match self {
            StageKind::Extract => "OCR failed",
            StageKind::Combined => "Processing failed",
            StageKind::Parse => "Parse failed",
            StageKind::Unload => "Unload failed",
            StageKind::Status => "Status query failed",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            StageKind::Extract => "extract",
            StageKind::Combined => "combined",
            StageKind::Parse => "parse",
            StageKind::Unload => "unload",
            StageKind::Status => "status",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    HttpStatus(u16),
    Timeout,
    Network,
    MalformedResponse,
    Cancelled,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::Network => write!(f, "network error"),
            FailureKind::MalformedResponse => write!(f, "malformed response"),
            FailureKind::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{stage} {kind}: {message}")]
pub struct StageError {
    pub stage: StageKind,
    pub kind: FailureKind,
    pub message: String,
}

impl StageError {
    pub fn new(stage: StageKind, kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            stage,
            kind,
            message: message.into(),
        }
    }

    pub fn cancelled(stage: StageKind) -> Self {
        Self::new(stage, FailureKind::Cancelled, "cancelled")
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind == FailureKind::Cancelled
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("invalid server url {url}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },
    #[error("http client setup failed: {0}")]
    Client(#[from] reqwest::Error),
    #[error("preview error: {0}")]
    Preview(#[from] PreviewError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_preset_parses_wire_names() {
        assert_eq!("LARGE".parse::<QualityPreset>(), Ok(QualityPreset::Large));
        assert_eq!(" tiny ".parse::<QualityPreset>(), Ok(QualityPreset::Tiny));
        assert!("huge".parse::<QualityPreset>().is_err());
        assert_eq!(QualityPreset::default().as_str(), "base");
    }

    #[test]
    fn fallback_messages_are_stage_specific() {
        assert_eq!(StageKind::Extract.fallback_message(), "OCR failed");
        assert_eq!(StageKind::Parse.fallback_message(), "Parse failed");
        assert_eq!(StageKind::Combined.fallback_message(), "Processing failed");
    }
}
