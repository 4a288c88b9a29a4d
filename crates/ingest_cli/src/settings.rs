use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use ingest_engine::{ClientSettings, RunParams};
use ingest_logging::{ingest_info, ingest_warn};
use serde::{Deserialize, Serialize};

use crate::args::RunArgs;

pub const DEFAULT_SETTINGS_FILENAME: &str = "vision_ingest.ron";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server_url: String,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub run: RunParams,
    pub output_dir: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        let client = ClientSettings::default();
        Self {
            server_url: client.base_url,
            connect_timeout_secs: client.connect_timeout.as_secs(),
            request_timeout_secs: client.request_timeout.as_secs(),
            run: RunParams::default(),
            output_dir: None,
        }
    }
}

impl Settings {
    pub fn client_settings(&self) -> ClientSettings {
        ClientSettings {
            base_url: self.server_url.clone(),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }

    /// Command-line flags win over the settings file.
    pub fn apply_run_args(&mut self, args: &RunArgs) {
        if let Some(policy) = args.policy {
            self.run.policy = policy;
        }
        if let Some(model) = &args.model {
            self.run.model = model.clone();
        }
        if let Some(template) = &args.template {
            self.run.template = template.clone();
        }
        if let Some(context_window) = args.context_window {
            self.run.context_window = context_window;
        }
        if let Some(quality) = args.quality {
            self.run.quality = quality;
        }
        if let Some(output) = &args.output {
            self.output_dir = Some(output.clone());
        }
    }
}

/// Loads settings from `path`, or from the default file when no path is given.
///
/// A missing default file yields defaults silently; any other problem is
/// logged and also yields defaults.
pub fn load_settings(path: Option<&Path>) -> Settings {
    let explicit = path.is_some();
    let path = path.map_or_else(|| PathBuf::from(DEFAULT_SETTINGS_FILENAME), Path::to_path_buf);

    let content = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound && !explicit => {
            return Settings::default();
        }
        Err(err) => {
            ingest_warn!("Failed to read settings from {:?}: {}", path, err);
            return Settings::default();
        }
    };

    match ron::from_str(&content) {
        Ok(settings) => {
            ingest_info!("Loaded settings from {:?}", path);
            settings
        }
        Err(err) => {
            ingest_warn!("Failed to parse settings from {:?}: {}", path, err);
            Settings::default()
        }
    }
}
