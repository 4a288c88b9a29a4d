use std::collections::HashMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use ingest_core::{PreviewHandle, PreviewId};
use ingest_logging::{ingest_debug, ingest_warn};
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::InputFile;

#[derive(Debug, Error)]
pub enum PreviewError {
    #[error("could not create preview for {filename}: {source}")]
    Create {
        filename: String,
        #[source]
        source: io::Error,
    },
}

/// Ownership record for preview files. Each acquired preview is a temporary
/// copy of the input bytes that lives until it is released.
#[derive(Debug, Default)]
pub struct PreviewStore {
    dir: Option<PathBuf>,
    next_id: PreviewId,
    live: HashMap<PreviewId, NamedTempFile>,
}

impl PreviewStore {
    /// Previews are created in the system temp dir.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
            ..Self::default()
        }
    }

    pub fn acquire(&mut self, file: &InputFile) -> Result<PreviewHandle, PreviewError> {
        let suffix = Path::new(&file.filename)
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default();
        let created = self.write_temp(&suffix, &file.bytes);
        let temp = created.map_err(|source| PreviewError::Create {
            filename: file.filename.clone(),
            source,
        })?;

        self.next_id += 1;
        let handle = PreviewHandle {
            id: self.next_id,
            path: temp.path().to_path_buf(),
        };
        ingest_debug!("Preview {} for {} at {:?}", handle.id, file.filename, handle.path);
        self.live.insert(handle.id, temp);
        Ok(handle)
    }

    /// Deletes the preview file. Returns false for unknown or already released ids.
    pub fn release(&mut self, id: PreviewId) -> bool {
        match self.live.remove(&id) {
            Some(temp) => {
                if let Err(err) = temp.close() {
                    ingest_warn!("Failed to delete preview {}: {}", id, err);
                }
                true
            }
            None => false,
        }
    }

    pub fn release_all(&mut self) {
        let ids: Vec<_> = self.live.keys().copied().collect();
        for id in ids {
            self.release(id);
        }
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    fn write_temp(&self, suffix: &str, bytes: &[u8]) -> io::Result<NamedTempFile> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("preview-").suffix(suffix);
        let mut temp = match &self.dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        temp.write_all(bytes)?;
        temp.flush()?;
        Ok(temp)
    }
}
