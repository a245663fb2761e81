//! Blob stores backing the spaced-repetition scheduler.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};

use crate::traits::SrsStore;

/// In-memory store, used for tests and `--no-srs` sessions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    blob: Mutex<Option<String>>,
}

impl MemoryStore {
    pub fn with_blob(blob: impl Into<String>) -> Self {
        Self {
            blob: Mutex::new(Some(blob.into())),
        }
    }
}

impl SrsStore for MemoryStore {
    fn load(&self) -> Result<Option<String>> {
        Ok(self.blob.lock().unwrap_or_else(|e| e.into_inner()).clone())
    }

    fn save(&self, blob: &str) -> Result<()> {
        *self.blob.lock().unwrap_or_else(|e| e.into_inner()) = Some(blob.to_string());
        Ok(())
    }
}

/// Store that keeps the blob in a single JSON file.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SrsStore for FileStore {
    fn load(&self) -> Result<Option<String>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let blob = std::fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read SRS data from {}", self.path.display()))?;
        Ok(Some(blob))
    }

    fn save(&self, blob: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
        }
        std::fs::write(&self.path, blob)
            .with_context(|| format!("failed to write SRS data to {}", self.path.display()))?;
        Ok(())
    }
}
