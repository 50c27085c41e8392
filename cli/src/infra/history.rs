//! Infrastructure implementation of the `HistoryStore` port.
//!
//! `~/.spawn/history.json` holds a JSON array of `SpawnRecord`. Writes go
//! through a temp file in the same directory and an atomic rename, so a
//! crash never leaves a half-written array behind.

use std::io::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use spawn_common::SpawnRecord;

use crate::application::ports::HistoryStore;

/// JSON-file history store.
#[derive(Debug, Clone)]
pub struct JsonHistoryStore {
    path: PathBuf,
}

impl JsonHistoryStore {
    /// Store at `<state_dir>/history.json`.
    #[must_use]
    pub fn in_dir(state_dir: &Path) -> Self {
        Self::with_path(state_dir.join("history.json"))
    }

    /// Store with an explicit path (used in tests).
    #[must_use]
    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Synchronous load. Missing or unparseable files read as empty.
    ///
    /// # Errors
    ///
    /// Returns an error only if an existing file cannot be read.
    pub fn load_sync(&self) -> Result<Vec<SpawnRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("reading history file {}", self.path.display()))?;
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        match serde_json::from_str::<Vec<SpawnRecord>>(&content) {
            Ok(records) => Ok(records),
            Err(err) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %err,
                    "history file is corrupt; treating it as empty"
                );
                Ok(Vec::new())
            }
        }
    }

    /// Synchronous append: read, push, atomically replace.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be written.
    pub fn append_sync(&self, record: &SpawnRecord) -> Result<()> {
        let mut records = self.load_sync()?;
        records.push(record.clone());
        self.write_all(&records)
    }

    fn write_all(&self, records: &[SpawnRecord]) -> Result<()> {
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating directory {}", dir.display()))?;

        let content = serde_json::to_string_pretty(records).context("serializing history")?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)
            .with_context(|| format!("creating temp file in {}", dir.display()))?;
        tmp.write_all(content.as_bytes())
            .context("writing history temp file")?;
        tmp.as_file()
            .sync_all()
            .context("flushing history temp file")?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(tmp.path(), std::fs::Permissions::from_mode(0o600))
                .with_context(|| format!("setting permissions on {}", tmp.path().display()))?;
        }

        tmp.persist(&self.path)
            .with_context(|| format!("finalizing history file {}", self.path.display()))?;
        Ok(())
    }
}

impl HistoryStore for JsonHistoryStore {
    async fn load(&self) -> Result<Vec<SpawnRecord>> {
        let store = self.clone();
        tokio::task::spawn_blocking(move || store.load_sync())
            .await
            .context("history load task panicked")?
    }

    async fn append(&self, record: &SpawnRecord) -> Result<()> {
        let store = self.clone();
        let record = record.clone();
        tokio::task::spawn_blocking(move || store.append_sync(&record))
            .await
            .context("history append task panicked")?
    }
}
