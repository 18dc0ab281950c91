//! JSON array files holding task records.
//!
//! Each file has a single writer lock. Writes go to a temporary sibling and are renamed
//! into place, so readers never observe a half-written file.

use std::{
    io,
    path::{Path, PathBuf},
};

use deferd_model::TaskRecord;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::trace;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid json in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug)]
pub struct JsonFile {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read all records. A missing or empty file reads as no records.
    pub async fn load(&self) -> Result<Vec<TaskRecord>, PersistError> {
        let _guard = self.lock.lock().await;

        let data = match tokio::fs::read(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(self.io_error(source)),
        };
        if data.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }

        serde_json::from_slice(&data).map_err(|source| PersistError::Json {
            path: self.path.clone(),
            source,
        })
    }

    /// Replace the file contents with `records`.
    pub async fn store(&self, records: &[TaskRecord]) -> Result<(), PersistError> {
        let _guard = self.lock.lock().await;
        self.write_locked(records).await
    }

    /// Take a snapshot while holding the writer lock, then write it.
    ///
    /// Concurrent callers are serialized and each snapshot is taken after the previous
    /// write finished, so the file always ends with the latest state.
    pub async fn store_with<F>(&self, snapshot: F) -> Result<(), PersistError>
    where
        F: FnOnce() -> Vec<TaskRecord>,
    {
        let _guard = self.lock.lock().await;
        let records = snapshot();
        self.write_locked(&records).await
    }

    async fn write_locked(&self, records: &[TaskRecord]) -> Result<(), PersistError> {
        let data = serde_json::to_vec_pretty(records).map_err(|source| PersistError::Json {
            path: self.path.clone(),
            source,
        })?;

        let tmp = self.tmp_path();
        tokio::fs::write(&tmp, &data)
            .await
            .map_err(|e| self.io_error(e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| self.io_error(e))?;

        trace!(path = %self.path.display(), count = records.len(), "snapshot written");
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn io_error(&self, source: io::Error) -> PersistError {
        PersistError::Io {
            path: self.path.clone(),
            source,
        }
    }
}
