//! Append-only log of every record that reached a terminal status.

use deferd_model::{TaskId, TaskRecord};
use tokio::sync::Mutex;

use crate::persist::{JsonFile, PersistError};

/// In-memory history, optionally mirrored to a JSON file.
///
/// The in-memory copy is authoritative: an append always lands in memory even when
/// writing the file fails.
#[derive(Debug)]
pub struct HistoryLog {
    records: Mutex<Vec<TaskRecord>>,
    file: Option<JsonFile>,
}

impl HistoryLog {
    pub fn in_memory() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            file: None,
        }
    }

    /// Open a file-backed log, seeding it with the records already on disk.
    pub async fn open(file: JsonFile) -> Result<Self, PersistError> {
        let records = file.load().await?;
        Ok(Self {
            records: Mutex::new(records),
            file: Some(file),
        })
    }

    /// Append one record and rewrite the file under the log's lock.
    pub async fn append(&self, record: TaskRecord) -> Result<(), PersistError> {
        let mut records = self.records.lock().await;
        records.push(record);
        match &self.file {
            Some(file) => file.store(&records).await,
            None => Ok(()),
        }
    }

    pub async fn list(&self) -> Vec<TaskRecord> {
        self.records.lock().await.clone()
    }

    /// Latest archived copy of `id`.
    pub async fn find(&self, id: &str) -> Option<TaskRecord> {
        self.records
            .lock()
            .await
            .iter()
            .rev()
            .find(|r| r.id.as_str() == id)
            .cloned()
    }

    pub async fn ids(&self) -> Vec<TaskId> {
        self.records
            .lock()
            .await
            .iter()
            .map(|r| r.id.clone())
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
