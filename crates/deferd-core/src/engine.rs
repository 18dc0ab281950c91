//! State shared by the facade and the executors, plus the persist-then-publish path.

use std::{collections::HashSet, sync::Arc};

use deferd_model::{TaskId, TaskRecord, TaskStatus};
use tracing::{error, info, warn};

use crate::{
    admission::Admission,
    config::SchedulerConfig,
    error::CoreError,
    events::{EventKind, Subscribe, TaskEvent},
    history::HistoryLog,
    ids::IdAllocator,
    persist::{JsonFile, PersistError},
    registry::TaskRegistry,
    runner::CommandRunner,
};

pub(crate) const TASKS_FILE: &str = "tasks.json";
pub(crate) const HISTORY_FILE: &str = "history.json";

/// State shared by the scheduler facade and every executor.
pub(crate) struct Engine {
    pub(crate) config: SchedulerConfig,
    pub(crate) registry: TaskRegistry,
    pub(crate) ids: IdAllocator,
    pub(crate) admission: Admission,
    pub(crate) history: HistoryLog,
    pub(crate) runner: Arc<dyn CommandRunner>,
    snapshot: Option<JsonFile>,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl Engine {
    /// Build the engine, loading history and reserving every id seen on disk.
    ///
    /// Tasks still scheduled in a previous run's `tasks.json` are reported, not resumed.
    pub(crate) async fn open(
        config: SchedulerConfig,
        runner: Arc<dyn CommandRunner>,
        subscribers: Vec<Arc<dyn Subscribe>>,
    ) -> Result<Self, CoreError> {
        let registry = TaskRegistry::new();

        let (history, snapshot) = match &config.data_dir {
            Some(dir) => {
                tokio::fs::create_dir_all(dir)
                    .await
                    .map_err(|source| PersistError::Io {
                        path: dir.clone(),
                        source,
                    })?;
                let history = HistoryLog::open(JsonFile::new(dir.join(HISTORY_FILE))).await?;
                (history, Some(JsonFile::new(dir.join(TASKS_FILE))))
            }
            None => (HistoryLog::in_memory(), None),
        };

        let archived: HashSet<TaskId> = history.ids().await.into_iter().collect();
        if let Some(file) = &snapshot {
            let previous = file.load().await?;
            for record in &previous {
                if record.status == TaskStatus::Scheduled && !archived.contains(&record.id) {
                    warn!(
                        task = %record.id,
                        command = %record.task.command,
                        "task scheduled by a previous run was not resumed"
                    );
                }
            }
            registry.reserve(previous.into_iter().map(|r| r.id));
        }
        info!(
            history = archived.len(),
            max_in_flight = config.max_in_flight,
            safety_timeout_secs = config.safety_timeout.as_secs(),
            policy = ?config.timeout_policy,
            persistent = snapshot.is_some(),
            "engine ready"
        );
        registry.reserve(archived);

        Ok(Self {
            admission: Admission::new(config.max_in_flight),
            ids: IdAllocator::new(),
            config,
            registry,
            history,
            runner,
            snapshot,
            subscribers,
        })
    }

    /// Rewrite `tasks.json` from the registry. Failures are reported, never fatal.
    pub(crate) async fn persist_tasks(&self) {
        let Some(file) = &self.snapshot else {
            return;
        };
        if let Err(e) = file.store_with(|| self.registry.list_all()).await {
            error!(error = %e, "failed to write task snapshot");
            self.emit(TaskEvent::new(EventKind::PersistFailed).with_reason(e.to_string()));
        }
    }

    /// Append a record that left `scheduled` to the history.
    pub(crate) async fn archive(&self, record: TaskRecord) {
        let id = record.id.clone();
        if let Err(e) = self.history.append(record).await {
            error!(task = %id, error = %e, "failed to write history");
            self.emit(
                TaskEvent::new(EventKind::PersistFailed)
                    .with_task(&id)
                    .with_reason(e.to_string()),
            );
        }
    }

    /// Persist a terminal transition and publish its event.
    pub(crate) async fn settle(&self, record: TaskRecord, event: TaskEvent) {
        self.persist_tasks().await;
        self.archive(record).await;
        self.emit(event);
    }

    pub(crate) fn emit(&self, event: TaskEvent) {
        for subscriber in &self.subscribers {
            subscriber.on_event(&event);
        }
    }
}
