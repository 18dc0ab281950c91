//! Concurrency-safe store of task records; the single source of truth for status.
//!
//! Every read-then-mutate sequence (claim, cancel, reconcile, abandon) runs inside one write
//! lock, so exactly one of {timer fire, delete, safety timeout} moves a record out of
//! `scheduled`.

use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use deferd_model::{FAILURE_EXIT_CODE, Task, TaskId, TaskRecord, TaskStatus, TransitionError};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::{admission::AdmissionPermit, ids::IdAllocator};

/// Result of a cancellation attempt.
#[derive(Debug)]
pub enum Cancel {
    /// The record moved `scheduled -> canceled`; this is the updated copy.
    Canceled(TaskRecord),
    /// The record was canceled earlier.
    AlreadyCanceled(TaskRecord),
    /// The record already ran, or its executor has claimed it.
    Conflict(TaskRecord),
    NotFound,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ClaimError {
    #[error("task not found")]
    NotFound,
    #[error("task is already {0}")]
    NotScheduled(TaskStatus),
    #[error("task is already claimed")]
    AlreadyClaimed,
}

#[derive(Clone, Default)]
pub struct TaskRegistry {
    inner: Arc<RwLock<RegistryInner>>,
}

#[derive(Default)]
struct RegistryInner {
    /// Records indexed by id.
    tasks: HashMap<TaskId, Entry>,
    /// Insertion order, for listings.
    order: Vec<TaskId>,
    /// Ids held by records from earlier runs; never handed out again.
    reserved: HashSet<TaskId>,
}

struct Entry {
    record: TaskRecord,
    /// Set once the executor has won the race and is running the command.
    claimed: bool,
    /// Released inside the terminal transition.
    permit: Option<AdmissionPermit>,
    cancel: CancellationToken,
}

impl RegistryInner {
    fn is_taken(&self, id: &str) -> bool {
        self.tasks.contains_key(id) || self.reserved.contains(id)
    }

    fn insert(&mut self, entry: Entry) {
        let id = entry.record.id.clone();
        self.order.push(id.clone());
        self.tasks.insert(id, entry);
    }
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark identifiers from earlier runs as unavailable.
    pub fn reserve<I>(&self, ids: I)
    where
        I: IntoIterator<Item = TaskId>,
    {
        self.write().reserved.extend(ids);
    }

    /// Allocate a free id and insert a `scheduled` record holding `permit`.
    ///
    /// Allocation and insertion happen under one lock, so concurrent callers never
    /// receive the same id.
    pub fn insert_scheduled(
        &self,
        ids: &IdAllocator,
        task: Task,
        permit: AdmissionPermit,
    ) -> (TaskRecord, CancellationToken) {
        let mut inner = self.write();
        let id = ids.allocate(|candidate| inner.is_taken(candidate));

        let record = TaskRecord::scheduled(id, task);
        let cancel = CancellationToken::new();
        inner.insert(Entry {
            record: record.clone(),
            claimed: false,
            permit: Some(permit),
            cancel: cancel.clone(),
        });
        (record, cancel)
    }

    /// Allocate a free id and insert a synthetic `failed` record for an undecodable submission.
    pub fn insert_malformed(&self, ids: &IdAllocator, reason: &str) -> TaskRecord {
        let mut inner = self.write();
        let id = ids.allocate(|candidate| inner.is_taken(candidate));

        let record = TaskRecord::malformed(id, reason);
        inner.insert(Entry {
            record: record.clone(),
            claimed: false,
            permit: None,
            cancel: CancellationToken::new(),
        });
        record
    }

    /// Get a copy of a record by id.
    pub fn get(&self, id: &str) -> Option<TaskRecord> {
        self.read().tasks.get(id).map(|e| e.record.clone())
    }

    /// All records in insertion order.
    pub fn list_all(&self) -> Vec<TaskRecord> {
        let inner = self.read();
        inner
            .order
            .iter()
            .filter_map(|id| inner.tasks.get(id))
            .map(|e| e.record.clone())
            .collect()
    }

    /// Records with the given status, in insertion order.
    pub fn list_by_status(&self, status: TaskStatus) -> Vec<TaskRecord> {
        let inner = self.read();
        inner
            .order
            .iter()
            .filter_map(|id| inner.tasks.get(id))
            .filter(|e| e.record.status == status)
            .map(|e| e.record.clone())
            .collect()
    }

    pub fn count_by_status(&self, status: TaskStatus) -> usize {
        self.read()
            .tasks
            .values()
            .filter(|e| e.record.status == status)
            .count()
    }

    pub fn len(&self) -> usize {
        self.read().tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Claim a scheduled record for execution.
    ///
    /// On success the record stays `scheduled` but can no longer be canceled; the
    /// returned copy is the executor's working copy, handed back via [`Self::reconcile`].
    pub fn claim(&self, id: &str) -> Result<TaskRecord, ClaimError> {
        let mut inner = self.write();
        let entry = inner.tasks.get_mut(id).ok_or(ClaimError::NotFound)?;

        if entry.record.status != TaskStatus::Scheduled {
            return Err(ClaimError::NotScheduled(entry.record.status));
        }
        if entry.claimed {
            return Err(ClaimError::AlreadyClaimed);
        }
        entry.claimed = true;
        Ok(entry.record.clone())
    }

    /// Store the executor's finished working copy and release the admission slot.
    ///
    /// Only a claimed, still-scheduled record moving to a terminal status is accepted.
    pub fn reconcile(&self, record: TaskRecord) -> Result<(), TransitionError> {
        let mut inner = self.write();
        let Some(entry) = inner.tasks.get_mut(&record.id) else {
            return Err(TransitionError::Illegal {
                from: TaskStatus::Scheduled,
                to: record.status,
            });
        };

        if !entry.claimed
            || entry.record.status != TaskStatus::Scheduled
            || !record.status.is_terminal()
        {
            return Err(TransitionError::Illegal {
                from: entry.record.status,
                to: record.status,
            });
        }

        entry.record = record;
        entry.claimed = false;
        entry.permit = None;
        Ok(())
    }

    /// Cancel a record that is scheduled and not yet claimed.
    ///
    /// The transition, the admission release and the wake-up of the executor happen in
    /// one critical section.
    pub fn cancel(&self, id: &str) -> Cancel {
        let mut inner = self.write();
        let Some(entry) = inner.tasks.get_mut(id) else {
            return Cancel::NotFound;
        };

        match entry.record.status {
            TaskStatus::Canceled => Cancel::AlreadyCanceled(entry.record.clone()),
            TaskStatus::Executed | TaskStatus::Failed => Cancel::Conflict(entry.record.clone()),
            TaskStatus::Scheduled if entry.claimed => Cancel::Conflict(entry.record.clone()),
            TaskStatus::Scheduled => match entry.record.mark_canceled() {
                Ok(()) => {
                    entry.permit = None;
                    entry.cancel.cancel();
                    Cancel::Canceled(entry.record.clone())
                }
                Err(_) => Cancel::Conflict(entry.record.clone()),
            },
        }
    }

    /// Fail a record whose executor cannot finish it, claimed or not.
    ///
    /// Releases the slot and wakes anything waiting on the token. Returns `None` when the
    /// record is already terminal.
    pub fn abandon(&self, id: &str, reason: &str) -> Option<TaskRecord> {
        let mut inner = self.write();
        let entry = inner.tasks.get_mut(id)?;
        if entry.record.status != TaskStatus::Scheduled {
            return None;
        }

        entry
            .record
            .mark_failed(FAILURE_EXIT_CODE, String::new(), reason.to_string())
            .ok()?;
        entry.claimed = false;
        entry.permit = None;
        entry.cancel.cancel();
        Some(entry.record.clone())
    }

    fn read(&self) -> RwLockReadGuard<'_, RegistryInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, RegistryInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}
