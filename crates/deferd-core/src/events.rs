//! Lifecycle notifications published by the scheduler.

use deferd_model::TaskId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Task admitted and its executor started.
    Scheduled,
    /// Submission failed validation.
    Rejected,
    /// Submission refused because the admission limit was reached.
    Overflow,
    /// Submission body could not be decoded; recorded as failed.
    Malformed,
    Executed,
    Failed,
    /// Canceled by a delete request.
    Canceled,
    /// Force-canceled by the safety timeout.
    TimedOut,
    /// Writing `tasks.json` or `history.json` failed.
    PersistFailed,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Scheduled => "scheduled",
            EventKind::Rejected => "rejected",
            EventKind::Overflow => "overflow",
            EventKind::Malformed => "malformed",
            EventKind::Executed => "executed",
            EventKind::Failed => "failed",
            EventKind::Canceled => "canceled",
            EventKind::TimedOut => "timed_out",
            EventKind::PersistFailed => "persist_failed",
        }
    }

    /// Returns `true` for events that release an admission slot.
    pub fn is_release(&self) -> bool {
        matches!(
            self,
            EventKind::Executed | EventKind::Failed | EventKind::Canceled | EventKind::TimedOut
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskEvent {
    pub kind: EventKind,
    pub task: Option<TaskId>,
    pub reason: Option<String>,
}

impl TaskEvent {
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            task: None,
            reason: None,
        }
    }

    pub fn with_task(mut self, id: &TaskId) -> Self {
        self.task = Some(id.clone());
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// Receiver of [`TaskEvent`]s.
///
/// Called inline on the task's own executor; implementations must not block.
pub trait Subscribe: Send + Sync + 'static {
    fn on_event(&self, event: &TaskEvent);

    fn name(&self) -> &'static str;
}
