use std::borrow::Borrow;

use deferd_core::{EventKind, TaskEvent};
use tracing::{error, info, warn};

pub trait View {
    fn as_task(&self) -> &str;
    fn as_reason(&self) -> &str;
    fn kind(&self) -> EventKind;
    fn has_reason(&self) -> bool;
}

impl<T> View for T
where
    T: Borrow<TaskEvent>,
{
    #[inline]
    fn as_task(&self) -> &str {
        self.borrow().task.as_ref().map_or("unknown", |id| id.as_str())
    }
    #[inline]
    fn as_reason(&self) -> &str {
        self.borrow().reason.as_deref().unwrap_or("unknown")
    }
    #[inline]
    fn kind(&self) -> EventKind {
        self.borrow().kind
    }
    #[inline]
    fn has_reason(&self) -> bool {
        self.borrow().reason.is_some()
    }
}

#[inline]
pub fn message_for(kind: EventKind) -> &'static str {
    match kind {
        // admission
        EventKind::Scheduled => "task scheduled",
        EventKind::Rejected => "submission rejected by validation",
        EventKind::Overflow => "submission refused; too many tasks in flight",
        EventKind::Malformed => "malformed submission recorded as failed",

        // terminal
        EventKind::Executed => "task executed",
        EventKind::Failed => "task failed",
        EventKind::Canceled => "task canceled",
        EventKind::TimedOut => "task canceled due to timeout",

        // storage
        EventKind::PersistFailed => "failed to persist task state",
    }
}

#[inline]
pub fn log_event<E: View>(e: E) {
    let msg = message_for(e.kind());

    match e.kind() {
        // admission
        EventKind::Scheduled => info!(task = e.as_task(), command = e.as_reason(), "{msg}"),
        EventKind::Rejected => warn!(reason = e.as_reason(), "{msg}"),
        EventKind::Overflow => warn!(reason = e.as_reason(), "{msg}"),
        EventKind::Malformed => {
            warn!(task = e.as_task(), reason = e.as_reason(), "{msg}")
        }

        // terminal
        EventKind::Executed => info!(task = e.as_task(), "{msg}"),
        EventKind::Failed => error!(task = e.as_task(), reason = e.as_reason(), "{msg}"),
        EventKind::Canceled => info!(task = e.as_task(), "{msg}"),
        EventKind::TimedOut => {
            warn!(task = e.as_task(), reason = e.as_reason(), "{msg}")
        }

        // storage
        EventKind::PersistFailed => {
            if e.has_reason() {
                error!(task = e.as_task(), reason = e.as_reason(), "{msg}")
            } else {
                error!(task = e.as_task(), "{msg}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use deferd_model::TaskId;

    use super::*;

    #[test]
    fn view_falls_back_to_unknown() {
        let event = TaskEvent::new(EventKind::Overflow);
        assert_eq!(event.as_task(), "unknown");
        assert_eq!(event.as_reason(), "unknown");
        assert!(!event.has_reason());
    }

    #[test]
    fn view_reads_through_references() {
        let event = TaskEvent::new(EventKind::Failed)
            .with_task(&TaskId::from("abcd1234"))
            .with_reason("exit code: 2");
        let by_ref = &event;
        assert_eq!(by_ref.as_task(), "abcd1234");
        assert_eq!(by_ref.as_reason(), "exit code: 2");
        assert_eq!(by_ref.kind(), EventKind::Failed);
    }

    #[test]
    fn timeout_message_matches_log_line() {
        assert_eq!(message_for(EventKind::TimedOut), "task canceled due to timeout");
    }
}
