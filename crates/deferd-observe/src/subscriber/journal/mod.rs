use deferd_core::{Subscribe, TaskEvent};

use crate::subscriber::view::log_event;

/// Writes every task event to the installed `tracing` subscriber.
#[derive(Debug, Default)]
pub struct Journal;

impl Journal {
    pub fn new() -> Self {
        Self
    }
}

impl Subscribe for Journal {
    fn on_event(&self, event: &TaskEvent) {
        log_event(event);
    }

    fn name(&self) -> &'static str {
        "journal"
    }
}
