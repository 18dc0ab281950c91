use serde::{Deserialize, Serialize};

/// Delay in whole seconds as submitted by the client.
///
/// Signed so that zero and negative delays survive decoding and are rejected by validation
/// instead of by the JSON layer.
pub type TaskSeconds = i64;

/// A submitted command and the delay before it runs. Immutable once accepted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Task {
    /// Whitelisted verb followed by its arguments.
    #[serde(default)]
    pub command: String,
    /// Seconds to wait before running the command.
    #[serde(default)]
    pub run_after_seconds: TaskSeconds,
}

impl Task {
    pub fn new(command: impl Into<String>, run_after_seconds: TaskSeconds) -> Self {
        Self {
            command: command.into(),
            run_after_seconds,
        }
    }

    /// First whitespace-separated token of the command, if any.
    pub fn verb(&self) -> Option<&str> {
        self.command.split_whitespace().next()
    }
}
