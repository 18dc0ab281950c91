//! Side-effect-free checks applied to a task before admission.

use std::collections::BTreeSet;

use deferd_model::{Task, TaskSeconds};
use thiserror::Error;

/// Verbs accepted when no whitelist is configured.
pub const DEFAULT_VERBS: [&str; 7] = ["echo", "date", "ls", "uptime", "whoami", "pwd", "ping"];

/// Minimum accepted delay in seconds.
pub const MIN_DELAY_SECONDS: TaskSeconds = 1;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("command is empty")]
    EmptyCommand,
    #[error("command '{0}' is not whitelisted")]
    NotWhitelisted(String),
    #[error("run_after_seconds must be at least {MIN_DELAY_SECONDS}, got {0}")]
    InvalidDelay(TaskSeconds),
    #[error("run_after_seconds {delay} exceeds the safety timeout of {max}s")]
    DelayExceedsTimeout { delay: TaskSeconds, max: TaskSeconds },
}

/// Set of command verbs a task may start with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Whitelist(BTreeSet<String>);

impl Whitelist {
    pub fn new<I, S>(verbs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(
            verbs
                .into_iter()
                .map(Into::into)
                .filter(|v: &String| !v.trim().is_empty())
                .map(|v| v.trim().to_string())
                .collect(),
        )
    }

    #[inline]
    pub fn contains(&self, verb: &str) -> bool {
        self.0.contains(verb)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for Whitelist {
    fn default() -> Self {
        Self::new(DEFAULT_VERBS)
    }
}

/// Check the verb against `whitelist` and the delay against the minimum and,
/// when given, against `max_delay`.
pub fn validate_task(
    task: &Task,
    whitelist: &Whitelist,
    max_delay: Option<TaskSeconds>,
) -> Result<(), ValidationError> {
    let verb = task.verb().ok_or(ValidationError::EmptyCommand)?;
    if !whitelist.contains(verb) {
        return Err(ValidationError::NotWhitelisted(verb.to_string()));
    }

    let delay = task.run_after_seconds;
    if delay < MIN_DELAY_SECONDS {
        return Err(ValidationError::InvalidDelay(delay));
    }
    if let Some(max) = max_delay
        && delay > max
    {
        return Err(ValidationError::DelayExceedsTimeout { delay, max });
    }
    Ok(())
}
