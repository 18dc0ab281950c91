use std::{path::PathBuf, str::FromStr, time::Duration};

use deferd_model::TaskSeconds;
use thiserror::Error;

use crate::validate::Whitelist;

/// Default bound on tasks simultaneously scheduled or running.
pub const DEFAULT_MAX_IN_FLIGHT: usize = 5;

/// Default upper bound on how long a task may stay scheduled.
pub const DEFAULT_SAFETY_TIMEOUT: Duration = Duration::from_secs(30);

/// How the safety timeout relates to the requested delay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TimeoutPolicy {
    /// The fixed safety timeout races the delay. A delay longer than the timeout
    /// can never run: the task is force-canceled when the timeout fires.
    #[default]
    Cancel,
    /// Delays longer than the safety timeout are rejected at validation.
    Reject,
    /// The safety deadline is `delay + safety_timeout`, so every accepted delay can run.
    Extend,
}

#[derive(Debug, Error)]
#[error("unknown timeout policy: '{0}' (valid: cancel, reject, extend)")]
pub struct UnknownPolicy(pub String);

impl FromStr for TimeoutPolicy {
    type Err = UnknownPolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cancel" => Ok(TimeoutPolicy::Cancel),
            "reject" => Ok(TimeoutPolicy::Reject),
            "extend" => Ok(TimeoutPolicy::Extend),
            _ => Err(UnknownPolicy(s.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Admission limit on scheduled-or-running tasks.
    pub max_in_flight: usize,
    /// Absolute bound on the time a task may remain scheduled.
    pub safety_timeout: Duration,
    pub timeout_policy: TimeoutPolicy,
    /// Verbs a command may start with.
    pub whitelist: Whitelist,
    /// Directory holding `tasks.json` and `history.json`; `None` keeps everything in memory.
    pub data_dir: Option<PathBuf>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            safety_timeout: DEFAULT_SAFETY_TIMEOUT,
            timeout_policy: TimeoutPolicy::default(),
            whitelist: Whitelist::default(),
            data_dir: None,
        }
    }
}

impl SchedulerConfig {
    /// Largest delay validation accepts, if the policy caps it.
    pub fn max_delay(&self) -> Option<TaskSeconds> {
        match self.timeout_policy {
            TimeoutPolicy::Reject => {
                Some(TaskSeconds::try_from(self.safety_timeout.as_secs()).unwrap_or(TaskSeconds::MAX))
            }
            TimeoutPolicy::Cancel | TimeoutPolicy::Extend => None,
        }
    }

    /// Time after admission at which a still-scheduled task is force-canceled.
    pub fn safety_deadline(&self, delay: Duration) -> Duration {
        match self.timeout_policy {
            TimeoutPolicy::Cancel | TimeoutPolicy::Reject => self.safety_timeout,
            TimeoutPolicy::Extend => delay.saturating_add(self.safety_timeout),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_baseline() {
        let cfg = SchedulerConfig::default();
        assert_eq!(cfg.max_in_flight, 5);
        assert_eq!(cfg.safety_timeout, Duration::from_secs(30));
        assert_eq!(cfg.timeout_policy, TimeoutPolicy::Cancel);
        assert!(cfg.data_dir.is_none());
        assert_eq!(cfg.max_delay(), None);
    }

    #[test]
    fn reject_policy_caps_delay_at_timeout() {
        let cfg = SchedulerConfig {
            timeout_policy: TimeoutPolicy::Reject,
            ..Default::default()
        };
        assert_eq!(cfg.max_delay(), Some(30));
        assert_eq!(cfg.safety_deadline(Duration::from_secs(5)), Duration::from_secs(30));
    }

    #[test]
    fn extend_policy_moves_deadline_past_delay() {
        let cfg = SchedulerConfig {
            timeout_policy: TimeoutPolicy::Extend,
            ..Default::default()
        };
        assert_eq!(cfg.safety_deadline(Duration::from_secs(45)), Duration::from_secs(75));
    }

    #[test]
    fn policy_parses_case_insensitively() {
        assert_eq!("Extend".parse::<TimeoutPolicy>().unwrap(), TimeoutPolicy::Extend);
        assert!("forever".parse::<TimeoutPolicy>().is_err());
    }
}
