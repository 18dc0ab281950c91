//! Delayed-execution engine.
//!
//! A [`Scheduler`] validates submissions, admits them against a bound on in-flight work,
//! registers them in the [`TaskRegistry`] and hands each one to its own delayed executor.
//! Every terminal outcome is appended to the [`HistoryLog`]; both the registry snapshot
//! and the history are mirrored to JSON files when a data directory is configured.

pub mod admission;
pub use admission::{Admission, AdmissionPermit, Overflow};

pub mod config;
pub use config::{SchedulerConfig, TimeoutPolicy};

pub mod error;
pub use error::CoreError;

pub mod events;
pub use events::{EventKind, Subscribe, TaskEvent};

mod engine;
mod executor;
pub use executor::{ExecutionHandle, Outcome};

pub mod history;
pub use history::HistoryLog;

pub mod ids;
pub use ids::IdAllocator;

pub mod persist;
pub use persist::{JsonFile, PersistError};

pub mod registry;
pub use registry::{Cancel, ClaimError, TaskRegistry};

pub mod runner;
pub use runner::{CommandRunner, RunOutput, RunnerError};

mod scheduler;
pub use scheduler::{CancelOutcome, Scheduler, Submission};

pub mod validate;
pub use validate::{ValidationError, Whitelist, validate_task};
