use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoggerError {
    #[error("unknown log format '{0}' (valid: text, json, journald)")]
    InvalidFormat(String),
    #[error("journald output needs Linux and the `journald` feature")]
    JournaldNotSupported,
    #[error("a global tracing subscriber is already installed")]
    AlreadyInitialized,
    #[error("cannot install logger: {0}")]
    Init(String),
    #[error("invalid log filter '{level}': {reason}")]
    InvalidLevel { level: String, reason: String },
}
