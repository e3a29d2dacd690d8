//! Error types for the log stream crate

use tessera_common::{impl_error_from, ValidationError};
use thiserror::Error;

/// Result type for log stream operations
pub type LogStreamResult<T> = Result<T, LogStreamError>;

/// Errors raised while configuring or driving a log stream
#[derive(Error, Debug)]
pub enum LogStreamError {
    #[error("Invalid log stream configuration: {0}")]
    Validation(ValidationError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown log level: {0}")]
    UnknownLevel(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No tokio runtime available: {0}")]
    Runtime(String),

    #[error("Log stream is already driven by a handle")]
    AlreadyRunning,

    #[error("Log stream is closed")]
    Closed,
}

impl_error_from!(ValidationError => LogStreamError::Validation);
impl_error_from!(::config::ConfigError => LogStreamError::Config, |e| e.to_string());
