//! Error types and reporting for stream drivers.

use std::fmt;
use tracing::{error, warn};

/// Errors that can occur while driving a pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum StationError {
    /// Recoverable error that allows the driver to continue with the next block.
    Recoverable(String),
    /// Fatal error that requires the driver to shut down.
    Fatal(String),
}

impl fmt::Display for StationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StationError::Recoverable(msg) => write!(f, "Recoverable error: {}", msg),
            StationError::Fatal(msg) => write!(f, "Fatal error: {}", msg),
        }
    }
}

impl std::error::Error for StationError {}

/// Trait for reporting driver errors.
pub trait ErrorReporter: Send + Sync {
    /// Reports an error from a named pipeline.
    fn report(&self, station: &str, error: &StationError);
}

/// Error reporter that forwards to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogReporter;

impl ErrorReporter for LogReporter {
    fn report(&self, station: &str, error: &StationError) {
        match error {
            StationError::Recoverable(msg) => warn!(station, "{}", msg),
            StationError::Fatal(msg) => error!(station, "{}", msg),
        }
    }
}
