//! Error types for trillcast.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrillcastError {
    // Configuration errors
    #[error("Configuration file not found at {path}")]
    ConfigFileNotFound { path: String },

    #[error("Failed to parse configuration: {message}")]
    ConfigParse { message: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Audio capture errors
    #[error("Audio device not found: {device}")]
    AudioDeviceNotFound { device: String },

    #[error("Audio format mismatch: expected {expected}, got {actual}")]
    AudioFormatMismatch { expected: String, actual: String },

    #[error("Audio capture failed: {message}")]
    AudioCapture { message: String },

    // Signal emission errors
    #[error("Emitter socket error: {message}")]
    EmitterSocket { message: String },

    #[error("Invalid emitter address {address}: {message}")]
    EmitterAddress { address: String, message: String },

    #[error("{pipeline} pipeline failed: {message}")]
    PipelineFailed { pipeline: String, message: String },

    // DSP setup errors
    #[error("Filter design failed: {message}")]
    FilterDesign { message: String },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, TrillcastError>;
