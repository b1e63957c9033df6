//! trillcast - real-time pitch and trill detection
//!
//! Captures audio in fixed-size blocks, tracks the pitch of a monophonic
//! source as a smoothed semitone offset, classifies trills from the amplitude
//! envelope, and streams both as tiny UDP datagrams.

// Enforce error handling discipline
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod audio;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod defaults;
pub mod detect;
pub mod dsp;
pub mod error;
pub mod pipeline;

// Composition root - needs capture and the CLI types
#[cfg(all(feature = "cpal-audio", feature = "cli"))]
pub mod app;

// Core traits (source → detect → emit)
pub use audio::{AudioBlock, BlockSource, SourceEvent};
pub use detect::{Detection, Detector, Rejection, Signal};
pub use pipeline::emitter::SignalEmitter;

// Detectors
pub use detect::{PitchTracker, TrillDetector};

// Pipeline
pub use pipeline::{DriverHandle, DriverStats, Mode, Output, StreamDriver};

// Error handling
pub use error::{Result, TrillcastError};

// Config
pub use config::{Config, PitchMethod};

// Driver error reporting (for custom reporters)
pub use pipeline::error::{ErrorReporter, StationError};
