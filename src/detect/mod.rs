//! Block detectors: pitch tracking and trill classification.
//!
//! Each detector owns all of its cross-block state and is driven from a single
//! thread, one block at a time.

pub mod envelope_buffer;
pub mod history;
pub mod pitch;
pub mod trill;

pub use envelope_buffer::EnvelopeBuffer;
pub use history::PitchHistory;
pub use pitch::PitchTracker;
pub use trill::TrillDetector;

use crate::audio::AudioBlock;
use thiserror::Error;

/// Value a detector wants sent downstream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Signal {
    /// Smoothed semitone offset from the reference pitch.
    Pitch(f64),
    /// Trill classification for one block.
    Trill(bool),
}

/// Why a block did not produce a positive result.
///
/// Every variant is recoverable; the next block supersedes the rejected one.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Rejection {
    #[error("malformed block: expected {expected} frames, got {actual}")]
    MalformedBlock { expected: usize, actual: usize },

    #[error("below silence threshold: level {level:.5} < {threshold}")]
    BelowSilenceThreshold { level: f64, threshold: f64 },

    #[error("{quantity} {value:.2} outside [{low}, {high}]")]
    OutOfRange {
        quantity: &'static str,
        value: f64,
        low: f64,
        high: f64,
    },

    #[error("insufficient peaks: found {found}, need 2")]
    InsufficientPeaks { found: usize },

    #[error("deviation {deviation:.2} semitones from history mean {mean:.2} exceeds {limit}")]
    HistoryDeviation {
        deviation: f64,
        mean: f64,
        limit: f64,
    },

    #[error("irregular peak spacing: interval std {spread:.4} s >= {threshold}")]
    Irregular { spread: f64, threshold: f64 },
}

impl Rejection {
    /// Stable short name for counters and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Rejection::MalformedBlock { .. } => "malformed_block",
            Rejection::BelowSilenceThreshold { .. } => "below_silence_threshold",
            Rejection::OutOfRange { .. } => "out_of_range",
            Rejection::InsufficientPeaks { .. } => "insufficient_peaks",
            Rejection::HistoryDeviation { .. } => "history_deviation",
            Rejection::Irregular { .. } => "irregular",
        }
    }
}

/// Result of running one block through a detector.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    /// What to emit, if anything.
    pub signal: Option<Signal>,
    /// Why the block was rejected, if it was.
    pub rejection: Option<Rejection>,
}

impl Detection {
    pub fn emit(signal: Signal) -> Self {
        Self {
            signal: Some(signal),
            rejection: None,
        }
    }

    pub fn silent(rejection: Rejection) -> Self {
        Self {
            signal: None,
            rejection: Some(rejection),
        }
    }

    pub fn emit_rejected(signal: Signal, rejection: Rejection) -> Self {
        Self {
            signal: Some(signal),
            rejection: Some(rejection),
        }
    }
}

/// A per-block analysis stage.
///
/// `process` is called once per delivered block, always from the same thread.
pub trait Detector: Send + 'static {
    /// Analyse one block.
    fn process(&mut self, block: &AudioBlock) -> Detection;

    /// Name for logging and error reporting.
    fn name(&self) -> &'static str;

    /// Frames per block this detector expects.
    fn block_size(&self) -> usize;

    /// Called once when the driver stops.
    fn shutdown(&mut self) {}
}
