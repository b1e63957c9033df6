//! Smoothed, outlier-rejecting pitch tracker.

use crate::audio::AudioBlock;
use crate::audio::block::rms;
use crate::config::{PitchConfig, PitchMethod};
use crate::detect::{Detection, Detector, PitchHistory, Rejection, Signal};
use crate::dsp::{McLeodEstimator, PitchEstimator, SpectralPeakEstimator, semitone};
use tracing::trace;

/// Turns blocks into a rolling-mean semitone offset.
///
/// Per block: downmix, silence gate, frequency estimate, range gate, semitone
/// conversion, deviation gate against the history mean, then append and emit
/// the new history mean. Rejected blocks never touch the history.
pub struct PitchTracker {
    estimator: Box<dyn PitchEstimator>,
    history: PitchHistory,
    sample_rate: f64,
    block_size: usize,
    reference_hz: f64,
    min_hz: f64,
    max_hz: f64,
    silence_rms: f64,
    max_deviation: f64,
    mono: Vec<f64>,
}

impl PitchTracker {
    /// Build a tracker with the estimator chosen in `config.method`.
    pub fn new(config: &PitchConfig, sample_rate: u32) -> Self {
        let estimator: Box<dyn PitchEstimator> = match config.method {
            PitchMethod::Mpm => Box::new(McLeodEstimator::new(
                config.min_hz,
                config.clarity_threshold,
            )),
            PitchMethod::SpectralPeak => Box::new(SpectralPeakEstimator::new()),
        };
        Self::with_estimator(config, sample_rate, estimator)
    }

    /// Build a tracker around any estimator.
    pub fn with_estimator(
        config: &PitchConfig,
        sample_rate: u32,
        estimator: Box<dyn PitchEstimator>,
    ) -> Self {
        Self {
            estimator,
            history: PitchHistory::new(config.history_len),
            sample_rate: sample_rate as f64,
            block_size: config.block_size,
            reference_hz: config.reference_hz,
            min_hz: config.min_hz,
            max_hz: config.max_hz,
            silence_rms: config.silence_rms,
            max_deviation: config.max_deviation,
            mono: Vec::with_capacity(config.block_size),
        }
    }

    /// Accepted values so far.
    pub fn history(&self) -> &PitchHistory {
        &self.history
    }

    /// Range-gate an estimated frequency and pass it on to [`Self::accept_semitone`].
    ///
    /// `None` (no pitch found) is treated as 0 Hz, which is always out of range.
    pub fn accept_frequency(&mut self, freq_hz: Option<f64>) -> Result<f64, Rejection> {
        let freq = freq_hz.unwrap_or(0.0);
        if !(freq >= self.min_hz && freq <= self.max_hz) {
            return Err(Rejection::OutOfRange {
                quantity: "pitch Hz",
                value: freq,
                low: self.min_hz,
                high: self.max_hz,
            });
        }

        let value = semitone(freq, self.reference_hz).ok_or(Rejection::OutOfRange {
            quantity: "pitch Hz",
            value: freq,
            low: self.min_hz,
            high: self.max_hz,
        })?;
        self.accept_semitone(value)
    }

    /// Deviation-gate a semitone value; on acceptance append it and return the
    /// new history mean.
    pub fn accept_semitone(&mut self, value: f64) -> Result<f64, Rejection> {
        if let Some(mean) = self.history.mean() {
            let deviation = (value - mean).abs();
            if deviation > self.max_deviation {
                return Err(Rejection::HistoryDeviation {
                    deviation,
                    mean,
                    limit: self.max_deviation,
                });
            }
        }

        self.history.push(value);
        // Non-empty after push
        Ok(self.history.mean().unwrap_or(value))
    }
}

impl Detector for PitchTracker {
    fn process(&mut self, block: &AudioBlock) -> Detection {
        let frames = block.frames();
        if frames != self.block_size {
            return Detection::silent(Rejection::MalformedBlock {
                expected: self.block_size,
                actual: frames,
            });
        }

        block.downmix_into(&mut self.mono);

        let level = rms(&self.mono);
        if level < self.silence_rms {
            return Detection::silent(Rejection::BelowSilenceThreshold {
                level,
                threshold: self.silence_rms,
            });
        }

        let freq = self.estimator.estimate(&self.mono, self.sample_rate);
        trace!(estimator = self.estimator.name(), ?freq, level, "pitch estimate");

        match self.accept_frequency(freq) {
            Ok(mean) => Detection::emit(Signal::Pitch(mean)),
            Err(rejection) => Detection::silent(rejection),
        }
    }

    fn name(&self) -> &'static str {
        "pitch"
    }

    fn block_size(&self) -> usize {
        self.block_size
    }
}
