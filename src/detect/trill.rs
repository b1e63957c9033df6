//! Envelope-periodicity trill classifier.

use crate::audio::AudioBlock;
use crate::config::TrillConfig;
use crate::detect::{Detection, Detector, EnvelopeBuffer, Rejection, Signal};
use crate::dsp::stats::{mean, std_dev};
use crate::dsp::{ButterworthLowPass, EnvelopeExtractor, find_peaks};
use crate::error::Result;
use tracing::trace;

/// Channel analysed in multi-channel blocks.
const ANALYSIS_CHANNEL: usize = 0;

/// Summary of the last analysed block, for logging and inspection.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TrillAnalysis {
    /// Mean of the block's smoothed envelope.
    pub envelope_mean: f64,
    /// Peaks found in the smoothed envelope.
    pub peak_count: usize,
    /// Peaks per second.
    pub rate_hz: f64,
    /// Standard deviation of inter-peak intervals in seconds.
    pub interval_std: Option<f64>,
}

/// Classifies each block as trilling or not from the periodicity of its
/// amplitude envelope.
///
/// Per block: analytic-signal envelope, causal Butterworth smoothing (state
/// carried between blocks), slide into the envelope window, then amplitude,
/// peak count, peak rate and interval regularity checks. Exactly one
/// classification is produced for every delivered block.
pub struct TrillDetector {
    block_size: usize,
    sample_rate: f64,
    amplitude_threshold: f64,
    freq_low: f64,
    freq_high: f64,
    periodicity_threshold: f64,
    extractor: EnvelopeExtractor,
    smoother: ButterworthLowPass,
    settled: bool,
    window: EnvelopeBuffer,
    last_analysis: TrillAnalysis,
    channel: Vec<f64>,
    envelope: Vec<f64>,
    smoothed: Vec<f64>,
    peaks: Vec<usize>,
    intervals: Vec<f64>,
}

impl TrillDetector {
    /// # Errors
    /// `FilterDesign` when the smoothing filter cannot be built for this rate.
    pub fn new(config: &TrillConfig, sample_rate: u32) -> Result<Self> {
        let smoother =
            ButterworthLowPass::new(config.filter_order, config.cutoff_hz, sample_rate as f64)?;
        let block_size = config.block_frames(sample_rate);

        Ok(Self {
            block_size,
            sample_rate: sample_rate as f64,
            amplitude_threshold: config.amplitude_threshold,
            freq_low: config.freq_low,
            freq_high: config.freq_high,
            periodicity_threshold: config.periodicity_threshold,
            extractor: EnvelopeExtractor::new(block_size),
            smoother,
            settled: false,
            window: EnvelopeBuffer::new(config.window_frames(sample_rate)),
            last_analysis: TrillAnalysis::default(),
            channel: Vec::with_capacity(block_size),
            envelope: Vec::with_capacity(block_size),
            smoothed: Vec::with_capacity(block_size),
            peaks: Vec::new(),
            intervals: Vec::new(),
        })
    }

    /// Ordered copy of the smoothed-envelope window, oldest sample first.
    ///
    /// The detector keeps sole ownership of the live buffer; other consumers
    /// work on this copy.
    pub fn envelope_window(&self) -> Vec<f64> {
        self.window.to_vec()
    }

    /// Figures from the most recent well-formed block.
    pub fn last_analysis(&self) -> TrillAnalysis {
        self.last_analysis
    }

    fn smooth_envelope(&mut self) {
        if !self.settled {
            if let Some(&first) = self.envelope.first() {
                // One second of the first value flushes the start-up step response
                self.smoother.settle(first, self.sample_rate as usize);
            }
            self.settled = true;
        }
        self.smoother.process_into(&self.envelope, &mut self.smoothed);
    }

    fn classify(&mut self) -> std::result::Result<(), Rejection> {
        let duration = self.smoothed.len() as f64 / self.sample_rate;
        self.last_analysis = TrillAnalysis::default();

        let envelope_mean = mean(&self.smoothed).unwrap_or(0.0);
        self.last_analysis.envelope_mean = envelope_mean;
        if envelope_mean < self.amplitude_threshold {
            return Err(Rejection::BelowSilenceThreshold {
                level: envelope_mean,
                threshold: self.amplitude_threshold,
            });
        }

        find_peaks(&self.smoothed, 0.0, &mut self.peaks);
        let peak_count = self.peaks.len();
        self.last_analysis.peak_count = peak_count;
        if peak_count < 2 {
            return Err(Rejection::InsufficientPeaks { found: peak_count });
        }

        let rate_hz = peak_count as f64 / duration;
        self.last_analysis.rate_hz = rate_hz;
        if !(rate_hz >= self.freq_low && rate_hz <= self.freq_high) {
            return Err(Rejection::OutOfRange {
                quantity: "peak rate Hz",
                value: rate_hz,
                low: self.freq_low,
                high: self.freq_high,
            });
        }

        self.intervals.clear();
        self.intervals.extend(
            self.peaks
                .windows(2)
                .map(|pair| (pair[1] - pair[0]) as f64 / self.sample_rate),
        );
        let spread = std_dev(&self.intervals).unwrap_or(f64::INFINITY);
        self.last_analysis.interval_std = Some(spread);
        if spread >= self.periodicity_threshold {
            return Err(Rejection::Irregular {
                spread,
                threshold: self.periodicity_threshold,
            });
        }

        Ok(())
    }
}

impl Detector for TrillDetector {
    fn process(&mut self, block: &AudioBlock) -> Detection {
        let frames = block.frames();
        if frames != self.block_size {
            return Detection::emit_rejected(
                Signal::Trill(false),
                Rejection::MalformedBlock {
                    expected: self.block_size,
                    actual: frames,
                },
            );
        }

        block.channel_into(ANALYSIS_CHANNEL, &mut self.channel);
        self.extractor.envelope(&self.channel, &mut self.envelope);
        self.smooth_envelope();
        self.window.push_slice(&self.smoothed);

        let verdict = self.classify();
        trace!(analysis = ?self.last_analysis, "trill analysis");

        match verdict {
            Ok(()) => Detection::emit(Signal::Trill(true)),
            Err(rejection) => Detection::emit_rejected(Signal::Trill(false), rejection),
        }
    }

    fn name(&self) -> &'static str {
        "trill"
    }

    fn block_size(&self) -> usize {
        self.block_size
    }
}
