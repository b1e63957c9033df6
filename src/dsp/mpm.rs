//! McLeod Pitch Method (normalized square difference function).
//!
//! Reference: P. McLeod and G. Wyvill, "A Smarter Way to Find Pitch", 2005.
//! The NSDF is `n'(τ) = 2 r(τ) / m'(τ)`, where `r` is the autocorrelation and
//! `m'` is computed incrementally from `m'(0) = 2 r(0)`.

use crate::dsp::{PitchEstimator, parabolic_vertex};

/// Fraction of the highest key maximum a candidate must reach to be picked.
const KEY_MAXIMUM_CUTOFF: f64 = 0.9;

/// One NSDF maximum between a positive-going and the next negative-going zero
/// crossing, refined by parabolic interpolation.
#[derive(Debug, Clone, Copy, PartialEq)]
struct KeyMaximum {
    lag: f64,
    value: f64,
}

/// Pitch estimator based on the McLeod normalized square difference function.
#[derive(Debug, Clone)]
pub struct McLeodEstimator {
    min_hz: f64,
    clarity_threshold: f64,
    autocorr: Vec<f64>,
    m_prime: Vec<f64>,
    nsdf: Vec<f64>,
    key_maxima: Vec<KeyMaximum>,
    last_clarity: f64,
}

impl McLeodEstimator {
    /// Create an estimator that looks for periods down to `min_hz` and reports
    /// a pitch only when the chosen NSDF peak reaches `clarity_threshold`.
    pub fn new(min_hz: f64, clarity_threshold: f64) -> Self {
        Self {
            min_hz,
            clarity_threshold,
            autocorr: Vec::new(),
            m_prime: Vec::new(),
            nsdf: Vec::new(),
            key_maxima: Vec::new(),
            last_clarity: 0.0,
        }
    }

    /// NSDF value of the most recently chosen key maximum (0 when none).
    pub fn last_clarity(&self) -> f64 {
        self.last_clarity
    }

    fn lag_count(&self, frame_len: usize, sample_rate: f64) -> usize {
        let longest_period = (sample_rate / self.min_hz).ceil() as usize + 2;
        longest_period.min(frame_len.saturating_sub(1))
    }

    fn compute_nsdf(&mut self, frame: &[f64], lag_count: usize) {
        let n = frame.len();

        self.autocorr.clear();
        self.autocorr.extend((0..lag_count).map(|tau| {
            frame[..n - tau]
                .iter()
                .zip(&frame[tau..])
                .map(|(a, b)| a * b)
                .sum::<f64>()
        }));

        m_prime_incremental(frame, self.autocorr[0], lag_count, &mut self.m_prime);

        self.nsdf.clear();
        self.nsdf.extend(
            self.autocorr
                .iter()
                .zip(&self.m_prime)
                .map(|(&r, &m)| if m > 0.0 { 2.0 * r / m } else { 0.0 }),
        );
    }

    fn collect_key_maxima(&mut self) {
        self.key_maxima.clear();
        let nsdf = &self.nsdf;

        // Skip the lobe around lag zero
        let Some(first_negative) = nsdf.iter().position(|&v| v < 0.0) else {
            return;
        };

        let mut best: Option<usize> = None;
        for i in first_negative..nsdf.len() {
            let value = nsdf[i];
            if value > 0.0 {
                if best.is_none_or(|b| value > nsdf[b]) {
                    best = Some(i);
                }
            } else if let Some(b) = best.take() {
                let (offset, value) = parabolic_vertex(nsdf, b);
                self.key_maxima.push(KeyMaximum {
                    lag: b as f64 + offset,
                    value,
                });
            }
        }
        if let Some(b) = best {
            let (offset, value) = parabolic_vertex(nsdf, b);
            self.key_maxima.push(KeyMaximum {
                lag: b as f64 + offset,
                value,
            });
        }
    }
}

/// `m'(τ) = Σ x[j]² + x[j+τ]²`, via the incremental subtraction
/// `m'(τ) = m'(τ-1) - x[n-τ]² - x[τ-1]²`.
fn m_prime_incremental(frame: &[f64], autocorr_at_lag_0: f64, lag_count: usize, out: &mut Vec<f64>) {
    let n = frame.len();
    out.clear();
    if lag_count == 0 {
        return;
    }
    out.push(2.0 * autocorr_at_lag_0);
    for tau in 1..lag_count {
        let tail = frame[n - tau];
        let head = frame[tau - 1];
        let previous = out[tau - 1];
        out.push(previous - tail * tail - head * head);
    }
}

impl PitchEstimator for McLeodEstimator {
    fn estimate(&mut self, frame: &[f64], sample_rate: f64) -> Option<f64> {
        self.last_clarity = 0.0;
        let lag_count = self.lag_count(frame.len(), sample_rate);
        if lag_count < 3 {
            return None;
        }

        self.compute_nsdf(frame, lag_count);
        if self.autocorr[0] <= 0.0 {
            return None;
        }
        self.collect_key_maxima();

        let highest = self
            .key_maxima
            .iter()
            .map(|k| k.value)
            .fold(f64::NEG_INFINITY, f64::max);
        let chosen = self
            .key_maxima
            .iter()
            .find(|k| k.value >= KEY_MAXIMUM_CUTOFF * highest)?;

        self.last_clarity = chosen.value;
        if chosen.value < self.clarity_threshold || chosen.lag <= 0.0 {
            return None;
        }
        Some(sample_rate / chosen.lag)
    }

    fn name(&self) -> &'static str {
        "mpm"
    }
}
