//! Spectral-peak pitch estimation: the FFT bin with the largest magnitude.

use crate::dsp::{PitchEstimator, parabolic_vertex};
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::f64::consts::PI;
use std::sync::Arc;

/// Estimates pitch as the strongest Hann-windowed spectral bin, refined with
/// parabolic interpolation over neighbouring magnitudes.
///
/// Cheap but coarse for short frames: at 512 samples and 44.1 kHz a bin is
/// about 86 Hz wide. Harmonic-rich sources may lock onto an overtone.
pub struct SpectralPeakEstimator {
    planner: FftPlanner<f64>,
    fft: Option<Arc<dyn Fft<f64>>>,
    window: Vec<f64>,
    buffer: Vec<Complex<f64>>,
    magnitudes: Vec<f64>,
}

impl SpectralPeakEstimator {
    pub fn new() -> Self {
        Self {
            planner: FftPlanner::new(),
            fft: None,
            window: Vec::new(),
            buffer: Vec::new(),
            magnitudes: Vec::new(),
        }
    }

    fn plan(&mut self, len: usize) -> Arc<dyn Fft<f64>> {
        if let Some(fft) = &self.fft
            && fft.len() == len
        {
            return Arc::clone(fft);
        }
        let fft = self.planner.plan_fft_forward(len);
        self.window = (0..len)
            .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f64 / len as f64).cos())
            .collect();
        self.fft = Some(Arc::clone(&fft));
        fft
    }
}

impl Default for SpectralPeakEstimator {
    fn default() -> Self {
        Self::new()
    }
}

impl PitchEstimator for SpectralPeakEstimator {
    fn estimate(&mut self, frame: &[f64], sample_rate: f64) -> Option<f64> {
        let n = frame.len();
        if n < 4 {
            return None;
        }
        let fft = self.plan(n);

        self.buffer.clear();
        self.buffer.extend(
            frame
                .iter()
                .zip(&self.window)
                .map(|(&x, &w)| Complex::new(x * w, 0.0)),
        );
        fft.process(&mut self.buffer);

        self.magnitudes.clear();
        self.magnitudes
            .extend(self.buffer[..=n / 2].iter().map(|c| c.norm()));

        // Bin 0 is DC
        let (peak, &peak_mag) = self.magnitudes[1..]
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, m)| (i + 1, m))?;
        if peak_mag <= f64::EPSILON {
            return None;
        }

        let (offset, _) = parabolic_vertex(&self.magnitudes, peak);
        Some((peak as f64 + offset) * sample_rate / n as f64)
    }

    fn name(&self) -> &'static str {
        "spectral-peak"
    }
}
