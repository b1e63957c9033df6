//! Amplitude envelope via the FFT-based analytic signal.
//!
//! The analytic signal keeps the DC (and, for even lengths, Nyquist) bin,
//! doubles the positive frequencies and zeroes the negative ones. Its
//! magnitude is the instantaneous amplitude.

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::sync::Arc;

/// Computes `|x + j·H{x}|` for fixed-length frames.
///
/// The FFT plans and the complex scratch buffer are created once per frame
/// length and reused for every block.
pub struct EnvelopeExtractor {
    len: usize,
    forward: Arc<dyn Fft<f64>>,
    inverse: Arc<dyn Fft<f64>>,
    spectrum: Vec<Complex<f64>>,
}

impl EnvelopeExtractor {
    pub fn new(len: usize) -> Self {
        let mut planner = FftPlanner::new();
        Self {
            len,
            forward: planner.plan_fft_forward(len),
            inverse: planner.plan_fft_inverse(len),
            spectrum: vec![Complex::new(0.0, 0.0); len],
        }
    }

    /// Write the envelope of `frame` into `out`, replacing its contents.
    ///
    /// `frame` must be exactly the planned length; anything else leaves `out`
    /// empty.
    pub fn envelope(&mut self, frame: &[f64], out: &mut Vec<f64>) {
        out.clear();
        let n = self.len;
        if frame.len() != n || n == 0 {
            return;
        }

        for (slot, &x) in self.spectrum.iter_mut().zip(frame) {
            *slot = Complex::new(x, 0.0);
        }
        self.forward.process(&mut self.spectrum);

        let half = n / 2;
        let positive_end = if n % 2 == 0 { half } else { half + 1 };
        for bin in &mut self.spectrum[1..positive_end] {
            *bin *= 2.0;
        }
        for bin in &mut self.spectrum[half + 1..] {
            *bin = Complex::new(0.0, 0.0);
        }

        self.inverse.process(&mut self.spectrum);

        // rustfft does not normalise the inverse transform
        let scale = 1.0 / n as f64;
        out.extend(self.spectrum.iter().map(|z| z.norm() * scale));
    }
}
