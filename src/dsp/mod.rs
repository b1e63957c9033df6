//! Signal-processing building blocks shared by the detectors.
//!
//! Everything here is stateless or owns only its own scratch buffers; the
//! cross-block state lives in the detectors.

pub mod hilbert;
pub mod lowpass;
pub mod mpm;
pub mod peaks;
pub mod semitone;
pub mod spectral;
pub mod stats;

pub use hilbert::EnvelopeExtractor;
pub use lowpass::ButterworthLowPass;
pub use mpm::McLeodEstimator;
pub use peaks::find_peaks;
pub use semitone::semitone;
pub use spectral::SpectralPeakEstimator;

/// Single-frame fundamental frequency estimator.
pub trait PitchEstimator: Send {
    /// Estimate the dominant frequency of `frame` in Hz.
    ///
    /// Returns `None` when the frame is unvoiced or no periodicity is found.
    fn estimate(&mut self, frame: &[f64], sample_rate: f64) -> Option<f64>;

    /// Short identifier used in logs.
    fn name(&self) -> &'static str;
}

/// Parabolic interpolation of a local maximum at `index`.
///
/// Fits a parabola through `(index-1, index, index+1)` and returns the
/// fractional offset of its vertex (in `-0.5..=0.5` for a true maximum) and
/// the interpolated value. Edges fall back to the sample itself.
pub(crate) fn parabolic_vertex(values: &[f64], index: usize) -> (f64, f64) {
    let centre = values[index];
    if index == 0 || index + 1 >= values.len() {
        return (0.0, centre);
    }
    let left = values[index - 1];
    let right = values[index + 1];

    // ax^2 + bx + c through (-1, left), (0, centre), (1, right)
    let a = 0.5 * (right - 2.0 * centre + left);
    let b = 0.5 * (right - left);
    if a == 0.0 {
        return (0.0, centre);
    }
    let offset = -b / (2.0 * a);
    (offset, a * offset * offset + b * offset + centre)
}
