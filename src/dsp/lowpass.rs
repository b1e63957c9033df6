//! Causal Butterworth low-pass built from cascaded biquad sections.

use crate::error::{Result, TrillcastError};
use biquad::{Biquad, Coefficients, DirectForm2Transposed, ToHertz};
use std::f64::consts::PI;

/// Q of each second-order section of an even-order Butterworth filter.
///
/// Section `k` of an order-`n` filter has `Q = 1 / (2 cos((2k + 1) π / 2n))`.
fn section_qs(order: usize) -> Vec<f64> {
    (0..order / 2)
        .map(|k| 1.0 / (2.0 * ((2 * k + 1) as f64 * PI / (2 * order) as f64).cos()))
        .collect()
}

/// Single-pass Butterworth low-pass with state that persists across calls.
///
/// Feeding consecutive blocks through one instance is equivalent to filtering
/// the concatenated stream, so block boundaries introduce no transients.
pub struct ButterworthLowPass {
    sections: Vec<DirectForm2Transposed<f64>>,
}

impl ButterworthLowPass {
    /// Design an even-order filter.
    ///
    /// # Errors
    /// `FilterDesign` when the order is zero or odd, or the cutoff is not
    /// strictly between 0 and Nyquist.
    pub fn new(order: usize, cutoff_hz: f64, sample_rate: f64) -> Result<Self> {
        if order == 0 || order % 2 != 0 {
            return Err(TrillcastError::FilterDesign {
                message: format!("order must be even and positive, got {}", order),
            });
        }
        if !(cutoff_hz > 0.0 && cutoff_hz < sample_rate / 2.0) {
            return Err(TrillcastError::FilterDesign {
                message: format!(
                    "cutoff {} Hz must lie between 0 and Nyquist ({} Hz)",
                    cutoff_hz,
                    sample_rate / 2.0
                ),
            });
        }

        let sections = section_qs(order)
            .into_iter()
            .map(|q| {
                Coefficients::<f64>::from_params(
                    biquad::Type::LowPass,
                    sample_rate.hz(),
                    cutoff_hz.hz(),
                    q,
                )
                .map(DirectForm2Transposed::<f64>::new)
                .map_err(|e| TrillcastError::FilterDesign {
                    message: format!("{:?}", e),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { sections })
    }

    /// Filter one sample.
    #[inline]
    pub fn run(&mut self, x: f64) -> f64 {
        self.sections.iter_mut().fold(x, |acc, section| section.run(acc))
    }

    /// Filter `input` into `out`, replacing its contents.
    pub fn process_into(&mut self, input: &[f64], out: &mut Vec<f64>) {
        out.clear();
        out.extend(input.iter().map(|&x| self.run(x)));
    }

    /// Drive the filter with a constant until it settles at `value`.
    ///
    /// Used before the first block so the start-up step response does not
    /// ring through the first analysis window.
    pub fn settle(&mut self, value: f64, samples: usize) {
        for _ in 0..samples {
            self.run(value);
        }
    }
}
