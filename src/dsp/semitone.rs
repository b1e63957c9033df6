//! Frequency to semitone conversion.

/// Semitone offset of `freq_hz` from `reference_hz`: `12 * log2(f / f_ref)`.
///
/// Returns `None` for non-positive or non-finite input, where the logarithm is
/// undefined.
pub fn semitone(freq_hz: f64, reference_hz: f64) -> Option<f64> {
    if !(freq_hz > 0.0 && freq_hz.is_finite() && reference_hz > 0.0) {
        return None;
    }
    let value = 12.0 * (freq_hz / reference_hz).log2();
    value.is_finite().then_some(value)
}

/// Inverse of [`semitone`].
pub fn frequency(semitones: f64, reference_hz: f64) -> f64 {
    reference_hz * 2f64.powf(semitones / 12.0)
}
