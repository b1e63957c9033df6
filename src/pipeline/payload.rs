//! Datagram payload encoding.
//!
//! Pitch values travel as signed decimals with two fractional digits
//! (`"-3.42"`); trill verdicts as a single `"1"` or `"0"`.

use crate::detect::Signal;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PayloadError {
    #[error("invalid pitch payload: {0:?}")]
    InvalidPitch(String),

    #[error("invalid trill payload: {0:?}")]
    InvalidTrill(String),
}

/// Format a semitone value with two decimals.
///
/// Returns `None` for non-finite values, which must never be sent. Values that
/// round to zero are written as `"0.00"`, never `"-0.00"`.
pub fn encode_pitch(value: f64) -> Option<String> {
    if !value.is_finite() {
        return None;
    }
    let rounded = (value * 100.0).round() / 100.0;
    let rounded = if rounded == 0.0 { 0.0 } else { rounded };
    Some(format!("{:.2}", rounded))
}

pub fn encode_trill(trilling: bool) -> &'static str {
    if trilling { "1" } else { "0" }
}

/// Payload for any detector signal.
pub fn encode(signal: Signal) -> Option<String> {
    match signal {
        Signal::Pitch(value) => encode_pitch(value),
        Signal::Trill(trilling) => Some(encode_trill(trilling).to_string()),
    }
}

pub fn decode_pitch(payload: &str) -> Result<f64, PayloadError> {
    payload
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| PayloadError::InvalidPitch(payload.to_string()))
}

pub fn decode_trill(payload: &str) -> Result<bool, PayloadError> {
    match payload.trim() {
        "1" => Ok(true),
        "0" => Ok(false),
        _ => Err(PayloadError::InvalidTrill(payload.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pitch_has_two_decimals() {
        assert_eq!(encode_pitch(-3.4213).as_deref(), Some("-3.42"));
        assert_eq!(encode_pitch(12.0).as_deref(), Some("12.00"));
        assert_eq!(encode_pitch(0.456).as_deref(), Some("0.46"));
    }

    #[test]
    fn test_near_zero_never_prints_negative_zero() {
        assert_eq!(encode_pitch(-0.0002).as_deref(), Some("0.00"));
        assert_eq!(encode_pitch(-0.0).as_deref(), Some("0.00"));
        assert_eq!(encode_pitch(0.004).as_deref(), Some("0.00"));
    }

    #[test]
    fn test_non_finite_pitch_is_not_encoded() {
        assert_eq!(encode_pitch(f64::NAN), None);
        assert_eq!(encode_pitch(f64::NEG_INFINITY), None);
        assert_eq!(encode(Signal::Pitch(f64::INFINITY)), None);
    }

    #[test]
    fn test_trill_is_single_character() {
        assert_eq!(encode(Signal::Trill(true)).as_deref(), Some("1"));
        assert_eq!(encode(Signal::Trill(false)).as_deref(), Some("0"));
    }

    #[test]
    fn test_pitch_survives_round_trip_at_two_decimals() {
        for value in [-24.337, -3.4213, 0.0, 0.005, 7.499, 19.02] {
            let payload = encode_pitch(value).unwrap();
            let decoded = decode_pitch(&payload).unwrap();
            assert!((decoded - value).abs() <= 0.005 + 1e-12, "{} -> {}", value, payload);
            assert_eq!(encode_pitch(decoded).unwrap(), payload);
        }
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(decode_pitch("abc"), Err(PayloadError::InvalidPitch(_))));
        assert!(decode_pitch("NaN").is_err());
        assert_eq!(decode_trill("1"), Ok(true));
        assert_eq!(decode_trill("0"), Ok(false));
        assert!(matches!(decode_trill("yes"), Err(PayloadError::InvalidTrill(_))));
    }
}
