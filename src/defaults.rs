//! Default configuration constants for trillcast.
//!
//! Shared by the configuration types and the detectors so the TOML defaults,
//! the CLI and the tests all agree on one set of values.

/// Default audio sample rate in Hz.
pub const SAMPLE_RATE: u32 = 44100;

/// Default capture channel count.
pub const CHANNELS: u16 = 1;

/// Pitch analysis block size in frames (about 11.6 ms at 44.1 kHz).
pub const PITCH_BLOCK_SIZE: usize = 512;

/// Reference frequency for semitone conversion (A4).
pub const REFERENCE_HZ: f64 = 440.0;

/// Lowest accepted pitch (G2).
pub const PITCH_MIN_HZ: f64 = 98.0;

/// Highest accepted pitch (G6).
pub const PITCH_MAX_HZ: f64 = 1568.0;

/// Blocks with an RMS amplitude below this are treated as silence.
pub const SILENCE_RMS: f64 = 0.001;

/// Number of accepted semitone values kept for smoothing.
pub const HISTORY_LEN: usize = 10;

/// Maximum distance from the history mean, in semitones, before a value is
/// treated as a glitch.
pub const MAX_DEVIATION: f64 = 6.0;

/// Minimum NSDF clarity for the McLeod estimator to report a pitch.
pub const CLARITY_THRESHOLD: f64 = 0.6;

/// Trill analysis block duration in seconds.
pub const TRILL_BLOCK_SECS: f64 = 0.4;

/// Trill analysis block size in frames at the default sample rate.
pub const TRILL_BLOCK_SIZE: usize = 17640;

/// Envelope smoothing low-pass cutoff in Hz.
pub const ENVELOPE_CUTOFF_HZ: f64 = 30.0;

/// Envelope smoothing Butterworth order (must be even).
pub const ENVELOPE_FILTER_ORDER: usize = 4;

/// Minimum mean envelope for a block to be considered for trill detection.
pub const TRILL_AMPLITUDE_THRESHOLD: f64 = 0.02;

/// Lower bound of the trill-rate band in Hz.
pub const TRILL_FREQ_LOW: f64 = 15.0;

/// Upper bound of the trill-rate band in Hz.
pub const TRILL_FREQ_HIGH: f64 = 32.0;

/// Maximum standard deviation of inter-peak intervals (seconds) for a block to
/// count as periodic.
pub const PERIODICITY_THRESHOLD: f64 = 0.015;

/// Destination host for emitted datagrams.
pub const EMIT_HOST: &str = "127.0.0.1";

/// Destination port for pitch datagrams.
pub const PITCH_PORT: u16 = 5005;

/// Destination port for trill datagrams.
pub const TRILL_PORT: u16 = 5007;

/// Number of framed blocks that may wait between the capture callback and the
/// driver before new blocks are dropped as overruns.
pub const BLOCK_QUEUE_LEN: usize = 32;

/// Trill block size in frames for a given sample rate.
pub fn trill_block_size(sample_rate: u32) -> usize {
    (sample_rate as f64 * TRILL_BLOCK_SECS).round() as usize
}
