use crate::defaults;
use crate::error::{Result, TrillcastError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub audio: AudioConfig,
    pub pitch: PitchConfig,
    pub trill: TrillConfig,
    pub emitter: EmitterConfig,
}

/// Audio capture configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AudioConfig {
    pub device: Option<String>,
    pub sample_rate: u32,
    pub channels: u16,
}

/// Pitch estimation algorithm
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum PitchMethod {
    /// McLeod pitch method (normalized square difference)
    Mpm,
    /// Dominant FFT bin
    SpectralPeak,
}

/// Pitch tracker configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PitchConfig {
    pub block_size: usize,
    pub method: PitchMethod,
    pub reference_hz: f64,
    pub min_hz: f64,
    pub max_hz: f64,
    pub silence_rms: f64,
    pub history_len: usize,
    pub max_deviation: f64,
    pub clarity_threshold: f64,
}

/// Trill detector configuration
///
/// `block_size` and `window_size` are in frames. Left unset, the block spans
/// 0.4 s at the capture rate and the window matches the block.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TrillConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window_size: Option<usize>,
    pub cutoff_hz: f64,
    pub filter_order: usize,
    pub amplitude_threshold: f64,
    pub freq_low: f64,
    pub freq_high: f64,
    pub periodicity_threshold: f64,
}

/// Datagram destination configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmitterConfig {
    pub host: String,
    pub pitch_port: u16,
    pub trill_port: u16,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            device: None,
            sample_rate: defaults::SAMPLE_RATE,
            channels: defaults::CHANNELS,
        }
    }
}

impl Default for PitchConfig {
    fn default() -> Self {
        Self {
            block_size: defaults::PITCH_BLOCK_SIZE,
            method: PitchMethod::Mpm,
            reference_hz: defaults::REFERENCE_HZ,
            min_hz: defaults::PITCH_MIN_HZ,
            max_hz: defaults::PITCH_MAX_HZ,
            silence_rms: defaults::SILENCE_RMS,
            history_len: defaults::HISTORY_LEN,
            max_deviation: defaults::MAX_DEVIATION,
            clarity_threshold: defaults::CLARITY_THRESHOLD,
        }
    }
}

impl Default for TrillConfig {
    fn default() -> Self {
        Self {
            block_size: None,
            window_size: None,
            cutoff_hz: defaults::ENVELOPE_CUTOFF_HZ,
            filter_order: defaults::ENVELOPE_FILTER_ORDER,
            amplitude_threshold: defaults::TRILL_AMPLITUDE_THRESHOLD,
            freq_low: defaults::TRILL_FREQ_LOW,
            freq_high: defaults::TRILL_FREQ_HIGH,
            periodicity_threshold: defaults::PERIODICITY_THRESHOLD,
        }
    }
}

impl TrillConfig {
    /// Block size in frames at `sample_rate`.
    pub fn block_frames(&self, sample_rate: u32) -> usize {
        self.block_size
            .unwrap_or_else(|| defaults::trill_block_size(sample_rate))
    }

    /// Envelope window size in frames at `sample_rate`.
    pub fn window_frames(&self, sample_rate: u32) -> usize {
        self.window_size
            .unwrap_or_else(|| self.block_frames(sample_rate))
    }
}

impl Default for EmitterConfig {
    fn default() -> Self {
        Self {
            host: defaults::EMIT_HOST.to_string(),
            pitch_port: defaults::PITCH_PORT,
            trill_port: defaults::TRILL_PORT,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Missing fields use default values. The result is validated.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                TrillcastError::ConfigFileNotFound {
                    path: path.display().to_string(),
                }
            } else {
                TrillcastError::Io(e)
            }
        })?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if the file doesn't exist
    ///
    /// Only a missing file falls back to defaults; malformed TOML is an error.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(TrillcastError::ConfigFileNotFound { .. }) => Ok(Self::default()),
            Err(e) => Err(e),
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - TRILLCAST_AUDIO_DEVICE → audio.device
    /// - TRILLCAST_HOST → emitter.host
    /// - TRILLCAST_PITCH_PORT → emitter.pitch_port
    /// - TRILLCAST_TRILL_PORT → emitter.trill_port
    ///
    /// Unparseable port values are ignored.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(device) = std::env::var("TRILLCAST_AUDIO_DEVICE")
            && !device.is_empty()
        {
            self.audio.device = Some(device);
        }

        if let Ok(host) = std::env::var("TRILLCAST_HOST")
            && !host.is_empty()
        {
            self.emitter.host = host;
        }

        if let Ok(port) = std::env::var("TRILLCAST_PITCH_PORT")
            && let Ok(port) = port.parse()
        {
            self.emitter.pitch_port = port;
        }

        if let Ok(port) = std::env::var("TRILLCAST_TRILL_PORT")
            && let Ok(port) = port.parse()
        {
            self.emitter.trill_port = port;
        }

        self
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/trillcast/config.toml on Linux
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("trillcast")
            .join("config.toml")
    }

    /// Serialize the effective configuration as TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| TrillcastError::ConfigParse {
            message: e.to_string(),
        })
    }

    /// Check cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        fn invalid(key: &str, message: &str) -> TrillcastError {
            TrillcastError::ConfigInvalidValue {
                key: key.to_string(),
                message: message.to_string(),
            }
        }

        let nyquist = self.audio.sample_rate as f64 / 2.0;

        if self.audio.sample_rate == 0 {
            return Err(invalid("audio.sample_rate", "must be positive"));
        }
        if self.audio.channels == 0 {
            return Err(invalid("audio.channels", "must be positive"));
        }

        let pitch = &self.pitch;
        if pitch.block_size < 4 {
            return Err(invalid("pitch.block_size", "must be at least 4 frames"));
        }
        if pitch.reference_hz <= 0.0 {
            return Err(invalid("pitch.reference_hz", "must be positive"));
        }
        if pitch.min_hz <= 0.0 || pitch.min_hz >= pitch.max_hz {
            return Err(invalid("pitch.min_hz", "must be positive and below pitch.max_hz"));
        }
        if pitch.max_hz >= nyquist {
            return Err(invalid("pitch.max_hz", "must be below the Nyquist frequency"));
        }
        if pitch.history_len == 0 {
            return Err(invalid("pitch.history_len", "must be positive"));
        }
        if pitch.max_deviation < 0.0 {
            return Err(invalid("pitch.max_deviation", "must not be negative"));
        }
        if !(0.0..=1.0).contains(&pitch.clarity_threshold) {
            return Err(invalid("pitch.clarity_threshold", "must be within 0.0..=1.0"));
        }

        let trill = &self.trill;
        let block_frames = trill.block_frames(self.audio.sample_rate);
        if block_frames < 3 {
            return Err(invalid("trill.block_size", "must be at least 3 frames"));
        }
        if trill.window_frames(self.audio.sample_rate) < block_frames {
            return Err(invalid(
                "trill.window_size",
                "must be at least trill.block_size",
            ));
        }
        if trill.filter_order == 0 || trill.filter_order % 2 != 0 {
            return Err(invalid("trill.filter_order", "must be a positive even number"));
        }
        if trill.cutoff_hz <= 0.0 || trill.cutoff_hz >= nyquist {
            return Err(invalid(
                "trill.cutoff_hz",
                "must be positive and below the Nyquist frequency",
            ));
        }
        if trill.freq_low <= 0.0 || trill.freq_low >= trill.freq_high {
            return Err(invalid(
                "trill.freq_low",
                "must be positive and below trill.freq_high",
            ));
        }
        if trill.periodicity_threshold <= 0.0 {
            return Err(invalid("trill.periodicity_threshold", "must be positive"));
        }

        if self.emitter.host.is_empty() {
            return Err(invalid("emitter.host", "must not be empty"));
        }

        Ok(())
    }
}
