//! WAV file block source for offline analysis.

use crate::audio::source::{BlockSource, SourceEvent, Tap, spawn_feeder};
use crate::error::{Result, TrillcastError};
use crossbeam_channel::Receiver;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::thread::JoinHandle;

/// Frames pushed per simulated driver callback.
const FEED_PERIOD: usize = 1024;

/// Block source that replays a decoded WAV file.
///
/// Samples are kept at the file's own sample rate and channel layout; integer
/// formats are scaled to [-1, 1).
pub struct WavBlockSource {
    samples: Vec<f32>,
    sample_rate: u32,
    channels: u16,
    taps: Vec<Tap>,
    feeder: Option<JoinHandle<()>>,
}

impl WavBlockSource {
    /// Create from any reader (for testing/flexibility).
    pub fn from_reader(reader: Box<dyn Read + Send>) -> Result<Self> {
        let wav_reader =
            hound::WavReader::new(reader).map_err(|e| TrillcastError::AudioCapture {
                message: format!("Failed to parse WAV file: {}", e),
            })?;

        let spec = wav_reader.spec();
        let samples = decode_samples(wav_reader, spec)?;

        Ok(Self {
            samples,
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            taps: Vec::new(),
            feeder: None,
        })
    }

    /// Open a WAV file from disk.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| TrillcastError::AudioCapture {
            message: format!("Failed to open {}: {}", path.display(), e),
        })?;
        Self::from_reader(Box::new(BufReader::new(file)))
    }

    /// Create from stdin.
    pub fn from_stdin() -> Result<Self> {
        use std::io::Cursor;

        // StdinLock is not Send, so buffer everything first
        let mut buffer = Vec::new();
        std::io::stdin()
            .lock()
            .read_to_end(&mut buffer)
            .map_err(|e| TrillcastError::AudioCapture {
                message: format!("Failed to read from stdin: {}", e),
            })?;

        Self::from_reader(Box::new(Cursor::new(buffer)))
    }

    /// Duration of the decoded audio in seconds.
    pub fn duration_secs(&self) -> f64 {
        let frames = self.samples.len() / self.channels.max(1) as usize;
        frames as f64 / self.sample_rate as f64
    }

    /// Fail unless the file was recorded at `expected` Hz.
    pub fn require_sample_rate(&self, expected: u32) -> Result<()> {
        if self.sample_rate != expected {
            return Err(TrillcastError::AudioFormatMismatch {
                expected: format!("{} Hz", expected),
                actual: format!("{} Hz", self.sample_rate),
            });
        }
        Ok(())
    }
}

fn decode_samples<R: Read>(reader: hound::WavReader<R>, spec: hound::WavSpec) -> Result<Vec<f32>> {
    let read_err = |e: hound::Error| TrillcastError::AudioCapture {
        message: format!("Failed to read WAV samples: {}", e),
    };

    match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(read_err),
        hound::SampleFormat::Int => {
            let scale = (1u64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(read_err)
        }
    }
}

impl BlockSource for WavBlockSource {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn subscribe(&mut self, block_size: usize) -> Receiver<SourceEvent> {
        let (tap, rx) = Tap::new(block_size, self.channels, crate::defaults::BLOCK_QUEUE_LEN);
        self.taps.push(tap);
        rx
    }

    fn start(&mut self) -> Result<()> {
        if self.feeder.is_some() {
            return Ok(());
        }
        self.feeder = Some(spawn_feeder(
            std::mem::take(&mut self.taps),
            std::mem::take(&mut self.samples),
            self.channels,
            FEED_PERIOD,
            None,
        ));
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.taps.clear();
        if let Some(handle) = self.feeder.take()
            && handle.join().is_err()
        {
            return Err(TrillcastError::AudioCapture {
                message: "WAV feeder thread panicked".to_string(),
            });
        }
        Ok(())
    }

    fn is_finite(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn make_wav_data(sample_rate: u32, channels: u16, samples: &[i16]) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for &s in samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
        cursor.into_inner()
    }

    fn make_float_wav_data(sample_rate: u32, samples: &[f32]) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for &s in samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
        cursor.into_inner()
    }

    #[test]
    fn test_from_reader_scales_int_samples() {
        let wav_data = make_wav_data(44100, 1, &[0, 16384, -32768]);
        let source = WavBlockSource::from_reader(Box::new(Cursor::new(wav_data))).unwrap();

        assert_eq!(source.sample_rate(), 44100);
        assert_eq!(source.channels(), 1);
        assert_eq!(source.samples, vec![0.0, 0.5, -1.0]);
    }

    #[test]
    fn test_from_reader_keeps_float_samples() {
        let wav_data = make_float_wav_data(48000, &[0.25, -0.75]);
        let source = WavBlockSource::from_reader(Box::new(Cursor::new(wav_data))).unwrap();

        assert_eq!(source.sample_rate(), 48000);
        assert_eq!(source.samples, vec![0.25, -0.75]);
    }

    #[test]
    fn test_from_reader_preserves_stereo_layout() {
        let wav_data = make_wav_data(44100, 2, &[100, 200, 300, 400]);
        let source = WavBlockSource::from_reader(Box::new(Cursor::new(wav_data))).unwrap();

        assert_eq!(source.channels(), 2);
        assert_eq!(source.samples.len(), 4);
        assert!((source.duration_secs() - 2.0 / 44100.0).abs() < 1e-12);
    }

    #[test]
    fn test_require_sample_rate_rejects_mismatch() {
        let wav_data = make_wav_data(48000, 1, &[0; 10]);
        let source = WavBlockSource::from_reader(Box::new(Cursor::new(wav_data))).unwrap();

        assert!(source.require_sample_rate(48000).is_ok());
        match source.require_sample_rate(44100) {
            Err(TrillcastError::AudioFormatMismatch { expected, actual }) => {
                assert_eq!(expected, "44100 Hz");
                assert_eq!(actual, "48000 Hz");
            }
            other => panic!("Expected AudioFormatMismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_delivers_blocks_then_disconnects() {
        let wav_data = make_wav_data(44100, 1, &vec![1000i16; 2500]);
        let mut source = WavBlockSource::from_reader(Box::new(Cursor::new(wav_data))).unwrap();
        let rx = source.subscribe(1000);
        source.start().unwrap();

        let blocks: Vec<_> = rx
            .iter()
            .filter_map(|event| match event {
                SourceEvent::Block(block) => Some(block),
                SourceEvent::Failed(_) => None,
            })
            .collect();
        source.stop().unwrap();

        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0].frames(), 1000);
        assert!(!blocks[1].status.input_underflow);
        assert_eq!(blocks[2].frames(), 500);
        assert!(blocks[2].status.input_underflow);
    }

    #[test]
    fn test_start_stop_are_idempotent() {
        let wav_data = make_wav_data(44100, 1, &[1; 100]);
        let mut source = WavBlockSource::from_reader(Box::new(Cursor::new(wav_data))).unwrap();

        assert!(source.start().is_ok());
        assert!(source.start().is_ok());
        assert!(source.stop().is_ok());
        assert!(source.stop().is_ok());
    }

    #[test]
    fn test_invalid_wav_data_returns_error() {
        let invalid_data = vec![0u8, 1, 2, 3, 4, 5];

        let result = WavBlockSource::from_reader(Box::new(Cursor::new(invalid_data)));

        match result {
            Err(TrillcastError::AudioCapture { message }) => {
                assert!(message.contains("Failed to parse WAV file"));
            }
            _ => panic!("Expected AudioCapture error"),
        }
    }

    #[test]
    fn test_empty_wav_data_returns_error() {
        let result = WavBlockSource::from_reader(Box::new(Cursor::new(Vec::new())));
        assert!(result.is_err());
    }

    #[test]
    fn test_open_missing_file_returns_error() {
        let result = WavBlockSource::open(Path::new("/nonexistent/take.wav"));
        assert!(matches!(result, Err(TrillcastError::AudioCapture { .. })));
    }
}
