use crate::audio::block::{AudioBlock, BlockFramer};
use crate::error::{Result, TrillcastError};
use crossbeam_channel::{Receiver, Sender, bounded};
use std::thread::{self, JoinHandle};
use tracing::debug;

/// Event delivered to a pipeline by its block source.
#[derive(Debug)]
pub enum SourceEvent {
    /// A framed block, possibly carrying an advisory status flag.
    Block(AudioBlock),
    /// The source hit an unrecoverable error and will deliver nothing more.
    Failed(String),
}

/// Trait for block-delivering audio sources.
///
/// A source is configured with a sample rate and channel count. Each pipeline
/// calls [`BlockSource::subscribe`] with its own block size before `start()`
/// and receives framed blocks on a bounded channel. The channel disconnects
/// when the source stops or runs out of audio.
pub trait BlockSource: Send {
    /// Sample rate of delivered blocks in Hz.
    fn sample_rate(&self) -> u32;

    /// Interleaved channel count of delivered blocks.
    fn channels(&self) -> u16;

    /// Register a consumer that wants blocks of `block_size` frames.
    fn subscribe(&mut self, block_size: usize) -> Receiver<SourceEvent>;

    /// Start delivering blocks.
    fn start(&mut self) -> Result<()>;

    /// Stop delivering blocks and release the underlying resource.
    fn stop(&mut self) -> Result<()>;

    /// True for sources that end on their own (files, fixtures).
    fn is_finite(&self) -> bool {
        false
    }
}

/// One subscriber: a framer plus the channel its blocks are queued on.
pub(crate) struct Tap {
    framer: BlockFramer,
    tx: Sender<SourceEvent>,
}

impl Tap {
    pub(crate) fn new(
        block_size: usize,
        channels: u16,
        capacity: usize,
    ) -> (Self, Receiver<SourceEvent>) {
        let (tx, rx) = bounded(capacity);
        (
            Self {
                framer: BlockFramer::new(block_size, channels),
                tx,
            },
            rx,
        )
    }

    /// Frame and queue samples without ever blocking. Used on the audio thread.
    pub(crate) fn push_nonblocking(&mut self, samples: &[f32]) {
        let tx = &self.tx;
        self.framer
            .push(samples, |block| tx.try_send(SourceEvent::Block(block)).is_ok());
    }

    /// Frame and queue samples, waiting for the consumer. Used by finite sources.
    pub(crate) fn push_blocking(&mut self, samples: &[f32]) {
        let tx = &self.tx;
        self.framer
            .push(samples, |block| tx.send(SourceEvent::Block(block)).is_ok());
    }

    /// Deliver the trailing partial block, if any.
    pub(crate) fn finish(&mut self) {
        if let Some(block) = self.framer.flush()
            && self.tx.send(SourceEvent::Block(block)).is_err()
        {
            debug!("tail block dropped, consumer already gone");
        }
    }

    /// Report a fatal source error to the consumer.
    pub(crate) fn fail(&self, message: &str) {
        if self
            .tx
            .try_send(SourceEvent::Failed(message.to_string()))
            .is_err()
        {
            debug!("failure report dropped: {}", message);
        }
    }
}

/// Feed a finite sample buffer through the taps on a background thread.
///
/// Samples are pushed in `period`-frame slices to mimic driver callbacks. When
/// the buffer is exhausted each tap either flushes its tail or, if `failure`
/// is set, reports it. The taps (and therefore the channels) are dropped on exit.
pub(crate) fn spawn_feeder(
    mut taps: Vec<Tap>,
    samples: Vec<f32>,
    channels: u16,
    period: usize,
    failure: Option<String>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        let slice_len = period.max(1) * channels.max(1) as usize;
        for slice in samples.chunks(slice_len) {
            for tap in taps.iter_mut() {
                tap.push_blocking(slice);
            }
        }
        for tap in taps.iter_mut() {
            match failure {
                Some(ref message) => tap.fail(message),
                None => tap.finish(),
            }
        }
    })
}

/// Mock block source for testing
pub struct MockBlockSource {
    sample_rate: u32,
    channels: u16,
    samples: Vec<f32>,
    period: usize,
    should_fail_start: bool,
    fail_after_feed: Option<String>,
    is_started: bool,
    taps: Vec<Tap>,
    feeder: Option<JoinHandle<()>>,
}

impl MockBlockSource {
    /// Create a mock that replays `samples` (interleaved) once.
    pub fn new(sample_rate: u32, channels: u16, samples: Vec<f32>) -> Self {
        Self {
            sample_rate,
            channels,
            samples,
            period: 256,
            should_fail_start: false,
            fail_after_feed: None,
            is_started: false,
            taps: Vec::new(),
            feeder: None,
        }
    }

    /// Set the callback period (frames per simulated driver callback).
    pub fn with_period(mut self, period: usize) -> Self {
        self.period = period;
        self
    }

    /// Configure the mock to fail on start
    pub fn with_start_failure(mut self) -> Self {
        self.should_fail_start = true;
        self
    }

    /// Report a fatal stream error after all samples have been delivered.
    pub fn with_stream_failure(mut self, message: &str) -> Self {
        self.fail_after_feed = Some(message.to_string());
        self
    }

    /// Check if the source is started
    pub fn is_started(&self) -> bool {
        self.is_started
    }
}

impl BlockSource for MockBlockSource {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn subscribe(&mut self, block_size: usize) -> Receiver<SourceEvent> {
        let (tap, rx) = Tap::new(block_size, self.channels, 64);
        self.taps.push(tap);
        rx
    }

    fn start(&mut self) -> Result<()> {
        if self.should_fail_start {
            return Err(TrillcastError::AudioCapture {
                message: "mock audio error".to_string(),
            });
        }
        if self.is_started {
            return Ok(());
        }
        self.is_started = true;
        self.feeder = Some(spawn_feeder(
            std::mem::take(&mut self.taps),
            std::mem::take(&mut self.samples),
            self.channels,
            self.period,
            self.fail_after_feed.take(),
        ));
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.is_started = false;
        self.taps.clear();
        if let Some(handle) = self.feeder.take()
            && handle.join().is_err()
        {
            return Err(TrillcastError::AudioCapture {
                message: "mock feeder thread panicked".to_string(),
            });
        }
        Ok(())
    }

    fn is_finite(&self) -> bool {
        true
    }
}
