//! Fixed-size audio blocks and the framer that cuts a raw sample stream into them.

use std::time::Instant;

/// Advisory status reported alongside a block. Never fatal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStatus {
    /// One or more blocks before this one were dropped because the consumer fell behind.
    pub input_overflow: bool,
    /// The source ran dry before the block could be filled.
    pub input_underflow: bool,
}

/// A block of interleaved samples as delivered by a block source.
#[derive(Debug, Clone)]
pub struct AudioBlock {
    /// Interleaved samples, `frames * channels` long.
    pub samples: Vec<f32>,
    /// Number of interleaved channels.
    pub channels: u16,
    /// Status reported by the source for this delivery.
    pub status: StreamStatus,
    /// Sequence number for ordering and gap detection.
    pub sequence: u64,
    /// Timestamp when the block was completed.
    pub timestamp: Instant,
}

impl AudioBlock {
    /// Creates a block from interleaved samples.
    pub fn new(samples: Vec<f32>, channels: u16, sequence: u64) -> Self {
        Self {
            samples,
            channels: channels.max(1),
            status: StreamStatus::default(),
            sequence,
            timestamp: Instant::now(),
        }
    }

    /// Creates a single-channel block.
    pub fn mono(samples: Vec<f32>, sequence: u64) -> Self {
        Self::new(samples, 1, sequence)
    }

    /// Attaches a status flag.
    pub fn with_status(mut self, status: StreamStatus) -> Self {
        self.status = status;
        self
    }

    /// Number of frames (samples per channel).
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    /// Writes the channel average of each frame into `out`, replacing its contents.
    pub fn downmix_into(&self, out: &mut Vec<f64>) {
        out.clear();
        let channels = self.channels as usize;
        if channels == 1 {
            out.extend(self.samples.iter().map(|&s| s as f64));
        } else {
            out.extend(
                self.samples
                    .chunks_exact(channels)
                    .map(|frame| frame.iter().map(|&s| s as f64).sum::<f64>() / channels as f64),
            );
        }
    }

    /// Writes one channel into `out`, replacing its contents.
    ///
    /// Channels past the last one fall back to the last channel.
    pub fn channel_into(&self, channel: usize, out: &mut Vec<f64>) {
        out.clear();
        let channels = self.channels as usize;
        let channel = channel.min(channels - 1);
        out.extend(
            self.samples
                .chunks_exact(channels)
                .map(|frame| frame[channel] as f64),
        );
    }
}

/// Root mean square of a sample slice. Zero for an empty slice.
pub fn rms(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = samples.iter().map(|s| s * s).sum();
    (sum_sq / samples.len() as f64).sqrt()
}

/// Cuts an arbitrary-length interleaved stream into fixed-size blocks.
///
/// Capture callbacks deliver whatever the driver's period happens to be; the
/// framer accumulates samples until exactly `block_size` frames are available.
#[derive(Debug)]
pub struct BlockFramer {
    block_size: usize,
    channels: u16,
    pending: Vec<f32>,
    sequence: u64,
    dropped_since_last: bool,
}

impl BlockFramer {
    /// Creates a framer producing blocks of `block_size` frames.
    pub fn new(block_size: usize, channels: u16) -> Self {
        let channels = channels.max(1);
        Self {
            block_size,
            channels,
            pending: Vec::with_capacity(block_size * channels as usize),
            sequence: 0,
            dropped_since_last: false,
        }
    }

    /// Block size in frames.
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Appends interleaved samples and hands every completed block to `emit`.
    ///
    /// `emit` returns `false` when the block could not be delivered; the next
    /// delivered block then carries `input_overflow`.
    pub fn push<F>(&mut self, samples: &[f32], mut emit: F)
    where
        F: FnMut(AudioBlock) -> bool,
    {
        let block_len = self.block_size * self.channels as usize;
        let mut rest = samples;

        while !rest.is_empty() {
            let wanted = block_len - self.pending.len();
            let take = wanted.min(rest.len());
            self.pending.extend_from_slice(&rest[..take]);
            rest = &rest[take..];

            if self.pending.len() == block_len {
                let samples = std::mem::replace(&mut self.pending, Vec::with_capacity(block_len));
                let block = AudioBlock::new(samples, self.channels, self.sequence).with_status(
                    StreamStatus {
                        input_overflow: self.dropped_since_last,
                        input_underflow: false,
                    },
                );
                self.sequence += 1;
                self.dropped_since_last = !emit(block);
            }
        }
    }

    /// Returns the trailing partial block, if any, flagged as an underflow.
    pub fn flush(&mut self) -> Option<AudioBlock> {
        // Drop any incomplete trailing frame
        let whole = self.pending.len() - self.pending.len() % self.channels as usize;
        if whole == 0 {
            self.pending.clear();
            return None;
        }
        self.pending.truncate(whole);
        let samples = std::mem::take(&mut self.pending);
        let block = AudioBlock::new(samples, self.channels, self.sequence).with_status(
            StreamStatus {
                input_overflow: self.dropped_since_last,
                input_underflow: true,
            },
        );
        self.sequence += 1;
        self.dropped_since_last = false;
        Some(block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frames_counts_per_channel() {
        let block = AudioBlock::new(vec![0.0; 1024], 2, 0);
        assert_eq!(block.frames(), 512);
    }

    #[test]
    fn test_downmix_averages_channels() {
        let block = AudioBlock::new(vec![1.0, 0.0, 0.5, 0.5, -1.0, 1.0], 2, 0);
        let mut mono = Vec::new();
        block.downmix_into(&mut mono);
        assert_eq!(mono, vec![0.5, 0.5, 0.0]);
    }

    #[test]
    fn test_channel_into_selects_first_channel() {
        let block = AudioBlock::new(vec![1.0, 0.0, 0.5, 0.25], 2, 0);
        let mut left = Vec::new();
        block.channel_into(0, &mut left);
        assert_eq!(left, vec![1.0, 0.5]);
    }

    #[test]
    fn test_rms_of_constant_signal() {
        assert!((rms(&[0.5; 100]) - 0.5).abs() < 1e-12);
        assert_eq!(rms(&[]), 0.0);
        assert_eq!(rms(&[0.0; 16]), 0.0);
    }

    #[test]
    fn test_framer_emits_fixed_size_blocks() {
        let mut framer = BlockFramer::new(4, 1);
        let mut blocks = Vec::new();

        framer.push(&[0.0; 3], |b| {
            blocks.push(b);
            true
        });
        assert!(blocks.is_empty());

        framer.push(&[1.0; 6], |b| {
            blocks.push(b);
            true
        });
        assert_eq!(blocks.len(), 2);
        assert!(blocks.iter().all(|b| b.frames() == 4));
        assert_eq!(blocks[0].samples, vec![0.0, 0.0, 0.0, 1.0]);
        assert_eq!(blocks[0].sequence, 0);
        assert_eq!(blocks[1].sequence, 1);
        assert_eq!(blocks[1].status, StreamStatus::default());
    }

    #[test]
    fn test_framer_respects_channel_interleaving() {
        let mut framer = BlockFramer::new(2, 2);
        let mut blocks = Vec::new();
        framer.push(&[0.1, 0.2, 0.3, 0.4, 0.5], |b| {
            blocks.push(b);
            true
        });
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].samples.len(), 4);
        assert_eq!(blocks[0].frames(), 2);
    }

    #[test]
    fn test_framer_flags_overflow_after_dropped_block() {
        let mut framer = BlockFramer::new(2, 1);
        let mut delivered = Vec::new();
        let mut accept = false;

        framer.push(&[0.0; 6], |b| {
            let ok = accept;
            if ok {
                delivered.push(b);
            }
            accept = true;
            ok
        });

        assert_eq!(delivered.len(), 2);
        assert!(delivered[0].status.input_overflow);
        assert!(!delivered[1].status.input_overflow);
    }

    #[test]
    fn test_flush_returns_partial_block_with_underflow() {
        let mut framer = BlockFramer::new(4, 1);
        framer.push(&[0.5; 6], |_| true);

        let tail = framer.flush().unwrap();
        assert_eq!(tail.frames(), 2);
        assert!(tail.status.input_underflow);
        assert!(framer.flush().is_none());
    }
}
