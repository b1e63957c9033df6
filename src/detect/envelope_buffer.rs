//! Fixed-length sliding window over the smoothed envelope.

/// Ring buffer holding the most recent `capacity` envelope samples.
///
/// Appending `k` samples overwrites the oldest `k`; nothing is shifted. Starts
/// out zero-filled, matching a window that has seen only silence.
#[derive(Debug, Clone)]
pub struct EnvelopeBuffer {
    data: Vec<f64>,
    cursor: usize,
}

impl EnvelopeBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![0.0; capacity],
            cursor: 0,
        }
    }

    /// Slide the window forward by `samples.len()`.
    ///
    /// When more samples than the capacity arrive only the newest are kept.
    pub fn push_slice(&mut self, samples: &[f64]) {
        let capacity = self.data.len();
        if capacity == 0 {
            return;
        }
        let samples = &samples[samples.len().saturating_sub(capacity)..];

        let first = samples.len().min(capacity - self.cursor);
        self.data[self.cursor..self.cursor + first].copy_from_slice(&samples[..first]);
        let rest = &samples[first..];
        self.data[..rest.len()].copy_from_slice(rest);

        self.cursor = (self.cursor + samples.len()) % capacity;
    }

    /// Copy the window, oldest sample first, into `out`.
    pub fn copy_ordered_into(&self, out: &mut Vec<f64>) {
        out.clear();
        out.extend_from_slice(&self.data[self.cursor..]);
        out.extend_from_slice(&self.data[..self.cursor]);
    }

    /// Owned copy of the window, oldest sample first.
    pub fn to_vec(&self) -> Vec<f64> {
        let mut out = Vec::with_capacity(self.data.len());
        self.copy_ordered_into(&mut out);
        out
    }
}
