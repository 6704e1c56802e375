//! Per-channel waveform rings backing the scope and telemetry hooks.

use std::collections::VecDeque;

/// Samples retained per channel when no capacity is given.
pub const DEFAULT_CAPACITY: usize = 2048;

/// Rolling window of recent output samples, one ring per channel.
///
/// Adapters push every decoded buffer through
/// [`push_frames`](ScopeBuffer::push_frames); the host pulls snapshots at its
/// own pace, so the rings simply overwrite the oldest samples when full.
#[derive(Debug, Clone)]
pub struct ScopeBuffer {
    channels: Vec<VecDeque<f32>>,
    capacity: usize,
}

impl ScopeBuffer {
    /// Ring of [`DEFAULT_CAPACITY`] samples per channel.
    pub fn new(channels: usize) -> Self {
        Self::with_capacity(channels, DEFAULT_CAPACITY)
    }

    /// Ring of `capacity` samples per channel.
    pub fn with_capacity(channels: usize, capacity: usize) -> Self {
        Self {
            channels: (0..channels)
                .map(|_| VecDeque::with_capacity(capacity))
                .collect(),
            capacity,
        }
    }

    /// Number of channels.
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Append interleaved samples, dropping the oldest on overflow.
    ///
    /// Trailing partial frames are ignored.
    pub fn push_frames(&mut self, interleaved: &[f32], channels: usize) {
        if channels == 0 || self.channels.len() < channels {
            return;
        }
        for frame in interleaved.chunks_exact(channels) {
            for (ch, &sample) in frame.iter().enumerate() {
                let ring = &mut self.channels[ch];
                if ring.len() == self.capacity {
                    ring.pop_front();
                }
                ring.push_back(sample);
            }
        }
    }

    /// Copy the most recent samples of `channel` into `dest`, oldest first.
    ///
    /// Returns the number of samples written; 0 for an out-of-range channel.
    pub fn snapshot(&self, channel: usize, dest: &mut [f32]) -> usize {
        let Some(ring) = self.channels.get(channel) else {
            return 0;
        };
        let count = ring.len().min(dest.len());
        let skip = ring.len() - count;
        for (slot, &sample) in dest.iter_mut().zip(ring.iter().skip(skip)) {
            *slot = sample;
        }
        count
    }

    /// Peak absolute level of `channel` over the retained window.
    pub fn vu(&self, channel: usize) -> f32 {
        self.channels
            .get(channel)
            .map(|ring| ring.iter().fold(0.0f32, |peak, &s| peak.max(s.abs())))
            .unwrap_or(0.0)
    }

    /// Drop all retained samples, keeping the channel layout.
    pub fn clear(&mut self) {
        for ring in &mut self.channels {
            ring.clear();
        }
    }
}
