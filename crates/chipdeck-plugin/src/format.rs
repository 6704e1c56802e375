//! Audio sample format description and whole-frame math.
//!
//! Everything an adapter hands to the host is interleaved `f32` samples; the
//! only per-stream variation is channel count and sample rate. A *frame* is
//! one sample per channel at a single instant, so a stereo frame occupies two
//! `f32` slots. Read paths only ever produce whole frames: a destination
//! buffer that cannot hold the final frame completely receives fewer frames,
//! never a torn one.

/// Channel count and sample rate of the samples currently being produced.
///
/// Reported per [`read`](crate::PlaybackPlugin::read) call because the format
/// may legitimately differ between two `open`s on the same handle; it never
/// changes mid-stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AudioFormat {
    /// Number of interleaved output channels (1 = mono, 2 = stereo).
    pub channels: u16,
    /// Sample rate in Hz.
    pub rate: u32,
}

impl AudioFormat {
    /// Create a format from channel count and sample rate.
    pub fn new(channels: u16, rate: u32) -> Self {
        Self { channels, rate }
    }

    /// Bytes one frame occupies at `f32` sample width.
    pub fn bytes_per_frame(&self) -> usize {
        self.channels as usize * std::mem::size_of::<f32>()
    }

    /// Number of whole frames that fit a destination of `dest_len` samples.
    ///
    /// A zero-channel format fits no frames; callers never divide by zero.
    pub fn whole_frames(&self, dest_len: usize) -> usize {
        if self.channels == 0 {
            0
        } else {
            dest_len / self.channels as usize
        }
    }

    /// Convert a millisecond offset to a frame count (floored).
    pub fn ms_to_frames(&self, ms: u64) -> u64 {
        ms * self.rate as u64 / 1000
    }

    /// Convert a frame count to milliseconds (floored).
    pub fn frames_to_ms(&self, frames: u64) -> u64 {
        if self.rate == 0 {
            0
        } else {
            frames * 1000 / self.rate as u64
        }
    }
}

/// Outcome classification for one `read` call.
///
/// End-of-stream is deliberately not an error: `Finished` travels on the same
/// channel as successful reads, distinct from `Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStatus {
    /// Frames were produced, or the destination could not hold a single
    /// whole frame (zero frames, stream unmoved).
    Ok,
    /// The stream can produce no more frames: end of stream, fade-out
    /// complete, or an exhausted length budget.
    Finished,
    /// The handle has no active decoder (`open` has not succeeded).
    Error,
}

/// What one `read` call produced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReadReply {
    /// Format of the frames written to the destination.
    ///
    /// Meaningless when `status` is [`ReadStatus::Error`].
    pub format: AudioFormat,
    /// Number of whole frames written.
    pub frames: usize,
    /// Outcome of the call.
    pub status: ReadStatus,
}

impl ReadReply {
    /// Successful read of `frames` whole frames.
    pub fn ok(format: AudioFormat, frames: usize) -> Self {
        Self {
            format,
            frames,
            status: ReadStatus::Ok,
        }
    }

    /// End of stream: zero frames, `Finished` status.
    pub fn finished(format: AudioFormat) -> Self {
        Self {
            format,
            frames: 0,
            status: ReadStatus::Finished,
        }
    }

    /// No active decoder on the handle.
    pub fn error() -> Self {
        Self {
            format: AudioFormat::default(),
            frames: 0,
            status: ReadStatus::Error,
        }
    }

    /// Total `f32` samples written (`frames × channels`).
    pub fn samples(&self) -> usize {
        self.frames * self.format.channels as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whole_frames_boundary() {
        let stereo = AudioFormat::new(2, 44_100);
        assert_eq!(stereo.whole_frames(0), 0);
        assert_eq!(stereo.whole_frames(1), 0);
        assert_eq!(stereo.whole_frames(2), 1);
        assert_eq!(stereo.whole_frames(1023), 511);
        assert_eq!(stereo.whole_frames(1024), 512);
    }

    #[test]
    fn test_whole_frames_zero_channels() {
        let none = AudioFormat::default();
        assert_eq!(none.whole_frames(4096), 0);
    }

    #[test]
    fn test_ms_frame_conversion() {
        let f = AudioFormat::new(2, 44_100);
        assert_eq!(f.ms_to_frames(1000), 44_100);
        assert_eq!(f.frames_to_ms(44_100), 1000);
        assert_eq!(f.ms_to_frames(0), 0);
        // Floored, never rounded up.
        assert_eq!(f.frames_to_ms(44), 0);
    }

    #[test]
    fn test_bytes_per_frame() {
        assert_eq!(AudioFormat::new(1, 44_100).bytes_per_frame(), 4);
        assert_eq!(AudioFormat::new(2, 44_100).bytes_per_frame(), 8);
    }

    #[test]
    fn test_reply_samples() {
        let reply = ReadReply::ok(AudioFormat::new(2, 48_000), 100);
        assert_eq!(reply.samples(), 200);
        assert_eq!(reply.status, ReadStatus::Ok);

        let done = ReadReply::finished(AudioFormat::new(2, 48_000));
        assert_eq!(done.frames, 0);
        assert_eq!(done.status, ReadStatus::Finished);

        assert_eq!(ReadReply::error().status, ReadStatus::Error);
    }
}
