//! Native FLAC reading via `claxon`.
//!
//! `claxon` exposes no seek of its own, so seeking rebuilds the reader over
//! the shared byte buffer and decodes forward to the target frame.

use std::io::Cursor;

use chipdeck_plugin::{AudioFormat, PluginError, Result};

use super::{SharedBytes, StreamDecoder};

pub(crate) struct FlacDecoder {
    bytes: SharedBytes,
    reader: claxon::FlacReader<Cursor<SharedBytes>>,
    spec: AudioFormat,
    scale: f32,
    total: Option<u64>,
    position: u64,
    pending: Vec<f32>,
    pending_pos: usize,
    scratch: Vec<i32>,
}

impl FlacDecoder {
    pub(crate) fn open(bytes: SharedBytes) -> Result<Self> {
        let reader = new_reader(&bytes)?;
        let info = reader.streaminfo();
        if info.channels == 0 {
            return Err(PluginError::parse("FLAC", "zero channels"));
        }
        let bits = info.bits_per_sample.clamp(1, 32);
        Ok(Self {
            bytes,
            spec: AudioFormat::new(info.channels as u16, info.sample_rate),
            scale: 1.0 / (1i64 << (bits - 1)) as f32,
            total: info.samples,
            position: 0,
            pending: Vec::new(),
            pending_pos: 0,
            scratch: Vec::new(),
            reader,
        })
    }

    /// Decode the next block into `pending`, interleaving channels.
    fn refill(&mut self) -> Result<bool> {
        let scratch = std::mem::take(&mut self.scratch);
        let block = self
            .reader
            .blocks()
            .read_next_or_eof(scratch)
            .map_err(|e| PluginError::parse("FLAC", e.to_string()))?;
        let Some(block) = block else {
            return Ok(false);
        };
        let channels = block.channels();
        let duration = block.duration() as usize;
        self.pending.clear();
        self.pending.reserve(duration * channels as usize);
        for i in 0..duration as u32 {
            for ch in 0..channels {
                self.pending.push(block.sample(ch, i) as f32 * self.scale);
            }
        }
        self.pending_pos = 0;
        self.scratch = block.into_buffer();
        Ok(true)
    }
}

fn new_reader(bytes: &SharedBytes) -> Result<claxon::FlacReader<Cursor<SharedBytes>>> {
    claxon::FlacReader::new(bytes.cursor()).map_err(|e| PluginError::parse("FLAC", e.to_string()))
}

impl StreamDecoder for FlacDecoder {
    fn spec(&self) -> AudioFormat {
        self.spec
    }

    fn total_frames(&self) -> Option<u64> {
        self.total
    }

    fn read_frames(&mut self, dest: &mut [f32]) -> Result<usize> {
        let channels = self.spec.channels as usize;
        let budget = self.spec.whole_frames(dest.len()) * channels;
        let mut written = 0;
        while written < budget {
            if self.pending_pos >= self.pending.len() && !self.refill()? {
                break;
            }
            let available = self.pending.len() - self.pending_pos;
            let take = available.min(budget - written);
            dest[written..written + take]
                .copy_from_slice(&self.pending[self.pending_pos..self.pending_pos + take]);
            self.pending_pos += take;
            written += take;
        }
        let frames = written / channels;
        self.position += frames as u64;
        Ok(frames)
    }

    fn seek_to_frame(&mut self, frame: u64) -> Result<u64> {
        let target = match self.total {
            Some(total) => frame.min(total),
            None => frame,
        };
        if target < self.position {
            self.reader = new_reader(&self.bytes)?;
            self.position = 0;
            self.pending.clear();
            self.pending_pos = 0;
        }
        let channels = self.spec.channels as usize;
        let mut skip = vec![0.0f32; channels * 1024];
        while self.position < target {
            let want = ((target - self.position).min(1024) as usize) * channels;
            if self.read_frames(&mut skip[..want])? == 0 {
                break;
            }
        }
        Ok(self.position)
    }
}
