//! Ogg Vorbis reading via `lewton`.
//!
//! Vorbis streams do not declare a total length up front, so
//! `total_frames` is `None` and the session length stays unknown. Seeking
//! is page-granular through lewton's granule seek.

use std::io::Cursor;

use chipdeck_plugin::{AudioFormat, PluginError, Result};
use lewton::inside_ogg::OggStreamReader;

use super::{SharedBytes, StreamDecoder};

pub(crate) struct VorbisDecoder {
    reader: OggStreamReader<Cursor<SharedBytes>>,
    spec: AudioFormat,
    pending: Vec<f32>,
    pending_pos: usize,
}

impl VorbisDecoder {
    pub(crate) fn open(bytes: SharedBytes) -> Result<Self> {
        let reader = OggStreamReader::new(bytes.cursor())
            .map_err(|e| PluginError::parse("Ogg Vorbis", e.to_string()))?;
        let channels = reader.ident_hdr.audio_channels as u16;
        if channels == 0 {
            return Err(PluginError::parse("Ogg Vorbis", "zero channels"));
        }
        Ok(Self {
            spec: AudioFormat::new(channels, reader.ident_hdr.audio_sample_rate),
            pending: Vec::new(),
            pending_pos: 0,
            reader,
        })
    }

    fn refill(&mut self) -> Result<bool> {
        loop {
            match self.reader.read_dec_packet_itl() {
                Ok(Some(packet)) => {
                    // The first audio packet of a stream may be empty.
                    if packet.is_empty() {
                        continue;
                    }
                    self.pending.clear();
                    self.pending
                        .extend(packet.iter().map(|&s| s as f32 / 32768.0));
                    self.pending_pos = 0;
                    return Ok(true);
                }
                Ok(None) => return Ok(false),
                Err(e) => return Err(PluginError::parse("Ogg Vorbis", e.to_string())),
            }
        }
    }
}

impl StreamDecoder for VorbisDecoder {
    fn spec(&self) -> AudioFormat {
        self.spec
    }

    fn total_frames(&self) -> Option<u64> {
        None
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
        Ok(written / channels)
    }

    fn seek_to_frame(&mut self, frame: u64) -> Result<u64> {
        self.reader
            .seek_absgp_pg(frame)
            .map_err(|e| PluginError::parse("Ogg Vorbis", e.to_string()))?;
        self.pending.clear();
        self.pending_pos = 0;
        // Granule seeks land on a page boundary at or before the target,
        // and lewton only learns the landing granule once a packet has been
        // decoded: buffer one (the next read serves it) and subtract it
        // from the page-end granule.
        if !self.refill()? {
            return Ok(self.reader.get_last_absgp().unwrap_or(frame).min(frame));
        }
        let buffered = (self.pending.len() / self.spec.channels as usize) as u64;
        Ok(landed_frame(self.reader.get_last_absgp(), buffered, frame))
    }
}

/// Landing position from the page-end granule lewton reports, clamped to
/// the request (granule seeks never land past it).
fn landed_frame(absgp: Option<u64>, buffered_frames: u64, requested: u64) -> u64 {
    match absgp {
        Some(absgp) => absgp.saturating_sub(buffered_frames).min(requested),
        None => requested,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_landed_frame_from_page_granule() {
        // Page ends at 1024 with 256 frames buffered: landed at 768.
        assert_eq!(landed_frame(Some(1024), 256, 2000), 768);
        // Never reported past the request.
        assert_eq!(landed_frame(Some(1024), 256, 500), 500);
        // Buffered more than the page granule claims: clamped to 0.
        assert_eq!(landed_frame(Some(10), 50, 100), 0);
        // No granule visible: the request is the best answer left.
        assert_eq!(landed_frame(None, 0, 42), 42);
    }

    #[test]
    fn test_rejects_corrupt_ogg() {
        // Valid capture pattern, garbage page.
        let mut data = b"OggS".to_vec();
        data.extend_from_slice(&[0xFF; 32]);
        assert!(VorbisDecoder::open(SharedBytes::new(data)).is_err());
    }

    #[test]
    fn test_rejects_foreign_bytes() {
        assert!(VorbisDecoder::open(SharedBytes::new(b"fLaC\x00\x00".to_vec())).is_err());
        assert!(VorbisDecoder::open(SharedBytes::new(Vec::new())).is_err());
    }
}
