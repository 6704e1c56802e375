//! Per-container decoder shims behind one trait.
//!
//! Each shim wraps one decoding crate and presents the same whole-frame
//! `f32` read surface, so the adapter never branches on the container
//! outside [`open_decoder`].

use std::io::Cursor;
use std::sync::Arc;

use chipdeck_plugin::{AudioFormat, Result};

use crate::detect::StreamKind;

pub(crate) mod aiff;
pub(crate) mod flac;
pub(crate) mod mp3;
pub(crate) mod vorbis;
pub(crate) mod wav;

pub(crate) use aiff::AiffDecoder;
pub(crate) use flac::FlacDecoder;
pub(crate) use mp3::Mp3Decoder;
pub(crate) use vorbis::VorbisDecoder;
pub(crate) use wav::WavDecoder;

/// The whole file, cheaply cloneable.
///
/// Decoders without native seek rebuild themselves from a fresh cursor over
/// the same bytes, so the file is loaded exactly once per session.
#[derive(Debug, Clone)]
pub struct SharedBytes(Arc<[u8]>);

impl SharedBytes {
    /// Wrap an owned buffer.
    pub fn new(data: Vec<u8>) -> Self {
        Self(data.into())
    }

    /// A fresh read/seek cursor over the bytes.
    pub fn cursor(&self) -> Cursor<SharedBytes> {
        Cursor::new(self.clone())
    }

    /// The raw bytes.
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }
}

impl AsRef<[u8]> for SharedBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// One open decoding session over an in-memory file.
///
/// Sample order is interleaved `f32` in -1.0..=1.0; reads return whole
/// frames only and 0 at end of stream.
pub trait StreamDecoder: Send {
    /// Output channel count and sample rate.
    fn spec(&self) -> AudioFormat;

    /// Total length in frames, when the container declares it.
    fn total_frames(&self) -> Option<u64>;

    /// Decode up to `dest.len()` samples into `dest`, returning the number
    /// of frames written.
    fn read_frames(&mut self, dest: &mut [f32]) -> Result<usize>;

    /// Seek to `frame`, returning the frame actually reached.
    fn seek_to_frame(&mut self, frame: u64) -> Result<u64>;
}

/// Open the right shim for `kind` over `data`.
pub fn open_decoder(kind: StreamKind, data: Vec<u8>) -> Result<Box<dyn StreamDecoder>> {
    let bytes = SharedBytes::new(data);
    Ok(match kind {
        StreamKind::Wav => Box::new(WavDecoder::open(bytes)?),
        StreamKind::Aiff => Box::new(AiffDecoder::open(bytes)?),
        StreamKind::Flac => Box::new(FlacDecoder::open(bytes)?),
        StreamKind::Vorbis => Box::new(VorbisDecoder::open(bytes)?),
        StreamKind::Mp3 => Box::new(Mp3Decoder::open(bytes)?),
    })
}
