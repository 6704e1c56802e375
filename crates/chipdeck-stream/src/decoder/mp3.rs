//! MP3 reading via `symphonia`.
//!
//! Handles bare MPEG audio streams and files behind an ID3v2 header.
//! Individually corrupt packets are skipped; the stream only fails when
//! the demuxer itself gives up.

use std::io;

use log::{debug, warn};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error;
use symphonia::core::formats::{FormatOptions, FormatReader, SeekMode, SeekTo};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::units::{Time, TimeBase};

use chipdeck_plugin::{AudioFormat, PluginError, Result, DEFAULT_SAMPLE_RATE};

use super::{SharedBytes, StreamDecoder};

pub(crate) struct Mp3Decoder {
    reader: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    spec: AudioFormat,
    time_base: Option<TimeBase>,
    total: Option<u64>,
    position: u64,
    pending: Vec<f32>,
    pending_pos: usize,
}

impl Mp3Decoder {
    pub(crate) fn open(bytes: SharedBytes) -> Result<Self> {
        let mss = MediaSourceStream::new(Box::new(bytes.cursor()), Default::default());
        let mut hint = Hint::new();
        hint.with_extension("mp3");

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| PluginError::parse("MP3", e.to_string()))?;
        let reader = probed.format;

        let track = reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| PluginError::parse("MP3", "no audio track"))?;
        let track_id = track.id;
        let rate = track.codec_params.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE);
        let channels = track
            .codec_params
            .channels
            .map(|c| c.count() as u16)
            .unwrap_or(2);
        let time_base = track.codec_params.time_base;
        let total = track.codec_params.n_frames;

        let decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| PluginError::parse("MP3", e.to_string()))?;

        Ok(Self {
            reader,
            decoder,
            track_id,
            spec: AudioFormat::new(channels, rate),
            time_base,
            total,
            position: 0,
            pending: Vec::new(),
            pending_pos: 0,
        })
    }

    fn refill(&mut self) -> Result<bool> {
        loop {
            let packet = match self.reader.next_packet() {
                Ok(packet) => packet,
                Err(Error::IoError(ref e)) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    return Ok(false)
                }
                Err(Error::ResetRequired) => {
                    warn!("mp3 stream requested a reset mid-file, treating as end");
                    return Ok(false);
                }
                Err(e) => return Err(PluginError::parse("MP3", e.to_string())),
            };
            if packet.track_id() != self.track_id {
                continue;
            }
            match self.decoder.decode(&packet) {
                Ok(decoded) => {
                    let spec = *decoded.spec();
                    let mut buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                    buf.copy_interleaved_ref(decoded);
                    if buf.samples().is_empty() {
                        continue;
                    }
                    self.pending.clear();
                    self.pending.extend_from_slice(buf.samples());
                    self.pending_pos = 0;
                    return Ok(true);
                }
                Err(Error::DecodeError(e)) => {
                    debug!("mp3 packet skipped: {e}");
                    continue;
                }
                Err(e) => return Err(PluginError::parse("MP3", e.to_string())),
            }
        }
    }
}

impl StreamDecoder for Mp3Decoder {
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
        let rate = self.spec.rate.max(1) as f64;
        let seeked = self
            .reader
            .seek(
                SeekMode::Accurate,
                SeekTo::Time {
                    time: Time::from(target as f64 / rate),
                    track_id: Some(self.track_id),
                },
            )
            .map_err(|e| PluginError::parse("MP3", e.to_string()))?;
        self.decoder.reset();
        self.pending.clear();
        self.pending_pos = 0;

        let achieved = match self.time_base {
            Some(tb) => {
                let time = tb.calc_time(seeked.actual_ts);
                ((time.seconds as f64 + time.frac) * rate).round() as u64
            }
            None => seeked.actual_ts,
        };
        self.position = achieved;
        Ok(achieved)
    }
}
