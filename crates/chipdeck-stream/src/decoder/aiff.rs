//! AIFF / AIFF-C reading.
//!
//! File layout (all integers big-endian):
//! - `FORM` + u32 size + form type `AIFF` or `AIFC`
//! - `COMM` chunk: channels u16, frame count u32, bits u16, sample rate as
//!   an 80-bit extended float; AIFF-C appends a compression ID
//! - `SSND` chunk: offset u32, block size u32, then the sample data
//! - chunks are word-aligned, so odd payloads carry one pad byte
//!
//! Samples are signed big-endian PCM, left-justified in `ceil(bits / 8)`
//! bytes. Only uncompressed AIFF-C (`NONE`/`twos`) is accepted.

use chipdeck_plugin::{AudioFormat, PluginError, Result};

use super::{SharedBytes, StreamDecoder};

/// Walk the chunks of an IFF `FORM` body.
///
/// Yields `(chunk id, absolute payload start, payload)`; payloads that run
/// past the end of the buffer are truncated rather than rejected.
pub(crate) struct IffChunks<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> IffChunks<'a> {
    /// Validate the `FORM` header and return the walker plus the form type.
    pub(crate) fn new(data: &'a [u8]) -> Result<(Self, [u8; 4])> {
        if data.len() < 12 || &data[0..4] != b"FORM" {
            return Err(PluginError::parse("AIFF", "missing FORM header"));
        }
        let form_type = [data[8], data[9], data[10], data[11]];
        Ok((Self { data, pos: 12 }, form_type))
    }
}

impl<'a> Iterator for IffChunks<'a> {
    type Item = ([u8; 4], usize, &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos + 8 > self.data.len() {
            return None;
        }
        let id = [
            self.data[self.pos],
            self.data[self.pos + 1],
            self.data[self.pos + 2],
            self.data[self.pos + 3],
        ];
        let size = u32::from_be_bytes([
            self.data[self.pos + 4],
            self.data[self.pos + 5],
            self.data[self.pos + 6],
            self.data[self.pos + 7],
        ]) as usize;
        let start = self.pos + 8;
        let end = start.saturating_add(size).min(self.data.len());
        self.pos = start.saturating_add(size).saturating_add(size & 1);
        Some((id, start, &self.data[start..end]))
    }
}

/// Decode an 80-bit IEEE 754 extended float.
pub(crate) fn extended80_to_f64(bytes: &[u8; 10]) -> f64 {
    let sign = if bytes[0] & 0x80 != 0 { -1.0 } else { 1.0 };
    let exponent = ((((bytes[0] & 0x7F) as i32) << 8) | bytes[1] as i32) - 16383;
    let mantissa = u64::from_be_bytes([
        bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7], bytes[8], bytes[9],
    ]);
    if mantissa == 0 {
        return 0.0;
    }
    sign * mantissa as f64 * 2f64.powi(exponent - 63)
}

pub(crate) struct CommInfo {
    pub(crate) channels: u16,
    pub(crate) frames: u32,
    pub(crate) bits: u16,
    pub(crate) rate: f64,
}

/// Parse a `COMM` payload, rejecting compressed AIFF-C streams.
pub(crate) fn parse_comm(payload: &[u8], compressed_form: bool) -> Result<CommInfo> {
    if payload.len() < 18 {
        return Err(PluginError::parse("AIFF", "COMM chunk too short"));
    }
    if compressed_form && payload.len() >= 22 {
        let compression = &payload[18..22];
        if compression != b"NONE" && compression != b"twos" {
            return Err(PluginError::parse(
                "AIFF",
                format!(
                    "unsupported AIFF-C compression {:?}",
                    String::from_utf8_lossy(compression)
                ),
            ));
        }
    }
    let rate_bytes: [u8; 10] = payload[8..18].try_into().unwrap();
    Ok(CommInfo {
        channels: u16::from_be_bytes([payload[0], payload[1]]),
        frames: u32::from_be_bytes([payload[2], payload[3], payload[4], payload[5]]),
        bits: u16::from_be_bytes([payload[6], payload[7]]),
        rate: extended80_to_f64(&rate_bytes),
    })
}

pub(crate) struct AiffDecoder {
    bytes: SharedBytes,
    data_start: usize,
    bytes_per_sample: usize,
    spec: AudioFormat,
    scale: f32,
    total: u64,
    position: u64,
}

impl AiffDecoder {
    pub(crate) fn open(bytes: SharedBytes) -> Result<Self> {
        let data = bytes.as_slice();
        let (chunks, form_type) = IffChunks::new(data)?;
        if &form_type != b"AIFF" && &form_type != b"AIFC" {
            return Err(PluginError::parse("AIFF", "not an AIFF form"));
        }

        let mut comm: Option<CommInfo> = None;
        let mut sound: Option<(usize, usize)> = None;
        for (id, start, payload) in chunks {
            match &id {
                b"COMM" => comm = Some(parse_comm(payload, &form_type == b"AIFC")?),
                b"SSND" => {
                    if payload.len() < 8 {
                        return Err(PluginError::parse("AIFF", "SSND chunk too short"));
                    }
                    let offset =
                        u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]])
                            as usize;
                    let audio_start = start + 8 + offset;
                    let audio_len = payload.len().saturating_sub(8 + offset);
                    sound = Some((audio_start, audio_len));
                }
                _ => {}
            }
        }

        let comm = comm.ok_or_else(|| PluginError::parse("AIFF", "missing COMM chunk"))?;
        let (data_start, data_len) =
            sound.ok_or_else(|| PluginError::parse("AIFF", "missing SSND chunk"))?;
        if comm.channels == 0 {
            return Err(PluginError::parse("AIFF", "zero channels"));
        }
        if !comm.rate.is_finite() || comm.rate < 1.0 {
            return Err(PluginError::parse("AIFF", "implausible sample rate"));
        }
        let bits = comm.bits.clamp(1, 32);
        let bytes_per_sample = (bits as usize + 7) / 8;
        let frame_bytes = bytes_per_sample * comm.channels as usize;
        let total = (comm.frames as u64).min((data_len / frame_bytes) as u64);

        Ok(Self {
            bytes,
            data_start,
            bytes_per_sample,
            spec: AudioFormat::new(comm.channels, comm.rate.round() as u32),
            scale: 1.0 / (1i64 << (bytes_per_sample * 8 - 1)) as f32,
            total,
            position: 0,
        })
    }

    fn decode_sample(&self, raw: &[u8]) -> f32 {
        let value = match raw.len() {
            1 => raw[0] as i8 as i32,
            2 => i16::from_be_bytes([raw[0], raw[1]]) as i32,
            3 => i32::from_be_bytes([raw[0], raw[1], raw[2], 0]) >> 8,
            _ => i32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]),
        };
        value as f32 * self.scale
    }
}

impl StreamDecoder for AiffDecoder {
    fn spec(&self) -> AudioFormat {
        self.spec
    }

    fn total_frames(&self) -> Option<u64> {
        Some(self.total)
    }

    fn read_frames(&mut self, dest: &mut [f32]) -> Result<usize> {
        let channels = self.spec.channels as usize;
        let remaining = (self.total - self.position) as usize;
        let frames = self.spec.whole_frames(dest.len()).min(remaining);
        if frames == 0 {
            return Ok(0);
        }
        let frame_bytes = self.bytes_per_sample * channels;
        let start = self.data_start + self.position as usize * frame_bytes;
        let data = &self.bytes.as_slice()[start..start + frames * frame_bytes];
        for (slot, raw) in dest.iter_mut().zip(data.chunks_exact(self.bytes_per_sample)) {
            *slot = self.decode_sample(raw);
        }
        self.position += frames as u64;
        Ok(frames)
    }

    fn seek_to_frame(&mut self, frame: u64) -> Result<u64> {
        let target = frame.min(self.total);
        self.position = target;
        Ok(target)
    }
}

/// Build a minimal 16-bit AIFF file in memory.
#[cfg(test)]
pub(crate) fn make_aiff_i16(channels: u16, rate_bytes: [u8; 10], frames: &[i16]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(b"AIFF");

    body.extend_from_slice(b"COMM");
    body.extend_from_slice(&18u32.to_be_bytes());
    body.extend_from_slice(&channels.to_be_bytes());
    let frame_count = (frames.len() / channels as usize) as u32;
    body.extend_from_slice(&frame_count.to_be_bytes());
    body.extend_from_slice(&16u16.to_be_bytes());
    body.extend_from_slice(&rate_bytes);

    body.extend_from_slice(b"SSND");
    body.extend_from_slice(&((8 + frames.len() * 2) as u32).to_be_bytes());
    body.extend_from_slice(&0u32.to_be_bytes());
    body.extend_from_slice(&0u32.to_be_bytes());
    for &sample in frames {
        body.extend_from_slice(&sample.to_be_bytes());
    }

    let mut file = Vec::new();
    file.extend_from_slice(b"FORM");
    file.extend_from_slice(&(body.len() as u32).to_be_bytes());
    file.extend_from_slice(&body);
    file
}

/// 44100 Hz as an 80-bit extended float.
#[cfg(test)]
pub(crate) const RATE_44100: [u8; 10] = [0x40, 0x0E, 0xAC, 0x44, 0, 0, 0, 0, 0, 0];

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_extended80_common_rates() {
        assert_relative_eq!(extended80_to_f64(&RATE_44100), 44_100.0);
        // 48000 Hz.
        let rate48 = [0x40, 0x0E, 0xBB, 0x80, 0, 0, 0, 0, 0, 0];
        assert_relative_eq!(extended80_to_f64(&rate48), 48_000.0);
        assert_relative_eq!(extended80_to_f64(&[0; 10]), 0.0);
    }

    #[test]
    fn test_open_reads_comm_and_ssnd() {
        let data = make_aiff_i16(2, RATE_44100, &[100, -100, 200, -200]);
        let decoder = AiffDecoder::open(SharedBytes::new(data)).unwrap();
        assert_eq!(decoder.spec(), AudioFormat::new(2, 44_100));
        assert_eq!(decoder.total_frames(), Some(2));
    }

    #[test]
    fn test_read_decodes_big_endian() {
        let data = make_aiff_i16(1, RATE_44100, &[i16::MAX, -16384, 0]);
        let mut decoder = AiffDecoder::open(SharedBytes::new(data)).unwrap();

        let mut dest = [0.0f32; 4];
        assert_eq!(decoder.read_frames(&mut dest).unwrap(), 3);
        assert_relative_eq!(dest[0], 32767.0 / 32768.0);
        assert_relative_eq!(dest[1], -0.5);
        assert_relative_eq!(dest[2], 0.0);
        assert_eq!(decoder.read_frames(&mut dest).unwrap(), 0);
    }

    #[test]
    fn test_seek_is_index_math() {
        let data = make_aiff_i16(1, RATE_44100, &[1, 2, 3, 4, 5]);
        let mut decoder = AiffDecoder::open(SharedBytes::new(data)).unwrap();

        assert_eq!(decoder.seek_to_frame(3).unwrap(), 3);
        let mut dest = [0.0f32; 8];
        assert_eq!(decoder.read_frames(&mut dest).unwrap(), 2);
        assert_relative_eq!(dest[0], 4.0 / 32768.0);

        // Past-the-end clamps.
        assert_eq!(decoder.seek_to_frame(99).unwrap(), 5);
        assert_eq!(decoder.read_frames(&mut dest).unwrap(), 0);

        // Backwards works the same way.
        assert_eq!(decoder.seek_to_frame(0).unwrap(), 0);
        assert_eq!(decoder.read_frames(&mut dest).unwrap(), 5);
    }

    #[test]
    fn test_rejects_compressed_aifc() {
        // AIFC form with a 22-byte COMM carrying a sowt compression ID.
        let mut body = Vec::new();
        body.extend_from_slice(b"AIFC");
        body.extend_from_slice(b"COMM");
        body.extend_from_slice(&22u32.to_be_bytes());
        body.extend_from_slice(&1u16.to_be_bytes());
        body.extend_from_slice(&0u32.to_be_bytes());
        body.extend_from_slice(&16u16.to_be_bytes());
        body.extend_from_slice(&RATE_44100);
        body.extend_from_slice(b"sowt");
        let mut file = Vec::new();
        file.extend_from_slice(b"FORM");
        file.extend_from_slice(&(body.len() as u32).to_be_bytes());
        file.extend_from_slice(&body);

        assert!(AiffDecoder::open(SharedBytes::new(file)).is_err());
    }

    #[test]
    fn test_truncated_and_foreign_input() {
        assert!(AiffDecoder::open(SharedBytes::new(Vec::new())).is_err());
        assert!(AiffDecoder::open(SharedBytes::new(b"FORM\x00\x00\x00\x04JUNK".to_vec())).is_err());
        // Declared frames beyond the real data clamp to what is present.
        let mut data = make_aiff_i16(1, RATE_44100, &[1, 2, 3, 4]);
        let len = data.len();
        data.truncate(len - 4);
        let decoder = AiffDecoder::open(SharedBytes::new(data)).unwrap();
        assert_eq!(decoder.total_frames(), Some(2));
    }
}
