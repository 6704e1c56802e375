//! RIFF WAVE reading via `hound`.

use std::io::Cursor;

use chipdeck_plugin::{AudioFormat, PluginError, Result};

use super::{SharedBytes, StreamDecoder};

pub(crate) struct WavDecoder {
    reader: hound::WavReader<Cursor<SharedBytes>>,
    spec: AudioFormat,
    scale: f32,
    float: bool,
    total: u64,
    position: u64,
}

impl WavDecoder {
    pub(crate) fn open(bytes: SharedBytes) -> Result<Self> {
        let reader = hound::WavReader::new(bytes.cursor())
            .map_err(|e| PluginError::parse("WAV", e.to_string()))?;
        let wav_spec = reader.spec();
        if wav_spec.channels == 0 {
            return Err(PluginError::parse("WAV", "zero channels"));
        }
        let bits = wav_spec.bits_per_sample.clamp(1, 32);
        Ok(Self {
            total: reader.duration() as u64,
            spec: AudioFormat::new(wav_spec.channels, wav_spec.sample_rate),
            scale: 1.0 / (1i64 << (bits - 1)) as f32,
            float: wav_spec.sample_format == hound::SampleFormat::Float,
            position: 0,
            reader,
        })
    }
}

impl StreamDecoder for WavDecoder {
    fn spec(&self) -> AudioFormat {
        self.spec
    }

    fn total_frames(&self) -> Option<u64> {
        Some(self.total)
    }

    fn read_frames(&mut self, dest: &mut [f32]) -> Result<usize> {
        let channels = self.spec.channels as usize;
        let budget = self.spec.whole_frames(dest.len()) * channels;
        let mut written = 0;
        if self.float {
            let mut samples = self.reader.samples::<f32>();
            while written < budget {
                match samples.next() {
                    Some(sample) => {
                        dest[written] =
                            sample.map_err(|e| PluginError::parse("WAV", e.to_string()))?;
                        written += 1;
                    }
                    None => break,
                }
            }
        } else {
            let mut samples = self.reader.samples::<i32>();
            while written < budget {
                match samples.next() {
                    Some(sample) => {
                        dest[written] = sample.map_err(|e| PluginError::parse("WAV", e.to_string()))?
                            as f32
                            * self.scale;
                        written += 1;
                    }
                    None => break,
                }
            }
        }
        // A truncated final frame is dropped rather than reported torn.
        let frames = written / channels;
        self.position += frames as u64;
        Ok(frames)
    }

    fn seek_to_frame(&mut self, frame: u64) -> Result<u64> {
        let target = frame.min(self.total);
        self.reader.seek(target as u32)?;
        self.position = target;
        Ok(target)
    }
}

/// Build a minimal 16-bit PCM WAV file in memory.
#[cfg(test)]
pub(crate) fn make_wav_i16(channels: u16, rate: u32, frames: &[i16]) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels,
        sample_rate: rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
    for &sample in frames {
        writer.write_sample(sample).unwrap();
    }
    writer.finalize().unwrap();
    cursor.into_inner()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_open_reports_spec_and_total() {
        let data = make_wav_i16(2, 48_000, &[0, 0, 100, -100, 200, -200]);
        let decoder = WavDecoder::open(SharedBytes::new(data)).unwrap();
        assert_eq!(decoder.spec(), AudioFormat::new(2, 48_000));
        assert_eq!(decoder.total_frames(), Some(3));
    }

    #[test]
    fn test_read_scales_to_unit_range() {
        let data = make_wav_i16(1, 44_100, &[i16::MAX, i16::MIN, 0]);
        let mut decoder = WavDecoder::open(SharedBytes::new(data)).unwrap();

        let mut dest = [0.0f32; 3];
        assert_eq!(decoder.read_frames(&mut dest).unwrap(), 3);
        assert_relative_eq!(dest[0], 32767.0 / 32768.0);
        assert_relative_eq!(dest[1], -1.0);
        assert_relative_eq!(dest[2], 0.0);
        assert_eq!(decoder.read_frames(&mut dest).unwrap(), 0);
    }

    #[test]
    fn test_odd_destination_keeps_frames_whole() {
        let data = make_wav_i16(2, 44_100, &[1, 2, 3, 4, 5, 6, 7, 8]);
        let mut decoder = WavDecoder::open(SharedBytes::new(data)).unwrap();

        let mut dest = [0.0f32; 5];
        assert_eq!(decoder.read_frames(&mut dest).unwrap(), 2);
        // Fifth slot stays untouched.
        assert_eq!(dest[4], 0.0);
        assert_eq!(decoder.read_frames(&mut dest).unwrap(), 2);
        assert_eq!(decoder.read_frames(&mut dest).unwrap(), 0);
    }

    #[test]
    fn test_seek_clamps_to_end() {
        let data = make_wav_i16(1, 44_100, &[10, 20, 30, 40]);
        let mut decoder = WavDecoder::open(SharedBytes::new(data)).unwrap();

        assert_eq!(decoder.seek_to_frame(2).unwrap(), 2);
        let mut dest = [0.0f32; 4];
        assert_eq!(decoder.read_frames(&mut dest).unwrap(), 2);
        assert_relative_eq!(dest[0], 30.0 / 32768.0);

        assert_eq!(decoder.seek_to_frame(400).unwrap(), 4);
        assert_eq!(decoder.read_frames(&mut dest).unwrap(), 0);
    }

    #[test]
    fn test_rejects_non_wav_bytes() {
        assert!(WavDecoder::open(SharedBytes::new(b"fLaC junk".to_vec())).is_err());
        assert!(WavDecoder::open(SharedBytes::new(Vec::new())).is_err());
    }
}
