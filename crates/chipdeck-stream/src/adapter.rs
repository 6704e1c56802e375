//! The streaming playback adapter.

use log::{debug, warn};

use chipdeck_plugin::{
    AudioFormat, MetadataSink, OpenInfo, PlaybackPlugin, PluginError, ProbeResult, ReadReply,
    Result, ScopeBuffer, Services, SubsongRef, Telemetry, PROBE_PREFIX_LEN,
};

use crate::decoder::{open_decoder, StreamDecoder};
use crate::detect::{detect, StreamKind, ALL_KINDS};
use crate::meta;

struct Session {
    kind: StreamKind,
    decoder: Box<dyn StreamDecoder>,
    format: AudioFormat,
    scope: ScopeBuffer,
}

/// One playback handle over the sampled-audio formats (WAV, AIFF, FLAC,
/// Ogg Vorbis, MP3).
///
/// Streams carry exactly one subsong; any explicit index other than 0 is
/// rejected.
#[derive(Default)]
pub struct StreamPlugin {
    session: Option<Session>,
}

impl StreamPlugin {
    /// New handle with no open session.
    pub fn new() -> Self {
        Self::default()
    }
}

impl PlaybackPlugin for StreamPlugin {
    fn name(&self) -> &'static str {
        "stream"
    }

    fn version(&self) -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    fn supported_extensions(&self) -> &'static str {
        "wav,wave,aif,aiff,aifc,flac,ogg,oga,mp3"
    }

    fn probe(&self, prefix: &[u8], filename: &str, _total_size: u64) -> ProbeResult {
        if detect(prefix).is_some() {
            return ProbeResult::Supported;
        }
        if ALL_KINDS.iter().any(|kind| kind.matches_extension(filename)) {
            return ProbeResult::Unsure;
        }
        ProbeResult::Unsupported
    }

    fn open(&mut self, url: &str, subsong: SubsongRef, services: &Services) -> Result<OpenInfo> {
        self.session = None;
        if let SubsongRef::Index(n) = subsong {
            if n > 0 {
                return Err(PluginError::InvalidSubsong {
                    requested: n,
                    available: 1,
                });
            }
        }

        let data = services.io.read_to_memory(url)?;
        let kind = detect(&data[..data.len().min(PROBE_PREFIX_LEN)])
            .or_else(|| ALL_KINDS.iter().copied().find(|k| k.matches_extension(url)))
            .ok_or_else(|| PluginError::parse("stream", "unrecognized container"))?;
        let decoder = open_decoder(kind, data)?;

        let format = decoder.spec();
        let duration_ms = decoder.total_frames().map(|f| format.frames_to_ms(f));
        debug!(
            "opened {url} as {} ({} ch, {} Hz, {:?} ms)",
            kind.name(),
            format.channels,
            format.rate,
            duration_ms
        );
        self.session = Some(Session {
            kind,
            decoder,
            format,
            scope: ScopeBuffer::new(format.channels as usize),
        });
        Ok(OpenInfo {
            format,
            duration_ms,
            subsong: 0,
            subsong_count: 1,
        })
    }

    fn read(&mut self, dest: &mut [f32]) -> ReadReply {
        let Some(session) = self.session.as_mut() else {
            return ReadReply::error();
        };
        if session.format.whole_frames(dest.len()) == 0 {
            // Destination too small for a single whole frame; the stream
            // itself has not ended.
            return ReadReply::ok(session.format, 0);
        }
        match session.decoder.read_frames(dest) {
            Ok(0) => ReadReply::finished(session.format),
            Ok(frames) => {
                let channels = session.format.channels as usize;
                session.scope.push_frames(&dest[..frames * channels], channels);
                ReadReply::ok(session.format, frames)
            }
            Err(e) => {
                warn!("{} read failed: {e}", session.kind.name());
                ReadReply::error()
            }
        }
    }

    fn seek(&mut self, target_ms: i64) -> Result<u64> {
        let session = self.session.as_mut().ok_or(PluginError::NotOpen)?;
        let target = target_ms.max(0) as u64;
        let achieved = session
            .decoder
            .seek_to_frame(session.format.ms_to_frames(target))?;
        session.scope.clear();
        Ok(session.format.frames_to_ms(achieved))
    }

    fn close(&mut self) {
        self.session = None;
    }

    fn metadata(&self, url: &str, services: &Services, sink: &mut dyn MetadataSink) -> Result<()> {
        meta::extract(url, services, sink)
    }

    fn telemetry(&self) -> Option<Telemetry> {
        let session = self.session.as_ref()?;
        Some(Telemetry {
            vu: (0..session.scope.channel_count())
                .map(|ch| session.scope.vu(ch))
                .collect(),
            pattern: None,
            row: None,
        })
    }

    fn scope_channel_names(&self) -> Vec<String> {
        let Some(session) = self.session.as_ref() else {
            return Vec::new();
        };
        match session.format.channels {
            1 => vec!["Mono".to_string()],
            2 => vec!["Left".to_string(), "Right".to_string()],
            n => (0..n).map(|ch| format!("Channel {}", ch + 1)).collect(),
        }
    }

    fn scope_data(&self, channel: usize, dest: &mut [f32]) -> usize {
        match self.session.as_ref() {
            Some(session) => session.scope.snapshot(channel, dest),
            None => 0,
        }
    }
}
