//! The SAP playback adapter.

use log::{debug, warn};

use chipdeck_bridge::{CommandSpec, PipeDecoder};
use chipdeck_plugin::probe::{ext_matches, file_stem};
use chipdeck_plugin::{
    AudioFormat, MetadataSink, OpenInfo, PlaybackPlugin, PluginError, ProbeResult, ReadReply,
    Result, ScopeBuffer, Services, Settings, SubsongRef, TagKey, Telemetry, DEFAULT_SAMPLE_RATE,
};

use crate::header::SapHeader;

const PROGRAM_KEY: &str = "sap.player.program";
const ARGS_KEY: &str = "sap.player.args";
const RATE_KEY: &str = "sap.sample_rate";

struct Session {
    bridge: PipeDecoder,
    format: AudioFormat,
    /// Playback stops after this many frames when the header carried a
    /// `TIME` entry for the subsong; `None` plays until the player exits.
    budget_frames: Option<u64>,
    delivered_frames: u64,
    spec: CommandSpec,
    url: String,
    subsong: u32,
    scope: ScopeBuffer,
}

/// Playback handle for Atari 8-bit SAP files.
///
/// The 6502/POKEY emulation lives in an external player program configured
/// through `sap.player.program` and `sap.player.args`; this adapter parses
/// the text header itself (subsongs, durations, tags) and streams the
/// player's stdout PCM. Subsongs with a `TIME` entry stop at the stated
/// duration, looped ones included.
pub struct SapPlugin {
    session: Option<Session>,
}

impl SapPlugin {
    /// New handle; registers the adapter's settings keys.
    ///
    /// `sap.player.program` is empty by default, which leaves every `open`
    /// failing with [`PluginError::PlayerMissing`] until the host points it
    /// at a SAP player binary. `sap.player.args` is the argument template
    /// (`{file}` and `{subsong}` are substituted), `sap.sample_rate` the PCM
    /// rate the player is expected to emit.
    pub fn new(settings: &mut Settings) -> Self {
        settings.register_str(PROGRAM_KEY, "");
        settings.register_str(ARGS_KEY, "{file} {subsong}");
        settings.register_int(RATE_KEY, i64::from(DEFAULT_SAMPLE_RATE));
        Self { session: None }
    }

    fn output_rate(settings: &Settings) -> Result<u32> {
        let rate = settings.get_int(RATE_KEY)?;
        u32::try_from(rate)
            .ok()
            .filter(|&r| r > 0)
            .ok_or_else(|| PluginError::Settings(format!("{RATE_KEY} must be positive, got {rate}")))
    }
}

impl PlaybackPlugin for SapPlugin {
    fn name(&self) -> &'static str {
        "sap"
    }

    fn version(&self) -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    fn supported_extensions(&self) -> &'static str {
        "sap"
    }

    fn probe(&self, prefix: &[u8], filename: &str, _total_size: u64) -> ProbeResult {
        if prefix.starts_with(b"SAP\r") {
            return ProbeResult::Supported;
        }
        if ext_matches(filename, "sap") {
            return ProbeResult::Unsure;
        }
        ProbeResult::Unsupported
    }

    fn open(&mut self, url: &str, subsong: SubsongRef, services: &Services) -> Result<OpenInfo> {
        self.session = None;

        let data = services.io.read_to_memory(url)?;
        let header = SapHeader::parse(&data)?;
        let subsong = subsong.resolve(header.default_song);
        if subsong >= header.songs {
            return Err(PluginError::InvalidSubsong {
                requested: subsong,
                available: header.songs,
            });
        }

        let spec = CommandSpec::from_settings(services.settings, PROGRAM_KEY, ARGS_KEY)?;
        let format = AudioFormat::new(
            if header.stereo { 2 } else { 1 },
            Self::output_rate(services.settings)?,
        );
        let bridge = PipeDecoder::spawn(&spec, url, subsong, format)?;

        let duration_ms = header.time_for(subsong).map(|t| t.millis);
        debug!(
            "opened {url} subsong {subsong}/{} via {} ({} ch, {} Hz, {:?} ms)",
            header.songs,
            spec.program(),
            format.channels,
            format.rate,
            duration_ms
        );
        self.session = Some(Session {
            bridge,
            format,
            budget_frames: duration_ms.map(|ms| format.ms_to_frames(ms)),
            delivered_frames: 0,
            spec,
            url: url.to_string(),
            subsong,
            scope: ScopeBuffer::new(format.channels as usize),
        });
        Ok(OpenInfo {
            format,
            duration_ms,
            subsong,
            subsong_count: header.songs,
        })
    }

    fn read(&mut self, dest: &mut [f32]) -> ReadReply {
        let Some(session) = self.session.as_mut() else {
            return ReadReply::error();
        };
        let format = session.format;
        let channels = format.channels as usize;

        let remaining = session
            .budget_frames
            .map(|total| total.saturating_sub(session.delivered_frames));
        if remaining == Some(0) {
            // Length budget exhausted; stop the player instead of leaving it
            // blocked on a full pipe until close.
            session.bridge.shutdown();
            return ReadReply::finished(format);
        }
        if format.whole_frames(dest.len()) == 0 {
            // Destination too small for a single whole frame; not end of
            // stream.
            return ReadReply::ok(format, 0);
        }

        let mut budget = dest.len();
        if let Some(remaining) = remaining {
            let remaining_samples = remaining.saturating_mul(channels as u64);
            budget = budget.min(usize::try_from(remaining_samples).unwrap_or(usize::MAX));
        }

        let frames = session.bridge.read_frames(&mut dest[..budget]);
        if frames == 0 {
            if let Some(message) = session.bridge.take_error() {
                warn!("SAP player failed on {}: {message}", session.url);
            }
            return ReadReply::finished(format);
        }
        session.delivered_frames += frames as u64;
        session.scope.push_frames(&dest[..frames * channels], channels);
        ReadReply::ok(format, frames)
    }

    /// Seek by restarting the player and discarding output up to the target.
    ///
    /// Cost is O(target): the external player has no seek channel, so the
    /// skipped span is decoded and thrown away.
    fn seek(&mut self, target_ms: i64) -> Result<u64> {
        let session = self.session.as_mut().ok_or(PluginError::NotOpen)?;
        let format = session.format;
        let mut target_frames = format.ms_to_frames(target_ms.max(0) as u64);
        if let Some(budget) = session.budget_frames {
            target_frames = target_frames.min(budget);
        }

        session.bridge.shutdown();
        session.bridge =
            PipeDecoder::spawn(&session.spec, &session.url, session.subsong, format)?;
        session.delivered_frames = session.bridge.skip_frames(target_frames);
        session.scope.clear();
        Ok(format.frames_to_ms(session.delivered_frames))
    }

    fn close(&mut self) {
        self.session = None;
    }

    fn metadata(&self, url: &str, services: &Services, sink: &mut dyn MetadataSink) -> Result<()> {
        let data = services.io.read_to_memory(url)?;
        let header = SapHeader::parse(&data)?;

        let id = sink.begin(url);
        match &header.name {
            Some(name) => sink.set_tag(id, TagKey::Title, name),
            None => sink.set_tag(id, TagKey::Title, file_stem(url)),
        }
        if let Some(author) = &header.author {
            sink.set_tag(id, TagKey::Artist, author);
        }
        if let Some(date) = &header.date {
            sink.set_tag(id, TagKey::Date, date);
        }
        let song_type = match header.sap_type {
            Some(kind) => format!("SAP TYPE {kind}"),
            None => "SAP".to_string(),
        };
        sink.set_tag(id, TagKey::SongType, &song_type);

        for index in 0..header.songs {
            let length = header.time_for(index).map(|t| t.millis as f64 / 1000.0);
            sink.add_subsong(id, index, "", length);
        }
        if let Some(time) = header.time_for(header.default_song) {
            sink.set_tag_f64(id, TagKey::LengthSeconds, time.millis as f64 / 1000.0);
        }
        Ok(())
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
            _ => vec!["Left".to_string(), "Right".to_string()],
        }
    }

    fn scope_data(&self, channel: usize, dest: &mut [f32]) -> usize {
        match self.session.as_ref() {
            Some(session) => session.scope.snapshot(channel, dest),
            None => 0,
        }
    }
}
