//! The UADE fallback adapter.

use std::env;
use std::path::PathBuf;

use log::{debug, warn};

use chipdeck_bridge::{CommandSpec, PipeDecoder};
use chipdeck_plugin::probe::{file_stem, strip_amiga_ext};
use chipdeck_plugin::{
    AudioFormat, MetadataSink, OpenInfo, PlaybackPlugin, PluginError, ProbeResult, ReadReply,
    Result, ScopeBuffer, Services, Settings, SubsongRef, TagKey, Telemetry, DEFAULT_SAMPLE_RATE,
};

use crate::formats::{
    family_for, protracker_magic, protracker_sample_names, protracker_title,
};

const PROGRAM_KEY: &str = "uade.program";
const ARGS_KEY: &str = "uade.args";
const RATE_KEY: &str = "uade.sample_rate";
const MAX_SECONDS_KEY: &str = "uade.max_seconds";

/// Where the player's eagleplayer/score data lives when nothing else says.
const FALLBACK_BASE_DIR: &str = "/usr/share/uade";

struct Session {
    bridge: PipeDecoder,
    format: AudioFormat,
    /// Safety cap: untimed Amiga modules loop forever, so reads stop after
    /// `uade.max_seconds` worth of frames. 0 disables the cap.
    budget_frames: Option<u64>,
    delivered_frames: u64,
    url: String,
    scope: ScopeBuffer,
}

/// Fallback playback handle for the Amiga module families UADE hosts.
///
/// Everything is delegated to an external UADE player (`uade123 --stdout` by
/// default) through [`chipdeck_bridge`]; the adapter itself only probes
/// extensions, reads Protracker header metadata, and streams the player's
/// stdout PCM. Probing always answers [`ProbeResult::Unsure`] so dedicated
/// adapters outrank it for formats both can play.
///
/// Pipe playback has no seek channel: [`seek`](PlaybackPlugin::seek) returns
/// [`PluginError::SeekUnsupported`] for every target.
///
/// The external player keeps process-wide state of its own; hosts that open
/// several UADE sessions at once must serialize them around the one player
/// installation themselves.
pub struct UadePlugin {
    base_dir: PathBuf,
    session: Option<Session>,
}

impl UadePlugin {
    /// New handle; registers the `uade.*` settings keys and derives the
    /// player data directory from the environment.
    ///
    /// The directory resolution order is `UADE_BASE_DIR`, then
    /// `$HOME/.uade`, then a compiled-in system default. It is substituted
    /// for `{basedir}` in the `uade.args` template.
    pub fn new(settings: &mut Settings) -> Self {
        settings.register_str(PROGRAM_KEY, "uade123");
        settings.register_str(ARGS_KEY, "--stdout --subsong {subsong} {file}");
        settings.register_int(RATE_KEY, i64::from(DEFAULT_SAMPLE_RATE));
        settings.register_int(MAX_SECONDS_KEY, 600);

        let base_dir = resolve_base_dir(
            env::var("UADE_BASE_DIR").ok(),
            env::var("HOME").ok(),
        );
        debug!("uade base directory: {}", base_dir.display());
        Self {
            base_dir,
            session: None,
        }
    }

    /// The resolved player data directory.
    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    fn command_spec(&self, settings: &Settings) -> Result<CommandSpec> {
        let program = settings.get_str(PROGRAM_KEY)?;
        if program.trim().is_empty() {
            return Err(PluginError::PlayerMissing(format!(
                "no program configured under {PROGRAM_KEY}"
            )));
        }
        let args = settings
            .get_str(ARGS_KEY)?
            .replace("{basedir}", &self.base_dir.to_string_lossy());
        Ok(CommandSpec::new(program.trim(), &args))
    }

    fn output_rate(settings: &Settings) -> Result<u32> {
        let rate = settings.get_int(RATE_KEY)?;
        u32::try_from(rate)
            .ok()
            .filter(|&r| r > 0)
            .ok_or_else(|| PluginError::Settings(format!("{RATE_KEY} must be positive, got {rate}")))
    }
}

impl PlaybackPlugin for UadePlugin {
    fn name(&self) -> &'static str {
        "uade"
    }

    fn version(&self) -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    fn supported_extensions(&self) -> &'static str {
        "mod,med,ahx,hip,hipc,okt,sfx,digi,emod,cust,aon,fc13,fc14,bp,dw,gmc"
    }

    fn probe(&self, _prefix: &[u8], filename: &str, _total_size: u64) -> ProbeResult {
        // Never Supported: even a Protracker magic match stays Unsure so a
        // dedicated module adapter in the host registry outranks this one.
        match family_for(filename) {
            Some(_) => ProbeResult::Unsure,
            None => ProbeResult::Unsupported,
        }
    }

    fn open(&mut self, url: &str, subsong: SubsongRef, services: &Services) -> Result<OpenInfo> {
        self.session = None;

        if !services.io.exists(url) {
            return Err(PluginError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no such file: {url}"),
            )));
        }

        let spec = self.command_spec(services.settings)?;
        // uade123 emits stereo; channel mapping beyond that is the player's.
        let format = AudioFormat::new(2, Self::output_rate(services.settings)?);
        // The player decides what its default subsong is; Default maps to
        // index 0 purely as the value handed to {subsong}.
        let subsong = subsong.resolve(0);
        let bridge = PipeDecoder::spawn(&spec, url, subsong, format)?;

        let max_seconds = services.settings.get_int(MAX_SECONDS_KEY)?;
        let budget_frames = u64::try_from(max_seconds)
            .ok()
            .filter(|&s| s > 0)
            .map(|s| s * u64::from(format.rate));
        debug!(
            "opened {url} subsong {subsong} via {} ({} Hz, cap {:?} frames)",
            spec.program(),
            format.rate,
            budget_frames
        );
        self.session = Some(Session {
            bridge,
            format,
            budget_frames,
            delivered_frames: 0,
            url: url.to_string(),
            scope: ScopeBuffer::new(format.channels as usize),
        });
        Ok(OpenInfo {
            format,
            // Amiga modules rarely carry a duration; the player fades or
            // loops, and the max_seconds cap bounds the session instead.
            duration_ms: None,
            subsong,
            subsong_count: 1,
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
                warn!("UADE player failed on {}: {message}", session.url);
            }
            return ReadReply::finished(format);
        }
        session.delivered_frames += frames as u64;
        session.scope.push_frames(&dest[..frames * channels], channels);
        ReadReply::ok(format, frames)
    }

    fn seek(&mut self, _target_ms: i64) -> Result<u64> {
        // No seek channel exists over the stdout pipe; deterministic for
        // every target, including zero and negative.
        Err(PluginError::SeekUnsupported)
    }

    fn close(&mut self) {
        self.session = None;
    }

    fn metadata(&self, url: &str, services: &Services, sink: &mut dyn MetadataSink) -> Result<()> {
        let data = services.io.read_to_memory(url)?;

        let id = sink.begin(url);
        let family = family_for(url);
        let song_type = match family {
            Some((_, player)) => player,
            None => "Amiga (UADE)",
        };
        sink.set_tag(id, TagKey::SongType, song_type);

        if protracker_magic(&data) {
            match protracker_title(&data) {
                Some(title) => sink.set_tag(id, TagKey::Title, &title),
                None => sink.set_tag(id, TagKey::Title, fallback_title(url, family)),
            }
            for name in protracker_sample_names(&data) {
                sink.add_sample_text(id, &name);
            }
        } else {
            sink.set_tag(id, TagKey::Title, fallback_title(url, family));
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
        if self.session.is_some() {
            vec!["Left".to_string(), "Right".to_string()]
        } else {
            Vec::new()
        }
    }

    fn scope_data(&self, channel: usize, dest: &mut [f32]) -> usize {
        match self.session.as_ref() {
            Some(session) => session.scope.snapshot(channel, dest),
            None => 0,
        }
    }
}

/// `UADE_BASE_DIR`, else `$HOME/.uade`, else the compiled-in default.
fn resolve_base_dir(env_base: Option<String>, home: Option<String>) -> PathBuf {
    if let Some(base) = env_base.filter(|b| !b.is_empty()) {
        return PathBuf::from(base);
    }
    if let Some(home) = home.filter(|h| !h.is_empty()) {
        return PathBuf::from(home).join(".uade");
    }
    PathBuf::from(FALLBACK_BASE_DIR)
}

/// Display title from an Amiga filename: the family prefix or suffix
/// stripped from the base name.
fn fallback_title<'a>(url: &'a str, family: Option<(&'static str, &'static str)>) -> &'a str {
    let base = url.rsplit(['/', '\\']).next().unwrap_or(url);
    match family {
        Some((ext, _)) => strip_amiga_ext(base, ext),
        None => file_stem(url),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chipdeck_plugin::{CollectedMetadata, MemIo, ReadStatus, SettingValue};

    use crate::formats::make_protracker;

    fn memory_io(url: &str, data: Vec<u8>) -> MemIo {
        let mut io = MemIo::new();
        io.insert(url, data);
        io
    }

    #[test]
    fn test_probe_is_never_supported() {
        let mut settings = Settings::new();
        let plugin = UadePlugin::new(&mut settings);
        let module = make_protracker("title", &[]);

        // Even a verified Protracker magic stays Unsure.
        assert_eq!(plugin.probe(&module, "tune.mod", 1084), ProbeResult::Unsure);
        assert_eq!(plugin.probe(&[], "mod.tune", 0), ProbeResult::Unsure);
        assert_eq!(plugin.probe(&[], "tune.ahx", 0), ProbeResult::Unsure);
        assert_eq!(plugin.probe(&module, "tune.mp3", 1084), ProbeResult::Unsupported);
        assert_eq!(plugin.probe(&[], "plain", 0), ProbeResult::Unsupported);
    }

    #[test]
    fn test_base_dir_resolution_order() {
        assert_eq!(
            resolve_base_dir(Some("/opt/uade".into()), Some("/home/x".into())),
            PathBuf::from("/opt/uade")
        );
        assert_eq!(
            resolve_base_dir(None, Some("/home/x".into())),
            PathBuf::from("/home/x/.uade")
        );
        assert_eq!(
            resolve_base_dir(Some(String::new()), None),
            PathBuf::from(FALLBACK_BASE_DIR)
        );
    }

    #[test]
    fn test_seek_unsupported_for_every_target() {
        let mut settings = Settings::new();
        let mut plugin = UadePlugin::new(&mut settings);
        for target in [-100, -1, 0, 1, 60_000] {
            match plugin.seek(target) {
                Err(PluginError::SeekUnsupported) => {}
                other => panic!("expected SeekUnsupported for {target}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_read_without_session_is_error() {
        let mut settings = Settings::new();
        let mut plugin = UadePlugin::new(&mut settings);
        let mut dest = [0.0f32; 16];
        assert_eq!(plugin.read(&mut dest).status, ReadStatus::Error);
    }

    #[test]
    fn test_open_missing_file_is_io_error() {
        let mut settings = Settings::new();
        let mut plugin = UadePlugin::new(&mut settings);
        let io = MemIo::new();
        let services = Services::new(&io, &settings);

        match plugin.open("gone.mod", SubsongRef::Default, &services) {
            Err(PluginError::Io(_)) => {}
            other => panic!("expected Io error, got {:?}", other.map(|i| i.subsong)),
        }
    }

    #[test]
    fn test_metadata_protracker_fields() {
        let mut settings = Settings::new();
        let plugin = UadePlugin::new(&mut settings);
        let data = make_protracker("spacedeb", &["muzak by", "moby", "", "of nova"]);
        let io = memory_io("amiga/spacedeb.mod", data);
        let services = Services::new(&io, &settings);
        let mut sink = CollectedMetadata::new();

        plugin
            .metadata("amiga/spacedeb.mod", &services, &mut sink)
            .unwrap();
        let record = &sink.records()[0];
        assert_eq!(record.title.as_deref(), Some("spacedeb"));
        assert_eq!(record.song_type.as_deref(), Some("Protracker"));
        assert_eq!(record.samples, ["muzak by", "moby", "", "of nova"]);
    }

    #[test]
    fn test_metadata_title_falls_back_to_amiga_stem() {
        let mut settings = Settings::new();
        let plugin = UadePlugin::new(&mut settings);
        // Blank title field in an otherwise valid Protracker header.
        let io = memory_io("amiga/mod.elysium", make_protracker("", &[]));
        let services = Services::new(&io, &settings);
        let mut sink = CollectedMetadata::new();

        plugin
            .metadata("amiga/mod.elysium", &services, &mut sink)
            .unwrap();
        let record = &sink.records()[0];
        assert_eq!(record.title.as_deref(), Some("elysium"));
        assert_eq!(record.song_type.as_deref(), Some("Protracker"));
    }

    #[test]
    fn test_metadata_non_protracker_family() {
        let mut settings = Settings::new();
        let plugin = UadePlugin::new(&mut settings);
        let io = memory_io("tunes/cruisin.ahx", b"THX\0data".to_vec());
        let services = Services::new(&io, &settings);
        let mut sink = CollectedMetadata::new();

        plugin
            .metadata("tunes/cruisin.ahx", &services, &mut sink)
            .unwrap();
        let record = &sink.records()[0];
        assert_eq!(record.title.as_deref(), Some("cruisin"));
        assert_eq!(record.song_type.as_deref(), Some("AHX"));
        assert!(record.samples.is_empty());
    }

    // Sessions below use a stand-in player producing fixed-length silence.
    #[cfg(unix)]
    mod with_fake_player {
        use super::*;

        fn set_player(settings: &mut Settings, program: &str, args: &str) {
            settings
                .set(PROGRAM_KEY, SettingValue::Str(program.to_string()))
                .unwrap();
            settings
                .set(ARGS_KEY, SettingValue::Str(args.to_string()))
                .unwrap();
        }

        #[test]
        fn test_stream_until_player_eof() {
            let mut settings = Settings::new();
            let mut plugin = UadePlugin::new(&mut settings);
            // 1600 bytes of s16le stereo = 400 frames.
            set_player(&mut settings, "head", "-c 1600 /dev/zero");
            let io = memory_io("tune.mod", make_protracker("t", &[]));
            let services = Services::new(&io, &settings);

            let info = plugin.open("tune.mod", SubsongRef::Default, &services).unwrap();
            assert_eq!(info.format, AudioFormat::new(2, 44_100));
            assert_eq!(info.duration_ms, None);
            assert_eq!(info.subsong, 0);

            let mut dest = [0.0f32; 128];
            let mut total_frames = 0usize;
            loop {
                let reply = plugin.read(&mut dest);
                match reply.status {
                    ReadStatus::Ok => total_frames += reply.frames,
                    ReadStatus::Finished => break,
                    ReadStatus::Error => panic!("read error"),
                }
            }
            assert_eq!(total_frames, 400);
            assert_eq!(plugin.read(&mut dest).status, ReadStatus::Finished);
            plugin.close();
            assert_eq!(plugin.read(&mut dest).status, ReadStatus::Error);
        }

        #[test]
        fn test_max_seconds_caps_an_endless_player() {
            let mut settings = Settings::new();
            let mut plugin = UadePlugin::new(&mut settings);
            set_player(&mut settings, "cat", "/dev/zero");
            settings.set(MAX_SECONDS_KEY, SettingValue::Int(1)).unwrap();
            let io = memory_io("loop.med", vec![0u8; 64]);
            let services = Services::new(&io, &settings);

            plugin.open("loop.med", SubsongRef::Index(2), &services).unwrap();
            let mut dest = vec![0.0f32; 8192];
            let mut total_frames = 0u64;
            loop {
                let reply = plugin.read(&mut dest);
                if reply.status != ReadStatus::Ok {
                    break;
                }
                total_frames += reply.frames as u64;
            }
            // Exactly one second of frames despite the endless producer.
            assert_eq!(total_frames, 44_100);
        }

        #[test]
        fn test_sub_frame_destination_is_ok_not_finished() {
            let mut settings = Settings::new();
            let mut plugin = UadePlugin::new(&mut settings);
            set_player(&mut settings, "head", "-c 400 /dev/zero");
            let io = memory_io("tune.mod", make_protracker("t", &[]));
            let services = Services::new(&io, &settings);

            plugin.open("tune.mod", SubsongRef::Default, &services).unwrap();
            // One slot cannot hold a stereo frame: Ok, zero frames, nothing
            // consumed.
            let mut tiny = [0.0f32; 1];
            let reply = plugin.read(&mut tiny);
            assert_eq!(reply.status, ReadStatus::Ok);
            assert_eq!(reply.frames, 0);

            let mut dest = [0.0f32; 256];
            assert_eq!(plugin.read(&mut dest).frames, 100);
            assert_eq!(plugin.read(&mut dest).status, ReadStatus::Finished);
        }

        #[test]
        fn test_reopen_tears_down_prior_session() {
            let mut settings = Settings::new();
            let mut plugin = UadePlugin::new(&mut settings);
            set_player(&mut settings, "head", "-c 400 /dev/zero");
            let io = memory_io("tune.mod", make_protracker("t", &[]));
            let services = Services::new(&io, &settings);

            let first = plugin.open("tune.mod", SubsongRef::Default, &services).unwrap();
            let mut dest = [0.0f32; 64];
            assert_eq!(plugin.read(&mut dest).frames, 32);

            let second = plugin.open("tune.mod", SubsongRef::Default, &services).unwrap();
            assert_eq!(first.format, second.format);
            assert_eq!(first.duration_ms, second.duration_ms);

            // Full 100 frames again: the old session is gone.
            let mut total_frames = 0usize;
            loop {
                let reply = plugin.read(&mut dest);
                if reply.status != ReadStatus::Ok {
                    break;
                }
                total_frames += reply.frames;
            }
            assert_eq!(total_frames, 100);
        }
    }
}
