//! Container detection for the streaming formats.

use chipdeck_plugin::formats::looks_like_mp3_frame;
use chipdeck_plugin::probe::ext_matches;

/// One of the stream container families this adapter plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    /// RIFF WAVE.
    Wav,
    /// AIFF or AIFF-C.
    Aiff,
    /// Native FLAC.
    Flac,
    /// Ogg Vorbis.
    Vorbis,
    /// MPEG layer III, bare or with an ID3v2 header.
    Mp3,
}

impl StreamKind {
    /// Display name used for the song-type tag.
    pub fn name(&self) -> &'static str {
        match self {
            StreamKind::Wav => "WAV",
            StreamKind::Aiff => "AIFF",
            StreamKind::Flac => "FLAC",
            StreamKind::Vorbis => "Ogg Vorbis",
            StreamKind::Mp3 => "MP3",
        }
    }

    /// Whether `filename` carries one of this kind's extensions.
    pub fn matches_extension(&self, filename: &str) -> bool {
        let exts: &[&str] = match self {
            StreamKind::Wav => &["wav", "wave"],
            StreamKind::Aiff => &["aif", "aiff", "aifc"],
            StreamKind::Flac => &["flac"],
            StreamKind::Vorbis => &["ogg", "oga"],
            StreamKind::Mp3 => &["mp3"],
        };
        exts.iter().any(|ext| ext_matches(filename, ext))
    }
}

/// All kinds, in probe order.
pub const ALL_KINDS: [StreamKind; 5] = [
    StreamKind::Wav,
    StreamKind::Aiff,
    StreamKind::Flac,
    StreamKind::Vorbis,
    StreamKind::Mp3,
];

/// Detect a stream container from a byte prefix.
///
/// Safe on any prefix length; the MP3 frame-sync heuristic runs last since
/// it is the weakest signature.
pub fn detect(prefix: &[u8]) -> Option<StreamKind> {
    if prefix.len() >= 12 && prefix.starts_with(b"RIFF") && &prefix[8..12] == b"WAVE" {
        return Some(StreamKind::Wav);
    }
    if prefix.len() >= 12
        && prefix.starts_with(b"FORM")
        && (&prefix[8..12] == b"AIFF" || &prefix[8..12] == b"AIFC")
    {
        return Some(StreamKind::Aiff);
    }
    if prefix.starts_with(b"fLaC") {
        return Some(StreamKind::Flac);
    }
    if prefix.starts_with(b"OggS") {
        return Some(StreamKind::Vorbis);
    }
    if prefix.starts_with(b"ID3") {
        return Some(StreamKind::Mp3);
    }
    if prefix.len() >= 3 && looks_like_mp3_frame(prefix[0], prefix[1], prefix[2]) {
        return Some(StreamKind::Mp3);
    }
    None
}
