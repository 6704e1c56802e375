//! Signature catalog for the format families the deck knows about.
//!
//! Used by probe implementations and by the scanner to label files no
//! adapter claimed. Identification works on a bounded prefix and never
//! indexes past what it was given.
//!
//! Signature layout notes:
//! - SAP: ASCII `SAP` followed by CR at offset 0
//! - FLAC: `fLaC` at offset 0
//! - Ogg: `OggS` capture pattern at offset 0
//! - WAV: `RIFF` at 0 and `WAVE` at 8
//! - AIFF: `FORM` at 0 and `AIFF`/`AIFC` at 8
//! - MP3: `ID3` at 0, or a plausible MPEG audio frame sync
//! - Protracker: `M.K.` family at offset 1080
//! - YM: `YM3!`/`YM5!`/`YM6!` at offset 0

use crate::probe::ext_matches;

/// A format family identified from file content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KnownFormat {
    /// Atari 8-bit Slight Atari Player.
    Sap,
    /// Free Lossless Audio Codec.
    Flac,
    /// Ogg Vorbis.
    Vorbis,
    /// RIFF WAVE.
    Wav,
    /// Audio Interchange File Format.
    Aiff,
    /// MPEG audio layer III.
    Mp3,
    /// iXalance module.
    Ixalance,
    /// MSX KSS sound rip.
    Kss,
    /// MSX MGSDRV module.
    Mgs,
    /// MatsPack module.
    Mpk,
    /// PC-98 Professional Music Driver.
    Pmd,
    /// SunVox project.
    SunVox,
    /// Atari ST YM register dump.
    Ym,
    /// Amiga Protracker module.
    Protracker,
}

impl KnownFormat {
    /// Human-readable family name.
    pub fn name(&self) -> &'static str {
        match self {
            KnownFormat::Sap => "SAP",
            KnownFormat::Flac => "FLAC",
            KnownFormat::Vorbis => "Ogg Vorbis",
            KnownFormat::Wav => "WAV",
            KnownFormat::Aiff => "AIFF",
            KnownFormat::Mp3 => "MP3",
            KnownFormat::Ixalance => "iXalance",
            KnownFormat::Kss => "KSS",
            KnownFormat::Mgs => "MGSDRV",
            KnownFormat::Mpk => "MatsPack",
            KnownFormat::Pmd => "PMD",
            KnownFormat::SunVox => "SunVox",
            KnownFormat::Ym => "YM",
            KnownFormat::Protracker => "Protracker",
        }
    }
}

/// Protracker channel-layout magics, all at offset 1080.
pub const PROTRACKER_MAGICS: [&[u8; 4]; 7] = [
    b"M.K.", b"M!K!", b"4CHN", b"6CHN", b"8CHN", b"FLT4", b"FLT8",
];

/// Identify the format family of `prefix`, using `filename` only to break
/// ties for signatures too weak to stand alone.
///
/// Safe on any prefix length, including empty.
pub fn identify(prefix: &[u8], filename: &str) -> Option<KnownFormat> {
    if prefix.starts_with(b"SAP\r") {
        return Some(KnownFormat::Sap);
    }
    if prefix.starts_with(b"fLaC") {
        return Some(KnownFormat::Flac);
    }
    if prefix.starts_with(b"OggS") {
        return Some(KnownFormat::Vorbis);
    }
    if prefix.len() >= 12 && prefix.starts_with(b"RIFF") && &prefix[8..12] == b"WAVE" {
        return Some(KnownFormat::Wav);
    }
    if prefix.len() >= 12
        && prefix.starts_with(b"FORM")
        && (&prefix[8..12] == b"AIFF" || &prefix[8..12] == b"AIFC")
    {
        return Some(KnownFormat::Aiff);
    }
    if prefix.starts_with(b"IXS!") {
        return Some(KnownFormat::Ixalance);
    }
    if prefix.starts_with(b"KSCC") || prefix.starts_with(b"KSSX") {
        return Some(KnownFormat::Kss);
    }
    if prefix.starts_with(b"MGS") {
        return Some(KnownFormat::Mgs);
    }
    if prefix.starts_with(b"MPK") {
        return Some(KnownFormat::Mpk);
    }
    if prefix.starts_with(b"SVOX") {
        return Some(KnownFormat::SunVox);
    }
    if prefix.starts_with(b"YM3!") || prefix.starts_with(b"YM5!") || prefix.starts_with(b"YM6!") {
        return Some(KnownFormat::Ym);
    }
    if prefix.len() >= 1084 {
        let magic = &prefix[1080..1084];
        if PROTRACKER_MAGICS.iter().any(|m| &magic == m) {
            return Some(KnownFormat::Protracker);
        }
    }
    // PMD has no magic; byte 1 selects the driver variant.
    if prefix.len() >= 2
        && (prefix[1] == 0x18 || prefix[1] == 0x1A)
        && ext_matches(filename, "m")
    {
        return Some(KnownFormat::Pmd);
    }
    if prefix.starts_with(b"ID3") {
        return Some(KnownFormat::Mp3);
    }
    if prefix.len() >= 3 && looks_like_mp3_frame(prefix[0], prefix[1], prefix[2]) {
        return Some(KnownFormat::Mp3);
    }
    None
}

/// Sanity-check the first three bytes of a would-be MPEG audio frame.
///
/// Rejects the reserved version, reserved layer, invalid bitrate and
/// invalid sample-rate encodings, which filters most false syncs out of
/// arbitrary binary data.
pub fn looks_like_mp3_frame(b0: u8, b1: u8, b2: u8) -> bool {
    if b0 != 0xFF || b1 & 0xE0 != 0xE0 {
        return false;
    }
    if (b1 >> 3) & 0x03 == 0x01 {
        return false;
    }
    if (b1 >> 1) & 0x03 == 0x00 {
        return false;
    }
    if b2 >> 4 == 0x0F {
        return false;
    }
    if (b2 >> 2) & 0x03 == 0x03 {
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identify_simple_magics() {
        assert_eq!(identify(b"SAP\r\nAUTHOR", "x.sap"), Some(KnownFormat::Sap));
        assert_eq!(identify(b"fLaC\x00\x00", "x.flac"), Some(KnownFormat::Flac));
        assert_eq!(identify(b"OggS\x00", "x.ogg"), Some(KnownFormat::Vorbis));
        assert_eq!(identify(b"YM6!LeOnArD!", "x.ym"), Some(KnownFormat::Ym));
        assert_eq!(identify(b"KSSX\x10", "x.kss"), Some(KnownFormat::Kss));
        assert_eq!(identify(b"KSCC\x10", "x.kss"), Some(KnownFormat::Kss));
        assert_eq!(identify(b"SVOX\x00", "x.sunvox"), Some(KnownFormat::SunVox));
        assert_eq!(identify(b"IXS!", "x.ixs"), Some(KnownFormat::Ixalance));
        assert_eq!(identify(b"MGS3", "x.mgs"), Some(KnownFormat::Mgs));
        assert_eq!(identify(b"MPK\x01", "x.mpk"), Some(KnownFormat::Mpk));
    }

    #[test]
    fn test_identify_container_magics() {
        assert_eq!(
            identify(b"RIFF\x24\x08\x00\x00WAVEfmt ", "x.wav"),
            Some(KnownFormat::Wav)
        );
        assert_eq!(
            identify(b"FORM\x00\x00\x08\x24AIFFCOMM", "x.aiff"),
            Some(KnownFormat::Aiff)
        );
        // Truncated before the form type stays unidentified.
        assert_eq!(identify(b"RIFF\x24\x08", "x.wav"), None);
    }

    #[test]
    fn test_identify_protracker_offset() {
        let mut data = vec![0u8; 1084];
        data[1080..1084].copy_from_slice(b"M.K.");
        assert_eq!(identify(&data, "song.mod"), Some(KnownFormat::Protracker));

        // Same bytes but short of the magic offset.
        assert_eq!(identify(&data[..1080], "song.mod"), None);
    }

    #[test]
    fn test_identify_mp3() {
        assert_eq!(identify(b"ID3\x04\x00", "x.mp3"), Some(KnownFormat::Mp3));
        // 0xFF 0xFB = MPEG1 layer III; 0x90 = 128 kbit, 44.1 kHz.
        assert_eq!(identify(&[0xFF, 0xFB, 0x90, 0x00], "x.mp3"), Some(KnownFormat::Mp3));
    }

    #[test]
    fn test_mp3_frame_sync_rejects_bad_fields() {
        assert!(looks_like_mp3_frame(0xFF, 0xFB, 0x90));
        // No sync.
        assert!(!looks_like_mp3_frame(0xFE, 0xFB, 0x90));
        // Reserved version.
        assert!(!looks_like_mp3_frame(0xFF, 0xEB, 0x90));
        // Reserved layer.
        assert!(!looks_like_mp3_frame(0xFF, 0xF9, 0x90));
        // Invalid bitrate.
        assert!(!looks_like_mp3_frame(0xFF, 0xFB, 0xF0));
        // Invalid sample rate.
        assert!(!looks_like_mp3_frame(0xFF, 0xFB, 0x9C));
    }

    #[test]
    fn test_identify_pmd_needs_extension() {
        let data = [0x00, 0x18, 0x00, 0x00];
        assert_eq!(identify(&data, "tune.m"), Some(KnownFormat::Pmd));
        assert_eq!(identify(&data, "tune.bin"), None);
    }

    #[test]
    fn test_identify_empty_and_tiny() {
        assert_eq!(identify(&[], "x.sap"), None);
        assert_eq!(identify(&[0x53], "x.sap"), None);
    }
}
