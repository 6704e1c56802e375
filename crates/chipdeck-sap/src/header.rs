//! SAP (Slight Atari Player) header parsing.
//!
//! A SAP file is a text header followed by Atari 8-bit binary data:
//!
//! ```text
//! Offset  Size  Description
//! ------  ----  -----------
//! 0       5     "SAP\r\n" signature
//! 5       ~     CRLF-terminated tag lines (NAME, AUTHOR, SONGS, TIME, ...)
//! ~       2     0xFF 0xFF binary marker (Atari DOS executable header)
//! ~       ~     6502 player/music binary
//! ```
//!
//! Only the text header is interpreted here; the binary part is played by an
//! external SAP player program and passes through untouched. Unknown tags are
//! skipped so files written by newer rippers still open.

use chipdeck_plugin::{PluginError, Result};

/// One `TIME` entry: subsong duration plus loop marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SapTime {
    /// Duration in milliseconds.
    pub millis: u64,
    /// Whether the `LOOP` suffix was present (the tune repeats past the
    /// stated duration).
    pub loops: bool,
}

/// Parsed SAP text header.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SapHeader {
    /// `NAME` tag, unquoted.
    pub name: Option<String>,
    /// `AUTHOR` tag, unquoted.
    pub author: Option<String>,
    /// `DATE` tag, unquoted.
    pub date: Option<String>,
    /// Number of subsongs (`SONGS`), at least 1.
    pub songs: u32,
    /// 0-based default subsong (`DEFSONG`), always `< songs`.
    pub default_song: u32,
    /// Player type letter (`TYPE B`, `TYPE C`, ...).
    pub sap_type: Option<char>,
    /// `STEREO` flag: dual-POKEY output.
    pub stereo: bool,
    /// `NTSC` flag: 60 Hz timing instead of PAL 50 Hz.
    pub ntsc: bool,
    /// `FASTPLAY` scanlines-per-call override.
    pub fastplay: Option<u32>,
    /// `INIT` routine address.
    pub init_addr: Option<u16>,
    /// `PLAYER` routine address.
    pub player_addr: Option<u16>,
    /// `MUSIC` data address.
    pub music_addr: Option<u16>,
    /// `COVOX` DAC address.
    pub covox_addr: Option<u16>,
    /// Per-subsong durations (`TIME`), in subsong order. May be shorter than
    /// `songs` when the ripper only timed some of them.
    pub times: Vec<SapTime>,
    /// Byte offset of the binary part, just past the 0xFF 0xFF marker.
    pub binary_offset: usize,
}

impl SapHeader {
    /// Parse the text header of `data`.
    ///
    /// Fails when the signature is absent, a known tag carries a malformed
    /// value, or the 0xFF 0xFF binary marker never appears.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if !data.starts_with(b"SAP\r\n") {
            return Err(PluginError::parse("SAP", "missing SAP signature"));
        }

        let mut header = SapHeader::default();
        let mut pos = 5;
        let mut binary_found = false;

        while pos < data.len() {
            if data[pos] == 0xFF {
                if data.get(pos + 1) == Some(&0xFF) {
                    header.binary_offset = pos + 2;
                    binary_found = true;
                }
                break;
            }
            let end = data[pos..]
                .iter()
                .position(|&b| b == b'\n')
                .map(|n| pos + n)
                .unwrap_or(data.len());
            let line = String::from_utf8_lossy(&data[pos..end]);
            let line = line.trim_end_matches('\r').trim();
            if !line.is_empty() {
                header.apply_line(line)?;
            }
            pos = end + 1;
        }

        if !binary_found {
            return Err(PluginError::parse("SAP", "missing binary part"));
        }

        header.songs = header.songs.max(1);
        header.default_song = header.default_song.min(header.songs - 1);
        Ok(header)
    }

    /// Duration entry for `subsong`, when the header carries one.
    pub fn time_for(&self, subsong: u32) -> Option<&SapTime> {
        self.times.get(subsong as usize)
    }

    fn apply_line(&mut self, line: &str) -> Result<()> {
        let (tag, rest) = match line.split_once(char::is_whitespace) {
            Some((tag, rest)) => (tag, rest.trim()),
            None => (line, ""),
        };

        match tag {
            "NAME" => self.name = unquote(rest),
            "AUTHOR" => self.author = unquote(rest),
            "DATE" => self.date = unquote(rest),
            "SONGS" => self.songs = parse_decimal(tag, rest)?,
            "DEFSONG" => self.default_song = parse_decimal(tag, rest)?,
            "FASTPLAY" => self.fastplay = Some(parse_decimal(tag, rest)?),
            "TYPE" => self.sap_type = rest.chars().next(),
            "STEREO" => self.stereo = true,
            "NTSC" => self.ntsc = true,
            "INIT" => self.init_addr = Some(parse_hex(tag, rest)?),
            "PLAYER" => self.player_addr = Some(parse_hex(tag, rest)?),
            "MUSIC" => self.music_addr = Some(parse_hex(tag, rest)?),
            "COVOX" => self.covox_addr = Some(parse_hex(tag, rest)?),
            "TIME" => self.times.push(parse_time_field(rest)?),
            // Tags from newer SAP revisions pass through unparsed.
            _ => {}
        }
        Ok(())
    }
}

/// Strip the surrounding double quotes of a string tag value.
fn unquote(raw: &str) -> Option<String> {
    let inner = raw
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(raw)
        .trim();
    (!inner.is_empty()).then(|| inner.to_string())
}

fn parse_decimal(tag: &str, value: &str) -> Result<u32> {
    value
        .parse()
        .map_err(|_| PluginError::parse("SAP", format!("bad {tag} value {value:?}")))
}

fn parse_hex(tag: &str, value: &str) -> Result<u16> {
    u16::from_str_radix(value, 16)
        .map_err(|_| PluginError::parse("SAP", format!("bad {tag} address {value:?}")))
}

/// Parse a `TIME` value: `mm:ss[.mmm]` with an optional `LOOP` suffix.
fn parse_time_field(raw: &str) -> Result<SapTime> {
    let mut tokens = raw.split_whitespace();
    let stamp = tokens
        .next()
        .ok_or_else(|| PluginError::parse("SAP", "empty TIME value"))?;
    let loops = tokens
        .next()
        .is_some_and(|t| t.eq_ignore_ascii_case("LOOP"));

    let (minutes, rest) = stamp
        .split_once(':')
        .ok_or_else(|| PluginError::parse("SAP", format!("bad TIME value {raw:?}")))?;
    let (seconds, fraction) = match rest.split_once('.') {
        Some((secs, frac)) => (secs, frac),
        None => (rest, ""),
    };

    let minutes: u64 = parse_decimal("TIME", minutes)?.into();
    let seconds: u64 = parse_decimal("TIME", seconds)?.into();
    // "5" means 500 ms: right-pad the fraction to millisecond precision.
    let millis_frac: u64 = if fraction.is_empty() {
        0
    } else {
        let frac = &fraction[..fraction.len().min(3)];
        parse_decimal("TIME", &format!("{frac:0<3}"))?.into()
    };

    Ok(SapTime {
        millis: (minutes * 60 + seconds) * 1000 + millis_frac,
        loops,
    })
}

/// Build a SAP file from header lines plus a binary payload.
#[cfg(test)]
pub(crate) fn make_sap(tags: &[&str], binary: &[u8]) -> Vec<u8> {
    let mut data = b"SAP\r\n".to_vec();
    for tag in tags {
        data.extend_from_slice(tag.as_bytes());
        data.extend_from_slice(b"\r\n");
    }
    data.extend_from_slice(&[0xFF, 0xFF]);
    data.extend_from_slice(binary);
    data
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_full_tag_set() {
        let data = make_sap(
            &[
                "AUTHOR \"Random Composer\"",
                "NAME \"Main Theme\"",
                "DATE \"1993\"",
                "SONGS 3",
                "DEFSONG 1",
                "TYPE B",
                "STEREO",
                "FASTPLAY 156",
                "INIT 2000",
                "PLAYER 2400",
                "TIME 1:30.500",
                "TIME 0:05",
                "TIME 2:10.5 LOOP",
            ],
            &[0x00, 0x20, 0xFF, 0x20],
        );

        let header = SapHeader::parse(&data).unwrap();
        assert_eq!(header.name.as_deref(), Some("Main Theme"));
        assert_eq!(header.author.as_deref(), Some("Random Composer"));
        assert_eq!(header.date.as_deref(), Some("1993"));
        assert_eq!(header.songs, 3);
        assert_eq!(header.default_song, 1);
        assert_eq!(header.sap_type, Some('B'));
        assert!(header.stereo);
        assert!(!header.ntsc);
        assert_eq!(header.fastplay, Some(156));
        assert_eq!(header.init_addr, Some(0x2000));
        assert_eq!(header.player_addr, Some(0x2400));
        assert_eq!(
            header.times,
            vec![
                SapTime {
                    millis: 90_500,
                    loops: false
                },
                SapTime {
                    millis: 5_000,
                    loops: false
                },
                SapTime {
                    millis: 130_500,
                    loops: true
                },
            ]
        );
        assert_eq!(&data[header.binary_offset..], &[0x00, 0x20, 0xFF, 0x20]);
    }

    #[test]
    fn test_defaults_to_one_song() {
        let header = SapHeader::parse(&make_sap(&["TYPE C"], &[0x00])).unwrap();
        assert_eq!(header.songs, 1);
        assert_eq!(header.default_song, 0);
        assert!(header.time_for(0).is_none());
    }

    #[test]
    fn test_clamps_defsong_into_range() {
        let header = SapHeader::parse(&make_sap(&["SONGS 2", "DEFSONG 9"], &[])).unwrap();
        assert_eq!(header.default_song, 1);
    }

    #[test]
    fn test_rejects_missing_signature() {
        assert!(SapHeader::parse(b"RIFF\x00\x00").is_err());
        assert!(SapHeader::parse(b"").is_err());
    }

    #[test]
    fn test_rejects_missing_binary_marker() {
        let mut data = b"SAP\r\n".to_vec();
        data.extend_from_slice(b"SONGS 1\r\n");
        let err = SapHeader::parse(&data).unwrap_err();
        assert!(err.to_string().contains("missing binary part"));
    }

    #[test]
    fn test_rejects_bad_numeric_value() {
        assert!(SapHeader::parse(&make_sap(&["SONGS many"], &[])).is_err());
        assert!(SapHeader::parse(&make_sap(&["INIT xyzw"], &[])).is_err());
        assert!(SapHeader::parse(&make_sap(&["TIME soon"], &[])).is_err());
    }

    #[test]
    fn test_tolerates_unknown_tags() {
        let data = make_sap(&["RIPPER \"someone\"", "SONGS 2"], &[0x01]);
        let header = SapHeader::parse(&data).unwrap();
        assert_eq!(header.songs, 2);
    }

    #[test]
    fn test_unquoted_string_values() {
        let header = SapHeader::parse(&make_sap(&["NAME Bare Words"], &[])).unwrap();
        assert_eq!(header.name.as_deref(), Some("Bare Words"));
    }

    #[test]
    fn test_time_fraction_padding() {
        // ".5" is half a second, ".55" is 550 ms, ".5555" truncates to 555 ms.
        let t = |s: &str| parse_time_field(s).unwrap().millis;
        assert_eq!(t("0:01.5"), 1_500);
        assert_eq!(t("0:01.55"), 1_550);
        assert_eq!(t("0:01.5555"), 1_555);
    }
}
