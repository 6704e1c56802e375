//! Probe classification and filename helpers.
//!
//! Probing is a cheap format-sniffing call over a bounded byte prefix plus
//! the filename. It returns a confidence tier rather than a boolean so that
//! several adapters can claim the same extension and let the host arbitrate:
//! a `Supported` claim (magic matched) always outranks an `Unsure` claim
//! (extension only). Between equal tiers the host's registration order
//! decides; no global priority scheme exists.

/// Confidence tier returned by [`PlaybackPlugin::probe`](crate::PlaybackPlugin::probe).
///
/// Ordering is meaningful: `Supported > Unsure > Unsupported`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum ProbeResult {
    /// The adapter cannot play this file.
    #[default]
    Unsupported,
    /// The extension matches but no reliable magic confirms the format.
    ///
    /// Used by fallback adapters so that dedicated adapters outrank them.
    Unsure,
    /// A format magic matched; the adapter can play this file.
    Supported,
}

impl ProbeResult {
    /// True for `Supported` and `Unsure`.
    pub fn is_candidate(self) -> bool {
        self != ProbeResult::Unsupported
    }
}

/// Case-insensitive match of the filename's final extension.
///
/// `ext` is given without the dot. A filename without any extension never
/// matches.
pub fn ext_matches(filename: &str, ext: &str) -> bool {
    match filename.rsplit_once('.') {
        Some((stem, found)) => !stem.is_empty() && found.eq_ignore_ascii_case(ext),
        None => false,
    }
}

/// Match a filename against one extension in either suffix or Amiga prefix
/// position.
///
/// Amiga collections conventionally name Protracker modules `mod.songname`
/// rather than `songname.mod`; both spellings identify the same family.
pub fn amiga_ext_matches(filename: &str, ext: &str) -> bool {
    if ext_matches(filename, ext) {
        return true;
    }
    let base = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(filename);
    match base.split_once('.') {
        Some((prefix, rest)) => !rest.is_empty() && prefix.eq_ignore_ascii_case(ext),
        None => false,
    }
}

/// Strip a leading `ext.` prefix or trailing `.ext` suffix from a base name.
///
/// Used to derive a display title from Amiga-style filenames.
pub fn strip_amiga_ext<'a>(base: &'a str, ext: &str) -> &'a str {
    if let Some((prefix, rest)) = base.split_once('.') {
        if prefix.eq_ignore_ascii_case(ext) && !rest.is_empty() {
            return rest;
        }
    }
    if let Some((stem, found)) = base.rsplit_once('.') {
        if found.eq_ignore_ascii_case(ext) && !stem.is_empty() {
            return stem;
        }
    }
    base
}

/// Base name of `url` with its final extension removed.
///
/// The usual fallback title when a file carries no tags of its own.
pub fn file_stem(url: &str) -> &str {
    let base = url
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(url);
    match base.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => base,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_ordering() {
        assert!(ProbeResult::Supported > ProbeResult::Unsure);
        assert!(ProbeResult::Unsure > ProbeResult::Unsupported);
        assert_eq!(
            ProbeResult::Supported.max(ProbeResult::Unsure),
            ProbeResult::Supported
        );
    }

    #[test]
    fn test_ext_matches() {
        assert!(ext_matches("song.sap", "sap"));
        assert!(ext_matches("SONG.SAP", "sap"));
        assert!(ext_matches("dir.with.dots/song.flac", "flac"));
        assert!(!ext_matches("song.sap", "flac"));
        assert!(!ext_matches("sap", "sap"));
        assert!(!ext_matches(".sap", "sap"));
    }

    #[test]
    fn test_amiga_prefix() {
        assert!(amiga_ext_matches("mod.blue_monday", "mod"));
        assert!(amiga_ext_matches("blue_monday.mod", "mod"));
        assert!(amiga_ext_matches("music/MOD.intro", "mod"));
        assert!(!amiga_ext_matches("model.txt", "mod"));
        assert!(!amiga_ext_matches("mod.", "mod"));
    }

    #[test]
    fn test_strip_amiga_ext() {
        assert_eq!(strip_amiga_ext("mod.blue_monday", "mod"), "blue_monday");
        assert_eq!(strip_amiga_ext("blue_monday.mod", "mod"), "blue_monday");
        assert_eq!(strip_amiga_ext("plain", "mod"), "plain");
    }

    #[test]
    fn test_file_stem() {
        assert_eq!(file_stem("music/tunes/song.flac"), "song");
        assert_eq!(file_stem("C:\\tunes\\song.sap"), "song");
        assert_eq!(file_stem("song"), "song");
        assert_eq!(file_stem(".hidden"), ".hidden");
        assert_eq!(file_stem("dir.v2/noext"), "noext");
    }
}
