//! Extension table and Protracker structures for the UADE-hosted families.
//!
//! UADE plays hundreds of Amiga formats; this table lists the common ones a
//! probe should claim. Protracker gets special handling because its fixed
//! header layout carries real metadata:
//!
//! ```text
//! Offset  Size  Description
//! ------  ----  -----------
//! 0       20    Song title, NUL-padded Latin-1
//! 20      30×31 Sample records (22-byte name + length/finetune/volume/loop)
//! 950     1     Song length in order-table positions
//! 952     128   Pattern order table
//! 1080    4     Channel-layout magic ("M.K.", "4CHN", ...)
//! ```

use chipdeck_plugin::formats::PROTRACKER_MAGICS;
use chipdeck_plugin::probe::amiga_ext_matches;

/// Extension → player name, for probing and the SongType tag.
pub(crate) const UADE_EXTENSIONS: [(&str, &str); 16] = [
    ("mod", "Protracker"),
    ("med", "OctaMED"),
    ("ahx", "AHX"),
    ("hip", "Jochen Hippel"),
    ("hipc", "Hippel-COSO"),
    ("okt", "Oktalyzer"),
    ("sfx", "SoundFX"),
    ("digi", "DIGI Booster"),
    ("emod", "Quadra Composer"),
    ("cust", "Custom"),
    ("aon", "Art Of Noise"),
    ("fc13", "Future Composer 1.3"),
    ("fc14", "Future Composer 1.4"),
    ("bp", "SoundMon"),
    ("dw", "David Whittaker"),
    ("gmc", "GMC"),
];

/// Matching `(extension, player name)` row for `filename`, honoring both
/// `song.mod` and Amiga `mod.song` spellings.
pub(crate) fn family_for(filename: &str) -> Option<(&'static str, &'static str)> {
    UADE_EXTENSIONS
        .iter()
        .copied()
        .find(|(ext, _)| amiga_ext_matches(filename, ext))
}

/// Whether `data` carries a Protracker channel-layout magic at offset 1080.
pub(crate) fn protracker_magic(data: &[u8]) -> bool {
    if data.len() < 1084 {
        return false;
    }
    let magic = &data[1080..1084];
    PROTRACKER_MAGICS.iter().any(|m| &magic == m)
}

/// Song title from the Protracker 20-byte header field, `None` when blank.
pub(crate) fn protracker_title(data: &[u8]) -> Option<String> {
    let title = latin1_field(data.get(..20)?);
    (!title.is_empty()).then_some(title)
}

/// The 31 sample names, trailing blanks dropped.
///
/// Kept in file order with interior blanks intact: rippers traditionally
/// write scroll-text messages across consecutive sample slots.
pub(crate) fn protracker_sample_names(data: &[u8]) -> Vec<String> {
    let mut names = Vec::new();
    for index in 0..31 {
        let start = 20 + index * 30;
        let Some(record) = data.get(start..start + 30) else {
            break;
        };
        names.push(latin1_field(&record[..22]));
    }
    while names.last().is_some_and(|name| name.is_empty()) {
        names.pop();
    }
    names
}

/// NUL-terminated Latin-1 field to trimmed text.
fn latin1_field(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    let text: String = bytes[..end].iter().map(|&b| b as char).collect();
    text.trim().to_string()
}

#[cfg(test)]
pub(crate) fn make_protracker(title: &str, samples: &[&str]) -> Vec<u8> {
    let mut data = vec![0u8; 1084];
    data[..title.len()].copy_from_slice(title.as_bytes());
    for (index, name) in samples.iter().enumerate() {
        let start = 20 + index * 30;
        data[start..start + name.len()].copy_from_slice(name.as_bytes());
    }
    data[1080..1084].copy_from_slice(b"M.K.");
    data
}
