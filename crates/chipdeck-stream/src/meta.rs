//! Tag and length extraction for the stream formats.
//!
//! Each container keeps its tags somewhere else: RIFF `LIST`/`INFO`
//! subchunks for WAV, `NAME`/`AUTH`/`ANNO` text chunks for AIFF, Vorbis
//! comments for FLAC and Ogg, ID3v2 frames for MP3. All of them are mapped
//! onto the shared tag vocabulary here; when a file names no title, the
//! filename stem stands in.

use log::debug;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::{MetadataOptions, StandardTagKey, Tag};
use symphonia::core::probe::Hint;

use chipdeck_plugin::probe::file_stem;
use chipdeck_plugin::{
    MetadataSink, PluginError, Result, Services, TagKey, PROBE_PREFIX_LEN,
};

use crate::decoder::aiff::{parse_comm, IffChunks};
use crate::decoder::SharedBytes;
use crate::detect::{detect, StreamKind, ALL_KINDS};

/// Tags and length pulled out of one file.
struct Extracted {
    tags: Vec<(TagKey, String)>,
    length_seconds: Option<f64>,
}

/// Load `url`, identify its container and feed everything found to `sink`.
pub(crate) fn extract(url: &str, services: &Services, sink: &mut dyn MetadataSink) -> Result<()> {
    let data = services.io.read_to_memory(url)?;
    let kind = detect(&data[..data.len().min(PROBE_PREFIX_LEN)])
        .or_else(|| ALL_KINDS.iter().copied().find(|k| k.matches_extension(url)))
        .ok_or_else(|| PluginError::parse("stream", "unrecognized container"))?;
    let bytes = SharedBytes::new(data);

    let extracted = match kind {
        StreamKind::Wav => wav_metadata(&bytes)?,
        StreamKind::Aiff => aiff_metadata(&bytes)?,
        StreamKind::Flac => flac_metadata(&bytes)?,
        StreamKind::Vorbis => vorbis_metadata(&bytes)?,
        StreamKind::Mp3 => mp3_metadata(&bytes)?,
    };
    debug!(
        "{url}: {} tags, length {:?} s",
        extracted.tags.len(),
        extracted.length_seconds
    );

    let id = sink.begin(url);
    sink.set_tag(id, TagKey::SongType, kind.name());
    let mut has_title = false;
    for (key, value) in &extracted.tags {
        has_title |= *key == TagKey::Title;
        sink.set_tag(id, *key, value);
    }
    if !has_title {
        sink.set_tag(id, TagKey::Title, file_stem(url));
    }
    if let Some(seconds) = extracted.length_seconds {
        sink.set_tag_f64(id, TagKey::LengthSeconds, seconds);
    }
    Ok(())
}

/// First occurrence of a key wins; empty values are dropped.
fn push_tag(tags: &mut Vec<(TagKey, String)>, key: TagKey, value: String) {
    let value = value.trim().to_string();
    if value.is_empty() || tags.iter().any(|(existing, _)| *existing == key) {
        return;
    }
    tags.push((key, value));
}

/// NUL-terminated Latin-1 text, trimmed.
fn chunk_text(raw: &[u8]) -> String {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    raw[..end]
        .iter()
        .map(|&b| b as char)
        .collect::<String>()
        .trim()
        .to_string()
}

fn wav_metadata(bytes: &SharedBytes) -> Result<Extracted> {
    let reader = hound::WavReader::new(bytes.cursor())
        .map_err(|e| PluginError::parse("WAV", e.to_string()))?;
    let spec = reader.spec();
    let length_seconds = (spec.sample_rate > 0)
        .then(|| reader.duration() as f64 / spec.sample_rate as f64);

    let mut tags = Vec::new();
    collect_riff_info(bytes.as_slice(), &mut tags);
    Ok(Extracted {
        tags,
        length_seconds,
    })
}

/// Walk top-level RIFF chunks looking for a `LIST`/`INFO` block.
fn collect_riff_info(data: &[u8], tags: &mut Vec<(TagKey, String)>) {
    if data.len() < 12 {
        return;
    }
    let mut pos = 12;
    while pos + 8 <= data.len() {
        let id = &data[pos..pos + 4];
        let size = u32::from_le_bytes([data[pos + 4], data[pos + 5], data[pos + 6], data[pos + 7]])
            as usize;
        let start = pos + 8;
        let end = start.saturating_add(size).min(data.len());
        if id == b"LIST" && end.saturating_sub(start) >= 4 && &data[start..start + 4] == b"INFO" {
            collect_info_entries(&data[start + 4..end], tags);
        }
        pos = start.saturating_add(size).saturating_add(size & 1);
    }
}

fn collect_info_entries(data: &[u8], tags: &mut Vec<(TagKey, String)>) {
    let mut pos = 0;
    while pos + 8 <= data.len() {
        let id = &data[pos..pos + 4];
        let size = u32::from_le_bytes([data[pos + 4], data[pos + 5], data[pos + 6], data[pos + 7]])
            as usize;
        let start = pos + 8;
        let end = start.saturating_add(size).min(data.len());
        let key = match id {
            b"INAM" => Some(TagKey::Title),
            b"IART" => Some(TagKey::Artist),
            b"IPRD" => Some(TagKey::Album),
            b"ICRD" => Some(TagKey::Date),
            b"IGNR" => Some(TagKey::Genre),
            b"ISFT" => Some(TagKey::AuthoringTool),
            b"ICMT" => Some(TagKey::Message),
            _ => None,
        };
        if let Some(key) = key {
            push_tag(tags, key, chunk_text(&data[start..end]));
        }
        pos = start.saturating_add(size).saturating_add(size & 1);
    }
}

fn aiff_metadata(bytes: &SharedBytes) -> Result<Extracted> {
    let (chunks, form_type) = IffChunks::new(bytes.as_slice())?;
    if &form_type != b"AIFF" && &form_type != b"AIFC" {
        return Err(PluginError::parse("AIFF", "not an AIFF form"));
    }

    let mut tags = Vec::new();
    let mut length_seconds = None;
    for (id, _, payload) in chunks {
        match &id {
            b"NAME" => push_tag(&mut tags, TagKey::Title, chunk_text(payload)),
            b"AUTH" => push_tag(&mut tags, TagKey::Artist, chunk_text(payload)),
            b"ANNO" => push_tag(&mut tags, TagKey::Message, chunk_text(payload)),
            b"COMM" => {
                let comm = parse_comm(payload, &form_type == b"AIFC")?;
                if comm.rate >= 1.0 {
                    length_seconds = Some(comm.frames as f64 / comm.rate);
                }
            }
            _ => {}
        }
    }
    Ok(Extracted {
        tags,
        length_seconds,
    })
}

fn flac_metadata(bytes: &SharedBytes) -> Result<Extracted> {
    let reader = claxon::FlacReader::new(bytes.cursor())
        .map_err(|e| PluginError::parse("FLAC", e.to_string()))?;
    let info = reader.streaminfo();
    let length_seconds = info
        .samples
        .filter(|_| info.sample_rate > 0)
        .map(|frames| frames as f64 / info.sample_rate as f64);

    let mut tags = Vec::new();
    for (name, value) in reader.tags() {
        push_vorbis_comment(&mut tags, name, value);
    }
    Ok(Extracted {
        tags,
        length_seconds,
    })
}

fn vorbis_metadata(bytes: &SharedBytes) -> Result<Extracted> {
    let reader = lewton::inside_ogg::OggStreamReader::new(bytes.cursor())
        .map_err(|e| PluginError::parse("Ogg Vorbis", e.to_string()))?;

    let mut tags = Vec::new();
    for (name, value) in &reader.comment_hdr.comment_list {
        push_vorbis_comment(&mut tags, name, value);
    }
    push_tag(
        &mut tags,
        TagKey::AuthoringTool,
        reader.comment_hdr.vendor.clone(),
    );
    Ok(Extracted {
        tags,
        length_seconds: None,
    })
}

/// Map one Vorbis comment (FLAC and Ogg share the scheme) onto the tag
/// vocabulary.
fn push_vorbis_comment(tags: &mut Vec<(TagKey, String)>, name: &str, value: &str) {
    let key = if name.eq_ignore_ascii_case("TITLE") {
        TagKey::Title
    } else if name.eq_ignore_ascii_case("ARTIST") {
        TagKey::Artist
    } else if name.eq_ignore_ascii_case("ALBUM") {
        TagKey::Album
    } else if name.eq_ignore_ascii_case("DATE") {
        TagKey::Date
    } else if name.eq_ignore_ascii_case("GENRE") {
        TagKey::Genre
    } else if name.eq_ignore_ascii_case("ENCODER") {
        TagKey::AuthoringTool
    } else if name.eq_ignore_ascii_case("COMMENT") || name.eq_ignore_ascii_case("DESCRIPTION") {
        TagKey::Message
    } else {
        return;
    };
    push_tag(tags, key, value.to_string());
}

fn mp3_metadata(bytes: &SharedBytes) -> Result<Extracted> {
    let mss = MediaSourceStream::new(Box::new(bytes.cursor()), Default::default());
    let mut hint = Hint::new();
    hint.with_extension("mp3");

    let mut probed = symphonia::default::get_probe()
        .format(&hint, mss, &Default::default(), &MetadataOptions::default())
        .map_err(|e| PluginError::parse("MP3", e.to_string()))?;

    let mut tags = Vec::new();
    // ID3v2 frames surface through the probe metadata, not the container.
    if let Some(metadata) = probed.metadata.get() {
        if let Some(revision) = metadata.current() {
            collect_std_tags(revision.tags(), &mut tags);
        }
    }
    if let Some(revision) = probed.format.metadata().current() {
        collect_std_tags(revision.tags(), &mut tags);
    }

    let length_seconds = probed.format.tracks().iter().find_map(|track| {
        let rate = track.codec_params.sample_rate? as f64;
        let frames = track.codec_params.n_frames?;
        (rate > 0.0).then(|| frames as f64 / rate)
    });
    Ok(Extracted {
        tags,
        length_seconds,
    })
}

fn collect_std_tags(source: &[Tag], tags: &mut Vec<(TagKey, String)>) {
    for tag in source {
        let key = match tag.std_key {
            Some(StandardTagKey::TrackTitle) => TagKey::Title,
            Some(StandardTagKey::Artist) => TagKey::Artist,
            Some(StandardTagKey::Album) => TagKey::Album,
            Some(StandardTagKey::Date) => TagKey::Date,
            Some(StandardTagKey::Genre) => TagKey::Genre,
            Some(StandardTagKey::Encoder) => TagKey::AuthoringTool,
            Some(StandardTagKey::Comment) => TagKey::Message,
            _ => continue,
        };
        push_tag(tags, key, tag.value.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chipdeck_plugin::{CollectedMetadata, MemIo, Settings};
    use symphonia::core::meta::Value;

    use crate::decoder::aiff::RATE_44100;
    use crate::decoder::wav::make_wav_i16;

    fn info_entry(id: &[u8; 4], text: &str) -> Vec<u8> {
        let mut entry = Vec::new();
        entry.extend_from_slice(id);
        let mut payload = text.as_bytes().to_vec();
        payload.push(0);
        entry.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        entry.extend_from_slice(&payload);
        if payload.len() % 2 == 1 {
            entry.push(0);
        }
        entry
    }

    fn wav_with_info(frames: &[i16], entries: &[(&[u8; 4], &str)]) -> Vec<u8> {
        let mut data = make_wav_i16(1, 44_100, frames);
        let mut list = Vec::new();
        list.extend_from_slice(b"INFO");
        for (id, text) in entries {
            list.extend_from_slice(&info_entry(id, text));
        }
        data.extend_from_slice(b"LIST");
        data.extend_from_slice(&(list.len() as u32).to_le_bytes());
        data.extend_from_slice(&list);
        let riff_size = (data.len() - 8) as u32;
        data[4..8].copy_from_slice(&riff_size.to_le_bytes());
        data
    }

    #[test]
    fn test_riff_info_mapping() {
        let data = wav_with_info(
            &[0; 4],
            &[
                (b"INAM", "Lonely Town"),
                (b"IART", "The Bitcrushers"),
                (b"ISFT", "wavetool 2.1"),
                (b"IXXX", "ignored"),
            ],
        );
        let extracted = wav_metadata(&SharedBytes::new(data)).unwrap();
        assert!(extracted
            .tags
            .contains(&(TagKey::Title, "Lonely Town".to_string())));
        assert!(extracted
            .tags
            .contains(&(TagKey::Artist, "The Bitcrushers".to_string())));
        assert!(extracted
            .tags
            .contains(&(TagKey::AuthoringTool, "wavetool 2.1".to_string())));
        assert_eq!(extracted.tags.len(), 3);
    }

    #[test]
    fn test_wav_length_from_frame_count() {
        let samples = vec![0i16; 22_050];
        let extracted = wav_metadata(&SharedBytes::new(make_wav_i16(1, 44_100, &samples))).unwrap();
        assert_eq!(extracted.length_seconds, Some(0.5));
        assert!(extracted.tags.is_empty());
    }

    fn aiff_with_text_chunks() -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(b"AIFF");

        body.extend_from_slice(b"NAME");
        body.extend_from_slice(&9u32.to_be_bytes());
        body.extend_from_slice(b"Blue Hour");
        body.push(0); // pad to even

        body.extend_from_slice(b"AUTH");
        body.extend_from_slice(&4u32.to_be_bytes());
        body.extend_from_slice(b"ambi");

        body.extend_from_slice(b"COMM");
        body.extend_from_slice(&18u32.to_be_bytes());
        body.extend_from_slice(&1u16.to_be_bytes());
        body.extend_from_slice(&44_100u32.to_be_bytes());
        body.extend_from_slice(&16u16.to_be_bytes());
        body.extend_from_slice(&RATE_44100);

        let mut file = Vec::new();
        file.extend_from_slice(b"FORM");
        file.extend_from_slice(&(body.len() as u32).to_be_bytes());
        file.extend_from_slice(&body);
        file
    }

    #[test]
    fn test_aiff_text_chunks() {
        let extracted = aiff_metadata(&SharedBytes::new(aiff_with_text_chunks())).unwrap();
        assert!(extracted
            .tags
            .contains(&(TagKey::Title, "Blue Hour".to_string())));
        assert!(extracted.tags.contains(&(TagKey::Artist, "ambi".to_string())));
        assert_eq!(extracted.length_seconds, Some(1.0));
    }

    #[test]
    fn test_extract_sets_song_type_and_title_fallback() {
        let mut io = MemIo::new();
        io.insert("music/plain tone.wav", make_wav_i16(1, 44_100, &[0; 8]));
        let settings = Settings::new();
        let services = Services::new(&io, &settings);

        let mut sink = CollectedMetadata::new();
        extract("music/plain tone.wav", &services, &mut sink).unwrap();

        let record = &sink.records()[0];
        assert_eq!(record.song_type.as_deref(), Some("WAV"));
        assert_eq!(record.title.as_deref(), Some("plain tone"));
        assert!(record.length_seconds.is_some());
    }

    #[test]
    fn test_extract_prefers_file_tags_over_fallback() {
        let mut io = MemIo::new();
        io.insert(
            "tagged.wav",
            wav_with_info(&[0; 4], &[(b"INAM", "Real Title")]),
        );
        let settings = Settings::new();
        let services = Services::new(&io, &settings);

        let mut sink = CollectedMetadata::new();
        extract("tagged.wav", &services, &mut sink).unwrap();
        assert_eq!(sink.records()[0].title.as_deref(), Some("Real Title"));
    }

    #[test]
    fn test_std_tag_mapping_first_wins() {
        let source = vec![
            Tag::new(Some(StandardTagKey::TrackTitle), "TIT2", Value::from("First")),
            Tag::new(Some(StandardTagKey::TrackTitle), "TIT2", Value::from("Second")),
            Tag::new(Some(StandardTagKey::Encoder), "TSSE", Value::from("LAME")),
            Tag::new(None, "PRIV", Value::from("opaque")),
        ];
        let mut tags = Vec::new();
        collect_std_tags(&source, &mut tags);
        assert_eq!(
            tags,
            vec![
                (TagKey::Title, "First".to_string()),
                (TagKey::AuthoringTool, "LAME".to_string()),
            ]
        );
    }

    #[test]
    fn test_vorbis_comment_case_insensitive() {
        let mut tags = Vec::new();
        push_vorbis_comment(&mut tags, "title", "lowercase works");
        push_vorbis_comment(&mut tags, "UNMAPPED", "dropped");
        push_vorbis_comment(&mut tags, "Description", "a note");
        assert_eq!(
            tags,
            vec![
                (TagKey::Title, "lowercase works".to_string()),
                (TagKey::Message, "a note".to_string()),
            ]
        );
    }
}
