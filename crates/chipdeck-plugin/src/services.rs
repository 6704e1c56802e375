//! Host capabilities handed to adapters.
//!
//! Adapters never touch the filesystem directly: every load goes through the
//! host's [`Io`] capability so hosts can serve archives, remote files or
//! test fixtures uniformly. Metadata flows the other way through a
//! [`MetadataSink`] owned by the host.

use std::collections::HashMap;
use std::io;
use std::path::Path;

use log::debug;
use serde::Serialize;

use crate::Settings;

/// File access capability supplied by the host.
///
/// `Sync` so a single instance can back parallel scans.
pub trait Io: Sync {
    /// Whether `url` currently resolves to a readable file.
    fn exists(&self, url: &str) -> bool;

    /// Load the entire file behind `url` into memory.
    fn read_to_memory(&self, url: &str) -> io::Result<Vec<u8>>;
}

/// Plain filesystem-backed [`Io`].
#[derive(Debug, Default)]
pub struct FileIo;

impl Io for FileIo {
    fn exists(&self, url: &str) -> bool {
        Path::new(url).is_file()
    }

    fn read_to_memory(&self, url: &str) -> io::Result<Vec<u8>> {
        let data = std::fs::read(url)?;
        debug!("loaded {} ({} bytes)", url, data.len());
        Ok(data)
    }
}

/// In-memory [`Io`] for tests: a name → bytes map.
#[derive(Debug, Default)]
pub struct MemIo {
    files: HashMap<String, Vec<u8>>,
}

impl MemIo {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `data` under `url`.
    pub fn insert(&mut self, url: impl Into<String>, data: Vec<u8>) {
        self.files.insert(url.into(), data);
    }
}

impl Io for MemIo {
    fn exists(&self, url: &str) -> bool {
        self.files.contains_key(url)
    }

    fn read_to_memory(&self, url: &str) -> io::Result<Vec<u8>> {
        self.files
            .get(url)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("no such file: {url}")))
    }
}

/// Opaque identifier for one track within a metadata sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TrackId(pub u64);

/// The fixed tag vocabulary adapters map format-specific fields onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagKey {
    /// Track or module title.
    Title,
    /// Composer or performer.
    Artist,
    /// Album or collection name.
    Album,
    /// Free-form date string as the format carries it.
    Date,
    /// Genre label.
    Genre,
    /// Human-readable format family ("FLAC", "SAP TYPE B", "Protracker").
    SongType,
    /// Tool or encoder that produced the file.
    AuthoringTool,
    /// Total length in seconds.
    LengthSeconds,
    /// Free-form comment or message text.
    Message,
}

/// Host-owned receiver for extracted metadata.
///
/// One `begin` per scanned file, then any number of tag and structure calls
/// against the returned [`TrackId`]. String values the adapter does not have
/// are simply never set; the sink never sees placeholder empties.
pub trait MetadataSink {
    /// Start a record for `url` and return its handle.
    fn begin(&mut self, url: &str) -> TrackId;

    /// Set a string-valued tag.
    fn set_tag(&mut self, id: TrackId, key: TagKey, value: &str);

    /// Set a numeric tag ([`TagKey::LengthSeconds`] in practice).
    fn set_tag_f64(&mut self, id: TrackId, key: TagKey, value: f64);

    /// Record one subsong with optional display name and length.
    fn add_subsong(&mut self, id: TrackId, index: u32, name: &str, length_seconds: Option<f64>);

    /// Record one instrument name, in file order.
    fn add_instrument(&mut self, id: TrackId, name: &str);

    /// Record one sample text line, in file order.
    fn add_sample_text(&mut self, id: TrackId, name: &str);
}

/// One subsong row in a [`TrackRecord`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubsongRecord {
    /// 0-based subsong index.
    pub index: u32,
    /// Display name, when the format has one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Length in seconds, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length_seconds: Option<f64>,
}

/// Everything collected about one file.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct TrackRecord {
    /// Source URL as passed to `metadata`.
    pub url: String,
    /// [`TagKey::Title`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// [`TagKey::Artist`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    /// [`TagKey::Album`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub album: Option<String>,
    /// [`TagKey::Date`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    /// [`TagKey::Genre`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
    /// [`TagKey::SongType`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub song_type: Option<String>,
    /// [`TagKey::AuthoringTool`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authoring_tool: Option<String>,
    /// [`TagKey::Message`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// [`TagKey::LengthSeconds`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length_seconds: Option<f64>,
    /// Subsong rows in the order the adapter reported them.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub subsongs: Vec<SubsongRecord>,
    /// Instrument names in file order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub instruments: Vec<String>,
    /// Sample text lines in file order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub samples: Vec<String>,
}

/// Reference [`MetadataSink`] that accumulates [`TrackRecord`]s.
#[derive(Debug, Default)]
pub struct CollectedMetadata {
    records: Vec<TrackRecord>,
}

impl CollectedMetadata {
    /// Create an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records begun so far.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no record has been begun.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Borrow the collected records.
    pub fn records(&self) -> &[TrackRecord] {
        &self.records
    }

    /// Consume the collector, yielding the records.
    pub fn into_records(self) -> Vec<TrackRecord> {
        self.records
    }

    fn record_mut(&mut self, id: TrackId) -> Option<&mut TrackRecord> {
        self.records.get_mut(id.0 as usize)
    }
}

impl MetadataSink for CollectedMetadata {
    fn begin(&mut self, url: &str) -> TrackId {
        let id = TrackId(self.records.len() as u64);
        self.records.push(TrackRecord {
            url: url.to_string(),
            ..TrackRecord::default()
        });
        id
    }

    fn set_tag(&mut self, id: TrackId, key: TagKey, value: &str) {
        let Some(record) = self.record_mut(id) else {
            return;
        };
        let slot = match key {
            TagKey::Title => &mut record.title,
            TagKey::Artist => &mut record.artist,
            TagKey::Album => &mut record.album,
            TagKey::Date => &mut record.date,
            TagKey::Genre => &mut record.genre,
            TagKey::SongType => &mut record.song_type,
            TagKey::AuthoringTool => &mut record.authoring_tool,
            TagKey::Message => &mut record.message,
            TagKey::LengthSeconds => {
                if let Ok(seconds) = value.parse::<f64>() {
                    record.length_seconds = Some(seconds);
                }
                return;
            }
        };
        *slot = Some(value.to_string());
    }

    fn set_tag_f64(&mut self, id: TrackId, key: TagKey, value: f64) {
        let Some(record) = self.record_mut(id) else {
            return;
        };
        match key {
            TagKey::LengthSeconds => record.length_seconds = Some(value),
            _ => {
                let text = value.to_string();
                self.set_tag(id, key, &text);
            }
        }
    }

    fn add_subsong(&mut self, id: TrackId, index: u32, name: &str, length_seconds: Option<f64>) {
        if let Some(record) = self.record_mut(id) {
            record.subsongs.push(SubsongRecord {
                index,
                name: (!name.is_empty()).then(|| name.to_string()),
                length_seconds,
            });
        }
    }

    fn add_instrument(&mut self, id: TrackId, name: &str) {
        if let Some(record) = self.record_mut(id) {
            record.instruments.push(name.to_string());
        }
    }

    fn add_sample_text(&mut self, id: TrackId, name: &str) {
        if let Some(record) = self.record_mut(id) {
            record.samples.push(name.to_string());
        }
    }
}

/// Bundle of host capabilities passed into `open` and `metadata`.
pub struct Services<'a> {
    /// File access.
    pub io: &'a dyn Io,
    /// Typed configuration registry.
    pub settings: &'a Settings,
}

impl<'a> Services<'a> {
    /// Bundle `io` and `settings`.
    pub fn new(io: &'a dyn Io, settings: &'a Settings) -> Self {
        Self { io, settings }
    }
}
