//! Shared playback plugin contract for the chipdeck format adapters.
//!
//! A chipdeck adapter wraps one decoding engine behind the
//! [`PlaybackPlugin`] trait: probe a byte prefix, open a file via host I/O,
//! stream interleaved `f32` PCM in whole frames, seek where the engine
//! allows it, and extract tagged metadata into a host sink. This crate
//! carries that trait plus everything the adapters share:
//!
//! - [`probe`]: the tri-state [`ProbeResult`] and filename helpers
//! - [`format`]: [`AudioFormat`] frame math and the [`ReadReply`] envelope
//! - [`services`]: host capabilities ([`Io`], [`MetadataSink`], [`Services`])
//! - [`settings`]: the typed key/value registry adapters configure through
//! - [`scope`]: waveform rings behind the scope and telemetry hooks
//! - [`formats`]: the magic-number catalog for probing and scan labeling
//! - [`error`]: [`PluginError`] and the crate-wide [`Result`]
//!
//! Hosts drive adapters synchronously and from one thread at a time per
//! handle; nothing here spawns threads or blocks on anything but the I/O
//! the host itself provides.

#![warn(missing_docs)]

pub mod error;
pub mod format;
pub mod formats;
pub mod plugin;
pub mod probe;
pub mod scope;
pub mod services;
pub mod settings;

pub use error::{PluginError, Result};
pub use format::{AudioFormat, ReadReply, ReadStatus};
pub use plugin::{OpenInfo, PatternCell, PlaybackPlugin, SubsongRef, Telemetry, TrackerInfo};
pub use probe::ProbeResult;
pub use scope::ScopeBuffer;
pub use services::{
    CollectedMetadata, FileIo, Io, MemIo, MetadataSink, Services, SubsongRecord, TagKey, TrackId,
    TrackRecord,
};
pub use settings::{SettingValue, Settings};

/// Output sample rate adapters default to when the source has no inherent
/// rate of its own.
pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;

/// How many leading bytes a host should pass to
/// [`probe`](PlaybackPlugin::probe); enough for every signature in
/// [`formats`], including the Protracker magic at offset 1080.
pub const PROBE_PREFIX_LEN: usize = 4096;
