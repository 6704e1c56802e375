//! The playback plugin contract.
//!
//! Every format adapter implements [`PlaybackPlugin`]. The host drives all
//! calls synchronously on threads of its choosing; an adapter holds at most
//! one playback session at a time.
//!
//! # Handle state machine
//!
//! ```text
//! created → opened → (reading ⇄ seeking) → closed → opened …
//!    └────────────────────── dropped ──────────────────────┘
//! ```
//!
//! [`read`](PlaybackPlugin::read) and [`seek`](PlaybackPlugin::seek) are only
//! meaningful while a session is open; calling them otherwise returns the
//! documented [`ReadStatus::Error`](crate::ReadStatus::Error) status or
//! [`PluginError::NotOpen`](crate::PluginError::NotOpen) — never undefined
//! behavior.
//!
//! # Example
//!
//! ```ignore
//! use chipdeck_plugin::{PlaybackPlugin, ReadStatus, Services, SubsongRef};
//!
//! fn play(plugin: &mut dyn PlaybackPlugin, url: &str, services: &Services) {
//!     let info = plugin.open(url, SubsongRef::Default, services).unwrap();
//!     let mut buffer = vec![0.0f32; 4096];
//!     loop {
//!         let reply = plugin.read(&mut buffer);
//!         if reply.status != ReadStatus::Ok {
//!             break;
//!         }
//!         // ... hand reply.samples() interleaved f32 samples to the sink
//!     }
//!     plugin.close();
//!     let _ = info;
//! }
//! ```

use crate::{AudioFormat, MetadataSink, ProbeResult, ReadReply, Result, Services};

/// Which subsong an [`open`](PlaybackPlugin::open) call should start.
///
/// `Default` maps to the format's own notion of a default track (for SAP
/// files that is the `DEFSONG` header field); it is never assumed to simply
/// be index 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubsongRef {
    /// The adapter/format default subsong.
    #[default]
    Default,
    /// An explicit 0-based subsong index.
    Index(u32),
}

impl SubsongRef {
    /// Resolve to a concrete 0-based index given the format's default.
    pub fn resolve(self, default_index: u32) -> u32 {
        match self {
            SubsongRef::Default => default_index,
            SubsongRef::Index(n) => n,
        }
    }
}

/// What a successful [`open`](PlaybackPlugin::open) reports back to the host.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenInfo {
    /// Output format of the opened session.
    pub format: AudioFormat,
    /// Total duration in milliseconds, when the wrapped library exposes it.
    ///
    /// `None` ("unknown") is a valid and common state for chiptune formats.
    pub duration_ms: Option<u64>,
    /// The resolved 0-based subsong index that is actually playing.
    pub subsong: u32,
    /// Number of subsongs in the file (at least 1).
    pub subsong_count: u32,
}

/// Per-channel level and position telemetry for host UIs.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Telemetry {
    /// Peak level per output channel over the recent window, 0.0..=1.0.
    pub vu: Vec<f32>,
    /// Current pattern index, for formats that track one.
    pub pattern: Option<u32>,
    /// Current row within the pattern, for formats that track one.
    pub row: Option<u32>,
}

/// Static description of a tracker module's structure.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackerInfo {
    /// Name of the authoring tracker ("Protracker", "OctaMED", …).
    pub tracker: String,
    /// Number of patterns in the module.
    pub patterns: u32,
    /// Number of tracker channels (not output channels).
    pub channels: u32,
}

/// One cell of a tracker pattern.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PatternCell {
    /// Note in conventional notation ("C-4", "---").
    pub note: String,
    /// Instrument number, 0 when empty.
    pub instrument: u32,
    /// Effect column as displayed by the tracker.
    pub effect: String,
}

/// A playback plugin adapter for one format family.
///
/// Object-safe: hosts hold adapters as `Box<dyn PlaybackPlugin>`. Optional
/// capabilities (telemetry, scope, tracker introspection) have default
/// implementations that report "not available"; adapters override only what
/// their wrapped library actually exposes.
pub trait PlaybackPlugin: Send {
    /// Short stable adapter name ("stream", "sap", "uade").
    fn name(&self) -> &'static str;

    /// Adapter version string.
    fn version(&self) -> &'static str;

    /// Comma-separated list of filename extensions this adapter claims.
    ///
    /// Static and side-effect free; several adapters may claim the same
    /// extension and let probing arbitrate.
    fn supported_extensions(&self) -> &'static str;

    /// Classify a candidate file from a bounded byte prefix plus filename.
    ///
    /// Pure: must not mutate adapter or process state. Must tolerate a
    /// `prefix` shorter than any magic signature (explicit length checks
    /// before indexing) including the empty slice. `total_size` is the full
    /// file length, for formats whose plausibility depends on it.
    fn probe(&self, prefix: &[u8], filename: &str, total_size: u64) -> ProbeResult;

    /// Load `url` through the host I/O capability and start playback at
    /// `subsong`.
    ///
    /// Re-entrant: opening on an already-open handle tears down the prior
    /// session first. On failure the handle is left without a session (a
    /// following [`read`](Self::read) reports `Error`), and any temporary
    /// load buffer has been released.
    fn open(&mut self, url: &str, subsong: SubsongRef, services: &Services) -> Result<OpenInfo>;

    /// Decode up to `dest.len()` interleaved `f32` samples into `dest`.
    ///
    /// The hot path. Produces only whole frames: at most
    /// `format.whole_frames(dest.len())` of them, [`ReadStatus::Finished`]
    /// when the stream can produce no more and [`ReadStatus::Error`] when no
    /// session is open. A `dest` too small for even one whole frame is a
    /// caller sizing problem, not end of stream: it yields `Ok` with zero
    /// frames and the stream stays where it was.
    ///
    /// [`ReadStatus::Finished`]: crate::ReadStatus::Finished
    /// [`ReadStatus::Error`]: crate::ReadStatus::Error
    fn read(&mut self, dest: &mut [f32]) -> ReadReply;

    /// Seek to `target_ms` milliseconds from the start of the subsong.
    ///
    /// Returns the achieved position in milliseconds. Negative targets clamp
    /// to zero on seekable adapters. Adapters without any seek capability
    /// return [`PluginError::SeekUnsupported`](crate::PluginError::SeekUnsupported)
    /// for every target, including zero and negative — never a silent no-op.
    /// Adapters whose only mechanism is restart-plus-skip-decoding implement
    /// that and document the cost as O(n) in the target offset.
    fn seek(&mut self, target_ms: i64) -> Result<u64>;

    /// Release the current session's decoder resources.
    ///
    /// The handle stays reusable for a subsequent [`open`](Self::open); final
    /// destruction is `Drop`.
    fn close(&mut self);

    /// Extract metadata from `url` into `sink`, independent of any open
    /// session (enforced by the `&self` receiver).
    ///
    /// Loads the file fresh, maps whatever tags the format carries onto the
    /// fixed [`TagKey`](crate::TagKey) vocabulary, enumerates subsongs with
    /// per-subsong name/length when the format has them, and falls back to
    /// the filename stem as title when the file carries none.
    fn metadata(&self, url: &str, services: &Services, sink: &mut dyn MetadataSink)
        -> Result<()>;

    /// Current level/position telemetry, `None` for formats without it.
    fn telemetry(&self) -> Option<Telemetry> {
        None
    }

    /// Display names of the scope channels; empty means no scope capability.
    fn scope_channel_names(&self) -> Vec<String> {
        Vec::new()
    }

    /// Copy the most recent waveform of `channel` into `dest`, oldest first.
    ///
    /// Returns the number of samples written (0 without scope capability or
    /// open session).
    fn scope_data(&self, channel: usize, dest: &mut [f32]) -> usize {
        let _ = (channel, dest);
        0
    }

    /// Structure of the open tracker module, `None` for non-tracker formats.
    fn tracker_info(&self) -> Option<TrackerInfo> {
        None
    }

    /// Number of rows in `pattern`, `None` when unavailable.
    fn pattern_rows(&self, pattern: u32) -> Option<u32> {
        let _ = pattern;
        None
    }

    /// One display cell of a pattern, `None` when unavailable.
    fn pattern_cell(&self, pattern: u32, row: u32, channel: u32) -> Option<PatternCell> {
        let _ = (pattern, row, channel);
        None
    }
}
