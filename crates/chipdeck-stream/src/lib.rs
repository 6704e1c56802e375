//! Playback adapter for sampled audio: WAV, AIFF, FLAC, Ogg Vorbis, MP3.
//!
//! One [`StreamPlugin`] handle covers all five containers. Detection is
//! content-first (magic signatures) with filename extensions as a weaker
//! fallback; each container is then decoded by a dedicated shim over its
//! crate (`hound`, `claxon`, `lewton`, `symphonia`, plus a small native
//! AIFF reader) behind a common whole-frame `f32` surface.
//!
//! Durations are exact for WAV/AIFF/FLAC, derived from the demuxer for MP3
//! and unknown for Ogg Vorbis. All five seek; Vorbis lands on a page
//! boundary rather than the exact frame.

#![warn(missing_docs)]

mod adapter;
mod decoder;
mod detect;
mod meta;

pub use adapter::StreamPlugin;
