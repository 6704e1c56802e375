//! Fallback playback adapter for the Amiga module families UADE hosts.
//!
//! UADE (the Unix Amiga Delitracker Emulator) plays several hundred Amiga
//! music formats by running their original 68k players under emulation.
//! [`UadePlugin`] delegates all of that to an external UADE player program
//! spawned through [`chipdeck_bridge`] and contributes only the glue: a
//! curated extension probe that always answers `Unsure` (so dedicated
//! adapters outrank it), Protracker header metadata, and stdout PCM
//! streaming with a safety cap for endlessly looping modules.

#![warn(missing_docs)]

mod adapter;
mod formats;

pub use adapter::UadePlugin;
