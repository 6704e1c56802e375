//! SAP (Slight Atari Player) playback adapter.
//!
//! SAP files bundle ripped Atari 8-bit POKEY music: a text header describing
//! subsongs, durations and credits, followed by the 6502 player binary.
//! [`SapPlugin`] parses the header natively and delegates the actual POKEY
//! emulation to an external player program spawned through
//! [`chipdeck_bridge`], so the adapter works with whatever `sap.player.*`
//! command the host configures.

#![warn(missing_docs)]

mod adapter;
pub mod header;

pub use adapter::SapPlugin;
pub use header::{SapHeader, SapTime};
