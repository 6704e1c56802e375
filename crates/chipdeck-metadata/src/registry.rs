//! The host-side adapter registry.
//!
//! Arbitration follows the contract's precedence story: a `Supported` probe
//! (magic matched) always beats an `Unsure` one (extension only), and
//! between equal tiers registration order decides. The bundled order is
//! stream, sap, uade — dedicated adapters before the generic Amiga
//! fallback — and that order is the whole priority scheme.

use chipdeck_plugin::{PlaybackPlugin, ProbeResult, Settings};
use chipdeck_sap::SapPlugin;
use chipdeck_stream::StreamPlugin;
use chipdeck_uade::UadePlugin;

/// All bundled adapters plus the settings they registered themselves into.
pub struct Registry {
    plugins: Vec<Box<dyn PlaybackPlugin>>,
    settings: Settings,
}

impl Registry {
    /// Build the bundled adapter set in its documented registration order.
    pub fn with_bundled() -> Self {
        let mut settings = Settings::new();
        let plugins: Vec<Box<dyn PlaybackPlugin>> = vec![
            Box::new(StreamPlugin::new()),
            Box::new(SapPlugin::new(&mut settings)),
            Box::new(UadePlugin::new(&mut settings)),
        ];
        Self { plugins, settings }
    }

    /// The settings registry the adapters populated with their defaults.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Pick the adapter for a file: first `Supported` claim in registration
    /// order, else the first `Unsure` one.
    pub fn select(
        &self,
        prefix: &[u8],
        filename: &str,
        total_size: u64,
    ) -> Option<&dyn PlaybackPlugin> {
        let mut fallback = None;
        for plugin in &self.plugins {
            match plugin.probe(prefix, filename, total_size) {
                ProbeResult::Supported => return Some(plugin.as_ref()),
                ProbeResult::Unsure => fallback = fallback.or(Some(plugin.as_ref())),
                ProbeResult::Unsupported => {}
            }
        }
        fallback
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_magic_beats_extension_claim() {
        let registry = Registry::with_bundled();
        // SAP magic under a .mod name: the sap adapter's Supported claim
        // outranks uade's extension-only Unsure.
        let chosen = registry.select(b"SAP\rAUTHOR", "weird.mod", 100).unwrap();
        assert_eq!(chosen.name(), "sap");
    }

    #[test]
    fn test_fallback_is_first_unsure() {
        let registry = Registry::with_bundled();
        let chosen = registry.select(b"no magic here", "tune.mod", 100).unwrap();
        assert_eq!(chosen.name(), "uade");
    }

    #[test]
    fn test_stream_magic_selected() {
        let mut wav = b"RIFF\x00\x00\x00\x00WAVE".to_vec();
        wav.extend_from_slice(&[0u8; 16]);
        let registry = Registry::with_bundled();
        let chosen = registry.select(&wav, "noise.bin", 28).unwrap();
        assert_eq!(chosen.name(), "stream");
    }

    #[test]
    fn test_unclaimed_file_selects_nothing() {
        let registry = Registry::with_bundled();
        assert!(registry.select(b"#!/bin/sh", "script.sh", 9).is_none());
        assert!(registry.select(&[], "empty", 0).is_none());
    }
}
