//! Directory scanner for the chipdeck adapters.
//!
//! Walks a directory tree, probes every file against the bundled adapter
//! registry, runs `metadata` on claimed files and emits one JSON report.
//! Files no adapter claims are still labeled through the known-format
//! catalog when their signature is recognized; everything else is skipped.
//!
//! This is a scanning tool, not a playback host: nothing here opens a
//! playback session.

mod registry;

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};
use rayon::prelude::*;
use serde::Serialize;
use walkdir::WalkDir;

use chipdeck_plugin::services::{CollectedMetadata, FileIo, Services, TrackRecord};
use chipdeck_plugin::{formats, PROBE_PREFIX_LEN};

use crate::registry::Registry;

#[derive(Parser)]
#[command(name = "chipdeck-scan")]
#[command(about = "Extract metadata from music files through the chipdeck adapters")]
struct Args {
    /// Directory to scan
    #[arg(short, long)]
    dir: PathBuf,

    /// Output JSON file (stdout when omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Base path to strip from file paths in the output
    #[arg(short, long)]
    base: Option<PathBuf>,

    /// Pretty print JSON output
    #[arg(long)]
    pretty: bool,

    /// How many leading bytes to read per file for probing
    #[arg(long, default_value_t = PROBE_PREFIX_LEN)]
    probe_bytes: usize,
}

/// One scanned file in the report.
#[derive(Serialize)]
struct FileReport {
    /// Path, relative to `--base` when given.
    path: String,
    /// Adapter that claimed the file, absent for catalog-only labels.
    #[serde(skip_serializing_if = "Option::is_none")]
    adapter: Option<String>,
    /// Format family label for recognized files no adapter claimed.
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<String>,
    /// Extracted tags, when the claiming adapter succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<TrackRecord>,
    /// Extraction failure, when it did not.
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// The whole scan.
#[derive(Serialize)]
struct Report {
    /// Files walked.
    scanned: usize,
    /// Files an adapter claimed.
    claimed: usize,
    /// Files only the format catalog recognized.
    labeled: usize,
    /// Per-file results, sorted by path.
    files: Vec<FileReport>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let files: Vec<PathBuf> = WalkDir::new(&args.dir)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .collect();
    info!("scanning {} files under {}", files.len(), args.dir.display());

    let mut reports: Vec<FileReport> = files
        .par_iter()
        .map_init(Registry::with_bundled, |registry, path| {
            scan_file(registry, path, args.base.as_deref(), args.probe_bytes)
        })
        .filter_map(|report| report)
        .collect();
    reports.sort_by(|a, b| a.path.cmp(&b.path));

    let report = Report {
        scanned: files.len(),
        claimed: reports.iter().filter(|r| r.adapter.is_some()).count(),
        labeled: reports
            .iter()
            .filter(|r| r.adapter.is_none() && r.format.is_some())
            .count(),
        files: reports,
    };
    info!(
        "{} scanned, {} claimed, {} catalog-labeled",
        report.scanned, report.claimed, report.labeled
    );

    let json = if args.pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };
    match &args.output {
        Some(path) => fs::write(path, json)
            .with_context(|| format!("writing report to {}", path.display()))?,
        None => println!("{json}"),
    }
    Ok(())
}

/// Probe one file and, when an adapter claims it, extract its metadata.
///
/// Returns `None` for files neither an adapter nor the format catalog
/// recognizes.
fn scan_file(
    registry: &mut Registry,
    path: &Path,
    base: Option<&Path>,
    probe_bytes: usize,
) -> Option<FileReport> {
    let url = path.to_string_lossy().into_owned();
    let (prefix, total_size) = match read_prefix(path, probe_bytes) {
        Ok(read) => read,
        Err(e) => {
            warn!("skipping {url}: {e}");
            return None;
        }
    };

    let display_path = base
        .and_then(|base| path.strip_prefix(base).ok())
        .unwrap_or(path)
        .to_string_lossy()
        .into_owned();

    let Some(plugin) = registry.select(&prefix, &url, total_size) else {
        // Unclaimed, but maybe still a known family worth reporting.
        let format = formats::identify(&prefix, &url)?;
        return Some(FileReport {
            path: display_path,
            adapter: None,
            format: Some(format.name().to_string()),
            metadata: None,
            error: None,
        });
    };

    let io = FileIo;
    let services = Services::new(&io, registry.settings());
    let mut sink = CollectedMetadata::new();
    let (metadata, error) = match plugin.metadata(&url, &services, &mut sink) {
        Ok(()) => (sink.into_records().into_iter().next(), None),
        Err(e) => {
            warn!("metadata failed for {url}: {e}");
            (None, Some(e.to_string()))
        }
    };
    Some(FileReport {
        path: display_path,
        adapter: Some(plugin.name().to_string()),
        format: None,
        metadata,
        error,
    })
}

/// First `probe_bytes` of `path` plus the file's total size.
fn read_prefix(path: &Path, probe_bytes: usize) -> std::io::Result<(Vec<u8>, u64)> {
    let file = fs::File::open(path)?;
    let total_size = file.metadata()?.len();
    let mut prefix = Vec::with_capacity(probe_bytes.min(total_size as usize));
    file.take(probe_bytes as u64).read_to_end(&mut prefix)?;
    Ok((prefix, total_size))
}
