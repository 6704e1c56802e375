//! Subprocess PCM bridge.
//!
//! Some formats are only practical to play through an external decoder
//! program. This crate spawns such a program and turns its stdout pipe into
//! whole-frame `f32` reads for an adapter to serve.
//!
//! # Wire format
//!
//! The child writes raw interleaved signed 16-bit little-endian PCM on
//! stdout, at the channel count and sample rate agreed through settings.
//! stdin is discarded; stderr is drained line by line into debug-level log
//! output so player diagnostics stay visible without ever blocking the
//! child. A dangling partial frame at end of stream is dropped.
//!
//! # Threading
//!
//! Each [`PipeDecoder`] owns one named reader thread that drains the pipe
//! into a bounded channel, so the child keeps making progress while the
//! host is busy elsewhere. Everything else happens on the caller's thread.

#![warn(missing_docs)]

use std::io::{BufRead, BufReader, Read};
use std::process::{Child, ChildStderr, ChildStdout, Command, Stdio};
use std::sync::mpsc::{Receiver, SyncSender};
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};

use log::{debug, warn};
use parking_lot::Mutex;

use chipdeck_plugin::{AudioFormat, PluginError, Result, Settings};

/// Bytes read from the pipe per syscall.
const CHUNK_BYTES: usize = 16 * 1024;

/// Chunks buffered between the reader thread and the consumer.
const CHANNEL_DEPTH: usize = 8;

/// An external decoder invocation template.
///
/// The argument template is split on whitespace; each argument may contain
/// the placeholders `{file}` and `{subsong}`, replaced per invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    program: String,
    args: Vec<String>,
}

impl CommandSpec {
    /// Build a spec from a program name and a whitespace-separated argument
    /// template.
    pub fn new(program: impl Into<String>, args_template: &str) -> Self {
        Self {
            program: program.into(),
            args: args_template.split_whitespace().map(str::to_string).collect(),
        }
    }

    /// Read program and argument template from two settings keys.
    ///
    /// An empty or whitespace-only program is reported as
    /// [`PluginError::PlayerMissing`]: the adapter exists but nobody has
    /// configured a decoder for it yet.
    pub fn from_settings(settings: &Settings, program_key: &str, args_key: &str) -> Result<Self> {
        let program = settings.get_str(program_key)?;
        if program.trim().is_empty() {
            return Err(PluginError::PlayerMissing(format!(
                "no program configured under {program_key}"
            )));
        }
        let args = settings.get_str(args_key)?;
        Ok(Self::new(program.trim(), &args))
    }

    /// The program this spec runs.
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Expand the template into a runnable [`Command`] for `file` and
    /// `subsong`.
    pub fn command(&self, file: &str, subsong: u32) -> Command {
        let mut command = Command::new(&self.program);
        let subsong_text = subsong.to_string();
        for arg in &self.args {
            command.arg(
                arg.replace("{file}", file)
                    .replace("{subsong}", &subsong_text),
            );
        }
        command
    }
}

#[derive(Debug, Default)]
struct WorkerShared {
    error: Mutex<Option<String>>,
}

/// A running external decoder plus the reader thread draining its stdout.
///
/// Reading blocks until the requested whole frames arrive or the stream
/// ends; the child is killed and reaped on [`shutdown`](PipeDecoder::shutdown)
/// or drop.
#[derive(Debug)]
pub struct PipeDecoder {
    format: AudioFormat,
    rx: Option<Receiver<Vec<f32>>>,
    pending: Vec<f32>,
    pending_pos: usize,
    child: Option<Child>,
    worker: Option<JoinHandle<()>>,
    err_worker: Option<JoinHandle<()>>,
    shared: Arc<WorkerShared>,
    eof: bool,
}

impl PipeDecoder {
    /// Spawn `spec` for `file`/`subsong` and start draining its stdout as
    /// `format` PCM.
    ///
    /// A spawn failure (program absent, not executable) is reported as
    /// [`PluginError::PlayerMissing`].
    pub fn spawn(
        spec: &CommandSpec,
        file: &str,
        subsong: u32,
        format: AudioFormat,
    ) -> Result<Self> {
        if format.channels == 0 {
            return Err(PluginError::Other(
                "pipe decoder needs at least one output channel".into(),
            ));
        }

        let mut command = spec.command(file, subsong);
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        let mut child = command
            .spawn()
            .map_err(|e| PluginError::PlayerMissing(format!("{}: {e}", spec.program())))?;
        let stdout = match child.stdout.take() {
            Some(stdout) => stdout,
            None => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(PluginError::Other("child stdout was not captured".into()));
            }
        };

        let (tx, rx) = mpsc::sync_channel(CHANNEL_DEPTH);
        let shared = Arc::new(WorkerShared::default());
        let worker_shared = Arc::clone(&shared);
        let channels = format.channels as usize;
        let worker = match thread::Builder::new()
            .name("chipdeck-bridge".into())
            .spawn(move || worker_loop(stdout, tx, worker_shared, channels))
        {
            Ok(worker) => worker,
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(PluginError::Other(format!(
                    "failed to start bridge reader thread: {e}"
                )));
            }
        };
        let err_worker = child.stderr.take().and_then(|stderr| {
            let program = spec.program().to_string();
            thread::Builder::new()
                .name("chipdeck-bridge-err".into())
                .spawn(move || stderr_loop(stderr, &program))
                .map_err(|e| warn!("failed to start bridge stderr thread: {e}"))
                .ok()
        });
        debug!("bridge started: {} (pid {})", spec.program(), child.id());

        Ok(Self {
            format,
            rx: Some(rx),
            pending: Vec::new(),
            pending_pos: 0,
            child: Some(child),
            worker: Some(worker),
            err_worker,
            shared,
            eof: false,
        })
    }

    /// The PCM format this bridge was spawned with.
    pub fn format(&self) -> AudioFormat {
        self.format
    }

    /// Fill `dest` with interleaved samples, whole frames only.
    ///
    /// Blocks until `dest`'s whole-frame capacity is filled or the stream
    /// ends. Returns the number of frames written; 0 means end of stream.
    pub fn read_frames(&mut self, dest: &mut [f32]) -> usize {
        let channels = self.format.channels as usize;
        let budget = self.format.whole_frames(dest.len()) * channels;
        let mut written = 0;
        while written < budget {
            if self.pending_pos >= self.pending.len() && !self.refill() {
                break;
            }
            let available = self.pending.len() - self.pending_pos;
            let take = available.min(budget - written);
            dest[written..written + take]
                .copy_from_slice(&self.pending[self.pending_pos..self.pending_pos + take]);
            self.pending_pos += take;
            written += take;
        }
        written / channels.max(1)
    }

    fn refill(&mut self) -> bool {
        if self.eof {
            return false;
        }
        let Some(rx) = self.rx.as_ref() else {
            self.eof = true;
            return false;
        };
        match rx.recv() {
            Ok(chunk) => {
                self.pending = chunk;
                self.pending_pos = 0;
                true
            }
            Err(_) => {
                self.eof = true;
                false
            }
        }
    }

    /// Decode and discard up to `frames` frames, returning how many were
    /// actually skipped (fewer when the stream ends first).
    ///
    /// Restart-then-skip seeking decodes through everything before the
    /// target, so the cost is linear in the skipped span.
    pub fn skip_frames(&mut self, frames: u64) -> u64 {
        let channels = self.format.channels as usize;
        if channels == 0 {
            return 0;
        }
        let mut scratch = vec![0.0f32; channels * 1024];
        let mut skipped = 0;
        while skipped < frames {
            let want = ((frames - skipped).min(1024) as usize) * channels;
            let got = self.read_frames(&mut scratch[..want]);
            if got == 0 {
                break;
            }
            skipped += got as u64;
        }
        skipped
    }

    /// Error recorded by the reader thread, if any, clearing it.
    ///
    /// End of stream is not an error; this only reports pipe read failures.
    pub fn take_error(&mut self) -> Option<String> {
        self.shared.error.lock().take()
    }

    /// Kill the child, drain the reader thread and drop the channel.
    ///
    /// Further reads report end of stream. Idempotent.
    pub fn shutdown(&mut self) {
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.kill() {
                debug!("bridge child kill: {e}");
            }
            match child.wait() {
                Ok(status) => debug!("bridge child exited: {status}"),
                Err(e) => warn!("bridge child wait failed: {e}"),
            }
        }
        self.rx = None;
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
        if let Some(err_worker) = self.err_worker.take() {
            let _ = err_worker.join();
        }
        self.pending.clear();
        self.pending_pos = 0;
        self.eof = true;
    }
}

impl Drop for PipeDecoder {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(
    mut stdout: ChildStdout,
    tx: SyncSender<Vec<f32>>,
    shared: Arc<WorkerShared>,
    channels: usize,
) {
    let frame_bytes = channels * 2;
    let mut chunk = vec![0u8; CHUNK_BYTES];
    let mut carry: Vec<u8> = Vec::with_capacity(frame_bytes);
    loop {
        let n = match stdout.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                *shared.error.lock() = Some(e.to_string());
                break;
            }
        };
        carry.extend_from_slice(&chunk[..n]);
        let usable = carry.len() - carry.len() % frame_bytes;
        if usable == 0 {
            continue;
        }
        let mut samples = Vec::with_capacity(usable / 2);
        for pair in carry[..usable].chunks_exact(2) {
            samples.push(i16::from_le_bytes([pair[0], pair[1]]) as f32 / 32768.0);
        }
        carry.drain(..usable);
        // Send blocks once CHANNEL_DEPTH chunks are queued; a dropped
        // receiver means the decoder shut down, so just stop reading.
        if tx.send(samples).is_err() {
            break;
        }
    }
}

/// Forward player diagnostics at debug level until the pipe closes.
fn stderr_loop(stderr: ChildStderr, program: &str) {
    for line in BufReader::new(stderr).lines() {
        match line {
            Ok(line) => debug!("{program}: {line}"),
            Err(_) => break,
        }
    }
}
