//! Error handling for plugin adapters.

use thiserror::Error;

/// Convenient result alias for plugin operations.
pub type Result<T> = std::result::Result<T, PluginError>;

/// Errors that may occur while opening, reading or inspecting a file.
///
/// End-of-stream is deliberately *not* represented here: it is reported as
/// [`ReadStatus::Finished`](crate::ReadStatus::Finished) on the same channel
/// as successful reads. Nothing is retried inside an adapter; the host owns
/// retry policy.
#[derive(Debug, Error)]
pub enum PluginError {
    /// The file could not be read through the host I/O capability.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The wrapped library rejected the file contents.
    #[error("{format} parse error: {reason}")]
    Parse {
        /// Short format name, e.g. "SAP" or "FLAC".
        format: &'static str,
        /// Human-readable explanation from the decoder.
        reason: String,
    },

    /// The adapter (or its wrapped library) has no seek capability.
    ///
    /// Returned deterministically for *every* target, including zero and
    /// negative offsets; a non-seekable adapter never silently no-ops.
    #[error("seeking is not supported by this adapter")]
    SeekUnsupported,

    /// The handle has no active decoder (`open` has not succeeded).
    #[error("no file is open on this handle")]
    NotOpen,

    /// A subsong index outside the file's subsong list was requested.
    #[error("invalid subsong index {requested} (file has {available})")]
    InvalidSubsong {
        /// Requested 0-based subsong index.
        requested: u32,
        /// Number of subsongs in the file.
        available: u32,
    },

    /// An external decoder program is absent or not configured.
    #[error("external player unavailable: {0}")]
    PlayerMissing(String),

    /// A settings key was missing or carried the wrong type.
    #[error("settings error: {0}")]
    Settings(String),

    /// Generic validation error.
    #[error("{0}")]
    Other(String),
}

impl PluginError {
    /// Build a [`PluginError::Parse`] with the given format label.
    pub fn parse(format: &'static str, reason: impl Into<String>) -> Self {
        PluginError::Parse {
            format,
            reason: reason.into(),
        }
    }
}

impl From<String> for PluginError {
    fn from(msg: String) -> Self {
        PluginError::Other(msg)
    }
}

impl From<&str> for PluginError {
    fn from(msg: &str) -> Self {
        PluginError::Other(msg.to_string())
    }
}
