//! Error types for ADV persistence

use std::io;

/// Result type for ADV operations
pub type Result<T> = core::result::Result<T, AdvError>;

/// Errors that can occur while editing or persisting the ADV
#[derive(Debug, thiserror::Error)]
pub enum AdvError {
    /// Tag 0 is the end marker and cannot carry data
    #[error("invalid ADV tag {0}")]
    InvalidTag(u8),

    /// A single record holds at most 255 bytes
    #[error("ADV record too large ({0} bytes, max 255)")]
    TooLarge(usize),

    /// The record does not fit in the remaining ADV space
    #[error("not enough space in the ADV for {0}")]
    NoSpace(&'static str),

    /// Neither copy passed the magic/checksum test
    #[error("corrupt ADV found; rerun with --reset-adv to discard it")]
    Corrupt,

    /// No installed boot file to hold the ADV
    #[error("{0}: no previous installation found")]
    NotInstalled(String),

    /// The boot file was replaced between the read and the write
    #[error("{0}: race condition on write")]
    RaceDetected(String),

    /// Buffer passed to `from_bytes` has the wrong size
    #[error("ADV buffer must be {expected} bytes, got {actual}")]
    BadLength { expected: usize, actual: usize },

    /// I/O error on the backing file or device
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
}

impl AdvError {
    pub(crate) fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}
