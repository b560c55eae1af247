//! Error Types
//!
//! All fallible operations in this crate return [`Result<T>`], aliased to
//! `Result<T, Error>` so `?` propagation works throughout.
//!
//! ## Error Categories
//!
//! ### Usage Errors
//! - `StreamFinished`: a write was attempted after the gzip stream was
//!   finalized. Not retryable; surfaced to the caller immediately.
//! - `InvalidPattern`: the configured file-name pattern could not be parsed.
//!
//! ### Rollover Errors
//! - `Rotation`: a delete or rename failed while executing a rollover plan.
//!   The rollover is aborted, the previous stream is kept, and rotation is
//!   retried on the next trigger. Already-flushed bytes are never lost.
//! - `Open`: a target file could not be created or opened.
//!
//! ### Write-Path Errors
//! - `Io`: pass-through I/O failure from the underlying sink.
//! - `Compression`: the deflate engine rejected its input or state.
//! - `Lock`: whole-file advisory lock acquisition failed (locking mode only).
//!
//! No error here escalates to process termination; callers decide whether a
//! failure is fatal.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Stream already finished, cannot write more data")]
    StreamFinished,

    #[error("Compression error: {0}")]
    Compression(String),

    #[error("Rotation failed: {0}")]
    Rotation(String),

    #[error("Unable to open {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Unable to obtain file lock: {0}")]
    Lock(std::io::Error),

    #[error("Invalid file name pattern: {0}")]
    InvalidPattern(String),
}

impl From<flate2::CompressError> for Error {
    fn from(err: flate2::CompressError) -> Self {
        Error::Compression(err.to_string())
    }
}
