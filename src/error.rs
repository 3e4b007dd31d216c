//! Error types for the aggregation pipeline.
//!
//! Per-line problems are reported as [`ParseError`] and never abort a run on their own.
//! Everything that stops a run is an [`Error`].

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Why a single line could not be folded into an aggregate.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("line has no ';' delimiter")]
    MissingDelimiter,

    #[error("value after ';' has no digits")]
    EmptyValue,

    #[error("unexpected byte {byte:#04x} at value offset {position}")]
    InvalidByte { byte: u8, position: usize },

    /// More than one digit after the decimal point.
    #[error("value has more than one fractional digit")]
    ExcessPrecision,

    #[error("value does not fit in a fixed-point integer")]
    Overflow,

    #[error("key is not valid UTF-8")]
    InvalidKey,
}

/// Errors that abort a pipeline run.
#[derive(Error, Debug)]
pub enum Error {
    /// The input could not be opened. Raised before any stage starts.
    #[error("could not open {path:?}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("read failed mid-stream: {0}")]
    Read(#[source] io::Error),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("could not spawn pipeline thread: {0}")]
    Spawn(#[source] io::Error),

    #[error("could not build worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),

    #[error("worker {0} panicked")]
    WorkerPanicked(usize),

    #[error("reader thread panicked")]
    ReaderPanicked,

    /// Strict mode only: the run completed but skipped malformed lines.
    #[error("{count} malformed lines skipped, first: {first}")]
    Malformed { count: u64, first: ParseError },
}

pub type Result<T> = std::result::Result<T, Error>;
