//! Min, mean and max of `key;value` records grouped by key, computed over very large
//! files with bounded memory.
//!
//! The streaming pipeline reads line-aligned chunks on one thread, folds them into
//! private per-worker maps on `workers` threads, and merges the per-worker results on
//! the calling thread:
//!
//! ```no_run
//! use one_brc::{run, PipelineConfig};
//!
//! let report = run("measurements.txt", &PipelineConfig::default())?;
//! println!("{report}");
//! # Ok::<(), one_brc::Error>(())
//! ```

pub mod aggregate;
pub mod config;
pub mod error;
pub mod merge;
pub mod parse;
pub mod pipeline;
pub mod reader;
pub mod worker;

pub use aggregate::{Aggregate, AggregateMap, FixedPoint};
pub use config::{PipelineConfig, ReadMode};
pub use error::{Error, ParseError, Result};
pub use pipeline::{fold_mapped, run, stream, Report, RunStats};
