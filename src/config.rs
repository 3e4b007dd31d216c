use std::fmt;
use std::num::NonZeroUsize;
use std::str::FromStr;

use crate::error::{Error, Result};

pub const DEFAULT_BLOCK_SIZE: usize = 4 * 1024 * 1024;
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// How the input is brought into memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadMode {
    /// Reader thread → bounded queue → workers → merger.
    #[default]
    Streaming,
    /// Memory-map the file and fold line-aligned blocks on a rayon pool.
    Mapped,
}

impl FromStr for ReadMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "streaming" | "stream" => Ok(ReadMode::Streaming),
            "mapped" | "mmap" => Ok(ReadMode::Mapped),
            other => Err(Error::InvalidConfig(format!("unknown read mode {other:?}"))),
        }
    }
}

impl fmt::Display for ReadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadMode::Streaming => f.write_str("streaming"),
            ReadMode::Mapped => f.write_str("mapped"),
        }
    }
}

/// Tuning knobs for a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Bytes read per chunk before extending to the next line boundary.
    pub block_size: usize,
    /// Chunks buffered between the reader and the workers.
    pub queue_capacity: usize,
    pub workers: usize,
    pub mode: ReadMode,
    /// Fail the run if any line was malformed.
    pub strict: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            workers: available_workers(),
            mode: ReadMode::default(),
            strict: false,
        }
    }
}

impl PipelineConfig {
    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    pub fn with_queue_capacity(mut self, queue_capacity: usize) -> Self {
        self.queue_capacity = queue_capacity;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_mode(mut self, mode: ReadMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.block_size == 0 {
            return Err(Error::InvalidConfig("block size must be positive".into()));
        }
        if self.queue_capacity == 0 {
            return Err(Error::InvalidConfig("queue capacity must be positive".into()));
        }
        if self.workers == 0 {
            return Err(Error::InvalidConfig("worker count must be positive".into()));
        }
        Ok(())
    }
}

/// Number of cores available to this process, or 1 if it cannot be determined.
pub fn available_workers() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}
