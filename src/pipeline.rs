//! Wiring: reader, workers, completion and merger for the streaming mode, and the
//! rayon fold over a memory map for the mapped mode.

use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, unbounded};
use memmap2::Mmap;
use rayon::prelude::*;

use crate::aggregate::{Aggregate, AggregateMap};
use crate::config::{PipelineConfig, ReadMode};
use crate::error::{Error, ParseError, Result};
use crate::merge::{signal_completion, Merger};
use crate::reader::{line_aligned_blocks, Chunk, ChunkReader};
use crate::worker::{run_worker, Partial, PartialResult, WorkerStats};

const READ_BUFFER: usize = 64 * 1024;

/// Counters for a finished run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    pub chunks: u64,
    pub bytes: u64,
    pub lines: u64,
    pub malformed: u64,
    pub first_error: Option<ParseError>,
    pub elapsed: Duration,
}

impl RunStats {
    fn new(workers: WorkerStats, elapsed: Duration) -> Self {
        Self {
            chunks: workers.chunks,
            bytes: workers.bytes,
            lines: workers.lines,
            malformed: workers.malformed,
            first_error: workers.first_error,
            elapsed,
        }
    }
}

/// The frozen global aggregate map and how it was produced.
#[derive(Debug, Default)]
pub struct Report {
    pub aggregates: AggregateMap,
    pub stats: RunStats,
}

impl Report {
    pub fn get(&self, key: &str) -> Option<&Aggregate> {
        self.aggregates.get(key)
    }

    /// Entries in lexicographic key order.
    pub fn sorted(&self) -> Vec<(&str, &Aggregate)> {
        let mut entries: Vec<(&str, &Aggregate)> = self
            .aggregates
            .iter()
            .map(|(key, aggregate)| (key.as_str(), aggregate))
            .collect();
        entries.sort_unstable_by(|a, b| a.0.cmp(b.0));
        entries
    }
}

impl fmt::Display for Report {
    /// `{key1=min/mean/max, key2=min/mean/max}`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (key, aggregate)) in self.sorted().into_iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{key}={aggregate}")?;
        }
        f.write_str("}")
    }
}

/// Aggregate the file at `path` according to `config`.
pub fn run(path: impl AsRef<Path>, config: &PipelineConfig) -> Result<Report> {
    config.validate()?;
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| Error::Open {
        path: path.to_path_buf(),
        source,
    })?;
    log::info!(
        "aggregating {path:?} in {} mode with {} workers",
        config.mode,
        config.workers
    );

    let report = match config.mode {
        ReadMode::Streaming => stream(BufReader::with_capacity(READ_BUFFER, file), config)?,
        ReadMode::Mapped => map_file(&file, config)?,
    };
    finish(report, config)
}

fn finish(report: Report, config: &PipelineConfig) -> Result<Report> {
    let stats = &report.stats;
    log::info!(
        "{} lines, {} keys, {} bytes in {} chunks, {:?}",
        stats.lines,
        report.aggregates.len(),
        stats.bytes,
        stats.chunks,
        stats.elapsed
    );
    if stats.malformed > 0 {
        log::warn!("skipped {} malformed lines", stats.malformed);
        if config.strict {
            if let Some(first) = stats.first_error.clone() {
                return Err(Error::Malformed {
                    count: stats.malformed,
                    first,
                });
            }
        }
    }
    Ok(report)
}

/// Run the streaming pipeline over any line-oriented input.
///
/// The reader runs on its own thread feeding a bounded queue; `config.workers` threads
/// fold chunks privately; this thread merges their results.
pub fn stream<R>(input: R, config: &PipelineConfig) -> Result<Report>
where
    R: BufRead + Send + 'static,
{
    config.validate()?;
    let started = Instant::now();

    let (chunk_tx, chunk_rx) = bounded::<Chunk>(config.queue_capacity);
    let (result_tx, result_rx) = unbounded::<PartialResult>();
    let (done_tx, done_rx) = bounded(1);

    let mut workers = Vec::with_capacity(config.workers);
    for id in 0..config.workers {
        let chunks = chunk_rx.clone();
        let results = result_tx.clone();
        let handle = thread::Builder::new()
            .name(format!("brc-worker-{id}"))
            .spawn(move || run_worker(id, chunks, results))
            .map_err(Error::Spawn)?;
        workers.push((id, handle));
    }
    // Only workers hold these from here on, so the channels close when they finish.
    drop(chunk_rx);
    drop(result_tx);

    let coordinator = thread::Builder::new()
        .name("brc-completion".into())
        .spawn(move || signal_completion(workers, done_tx))
        .map_err(Error::Spawn)?;

    let reader = ChunkReader::new(input, config.block_size);
    let reader = thread::Builder::new()
        .name("brc-reader".into())
        .spawn(move || reader.feed(chunk_tx))
        .map_err(Error::Spawn)?;

    let merged = Merger::new().run(&result_rx, &done_rx);
    let _ = coordinator.join();
    let read = reader.join().map_err(|_| Error::ReaderPanicked)??;
    if let Some(&id) = merged.completion.panicked.first() {
        return Err(Error::WorkerPanicked(id));
    }
    log::debug!(
        "merged {} partial results; reader produced {} chunks",
        merged.received,
        read.chunks
    );

    Ok(Report {
        aggregates: merged.aggregates,
        stats: RunStats::new(merged.stats, started.elapsed()),
    })
}

fn map_file(file: &File, config: &PipelineConfig) -> Result<Report> {
    if file.metadata().map_err(Error::Read)?.len() == 0 {
        return Ok(Report::default());
    }
    // SAFETY: the input is treated as read-only for the duration of the run; concurrent
    // truncation by another process is not supported.
    let map = unsafe { Mmap::map(file) }.map_err(Error::Read)?;
    fold_mapped(&map, config)
}

/// Split `data` into line-aligned blocks and fold them on a pool of `config.workers`
/// threads, reducing with the same merge rule the streaming merger uses.
pub fn fold_mapped(data: &[u8], config: &PipelineConfig) -> Result<Report> {
    config.validate()?;
    let started = Instant::now();
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.workers)
        .thread_name(|i| format!("brc-mapped-{i}"))
        .build()?;

    let blocks = line_aligned_blocks(data, config.block_size);
    let partial = pool.install(|| {
        blocks
            .par_iter()
            .fold(Partial::new, |mut partial, block| {
                partial.fold_chunk(&data[block.clone()]);
                partial
            })
            .reduce(Partial::new, |mut left, right| {
                left.merge(right);
                left
            })
    });

    Ok(Report {
        aggregates: partial.aggregates,
        stats: RunStats::new(partial.stats, started.elapsed()),
    })
}
