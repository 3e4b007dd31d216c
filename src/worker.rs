//! Parsing workers: chunk bytes in, private per-key aggregates out.

use crossbeam_channel::{Receiver, Sender};
use memchr::memchr_iter;

use crate::aggregate::{merge_into, Aggregate, AggregateMap};
use crate::error::ParseError;
use crate::parse::parse_line;
use crate::reader::Chunk;

/// Distinct keys a worker map is sized for up front.
const EXPECTED_KEYS: usize = 1 << 10;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub chunks: u64,
    pub bytes: u64,
    pub lines: u64,
    pub malformed: u64,
    /// The first malformed line's error, kept for reporting.
    pub first_error: Option<ParseError>,
}

impl WorkerStats {
    pub fn absorb(&mut self, other: &WorkerStats) {
        self.chunks += other.chunks;
        self.bytes += other.bytes;
        self.lines += other.lines;
        self.malformed += other.malformed;
        if self.first_error.is_none() {
            self.first_error = other.first_error.clone();
        }
    }
}

/// A worker's private aggregates plus its counters.
#[derive(Debug, Default)]
pub struct Partial {
    pub aggregates: AggregateMap,
    pub stats: WorkerStats,
}

impl Partial {
    pub fn new() -> Self {
        Self {
            aggregates: AggregateMap::with_capacity(EXPECTED_KEYS),
            stats: WorkerStats::default(),
        }
    }

    /// Parse every line of `bytes` and fold it in.
    ///
    /// `bytes` must start at a line boundary. A trailing slice without `\n` is treated as
    /// a final line. Blank lines are ignored; malformed lines are counted and skipped.
    pub fn fold_chunk(&mut self, bytes: &[u8]) {
        self.stats.chunks += 1;
        self.stats.bytes += bytes.len() as u64;

        let mut start = 0;
        for end in memchr_iter(b'\n', bytes) {
            self.fold_line(&bytes[start..end]);
            start = end + 1;
        }
        if start < bytes.len() {
            self.fold_line(&bytes[start..]);
        }
    }

    /// Combine another partial into this one.
    pub fn merge(&mut self, other: Partial) {
        merge_into(&mut self.aggregates, other.aggregates);
        self.stats.absorb(&other.stats);
    }

    #[inline]
    fn fold_line(&mut self, line: &[u8]) {
        if line.is_empty() {
            return;
        }
        match parse_line(line) {
            Ok(parsed) => {
                self.stats.lines += 1;
                // Look up by &str so the key is only copied the first time it is seen.
                match self.aggregates.get_mut(parsed.key) {
                    Some(aggregate) => aggregate.observe(parsed.value),
                    None => {
                        self.aggregates
                            .insert(parsed.key.to_owned(), Aggregate::of(parsed.value));
                    }
                }
            }
            Err(e) => {
                self.stats.malformed += 1;
                if self.stats.first_error.is_none() {
                    log::warn!(
                        "skipping malformed line {:?}: {e}",
                        String::from_utf8_lossy(line)
                    );
                    self.stats.first_error = Some(e);
                }
            }
        }
    }
}

/// A worker's result, sent to the merger exactly once.
#[derive(Debug)]
pub struct PartialResult {
    pub worker: usize,
    pub partial: Partial,
}

/// Consume chunks until the queue is closed and drained, then emit the partial result.
pub fn run_worker(id: usize, chunks: Receiver<Chunk>, results: Sender<PartialResult>) {
    log::debug!("starting worker {id}");
    let mut partial = Partial::new();
    for chunk in chunks.iter() {
        log::trace!("worker {id} folding chunk {} ({} bytes)", chunk.index, chunk.bytes.len());
        partial.fold_chunk(&chunk.bytes);
    }
    let stats = &partial.stats;
    log::debug!(
        "worker {id} read {} bytes, {} lines ({} malformed), in {} chunks",
        stats.bytes,
        stats.lines,
        stats.malformed,
        stats.chunks
    );
    if results
        .send(PartialResult {
            worker: id,
            partial,
        })
        .is_err()
    {
        log::error!("merger is gone, worker {id} dropped its result");
    }
}
