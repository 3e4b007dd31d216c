//! The single consumer that folds worker results into the global map.

use std::thread::JoinHandle;

use crossbeam_channel::{select, Receiver, Sender};

use crate::aggregate::{merge_into, AggregateMap};
use crate::worker::{PartialResult, WorkerStats};

/// Fired once every worker thread has been joined.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Completion {
    /// Ids of workers that panicked instead of emitting a result.
    pub panicked: Vec<usize>,
}

/// Join every worker, then fire `done`.
///
/// A worker sends its result before its thread exits, so by the time this fires every
/// result that will ever exist is already queued for the merger.
pub fn signal_completion(workers: Vec<(usize, JoinHandle<()>)>, done: Sender<Completion>) {
    let mut completion = Completion::default();
    for (id, handle) in workers {
        if handle.join().is_err() {
            log::error!("worker {id} panicked");
            completion.panicked.push(id);
        }
    }
    let _ = done.send(completion);
}

/// Owns the global aggregate map while results arrive.
#[derive(Debug, Default)]
pub struct Merger {
    global: AggregateMap,
    stats: WorkerStats,
    received: usize,
}

/// What the merger holds once completion has fired and every result was drained.
#[derive(Debug)]
pub struct Merged {
    pub aggregates: AggregateMap,
    pub stats: WorkerStats,
    pub received: usize,
    pub completion: Completion,
}

impl Merger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn absorb(&mut self, result: PartialResult) {
        log::debug!(
            "merging {} keys from worker {}",
            result.partial.aggregates.len(),
            result.worker
        );
        self.stats.absorb(&result.partial.stats);
        merge_into(&mut self.global, result.partial.aggregates);
        self.received += 1;
    }

    /// Select over incoming results and the completion signal until both are exhausted.
    pub fn run(mut self, results: &Receiver<PartialResult>, done: &Receiver<Completion>) -> Merged {
        let completion = loop {
            select! {
                recv(results) -> result => match result {
                    Ok(result) => self.absorb(result),
                    // Every worker has hung up; completion follows once they are joined.
                    Err(_) => break done.recv().unwrap_or_default(),
                },
                recv(done) -> completion => {
                    for result in results.try_iter() {
                        self.absorb(result);
                    }
                    break completion.unwrap_or_default();
                }
            }
        };
        Merged {
            aggregates: self.global,
            stats: self.stats,
            received: self.received,
            completion,
        }
    }
}
