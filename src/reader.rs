//! Splitting input into line-aligned chunks.
//!
//! [`ChunkReader`] drives the streaming mode: it reads fixed-size blocks from a
//! [`BufRead`] and extends each block to the next `\n`, so no line is ever split across
//! two chunks. [`line_aligned_blocks`] does the same over an in-memory buffer for the
//! mapped mode.

use std::io::{self, BufRead, Read};
use std::ops::Range;

use crossbeam_channel::Sender;
use memchr::memchr;

use crate::error::{Error, Result};

const NEWLINE: u8 = b'\n';

/// A line-aligned run of input bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Position of this chunk in file order.
    pub index: u64,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadStats {
    pub chunks: u64,
    pub bytes: u64,
}

pub struct ChunkReader<R> {
    reader: R,
    block_size: usize,
    next_index: u64,
    finished: bool,
}

impl<R: BufRead> ChunkReader<R> {
    pub fn new(reader: R, block_size: usize) -> Self {
        Self {
            reader,
            block_size,
            next_index: 0,
            finished: false,
        }
    }

    fn read_chunk(&mut self) -> io::Result<Option<Chunk>> {
        let mut bytes = Vec::with_capacity(self.block_size + 128);
        (&mut self.reader)
            .take(self.block_size as u64)
            .read_to_end(&mut bytes)?;
        if bytes.is_empty() {
            return Ok(None);
        }
        // Pull in the rest of the last line. At EOF this leaves a newline-less tail as-is.
        if bytes.last() != Some(&NEWLINE) {
            self.reader.read_until(NEWLINE, &mut bytes)?;
        }

        let index = self.next_index;
        self.next_index += 1;
        Ok(Some(Chunk { index, bytes }))
    }

    /// Push every chunk into `queue` in file order, then close it by dropping the sender.
    ///
    /// Blocks while the queue is full. A read error stops the reader; the queue is still
    /// closed so workers drain what they have and exit.
    pub fn feed(self, queue: Sender<Chunk>) -> Result<ReadStats> {
        let mut stats = ReadStats::default();
        for chunk in self {
            let chunk = chunk.map_err(Error::Read)?;
            stats.chunks += 1;
            stats.bytes += chunk.bytes.len() as u64;
            if queue.send(chunk).is_err() {
                log::warn!("all workers are gone, stopping the reader");
                break;
            }
        }
        log::debug!(
            "finished reading {} bytes in {} chunks, closing queue",
            stats.bytes,
            stats.chunks
        );
        Ok(stats)
    }
}

impl<R: BufRead> Iterator for ChunkReader<R> {
    type Item = io::Result<Chunk>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.read_chunk() {
            Ok(Some(chunk)) => Some(Ok(chunk)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

/// Partition `data` into ranges of roughly `block_size` bytes, each ending just after a
/// `\n` or at the end of `data`.
pub fn line_aligned_blocks(data: &[u8], block_size: usize) -> Vec<Range<usize>> {
    let block_size = block_size.max(1);
    let mut blocks = Vec::with_capacity(data.len() / block_size + 1);
    let mut start = 0;
    while start < data.len() {
        let mut end = (start + block_size).min(data.len());
        if end < data.len() && data[end - 1] != NEWLINE {
            end = match memchr(NEWLINE, &data[end..]) {
                Some(offset) => end + offset + 1,
                None => data.len(),
            };
        }
        blocks.push(start..end);
        start = end;
    }
    blocks
}
