//! Splitting a dataset (or a stream of raw rows) into chunks for the worker pool.

use std::ops::Range;

use crate::error::{EngineError, EngineResult};

/// A contiguous, read-only view over part of a slice, tagged with its position in the partition.
#[derive(Debug, PartialEq)]
pub struct Chunk<'a, T> {
    /// Position of this chunk in the partition (`0..n`).
    pub index: usize,
    /// Offset of the first row in the source slice.
    pub start_row: usize,
    /// Rows in this chunk. May be empty.
    pub rows: &'a [T],
}

impl<T> Clone for Chunk<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Chunk<'_, T> {}

impl<T> Chunk<'_, T> {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Row ranges for splitting `row_count` rows into exactly `n` chunks.
///
/// `size = row_count / n`; chunks `0..n-1` hold `size` rows each and the last chunk takes the
/// remainder. When `row_count < n` the leading chunks are empty.
pub fn chunk_ranges(row_count: usize, n: usize) -> EngineResult<Vec<Range<usize>>> {
    if n == 0 {
        return Err(EngineError::partition("chunk count must be > 0"));
    }
    let size = row_count / n;
    let mut out = Vec::with_capacity(n);
    for i in 0..n - 1 {
        out.push(i * size..(i + 1) * size);
    }
    out.push((n - 1) * size..row_count);
    Ok(out)
}

/// Partition `rows` into exactly `n` chunks using [`chunk_ranges`].
pub fn partition<T>(rows: &[T], n: usize) -> EngineResult<Vec<Chunk<'_, T>>> {
    Ok(chunk_ranges(rows.len(), n)?
        .into_iter()
        .enumerate()
        .map(|(index, range)| Chunk {
            index,
            start_row: range.start,
            rows: &rows[range],
        })
        .collect())
}

/// An owned batch of rows pulled from a stream.
#[derive(Debug, Clone, PartialEq)]
pub struct RowBatch<T> {
    /// Position of this batch in the stream.
    pub index: usize,
    pub rows: Vec<T>,
}

/// Lazily groups a fallible row stream into batches of `batch_size` rows.
///
/// The final batch holds whatever remains and may be smaller. The first source error is yielded
/// once and ends the stream. The source is consumed once; the sequence cannot be restarted.
pub struct RowBatches<I> {
    source: I,
    batch_size: usize,
    next_index: usize,
    done: bool,
}

impl<I> RowBatches<I> {
    pub fn new(source: I, batch_size: usize) -> EngineResult<Self> {
        if batch_size == 0 {
            return Err(EngineError::partition("batch size must be > 0"));
        }
        Ok(Self {
            source,
            batch_size,
            next_index: 0,
            done: false,
        })
    }
}

impl<I, T, E> Iterator for RowBatches<I>
where
    I: Iterator<Item = Result<T, E>>,
{
    type Item = Result<RowBatch<T>, E>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let mut rows = Vec::with_capacity(self.batch_size);
        while rows.len() < self.batch_size {
            match self.source.next() {
                Some(Ok(row)) => rows.push(row),
                Some(Err(e)) => {
                    self.done = true;
                    return Some(Err(e));
                }
                None => {
                    self.done = true;
                    break;
                }
            }
        }
        if rows.is_empty() {
            return None;
        }
        let index = self.next_index;
        self.next_index += 1;
        Some(Ok(RowBatch { index, rows }))
    }
}
