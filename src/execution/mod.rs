//! Chunked parallel execution.
//!
//! This module sits "below" [`crate::analysis`] and provides:
//!
//! - Partitioning of a slice into a fixed number of chunks, or of a row stream into batches
//! - A per-invocation worker pool that runs a map-function over every chunk
//! - Throttling of in-flight chunks, real-time metrics and observer hooks
//! - A [`SequentialSink`] that serializes concurrent writes into one file
//!
//! Results always come back ordered by chunk index, whatever order the chunks completed in. If
//! any chunk fails, no results are returned at all.

mod observer;
mod partition;
mod semaphore;
mod sink;

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::error::{ChunkError, EngineError, EngineResult};

pub use observer::{
    ExecutionEvent, ExecutionMetrics, ExecutionMetricsSnapshot, ExecutionObserver, LogExecutionObserver,
    StdErrExecutionObserver,
};
pub use partition::{chunk_ranges, partition, Chunk, RowBatch, RowBatches};
pub use sink::{encode_rows, SequentialSink, SinkStats, DEFAULT_SINK_CAPACITY};

use semaphore::Semaphore;

/// Default worker count, matching the four-process pool the analytics were designed around.
pub const DEFAULT_WORKER_COUNT: usize = 4;

/// Configuration for the [`ExecutionEngine`].
#[derive(Clone)]
pub struct ExecutionOptions {
    /// Number of worker threads in the per-invocation pool.
    pub worker_count: usize,
    /// Number of chunks a dataset is split into.
    ///
    /// If `None`, one chunk per worker.
    pub chunk_count: Option<usize>,
    /// Upper bound on concurrently executing chunks.
    ///
    /// If `None`, equal to `worker_count`.
    pub max_in_flight_chunks: Option<usize>,
    /// Optional observer for execution events.
    pub observer: Option<Arc<dyn ExecutionObserver>>,
}

impl ExecutionOptions {
    /// Options with `worker_count` workers and one chunk per worker.
    pub fn with_workers(worker_count: usize) -> Self {
        Self {
            worker_count,
            ..Self::default()
        }
    }

    /// Effective number of chunks.
    pub fn effective_chunk_count(&self) -> usize {
        self.chunk_count.unwrap_or(self.worker_count)
    }

    fn validate(&self) -> EngineResult<()> {
        if self.worker_count == 0 {
            return Err(EngineError::partition("worker_count must be > 0"));
        }
        if self.chunk_count == Some(0) {
            return Err(EngineError::partition("chunk_count must be > 0 when set"));
        }
        if self.max_in_flight_chunks == Some(0) {
            return Err(EngineError::partition(
                "max_in_flight_chunks must be > 0 when set",
            ));
        }
        Ok(())
    }
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        Self {
            worker_count: DEFAULT_WORKER_COUNT,
            chunk_count: None,
            max_in_flight_chunks: None,
            observer: None,
        }
    }
}

impl fmt::Debug for ExecutionOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionOptions")
            .field("worker_count", &self.worker_count)
            .field("chunk_count", &self.chunk_count)
            .field("max_in_flight_chunks", &self.max_in_flight_chunks)
            .field("observer_set", &self.observer.is_some())
            .finish()
    }
}

/// Output of one chunk, tagged with the chunk it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Partial<P> {
    pub chunk_index: usize,
    pub value: P,
}

/// A bounded worker pool for one invocation.
///
/// The engine owns a private rayon pool; dropping the engine shuts the pool down, so nothing
/// leaks between unrelated calls.
pub struct ExecutionEngine {
    pool: ThreadPool,
    opts: ExecutionOptions,
    observer: Option<Arc<dyn ExecutionObserver>>,
    metrics: Arc<ExecutionMetrics>,
}

impl ExecutionEngine {
    /// Create a new engine with the given options.
    pub fn new(opts: ExecutionOptions) -> EngineResult<Self> {
        opts.validate()?;

        let pool = ThreadPoolBuilder::new()
            .num_threads(opts.worker_count)
            .thread_name(|i| format!("chunk-worker-{i}"))
            .build()?;

        Ok(Self {
            pool,
            observer: opts.observer.clone(),
            opts,
            metrics: Arc::new(ExecutionMetrics::new()),
        })
    }

    /// Get a handle to real-time execution metrics.
    pub fn metrics(&self) -> Arc<ExecutionMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Partition `rows` into the configured number of chunks and run `map_fn` on each.
    pub fn map_partitions<T, P, F>(&self, rows: &[T], map_fn: F) -> EngineResult<Vec<Partial<P>>>
    where
        T: Sync,
        P: Send,
        F: Fn(Chunk<'_, T>) -> Result<P, ChunkError> + Send + Sync,
    {
        let chunks = partition(rows, self.opts.effective_chunk_count())?;
        self.run_chunks(chunks, map_fn)
    }

    /// Run `map_fn` over every chunk on the pool.
    ///
    /// `result[i]` always corresponds to `chunks[i]`. On the first failure the remaining chunks
    /// are skipped where they have not started yet; the failure with the lowest chunk index is
    /// returned as [`EngineError::Computation`].
    pub fn run_chunks<'a, T, P, F>(
        &self,
        chunks: Vec<Chunk<'a, T>>,
        map_fn: F,
    ) -> EngineResult<Vec<Partial<P>>>
    where
        T: Sync,
        P: Send,
        F: Fn(Chunk<'a, T>) -> Result<P, ChunkError> + Send + Sync,
    {
        let start = self.begin(Some(chunks.len()));
        let sem = self.semaphore();
        let cancelled = AtomicBool::new(false);

        let outcomes: Vec<Option<Result<P, ChunkError>>> = self.pool.install(|| {
            chunks
                .into_par_iter()
                .map(|chunk| {
                    self.execute(&sem, &cancelled, chunk.index, chunk.len(), || map_fn(chunk))
                })
                .collect()
        });

        let out = collect_outcomes(outcomes);
        self.finish(start);
        out
    }

    /// Run `map_fn` over a lazily produced sequence of batches.
    ///
    /// Batches are pulled from `batches` as workers become free. A source error stops the run
    /// and is returned as-is; map failures behave as in [`ExecutionEngine::run_chunks`]. Once the
    /// run is cancelled no further batch is pulled from the source.
    /// Returned partials are ordered by batch index.
    pub fn run_stream<I, T, E, P, F>(&self, batches: I, map_fn: F) -> EngineResult<Vec<Partial<P>>>
    where
        I: Iterator<Item = Result<RowBatch<T>, E>> + Send,
        T: Send,
        E: Into<EngineError> + Send,
        P: Send,
        F: Fn(RowBatch<T>) -> Result<P, ChunkError> + Send + Sync,
    {
        let start = self.begin(None);
        let sem = self.semaphore();
        let cancelled = AtomicBool::new(false);

        let mut batches = batches;
        let source = std::iter::from_fn(|| {
            if cancelled.load(Ordering::SeqCst) {
                None
            } else {
                batches.next()
            }
        });

        let outcomes: Vec<Result<(usize, Option<Result<P, ChunkError>>), E>> =
            self.pool.install(|| {
                source
                    .par_bridge()
                    .map(|item| {
                        let batch = match item {
                            Ok(batch) => batch,
                            Err(e) => {
                                cancelled.store(true, Ordering::SeqCst);
                                return Err(e);
                            }
                        };
                        let index = batch.index;
                        let rows = batch.rows.len();
                        Ok((
                            index,
                            self.execute(&sem, &cancelled, index, rows, || map_fn(batch)),
                        ))
                    })
                    .collect()
            });

        let mut indexed = Vec::with_capacity(outcomes.len());
        let mut source_error = None;
        for outcome in outcomes {
            match outcome {
                Ok(pair) => indexed.push(pair),
                Err(e) => {
                    source_error.get_or_insert(e);
                }
            }
        }

        let out = match source_error {
            Some(e) => Err(e.into()),
            None => {
                indexed.sort_by_key(|(index, _)| *index);
                let expected: Vec<usize> = (0..indexed.len()).collect();
                let actual: Vec<usize> = indexed.iter().map(|(i, _)| *i).collect();
                if expected != actual {
                    Err(EngineError::merge(format!(
                        "stream produced non-contiguous batch indexes: {actual:?}"
                    )))
                } else {
                    collect_outcomes(indexed.into_iter().map(|(_, o)| o).collect())
                }
            }
        };
        self.finish(start);
        out
    }

    /// Run a single chunk under the in-flight throttle. `None` means the chunk was skipped or its
    /// result discarded because another chunk already failed.
    fn execute<P>(
        &self,
        sem: &Semaphore,
        cancelled: &AtomicBool,
        index: usize,
        row_count: usize,
        work: impl FnOnce() -> Result<P, ChunkError>,
    ) -> Option<Result<P, ChunkError>> {
        if cancelled.load(Ordering::SeqCst) {
            self.skip(index);
            return None;
        }

        let permit = sem.acquire();
        if permit.waited > Duration::ZERO {
            self.metrics.on_throttle_wait(permit.waited);
            self.emit(ExecutionEvent::ThrottleWaited {
                duration: permit.waited,
            });
        }
        if cancelled.load(Ordering::SeqCst) {
            self.skip(index);
            return None;
        }

        self.metrics.on_chunk_start();
        self.emit(ExecutionEvent::ChunkStarted { index, row_count });

        let result = work();
        drop(permit);

        match result {
            // Finished after another chunk failed: the result is discarded.
            Ok(_) if cancelled.load(Ordering::SeqCst) => {
                self.metrics.on_chunk_discarded();
                self.emit(ExecutionEvent::ChunkSkipped { index });
                None
            }
            Ok(value) => {
                self.metrics.on_chunk_end(row_count, false);
                self.emit(ExecutionEvent::ChunkFinished { index, row_count });
                Some(Ok(value))
            }
            Err(e) => {
                cancelled.store(true, Ordering::SeqCst);
                self.metrics.on_chunk_end(row_count, true);
                self.emit(ExecutionEvent::ChunkFailed {
                    index,
                    message: e.to_string(),
                });
                Some(Err(e))
            }
        }
    }

    fn semaphore(&self) -> Semaphore {
        Semaphore::new(
            self.opts
                .max_in_flight_chunks
                .unwrap_or(self.opts.worker_count),
        )
    }

    fn begin(&self, chunks: Option<usize>) -> Instant {
        self.metrics.begin_run();
        self.emit(ExecutionEvent::RunStarted { chunks });
        Instant::now()
    }

    fn finish(&self, start: Instant) {
        let elapsed = start.elapsed();
        self.metrics.end_run(elapsed);
        self.emit(ExecutionEvent::RunFinished {
            elapsed,
            metrics: self.metrics.snapshot(),
        });
    }

    fn skip(&self, index: usize) {
        self.metrics.on_chunk_skipped();
        self.emit(ExecutionEvent::ChunkSkipped { index });
    }

    fn emit(&self, event: ExecutionEvent) {
        if let Some(obs) = &self.observer {
            obs.on_event(&event);
        }
    }
}

/// Turn per-chunk outcomes (in chunk order) into ordered partials, or the first failure.
fn collect_outcomes<P>(outcomes: Vec<Option<Result<P, ChunkError>>>) -> EngineResult<Vec<Partial<P>>> {
    let mut values = Vec::with_capacity(outcomes.len());
    let mut skipped = None;
    for (chunk_index, outcome) in outcomes.into_iter().enumerate() {
        match outcome {
            Some(Ok(value)) => values.push(Partial { chunk_index, value }),
            Some(Err(source)) => return Err(EngineError::Computation { chunk_index, source }),
            None => {
                skipped.get_or_insert(chunk_index);
            }
        }
    }
    match skipped {
        // Only reachable if a chunk was skipped without any recorded failure.
        Some(index) => Err(EngineError::merge(format!(
            "chunk {index} produced no result"
        ))),
        None => Ok(values),
    }
}
