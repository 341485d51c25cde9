use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

/// Execution events emitted by the engine.
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    /// A run began. `chunks` is `None` for streamed runs, whose length is not known up front.
    RunStarted { chunks: Option<usize> },
    ThrottleWaited { duration: Duration },
    ChunkStarted { index: usize, row_count: usize },
    ChunkFinished { index: usize, row_count: usize },
    ChunkFailed { index: usize, message: String },
    /// A chunk was not executed (or its result was dropped) because another chunk failed.
    ChunkSkipped { index: usize },
    RunFinished {
        elapsed: Duration,
        metrics: ExecutionMetricsSnapshot,
    },
}

/// Observer hook for execution events.
pub trait ExecutionObserver: Send + Sync {
    fn on_event(&self, event: &ExecutionEvent);
}

/// A simple stderr logger for execution events.
#[derive(Default)]
pub struct StdErrExecutionObserver;

impl ExecutionObserver for StdErrExecutionObserver {
    fn on_event(&self, event: &ExecutionEvent) {
        eprintln!("{event:?}");
    }
}

/// Forwards execution events to the `log` facade.
///
/// Chunk-level events are logged at `debug`, failures at `warn`, run boundaries at `info`.
#[derive(Debug, Default)]
pub struct LogExecutionObserver;

impl ExecutionObserver for LogExecutionObserver {
    fn on_event(&self, event: &ExecutionEvent) {
        match event {
            ExecutionEvent::RunStarted { chunks: Some(n) } => {
                log::info!("run started: {n} chunks")
            }
            ExecutionEvent::RunStarted { chunks: None } => log::info!("streamed run started"),
            ExecutionEvent::ThrottleWaited { duration } => {
                log::debug!("waited {duration:?} for an in-flight slot")
            }
            ExecutionEvent::ChunkStarted { index, row_count } => {
                log::debug!("chunk {index} started ({row_count} rows)")
            }
            ExecutionEvent::ChunkFinished { index, row_count } => {
                log::debug!("chunk {index} finished ({row_count} rows)")
            }
            ExecutionEvent::ChunkFailed { index, message } => {
                log::warn!("chunk {index} failed: {message}")
            }
            ExecutionEvent::ChunkSkipped { index } => {
                log::debug!("chunk {index} skipped after an earlier failure")
            }
            ExecutionEvent::RunFinished { elapsed, metrics } => {
                log::info!("run finished in {elapsed:?}: {metrics}")
            }
        }
    }
}

/// Real-time metrics for an execution run.
///
/// The engine updates these counters during execution; callers can snapshot them at any time.
pub struct ExecutionMetrics {
    run_id: AtomicU64,
    elapsed_ns: AtomicU64,

    rows_processed: AtomicU64,
    chunks_started: AtomicU64,
    chunks_finished: AtomicU64,
    chunks_failed: AtomicU64,
    chunks_skipped: AtomicU64,
    throttle_wait_ns: AtomicU64,

    active_chunks: AtomicUsize,
    max_active_chunks: AtomicUsize,
}

impl ExecutionMetrics {
    pub fn new() -> Self {
        Self {
            run_id: AtomicU64::new(0),
            elapsed_ns: AtomicU64::new(0),
            rows_processed: AtomicU64::new(0),
            chunks_started: AtomicU64::new(0),
            chunks_finished: AtomicU64::new(0),
            chunks_failed: AtomicU64::new(0),
            chunks_skipped: AtomicU64::new(0),
            throttle_wait_ns: AtomicU64::new(0),
            active_chunks: AtomicUsize::new(0),
            max_active_chunks: AtomicUsize::new(0),
        }
    }

    pub fn begin_run(&self) {
        self.run_id.fetch_add(1, Ordering::SeqCst);
        self.elapsed_ns.store(0, Ordering::SeqCst);
        self.rows_processed.store(0, Ordering::SeqCst);
        self.chunks_started.store(0, Ordering::SeqCst);
        self.chunks_finished.store(0, Ordering::SeqCst);
        self.chunks_failed.store(0, Ordering::SeqCst);
        self.chunks_skipped.store(0, Ordering::SeqCst);
        self.throttle_wait_ns.store(0, Ordering::SeqCst);
        self.active_chunks.store(0, Ordering::SeqCst);
        self.max_active_chunks.store(0, Ordering::SeqCst);
    }

    pub fn end_run(&self, elapsed: Duration) {
        self.elapsed_ns
            .store(elapsed.as_nanos().min(u64::MAX as u128) as u64, Ordering::SeqCst);
    }

    pub fn on_chunk_start(&self) {
        self.chunks_started.fetch_add(1, Ordering::SeqCst);
        let now = self.active_chunks.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active_chunks.fetch_max(now, Ordering::SeqCst);
    }

    /// Marks a started chunk as done; `failed` chunks do not count their rows.
    pub fn on_chunk_end(&self, rows: usize, failed: bool) {
        if failed {
            self.chunks_failed.fetch_add(1, Ordering::SeqCst);
        } else {
            self.chunks_finished.fetch_add(1, Ordering::SeqCst);
            self.rows_processed.fetch_add(rows as u64, Ordering::SeqCst);
        }
        self.active_chunks.fetch_sub(1, Ordering::SeqCst);
    }

    /// Marks a started chunk whose result was dropped because the run was cancelled meanwhile.
    pub fn on_chunk_discarded(&self) {
        self.chunks_skipped.fetch_add(1, Ordering::SeqCst);
        self.active_chunks.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn on_chunk_skipped(&self) {
        self.chunks_skipped.fetch_add(1, Ordering::SeqCst);
    }

    pub fn on_throttle_wait(&self, d: Duration) {
        let add = d.as_nanos().min(u64::MAX as u128) as u64;
        self.throttle_wait_ns.fetch_add(add, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> ExecutionMetricsSnapshot {
        let elapsed_ns = self.elapsed_ns.load(Ordering::SeqCst);
        let elapsed = if elapsed_ns > 0 {
            Some(Duration::from_nanos(elapsed_ns))
        } else {
            None
        };

        ExecutionMetricsSnapshot {
            run_id: self.run_id.load(Ordering::SeqCst),
            elapsed,
            rows_processed: self.rows_processed.load(Ordering::SeqCst),
            chunks_started: self.chunks_started.load(Ordering::SeqCst),
            chunks_finished: self.chunks_finished.load(Ordering::SeqCst),
            chunks_failed: self.chunks_failed.load(Ordering::SeqCst),
            chunks_skipped: self.chunks_skipped.load(Ordering::SeqCst),
            throttle_wait: Duration::from_nanos(self.throttle_wait_ns.load(Ordering::SeqCst)),
            max_active_chunks: self.max_active_chunks.load(Ordering::SeqCst),
        }
    }
}

impl Default for ExecutionMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Immutable snapshot of [`ExecutionMetrics`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionMetricsSnapshot {
    pub run_id: u64,
    pub elapsed: Option<Duration>,
    pub rows_processed: u64,
    pub chunks_started: u64,
    pub chunks_finished: u64,
    pub chunks_failed: u64,
    pub chunks_skipped: u64,
    pub throttle_wait: Duration,
    pub max_active_chunks: usize,
}

impl fmt::Display for ExecutionMetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "run_id={}, rows_processed={}, chunks={}/{} (failed={}, skipped={}), max_active_chunks={}, throttle_wait={:?}, elapsed={:?}",
            self.run_id,
            self.rows_processed,
            self.chunks_finished,
            self.chunks_started,
            self.chunks_failed,
            self.chunks_skipped,
            self.max_active_chunks,
            self.throttle_wait,
            self.elapsed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::{
        ExecutionEvent, ExecutionMetrics, ExecutionObserver, LogExecutionObserver, StdErrExecutionObserver,
    };
    use std::time::Duration;

    #[test]
    fn metrics_reset_per_run_and_skip_failed_rows() {
        let m = ExecutionMetrics::new();
        m.begin_run();
        m.on_chunk_start();
        m.on_chunk_start();
        m.on_chunk_end(10, false);
        m.on_chunk_end(7, true);
        m.on_chunk_skipped();
        m.on_throttle_wait(Duration::from_millis(2));
        m.end_run(Duration::from_millis(5));

        let snap = m.snapshot();
        assert_eq!(snap.run_id, 1);
        assert_eq!(snap.rows_processed, 10);
        assert_eq!((snap.chunks_started, snap.chunks_finished), (2, 1));
        assert_eq!((snap.chunks_failed, snap.chunks_skipped), (1, 1));
        assert_eq!(snap.max_active_chunks, 2);
        assert_eq!(snap.throttle_wait, Duration::from_millis(2));
        assert_eq!(snap.elapsed, Some(Duration::from_millis(5)));
        assert!(snap.to_string().contains("chunks=1/2 (failed=1, skipped=1)"));

        m.begin_run();
        let snap = m.snapshot();
        assert_eq!(snap.run_id, 2);
        assert_eq!(snap.rows_processed, 0);
        assert_eq!(snap.elapsed, None);
    }

    #[test]
    fn builtin_observers_accept_every_event() {
        let events = [
            ExecutionEvent::RunStarted { chunks: Some(2) },
            ExecutionEvent::RunStarted { chunks: None },
            ExecutionEvent::ThrottleWaited {
                duration: Duration::from_millis(1),
            },
            ExecutionEvent::ChunkStarted { index: 0, row_count: 3 },
            ExecutionEvent::ChunkFinished { index: 0, row_count: 3 },
            ExecutionEvent::ChunkFailed {
                index: 1,
                message: "row 4: bad".to_string(),
            },
            ExecutionEvent::ChunkSkipped { index: 2 },
            ExecutionEvent::RunFinished {
                elapsed: Duration::from_millis(3),
                metrics: ExecutionMetrics::new().snapshot(),
            },
        ];
        let observers: [&dyn ExecutionObserver; 2] = [&LogExecutionObserver, &StdErrExecutionObserver];
        for obs in observers {
            for e in &events {
                obs.on_event(e);
            }
        }
    }
}
