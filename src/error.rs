use thiserror::Error;

/// Convenience result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Failure raised by a map-function for a single chunk.
///
/// The worker pool wraps it in [`EngineError::Computation`] together with the chunk index.
#[derive(Debug, Error)]
pub enum ChunkError {
    /// A row in the chunk cannot be processed by the operation.
    #[error("row {row}: {message}")]
    InvalidRow { row: usize, message: String },

    /// Any other failure reported by a map-function.
    #[error("{0}")]
    Other(String),

    /// Underlying I/O error while handling the chunk.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV encoding error while handling the chunk.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

/// Error type returned by the chunked execution engine and the operations built on it.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Invalid partitioning request (zero workers, zero chunks, zero batch size, ...).
    #[error("partition error: {message}")]
    Partition { message: String },

    /// A chunk's map-function failed. No merged result is produced.
    #[error("computation failed in chunk {chunk_index}: {source}")]
    Computation {
        chunk_index: usize,
        #[source]
        source: ChunkError,
    },

    /// A reducer invariant was violated (missing, duplicated or misordered partial results).
    #[error("merge error: {message}")]
    Merge { message: String },

    /// The destination of a [`crate::execution::SequentialSink`] could not be opened, written or
    /// flushed.
    #[error("sink error: {message}")]
    Sink {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// Reading the source of a streamed run failed.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// Underlying I/O error outside of the sink (e.g. creating the destination folder).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The per-invocation worker pool could not be built.
    #[error("thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl EngineError {
    pub(crate) fn partition(message: impl Into<String>) -> Self {
        Self::Partition {
            message: message.into(),
        }
    }

    pub(crate) fn merge(message: impl Into<String>) -> Self {
        Self::Merge {
            message: message.into(),
        }
    }

    pub(crate) fn sink(message: impl Into<String>, source: Option<std::io::Error>) -> Self {
        Self::Sink {
            message: message.into(),
            source,
        }
    }

    /// Index of the failing chunk for [`EngineError::Computation`].
    pub fn chunk_index(&self) -> Option<usize> {
        match self {
            Self::Computation { chunk_index, .. } => Some(*chunk_index),
            _ => None,
        }
    }
}
