//! Parallel CSV copy.
//!
//! The source is streamed in fixed-size batches (never fully loaded). Workers CSV-encode their
//! batch and hand the block to a [`SequentialSink`], the only owner of the destination file. The
//! header is written once, before any data block. Each batch lands contiguously; the order of
//! batches in the output follows completion order.

use std::fs::{self, File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::Local;

use crate::error::{ChunkError, EngineError, EngineResult};
use crate::execution::{
    encode_rows, ExecutionEngine, ExecutionOptions, Partial, RowBatches, SequentialSink,
    DEFAULT_SINK_CAPACITY, DEFAULT_WORKER_COUNT,
};

/// Default number of rows per batch.
pub const DEFAULT_BATCH_SIZE: usize = 50_000;

/// Default output file name prefix.
pub const DEFAULT_FILE_PREFIX: &str = "copied_file";

/// Configuration for [`copy_file`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyOptions {
    pub worker_count: usize,
    pub batch_size: usize,
    /// Output files are named `<file_prefix>_<YYYYmmdd_HHMMSS>.csv`.
    pub file_prefix: String,
}

impl Default for CopyOptions {
    fn default() -> Self {
        Self {
            worker_count: DEFAULT_WORKER_COUNT,
            batch_size: DEFAULT_BATCH_SIZE,
            file_prefix: DEFAULT_FILE_PREFIX.to_string(),
        }
    }
}

/// What a copy wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyStats {
    pub path: PathBuf,
    /// Data rows, header excluded.
    pub rows: u64,
    pub batches: usize,
    /// Bytes written, header included.
    pub bytes: u64,
}

/// Copy the CSV at `source` into a new timestamped file under `dest_folder`.
///
/// `dest_folder` is created if needed. Returns the path of the written file.
pub fn copy_file(
    source: impl AsRef<Path>,
    dest_folder: impl AsRef<Path>,
    options: &CopyOptions,
) -> EngineResult<PathBuf> {
    copy_file_with_stats(source, dest_folder, options).map(|stats| stats.path)
}

/// Like [`copy_file`], but also reports row, batch and byte totals.
///
/// Every row must have as many fields as the header. On any failure the partly written
/// destination file is removed.
pub fn copy_file_with_stats(
    source: impl AsRef<Path>,
    dest_folder: impl AsRef<Path>,
    options: &CopyOptions,
) -> EngineResult<CopyStats> {
    let source = source.as_ref();
    let dest_folder = dest_folder.as_ref();

    let engine = ExecutionEngine::new(ExecutionOptions::with_workers(options.worker_count))?;
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(source)?;
    let header = rdr.byte_headers()?.clone();
    let batches = RowBatches::new(rdr.into_byte_records(), options.batch_size)?;

    fs::create_dir_all(dest_folder)?;
    let (path, file) = create_destination(dest_folder, &options.file_prefix)?;
    log::info!(
        "copying {} -> {} ({} workers, batches of {})",
        source.display(),
        path.display(),
        options.worker_count,
        options.batch_size
    );

    let sink = match SequentialSink::from_file(file, &path, DEFAULT_SINK_CAPACITY) {
        Ok(sink) => sink,
        Err(e) => {
            discard(&path);
            return Err(e);
        }
    };
    let run = stream_into(&engine, &sink, &header, batches);
    let closed = sink.close();

    // Sink errors take precedence over the worker send errors they cause.
    let outcome = match (run, closed) {
        (_, Err(e)) | (Err(e), Ok(_)) => Err(e),
        (Ok(partials), Ok(sink_stats)) => Ok((partials, sink_stats)),
    };
    let (partials, sink_stats) = match outcome {
        Ok(done) => done,
        Err(e) => {
            log::warn!("copy to {} failed: {e}", path.display());
            discard(&path);
            return Err(e);
        }
    };

    let stats = CopyStats {
        path,
        rows: partials.iter().map(|p| p.value).sum(),
        batches: partials.len(),
        bytes: sink_stats.bytes,
    };
    log::info!(
        "copied {} rows in {} batches to {}",
        stats.rows,
        stats.batches,
        stats.path.display()
    );
    Ok(stats)
}

/// Write the header, then every batch, through `sink`. Returns the row count per batch.
fn stream_into<I>(
    engine: &ExecutionEngine,
    sink: &SequentialSink,
    header: &csv::ByteRecord,
    batches: RowBatches<I>,
) -> EngineResult<Vec<Partial<u64>>>
where
    I: Iterator<Item = csv::Result<csv::ByteRecord>> + Send,
{
    if !header.is_empty() {
        sink.write_chunk(encode_rows(std::slice::from_ref(header))?)?;
    }
    engine.run_stream(batches, |batch| {
        let block = encode_rows(&batch.rows)?;
        sink.write_chunk(block)
            .map_err(|e| ChunkError::Other(e.to_string()))?;
        Ok(batch.rows.len() as u64)
    })
}

/// Create `<prefix>_<timestamp>.csv`, or the first free `<prefix>_<timestamp>_<n>.csv`.
///
/// The file is created exclusively, so concurrent copies never share a destination.
fn create_destination(dest_folder: &Path, prefix: &str) -> EngineResult<(PathBuf, File)> {
    let stem = format!("{prefix}_{}", Local::now().format("%Y%m%d_%H%M%S"));
    let mut n = 0usize;
    loop {
        let path = if n == 0 {
            dest_folder.join(format!("{stem}.csv"))
        } else {
            dest_folder.join(format!("{stem}_{n}.csv"))
        };
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => n += 1,
            Err(e) => {
                return Err(EngineError::sink(
                    format!("cannot create {}", path.display()),
                    Some(e),
                ))
            }
        }
    }
}

fn discard(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        log::error!("cannot remove incomplete copy {}: {e}", path.display());
    }
}
