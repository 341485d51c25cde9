//! Single-owner output sink.
//!
//! Workers never touch the destination file. They hand finished blocks to [`SequentialSink`],
//! which forwards them over a bounded channel to one writer thread that appends each block with a
//! single `write_all`. Blocks therefore never interleave and rows inside a block stay contiguous.
//! Blocks land in arrival order, which need not match chunk index.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, Sender};

use crate::error::{EngineError, EngineResult};

/// Default number of blocks that may wait in the channel before writers block.
pub const DEFAULT_SINK_CAPACITY: usize = 16;

/// Totals reported when a sink is closed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SinkStats {
    pub blocks: u64,
    pub bytes: u64,
}

/// Serializes concurrently produced blocks into one destination file.
///
/// The destination is released when [`SequentialSink::close`] is called or when the sink is
/// dropped, whichever comes first.
pub struct SequentialSink {
    path: PathBuf,
    sender: Option<Sender<Vec<u8>>>,
    writer: Option<JoinHandle<EngineResult<SinkStats>>>,
}

impl SequentialSink {
    /// Open (create or append to) `path` and start the writer thread.
    pub fn open(path: impl AsRef<Path>) -> EngineResult<Self> {
        Self::open_with_capacity(path, DEFAULT_SINK_CAPACITY)
    }

    pub fn open_with_capacity(path: impl AsRef<Path>, capacity: usize) -> EngineResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| EngineError::sink(format!("cannot open {}", path.display()), Some(e)))?;
        Self::from_file(file, path, capacity)
    }

    /// Start the writer thread over an already opened `file`. `path` is used for messages and
    /// [`SequentialSink::path`].
    pub fn from_file(file: File, path: impl Into<PathBuf>, capacity: usize) -> EngineResult<Self> {
        let path = path.into();
        let (sender, receiver) = bounded::<Vec<u8>>(capacity.max(1));
        let writer_path = path.clone();
        let writer = thread::Builder::new()
            .name("sequential-sink".to_string())
            .spawn(move || write_loop(file, receiver, writer_path))
            .map_err(|e| EngineError::sink("cannot start writer thread", Some(e)))?;

        Ok(Self {
            path,
            sender: Some(sender),
            writer: Some(writer),
        })
    }

    /// Destination path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Queue one block for appending. Blocks while the channel is full.
    ///
    /// Fails if the writer thread has stopped (e.g. after a write error); the underlying cause is
    /// returned by [`SequentialSink::close`].
    pub fn write_chunk(&self, block: Vec<u8>) -> EngineResult<()> {
        if block.is_empty() {
            return Ok(());
        }
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| EngineError::sink("sink already closed", None))?;
        sender
            .send(block)
            .map_err(|_| EngineError::sink(format!("writer for {} stopped", self.path.display()), None))
    }

    /// Stop accepting blocks, wait for the writer to drain and flush, and release the file.
    pub fn close(mut self) -> EngineResult<SinkStats> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> EngineResult<SinkStats> {
        // Dropping the sender ends the writer's receive loop.
        self.sender.take();
        match self.writer.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| EngineError::sink("writer thread panicked", None))?,
            None => Err(EngineError::sink("sink already closed", None)),
        }
    }
}

impl Drop for SequentialSink {
    fn drop(&mut self) {
        if self.writer.is_some() {
            if let Err(e) = self.shutdown() {
                log::error!("closing sink for {} failed: {e}", self.path.display());
            }
        }
    }
}

fn write_loop(file: File, receiver: Receiver<Vec<u8>>, path: PathBuf) -> EngineResult<SinkStats> {
    log::debug!("sink writer started for {}", path.display());
    let mut out = BufWriter::new(file);
    let mut stats = SinkStats::default();

    for block in receiver {
        if let Err(e) = out.write_all(&block) {
            log::error!("sink write to {} failed: {e}", path.display());
            return Err(EngineError::sink(format!("cannot write {}", path.display()), Some(e)));
        }
        stats.blocks += 1;
        stats.bytes += block.len() as u64;
    }

    out.flush()
        .map_err(|e| EngineError::sink(format!("cannot flush {}", path.display()), Some(e)))?;
    log::debug!(
        "sink writer for {} finished: {} blocks, {} bytes",
        path.display(),
        stats.blocks,
        stats.bytes
    );
    Ok(stats)
}

/// Encode rows as one CSV block (no header), ready for [`SequentialSink::write_chunk`].
///
/// Field bytes are written as-is; no text encoding is assumed.
pub fn encode_rows(rows: &[csv::ByteRecord]) -> csv::Result<Vec<u8>> {
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    for row in rows {
        wtr.write_byte_record(row)?;
    }
    wtr.into_inner().map_err(|e| csv::Error::from(e.into_error()))
}

#[cfg(test)]
mod tests {
    use super::{encode_rows, SequentialSink};
    use crate::error::EngineError;

    #[test]
    fn close_reports_blocks_and_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");

        let sink = SequentialSink::open(&path).unwrap();
        sink.write_chunk(b"a,1\n".to_vec()).unwrap();
        sink.write_chunk(Vec::new()).unwrap();
        sink.write_chunk(b"b,2\nc,3\n".to_vec()).unwrap();
        let stats = sink.close().unwrap();

        assert_eq!(stats.blocks, 2);
        assert_eq!(stats.bytes, 12);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "a,1\nb,2\nc,3\n");
    }

    #[test]
    fn drop_flushes_destination() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        {
            let sink = SequentialSink::open(&path).unwrap();
            sink.write_chunk(b"x\n".to_vec()).unwrap();
        }
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "x\n");
    }

    #[test]
    fn open_fails_for_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("out.csv");
        let err = SequentialSink::open(&path).err().unwrap();
        assert!(matches!(err, EngineError::Sink { source: Some(_), .. }));
    }

    #[test]
    fn encode_rows_quotes_fields() {
        let rows = vec![
            csv::ByteRecord::from(vec!["a", "b,c"]),
            csv::ByteRecord::from(vec!["1", "2"]),
        ];
        let block = encode_rows(&rows).unwrap();
        assert_eq!(String::from_utf8(block).unwrap(), "a,\"b,c\"\n1,2\n");
    }

    #[test]
    fn encode_rows_keeps_non_utf8_bytes() {
        let rows = vec![csv::ByteRecord::from(vec![&b"Caf\xe9"[..], &b"1"[..]])];
        assert_eq!(encode_rows(&rows).unwrap(), b"Caf\xe9,1\n".to_vec());
    }

    #[test]
    fn from_file_writes_through_the_given_handle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fresh.csv");
        let file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .unwrap();
        let sink = SequentialSink::from_file(file, &path, 4).unwrap();
        assert_eq!(sink.path(), path.as_path());
        sink.write_chunk(b"h\n".to_vec()).unwrap();
        sink.close().unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "h\n");
    }
}
