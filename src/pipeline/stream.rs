//! Producer worker that prepares chunk files one at a time.
//!
//! The producer orders each source batch, splits it on artifact boundaries,
//! writes each chunk to a temp file and posts the path on a single-slot
//! channel. It then blocks until the consumer acknowledges the chunk, so at
//! most one prepared chunk exists besides the one being ingested.

use std::path::PathBuf;
use std::thread::JoinHandle;

use arrow::array::RecordBatch;
use crossbeam_channel::{Receiver, Sender, bounded};
use tempfile::TempPath;

use super::chunks::{order_rows, split_at_artifacts};
use crate::error::{ReconstructError, Result};
use crate::io::write_chunk;

enum ChunkMessage {
    Chunk(TempPath),
    Done,
}

/// Handle to a running producer thread.
pub(crate) struct ChunkProducer {
    chunks: Receiver<ChunkMessage>,
    ack: Sender<()>,
    handle: JoinHandle<Result<()>>,
}

impl ChunkProducer {
    pub(crate) fn spawn<I>(sources: I, chunk_size: usize, temp_dir: Option<PathBuf>) -> Result<Self>
    where
        I: Iterator<Item = Result<RecordBatch>> + Send + 'static,
    {
        let (chunk_tx, chunks) = bounded(1);
        let (ack, ack_rx) = bounded(1);
        let handle = std::thread::Builder::new()
            .name("hstrat-chunk-producer".into())
            .spawn(move || produce(sources, chunk_size, temp_dir, &chunk_tx, &ack_rx))?;
        Ok(Self {
            chunks,
            ack,
            handle,
        })
    }

    /// Next chunk file, or `None` once the producer signals end of stream.
    ///
    /// A producer that hangs up without signalling yields a `Worker` error;
    /// [`ChunkProducer::join`] recovers the underlying cause.
    pub(crate) fn next_chunk(&self) -> Result<Option<TempPath>> {
        match self.chunks.recv() {
            Ok(ChunkMessage::Chunk(path)) => Ok(Some(path)),
            Ok(ChunkMessage::Done) => Ok(None),
            Err(_) => Err(ReconstructError::Worker {
                reason: "producer stopped before end of stream".into(),
            }),
        }
    }

    /// Mark the current chunk consumed, releasing the producer.
    pub(crate) fn acknowledge(&self) {
        // A producer that already exited has nothing left to release.
        let _ = self.ack.send(());
    }

    /// Hang up and wait for the producer thread.
    pub(crate) fn join(self) -> Result<()> {
        let Self {
            chunks,
            ack,
            handle,
        } = self;
        drop(ack);
        // Dropping the receiver deletes any chunk still queued.
        drop(chunks);
        match handle.join() {
            Ok(result) => result,
            Err(_) => Err(ReconstructError::Worker {
                reason: "producer thread panicked".into(),
            }),
        }
    }
}

fn produce<I>(
    sources: I,
    chunk_size: usize,
    temp_dir: Option<PathBuf>,
    chunks: &Sender<ChunkMessage>,
    ack: &Receiver<()>,
) -> Result<()>
where
    I: Iterator<Item = Result<RecordBatch>>,
{
    let mut produced = 0usize;
    for source in sources {
        let ordered = order_rows(&source?)?;
        for chunk in split_at_artifacts(&ordered, chunk_size)? {
            let path = write_chunk(&chunk, temp_dir.as_deref())?;
            tracing::debug!(
                chunk.index = produced,
                chunk.rows = chunk.num_rows(),
                "chunk prepared"
            );
            produced += 1;
            // A send error hands the path back; dropping it removes the file.
            if chunks.send(ChunkMessage::Chunk(path)).is_err() || ack.recv().is_err() {
                tracing::debug!("consumer hung up; producer stopping");
                return Ok(());
            }
        }
    }
    // The consumer may already be gone after an error of its own.
    let _ = chunks.send(ChunkMessage::Done);
    Ok(())
}
