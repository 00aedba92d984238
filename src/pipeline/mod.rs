//! Reconstruction pipeline: dataframe in, phylogeny dataframe out.
//!
//! Responsibilities:
//! - Unpack packed populations and extract the surface metadata.
//! - Stream artifact-aligned chunks from a producer thread into a [`SearchTable`].
//! - Collapse detached unifurcations between chunks, then finalize and
//!   materialize the phylogeny with pass-through columns joined on `data_id`.

pub mod chunks;
pub mod materialize;
pub(crate) mod stream;

use std::sync::Arc;

use arrow::array::{Array, RecordBatch, UInt64Array};
use arrow::compute::take_record_batch;
use arrow::datatypes::{Field, Schema};

pub use materialize::phylogeny_schema;

use self::chunks::artifact_runs;
use self::materialize::{PassthroughRows, materialize};
use self::stream::ChunkProducer;
use crate::constants::{COL_DATA_ID, COL_T, COL_TBAR, COL_VALUE};
use crate::error::{ReconstructError, Result};
use crate::frame;
use crate::io::read_chunk;
use crate::trie::{SearchTable, count_root_children, invariants};
use crate::types::{ReconstructOptions, ReconstructStats, SurfaceMeta};
use crate::unpack::{PackedUnpacker, Unpacker, surface_meta};

/// Reconstruct a phylogeny from a packed population.
pub fn reconstruct(packed: &RecordBatch, options: &ReconstructOptions) -> Result<RecordBatch> {
    reconstruct_with_stats(packed, options).map(|(phylogeny, _)| phylogeny)
}

pub fn reconstruct_with_stats(
    packed: &RecordBatch,
    options: &ReconstructOptions,
) -> Result<(RecordBatch, ReconstructStats)> {
    reconstruct_with_unpacker(&PackedUnpacker, packed, options)
}

/// [`reconstruct_with_stats`] through a caller-supplied [`Unpacker`].
pub fn reconstruct_with_unpacker<U: Unpacker + ?Sized>(
    unpacker: &U,
    packed: &RecordBatch,
    options: &ReconstructOptions,
) -> Result<(RecordBatch, ReconstructStats)> {
    let declared = passthrough_of(packed.schema().as_ref());
    if packed.num_rows() == 0 {
        return Ok(empty(&declared));
    }
    let Some(meta) = surface_meta(packed)? else {
        return Ok(empty(&declared));
    };
    let long = unpacker.unpack(packed)?;
    tracing::info!(
        pipeline.packed_rows = packed.num_rows(),
        pipeline.unpacked_rows = long.num_rows(),
        surface.dstream_s = meta.dstream_s,
        surface.differentia_bitwidth = meta.differentia_bitwidth,
        "unpacked population"
    );
    run(std::iter::once(Ok(long)), meta, options, declared)
}

/// Reconstruct from an already-unpacked long table in any row order.
pub fn reconstruct_unpacked(
    long: &RecordBatch,
    meta: SurfaceMeta,
    options: &ReconstructOptions,
) -> Result<RecordBatch> {
    reconstruct_unpacked_with_stats(long, meta, options).map(|(phylogeny, _)| phylogeny)
}

pub fn reconstruct_unpacked_with_stats(
    long: &RecordBatch,
    meta: SurfaceMeta,
    options: &ReconstructOptions,
) -> Result<(RecordBatch, ReconstructStats)> {
    let declared = passthrough_of(long.schema().as_ref());
    run(std::iter::once(Ok(long.clone())), meta, options, declared)
}

/// Reconstruct from a stream of long-table batches.
///
/// Each batch must hold whole artifacts, and batches must arrive in
/// nondecreasing `T`; rows within a batch may be in any order.
pub fn reconstruct_stream<I>(
    batches: I,
    meta: SurfaceMeta,
    options: &ReconstructOptions,
) -> Result<RecordBatch>
where
    I: IntoIterator<Item = RecordBatch>,
    I::IntoIter: Send + 'static,
{
    reconstruct_stream_with_stats(batches, meta, options).map(|(phylogeny, _)| phylogeny)
}

pub fn reconstruct_stream_with_stats<I>(
    batches: I,
    meta: SurfaceMeta,
    options: &ReconstructOptions,
) -> Result<(RecordBatch, ReconstructStats)>
where
    I: IntoIterator<Item = RecordBatch>,
    I::IntoIter: Send + 'static,
{
    run(batches.into_iter().map(Ok), meta, options, Vec::new())
}

fn passthrough_of(schema: &Schema) -> Vec<Arc<Field>> {
    frame::passthrough_fields(schema)
        .into_iter()
        .map(|(_, field)| field)
        .collect()
}

fn empty(passthrough: &[Arc<Field>]) -> (RecordBatch, ReconstructStats) {
    (
        RecordBatch::new_empty(phylogeny_schema(passthrough)),
        ReconstructStats::default(),
    )
}

fn run<I>(
    sources: I,
    meta: SurfaceMeta,
    options: &ReconstructOptions,
    declared: Vec<Arc<Field>>,
) -> Result<(RecordBatch, ReconstructStats)>
where
    I: Iterator<Item = Result<RecordBatch>> + Send + 'static,
{
    let producer = ChunkProducer::spawn(
        sources,
        options.effective_chunk_size(),
        options.temp_dir.clone(),
    )?;
    let mut ingest = Ingest::new(options);
    let consumed = ingest.consume(&producer);
    let joined = producer.join();
    match (consumed, joined) {
        (Ok(()), Ok(())) => {}
        // The producer's own error explains why it hung up.
        (Err(ReconstructError::Worker { .. }), Err(err)) => return Err(err),
        (Err(err), _) | (Ok(()), Err(err)) => return Err(err),
    }
    ingest.finish(meta, declared)
}

/// Consumer-side state: the search table plus everything needed to
/// materialize the result.
struct Ingest<'a> {
    options: &'a ReconstructOptions,
    table: SearchTable,
    stats: ReconstructStats,
    passthrough: Option<Vec<(usize, Arc<Field>)>>,
    rows: PassthroughRows,
    ranks: Vec<u64>,
    differentia: Vec<u64>,
}

impl<'a> Ingest<'a> {
    fn new(options: &'a ReconstructOptions) -> Self {
        Self {
            options,
            table: SearchTable::new(),
            stats: ReconstructStats::default(),
            passthrough: None,
            rows: PassthroughRows::default(),
            ranks: Vec::new(),
            differentia: Vec::new(),
        }
    }

    fn consume(&mut self, producer: &ChunkProducer) -> Result<()> {
        while let Some(path) = producer.next_chunk()? {
            let batches = read_chunk(&path)?;
            drop(path);
            for batch in &batches {
                self.ingest_batch(batch)?;
            }
            self.stats.chunks += 1;
            self.stats.observe_records(self.table.records().size());

            if self.options.collapse_due(self.stats.chunks as usize) {
                let before = self.table.records().size();
                let removed = self.table.collapse_dropped();
                self.stats.collapses += 1;
                tracing::debug!(
                    trie.records_before = before,
                    trie.records_removed = removed,
                    "dropped-only collapse"
                );
            }
            if self.options.check_invariants {
                self.table.check_invariants()?;
            }
            tracing::info!(
                chunk.index = self.stats.chunks - 1,
                pipeline.artifacts = self.stats.artifacts,
                trie.records = self.table.records().size(),
                "chunk consumed"
            );
            producer.acknowledge();
        }
        Ok(())
    }

    fn ingest_batch(&mut self, batch: &RecordBatch) -> Result<()> {
        let ids = frame::u64_column(batch, COL_DATA_ID)?;
        let ts = frame::u64_column(batch, COL_T)?;
        let tbar = frame::nullable_u64_column(batch, COL_TBAR)?;
        let values = frame::nullable_u64_column(batch, COL_VALUE)?;

        let mut first_rows = Vec::new();
        let mut run_ids = Vec::new();
        for run in artifact_runs(ids.values()) {
            let data_id = ids.value(run.start);
            let t = ts.value(run.start);
            if ts.values()[run.clone()].iter().any(|&other| other != t) {
                return Err(ReconstructError::UnsupportedShape {
                    data_id,
                    reason: "rows disagree on T".into(),
                });
            }

            self.ranks.clear();
            self.differentia.clear();
            for row in run.clone() {
                if tbar.is_null(row) {
                    continue;
                }
                if values.is_null(row) {
                    return Err(ReconstructError::MalformedArtifact {
                        data_id,
                        reason: format!("rank {} has no differentia", tbar.value(row)).into(),
                    });
                }
                self.ranks.push(tbar.value(row));
                self.differentia.push(values.value(row));
            }
            self.table
                .insert_artifact(data_id, t, &self.ranks, &self.differentia)?;
            first_rows.push(run.start as u64);
            run_ids.push(data_id);
        }
        self.stats.artifacts += first_rows.len() as u64;
        self.stats.unpacked_rows += batch.num_rows() as u64;

        let fields = frame::passthrough_fields(batch.schema().as_ref());
        if !fields.is_empty() {
            let projected = frame::project(batch, &fields)?;
            let firsts = UInt64Array::from(first_rows);
            self.rows
                .batches
                .push(take_record_batch(&projected, &firsts)?);
            self.rows.data_ids.extend(run_ids);
        }
        self.passthrough.get_or_insert(fields);
        Ok(())
    }

    fn finish(
        mut self,
        meta: SurfaceMeta,
        declared: Vec<Arc<Field>>,
    ) -> Result<(RecordBatch, ReconstructStats)> {
        let passthrough: Vec<Arc<Field>> = match &self.passthrough {
            Some(columns) => columns.iter().map(|(_, field)| Arc::clone(field)).collect(),
            None => declared,
        };
        if self.table.inserted() == 0 {
            return Ok(empty(&passthrough));
        }

        let records = self.table.finalize();
        if self.options.check_invariants {
            invariants::check_all(&records)?;
        }
        self.stats.final_records = records.size() as u64;
        self.stats.observe_records(records.size());

        let roots = count_root_children(&records);
        if roots > 1 && !self.options.force_common_ancestry {
            return Err(ReconstructError::MultipleRoots { roots });
        }

        tracing::info!(
            pipeline.artifacts = self.stats.artifacts,
            pipeline.chunks = self.stats.chunks,
            pipeline.collapses = self.stats.collapses,
            trie.peak_records = self.stats.peak_records,
            trie.final_records = self.stats.final_records,
            "reconstruction finished"
        );
        let phylogeny = materialize(&records, meta, &passthrough, &self.rows)?;
        Ok((phylogeny, self.stats))
    }
}
