//! Reconstruction throughput benchmarks.
//!
//! Populations are simulated by forking random lineages, so consecutive
//! artifacts share long prefixes the way sampled descendants of one ancestor do.
//!
//! # Benchmarks
//!
//! - `insert_and_finalize`: Trie insertion alone, artifacts pre-sorted by `T`
//! - `pipeline_chunked`: Full long-table pipeline with chunk files and collapses
//! - `pipeline_single_chunk`: Full pipeline with one chunk and no intra-run collapse
//!
//! # Running
//!
//! ```bash
//! cargo bench --bench reconstruct_benchmark
//! ```

use std::sync::Arc;

use arrow::array::{ArrayRef, RecordBatch, UInt64Array};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use hstrat_trie::{
    Artifact, CircularAlgo, ReconstructOptions, RetentionAlgorithm, SearchTable, SurfaceMeta,
    reconstruct_unpacked,
};

const BUFFER: u64 = 64;

/// Simulate `count` artifacts with a circular buffer of `BUFFER` sites.
fn population(count: usize) -> Vec<Artifact> {
    let mut rng = fastrand::Rng::with_seed(0x5eed);
    let mut pool = vec![vec![rng.u64(0..256)]];
    while pool.len() < count {
        let mut child = pool[rng.usize(0..pool.len())].clone();
        for _ in 0..rng.usize(1..=32) {
            child.push(rng.u64(0..256));
        }
        pool.push(child);
    }

    let mut artifacts: Vec<Artifact> = pool
        .iter()
        .enumerate()
        .map(|(index, history)| {
            let t = history.len() as u64;
            let mut alleles: Vec<(u64, u64)> = CircularAlgo
                .lookup_ingest_times(BUFFER, t)
                .into_iter()
                .flatten()
                .map(|rank| (rank, history[rank as usize]))
                .collect();
            alleles.sort_unstable();
            Artifact::new(index as u64, t, &alleles)
        })
        .collect();
    artifacts.sort_by_key(|artifact| (artifact.num_strata_deposited, artifact.data_id));
    artifacts
}

fn long_table(artifacts: &[Artifact]) -> RecordBatch {
    let mut columns: [Vec<u64>; 4] = Default::default();
    for artifact in artifacts {
        for allele in artifact.alleles() {
            columns[0].push(artifact.data_id);
            columns[1].push(artifact.num_strata_deposited);
            columns[2].push(allele.rank);
            columns[3].push(allele.differentia);
        }
    }
    let [ids, ts, tbars, values] = columns;
    RecordBatch::try_from_iter([
        ("dstream_data_id", Arc::new(UInt64Array::from(ids)) as ArrayRef),
        ("dstream_T", Arc::new(UInt64Array::from(ts)) as ArrayRef),
        ("dstream_Tbar", Arc::new(UInt64Array::from(tbars)) as ArrayRef),
        ("dstream_value", Arc::new(UInt64Array::from(values)) as ArrayRef),
    ])
    .unwrap()
}

fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert_and_finalize");
    for size in [1_000, 10_000] {
        let artifacts = population(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &artifacts, |b, artifacts| {
            b.iter(|| {
                let mut table = SearchTable::new();
                for artifact in artifacts {
                    table.insert(artifact).unwrap();
                }
                table.finalize().size()
            });
        });
    }
    group.finish();
}

fn bench_pipeline(c: &mut Criterion) {
    let artifacts = population(5_000);
    let long = long_table(&artifacts);
    let meta = SurfaceMeta::from_storage(BUFFER, 8 * BUFFER).unwrap();

    let chunked = ReconstructOptions::builder()
        .chunk_size(16_384)
        .collapse_every(4)
        .force_common_ancestry(true)
        .check_invariants(false)
        .build();
    c.bench_function("pipeline_chunked", |b| {
        b.iter(|| reconstruct_unpacked(&long, meta, &chunked).unwrap().num_rows());
    });

    let single = ReconstructOptions::builder()
        .collapse_every(0)
        .force_common_ancestry(true)
        .check_invariants(false)
        .build();
    c.bench_function("pipeline_single_chunk", |b| {
        b.iter(|| reconstruct_unpacked(&long, meta, &single).unwrap().num_rows());
    });
}

criterion_group!(
    name = benches;
    config = Criterion::default().sample_size(20);
    targets = bench_insert, bench_pipeline
);
criterion_main!(benches);
