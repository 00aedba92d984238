//! Shared fixtures: simulated lineages, long tables and packed surfaces.
#![allow(dead_code)]

use std::sync::Arc;

use arrow::array::{ArrayRef, RecordBatch, StringArray, UInt64Array};
use hstrat_trie::{Artifact, CircularAlgo, RetentionAlgorithm, frame};

/// One simulated lineage: the differentia minted at every generation.
#[derive(Debug, Clone)]
pub struct Lineage {
    pub data_id: u64,
    pub history: Vec<u64>,
}

impl Lineage {
    pub fn num_strata_deposited(&self) -> u64 {
        self.history.len() as u64
    }

    /// Alleles a circular buffer of `buffer_size` sites still holds.
    pub fn retained(&self, buffer_size: u64) -> Vec<(u64, u64)> {
        let mut alleles: Vec<(u64, u64)> = CircularAlgo
            .lookup_ingest_times(buffer_size, self.num_strata_deposited())
            .into_iter()
            .flatten()
            .map(|rank| (rank, self.history[rank as usize]))
            .collect();
        alleles.sort_unstable();
        alleles
    }

    pub fn artifact(&self, buffer_size: u64) -> Artifact {
        Artifact::new(
            self.data_id,
            self.num_strata_deposited(),
            &self.retained(buffer_size),
        )
    }
}

/// Grow `count` lineages by repeatedly forking a random existing lineage and
/// extending it. Differentia come from an alphabet of `alphabet` symbols.
pub fn simulate(seed: u64, count: usize, max_extension: u64, alphabet: u64) -> Vec<Lineage> {
    let mut rng = fastrand::Rng::with_seed(seed);
    let mut pool = vec![vec![rng.u64(0..alphabet)]];
    while pool.len() < count {
        let parent = pool[rng.usize(0..pool.len())].clone();
        let mut child = parent;
        for _ in 0..rng.u64(1..=max_extension) {
            child.push(rng.u64(0..alphabet));
        }
        pool.push(child);
    }
    pool.into_iter()
        .enumerate()
        .map(|(index, history)| Lineage {
            data_id: 1000 + index as u64,
            history,
        })
        .collect()
}

/// Long table rows for `artifacts`, with a null-rank marker row for any
/// artifact that retains nothing.
pub fn long_table(artifacts: &[Artifact]) -> RecordBatch {
    let mut ids = Vec::new();
    let mut ts = Vec::new();
    let mut tbars = Vec::new();
    let mut values = Vec::new();
    for artifact in artifacts {
        if artifact.ranks.is_empty() {
            ids.push(artifact.data_id);
            ts.push(artifact.num_strata_deposited);
            tbars.push(None);
            values.push(None);
        }
        for allele in artifact.alleles() {
            ids.push(artifact.data_id);
            ts.push(artifact.num_strata_deposited);
            tbars.push(Some(allele.rank));
            values.push(Some(allele.differentia));
        }
    }
    RecordBatch::try_from_iter([
        ("dstream_data_id", Arc::new(UInt64Array::from(ids)) as ArrayRef),
        ("dstream_T", Arc::new(UInt64Array::from(ts)) as ArrayRef),
        ("dstream_Tbar", Arc::new(UInt64Array::from(tbars)) as ArrayRef),
        ("dstream_value", Arc::new(UInt64Array::from(values)) as ArrayRef),
    ])
    .expect("long table")
}

/// Packed surfaces: a 32-bit `T` followed by `buffer_size` one-byte sites,
/// laid out as the circular algorithm would leave them.
pub fn packed_table(lineages: &[Lineage], buffer_size: u64) -> RecordBatch {
    let n = lineages.len();
    let hexes: Vec<String> = lineages
        .iter()
        .map(|lineage| {
            let t = lineage.num_strata_deposited();
            let mut bytes = (t as u32).to_be_bytes().to_vec();
            let held = CircularAlgo.lookup_ingest_times(buffer_size, t);
            bytes.extend(
                held.iter()
                    .map(|rank| rank.map_or(0, |rank| lineage.history[rank as usize] as u8)),
            );
            hex::encode(bytes)
        })
        .collect();
    let ids: Vec<u64> = lineages.iter().map(|lineage| lineage.data_id).collect();
    let labels: Vec<String> = ids.iter().map(|id| format!("org-{id}")).collect();
    let scalar = |value: u64| Arc::new(UInt64Array::from(vec![value; n])) as ArrayRef;
    RecordBatch::try_from_iter([
        ("data_hex", Arc::new(StringArray::from(hexes)) as ArrayRef),
        (
            "dstream_algo",
            Arc::new(StringArray::from(vec!["dstream.circular_algo"; n])) as ArrayRef,
        ),
        ("dstream_storage_bitoffset", scalar(32)),
        ("dstream_storage_bitwidth", scalar(8 * buffer_size)),
        ("dstream_T_bitoffset", scalar(0)),
        ("dstream_T_bitwidth", scalar(32)),
        ("dstream_S", scalar(buffer_size)),
        ("dstream_data_id", Arc::new(UInt64Array::from(ids)) as ArrayRef),
        ("organism", Arc::new(StringArray::from(labels)) as ArrayRef),
    ])
    .expect("packed table")
}

pub fn u64s(batch: &RecordBatch, name: &'static str) -> Vec<u64> {
    frame::u64_column(batch, name)
        .expect("u64 column")
        .values()
        .to_vec()
}

/// Output rows as `(id, ancestor_id, hstrat_rank, dstream_data_id)`.
pub fn rows(phylogeny: &RecordBatch) -> Vec<(u64, u64, u64, u64)> {
    let ids = u64s(phylogeny, "id");
    let ancestors = u64s(phylogeny, "ancestor_id");
    let ranks = u64s(phylogeny, "hstrat_rank");
    let data_ids = u64s(phylogeny, "dstream_data_id");
    (0..ids.len())
        .map(|row| (ids[row], ancestors[row], ranks[row], data_ids[row]))
        .collect()
}
