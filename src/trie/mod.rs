//! Search-table trie builder.
//!
//! Responsibilities:
//! - Own the [`RecordStore`] holding build-trie and search-trie links.
//! - Insert artifacts in nondecreasing `T`, consolidating the search trie as ranks drop out.
//! - Periodically collapse detached unifurcations, and finalize with a full collapse.

pub mod collapse;
pub mod consolidate;
pub mod insert;
pub mod invariants;
pub mod records;
pub mod search;

use std::collections::HashSet;

pub use collapse::{CollapseMode, collapse_unifurcations};
pub use records::RecordStore;

use crate::constants::ROOT_ID;
use crate::error::{ReconstructError, Result};
use crate::types::Artifact;
use crate::types::artifact::validate_alleles;

/// Incremental phylogeny builder over a [`RecordStore`].
#[derive(Debug, Clone)]
pub struct SearchTable {
    records: RecordStore,
    last_t: u64,
    inserted: u64,
    data_ids: HashSet<u64>,
}

impl Default for SearchTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchTable {
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: RecordStore::new(),
            last_t: 0,
            inserted: 0,
            data_ids: HashSet::new(),
        }
    }

    #[must_use]
    pub fn records(&self) -> &RecordStore {
        &self.records
    }

    /// Number of artifacts inserted so far.
    #[must_use]
    pub fn inserted(&self) -> u64 {
        self.inserted
    }

    /// Largest `T` inserted so far.
    #[must_use]
    pub fn last_t(&self) -> u64 {
        self.last_t
    }

    pub fn insert(&mut self, artifact: &Artifact) -> Result<u64> {
        self.insert_artifact(
            artifact.data_id,
            artifact.num_strata_deposited,
            &artifact.ranks,
            &artifact.differentia,
        )
    }

    /// Insert one artifact and return its leaf id.
    ///
    /// Fails without touching the store when the alleles are malformed, the
    /// `data_id` was already inserted, or `T` is below a previously inserted `T`.
    pub fn insert_artifact(
        &mut self,
        data_id: u64,
        num_strata_deposited: u64,
        ranks: &[u64],
        differentia: &[u64],
    ) -> Result<u64> {
        validate_alleles(data_id, num_strata_deposited, ranks, differentia)?;
        if num_strata_deposited < self.last_t {
            return Err(ReconstructError::OutOfOrderArtifact {
                data_id,
                t: num_strata_deposited,
                previous_t: self.last_t,
            });
        }
        if !self.data_ids.insert(data_id) {
            return Err(ReconstructError::UnsupportedShape {
                data_id,
                reason: "data id inserted twice".into(),
            });
        }
        self.last_t = num_strata_deposited;
        self.inserted += 1;
        Ok(insert::insert_artifact(
            &mut self.records,
            data_id,
            num_strata_deposited,
            ranks,
            differentia,
        ))
    }

    /// Compact away unifurcations already detached from the search trie.
    /// Returns how many records were removed.
    pub fn collapse_dropped(&mut self) -> usize {
        let before = self.records.size();
        self.records = collapse_unifurcations(&self.records, CollapseMode::DroppedOnly);
        before - self.records.size()
    }

    pub fn check_invariants(&self) -> Result<()> {
        invariants::check_all(&self.records)
    }

    /// Fully collapse unifurcations, dismantle the search trie, and hand back the records.
    #[must_use]
    pub fn finalize(self) -> RecordStore {
        collapse_unifurcations(&self.records, CollapseMode::Full)
    }
}

/// Number of build-trie children of the root.
#[must_use]
pub fn count_root_children(store: &RecordStore) -> usize {
    (1..store.size() as u64)
        .filter(|&id| store.ancestor_id(id) == ROOT_ID)
        .count()
}
