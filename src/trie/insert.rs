//! Insertion of one artifact's retained alleles into the build and search tries.

use super::consolidate::consolidate_trie;
use super::records::RecordStore;
use super::search::search_children;
use crate::constants::{PLACEHOLDER, ROOT_ID};

/// Find the search child of `node` carrying `(rank, differentia)`, or mint one.
pub fn place_allele(store: &mut RecordStore, node: u64, rank: u64, differentia: u64) -> u64 {
    let target = (rank, differentia);
    for child in search_children(store, node) {
        let key = (store.rank(child), store.differentia(child));
        if key == target {
            return child;
        }
        if key > target {
            break;
        }
    }
    store.append(node, node, rank, differentia, PLACEHOLDER)
}

/// Walk `ranks`/`differentia` down from the root, consolidating and placing
/// each allele, then hang a leaf for `data_id` at rank `T - 1` under the
/// deepest node reached. Returns the leaf id.
///
/// Inputs are trusted here: ranks strictly ascending and below `num_strata_deposited`.
pub fn insert_artifact(
    store: &mut RecordStore,
    data_id: u64,
    num_strata_deposited: u64,
    ranks: &[u64],
    differentia: &[u64],
) -> u64 {
    debug_assert_eq!(ranks.len(), differentia.len());
    let mut cur = ROOT_ID;
    for (&rank, &diff) in ranks.iter().zip(differentia) {
        consolidate_trie(store, cur, rank);
        cur = place_allele(store, cur, rank, diff);
    }
    store.append(
        cur,
        PLACEHOLDER,
        num_strata_deposited.saturating_sub(1),
        PLACEHOLDER,
        data_id,
    )
}
