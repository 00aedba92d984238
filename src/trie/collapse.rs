//! Unifurcation collapse: removes single-child inner nodes from the build trie
//! and compacts the store.

use super::records::RecordStore;
use crate::constants::{PLACEHOLDER, ROOT_ID};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollapseMode {
    /// Only nodes already detached from the search trie; the search trie stays live.
    DroppedOnly,
    /// Every removable unifurcation; the search trie is dismantled.
    Full,
}

/// Collapse unifurcations and return the compacted store.
///
/// A node is removed when it is not the root, carries no `data_id`, has
/// exactly one build child, and that child is not a data-bearing leaf. In
/// [`CollapseMode::DroppedOnly`] it must also be detached from the search trie.
#[must_use]
pub fn collapse_unifurcations(store: &RecordStore, mode: CollapseMode) -> RecordStore {
    let size = store.size();
    let child_counts = store.build_child_counts();

    let mut sole_child = vec![PLACEHOLDER; size];
    for id in 1..size {
        let ancestor = store.ancestor_id[id] as usize;
        if child_counts[ancestor] == 1 {
            sole_child[ancestor] = id as u64;
        }
    }

    let keep_mask: Vec<bool> = (0..size)
        .map(|id| {
            if id == ROOT_ID as usize || child_counts[id] != 1 {
                return true;
            }
            let node = id as u64;
            if store.is_data_leaf(node) || store.is_data_leaf(sole_child[id]) {
                return true;
            }
            mode == CollapseMode::DroppedOnly && store.search_ancestor_id(node) != PLACEHOLDER
        })
        .collect();

    // Ancestors precede descendants, so one forward pass resolves chains.
    let mut new_id = vec![PLACEHOLDER; size];
    let mut next = 0u64;
    for (id, &keep) in keep_mask.iter().enumerate() {
        if keep {
            new_id[id] = next;
            next += 1;
        }
    }
    let mut kept_ancestor = vec![ROOT_ID; size];
    for id in 1..size {
        let ancestor = store.ancestor_id[id] as usize;
        kept_ancestor[id] = if keep_mask[ancestor] {
            ancestor as u64
        } else {
            kept_ancestor[ancestor]
        };
    }
    let new_parent_map: Vec<u64> = kept_ancestor
        .iter()
        .map(|&ancestor| new_id[ancestor as usize])
        .collect();

    let removed = size - next as usize;
    tracing::debug!(
        collapse.mode = ?mode,
        trie.records_before = size,
        trie.records_removed = removed,
        "collapse unifurcations"
    );
    store.compact(&keep_mask, &new_parent_map, mode == CollapseMode::Full)
}
