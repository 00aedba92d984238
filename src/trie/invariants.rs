//! Structural invariant checks over a [`RecordStore`].
//!
//! Each invariant has a `diagnose_*` function returning `Some(message)` on
//! failure and a `check_*` predicate wrapping it. Search-trie checks pass
//! trivially once the search trie has been dismantled.
//!
//! [`diagnose_lineage_compatible`] also needs the inserted artifacts, so it
//! sits outside [`INVARIANTS`] and callers run it with their leaf pairings.

use std::collections::HashSet;

use super::records::RecordStore;
use super::search::search_children;
use crate::constants::{PLACEHOLDER, ROOT_ID};
use crate::error::{ReconstructError, Result};
use crate::types::Artifact;

type Diagnose = fn(&RecordStore) -> Option<String>;

/// Every check run by [`check_all`], in order.
pub const INVARIANTS: &[(&str, Diagnose)] = &[
    ("contiguous_ids", diagnose_contiguous_ids),
    ("ancestor_in_range", diagnose_ancestor_in_range),
    ("topologically_sorted", diagnose_topologically_sorted),
    ("single_root", diagnose_single_root),
    ("root_rank_zero", diagnose_root_rank_zero),
    ("ranks_defined", diagnose_ranks_defined),
    ("ranks_chronological", diagnose_ranks_chronological),
    ("data_leaves_childless", diagnose_data_leaves_childless),
    ("unique_data_ids", diagnose_unique_data_ids),
    ("search_links_consistent", diagnose_search_links_consistent),
    ("search_children_sorted", diagnose_search_children_sorted),
    ("search_ranks_ascend", diagnose_search_ranks_ascend),
];

/// Run every invariant, failing on the first violation.
pub fn check_all(store: &RecordStore) -> Result<()> {
    for &(check, diagnose) in INVARIANTS {
        if let Some(detail) = diagnose(store) {
            tracing::warn!(invariant = check, %detail, "trie invariant violated");
            return Err(ReconstructError::InvariantViolation { check, detail });
        }
    }
    Ok(())
}

/// Messages for every violated invariant; empty when the store is sound.
#[must_use]
pub fn diagnose_all(store: &RecordStore) -> Vec<String> {
    INVARIANTS
        .iter()
        .filter_map(|&(name, diagnose)| diagnose(store).map(|detail| format!("{name}: {detail}")))
        .collect()
}

/// Columns all share one length and at least the root exists.
pub fn diagnose_contiguous_ids(store: &RecordStore) -> Option<String> {
    let size = store.rank.len();
    let lengths = [
        store.ancestor_id.len(),
        store.search_ancestor_id.len(),
        store.search_first_child_id.len(),
        store.search_next_sibling_id.len(),
        store.search_prev_sibling_id.len(),
        store.differentia.len(),
        store.data_id.len(),
    ];
    if size == 0 {
        return Some("store is empty; the root record is missing".into());
    }
    lengths
        .iter()
        .find(|&&len| len != size)
        .map(|len| format!("column length {len} differs from rank column length {size}"))
}

pub fn diagnose_ancestor_in_range(store: &RecordStore) -> Option<String> {
    let size = store.size() as u64;
    store
        .ancestor_id
        .iter()
        .enumerate()
        .find(|&(_, &ancestor)| ancestor >= size)
        .map(|(id, ancestor)| format!("node {id} has ancestor {ancestor} outside 0..{size}"))
}

/// `ancestor_id <= id` everywhere.
pub fn diagnose_topologically_sorted(store: &RecordStore) -> Option<String> {
    store
        .ancestor_id
        .iter()
        .enumerate()
        .find(|&(id, &ancestor)| ancestor > id as u64)
        .map(|(id, ancestor)| format!("node {id} has later ancestor {ancestor}"))
}

/// Exactly one self-ancestor, and it is the root.
pub fn diagnose_single_root(store: &RecordStore) -> Option<String> {
    let roots: Vec<usize> = store
        .ancestor_id
        .iter()
        .enumerate()
        .filter(|&(id, &ancestor)| ancestor == id as u64)
        .map(|(id, _)| id)
        .collect();
    match roots.as_slice() {
        [0] => None,
        [] => Some("no node is its own ancestor".into()),
        other => Some(format!("self-ancestor nodes {other:?}; expected only node 0")),
    }
}

pub fn diagnose_root_rank_zero(store: &RecordStore) -> Option<String> {
    match store.rank.first() {
        Some(&0) | None => None,
        Some(rank) => Some(format!("root has rank {rank}")),
    }
}

/// No rank holds the placeholder value.
pub fn diagnose_ranks_defined(store: &RecordStore) -> Option<String> {
    store
        .rank
        .iter()
        .position(|&rank| rank == PLACEHOLDER)
        .map(|id| format!("node {id} has an undefined rank"))
}

/// Ranks never decrease from ancestor to descendant.
pub fn diagnose_ranks_chronological(store: &RecordStore) -> Option<String> {
    (1..store.size()).find_map(|id| {
        let ancestor = store.ancestor_id[id] as usize;
        let (rank, ancestor_rank) = (store.rank[id], *store.rank.get(ancestor)?);
        (rank < ancestor_rank).then(|| {
            format!("node {id} has rank {rank} below its ancestor {ancestor} at rank {ancestor_rank}")
        })
    })
}

/// Data-bearing records have no build or search children.
pub fn diagnose_data_leaves_childless(store: &RecordStore) -> Option<String> {
    if let Some(id) = (1..store.size()).find(|&id| {
        let ancestor = store.ancestor_id[id];
        store.data_id.get(ancestor as usize).is_some_and(|&d| d != PLACEHOLDER)
    }) {
        return Some(format!(
            "node {id} descends from data leaf {}",
            store.ancestor_id[id]
        ));
    }
    (0..store.size() as u64)
        .find(|&id| store.is_data_leaf(id) && store.search_first_child_id(id) != PLACEHOLDER)
        .map(|id| format!("data leaf {id} has search children"))
}

pub fn diagnose_unique_data_ids(store: &RecordStore) -> Option<String> {
    let mut seen = HashSet::new();
    store
        .data_id
        .iter()
        .filter(|&&data_id| data_id != PLACEHOLDER)
        .find(|&&data_id| !seen.insert(data_id))
        .map(|data_id| format!("data id {data_id} labels more than one leaf"))
}

/// Sibling links are mutually consistent and share one search parent.
pub fn diagnose_search_links_consistent(store: &RecordStore) -> Option<String> {
    if !store.search_trie_live() {
        return None;
    }
    let size = store.size() as u64;
    let mut listed = vec![false; store.size()];
    for parent in 0..size {
        let head = store.search_first_child_id(parent);
        if head == PLACEHOLDER {
            continue;
        }
        if head >= size {
            return Some(format!("node {parent} has out-of-range first child {head}"));
        }
        if store.search_prev_sibling_id(head) != PLACEHOLDER {
            return Some(format!("first child {head} of {parent} has a previous sibling"));
        }
        let mut prev = PLACEHOLDER;
        let mut cur = head;
        let mut steps = 0u64;
        while cur != PLACEHOLDER {
            if cur >= size || cur == ROOT_ID || steps > size {
                return Some(format!("child list of {parent} is corrupt near {cur}"));
            }
            if store.search_ancestor_id(cur) != parent {
                return Some(format!(
                    "node {cur} is listed under {parent} but names search ancestor {}",
                    store.search_ancestor_id(cur)
                ));
            }
            if store.search_prev_sibling_id(cur) != prev {
                return Some(format!("node {cur} has a stale previous-sibling link"));
            }
            listed[cur as usize] = true;
            prev = cur;
            cur = store.search_next_sibling_id(cur);
            steps += 1;
        }
    }
    // Every attached node must be reachable from its parent's list.
    (1..size)
        .find(|&id| store.search_ancestor_id(id) != PLACEHOLDER && !listed[id as usize])
        .map(|id| {
            format!(
                "node {id} names search ancestor {} but is not listed",
                store.search_ancestor_id(id)
            )
        })
}

/// Child lists are sorted by `(rank, differentia)` without duplicates.
pub fn diagnose_search_children_sorted(store: &RecordStore) -> Option<String> {
    if !store.search_trie_live() {
        return None;
    }
    (0..store.size() as u64).find_map(|parent| {
        let keys: Vec<(u64, u64)> = search_children(store, parent)
            .map(|child| (store.rank(child), store.differentia(child)))
            .collect();
        keys.windows(2)
            .find(|pair| pair[0] >= pair[1])
            .map(|pair| format!("children of {parent} out of order or duplicated: {pair:?}"))
    })
}

/// Ranks strictly increase along search paths, and every attached node
/// hangs off an attached parent.
pub fn diagnose_search_ranks_ascend(store: &RecordStore) -> Option<String> {
    if !store.search_trie_live() {
        return None;
    }
    (1..store.size() as u64).find_map(|id| {
        let parent = store.search_ancestor_id(id);
        if parent == PLACEHOLDER {
            return None;
        }
        if parent != ROOT_ID && store.search_ancestor_id(parent) == PLACEHOLDER {
            return Some(format!("node {id} hangs off detached search node {parent}"));
        }
        if parent != ROOT_ID && store.rank(id) <= store.rank(parent) {
            return Some(format!(
                "search child {id} at rank {} does not follow parent {parent} at rank {}",
                store.rank(id),
                store.rank(parent)
            ));
        }
        if store.is_data_leaf(id) {
            return Some(format!("data leaf {id} is linked into the search trie"));
        }
        None
    })
}

/// Each leaf descends only through nodes whose alleles its artifact shares.
///
/// `leaves` pairs every data leaf with the artifact inserted for it. Ranks
/// the artifact does not retain leave the path unconstrained.
pub fn diagnose_lineage_compatible(
    store: &RecordStore,
    leaves: &[(u64, &Artifact)],
) -> Option<String> {
    leaves.iter().find_map(|&(leaf, artifact)| {
        if store.data_id.get(leaf as usize) != Some(&artifact.data_id) {
            return Some(format!("node {leaf} is not the leaf of data id {}", artifact.data_id));
        }
        let mut node = leaf;
        while node != ROOT_ID {
            let Some(&ancestor) = store.ancestor_id.get(node as usize) else {
                return Some(format!("node {node} has no ancestor entry"));
            };
            if ancestor >= node {
                return Some(format!("lineage of leaf {leaf} loops back at node {node}"));
            }
            node = ancestor;
            if node == ROOT_ID {
                break;
            }
            let rank = store.rank(node);
            let Ok(index) = artifact.ranks.binary_search(&rank) else {
                continue;
            };
            let (held, found) = (artifact.differentia[index], store.differentia(node));
            if held != found {
                return Some(format!(
                    "leaf {leaf} (data id {}) passes node {node} at rank {rank} with differentia {found}, not {held}",
                    artifact.data_id
                ));
            }
        }
        None
    })
}

pub fn check_lineage_compatible(store: &RecordStore, leaves: &[(u64, &Artifact)]) -> bool {
    diagnose_lineage_compatible(store, leaves).is_none()
}

pub fn check_contiguous_ids(store: &RecordStore) -> bool {
    diagnose_contiguous_ids(store).is_none()
}

pub fn check_ancestor_in_range(store: &RecordStore) -> bool {
    diagnose_ancestor_in_range(store).is_none()
}

pub fn check_topologically_sorted(store: &RecordStore) -> bool {
    diagnose_topologically_sorted(store).is_none()
}

pub fn check_single_root(store: &RecordStore) -> bool {
    diagnose_single_root(store).is_none()
}

pub fn check_root_rank_zero(store: &RecordStore) -> bool {
    diagnose_root_rank_zero(store).is_none()
}

pub fn check_ranks_defined(store: &RecordStore) -> bool {
    diagnose_ranks_defined(store).is_none()
}

pub fn check_ranks_chronological(store: &RecordStore) -> bool {
    diagnose_ranks_chronological(store).is_none()
}

pub fn check_data_leaves_childless(store: &RecordStore) -> bool {
    diagnose_data_leaves_childless(store).is_none()
}

pub fn check_unique_data_ids(store: &RecordStore) -> bool {
    diagnose_unique_data_ids(store).is_none()
}

pub fn check_search_links_consistent(store: &RecordStore) -> bool {
    diagnose_search_links_consistent(store).is_none()
}

pub fn check_search_children_sorted(store: &RecordStore) -> bool {
    diagnose_search_children_sorted(store).is_none()
}

pub fn check_search_ranks_ascend(store: &RecordStore) -> bool {
    diagnose_search_ranks_ascend(store).is_none()
}
