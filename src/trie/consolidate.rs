//! Search-trie consolidation ahead of placing an allele.
//!
//! Children of the current node whose rank lies below the next retained rank
//! stand for alleles the artifact being inserted no longer carries. They are
//! detached and their search children spliced up, after which children that
//! became indistinguishable are merged. The build trie is never touched.

use super::records::RecordStore;
use super::search::{detach_search_parent, move_search_children};
use crate::constants::PLACEHOLDER;

/// Consolidate the search children of `node` against the frontier `rank`.
///
/// Returns the number of search nodes detached.
pub fn consolidate_trie(store: &mut RecordStore, node: u64, rank: u64) -> usize {
    let mut detached = 0;
    // Children are sorted by rank, so anything below the frontier sits at the head.
    loop {
        let head = store.search_first_child_id(node);
        if head == PLACEHOLDER || store.rank(head) >= rank {
            break;
        }
        detach_search_parent(store, head);
        move_search_children(store, head, node);
        detached += 1;
    }
    if detached > 0 {
        detached += collapse_indistinguishable_nodes(store, node);
    }
    detached
}

/// Merge search children of `node` (and, transitively, of each winner) that
/// share a `(rank, differentia)` key. The lowest id in each group wins and
/// adopts the losers' search children; losers are detached.
///
/// Returns the number of losers detached.
pub fn collapse_indistinguishable_nodes(store: &mut RecordStore, node: u64) -> usize {
    let mut losers = 0;
    let mut pending = vec![node];
    while let Some(parent) = pending.pop() {
        let mut winner = store.search_first_child_id(parent);
        while winner != PLACEHOLDER {
            let key = (store.rank(winner), store.differentia(winner));
            let mut adopted = 0;
            // Equal keys are adjacent and ordered by id, so the run head is the winner.
            loop {
                let next = store.search_next_sibling_id(winner);
                if next == PLACEHOLDER || (store.rank(next), store.differentia(next)) != key {
                    break;
                }
                detach_search_parent(store, next);
                adopted += move_search_children(store, next, winner);
                losers += 1;
            }
            if adopted > 0 {
                pending.push(winner);
            }
            winner = store.search_next_sibling_id(winner);
        }
    }
    losers
}
