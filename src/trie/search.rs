//! Traversal and relinking helpers for the search trie overlaid on a [`RecordStore`].

use smallvec::SmallVec;

use super::records::RecordStore;
use crate::constants::PLACEHOLDER;

/// Inline capacity for collected child lists; most search nodes have few children.
pub(crate) type ChildBuf = SmallVec<[u64; 8]>;

/// Iterator over the search children of one node, in list order.
pub struct SearchChildren<'a> {
    store: &'a RecordStore,
    next: u64,
}

impl Iterator for SearchChildren<'_> {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        if self.next == PLACEHOLDER {
            return None;
        }
        let cur = self.next;
        self.next = self.store.search_next_sibling_id(cur);
        Some(cur)
    }
}

#[must_use]
pub fn search_children(store: &RecordStore, node: u64) -> SearchChildren<'_> {
    SearchChildren {
        store,
        next: store.search_first_child_id(node),
    }
}

/// Snapshot of `node`'s search children, safe to hold across relinking.
pub(crate) fn collect_children(store: &RecordStore, node: u64) -> ChildBuf {
    search_children(store, node).collect()
}

/// Detach `node` from its search parent.
pub fn detach_search_parent(store: &mut RecordStore, node: u64) {
    store.unlink_search_child(node);
}

/// Make `node` a search child of `parent`, detaching it from any previous parent.
pub fn attach_search_parent(store: &mut RecordStore, node: u64, parent: u64) {
    if store.search_ancestor_id(node) != PLACEHOLDER {
        store.unlink_search_child(node);
    }
    store.link_search_child(node, parent);
}

/// Move every search child of `from` under `to`. Returns how many moved.
pub(crate) fn move_search_children(store: &mut RecordStore, from: u64, to: u64) -> usize {
    let children = collect_children(store, from);
    for &child in &children {
        attach_search_parent(store, child, to);
    }
    children.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attach_reparents_and_keeps_order() {
        let mut store = RecordStore::new();
        let a = store.append(0, 0, 1, 1, PLACEHOLDER);
        let b = store.append(0, 0, 1, 2, PLACEHOLDER);
        let x = store.append(a, a, 3, 0, PLACEHOLDER);
        let y = store.append(a, a, 2, 4, PLACEHOLDER);

        let moved = move_search_children(&mut store, a, b);
        assert_eq!(moved, 2);
        assert_eq!(search_children(&store, a).count(), 0);
        assert_eq!(search_children(&store, b).collect::<Vec<_>>(), vec![y, x]);
        assert_eq!(store.search_ancestor_id(x), b);
        // Build trie is untouched.
        assert_eq!(store.ancestor_id(x), a);
    }

    #[test]
    fn detach_clears_links() {
        let mut store = RecordStore::new();
        let a = store.append(0, 0, 1, 1, PLACEHOLDER);
        detach_search_parent(&mut store, a);
        assert_eq!(store.search_ancestor_id(a), PLACEHOLDER);
        assert_eq!(search_children(&store, 0).count(), 0);
        // Detaching twice is a no-op.
        detach_search_parent(&mut store, a);
        assert_eq!(store.search_first_child_id(0), PLACEHOLDER);
    }
}
