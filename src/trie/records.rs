//! Struct-of-arrays record store backing both the build trie and the search trie.
//!
//! Records are identified by their position. The store only ever grows by
//! [`RecordStore::append`]; shrinking happens wholesale through
//! [`RecordStore::compact`], which renumbers survivors into a dense prefix.

use crate::constants::{PLACEHOLDER, ROOT_ID};

/// Dense table of tree nodes.
///
/// `ancestor_id` is the build-trie parent. The `search_*` columns form a
/// doubly linked child list per search node; `PLACEHOLDER` marks "none".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordStore {
    pub(crate) ancestor_id: Vec<u64>,
    pub(crate) search_ancestor_id: Vec<u64>,
    pub(crate) search_first_child_id: Vec<u64>,
    pub(crate) search_next_sibling_id: Vec<u64>,
    pub(crate) search_prev_sibling_id: Vec<u64>,
    pub(crate) rank: Vec<u64>,
    pub(crate) differentia: Vec<u64>,
    pub(crate) data_id: Vec<u64>,
}

impl Default for RecordStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordStore {
    /// Create a store holding only the root record.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(1)
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let mut store = Self {
            ancestor_id: Vec::with_capacity(capacity),
            search_ancestor_id: Vec::with_capacity(capacity),
            search_first_child_id: Vec::with_capacity(capacity),
            search_next_sibling_id: Vec::with_capacity(capacity),
            search_prev_sibling_id: Vec::with_capacity(capacity),
            rank: Vec::with_capacity(capacity),
            differentia: Vec::with_capacity(capacity),
            data_id: Vec::with_capacity(capacity),
        };
        // The root is its own build and search ancestor.
        store.push_raw(ROOT_ID, ROOT_ID, 0, PLACEHOLDER, PLACEHOLDER);
        store
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.rank.len()
    }

    /// Whether the search trie is still linked (it is dismantled by a full collapse).
    #[must_use]
    pub fn search_trie_live(&self) -> bool {
        self.search_ancestor_id[ROOT_ID as usize] != PLACEHOLDER
    }

    /// Append a record and return its id.
    ///
    /// When `search_ancestor_id` is not `PLACEHOLDER` the record is linked
    /// into that node's search-child list: at the front when its
    /// `(rank, differentia)` key sorts first, which holds for every fresh
    /// allele placed after consolidation, otherwise at its sorted position.
    pub fn append(
        &mut self,
        ancestor_id: u64,
        search_ancestor_id: u64,
        rank: u64,
        differentia: u64,
        data_id: u64,
    ) -> u64 {
        let id = self.push_raw(ancestor_id, PLACEHOLDER, rank, differentia, data_id);
        if search_ancestor_id != PLACEHOLDER {
            self.link_search_child(id, search_ancestor_id);
        }
        id
    }

    fn push_raw(
        &mut self,
        ancestor_id: u64,
        search_ancestor_id: u64,
        rank: u64,
        differentia: u64,
        data_id: u64,
    ) -> u64 {
        let id = self.size() as u64;
        self.ancestor_id.push(ancestor_id);
        self.search_ancestor_id.push(search_ancestor_id);
        self.search_first_child_id.push(PLACEHOLDER);
        self.search_next_sibling_id.push(PLACEHOLDER);
        self.search_prev_sibling_id.push(PLACEHOLDER);
        self.rank.push(rank);
        self.differentia.push(differentia);
        self.data_id.push(data_id);
        id
    }

    // Field accessors. Ids are trusted; an out-of-range id panics like a slice index.

    #[inline]
    #[must_use]
    pub fn ancestor_id(&self, id: u64) -> u64 {
        self.ancestor_id[id as usize]
    }

    #[inline]
    pub fn set_ancestor_id(&mut self, id: u64, value: u64) {
        self.ancestor_id[id as usize] = value;
    }

    #[inline]
    #[must_use]
    pub fn search_ancestor_id(&self, id: u64) -> u64 {
        self.search_ancestor_id[id as usize]
    }

    #[inline]
    pub fn set_search_ancestor_id(&mut self, id: u64, value: u64) {
        self.search_ancestor_id[id as usize] = value;
    }

    #[inline]
    #[must_use]
    pub fn search_first_child_id(&self, id: u64) -> u64 {
        self.search_first_child_id[id as usize]
    }

    #[inline]
    pub fn set_search_first_child_id(&mut self, id: u64, value: u64) {
        self.search_first_child_id[id as usize] = value;
    }

    #[inline]
    #[must_use]
    pub fn search_next_sibling_id(&self, id: u64) -> u64 {
        self.search_next_sibling_id[id as usize]
    }

    #[inline]
    pub fn set_search_next_sibling_id(&mut self, id: u64, value: u64) {
        self.search_next_sibling_id[id as usize] = value;
    }

    #[inline]
    #[must_use]
    pub fn search_prev_sibling_id(&self, id: u64) -> u64 {
        self.search_prev_sibling_id[id as usize]
    }

    #[inline]
    pub fn set_search_prev_sibling_id(&mut self, id: u64, value: u64) {
        self.search_prev_sibling_id[id as usize] = value;
    }

    #[inline]
    #[must_use]
    pub fn rank(&self, id: u64) -> u64 {
        self.rank[id as usize]
    }

    #[inline]
    pub fn set_rank(&mut self, id: u64, value: u64) {
        self.rank[id as usize] = value;
    }

    #[inline]
    #[must_use]
    pub fn differentia(&self, id: u64) -> u64 {
        self.differentia[id as usize]
    }

    #[inline]
    pub fn set_differentia(&mut self, id: u64, value: u64) {
        self.differentia[id as usize] = value;
    }

    #[inline]
    #[must_use]
    pub fn data_id(&self, id: u64) -> u64 {
        self.data_id[id as usize]
    }

    #[inline]
    pub fn set_data_id(&mut self, id: u64, value: u64) {
        self.data_id[id as usize] = value;
    }

    #[inline]
    #[must_use]
    pub fn is_data_leaf(&self, id: u64) -> bool {
        self.data_id(id) != PLACEHOLDER
    }

    /// Sort key of a search node within its parent's child list.
    #[inline]
    pub(crate) fn search_key(&self, id: u64) -> (u64, u64, u64) {
        (self.rank(id), self.differentia(id), id)
    }

    /// Link `id` (currently unlinked) into `parent`'s search-child list,
    /// keeping the list sorted by `(rank, differentia, id)`.
    pub(crate) fn link_search_child(&mut self, id: u64, parent: u64) {
        let key = self.search_key(id);
        self.set_search_ancestor_id(id, parent);

        let head = self.search_first_child_id(parent);
        if head == PLACEHOLDER || key < self.search_key(head) {
            self.set_search_prev_sibling_id(id, PLACEHOLDER);
            self.set_search_next_sibling_id(id, head);
            if head != PLACEHOLDER {
                self.set_search_prev_sibling_id(head, id);
            }
            self.set_search_first_child_id(parent, id);
            return;
        }

        let mut prev = head;
        loop {
            let next = self.search_next_sibling_id(prev);
            if next == PLACEHOLDER || key < self.search_key(next) {
                self.set_search_prev_sibling_id(id, prev);
                self.set_search_next_sibling_id(id, next);
                self.set_search_next_sibling_id(prev, id);
                if next != PLACEHOLDER {
                    self.set_search_prev_sibling_id(next, id);
                }
                return;
            }
            prev = next;
        }
    }

    /// Remove `id` from its search parent's child list. Its own children stay linked to it.
    pub(crate) fn unlink_search_child(&mut self, id: u64) {
        let parent = self.search_ancestor_id(id);
        if parent == PLACEHOLDER {
            return;
        }
        let prev = self.search_prev_sibling_id(id);
        let next = self.search_next_sibling_id(id);
        if prev == PLACEHOLDER {
            self.set_search_first_child_id(parent, next);
        } else {
            self.set_search_next_sibling_id(prev, next);
        }
        if next != PLACEHOLDER {
            self.set_search_prev_sibling_id(next, prev);
        }
        self.set_search_ancestor_id(id, PLACEHOLDER);
        self.set_search_prev_sibling_id(id, PLACEHOLDER);
        self.set_search_next_sibling_id(id, PLACEHOLDER);
    }

    /// Number of build-trie children per record. The root's self-loop is not counted.
    #[must_use]
    pub fn build_child_counts(&self) -> Vec<u32> {
        let mut counts = vec![0u32; self.size()];
        for (id, &ancestor) in self.ancestor_id.iter().enumerate().skip(1) {
            debug_assert!(ancestor as usize != id);
            counts[ancestor as usize] += 1;
        }
        counts
    }

    /// Build a new store holding the records selected by `keep_mask`,
    /// renumbered densely in their original order.
    ///
    /// `new_parent_map[old_id]` is the *new* id of the kept ancestor each
    /// surviving record should point at. Search-trie links are remapped
    /// through the renumbering, or cleared when `reset_search` is set.
    #[must_use]
    pub fn compact(&self, keep_mask: &[bool], new_parent_map: &[u64], reset_search: bool) -> Self {
        debug_assert_eq!(keep_mask.len(), self.size());
        debug_assert_eq!(new_parent_map.len(), self.size());

        let mut new_id = vec![PLACEHOLDER; self.size()];
        let mut kept = 0u64;
        for (old, &keep) in keep_mask.iter().enumerate() {
            if keep {
                new_id[old] = kept;
                kept += 1;
            }
        }
        let remap = |old: u64| -> u64 {
            if reset_search || old == PLACEHOLDER {
                PLACEHOLDER
            } else {
                new_id[old as usize]
            }
        };

        let capacity = kept as usize;
        let mut out = Self {
            ancestor_id: Vec::with_capacity(capacity),
            search_ancestor_id: Vec::with_capacity(capacity),
            search_first_child_id: Vec::with_capacity(capacity),
            search_next_sibling_id: Vec::with_capacity(capacity),
            search_prev_sibling_id: Vec::with_capacity(capacity),
            rank: Vec::with_capacity(capacity),
            differentia: Vec::with_capacity(capacity),
            data_id: Vec::with_capacity(capacity),
        };
        for (old, &keep) in keep_mask.iter().enumerate() {
            if !keep {
                continue;
            }
            out.ancestor_id.push(new_parent_map[old]);
            out.search_ancestor_id.push(remap(self.search_ancestor_id[old]));
            out.search_first_child_id
                .push(remap(self.search_first_child_id[old]));
            out.search_next_sibling_id
                .push(remap(self.search_next_sibling_id[old]));
            out.search_prev_sibling_id
                .push(remap(self.search_prev_sibling_id[old]));
            out.rank.push(self.rank[old]);
            out.differentia.push(self.differentia[old]);
            out.data_id.push(self.data_id[old]);
        }
        out
    }

    /// Iterate the build-trie ancestors of `id`, starting with its parent and ending at the root.
    pub fn build_lineage(&self, id: u64) -> impl Iterator<Item = u64> + '_ {
        let mut cur = id;
        std::iter::from_fn(move || {
            if cur == ROOT_ID {
                return None;
            }
            cur = self.ancestor_id(cur);
            Some(cur)
        })
    }
}
