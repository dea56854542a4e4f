//! CompactTable: the packed bucket/entry/key/value arrays.
//!
//! Layout
//! - `table`: one slot per bucket, holding `1 + index` of the first entry of
//!   the bucket's chain or [`UNSET`]. Stored in the narrowest integer type
//!   that can address the table.
//! - `entries`: one `u32` per entry slot. The bits above the mask hold the
//!   hash prefix, the bits below hold `1 + index` of the next entry in the
//!   same chain. `entries.len()` is the entry capacity; slots at or past
//!   `len()` are zero.
//! - `keys` / `values`: co-indexed with `entries`, always exactly `len()`
//!   long, so the live region is the prefix `[0, len)`.
//!
//! The table never calls the hasher itself. Callers pass the smeared hash of
//! the key being looked up, and a rehash closure wherever the table has to
//! locate the chain of an entry it is moving.

use crate::capacity::{
    grow_entries, grow_table, hash_prefix, mask_combine, next_of, table_size, Metadata,
    MAX_BUCKET_CHAIN_LENGTH, MAX_SIZE, UNSET,
};

/// Bucket heads, sized to a power of two.
#[derive(Clone, Debug)]
enum BucketTable {
    Narrow(Box<[u8]>),
    Medium(Box<[u16]>),
    Wide(Box<[u32]>),
}

impl BucketTable {
    fn new(buckets: usize) -> Self {
        debug_assert!(buckets.is_power_of_two());
        if buckets <= 1 << 8 {
            BucketTable::Narrow(vec![0; buckets].into_boxed_slice())
        } else if buckets <= 1 << 16 {
            BucketTable::Medium(vec![0; buckets].into_boxed_slice())
        } else {
            BucketTable::Wide(vec![0; buckets].into_boxed_slice())
        }
    }

    #[inline]
    fn get(&self, bucket: usize) -> u32 {
        match self {
            BucketTable::Narrow(t) => u32::from(t[bucket]),
            BucketTable::Medium(t) => u32::from(t[bucket]),
            BucketTable::Wide(t) => t[bucket],
        }
    }

    // Heads never exceed the mask, which always fits the chosen width.
    #[inline]
    fn set(&mut self, bucket: usize, head: u32) {
        match self {
            BucketTable::Narrow(t) => t[bucket] = head as u8,
            BucketTable::Medium(t) => t[bucket] = head as u16,
            BucketTable::Wide(t) => t[bucket] = head,
        }
    }

    fn clear(&mut self) {
        match self {
            BucketTable::Narrow(t) => t.fill(0),
            BucketTable::Medium(t) => t.fill(0),
            BucketTable::Wide(t) => t.fill(0),
        }
    }

    fn len(&self) -> usize {
        match self {
            BucketTable::Narrow(t) => t.len(),
            BucketTable::Medium(t) => t.len(),
            BucketTable::Wide(t) => t.len(),
        }
    }
}

/// Outcome of [`CompactTable::insert`].
#[derive(Debug)]
pub(crate) enum Insert<K, V> {
    /// Appended at this index.
    Inserted(usize),
    /// An equal key lives at this index; the arguments are handed back.
    Present(usize, K, V),
    /// The target chain reached [`MAX_BUCKET_CHAIN_LENGTH`]; nothing changed.
    Flooded(K, V),
    /// The table already holds [`MAX_SIZE`] entries; nothing changed.
    Full(K, V),
}

#[derive(Clone, Debug)]
pub(crate) struct CompactTable<K, V> {
    table: BucketTable,
    entries: Vec<u32>,
    keys: Vec<K>,
    values: Vec<V>,
    /// Most live entries allowed; [`MAX_SIZE`] outside of tests.
    max_len: usize,
}

impl<K, V> CompactTable<K, V> {
    /// Allocates arrays for `expected` entries and records the table width.
    pub(crate) fn allocate(expected: usize, meta: &mut Metadata) -> Self {
        let expected = expected.clamp(1, MAX_SIZE);
        let buckets = table_size(expected);
        meta.set_mask((buckets - 1) as u32);
        Self {
            table: BucketTable::new(buckets),
            entries: vec![UNSET; expected],
            keys: Vec::with_capacity(expected),
            values: Vec::with_capacity(expected),
            max_len: MAX_SIZE,
        }
    }

    #[cfg(test)]
    pub(crate) fn set_max_len(&mut self, max_len: usize) {
        self.max_len = max_len.min(MAX_SIZE);
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.keys.len()
    }

    /// Entry slots currently allocated.
    pub(crate) fn capacity(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn buckets(&self) -> usize {
        self.table.len()
    }

    pub(crate) fn keys(&self) -> &[K] {
        &self.keys
    }

    pub(crate) fn values(&self) -> &[V] {
        &self.values
    }

    pub(crate) fn keys_values_mut(&mut self) -> (&[K], &mut [V]) {
        (&self.keys, &mut self.values)
    }

    pub(crate) fn into_parts(self) -> (Vec<K>, Vec<V>) {
        (self.keys, self.values)
    }

    /// Index of the entry whose key satisfies `eq`, walking only the chain
    /// for `hash`.
    pub(crate) fn find(&self, mask: u32, hash: u32, mut eq: impl FnMut(&K) -> bool) -> Option<usize> {
        let prefix = hash_prefix(hash, mask);
        let mut next = self.table.get((hash & mask) as usize);
        while next != UNSET {
            let index = (next - 1) as usize;
            let entry = self.entries[index];
            if hash_prefix(entry, mask) == prefix && eq(&self.keys[index]) {
                return Some(index);
            }
            next = next_of(entry, mask);
        }
        None
    }

    /// Appends `key` unless an equal key is present.
    ///
    /// The new entry always lands at index `len()`, so without removals
    /// entries stay in insertion order.
    pub(crate) fn insert(
        &mut self,
        meta: &mut Metadata,
        hash: u32,
        key: K,
        value: V,
        mut eq: impl FnMut(&K, &K) -> bool,
    ) -> Insert<K, V> {
        let mut mask = meta.mask();
        let index = self.len();
        let new_len = index + 1;
        let bucket = (hash & mask) as usize;
        let head = self.table.get(bucket);

        if head == UNSET {
            if new_len > self.max_len {
                return Insert::Full(key, value);
            }
            if new_len > mask as usize {
                mask = self.resize_table(meta, mask, grow_table(mask), Some((hash, index)));
            } else {
                self.table.set(bucket, index as u32 + 1);
            }
        } else {
            let prefix = hash_prefix(hash, mask);
            let mut next = head;
            let mut chain_len = 0;
            let tail = loop {
                let at = (next - 1) as usize;
                let entry = self.entries[at];
                if hash_prefix(entry, mask) == prefix && eq(&key, &self.keys[at]) {
                    return Insert::Present(at, key, value);
                }
                chain_len += 1;
                next = next_of(entry, mask);
                if next == UNSET {
                    break at;
                }
            };
            if chain_len >= MAX_BUCKET_CHAIN_LENGTH {
                return Insert::Flooded(key, value);
            }
            if new_len > self.max_len {
                return Insert::Full(key, value);
            }
            if new_len > mask as usize {
                mask = self.resize_table(meta, mask, grow_table(mask), Some((hash, index)));
            } else {
                self.entries[tail] = mask_combine(self.entries[tail], index as u32 + 1, mask);
            }
        }

        self.reserve_entries(new_len);
        self.entries[index] = mask_combine(hash, UNSET, mask);
        self.keys.push(key);
        self.values.push(value);
        Insert::Inserted(index)
    }

    /// Removes the entry whose key satisfies `eq`.
    ///
    /// `rehash` must return the smeared hash of a stored key; it is called for
    /// the entry moved into the vacated slot.
    pub(crate) fn remove(
        &mut self,
        mask: u32,
        hash: u32,
        mut eq: impl FnMut(&K) -> bool,
        rehash: impl FnOnce(&K) -> u32,
    ) -> Option<(K, V)> {
        let bucket = (hash & mask) as usize;
        let prefix = hash_prefix(hash, mask);
        let mut prev = None;
        let mut next = self.table.get(bucket);
        while next != UNSET {
            let index = (next - 1) as usize;
            let entry = self.entries[index];
            if hash_prefix(entry, mask) == prefix && eq(&self.keys[index]) {
                let after = next_of(entry, mask);
                match prev {
                    None => self.table.set(bucket, after),
                    Some(p) => self.entries[p] = mask_combine(self.entries[p], after, mask),
                }
                return Some(self.swap_remove(index, mask, rehash));
            }
            prev = Some(index);
            next = next_of(entry, mask);
        }
        None
    }

    /// Removes the entry at `index`, whose key hashes to `hash`.
    pub(crate) fn remove_at(
        &mut self,
        mask: u32,
        index: usize,
        hash: u32,
        rehash: impl FnOnce(&K) -> u32,
    ) -> (K, V) {
        let after = next_of(self.entries[index], mask);
        self.relink(mask, hash, index as u32 + 1, after);
        self.swap_remove(index, mask, rehash)
    }

    /// Fills the unlinked slot `dst` with the last live entry and truncates.
    fn swap_remove(&mut self, dst: usize, mask: u32, rehash: impl FnOnce(&K) -> u32) -> (K, V) {
        let src = self.len() - 1;
        if dst < src {
            let moved_hash = rehash(&self.keys[src]);
            self.entries[dst] = self.entries[src];
            self.entries[src] = UNSET;
            self.relink(mask, moved_hash, src as u32 + 1, dst as u32 + 1);
        } else {
            self.entries[dst] = UNSET;
        }
        (self.keys.swap_remove(dst), self.values.swap_remove(dst))
    }

    /// Rewrites the pointer in `hash`'s chain that holds `from` so it holds `to`.
    fn relink(&mut self, mask: u32, hash: u32, from: u32, to: u32) {
        let bucket = (hash & mask) as usize;
        let mut next = self.table.get(bucket);
        if next == from {
            self.table.set(bucket, to);
            return;
        }
        while next != UNSET {
            let index = (next - 1) as usize;
            let entry = self.entries[index];
            next = next_of(entry, mask);
            if next == from {
                self.entries[index] = mask_combine(entry, to, mask);
                return;
            }
        }
        debug_assert!(false, "entry {from} is not linked from bucket {bucket}");
    }

    /// Rebuilds the bucket table with `buckets` slots and returns the new mask.
    ///
    /// Each entry's full hash is its stored prefix OR'd with the bucket it was
    /// found in. `target` links a not-yet-written entry as the innermost link
    /// of its new chain; the caller writes that entry afterwards.
    fn resize_table(
        &mut self,
        meta: &mut Metadata,
        old_mask: u32,
        buckets: usize,
        target: Option<(u32, usize)>,
    ) -> u32 {
        log::trace!("compact table rehash: {} -> {} buckets", old_mask as usize + 1, buckets);
        let mut table = BucketTable::new(buckets);
        let new_mask = (buckets - 1) as u32;
        if let Some((hash, index)) = target {
            table.set((hash & new_mask) as usize, index as u32 + 1);
        }
        for old_bucket in 0..=old_mask {
            let mut old_next = self.table.get(old_bucket as usize);
            while old_next != UNSET {
                let index = (old_next - 1) as usize;
                let old_entry = self.entries[index];
                let hash = hash_prefix(old_entry, old_mask) | old_bucket;
                let new_bucket = (hash & new_mask) as usize;
                let new_next = table.get(new_bucket);
                table.set(new_bucket, old_next);
                self.entries[index] = mask_combine(hash, new_next, new_mask);
                old_next = next_of(old_entry, old_mask);
            }
        }
        self.table = table;
        meta.set_mask(new_mask);
        new_mask
    }

    fn reserve_entries(&mut self, new_len: usize) {
        let capacity = self.capacity();
        if new_len > capacity {
            let grown = grow_entries(capacity);
            log::trace!("compact entries grow: {} -> {} slots", capacity, grown);
            self.resize_entries(grown);
        }
    }

    fn resize_entries(&mut self, capacity: usize) {
        debug_assert!(capacity >= self.len());
        self.entries.resize(capacity, UNSET);
        self.entries.shrink_to_fit();
        let live = self.len();
        if capacity > self.keys.capacity() {
            self.keys.reserve_exact(capacity - live);
            self.values.reserve_exact(capacity - live);
        } else {
            self.keys.shrink_to(capacity);
            self.values.shrink_to(capacity);
        }
    }

    /// Drops every entry, keeping the allocation.
    pub(crate) fn clear(&mut self) {
        self.table.clear();
        self.entries.fill(UNSET);
        self.keys.clear();
        self.values.clear();
    }

    /// Retains only the entries for which `keep` returns true. Returns the
    /// number removed.
    ///
    /// The version is bumped before the first removal, so a panic in `keep`
    /// after that point still leaves the change visible to cursors.
    pub(crate) fn retain(
        &mut self,
        meta: &mut Metadata,
        hash_of: impl Fn(&K) -> u32,
        mut keep: impl FnMut(&K, &mut V) -> bool,
    ) -> usize {
        let mask = meta.mask();
        let mut removed = 0;
        let mut index = 0;
        while index < self.len() {
            if keep(&self.keys[index], &mut self.values[index]) {
                index += 1;
            } else {
                if removed == 0 {
                    meta.bump();
                }
                let hash = hash_of(&self.keys[index]);
                self.remove_at(mask, index, hash, &hash_of);
                removed += 1;
            }
        }
        removed
    }

    /// Shrinks the entry arrays to `len()` and the bucket table to the
    /// smallest size that still addresses them.
    pub(crate) fn shrink_to_fit(&mut self, meta: &mut Metadata) {
        let len = self.len();
        if len < self.capacity() {
            self.resize_entries(len.max(1));
        }
        let buckets = table_size(len);
        let mask = meta.mask();
        if buckets < mask as usize {
            self.resize_table(meta, mask, buckets, None);
        }
    }

    /// Checks every structural invariant; used by tests.
    #[cfg(test)]
    pub(crate) fn assert_consistent(&self, meta: Metadata, hash_of: impl Fn(&K) -> u32) {
        let mask = meta.mask();
        assert_eq!(self.table.len(), mask as usize + 1);
        assert_eq!(self.keys.len(), self.values.len());
        assert!(self.len() <= self.capacity());
        assert!(self.len() <= mask as usize);
        assert!(self.entries[self.len()..].iter().all(|&e| e == UNSET));

        let mut seen = vec![false; self.len()];
        for bucket in 0..=mask {
            let mut next = self.table.get(bucket as usize);
            while next != UNSET {
                let index = (next - 1) as usize;
                assert!(index < self.len(), "chain points past the live region");
                assert!(!seen[index], "entry {index} reachable twice");
                seen[index] = true;
                let hash = hash_of(&self.keys[index]);
                assert_eq!(hash & mask, bucket, "entry {index} in the wrong bucket");
                assert_eq!(hash_prefix(self.entries[index], mask), hash_prefix(hash, mask));
                next = next_of(self.entries[index], mask);
            }
        }
        assert!(seen.into_iter().all(|s| s), "unreachable live entry");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capacity::smear;
    use std::collections::hash_map::RandomState;
    use std::hash::BuildHasher;

    struct Harness {
        meta: Metadata,
        table: CompactTable<u64, u64>,
        hasher: RandomState,
    }

    impl Harness {
        fn new(expected: usize) -> Self {
            let mut meta = Metadata::default();
            let table = CompactTable::allocate(expected, &mut meta);
            Self {
                meta,
                table,
                hasher: RandomState::new(),
            }
        }

        fn hash(&self, k: &u64) -> u32 {
            smear(self.hasher.hash_one(k))
        }

        fn insert(&mut self, k: u64) -> Insert<u64, u64> {
            let hash = self.hash(&k);
            self.table.insert(&mut self.meta, hash, k, k * 10, |a, b| a == b)
        }

        fn find(&self, k: u64) -> Option<usize> {
            self.table.find(self.meta.mask(), self.hash(&k), |s| *s == k)
        }

        fn remove(&mut self, k: u64) -> Option<(u64, u64)> {
            let hash = self.hash(&k);
            let hasher = &self.hasher;
            self.table.remove(self.meta.mask(), hash, |s| *s == k, |s| smear(hasher.hash_one(s)))
        }

        fn check(&self) {
            self.table
                .assert_consistent(self.meta, |k| smear(self.hasher.hash_one(k)));
        }
    }

    #[test]
    fn insert_appends_in_order_and_resizes() {
        let mut h = Harness::new(1);
        for k in 0..500 {
            match h.insert(k) {
                Insert::Inserted(i) => assert_eq!(i, k as usize),
                other => panic!("unexpected {:?}", other),
            }
            h.check();
        }
        assert_eq!(h.table.keys(), (0..500).collect::<Vec<_>>().as_slice());
        assert!(h.table.buckets() > 500);
        for k in 0..500 {
            assert_eq!(h.find(k), Some(k as usize));
        }
        assert_eq!(h.find(500), None);
    }

    #[test]
    fn duplicate_insert_hands_arguments_back() {
        let mut h = Harness::new(4);
        h.insert(7);
        match h.insert(7) {
            Insert::Present(0, 7, 70) => {}
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(h.table.len(), 1);
    }

    #[test]
    fn remove_moves_last_entry_and_relinks() {
        let mut h = Harness::new(8);
        for k in 0..100 {
            h.insert(k);
        }
        assert_eq!(h.remove(10), Some((10, 100)));
        h.check();
        // Last entry filled the hole.
        assert_eq!(h.table.keys()[10], 99);
        assert_eq!(h.find(99), Some(10));
        assert_eq!(h.remove(10), None);

        for k in (0..100).filter(|k| k % 3 == 0) {
            assert_eq!(h.remove(k), Some((k, k * 10)));
            h.check();
        }
        for k in 0..100 {
            let expect = k != 10 && k % 3 != 0;
            assert_eq!(h.find(k).is_some(), expect, "key {k}");
        }
    }

    #[test]
    fn remove_last_entry_only_clears_it() {
        let mut h = Harness::new(4);
        h.insert(1);
        h.insert(2);
        assert_eq!(h.remove(2), Some((2, 20)));
        h.check();
        assert_eq!(h.table.keys(), &[1]);
        assert_eq!(h.remove(1), Some((1, 10)));
        h.check();
        assert_eq!(h.table.len(), 0);
    }

    #[test]
    fn entry_capacity_grows_independently_of_buckets() {
        let mut h = Harness::new(3);
        assert_eq!(h.table.capacity(), 3);
        assert_eq!(h.table.buckets(), 4);
        for k in 0..4 {
            h.insert(k);
        }
        assert_eq!(h.table.capacity(), 5);
        assert_eq!(h.table.buckets(), 16);
        h.insert(4);
        h.insert(5);
        assert_eq!(h.table.capacity(), 7);
        assert_eq!(h.table.buckets(), 16);
        h.check();
    }

    #[test]
    fn table_width_follows_bucket_count() {
        let mut h = Harness::new(1);
        assert!(matches!(h.table.table, BucketTable::Narrow(_)));
        for k in 0..300 {
            h.insert(k);
        }
        assert!(matches!(h.table.table, BucketTable::Medium(_)));
        for k in 300..70_000 {
            h.insert(k);
        }
        assert!(matches!(h.table.table, BucketTable::Wide(_)));
        h.check();
    }

    #[test]
    fn flooded_chain_is_reported_without_mutation() {
        let mut meta = Metadata::default();
        let mut table: CompactTable<u32, ()> = CompactTable::allocate(64, &mut meta);
        for k in 0..MAX_BUCKET_CHAIN_LENGTH as u32 {
            assert!(matches!(
                table.insert(&mut meta, 0, k, (), |a, b| a == b),
                Insert::Inserted(_)
            ));
        }
        match table.insert(&mut meta, 0, 1000, (), |a, b| a == b) {
            Insert::Flooded(1000, ()) => {}
            other => panic!("unexpected {:?}", other),
        }
        // Present keys are still recognised on a long chain.
        assert!(matches!(
            table.insert(&mut meta, 0, 3, (), |a, b| a == b),
            Insert::Present(3, 3, ())
        ));
        assert_eq!(table.len(), MAX_BUCKET_CHAIN_LENGTH);
        table.assert_consistent(meta, |_| 0);
    }

    #[test]
    fn retain_and_shrink_keep_structure_valid() {
        let mut h = Harness::new(1);
        for k in 0..1000 {
            h.insert(k);
        }
        let hasher = h.hasher.clone();
        let version = h.meta.version();
        let removed = h
            .table
            .retain(&mut h.meta, |k| smear(hasher.hash_one(k)), |k, _| k % 10 == 0);
        assert_eq!(removed, 900);
        assert_eq!(h.meta.version(), version + 1);
        h.check();

        h.table.shrink_to_fit(&mut h.meta);
        assert_eq!(h.table.capacity(), 100);
        assert_eq!(h.table.buckets(), 128);
        h.check();
        for k in 0..1000 {
            assert_eq!(h.find(k).is_some(), k % 10 == 0);
        }
    }

    #[test]
    fn full_table_hands_arguments_back() {
        let mut h = Harness::new(4);
        h.table.set_max_len(5);
        for k in 0..5 {
            assert!(matches!(h.insert(k), Insert::Inserted(_)));
        }
        let version = h.meta.version();
        let mask = h.meta.mask();
        match h.insert(99) {
            Insert::Full(99, 990) => {}
            other => panic!("unexpected {:?}", other),
        }
        // Duplicates are still recognised at the limit.
        assert!(matches!(h.insert(2), Insert::Present(2, 2, 20)));
        assert_eq!(h.table.len(), 5);
        assert_eq!(h.meta.mask(), mask);
        assert_eq!(h.meta.version(), version);
        h.check();

        h.remove(0);
        assert!(matches!(h.insert(99), Insert::Inserted(4)));
        h.check();
    }

    #[test]
    fn retain_without_removals_keeps_version() {
        let mut h = Harness::new(8);
        for k in 0..8 {
            h.insert(k);
        }
        let hasher = h.hasher.clone();
        let removed = h.table.retain(&mut h.meta, |k| smear(hasher.hash_one(k)), |_, _| true);
        assert_eq!(removed, 0);
        assert_eq!(h.meta.version(), 0);
    }

    #[test]
    fn clear_keeps_allocation() {
        let mut h = Harness::new(1);
        for k in 0..50 {
            h.insert(k);
        }
        let capacity = h.table.capacity();
        h.table.clear();
        assert_eq!(h.table.len(), 0);
        assert_eq!(h.table.capacity(), capacity);
        h.check();
        assert_eq!(h.find(3), None);
        h.insert(3);
        assert_eq!(h.find(3), Some(0));
    }
}
