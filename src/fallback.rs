//! FallbackMap: the flood-resistant representation a compact collection
//! switches to once a bucket chain grows suspiciously long.
//!
//! Entries live densely in a `Vec`, addressed by position exactly like the
//! compact arrays, and a `hashbrown::HashTable<usize>` indexes them. Hashing
//! uses a freshly seeded `RandomState` (keyed SipHash) regardless of the
//! hasher the collection was built with, so inputs chosen to collide under
//! the caller's hasher no longer collide here. Removal swaps the last entry
//! into the hole, which keeps positional cursors working unchanged.

use crate::capacity::Metadata;
use core::hash::{BuildHasher, Hash};
use hashbrown::HashTable;
use std::collections::hash_map::RandomState;

#[derive(Clone, Debug)]
pub(crate) struct Bucket<K, V> {
    hash: u64,
    pub(crate) key: K,
    pub(crate) value: V,
}

#[derive(Clone)]
pub(crate) struct FallbackMap<K, V> {
    hasher: RandomState,
    index: HashTable<usize>,
    entries: Vec<Bucket<K, V>>,
}

impl<K, V> FallbackMap<K, V>
where
    K: Eq + Hash,
{
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            hasher: RandomState::new(),
            index: HashTable::with_capacity(capacity),
            entries: Vec::with_capacity(capacity),
        }
    }

    fn make_hash<Q>(&self, q: &Q) -> u64
    where
        Q: ?Sized + Hash,
    {
        self.hasher.hash_one(q)
    }

    pub(crate) fn find<Q>(&self, q: &Q) -> Option<usize>
    where
        K: core::borrow::Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let hash = self.make_hash(q);
        let entries = &self.entries;
        self.index
            .find(hash, |&i| entries[i].key.borrow() == q)
            .copied()
    }

    /// Appends `key`, or returns the position of the equal key already
    /// stored together with the rejected arguments.
    pub(crate) fn insert(&mut self, key: K, value: V) -> Result<usize, (usize, K, V)> {
        let hash = self.make_hash(&key);
        let entries = &self.entries;
        match self.index.entry(
            hash,
            |&i| entries[i].key == key,
            |&i| entries[i].hash,
        ) {
            hashbrown::hash_table::Entry::Occupied(o) => Err((*o.get(), key, value)),
            hashbrown::hash_table::Entry::Vacant(v) => {
                let i = entries.len();
                v.insert(i);
                self.entries.push(Bucket { hash, key, value });
                Ok(i)
            }
        }
    }

    /// Appends a key known to be absent.
    pub(crate) fn insert_unique(&mut self, key: K, value: V) {
        let hash = self.make_hash(&key);
        let i = self.entries.len();
        let entries = &self.entries;
        self.index.insert_unique(hash, i, |&j| entries[j].hash);
        self.entries.push(Bucket { hash, key, value });
    }

    pub(crate) fn remove<Q>(&mut self, q: &Q) -> Option<(K, V)>
    where
        K: core::borrow::Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let i = self.find(q)?;
        Some(self.remove_at(i))
    }

    /// Removes the entry at `i`, moving the last entry into its place.
    pub(crate) fn remove_at(&mut self, i: usize) -> (K, V) {
        let hash = self.entries[i].hash;
        self.index
            .find_entry(hash, |&j| j == i)
            .expect("fallback index out of sync with its entries")
            .remove();

        let last = self.entries.len() - 1;
        if i != last {
            let moved_hash = self.entries[last].hash;
            if let Some(slot) = self.index.find_mut(moved_hash, |&j| j == last) {
                *slot = i;
            }
        }
        let bucket = self.entries.swap_remove(i);
        (bucket.key, bucket.value)
    }

    /// Retains only the entries for which `keep` returns true. Returns the
    /// number removed. Bumps the version once, before the first removal.
    pub(crate) fn retain(
        &mut self,
        meta: &mut Metadata,
        mut keep: impl FnMut(&K, &mut V) -> bool,
    ) -> usize {
        let mut removed = 0;
        let mut i = 0;
        while i < self.entries.len() {
            let bucket = &mut self.entries[i];
            if keep(&bucket.key, &mut bucket.value) {
                i += 1;
            } else {
                if removed == 0 {
                    meta.bump();
                }
                self.remove_at(i);
                removed += 1;
            }
        }
        removed
    }

    pub(crate) fn shrink_to_fit(&mut self) {
        let entries = &self.entries;
        self.index.shrink_to_fit(|&i| entries[i].hash);
        self.entries.shrink_to_fit();
    }
}

impl<K, V> FallbackMap<K, V> {
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn capacity(&self) -> usize {
        self.entries.capacity()
    }

    pub(crate) fn entries(&self) -> &[Bucket<K, V>] {
        &self.entries
    }

    pub(crate) fn entries_mut(&mut self) -> &mut [Bucket<K, V>] {
        &mut self.entries
    }

    pub(crate) fn into_entries(self) -> Vec<Bucket<K, V>> {
        self.entries
    }

    pub(crate) fn clear(&mut self) {
        self.index.clear();
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Invariant: Duplicate keys are rejected and the stored entry is unchanged.
    #[test]
    fn duplicate_insert_rejected() {
        let mut m: FallbackMap<String, i32> = FallbackMap::with_capacity(0);
        assert_eq!(m.insert("dup".to_string(), 1).ok(), Some(0));
        match m.insert("dup".to_string(), 2) {
            Err((0, k, 2)) => assert_eq!(k, "dup"),
            other => panic!("unexpected result: {:?}", other.map_err(|(i, _, _)| i)),
        }
        assert_eq!(m.entries()[0].value, 1);
        assert_eq!(m.len(), 1);
    }

    /// Invariant: Borrowed lookup works (store `String`, query with `&str`).
    #[test]
    fn borrowed_lookup_with_str() {
        let mut m: FallbackMap<String, i32> = FallbackMap::with_capacity(4);
        m.insert_unique("hello".to_string(), 1);
        assert_eq!(m.find("hello"), Some(0));
        assert_eq!(m.find("world"), None);
    }

    /// Invariant: Removal moves the last entry into the hole and its index
    /// entry follows it.
    #[test]
    fn remove_swaps_last_into_hole() {
        let mut m: FallbackMap<u32, u32> = FallbackMap::with_capacity(0);
        for k in 0..10 {
            m.insert_unique(k, k * 2);
        }
        assert_eq!(m.remove(&3), Some((3, 6)));
        assert_eq!(m.entries()[3].key, 9);
        assert_eq!(m.find(&9), Some(3));
        assert_eq!(m.find(&3), None);
        assert_eq!(m.remove(&3), None);

        let (k, v) = m.remove_at(8);
        assert_eq!((k, v), (8, 16));
        assert_eq!(m.len(), 8);
        for k in [0, 1, 2, 4, 5, 6, 7, 9] {
            let i = m.find(&k).expect("still present");
            assert_eq!(m.entries()[i].key, k);
        }
    }

    /// Invariant: Without removals, entries keep insertion order.
    #[test]
    fn insertion_order_kept_until_removal() {
        let mut m: FallbackMap<String, ()> = FallbackMap::with_capacity(0);
        let words = ["delta", "alpha", "charlie", "bravo"];
        for w in words {
            m.insert(w.to_string(), ()).unwrap();
        }
        let seen: Vec<&str> = m.entries().iter().map(|b| b.key.as_str()).collect();
        assert_eq!(seen, words);
    }

    #[test]
    fn retain_and_clear() {
        let mut m: FallbackMap<u32, u32> = FallbackMap::with_capacity(0);
        for k in 0..100 {
            m.insert_unique(k, k);
        }
        let mut meta = Metadata::default();
        assert_eq!(m.retain(&mut meta, |k, v| {
            *v += 1;
            k % 2 == 0
        }), 50);
        assert_eq!(meta.version(), 1);
        assert_eq!(m.len(), 50);
        for k in 0..100 {
            assert_eq!(m.find(&k).is_some(), k % 2 == 0);
        }
        m.shrink_to_fit();
        assert_eq!(m.find(&42).map(|i| m.entries()[i].value), Some(43));

        m.clear();
        assert_eq!(m.len(), 0);
        assert_eq!(m.find(&42), None);
        m.insert_unique(42, 0);
        assert_eq!(m.find(&42), Some(0));
    }
}
