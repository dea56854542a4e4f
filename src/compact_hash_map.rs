//! CompactHashMap: public map over the packed compact table, with a one-way
//! switch to the flood-resistant fallback.

use crate::capacity::{smear, Metadata, DEFAULT_SIZE, MAX_SIZE};
use crate::compact_table::{CompactTable, Insert};
use crate::cursor::Cursor;
use crate::error::Error;
use crate::fallback::{Bucket, FallbackMap};
use core::borrow::Borrow;
use core::fmt;
use core::hash::{BuildHasher, Hash};
use core::iter::{FusedIterator, Zip};
use core::mem;
use core::ops::Index;
use core::slice;
use std::collections::hash_map::RandomState;
use std::vec;

#[derive(Clone)]
enum Repr<K, V> {
    /// Nothing allocated yet; carries the expected-size hint.
    Unallocated(usize),
    Compact(CompactTable<K, V>),
    /// Terminal: once here a collection never returns to the compact arrays.
    Fallback(FallbackMap<K, V>),
}

/// A hash map that stores its entries in a few flat arrays instead of one
/// allocation per node.
///
/// Lookups, inserts and removals are expected O(1). Without removals,
/// iteration yields entries in insertion order; a removal moves the last
/// entry into the freed slot, after which order is unspecified.
///
/// If an insert finds a bucket chain of
/// [`MAX_BUCKET_CHAIN_LENGTH`](crate::capacity::MAX_BUCKET_CHAIN_LENGTH)
/// entries the map assumes its hasher is being attacked, and moves every
/// entry to a randomly keyed fallback table for the rest of its life.
///
/// Not synchronized: wrap it in a lock to share it across threads.
#[derive(Clone)]
pub struct CompactHashMap<K, V, S = RandomState> {
    hasher: S,
    meta: Metadata,
    repr: Repr<K, V>,
}

#[inline]
fn make_hash<S, Q>(hasher: &S, q: &Q) -> u32
where
    S: BuildHasher,
    Q: ?Sized + Hash,
{
    smear(hasher.hash_one(q))
}

impl<K, V> CompactHashMap<K, V> {
    pub fn new() -> Self {
        Self::with_expected_size(DEFAULT_SIZE)
    }

    /// Creates a map that can hold `expected` entries before growing. Nothing
    /// is allocated until the first insert.
    pub fn with_expected_size(expected: usize) -> Self {
        Self::with_expected_size_and_hasher(expected, RandomState::new())
    }

    /// Like [`with_expected_size`](Self::with_expected_size) for a signed
    /// hint, such as a length read back from an external encoding.
    pub fn try_with_expected_size(expected: i64) -> Result<Self, Error> {
        if expected < 0 {
            return Err(Error::InvalidExpectedSize(expected));
        }
        Ok(Self::with_expected_size(
            usize::try_from(expected).unwrap_or(usize::MAX),
        ))
    }
}

impl<K, V> Default for CompactHashMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S> CompactHashMap<K, V, S> {
    pub fn with_hasher(hasher: S) -> Self {
        Self::with_expected_size_and_hasher(DEFAULT_SIZE, hasher)
    }

    pub fn with_expected_size_and_hasher(expected: usize, hasher: S) -> Self {
        Self {
            hasher,
            meta: Metadata::default(),
            repr: Repr::Unallocated(expected.min(MAX_SIZE)),
        }
    }

    pub fn hasher(&self) -> &S {
        &self.hasher
    }

    pub fn len(&self) -> usize {
        match &self.repr {
            Repr::Unallocated(_) => 0,
            Repr::Compact(table) => table.len(),
            Repr::Fallback(fallback) => fallback.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entries the map can hold before its entry arrays grow; 0 until the
    /// first insert allocates them.
    pub fn capacity(&self) -> usize {
        match &self.repr {
            Repr::Unallocated(_) => 0,
            Repr::Compact(table) => table.capacity(),
            Repr::Fallback(fallback) => fallback.capacity(),
        }
    }

    /// True once the map has switched to its flood-resistant fallback.
    pub fn is_flood_resistant(&self) -> bool {
        matches!(self.repr, Repr::Fallback(_))
    }

    /// Removes every entry. Keeps the current allocation and representation.
    pub fn clear(&mut self) {
        match &mut self.repr {
            Repr::Unallocated(_) => return,
            Repr::Compact(table) => table.clear(),
            Repr::Fallback(fallback) => fallback.clear(),
        }
        self.meta.bump();
    }

    pub fn iter(&self) -> Iter<'_, K, V> {
        let inner = match &self.repr {
            Repr::Unallocated(_) => IterRepr::Compact(<&[K]>::default().iter().zip(<&[V]>::default())),
            Repr::Compact(table) => IterRepr::Compact(table.keys().iter().zip(table.values())),
            Repr::Fallback(fallback) => IterRepr::Fallback(fallback.entries().iter()),
        };
        Iter { inner }
    }

    pub fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        let inner = match &mut self.repr {
            Repr::Unallocated(_) => {
                IterMutRepr::Compact(<&[K]>::default().iter().zip(<&mut [V]>::default()))
            }
            Repr::Compact(table) => {
                let (keys, values) = table.keys_values_mut();
                IterMutRepr::Compact(keys.iter().zip(values.iter_mut()))
            }
            Repr::Fallback(fallback) => IterMutRepr::Fallback(fallback.entries_mut().iter_mut()),
        };
        IterMut { inner }
    }

    pub fn keys(&self) -> Keys<'_, K, V> {
        Keys { inner: self.iter() }
    }

    pub fn values(&self) -> Values<'_, K, V> {
        Values { inner: self.iter() }
    }

    pub fn values_mut(&mut self) -> ValuesMut<'_, K, V> {
        ValuesMut {
            inner: self.iter_mut(),
        }
    }

    /// Starts a fail-fast cursor at the first entry.
    pub fn cursor(&self) -> Cursor {
        Cursor::new(self.version())
    }

    pub(crate) fn version(&self) -> u64 {
        self.meta.version()
    }

    /// Entry at a live position, in iteration order.
    pub(crate) fn entry_at(&self, index: usize) -> Option<(&K, &V)> {
        match &self.repr {
            Repr::Unallocated(_) => None,
            Repr::Compact(table) => Some((table.keys().get(index)?, table.values().get(index)?)),
            Repr::Fallback(fallback) => fallback.entries().get(index).map(|b| (&b.key, &b.value)),
        }
    }

    fn value_at_mut(&mut self, index: usize) -> Option<&mut V> {
        match &mut self.repr {
            Repr::Unallocated(_) => None,
            Repr::Compact(table) => table.keys_values_mut().1.get_mut(index),
            Repr::Fallback(fallback) => fallback.entries_mut().get_mut(index).map(|b| &mut b.value),
        }
    }
}

impl<K, V, S> CompactHashMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    fn find<Q>(&self, q: &Q) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        match &self.repr {
            Repr::Unallocated(_) => None,
            Repr::Compact(table) => {
                let hash = make_hash(&self.hasher, q);
                table.find(self.meta.mask(), hash, |k| k.borrow() == q)
            }
            Repr::Fallback(fallback) => fallback.find(q),
        }
    }

    pub fn contains_key<Q>(&self, q: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.find(q).is_some()
    }

    pub fn get<Q>(&self, q: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.get_key_value(q).map(|(_, v)| v)
    }

    pub fn get_key_value<Q>(&self, q: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let index = self.find(q)?;
        self.entry_at(index)
    }

    pub fn get_mut<Q>(&mut self, q: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let index = self.find(q)?;
        self.value_at_mut(index)
    }

    /// Inserts `key -> value`, returning the previous value for an equal
    /// key. The stored key is kept when replacing.
    ///
    /// # Panics
    ///
    /// Panics if the map already holds [`MAX_SIZE`] entries and `key` is new.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        match self.try_insert(key, value) {
            Ok(previous) => previous,
            Err(e) => panic!("{e}"),
        }
    }

    /// Like [`insert`](Self::insert), but reports a full map as
    /// [`Error::CapacityOverflow`].
    pub fn try_insert(&mut self, key: K, value: V) -> Result<Option<V>, Error> {
        if let Repr::Unallocated(expected) = self.repr {
            self.repr = Repr::Compact(CompactTable::allocate(expected, &mut self.meta));
        }
        let outcome = match &mut self.repr {
            Repr::Compact(table) => {
                let hash = make_hash(&self.hasher, &key);
                table.insert(&mut self.meta, hash, key, value, |a, b| a == b)
            }
            Repr::Fallback(fallback) => {
                if fallback.len() >= MAX_SIZE && fallback.find(&key).is_none() {
                    return Err(Error::CapacityOverflow);
                }
                match fallback.insert(key, value) {
                    Ok(_) => Insert::Inserted(fallback.len() - 1),
                    Err((index, key, value)) => Insert::Present(index, key, value),
                }
            }
            Repr::Unallocated(_) => unreachable!("allocated above"),
        };
        match outcome {
            Insert::Inserted(_) => {
                self.meta.bump();
                Ok(None)
            }
            Insert::Present(index, _, value) => {
                Ok(self.value_at_mut(index).map(|slot| mem::replace(slot, value)))
            }
            Insert::Flooded(key, value) => {
                self.convert_to_fallback();
                self.try_insert(key, value)
            }
            Insert::Full(..) => Err(Error::CapacityOverflow),
        }
    }

    /// Moves every entry, in iteration order, into a fresh fallback map and
    /// releases the compact arrays.
    fn convert_to_fallback(&mut self) {
        let repr = mem::replace(&mut self.repr, Repr::Unallocated(0));
        let table = match repr {
            Repr::Compact(table) => table,
            other => {
                self.repr = other;
                return;
            }
        };
        let buckets = table.buckets();
        let (keys, values) = table.into_parts();
        let mut fallback = FallbackMap::with_capacity(keys.len() + 1);
        for (key, value) in keys.into_iter().zip(values) {
            fallback.insert_unique(key, value);
        }
        log::debug!(
            "bucket chain too long; moved {} entries from {} buckets to the flood-resistant map",
            fallback.len(),
            buckets
        );
        self.repr = Repr::Fallback(fallback);
        self.meta.bump();
    }

    pub fn remove<Q>(&mut self, q: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.remove_entry(q).map(|(_, v)| v)
    }

    pub fn remove_entry<Q>(&mut self, q: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let removed = match &mut self.repr {
            Repr::Unallocated(_) => None,
            Repr::Compact(table) => {
                let hasher = &self.hasher;
                table.remove(
                    self.meta.mask(),
                    make_hash(hasher, q),
                    |k| k.borrow() == q,
                    |k| make_hash(hasher, k),
                )
            }
            Repr::Fallback(fallback) => fallback.remove(q),
        };
        if removed.is_some() {
            self.meta.bump();
        }
        removed
    }

    /// Removes the entry at a live position, moving the last entry into it.
    pub(crate) fn remove_index(&mut self, index: usize) -> Option<(K, V)> {
        if index >= self.len() {
            return None;
        }
        let removed = match &mut self.repr {
            Repr::Unallocated(_) => return None,
            Repr::Compact(table) => {
                let hasher = &self.hasher;
                let hash = make_hash(hasher, &table.keys()[index]);
                table.remove_at(self.meta.mask(), index, hash, |k| make_hash(hasher, k))
            }
            Repr::Fallback(fallback) => fallback.remove_at(index),
        };
        self.meta.bump();
        Some(removed)
    }

    /// Keeps only the entries for which `keep` returns true.
    pub fn retain<F>(&mut self, keep: F)
    where
        F: FnMut(&K, &mut V) -> bool,
    {
        match &mut self.repr {
            Repr::Unallocated(_) => {}
            Repr::Compact(table) => {
                let hasher = &self.hasher;
                table.retain(&mut self.meta, |k| make_hash(hasher, k), keep);
            }
            Repr::Fallback(fallback) => {
                fallback.retain(&mut self.meta, keep);
            }
        }
    }

    /// Shrinks the backing storage to what the current entries need.
    pub fn shrink_to_fit(&mut self) {
        match &mut self.repr {
            Repr::Unallocated(_) => {}
            Repr::Compact(table) => table.shrink_to_fit(&mut self.meta),
            Repr::Fallback(fallback) => fallback.shrink_to_fit(),
        }
    }

    /// Lowers the compact entry limit, allocating first if needed.
    #[cfg(test)]
    pub(crate) fn set_max_len(&mut self, max_len: usize) {
        if let Repr::Unallocated(expected) = self.repr {
            self.repr = Repr::Compact(CompactTable::allocate(expected, &mut self.meta));
        }
        if let Repr::Compact(table) = &mut self.repr {
            table.set_max_len(max_len);
        }
    }

    #[cfg(test)]
    pub(crate) fn assert_consistent(&self) {
        if let Repr::Compact(table) = &self.repr {
            table.assert_consistent(self.meta, |k| make_hash(&self.hasher, k));
        }
    }
}

impl<K, V, S> fmt::Debug for CompactHashMap<K, V, S>
where
    K: fmt::Debug,
    V: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K, V, S> PartialEq for CompactHashMap<K, V, S>
where
    K: Eq + Hash,
    V: PartialEq,
    S: BuildHasher,
{
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|(k, v)| other.get(k) == Some(v))
    }
}

impl<K, V, S> Eq for CompactHashMap<K, V, S>
where
    K: Eq + Hash,
    V: Eq,
    S: BuildHasher,
{
}

impl<K, Q, V, S> Index<&Q> for CompactHashMap<K, V, S>
where
    K: Eq + Hash + Borrow<Q>,
    Q: ?Sized + Eq + Hash,
    S: BuildHasher,
{
    type Output = V;

    fn index(&self, key: &Q) -> &V {
        self.get(key).expect("key not present in CompactHashMap")
    }
}

impl<K, V, S> FromIterator<(K, V)> for CompactHashMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher + Default,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let iter = iter.into_iter();
        let mut map = Self::with_expected_size_and_hasher(iter.size_hint().0, S::default());
        map.extend(iter);
        map
    }
}

impl<K, V, S> Extend<(K, V)> for CompactHashMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

impl<'a, K, V, S> Extend<(&'a K, &'a V)> for CompactHashMap<K, V, S>
where
    K: Eq + Hash + Copy,
    V: Copy,
    S: BuildHasher,
{
    fn extend<I: IntoIterator<Item = (&'a K, &'a V)>>(&mut self, iter: I) {
        for (&k, &v) in iter {
            self.insert(k, v);
        }
    }
}

enum IterRepr<'a, K, V> {
    Compact(Zip<slice::Iter<'a, K>, slice::Iter<'a, V>>),
    Fallback(slice::Iter<'a, Bucket<K, V>>),
}

impl<K, V> Clone for IterRepr<'_, K, V> {
    fn clone(&self) -> Self {
        match self {
            IterRepr::Compact(it) => IterRepr::Compact(it.clone()),
            IterRepr::Fallback(it) => IterRepr::Fallback(it.clone()),
        }
    }
}

/// Iterator over `(&K, &V)` in the map's current order.
pub struct Iter<'a, K, V> {
    inner: IterRepr<'a, K, V>,
}

impl<K, V> Clone for Iter<'_, K, V> {
    fn clone(&self) -> Self {
        Iter {
            inner: self.inner.clone(),
        }
    }
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.inner {
            IterRepr::Compact(it) => it.next(),
            IterRepr::Fallback(it) => it.next().map(|b| (&b.key, &b.value)),
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match &self.inner {
            IterRepr::Compact(it) => it.size_hint(),
            IterRepr::Fallback(it) => it.size_hint(),
        }
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}
impl<K, V> FusedIterator for Iter<'_, K, V> {}

enum IterMutRepr<'a, K, V> {
    Compact(Zip<slice::Iter<'a, K>, slice::IterMut<'a, V>>),
    Fallback(slice::IterMut<'a, Bucket<K, V>>),
}

/// Iterator over `(&K, &mut V)` in the map's current order.
pub struct IterMut<'a, K, V> {
    inner: IterMutRepr<'a, K, V>,
}

impl<'a, K, V> Iterator for IterMut<'a, K, V> {
    type Item = (&'a K, &'a mut V);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.inner {
            IterMutRepr::Compact(it) => it.next(),
            IterMutRepr::Fallback(it) => it.next().map(|b| (&b.key, &mut b.value)),
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match &self.inner {
            IterMutRepr::Compact(it) => it.size_hint(),
            IterMutRepr::Fallback(it) => it.size_hint(),
        }
    }
}

impl<K, V> ExactSizeIterator for IterMut<'_, K, V> {}
impl<K, V> FusedIterator for IterMut<'_, K, V> {}

/// Iterator over the keys of a map.
pub struct Keys<'a, K, V> {
    inner: Iter<'a, K, V>,
}

impl<K, V> Clone for Keys<'_, K, V> {
    fn clone(&self) -> Self {
        Keys {
            inner: self.inner.clone(),
        }
    }
}

impl<'a, K, V> Iterator for Keys<'a, K, V> {
    type Item = &'a K;

    #[inline]
    fn next(&mut self) -> Option<&'a K> {
        self.inner.next().map(|(k, _)| k)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for Keys<'_, K, V> {}
impl<K, V> FusedIterator for Keys<'_, K, V> {}

/// Iterator over the values of a map.
pub struct Values<'a, K, V> {
    inner: Iter<'a, K, V>,
}

impl<'a, K, V> Iterator for Values<'a, K, V> {
    type Item = &'a V;

    #[inline]
    fn next(&mut self) -> Option<&'a V> {
        self.inner.next().map(|(_, v)| v)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for Values<'_, K, V> {}
impl<K, V> FusedIterator for Values<'_, K, V> {}

/// Iterator over mutable values of a map.
pub struct ValuesMut<'a, K, V> {
    inner: IterMut<'a, K, V>,
}

impl<'a, K, V> Iterator for ValuesMut<'a, K, V> {
    type Item = &'a mut V;

    #[inline]
    fn next(&mut self) -> Option<&'a mut V> {
        self.inner.next().map(|(_, v)| v)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for ValuesMut<'_, K, V> {}
impl<K, V> FusedIterator for ValuesMut<'_, K, V> {}

enum IntoIterRepr<K, V> {
    Compact(Zip<vec::IntoIter<K>, vec::IntoIter<V>>),
    Fallback(vec::IntoIter<Bucket<K, V>>),
}

/// Owning iterator over the entries of a map.
pub struct IntoIter<K, V> {
    inner: IntoIterRepr<K, V>,
}

impl<K, V> Iterator for IntoIter<K, V> {
    type Item = (K, V);

    #[inline]
    fn next(&mut self) -> Option<(K, V)> {
        match &mut self.inner {
            IntoIterRepr::Compact(it) => it.next(),
            IntoIterRepr::Fallback(it) => it.next().map(|b| (b.key, b.value)),
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match &self.inner {
            IntoIterRepr::Compact(it) => it.size_hint(),
            IntoIterRepr::Fallback(it) => it.size_hint(),
        }
    }
}

impl<K, V> ExactSizeIterator for IntoIter<K, V> {}
impl<K, V> FusedIterator for IntoIter<K, V> {}

impl<K, V, S> IntoIterator for CompactHashMap<K, V, S> {
    type Item = (K, V);
    type IntoIter = IntoIter<K, V>;

    fn into_iter(self) -> IntoIter<K, V> {
        let inner = match self.repr {
            Repr::Unallocated(_) => IntoIterRepr::Compact(Vec::new().into_iter().zip(Vec::new())),
            Repr::Compact(table) => {
                let (keys, values) = table.into_parts();
                IntoIterRepr::Compact(keys.into_iter().zip(values))
            }
            Repr::Fallback(fallback) => IntoIterRepr::Fallback(fallback.into_entries().into_iter()),
        };
        IntoIter { inner }
    }
}

impl<'a, K, V, S> IntoIterator for &'a CompactHashMap<K, V, S> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Iter<'a, K, V> {
        self.iter()
    }
}

impl<'a, K, V, S> IntoIterator for &'a mut CompactHashMap<K, V, S> {
    type Item = (&'a K, &'a mut V);
    type IntoIter = IterMut<'a, K, V>;

    fn into_iter(self) -> IterMut<'a, K, V> {
        self.iter_mut()
    }
}
