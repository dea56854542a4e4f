//! CompactHashSet: a set layered on `CompactHashMap<T, ()>`. The value array
//! is zero-sized, so a set costs one packed `u32` per element plus the
//! element itself and the bucket table.

use crate::compact_hash_map::{self, CompactHashMap};
use crate::cursor::SetCursor;
use crate::error::Error;
use core::borrow::Borrow;
use core::fmt;
use core::hash::{BuildHasher, Hash};
use core::iter::FusedIterator;
use std::collections::hash_map::RandomState;

/// A memory-compact hash set.
///
/// See [`CompactHashMap`] for the layout, ordering and hash-flooding
/// behaviour; a set shares all of it.
#[derive(Clone)]
pub struct CompactHashSet<T, S = RandomState> {
    map: CompactHashMap<T, (), S>,
}

impl<T> CompactHashSet<T> {
    pub fn new() -> Self {
        Self {
            map: CompactHashMap::new(),
        }
    }

    /// Creates a set that can hold `expected` elements before growing.
    /// Nothing is allocated until the first insert.
    pub fn with_expected_size(expected: usize) -> Self {
        Self {
            map: CompactHashMap::with_expected_size(expected),
        }
    }

    /// Like [`with_expected_size`](Self::with_expected_size) for a signed
    /// hint; negative hints are rejected.
    pub fn try_with_expected_size(expected: i64) -> Result<Self, Error> {
        Ok(Self {
            map: CompactHashMap::try_with_expected_size(expected)?,
        })
    }
}

impl<T> Default for CompactHashSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, S> CompactHashSet<T, S> {
    pub fn with_hasher(hasher: S) -> Self {
        Self {
            map: CompactHashMap::with_hasher(hasher),
        }
    }

    pub fn with_expected_size_and_hasher(expected: usize, hasher: S) -> Self {
        Self {
            map: CompactHashMap::with_expected_size_and_hasher(expected, hasher),
        }
    }

    pub fn hasher(&self) -> &S {
        self.map.hasher()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.map.capacity()
    }

    pub fn is_flood_resistant(&self) -> bool {
        self.map.is_flood_resistant()
    }

    pub fn clear(&mut self) {
        self.map.clear()
    }

    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            inner: self.map.keys(),
        }
    }

    /// Starts a fail-fast cursor at the first element.
    pub fn cursor(&self) -> SetCursor {
        SetCursor::new(self.map.version())
    }

    /// Copies the elements out in iteration order.
    pub fn to_vec(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.iter().cloned().collect()
    }

    pub(crate) fn as_map(&self) -> &CompactHashMap<T, (), S> {
        &self.map
    }

    pub(crate) fn as_map_mut(&mut self) -> &mut CompactHashMap<T, (), S> {
        &mut self.map
    }
}

impl<T, S> CompactHashSet<T, S>
where
    T: Eq + Hash,
    S: BuildHasher,
{
    pub fn contains<Q>(&self, value: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.map.contains_key(value)
    }

    /// The stored element equal to `value`.
    pub fn get<Q>(&self, value: &Q) -> Option<&T>
    where
        T: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.map.get_key_value(value).map(|(t, _)| t)
    }

    /// Adds `value`; returns false (and drops `value`) if an equal element
    /// is already present.
    ///
    /// # Panics
    ///
    /// Panics if the set already holds
    /// [`MAX_SIZE`](crate::capacity::MAX_SIZE) elements and `value` is new.
    pub fn insert(&mut self, value: T) -> bool {
        match self.try_insert(value) {
            Ok(inserted) => inserted,
            Err(e) => panic!("{e}"),
        }
    }

    pub fn try_insert(&mut self, value: T) -> Result<bool, Error> {
        Ok(self.map.try_insert(value, ())?.is_none())
    }

    pub fn remove<Q>(&mut self, value: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.map.remove(value).is_some()
    }

    /// Removes and returns the stored element equal to `value`.
    pub fn take<Q>(&mut self, value: &Q) -> Option<T>
    where
        T: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.map.remove_entry(value).map(|(t, _)| t)
    }

    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(&T) -> bool,
    {
        self.map.retain(|t, _| keep(t))
    }

    pub fn shrink_to_fit(&mut self) {
        self.map.shrink_to_fit()
    }

    #[cfg(test)]
    pub(crate) fn assert_consistent(&self) {
        self.map.assert_consistent()
    }
}

impl<T, S> fmt::Debug for CompactHashSet<T, S>
where
    T: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl<T, S> PartialEq for CompactHashSet<T, S>
where
    T: Eq + Hash,
    S: BuildHasher,
{
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|t| other.contains(t))
    }
}

impl<T, S> Eq for CompactHashSet<T, S>
where
    T: Eq + Hash,
    S: BuildHasher,
{
}

impl<T, S> FromIterator<T> for CompactHashSet<T, S>
where
    T: Eq + Hash,
    S: BuildHasher + Default,
{
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let iter = iter.into_iter();
        let mut set = Self::with_expected_size_and_hasher(iter.size_hint().0, S::default());
        set.extend(iter);
        set
    }
}

impl<T, S> Extend<T> for CompactHashSet<T, S>
where
    T: Eq + Hash,
    S: BuildHasher,
{
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for t in iter {
            self.insert(t);
        }
    }
}

impl<'a, T, S> Extend<&'a T> for CompactHashSet<T, S>
where
    T: Eq + Hash + Copy,
    S: BuildHasher,
{
    fn extend<I: IntoIterator<Item = &'a T>>(&mut self, iter: I) {
        for &t in iter {
            self.insert(t);
        }
    }
}

/// Iterator over the elements of a set.
pub struct Iter<'a, T> {
    inner: compact_hash_map::Keys<'a, T, ()>,
}

impl<T> Clone for Iter<'_, T> {
    fn clone(&self) -> Self {
        Iter {
            inner: self.inner.clone(),
        }
    }
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    #[inline]
    fn next(&mut self) -> Option<&'a T> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<T> ExactSizeIterator for Iter<'_, T> {}
impl<T> FusedIterator for Iter<'_, T> {}

/// Owning iterator over the elements of a set.
pub struct IntoIter<T> {
    inner: compact_hash_map::IntoIter<T, ()>,
}

impl<T> Iterator for IntoIter<T> {
    type Item = T;

    #[inline]
    fn next(&mut self) -> Option<T> {
        self.inner.next().map(|(t, _)| t)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<T> ExactSizeIterator for IntoIter<T> {}
impl<T> FusedIterator for IntoIter<T> {}

impl<T, S> IntoIterator for CompactHashSet<T, S> {
    type Item = T;
    type IntoIter = IntoIter<T>;

    fn into_iter(self) -> IntoIter<T> {
        IntoIter {
            inner: self.map.into_iter(),
        }
    }
}

impl<'a, T, S> IntoIterator for &'a CompactHashSet<T, S> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Iter<'a, T> {
        self.iter()
    }
}
