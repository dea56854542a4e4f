//! Fail-fast cursors.
//!
//! A cursor is a position plus a snapshot of the collection's structural
//! version. It does not borrow the collection; each step takes it as an
//! argument, so the collection can be mutated between steps. Any structural
//! change that did not go through [`Cursor::remove`] makes the next step fail
//! with [`Error::ConcurrentModification`]. The check compares an
//! unsynchronized counter and is best-effort only.
//!
//! Removal through a cursor moves the last entry into the freed slot; the
//! cursor steps back one position so that entry is still visited.

use crate::compact_hash_map::CompactHashMap;
use crate::compact_hash_set::CompactHashSet;
use crate::error::Error;
use core::hash::{BuildHasher, Hash};

/// Cursor over the entries of a [`CompactHashMap`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Cursor {
    next: usize,
    last: Option<usize>,
    expected: u64,
}

impl Cursor {
    pub(crate) fn new(version: u64) -> Self {
        Self {
            next: 0,
            last: None,
            expected: version,
        }
    }

    fn check(&self, version: u64) -> Result<(), Error> {
        if self.expected == version {
            Ok(())
        } else {
            Err(Error::ConcurrentModification)
        }
    }

    /// True while entries remain ahead of the cursor.
    pub fn has_next<K, V, S>(&self, map: &CompactHashMap<K, V, S>) -> Result<bool, Error> {
        self.check(map.version())?;
        Ok(self.next < map.len())
    }

    /// Returns the entry under the cursor and advances past it.
    pub fn next<'m, K, V, S>(
        &mut self,
        map: &'m CompactHashMap<K, V, S>,
    ) -> Result<(&'m K, &'m V), Error> {
        self.check(map.version())?;
        let entry = map.entry_at(self.next).ok_or(Error::NoSuchElement)?;
        self.last = Some(self.next);
        self.next += 1;
        Ok(entry)
    }

    /// Removes the entry returned by the last call to [`next`](Self::next).
    pub fn remove<K, V, S>(&mut self, map: &mut CompactHashMap<K, V, S>) -> Result<(K, V), Error>
    where
        K: Eq + Hash,
        S: BuildHasher,
    {
        self.check(map.version())?;
        let index = self.last.ok_or(Error::IllegalCursorState)?;
        let removed = map.remove_index(index).ok_or(Error::NoSuchElement)?;
        self.last = None;
        self.expected = self.expected.wrapping_add(1);
        self.next -= 1;
        Ok(removed)
    }
}

/// Cursor over the elements of a [`CompactHashSet`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SetCursor {
    inner: Cursor,
}

impl SetCursor {
    pub(crate) fn new(version: u64) -> Self {
        Self {
            inner: Cursor::new(version),
        }
    }

    pub fn has_next<T, S>(&self, set: &CompactHashSet<T, S>) -> Result<bool, Error> {
        self.inner.has_next(set.as_map())
    }

    pub fn next<'s, T, S>(&mut self, set: &'s CompactHashSet<T, S>) -> Result<&'s T, Error> {
        self.inner.next(set.as_map()).map(|(t, _)| t)
    }

    pub fn remove<T, S>(&mut self, set: &mut CompactHashSet<T, S>) -> Result<T, Error>
    where
        T: Eq + Hash,
        S: BuildHasher,
    {
        self.inner.remove(set.as_map_mut()).map(|(t, _)| t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn walks_in_insertion_order() {
        let mut m = CompactHashMap::new();
        for (i, k) in ["a", "b", "c"].into_iter().enumerate() {
            m.insert(k, i);
        }
        let mut c = m.cursor();
        let mut seen = Vec::new();
        while c.has_next(&m).unwrap() {
            seen.push(c.next(&m).unwrap());
        }
        assert_eq!(seen, [(&"a", &0), (&"b", &1), (&"c", &2)]);
        assert_eq!(c.next(&m), Err(Error::NoSuchElement));
    }

    #[test]
    fn remove_revisits_the_moved_entry() {
        let mut m = CompactHashMap::new();
        for k in 0..6u32 {
            m.insert(k, ());
        }
        let mut c = m.cursor();
        let mut visited = Vec::new();
        while c.has_next(&m).unwrap() {
            let (&k, _) = c.next(&m).unwrap();
            visited.push(k);
            if k % 2 == 0 {
                assert_eq!(c.remove(&mut m), Ok((k, ())));
            }
        }
        visited.sort_unstable();
        assert_eq!(visited, (0..6).collect::<Vec<_>>());
        let mut left: Vec<u32> = m.keys().copied().collect();
        left.sort_unstable();
        assert_eq!(left, [1, 3, 5]);
    }

    #[test]
    fn remove_needs_a_fresh_next() {
        let mut m = CompactHashMap::new();
        m.insert(1, 1);
        m.insert(2, 2);
        let mut c = m.cursor();
        assert_eq!(c.remove(&mut m), Err(Error::IllegalCursorState));
        c.next(&m).unwrap();
        assert!(c.remove(&mut m).is_ok());
        assert_eq!(c.remove(&mut m), Err(Error::IllegalCursorState));
        assert_eq!(m.len(), 1);
    }

    #[test]
    fn foreign_mutation_is_detected() {
        let mut m = CompactHashMap::new();
        m.insert(1, 1);
        let mut c = m.cursor();
        c.next(&m).unwrap();
        m.insert(2, 2);
        assert_eq!(c.has_next(&m), Err(Error::ConcurrentModification));
        assert_eq!(c.next(&m), Err(Error::ConcurrentModification));
        assert_eq!(c.remove(&mut m), Err(Error::ConcurrentModification));
    }
}
