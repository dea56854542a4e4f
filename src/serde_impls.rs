//! Element-by-element serde support.
//!
//! A set is written as a sequence and a map as a map, both in iteration
//! order. Reading rebuilds the table from scratch by inserting every element
//! into a fresh collection, so the encoding carries no internal layout.

use serde::de::{MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use std::fmt::{self, Formatter};
use std::hash::{BuildHasher, Hash};
use std::marker::PhantomData;
use std::mem;

use crate::{CompactHashMap, CompactHashSet};

const MAX_PREALLOC_BYTES: usize = 1024 * 1024;

/// Caps a length hint read from the input so a lying encoding cannot make
/// the first insert reserve more than about a megabyte of elements; growth
/// takes over from there.
fn cautious<T>(hint: Option<usize>) -> usize {
    let per_element = mem::size_of::<T>().max(1);
    hint.unwrap_or(0).min(MAX_PREALLOC_BYTES / per_element)
}

impl<K, V, S> Serialize for CompactHashMap<K, V, S>
where
    K: Serialize,
    V: Serialize,
{
    fn serialize<Sr>(&self, serializer: Sr) -> Result<Sr::Ok, Sr::Error>
    where
        Sr: Serializer,
    {
        serializer.collect_map(self)
    }
}

impl<'de, K, V, S> Deserialize<'de> for CompactHashMap<K, V, S>
where
    K: Deserialize<'de> + Hash + Eq,
    V: Deserialize<'de>,
    S: Default + BuildHasher,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(MapVisitor {
            _marker: PhantomData,
        })
    }
}

struct MapVisitor<K, V, S> {
    _marker: PhantomData<CompactHashMap<K, V, S>>,
}

impl<'de, K, V, S> Visitor<'de> for MapVisitor<K, V, S>
where
    K: Deserialize<'de> + Hash + Eq,
    V: Deserialize<'de>,
    S: Default + BuildHasher,
{
    type Value = CompactHashMap<K, V, S>;

    fn expecting(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "a map")
    }

    fn visit_map<M>(self, mut access: M) -> Result<Self::Value, M::Error>
    where
        M: MapAccess<'de>,
    {
        let mut values = CompactHashMap::with_expected_size_and_hasher(
            cautious::<(K, V)>(access.size_hint()),
            S::default(),
        );
        while let Some((key, value)) = access.next_entry()? {
            values.try_insert(key, value).map_err(serde::de::Error::custom)?;
        }
        Ok(values)
    }
}

impl<T, S> Serialize for CompactHashSet<T, S>
where
    T: Serialize,
{
    fn serialize<Sr>(&self, serializer: Sr) -> Result<Sr::Ok, Sr::Error>
    where
        Sr: Serializer,
    {
        serializer.collect_seq(self)
    }
}

impl<'de, T, S> Deserialize<'de> for CompactHashSet<T, S>
where
    T: Deserialize<'de> + Hash + Eq,
    S: Default + BuildHasher,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_seq(SetVisitor {
            _marker: PhantomData,
        })
    }
}

struct SetVisitor<T, S> {
    _marker: PhantomData<CompactHashSet<T, S>>,
}

impl<'de, T, S> Visitor<'de> for SetVisitor<T, S>
where
    T: Deserialize<'de> + Hash + Eq,
    S: Default + BuildHasher,
{
    type Value = CompactHashSet<T, S>;

    fn expecting(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "a set")
    }

    fn visit_seq<A>(self, mut access: A) -> Result<Self::Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut values = CompactHashSet::with_expected_size_and_hasher(
            cautious::<T>(access.size_hint()),
            S::default(),
        );
        while let Some(value) = access.next_element()? {
            values.try_insert(value).map_err(serde::de::Error::custom)?;
        }
        Ok(values)
    }
}
