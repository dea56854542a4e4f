#![cfg(test)]

// Property tests for CompactHashMap kept inside the crate so they can check
// the internal table invariants after every step.

use crate::compact_hash_map::CompactHashMap;
use crate::error::Error;
use proptest::prelude::*;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::hash::{BuildHasher, Hasher};

// Key newtype with Borrow<str> to exercise borrowed lookup.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
struct Key(String);
impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
impl std::borrow::Borrow<str> for Key {
    fn borrow(&self) -> &str {
        &self.0
    }
}

// Pool-indexed operations to improve shrinking: indices shrink to earlier keys,
// pool length shrinks, and op lists shrink in length.
#[derive(Clone, Debug)]
enum OpI {
    Insert(usize, i32),
    Remove(usize),
    Get(usize),
    Contains(String),
    Mutate(usize, i32),
    CursorRemoveEvery(usize),
    Retain(usize),
    Iterate,
    Shrink,
    Clear,
}

fn key_from(pool: &[String], i: usize) -> Key {
    Key(pool[i].clone())
}

fn arb_scenario() -> impl Strategy<Value = (Vec<String>, Vec<OpI>)> {
    proptest::collection::vec("[a-z]{0,5}", 1..=24).prop_flat_map(|pool| {
        let idxs: Vec<usize> = (0..pool.len()).collect();
        let idx = proptest::sample::select(idxs);
        let contains_pool = proptest::sample::select(pool.clone());
        let op = prop_oneof![
            6 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| OpI::Insert(i, v)),
            3 => idx.clone().prop_map(OpI::Remove),
            2 => idx.clone().prop_map(OpI::Get),
            1 => prop_oneof![
                contains_pool.prop_map(|s: String| s),
                "[a-z]{0,5}".prop_map(|s| s)
            ]
            .prop_map(OpI::Contains),
            1 => (idx.clone(), any::<i32>()).prop_map(|(i, d)| OpI::Mutate(i, d)),
            1 => (2usize..5).prop_map(OpI::CursorRemoveEvery),
            1 => (2usize..5).prop_map(OpI::Retain),
            1 => Just(OpI::Iterate),
            1 => Just(OpI::Shrink),
            1 => Just(OpI::Clear),
        ];
        proptest::collection::vec(op, 1..80).prop_map(move |ops| (pool.clone(), ops))
    })
}

fn run<S: BuildHasher>(
    mut sut: CompactHashMap<Key, i32, S>,
    pool: Vec<String>,
    ops: Vec<OpI>,
) -> Result<(), TestCaseError> {
    let mut model: HashMap<Key, i32> = HashMap::new();
    // Insertion order is observable until the first removal.
    let mut order: Option<Vec<Key>> = Some(Vec::new());

    for op in ops {
        match op {
            OpI::Insert(i, v) => {
                let k = key_from(&pool, i);
                let prev = sut.insert(k.clone(), v);
                let mprev = model.insert(k.clone(), v);
                prop_assert_eq!(prev, mprev);
                if mprev.is_none() {
                    if let Some(order) = order.as_mut() {
                        order.push(k);
                    }
                }
            }
            OpI::Remove(i) => {
                let k = key_from(&pool, i);
                let removed = sut.remove_entry(&k);
                let mremoved = model.remove(&k);
                prop_assert_eq!(removed.map(|(_, v)| v), mremoved);
                if mremoved.is_some() {
                    order = None;
                }
            }
            OpI::Get(i) => {
                let k = key_from(&pool, i);
                prop_assert_eq!(sut.get(&k), model.get(&k));
            }
            OpI::Contains(s) => {
                let has = sut.contains_key(s.as_str());
                let has_model = model.keys().any(|k| k.0 == s);
                prop_assert_eq!(has, has_model);
            }
            OpI::Mutate(i, d) => {
                let k = key_from(&pool, i);
                if let Some(v) = sut.get_mut(&k) {
                    *v = v.wrapping_add(d);
                }
                if let Some(v) = model.get_mut(&k) {
                    *v = v.wrapping_add(d);
                }
            }
            OpI::CursorRemoveEvery(n) => {
                let mut cursor = sut.cursor();
                let mut step = 0;
                while cursor.has_next(&sut).map_err(|e| TestCaseError::fail(e.to_string()))? {
                    let (k, _) = cursor.next(&sut).map_err(|e| TestCaseError::fail(e.to_string()))?;
                    let k = k.clone();
                    if step % n == 0 {
                        let (rk, _) = cursor
                            .remove(&mut sut)
                            .map_err(|e| TestCaseError::fail(e.to_string()))?;
                        prop_assert_eq!(&rk, &k);
                        model.remove(&k);
                        order = None;
                    }
                    step += 1;
                }
                prop_assert_eq!(cursor.next(&sut).err(), Some(Error::NoSuchElement));
            }
            OpI::Retain(n) => {
                sut.retain(|k, _| k.0.len() % n != 0);
                let before = model.len();
                model.retain(|k, _| k.0.len() % n != 0);
                if model.len() != before {
                    order = None;
                }
            }
            OpI::Iterate => {
                let s_keys: BTreeSet<_> = sut.keys().cloned().collect();
                let m_keys: BTreeSet<_> = model.keys().cloned().collect();
                prop_assert_eq!(s_keys, m_keys);
                prop_assert_eq!(sut.iter().len(), model.len());
            }
            OpI::Shrink => {
                sut.shrink_to_fit();
                prop_assert!(sut.capacity() <= model.len().max(1) || sut.is_flood_resistant());
            }
            OpI::Clear => {
                sut.clear();
                model.clear();
                order = Some(Vec::new());
            }
        }

        // Post-conditions after each op
        sut.assert_consistent();
        prop_assert_eq!(sut.len(), model.len());
        prop_assert_eq!(sut.is_empty(), model.is_empty());
        if let Some(order) = &order {
            let seen: Vec<Key> = sut.keys().cloned().collect();
            prop_assert_eq!(&seen, order);
        }
    }
    Ok(())
}

// Property: State-machine equivalence against std::collections::HashMap.
// Invariants exercised across random operation sequences:
// - insert/get/remove parity with the model, including replaced values.
// - Cursor removal visits every entry once and removes exactly the chosen ones.
// - Internal chains stay consistent after every step (resize, swap-remove,
//   shrink).
// - Iteration order equals insertion order until the first removal.
proptest! {
    #![proptest_config(ProptestConfig { cases: 128, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine((pool, ops) in arb_scenario()) {
        run(CompactHashMap::with_expected_size(1), pool, ops)?;
    }
}

// Collision variant using a constant hasher: every key lands in one chain,
// so any scenario with ten or more distinct keys crosses into the fallback.
#[derive(Clone, Default)]
struct ConstBuildHasher;
struct ConstHasher;
impl BuildHasher for ConstBuildHasher {
    type Hasher = ConstHasher;
    fn build_hasher(&self) -> Self::Hasher {
        ConstHasher
    }
}
impl Hasher for ConstHasher {
    fn write(&mut self, _bytes: &[u8]) {}
    fn finish(&self) -> u64 {
        0
    }
}

// Property: Same state-machine invariants as above, under worst-case
// collision behavior (constant hasher), across the switch to the fallback.
proptest! {
    #![proptest_config(ProptestConfig { cases: 128, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine_with_collisions((pool, ops) in arb_scenario()) {
        run(CompactHashMap::with_hasher(ConstBuildHasher), pool, ops)?;
    }
}
