// CompactHashSet integration suite.
//
// Each test documents what behavior is being verified. The core invariants
// exercised:
// - Membership: contains(x) iff x was added after its last removal.
// - Size: len() equals the number of members.
// - Order: without removals iteration follows insertion order.
// - Removal: removing one element never disturbs the others.
// - Fail-fast: a cursor reports structural changes made around it.
use compact_hash::{CompactHashSet, Error};

// Test: three inserts keep insertion order.
// Verifies: len and iteration order after distinct adds.
#[test]
fn add_three_iterates_in_insertion_order() {
    let mut s = CompactHashSet::new();
    assert!(s.insert("a"));
    assert!(s.insert("b"));
    assert!(s.insert("c"));
    assert_eq!(s.len(), 3);
    assert_eq!(s.iter().copied().collect::<Vec<_>>(), ["a", "b", "c"]);
    assert_eq!(s.to_vec(), ["a", "b", "c"]);
}

// Test: remove from the middle, then re-add.
// Verifies: the removed element disappears, the others stay, and re-adding
// restores membership (order afterwards is unspecified).
#[test]
fn remove_then_readd_middle_element() {
    let mut s = CompactHashSet::new();
    for x in ["a", "b", "c"] {
        s.insert(x);
    }

    assert!(s.remove("b"));
    assert_eq!(s.len(), 2);
    assert!(!s.contains("b"));
    assert!(s.contains("a"));
    assert!(s.contains("c"));
    assert!(!s.remove("b"));

    assert!(s.insert("b"));
    assert_eq!(s.len(), 3);
    assert!(s.contains("b"));
    let mut all = s.to_vec();
    all.sort_unstable();
    assert_eq!(all, ["a", "b", "c"]);
}

// Test: expected-size hint with a thousand integers.
#[test]
fn thousand_integers_with_expected_size() {
    let mut s = CompactHashSet::with_expected_size(1000);
    for i in 0..1000 {
        assert!(s.insert(i));
    }
    assert_eq!(s.len(), 1000);
    assert!(s.contains(&500));
    assert!(!s.contains(&1000));
    // The hint covered every insert.
    assert_eq!(s.capacity(), 1000);
}

// Test: negative expected size.
#[test]
fn negative_expected_size_is_invalid() {
    match CompactHashSet::<u32>::try_with_expected_size(-1) {
        Err(Error::InvalidExpectedSize(-1)) => {}
        other => panic!("unexpected result: {:?}", other),
    }
    assert!(CompactHashSet::<u32>::try_with_expected_size(0).is_ok());
}

// Test: a cursor taken before an insert.
// Verifies: the next step reports concurrent modification, on either call.
#[test]
fn cursor_detects_insert_made_after_creation() {
    let mut s = CompactHashSet::new();
    s.insert(1);
    s.insert(2);

    let c = s.cursor();
    s.insert(3);
    assert_eq!(c.has_next(&s), Err(Error::ConcurrentModification));

    let mut c = s.cursor();
    assert_eq!(c.next(&s), Ok(&1));
    s.insert(4);
    assert_eq!(c.next(&s), Err(Error::ConcurrentModification));

    let mut c = s.cursor();
    s.remove(&4);
    assert_eq!(c.next(&s), Err(Error::ConcurrentModification));

    let c = s.cursor();
    s.clear();
    assert_eq!(c.has_next(&s), Err(Error::ConcurrentModification));
}

// Test: failed mutations do not invalidate cursors.
// Verifies: duplicate adds and removals of absent elements leave the version alone.
#[test]
fn noop_mutations_keep_cursor_valid() {
    let mut s = CompactHashSet::new();
    s.insert("x");
    let mut c = s.cursor();
    assert!(!s.insert("x"));
    assert!(!s.remove("y"));
    s.retain(|_| true);
    assert_eq!(c.next(&s), Ok(&"x"));
    assert_eq!(c.has_next(&s), Ok(false));
    assert_eq!(c.next(&s), Err(Error::NoSuchElement));
}

// Test: cursor-driven removal of every element.
#[test]
fn cursor_can_drain_the_set() {
    let mut s: CompactHashSet<u32> = (0..100).collect();
    let mut c = s.cursor();
    let mut removed = Vec::new();
    while c.has_next(&s).unwrap() {
        c.next(&s).unwrap();
        removed.push(c.remove(&mut s).unwrap());
    }
    assert!(s.is_empty());
    // Each removal pulls the last element forward, so the cursor stays at 0
    // and the walk goes front, back, back-1, ...
    let mut expected = vec![0];
    expected.extend((1..100).rev());
    assert_eq!(removed, expected);
}

// Test: removing every other element while walking.
#[test]
fn cursor_removal_preserves_the_rest() {
    let mut s: CompactHashSet<u32> = (0..50).collect();
    let mut c = s.cursor();
    let mut visits = 0;
    while c.has_next(&s).unwrap() {
        let x = *c.next(&s).unwrap();
        visits += 1;
        if x % 2 == 1 {
            assert_eq!(c.remove(&mut s), Ok(x));
            assert_eq!(c.remove(&mut s), Err(Error::IllegalCursorState));
        }
    }
    assert_eq!(visits, 50);
    assert_eq!(s.len(), 25);
    for x in 0..50 {
        assert_eq!(s.contains(&x), x % 2 == 0);
    }
}

// Test: growth across many resizes keeps membership.
// Verifies: resize transparency and insertion order with no removals.
#[test]
fn growth_is_transparent() {
    let mut small = CompactHashSet::with_expected_size(0);
    let mut sized = CompactHashSet::with_expected_size(10_000);
    for i in 0..10_000u64 {
        let x = i.wrapping_mul(0x9e37_79b9_7f4a_7c15);
        assert!(small.insert(x));
        assert!(sized.insert(x));
    }
    assert_eq!(small.len(), 10_000);
    assert_eq!(small, sized);
    assert!(small.iter().eq(sized.iter()));
    for i in 0..10_000u64 {
        assert!(small.contains(&i.wrapping_mul(0x9e37_79b9_7f4a_7c15)));
    }
}

// Test: removal preserves every other element, across many removals.
#[test]
fn removal_preserves_others() {
    let mut s: CompactHashSet<u32> = (0..2000).collect();
    for x in (0..2000).step_by(7) {
        let before = s.len();
        assert!(s.remove(&x));
        assert!(!s.contains(&x));
        assert_eq!(s.len(), before - 1);
    }
    for x in 0..2000 {
        assert_eq!(s.contains(&x), x % 7 != 0);
    }
}

// Test: shrink_to_fit releases unused slots without changing membership.
#[test]
fn shrink_to_fit_trims_storage() {
    let mut s: CompactHashSet<u32> = (0..1000).collect();
    s.retain(|x| x % 4 == 0);
    assert_eq!(s.len(), 250);
    assert!(s.capacity() >= 1000);
    s.shrink_to_fit();
    assert_eq!(s.capacity(), 250);
    for x in 0..1000 {
        assert_eq!(s.contains(&x), x % 4 == 0);
    }
    // Still usable after trimming.
    assert!(s.insert(1001));
    assert!(s.contains(&1001));
}

// Test: clear empties but keeps the set usable.
#[test]
fn clear_then_reuse() {
    let mut s: CompactHashSet<String> = ["a", "b"].iter().map(|s| s.to_string()).collect();
    s.clear();
    assert!(s.is_empty());
    assert!(!s.contains("a"));
    assert!(s.insert("c".to_string()));
    assert_eq!(s.to_vec(), ["c".to_string()]);
}

// Test: owned and borrowed iteration, extend from references.
#[test]
fn into_iter_and_extend() {
    let mut s: CompactHashSet<u8> = CompactHashSet::new();
    s.extend(&[3u8, 1, 3, 2]);
    assert_eq!(s.len(), 3);
    let borrowed: Vec<u8> = (&s).into_iter().copied().collect();
    assert_eq!(borrowed, [3, 1, 2]);
    let owned: Vec<u8> = s.into_iter().collect();
    assert_eq!(owned, [3, 1, 2]);
}

// Test: a set that never saw an insert allocates nothing.
#[test]
fn empty_set_is_unallocated() {
    let s: CompactHashSet<String> = CompactHashSet::with_expected_size(1 << 20);
    assert_eq!(s.capacity(), 0);
    assert!(s.is_empty());
    assert_eq!(s.iter().next(), None);
    assert_eq!(s.cursor().has_next(&s), Ok(false));
}
