//! compact-hash: a hash set and map that keep their entries in a handful of
//! flat arrays, trading a little CPU for far less per-element overhead than
//! a node-per-entry table.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: expected O(1) `contains`/`insert`/`remove` with roughly one `u32`
//!   of bookkeeping per element on top of the element itself.
//! - Layers:
//!   - `capacity`: pure sizing and bit-packing helpers plus the metadata
//!     register (bucket-table width + structural version).
//!   - `CompactTable<K, V>`: the bucket table, packed entries and parallel
//!     key/value arrays. Owns the insert/remove/resize algorithms and never
//!     calls the hasher itself.
//!   - `FallbackMap<K, V>`: flood-resistant representation; a randomly
//!     keyed `hashbrown::HashTable` over a dense entry vector.
//!   - `CompactHashMap<K, V, S>`: public map; hashes keys, dispatches on the
//!     active representation and maintains the version.
//!   - `CompactHashSet<T, S>`: public set over `CompactHashMap<T, ()>`.
//!   - `Cursor`/`SetCursor`: fail-fast positional cursors.
//!
//! Constraints
//! - Single-threaded: no internal locking; the version counter is plain data.
//! - Live entries always occupy the prefix `[0, len)` of the arrays;
//!   removal moves the last entry into the hole.
//! - Exactly one of {compact arrays, fallback} is active. The switch to the
//!   fallback happens when an insert walks a chain of
//!   [`capacity::MAX_BUCKET_CHAIN_LENGTH`] entries and is never undone.
//! - Nothing is allocated until the first insert.
//!
//! Entry layout
//! - A bucket head or next pointer holds `1 + index`; 0 means empty.
//! - An entry packs the hash bits above the table mask (the prefix) with
//!   the next pointer below it. The bits under the mask are the bucket
//!   index, so a resize recovers every full hash without calling the hasher.
//! - The bucket table is `u8`, `u16` or `u32` wide, whichever addresses it.
//!
//! Ordering
//! - Until the first removal iteration order is insertion order, in both
//!   representations. After a removal it is unspecified.
//!
//! Notes and non-goals
//! - `Iter`/`IterMut` borrow the collection and need no version checks. The
//!   cursors exist for walk-and-remove loops and are the only place
//!   concurrent modification is reported.
//! - Serialization (feature `serde`) is element by element; no internal
//!   layout is persisted.

pub mod capacity;
pub mod compact_hash_map;
mod compact_hash_map_proptest;
pub mod compact_hash_set;
mod compact_table;
mod cursor;
mod error;
mod fallback;
#[cfg(feature = "serde")]
mod serde_impls;

// Public surface
pub use compact_hash_map::CompactHashMap;
pub use compact_hash_set::CompactHashSet;
pub use cursor::{Cursor, SetCursor};
pub use error::Error;
