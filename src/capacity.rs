//! Capacity and metadata encoding shared by the compact table.
//!
//! Everything here is a pure function or a plain `Copy` value: table sizing,
//! the growth policies for the two array families, the packed entry layout
//! and the metadata register that carries the bucket-table width together
//! with the structural version.

/// Marker stored in a bucket head or a next pointer for "no entry".
pub const UNSET: u32 = 0;

/// Largest number of live entries a compact collection may hold.
pub const MAX_SIZE: usize = (1 << 30) - 1;

/// Largest bucket table, in buckets.
pub const MAX_TABLE_SIZE: usize = 1 << 30;

/// Expected size used by `new()`.
pub const DEFAULT_SIZE: usize = 3;

/// Smallest bucket table ever allocated.
pub const MIN_TABLE_SIZE: usize = 4;

/// Chain length at which an insert gives up on the compact layout and moves
/// the collection to the flood-resistant fallback.
pub const MAX_BUCKET_CHAIN_LENGTH: usize = 9;

const TABLE_BITS_WIDTH: u32 = 5;
const TABLE_BITS_MASK: u64 = (1 << TABLE_BITS_WIDTH) - 1;
const VERSION_INCREMENT: u64 = 1 << TABLE_BITS_WIDTH;

/// Bucket count for a table expected to hold `expected` entries.
///
/// Next pointers are stored as `index + 1` below the mask, so the mask must be
/// at least `expected`: the load factor against bucket count is 1.0 with one
/// bucket held in reserve.
pub fn table_size(expected: usize) -> usize {
    let wanted = expected.min(MAX_SIZE) + 1;
    wanted.next_power_of_two().clamp(MIN_TABLE_SIZE, MAX_TABLE_SIZE)
}

/// Bucket count after outgrowing a table with the given mask.
pub fn grow_table(mask: u32) -> usize {
    let factor = if mask < 32 { 4 } else { 2 };
    (factor * (mask as usize + 1)).min(MAX_TABLE_SIZE)
}

/// Entry-array capacity after outgrowing `capacity` slots: about 1.5x,
/// rounded up to an odd count and capped at [`MAX_SIZE`].
pub fn grow_entries(capacity: usize) -> usize {
    let grown = (capacity + (capacity >> 1).max(1)) | 1;
    grown.min(MAX_SIZE)
}

/// Folds a 64-bit hasher output to 32 bits and mixes it so that hashers with
/// weak low bits still spread across buckets.
#[inline]
pub fn smear(hash: u64) -> u32 {
    const C1: u32 = 0xcc9e_2d51;
    const C2: u32 = 0x1b87_3593;
    let folded = (hash ^ (hash >> 32)) as u32;
    C2.wrapping_mul(folded.wrapping_mul(C1).rotate_left(15))
}

/// Hash bits above the mask, as stored in the high part of an entry.
#[inline]
pub fn hash_prefix(value: u32, mask: u32) -> u32 {
    value & !mask
}

/// Next pointer stored in the low part of an entry.
#[inline]
pub fn next_of(entry: u32, mask: u32) -> u32 {
    entry & mask
}

/// Packs the bits of `prefix` above the mask with the bits of `next` below it.
#[inline]
pub fn mask_combine(prefix: u32, next: u32, mask: u32) -> u32 {
    (prefix & !mask) | (next & mask)
}

/// Bucket-table width and structural version packed into one register.
///
/// The low five bits hold log2 of the bucket count; every structural change
/// adds one to the bits above them. The version is a plain unsynchronized
/// counter, so it only ever gives best-effort detection of foreign
/// mutation while a [`Cursor`](crate::Cursor) is live.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Metadata(u64);

impl Metadata {
    /// Register for a table of `1 << table_bits` buckets at `version`.
    pub fn pack(table_bits: u32, version: u64) -> Self {
        debug_assert!(u64::from(table_bits) <= TABLE_BITS_MASK);
        Metadata((version << TABLE_BITS_WIDTH) | (u64::from(table_bits) & TABLE_BITS_MASK))
    }

    pub fn table_bits(self) -> u32 {
        (self.0 & TABLE_BITS_MASK) as u32
    }

    /// `bucket count - 1`, or 0 before any table was recorded.
    pub fn mask(self) -> u32 {
        match self.table_bits() {
            0 => 0,
            bits => ((1u64 << bits) - 1) as u32,
        }
    }

    pub fn version(self) -> u64 {
        self.0 >> TABLE_BITS_WIDTH
    }

    /// Records a new bucket table; `mask + 1` must be a power of two.
    pub fn set_mask(&mut self, mask: u32) {
        let bits = 32 - mask.leading_zeros();
        debug_assert_eq!(u64::from(mask) + 1, 1u64 << bits);
        self.0 = (self.0 & !TABLE_BITS_MASK) | u64::from(bits);
    }

    /// Marks a structural change.
    pub fn bump(&mut self) {
        self.0 = self.0.wrapping_add(VERSION_INCREMENT);
    }
}
