//! Hash spreading, bucket indexing and table sizing.

/// Table length used when the first insert allocates without a requested size.
pub const DEFAULT_INITIAL_CAPACITY: usize = 1 << 4;

/// Largest table length. Growth saturates here instead of failing.
pub const MAXIMUM_CAPACITY: usize = 1 << 30;

pub const DEFAULT_LOAD_FACTOR: f32 = 0.75;

/// Chain length at which a bucket is considered for conversion to a tree bin.
pub const TREEIFY_THRESHOLD: usize = 8;

/// Split partitions at or below this many nodes go back to plain chains.
pub const UNTREEIFY_THRESHOLD: usize = 6;

/// Smallest table that may hold tree bins; smaller tables grow instead.
pub const MIN_TREEIFY_CAPACITY: usize = 64;

/// Folds a 64-bit hasher output into the 32-bit raw hash stored per entry.
#[inline]
pub fn fold(h: u64) -> u32 {
    (h ^ (h >> 32)) as u32
}

/// XORs the upper half of `h` into the lower half so that hash sets which only
/// differ in high bits do not collide once masked to a small table.
#[inline]
pub fn spread(h: u32) -> u32 {
    h ^ (h >> 16)
}

/// Bucket index of `hash` in a table of `capacity` slots (a power of two).
#[inline]
pub fn index_for(hash: u32, capacity: usize) -> usize {
    debug_assert!(capacity.is_power_of_two());
    (hash as usize) & (capacity - 1)
}

/// Smallest power of two at least `n` (and at least 1), clamped to
/// `MAXIMUM_CAPACITY`.
pub fn table_size_for(n: usize) -> usize {
    n.max(1)
        .checked_next_power_of_two()
        .map_or(MAXIMUM_CAPACITY, |p| p.min(MAXIMUM_CAPACITY))
}

/// Resize threshold for a table of `capacity` slots.
pub(crate) fn threshold_for(capacity: usize, load_factor: f32) -> usize {
    let ft = capacity as f32 * load_factor;
    if capacity < MAXIMUM_CAPACITY && ft < MAXIMUM_CAPACITY as f32 {
        ft as usize
    } else {
        usize::MAX
    }
}
