//! hybrid-hashmap: a single-owner hash map whose overfull buckets turn
//! into red-black trees, keeping worst-case lookups logarithmic when many
//! keys collide.
//!
//! ```
//! use hybrid_hashmap::HybridHashMap;
//!
//! let mut m = HybridHashMap::new();
//! m.insert("a", 1);
//! *m.merge("a", 10, |old, new| Some(old + new)).unwrap() += 1;
//! assert_eq!(m.get("a"), Some(&12));
//! ```
//!
//! Internal Design:
//!
//! Summary
//! - Buckets are a power-of-two `Vec<Bin>`; a key's bucket is its spread
//!   32-bit hash masked by `capacity - 1`.
//! - Each bin is empty, a singly linked chain, or a tree bin: a red-black
//!   tree ordered by hash whose nodes also keep a doubly linked list in
//!   insertion order.
//! - Every entry lives in one `slotmap` arena. Links between entries are
//!   generational `NodeKey`s, so turning a chain into a tree, back again,
//!   or moving it on resize never moves an entry. `Handle`s therefore stay
//!   valid until their entry is removed.
//!
//! Layers
//! - `hashing`: hash folding and spreading, indexing, table sizing and the
//!   tuning constants.
//! - `rbtree`: rotations and insert/delete rebalancing over node links,
//!   plus an invariant checker used by debug assertions and tests.
//! - `tree_bin`: one tree bin: find, put, remove, treeify, untreeify and
//!   the lo/hi split used on resize.
//! - `raw_table`: the bucket array, lazy allocation, growth and the chain
//!   to tree transitions. Works on precomputed hashes only.
//! - `HybridHashMap`: public API. Hashes keys once per call, owns the
//!   hasher and the key order, and guards each entry point.
//!
//! Chains and trees
//! - A chain that reaches 8 nodes becomes a tree bin, unless the table has
//!   fewer than 64 buckets; then the table doubles instead.
//! - A tree bin with 6 or fewer nodes after a resize split becomes a
//!   chain again. Removal turns a bin back into a chain when the tree is
//!   too shallow to be worth keeping.
//! - `insert` appends new chain nodes at the tail. `compute_if_absent`,
//!   `compute` and `merge` put them at the head, grow before looking up
//!   and never grow afterwards. Both behaviours are kept deliberately.
//!
//! Ordering equal hashes
//! - Inside a tree bin, keys with the same hash are ordered by the map's
//!   `KeyOrder` (`Unordered` by default, `Natural` for `Ord` keys, or any
//!   `OrderFn`). When the order cannot decide, lookups search both
//!   subtrees and inserts fall back to a tie-break on arena identity.
//!
//! Reentrancy policy
//! - Public methods enter a debug-only `DebugReentrancy` guard. User code
//!   (`Hash`, `Eq`, `KeyOrder`, closures passed to `compute` and friends)
//!   runs while it is held, so calling back into the same map panics in
//!   debug builds instead of observing a half-rebalanced tree.
//!
//! Notes and non-goals
//! - Single owner: `Send` when `K`, `V`, `S` and `O` are, never `Sync`.
//! - No iteration order across buckets is promised.
//! - Borrowing iterators cannot see concurrent modification; the detached
//!   `Cursor` detects it through the map's modification count.

pub mod error;
pub mod hashing;
mod hybrid_hash_map;
mod hybrid_hash_map_proptest;
pub mod iter;
mod node;
pub mod order;
mod raw_table;
mod rbtree;
mod reentrancy;
mod tree_bin;

// Public surface
pub use error::Error;
pub use hybrid_hash_map::{Handle, HybridHashMap};
pub use iter::Cursor;
pub use order::{KeyOrder, Natural, OrderFn, Unordered};
