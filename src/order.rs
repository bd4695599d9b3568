//! Key ordering used to place and find equal-hash keys inside tree bins.
//!
//! A tree bin is ordered by hash first. When two distinct keys share a hash the
//! map asks its `KeyOrder` to pick a side; if the order cannot tell them apart
//! the lookup falls back to searching both subtrees, and insertion falls back
//! to an identity tie-break. Any order works as long as it is consistent with
//! `Eq` (equal keys compare `Equal`).

use crate::node::NodeKey;
use core::cmp::Ordering;
use core::fmt;

/// Comparator injection point for tree bins.
///
/// `Q` is the form the key is looked up by (`K` itself, or a type `K`
/// borrows as). Implementations for a borrowed form must agree with the
/// implementation for `K`, the same contract `Borrow` places on `Ord`.
pub trait KeyOrder<Q: ?Sized> {
    /// Orders `a` relative to `b`, or `None` when the pair is not comparable.
    fn compare(&self, a: &Q, b: &Q) -> Option<Ordering>;
}

/// No ordering: equal-hash keys are told apart by searching.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Unordered;

impl<Q: ?Sized> KeyOrder<Q> for Unordered {
    #[inline]
    fn compare(&self, _a: &Q, _b: &Q) -> Option<Ordering> {
        None
    }
}

/// Orders keys by their `Ord` implementation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Natural;

impl<Q: ?Sized + Ord> KeyOrder<Q> for Natural {
    #[inline]
    fn compare(&self, a: &Q, b: &Q) -> Option<Ordering> {
        Some(a.cmp(b))
    }
}

/// Orders keys with a plain function over the stored key type. Lookups must
/// then be made with `&K`.
pub struct OrderFn<K: ?Sized>(pub fn(&K, &K) -> Ordering);

impl<K: ?Sized> Clone for OrderFn<K> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K: ?Sized> Copy for OrderFn<K> {}

impl<K: ?Sized> fmt::Debug for OrderFn<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("OrderFn")
    }
}

impl<K: ?Sized> KeyOrder<K> for OrderFn<K> {
    #[inline]
    fn compare(&self, a: &K, b: &K) -> Option<Ordering> {
        Some((self.0)(a, b))
    }
}

/// Deterministic last-resort order between two distinct nodes. Every key in
/// one map has the same type, so only arena identity is left to compare; it
/// is stable for as long as both nodes live.
#[inline]
pub(crate) fn tie_break(a: NodeKey, b: NodeKey) -> Ordering {
    if a <= b {
        Ordering::Less
    } else {
        Ordering::Greater
    }
}

/// `KeyOrder::compare` collapsed to the direction used by tree descent:
/// `None` means the order could not separate the keys.
#[inline]
pub(crate) fn direction<Q: ?Sized, O: KeyOrder<Q>>(order: &O, a: &Q, b: &Q) -> Option<Ordering> {
    match order.compare(a, b) {
        Some(Ordering::Equal) | None => None,
        dir => dir,
    }
}
