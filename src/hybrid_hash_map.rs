//! HybridHashMap: public map API over `RawTable`, with stable handles and a
//! debug reentrancy guard.

use crate::error::Error;
use crate::hashing::{fold, spread, DEFAULT_LOAD_FACTOR, MAXIMUM_CAPACITY};
use crate::iter::{Cursor, Drain, IntoIter, Iter, IterMut, Keys, Values, ValuesMut, Walk};
use crate::node::NodeKey;
use crate::order::{KeyOrder, Unordered};
use crate::raw_table::{Put, RawTable};
use crate::reentrancy::DebugReentrancy;
use core::borrow::Borrow;
use core::fmt;
use core::hash::{BuildHasher, Hash};
use core::ops::Index;
use hashbrown::hash_map::DefaultHashBuilder;

/// Stable reference to one entry. Stays valid across growth, treeify and
/// rebalancing, and stops resolving once the entry is removed.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Handle(NodeKey);

impl Handle {
    pub fn key<'a, K, V, S, O>(&self, map: &'a HybridHashMap<K, V, S, O>) -> Option<&'a K> {
        map.table.nodes.get(self.0).map(|n| &n.key)
    }

    pub fn value<'a, K, V, S, O>(&self, map: &'a HybridHashMap<K, V, S, O>) -> Option<&'a V> {
        map.table.nodes.get(self.0).map(|n| &n.value)
    }

    pub fn value_mut<'a, K, V, S, O>(&self, map: &'a mut HybridHashMap<K, V, S, O>) -> Option<&'a mut V> {
        map.table.nodes.get_mut(self.0).map(|n| &mut n.value)
    }
}

/// Hash map whose crowded buckets become red-black trees.
///
/// `S` hashes keys; `O` orders keys that share a hash inside a tree bin (see
/// [`KeyOrder`]). Single-owner: the map is `Send` when its contents are, but
/// not `Sync`.
pub struct HybridHashMap<K, V, S = DefaultHashBuilder, O = Unordered> {
    pub(crate) hasher: S,
    pub(crate) order: O,
    pub(crate) table: RawTable<K, V>,
    pub(crate) reentrancy: DebugReentrancy,
}

impl<K, V> HybridHashMap<K, V> {
    pub fn new() -> Self {
        Self::with_hasher(Default::default())
    }

    /// Starts with `capacity` buckets, rounded up to a power of two and
    /// clamped to the maximum table size. The first growth comes once the
    /// size passes `capacity * load_factor`.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_hasher(capacity, Default::default())
    }

    /// Fails with `Error::InvalidLoadFactor` unless `load_factor` is positive
    /// and finite.
    pub fn with_capacity_and_load_factor(capacity: usize, load_factor: f32) -> Result<Self, Error> {
        Self::with_config(capacity, load_factor, Default::default(), Unordered)
    }
}

impl<K, V, O> HybridHashMap<K, V, DefaultHashBuilder, O> {
    /// Empty map whose tree bins order equal-hash keys with `order`.
    pub fn with_order(order: O) -> Self {
        Self::with_hasher_and_order(Default::default(), order)
    }
}

impl<K, V> Default for HybridHashMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S, O> HybridHashMap<K, V, S, O> {
    pub fn with_hasher(hasher: S) -> Self
    where
        O: Default,
    {
        Self::with_hasher_and_order(hasher, O::default())
    }

    pub fn with_capacity_and_hasher(capacity: usize, hasher: S) -> Self
    where
        O: Default,
    {
        Self::from_parts(capacity.max(1), DEFAULT_LOAD_FACTOR, hasher, O::default())
    }

    pub fn with_hasher_and_order(hasher: S, order: O) -> Self {
        Self::from_parts(0, DEFAULT_LOAD_FACTOR, hasher, order)
    }

    /// Fully specified constructor. A `capacity` of 0 asks for the smallest
    /// table; larger values are rounded up to a power of two and clamped.
    pub fn with_config(capacity: usize, load_factor: f32, hasher: S, order: O) -> Result<Self, Error> {
        if !load_factor.is_finite() || load_factor <= 0.0 {
            return Err(Error::InvalidLoadFactor(load_factor));
        }
        Ok(Self::from_parts(capacity.max(1), load_factor, hasher, order))
    }

    fn from_parts(capacity: usize, load_factor: f32, hasher: S, order: O) -> Self {
        Self {
            hasher,
            order,
            table: RawTable::new(capacity.min(MAXIMUM_CAPACITY), load_factor),
            reentrancy: DebugReentrancy::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.len() == 0
    }

    /// Number of buckets, or the number the first insert will allocate.
    pub fn capacity(&self) -> usize {
        self.table.capacity()
    }

    pub fn load_factor(&self) -> f32 {
        self.table.load_factor
    }

    pub fn hasher(&self) -> &S {
        &self.hasher
    }

    pub fn order(&self) -> &O {
        &self.order
    }

    /// Removes every entry; the bucket array keeps its length.
    pub fn clear(&mut self) {
        let _g = self.reentrancy.enter();
        self.table.clear();
    }

    /// Entries in bucket order; within a bucket, in chain order.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter::new(&self.table)
    }

    /// Mutable entries in storage order.
    pub fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        IterMut::new(&mut self.table)
    }

    pub fn keys(&self) -> Keys<'_, K, V> {
        Keys::new(&self.table)
    }

    pub fn values(&self) -> Values<'_, K, V> {
        Values::new(&self.table)
    }

    pub fn values_mut(&mut self) -> ValuesMut<'_, K, V> {
        ValuesMut::new(&mut self.table)
    }

    /// Removes and yields every entry; the bucket array keeps its length.
    pub fn drain(&mut self) -> Drain<'_, K, V> {
        Drain::new(&mut self.table)
    }

    /// Detached, fail-fast position over the entries; see [`Cursor`].
    pub fn cursor(&self) -> Cursor {
        Cursor::new(&self.table)
    }

    /// Removes the entry `handle` refers to, if it is still present.
    pub fn remove_handle(&mut self, handle: Handle) -> Option<(K, V)> {
        let _g = self.reentrancy.enter();
        self.table.unlink(handle.0, true)
    }

    /// Replaces each value with `f(key, value)`.
    pub fn replace_all<F>(&mut self, mut f: F)
    where
        F: FnMut(&K, &V) -> V,
    {
        let _g = self.reentrancy.enter();
        for n in self.table.nodes.values_mut() {
            n.value = f(&n.key, &n.value);
        }
    }

    /// Keeps only the entries for which `f` returns true. Removal follows the
    /// cursor rules, so tree bins are not reshaped during the walk.
    pub fn retain<F>(&mut self, mut f: F)
    where
        F: FnMut(&K, &mut V) -> bool,
    {
        let _g = self.reentrancy.enter();
        let mut walk = Walk::new(&self.table);
        while let Some(x) = walk.step(&self.table) {
            let n = &mut self.table.nodes[x];
            if !f(&n.key, &mut n.value) {
                self.table.unlink(x, false);
            }
        }
    }

    pub fn contains_value(&self, value: &V) -> bool
    where
        V: PartialEq,
    {
        let _g = self.reentrancy.enter();
        self.table.nodes.values().any(|n| n.value == *value)
    }
}

impl<K, V, S, O> HybridHashMap<K, V, S, O>
where
    K: Eq + Hash,
    S: BuildHasher,
    O: KeyOrder<K>,
{
    fn make_hash<Q>(&self, q: &Q) -> u32
    where
        Q: ?Sized + Hash,
    {
        spread(fold(self.hasher.hash_one(q)))
    }

    fn find_node<Q>(&self, key: &Q) -> Option<NodeKey>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        O: KeyOrder<Q>,
    {
        let hash = self.make_hash(key);
        self.table.find(hash, key, &self.order)
    }

    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        O: KeyOrder<Q>,
    {
        let _g = self.reentrancy.enter();
        let x = self.find_node(key)?;
        Some(&self.table.nodes[x].value)
    }

    pub fn get_key_value<Q>(&self, key: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        O: KeyOrder<Q>,
    {
        let _g = self.reentrancy.enter();
        let x = self.find_node(key)?;
        let n = &self.table.nodes[x];
        Some((&n.key, &n.value))
    }

    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        O: KeyOrder<Q>,
    {
        let _g = self.reentrancy.enter();
        let x = self.find_node(key)?;
        Some(&mut self.table.nodes[x].value)
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        O: KeyOrder<Q>,
    {
        let _g = self.reentrancy.enter();
        self.find_node(key).is_some()
    }

    /// Handle to the entry for `key`.
    pub fn find<Q>(&self, key: &Q) -> Option<Handle>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        O: KeyOrder<Q>,
    {
        let _g = self.reentrancy.enter();
        self.find_node(key).map(Handle)
    }

    /// Maps `key` to `value`, returning the value it replaces. A replaced
    /// entry keeps its original key and its place in the bucket.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        let _g = self.reentrancy.enter();
        let hash = self.make_hash(&key);
        upsert(&mut self.table, hash, key, value, &self.order)
    }

    /// Inserts only when `key` is absent. Returns the existing value
    /// otherwise, leaving it untouched and dropping `value`.
    pub fn put_if_absent(&mut self, key: K, value: V) -> Option<&mut V> {
        let _g = self.reentrancy.enter();
        let hash = self.make_hash(&key);
        match self.table.put(hash, key, value, &self.order) {
            Put::Inserted => None,
            Put::Occupied { node, .. } => Some(&mut self.table.nodes[node].value),
        }
    }

    /// Inserts every pair, sizing the table for them up front.
    pub fn put_all<I>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (K, V)>,
    {
        let _g = self.reentrancy.enter();
        let entries = entries.into_iter();
        let (lower, _) = entries.size_hint();
        self.table.reserve(lower, &self.order);
        for (k, v) in entries {
            let hash = self.make_hash(&k);
            upsert(&mut self.table, hash, k, v, &self.order);
        }
    }

    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        O: KeyOrder<Q>,
    {
        let _g = self.reentrancy.enter();
        let x = self.find_node(key)?;
        self.table.unlink(x, true).map(|(_, v)| v)
    }

    pub fn remove_entry<Q>(&mut self, key: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        O: KeyOrder<Q>,
    {
        let _g = self.reentrancy.enter();
        let x = self.find_node(key)?;
        self.table.unlink(x, true)
    }

    /// Removes `key` only while it maps to `value`.
    pub fn remove_if_eq<Q>(&mut self, key: &Q, value: &V) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        O: KeyOrder<Q>,
        V: PartialEq,
    {
        let _g = self.reentrancy.enter();
        match self.find_node(key) {
            Some(x) if self.table.nodes[x].value == *value => self.table.unlink(x, true).is_some(),
            _ => false,
        }
    }

    /// Replaces the value of a present key, returning the old one. Absent
    /// keys are left absent.
    pub fn replace<Q>(&mut self, key: &Q, value: V) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        O: KeyOrder<Q>,
    {
        let _g = self.reentrancy.enter();
        let x = self.find_node(key)?;
        Some(core::mem::replace(&mut self.table.nodes[x].value, value))
    }

    /// Replaces the value of `key` with `new` only while it equals `old`.
    pub fn replace_if_eq<Q>(&mut self, key: &Q, old: &V, new: V) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        O: KeyOrder<Q>,
        V: PartialEq,
    {
        let _g = self.reentrancy.enter();
        match self.find_node(key) {
            Some(x) if self.table.nodes[x].value == *old => {
                self.table.nodes[x].value = new;
                true
            }
            _ => false,
        }
    }

    /// Returns the value for `key`, first inserting `f(&key)` if the key is
    /// absent and `f` produces a value. `f` runs at most once and only when
    /// the key is absent. New entries go to the head of their chain.
    pub fn compute_if_absent<F>(&mut self, key: K, f: F) -> Option<&mut V>
    where
        F: FnOnce(&K) -> Option<V>,
    {
        let _g = self.reentrancy.enter();
        let hash = self.make_hash(&key);
        let probe = self.table.probe(hash, &key, &self.order);
        let x = match probe.found {
            Some(x) => x,
            None => {
                let value = f(&key)?;
                self.table.insert_probed(&probe, hash, key, value, &self.order)
            }
        };
        Some(&mut self.table.nodes[x].value)
    }

    /// Recomputes the value of a present key. `None` from `f` removes the
    /// entry. Absent keys are left alone and `f` does not run.
    pub fn compute_if_present<Q, F>(&mut self, key: &Q, f: F) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        O: KeyOrder<Q>,
        F: FnOnce(&K, &V) -> Option<V>,
    {
        let _g = self.reentrancy.enter();
        let x = self.find_node(key)?;
        let n = &self.table.nodes[x];
        match f(&n.key, &n.value) {
            Some(v) => {
                let slot = &mut self.table.nodes[x].value;
                *slot = v;
                Some(slot)
            }
            None => {
                self.table.unlink(x, true);
                None
            }
        }
    }

    /// Maps `key` to `f(&key, current)`, where `None` on either side means
    /// "no mapping": a `None` result removes a present key. `f` runs exactly
    /// once. New entries go to the head of their chain.
    pub fn compute<F>(&mut self, key: K, f: F) -> Option<&mut V>
    where
        F: FnOnce(&K, Option<&V>) -> Option<V>,
    {
        let _g = self.reentrancy.enter();
        let hash = self.make_hash(&key);
        let probe = self.table.probe(hash, &key, &self.order);
        let current = probe.found.map(|x| &self.table.nodes[x].value);
        match (probe.found, f(&key, current)) {
            (Some(x), Some(v)) => {
                let slot = &mut self.table.nodes[x].value;
                *slot = v;
                Some(slot)
            }
            (Some(x), None) => {
                self.table.unlink(x, true);
                None
            }
            (None, Some(v)) => {
                let x = self.table.insert_probed(&probe, hash, key, v, &self.order);
                Some(&mut self.table.nodes[x].value)
            }
            (None, None) => None,
        }
    }

    /// Inserts `value` if `key` is absent; otherwise replaces the current
    /// value with `f(current, value)`, removing the entry when that is
    /// `None`. New entries go to the head of their chain.
    pub fn merge<F>(&mut self, key: K, value: V, f: F) -> Option<&mut V>
    where
        F: FnOnce(&V, V) -> Option<V>,
    {
        let _g = self.reentrancy.enter();
        let hash = self.make_hash(&key);
        let probe = self.table.probe(hash, &key, &self.order);
        match probe.found {
            Some(x) => match f(&self.table.nodes[x].value, value) {
                Some(v) => {
                    let slot = &mut self.table.nodes[x].value;
                    *slot = v;
                    Some(slot)
                }
                None => {
                    self.table.unlink(x, true);
                    None
                }
            },
            None => {
                let x = self.table.insert_probed(&probe, hash, key, value, &self.order);
                Some(&mut self.table.nodes[x].value)
            }
        }
    }
}

/// `put` that overwrites the value of an existing key in place.
fn upsert<K: Eq, V, O: KeyOrder<K>>(table: &mut RawTable<K, V>, hash: u32, key: K, value: V, order: &O) -> Option<V> {
    match table.put(hash, key, value, order) {
        Put::Inserted => None,
        Put::Occupied { node, value } => Some(core::mem::replace(&mut table.nodes[node].value, value)),
    }
}

impl<K, V, S, O> Clone for HybridHashMap<K, V, S, O>
where
    K: Clone,
    V: Clone,
    S: Clone,
    O: Clone,
{
    fn clone(&self) -> Self {
        Self {
            hasher: self.hasher.clone(),
            order: self.order.clone(),
            table: self.table.clone(),
            reentrancy: DebugReentrancy::new(),
        }
    }
}

impl<K, V, S, O> fmt::Debug for HybridHashMap<K, V, S, O>
where
    K: fmt::Debug,
    V: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K, V, S, O> PartialEq for HybridHashMap<K, V, S, O>
where
    K: Eq + Hash,
    V: PartialEq,
    S: BuildHasher,
    O: KeyOrder<K>,
{
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|(k, v)| other.get(k) == Some(v))
    }
}

impl<K, V, S, O> Eq for HybridHashMap<K, V, S, O>
where
    K: Eq + Hash,
    V: Eq,
    S: BuildHasher,
    O: KeyOrder<K>,
{
}

impl<K, Q, V, S, O> Index<&Q> for HybridHashMap<K, V, S, O>
where
    K: Eq + Hash + Borrow<Q>,
    Q: ?Sized + Eq + Hash,
    S: BuildHasher,
    O: KeyOrder<K> + KeyOrder<Q>,
{
    type Output = V;

    /// Panics when `key` is absent.
    fn index(&self, key: &Q) -> &V {
        self.get(key).expect("key not present in HybridHashMap")
    }
}

impl<K, V, S, O> Extend<(K, V)> for HybridHashMap<K, V, S, O>
where
    K: Eq + Hash,
    S: BuildHasher,
    O: KeyOrder<K>,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        self.put_all(iter);
    }
}

impl<K, V, S, O> FromIterator<(K, V)> for HybridHashMap<K, V, S, O>
where
    K: Eq + Hash,
    S: BuildHasher + Default,
    O: KeyOrder<K> + Default,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut m = Self::with_hasher(S::default());
        m.put_all(iter);
        m
    }
}

impl<K, V, S, O> IntoIterator for HybridHashMap<K, V, S, O> {
    type Item = (K, V);
    type IntoIter = IntoIter<K, V>;

    fn into_iter(self) -> IntoIter<K, V> {
        IntoIter::new(self.table)
    }
}

impl<'a, K, V, S, O> IntoIterator for &'a HybridHashMap<K, V, S, O> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Iter<'a, K, V> {
        self.iter()
    }
}

impl<'a, K, V, S, O> IntoIterator for &'a mut HybridHashMap<K, V, S, O> {
    type Item = (&'a K, &'a mut V);
    type IntoIter = IterMut<'a, K, V>;

    fn into_iter(self) -> IterMut<'a, K, V> {
        self.iter_mut()
    }
}
