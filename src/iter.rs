//! Iteration over a `HybridHashMap`.
//!
//! Shared iterators walk the bucket array in index order and each bucket in
//! chain (or tree-bin list) order. Mutable and owning iterators walk the
//! arena instead, which visits the same entries in storage order.

use crate::error::Error;
use crate::hybrid_hash_map::HybridHashMap;
use crate::node::{Node, NodeKey};
use crate::raw_table::RawTable;
use core::iter::FusedIterator;
use core::marker::PhantomData;
use slotmap::basic;

/// Position in bucket order. The next node is resolved before the current one
/// is handed out, so the current node may be unlinked without losing the
/// walk.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Walk {
    bucket: usize,
    next: Option<NodeKey>,
}

impl Walk {
    pub(crate) fn new<K, V>(table: &RawTable<K, V>) -> Self {
        let mut w = Walk {
            bucket: 0,
            next: None,
        };
        w.seek(table, 0);
        w
    }

    fn seek<K, V>(&mut self, table: &RawTable<K, V>, from: usize) {
        match table.next_occupied(from) {
            Some((i, head)) => {
                self.bucket = i;
                self.next = Some(head);
            }
            None => {
                self.bucket = table.bins.len();
                self.next = None;
            }
        }
    }

    pub(crate) fn step<K, V>(&mut self, table: &RawTable<K, V>) -> Option<NodeKey> {
        let x = self.next?;
        let n = table.nodes.get(x)?;
        match n.next {
            Some(next) => self.next = Some(next),
            None => self.seek(table, self.bucket + 1),
        }
        Some(x)
    }
}

pub struct Iter<'a, K, V> {
    table: &'a RawTable<K, V>,
    walk: Walk,
    remaining: usize,
}

impl<'a, K, V> Iter<'a, K, V> {
    pub(crate) fn new(table: &'a RawTable<K, V>) -> Self {
        Self {
            table,
            walk: Walk::new(table),
            remaining: table.len(),
        }
    }
}

impl<K, V> Clone for Iter<'_, K, V> {
    fn clone(&self) -> Self {
        Self {
            table: self.table,
            walk: self.walk,
            remaining: self.remaining,
        }
    }
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let x = self.walk.step(self.table)?;
        self.remaining -= 1;
        let n = &self.table.nodes[x];
        Some((&n.key, &n.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}
impl<K, V> FusedIterator for Iter<'_, K, V> {}

pub struct Keys<'a, K, V> {
    inner: Iter<'a, K, V>,
}

impl<'a, K, V> Keys<'a, K, V> {
    pub(crate) fn new(table: &'a RawTable<K, V>) -> Self {
        Self { inner: Iter::new(table) }
    }
}

impl<'a, K, V> Iterator for Keys<'a, K, V> {
    type Item = &'a K;

    fn next(&mut self) -> Option<&'a K> {
        self.inner.next().map(|(k, _)| k)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for Keys<'_, K, V> {}
impl<K, V> FusedIterator for Keys<'_, K, V> {}

pub struct Values<'a, K, V> {
    inner: Iter<'a, K, V>,
}

impl<'a, K, V> Values<'a, K, V> {
    pub(crate) fn new(table: &'a RawTable<K, V>) -> Self {
        Self { inner: Iter::new(table) }
    }
}

impl<'a, K, V> Iterator for Values<'a, K, V> {
    type Item = &'a V;

    fn next(&mut self) -> Option<&'a V> {
        self.inner.next().map(|(_, v)| v)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for Values<'_, K, V> {}
impl<K, V> FusedIterator for Values<'_, K, V> {}

pub struct IterMut<'a, K, V> {
    inner: basic::ValuesMut<'a, NodeKey, Node<K, V>>,
}

impl<'a, K, V> IterMut<'a, K, V> {
    pub(crate) fn new(table: &'a mut RawTable<K, V>) -> Self {
        Self {
            inner: table.nodes.values_mut(),
        }
    }
}

impl<'a, K, V> Iterator for IterMut<'a, K, V> {
    type Item = (&'a K, &'a mut V);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|n| (&n.key, &mut n.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for IterMut<'_, K, V> {}
impl<K, V> FusedIterator for IterMut<'_, K, V> {}

pub struct ValuesMut<'a, K, V> {
    inner: IterMut<'a, K, V>,
}

impl<'a, K, V> ValuesMut<'a, K, V> {
    pub(crate) fn new(table: &'a mut RawTable<K, V>) -> Self {
        Self {
            inner: IterMut::new(table),
        }
    }
}

impl<'a, K, V> Iterator for ValuesMut<'a, K, V> {
    type Item = &'a mut V;

    fn next(&mut self) -> Option<&'a mut V> {
        self.inner.next().map(|(_, v)| v)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for ValuesMut<'_, K, V> {}
impl<K, V> FusedIterator for ValuesMut<'_, K, V> {}

pub struct IntoIter<K, V> {
    inner: basic::IntoIter<NodeKey, Node<K, V>>,
}

impl<K, V> IntoIter<K, V> {
    pub(crate) fn new(table: RawTable<K, V>) -> Self {
        Self {
            inner: table.nodes.into_iter(),
        }
    }
}

impl<K, V> Iterator for IntoIter<K, V> {
    type Item = (K, V);

    fn next(&mut self) -> Option<(K, V)> {
        self.inner.next().map(|(_, n)| (n.key, n.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for IntoIter<K, V> {}
impl<K, V> FusedIterator for IntoIter<K, V> {}

/// Entries removed by `HybridHashMap::drain`. The map is already empty when
/// this is created, even if the `Drain` is leaked; dropping it early drops
/// the rest.
pub struct Drain<'a, K, V> {
    inner: std::vec::IntoIter<(K, V)>,
    _map: PhantomData<&'a mut RawTable<K, V>>,
}

impl<'a, K, V> Drain<'a, K, V> {
    pub(crate) fn new(table: &'a mut RawTable<K, V>) -> Self {
        table.mod_count += 1;
        table.bins.fill(Default::default());
        // Emptied through the arena so every slot's generation moves on and
        // old handles stop resolving.
        let taken: Vec<(K, V)> = table.nodes.drain().map(|(_, n)| (n.key, n.value)).collect();
        Self {
            inner: taken.into_iter(),
            _map: PhantomData,
        }
    }
}

impl<K, V> Iterator for Drain<'_, K, V> {
    type Item = (K, V);

    fn next(&mut self) -> Option<(K, V)> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for Drain<'_, K, V> {}
impl<K, V> FusedIterator for Drain<'_, K, V> {}

/// Fail-fast position over a map that does not borrow it.
///
/// Between steps the caller may use the map freely. If anything other than
/// [`Cursor::remove`] structurally modifies it (inserting a new key, removing,
/// clearing), the next call reports [`Error::ConcurrentModification`].
/// Detection relies on the map's modification count and is best effort:
/// replacing the value of an existing key is not a structural change.
///
/// ```
/// use hybrid_hashmap::HybridHashMap;
///
/// let mut m: HybridHashMap<u32, u32> = (0..10).map(|i| (i, i)).collect();
/// let mut c = m.cursor();
/// while let Some(entry) = c.next(&m) {
///     let (_, v) = entry.unwrap();
///     if v % 2 == 0 {
///         c.remove(&mut m).unwrap();
///     }
/// }
/// assert_eq!(m.len(), 5);
/// ```
#[derive(Debug, Clone)]
pub struct Cursor {
    walk: Walk,
    current: Option<NodeKey>,
    expected: u64,
}

impl Cursor {
    pub(crate) fn new<K, V>(table: &RawTable<K, V>) -> Self {
        Self {
            walk: Walk::new(table),
            current: None,
            expected: table.mod_count,
        }
    }

    fn check<K, V>(&self, table: &RawTable<K, V>) -> Result<(), Error> {
        if table.mod_count == self.expected {
            Ok(())
        } else {
            Err(Error::ConcurrentModification {
                expected: self.expected,
                found: table.mod_count,
            })
        }
    }

    /// Advances to the next entry. `None` once every entry has been visited.
    pub fn next<'a, K, V, S, O>(
        &mut self,
        map: &'a HybridHashMap<K, V, S, O>,
    ) -> Option<Result<(&'a K, &'a V), Error>> {
        let _g = map.reentrancy.enter();
        if let Err(e) = self.check(&map.table) {
            return Some(Err(e));
        }
        let x = self.walk.step(&map.table)?;
        self.current = Some(x);
        let n = &map.table.nodes[x];
        Some(Ok((&n.key, &n.value)))
    }

    /// Removes the entry last returned by `next`. Tree bins are left in
    /// their current shape so the walk continues where it was.
    pub fn remove<K, V, S, O>(&mut self, map: &mut HybridHashMap<K, V, S, O>) -> Result<(K, V), Error> {
        let _g = map.reentrancy.enter();
        let x = self.current.ok_or(Error::NoCurrentEntry)?;
        self.check(&map.table)?;
        self.current = None;
        let removed = map.table.unlink(x, false).ok_or(Error::NoCurrentEntry)?;
        self.expected = map.table.mod_count;
        Ok(removed)
    }
}
