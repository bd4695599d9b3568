//! RawTable: the bucket array, its arena of entries, and growth.
//!
//! Works on precomputed spread hashes; it never calls `K: Hash`. Key
//! equality and the tree-bin order are the only user code it runs.

use crate::hashing::{
    index_for, table_size_for, threshold_for, DEFAULT_INITIAL_CAPACITY, MAXIMUM_CAPACITY,
    MIN_TREEIFY_CAPACITY, TREEIFY_THRESHOLD,
};
use crate::node::{Arena, Bin, Node, NodeKey, Partition};
use crate::order::KeyOrder;
use crate::tree_bin;
use core::borrow::Borrow;

#[derive(Debug, Clone)]
pub(crate) struct RawTable<K, V> {
    /// Empty until the first insert, then always a power of two long.
    pub(crate) bins: Vec<Bin>,
    pub(crate) nodes: Arena<K, V>,
    /// Size above which the table grows. While `bins` is empty this holds the
    /// length of the first table to allocate, or 0 for the default.
    pub(crate) threshold: usize,
    pub(crate) load_factor: f32,
    /// Bumped on every structural modification; cursors compare against it.
    pub(crate) mod_count: u64,
}

/// Outcome of `RawTable::put`.
pub(crate) enum Put<V> {
    Inserted,
    /// An equal key was already present and keeps its own key; the offered
    /// value is handed back.
    Occupied { node: NodeKey, value: V },
}

/// Where a key lives, or would be inserted, for the compute family.
pub(crate) struct Probe {
    pub(crate) index: usize,
    pub(crate) found: Option<NodeKey>,
    /// Nodes of the chain walked before finding the key (the whole chain
    /// when absent).
    pub(crate) chain_len: usize,
}

impl<K, V> RawTable<K, V> {
    /// `initial_capacity` of 0 means the default first table length.
    pub(crate) fn new(initial_capacity: usize, load_factor: f32) -> Self {
        Self {
            bins: Vec::new(),
            nodes: Arena::with_key(),
            threshold: if initial_capacity == 0 {
                0
            } else {
                table_size_for(initial_capacity)
            },
            load_factor,
            mod_count: 0,
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Current table length, or the length the first insert will allocate.
    pub(crate) fn capacity(&self) -> usize {
        if !self.bins.is_empty() {
            self.bins.len()
        } else if self.threshold > 0 {
            self.threshold
        } else {
            DEFAULT_INITIAL_CAPACITY
        }
    }

    fn chain_find<Q>(&self, head: NodeKey, hash: u32, key: &Q) -> (Option<NodeKey>, usize)
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq,
    {
        let mut walked = 0;
        let mut cur = Some(head);
        while let Some(x) = cur {
            let n = &self.nodes[x];
            if n.hash == hash && n.key.borrow() == key {
                return (Some(x), walked);
            }
            walked += 1;
            cur = n.next;
        }
        (None, walked)
    }

    pub(crate) fn find<Q, O>(&self, hash: u32, key: &Q, order: &O) -> Option<NodeKey>
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq,
        O: KeyOrder<Q>,
    {
        if self.bins.is_empty() {
            return None;
        }
        match self.bins[index_for(hash, self.bins.len())] {
            Bin::Empty => None,
            Bin::Chain(head) => self.chain_find(head, hash, key).0,
            Bin::Tree(head) => {
                let root = tree_bin::root(&self.nodes, head);
                tree_bin::find(&self.nodes, root, hash, key, order)
            }
        }
    }

    /// Unlinks `x` from its bucket and takes it out of the arena. `movable`
    /// is false for removals made while walking the table, which must not
    /// reorder a tree bin's list or turn it back into a chain.
    pub(crate) fn unlink(&mut self, x: NodeKey, movable: bool) -> Option<(K, V)> {
        let hash = self.nodes.get(x)?.hash;
        let index = index_for(hash, self.bins.len());
        match self.bins[index] {
            Bin::Empty => return None,
            Bin::Tree(_) => tree_bin::remove_tree_node(&mut self.bins, &mut self.nodes, x, movable),
            Bin::Chain(head) if head == x => self.bins[index] = Bin::chain(self.nodes[x].next),
            Bin::Chain(head) => {
                let mut p = head;
                while let Some(next) = self.nodes[p].next {
                    if next == x {
                        self.nodes[p].next = self.nodes[x].next;
                        break;
                    }
                    p = next;
                }
            }
        }
        self.mod_count += 1;
        let node = self.nodes.remove(x)?;
        Some((node.key, node.value))
    }

    /// Empties every bucket but keeps the table length.
    pub(crate) fn clear(&mut self) {
        self.mod_count += 1;
        if !self.nodes.is_empty() {
            self.nodes.clear();
            self.bins.fill(Bin::Empty);
        }
    }

    /// First occupied bucket at or after `from`.
    pub(crate) fn next_occupied(&self, from: usize) -> Option<(usize, NodeKey)> {
        self.bins
            .iter()
            .enumerate()
            .skip(from)
            .find_map(|(i, b)| b.head().map(|h| (i, h)))
    }
}

impl<K, V> RawTable<K, V>
where
    K: Eq,
{
    /// Allocates the first table or doubles the current one, redistributing
    /// every bucket. At `MAXIMUM_CAPACITY` only the threshold is lifted.
    pub(crate) fn resize<O: KeyOrder<K>>(&mut self, order: &O) {
        let old_cap = self.bins.len();
        let new_cap = if old_cap > 0 {
            if old_cap >= MAXIMUM_CAPACITY {
                self.threshold = usize::MAX;
                return;
            }
            old_cap << 1
        } else if self.threshold > 0 {
            self.threshold
        } else {
            DEFAULT_INITIAL_CAPACITY
        };
        self.threshold = threshold_for(new_cap, self.load_factor);
        let old = std::mem::replace(&mut self.bins, vec![Bin::Empty; new_cap]);
        for (j, bin) in old.into_iter().enumerate() {
            match bin {
                Bin::Empty => {}
                Bin::Tree(head) => {
                    tree_bin::split(&mut self.bins, &mut self.nodes, head, j, old_cap, order)
                }
                Bin::Chain(head) if self.nodes[head].next.is_none() => {
                    self.bins[index_for(self.nodes[head].hash, new_cap)] = Bin::Chain(head);
                }
                Bin::Chain(head) => self.split_chain(head, j, old_cap),
            }
        }
    }

    /// Splits the chain at old index `j` into the nodes that stay (resize bit
    /// clear) and those that move up by `bit`, keeping relative order.
    fn split_chain(&mut self, head: NodeKey, j: usize, bit: usize) {
        let mut lo = Partition::default();
        let mut hi = Partition::default();
        let mut e = Some(head);
        while let Some(x) = e {
            e = self.nodes[x].next.take();
            if self.nodes[x].hash as usize & bit == 0 {
                lo.push(&mut self.nodes, x, false);
            } else {
                hi.push(&mut self.nodes, x, false);
            }
        }
        self.bins[j] = Bin::chain(lo.head);
        self.bins[j + bit] = Bin::chain(hi.head);
    }

    /// Turns the chain at `index` into a tree bin, or grows the table instead
    /// when it is still too small for tree bins to pay off.
    pub(crate) fn treeify_bin<O: KeyOrder<K>>(&mut self, index: usize, order: &O) {
        if self.bins.len() < MIN_TREEIFY_CAPACITY {
            self.resize(order);
        } else if let Bin::Chain(head) = self.bins[index] {
            tree_bin::treeify(&mut self.bins, &mut self.nodes, head, order);
        }
    }

    /// Pre-sizes for a bulk insert of `incoming` entries. An allocated table
    /// grows at most once here; later puts grow it further if needed.
    pub(crate) fn reserve<O: KeyOrder<K>>(&mut self, incoming: usize, order: &O) {
        if incoming == 0 {
            return;
        }
        if self.bins.is_empty() {
            let ft = incoming as f32 / self.load_factor + 1.0;
            let t = if ft < MAXIMUM_CAPACITY as f32 {
                ft as usize
            } else {
                MAXIMUM_CAPACITY
            };
            if t > self.threshold {
                self.threshold = table_size_for(t);
            }
        } else if incoming > self.threshold {
            self.resize(order);
        }
    }

    /// Inserts `key`/`value` unless an equal key exists. New chain entries
    /// are appended at the tail; a chain that reaches past
    /// `TREEIFY_THRESHOLD` nodes is treeified. Grows the table afterwards
    /// when the size passes the threshold.
    pub(crate) fn put<O: KeyOrder<K>>(&mut self, hash: u32, key: K, value: V, order: &O) -> Put<V> {
        if self.bins.is_empty() {
            self.resize(order);
        }
        let index = index_for(hash, self.bins.len());
        match self.bins[index] {
            Bin::Empty => {
                let x = self.nodes.insert(Node::new(hash, key, value, None));
                self.bins[index] = Bin::Chain(x);
            }
            Bin::Tree(head) => {
                let x = self.nodes.insert(Node::new(hash, key, value, None));
                if let Some(node) = tree_bin::put_tree_val(&mut self.bins, &mut self.nodes, head, x, order) {
                    let n = self.nodes.remove(x).expect("detached node allocated above");
                    return Put::Occupied { node, value: n.value };
                }
            }
            Bin::Chain(head) => {
                let mut p = head;
                let mut walked = 0;
                loop {
                    let n = &self.nodes[p];
                    if n.hash == hash && n.key == key {
                        return Put::Occupied { node: p, value };
                    }
                    match n.next {
                        Some(next) => {
                            p = next;
                            walked += 1;
                        }
                        None => break,
                    }
                }
                let x = self.nodes.insert(Node::new(hash, key, value, None));
                self.nodes[p].next = Some(x);
                if walked >= TREEIFY_THRESHOLD - 1 {
                    self.treeify_bin(index, order);
                }
            }
        }
        self.mod_count += 1;
        if self.len() > self.threshold {
            self.resize(order);
        }
        Put::Inserted
    }

    /// Locates `key` for a compute-style update, growing the table first when
    /// it is unallocated or already over its threshold.
    pub(crate) fn probe<O: KeyOrder<K>>(&mut self, hash: u32, key: &K, order: &O) -> Probe {
        if self.len() > self.threshold || self.bins.is_empty() {
            self.resize(order);
        }
        let index = index_for(hash, self.bins.len());
        let (found, chain_len) = match self.bins[index] {
            Bin::Empty => (None, 0),
            Bin::Chain(head) => self.chain_find(head, hash, key),
            Bin::Tree(head) => {
                let root = tree_bin::root(&self.nodes, head);
                (tree_bin::find(&self.nodes, root, hash, key, order), 0)
            }
        };
        Probe {
            index,
            found,
            chain_len,
        }
    }

    /// Inserts a key that `probe` reported absent. Chain entries go in at the
    /// head, unlike `put`. Does not grow the table afterwards.
    pub(crate) fn insert_probed<O: KeyOrder<K>>(
        &mut self,
        probe: &Probe,
        hash: u32,
        key: K,
        value: V,
        order: &O,
    ) -> NodeKey {
        let index = probe.index;
        let x = match self.bins[index] {
            Bin::Tree(head) => {
                let x = self.nodes.insert(Node::new(hash, key, value, None));
                if let Some(existing) =
                    tree_bin::put_tree_val(&mut self.bins, &mut self.nodes, head, x, order)
                {
                    let n = self.nodes.remove(x).expect("detached node allocated above");
                    self.nodes[existing].value = n.value;
                    return existing;
                }
                x
            }
            bin => {
                let x = self.nodes.insert(Node::new(hash, key, value, bin.head()));
                self.bins[index] = Bin::Chain(x);
                if probe.chain_len >= TREEIFY_THRESHOLD - 1 {
                    self.treeify_bin(index, order);
                }
                x
            }
        };
        self.mod_count += 1;
        x
    }
}
