//! Arena-resident entries and the per-bucket tagged union.

use slotmap::{new_key_type, SlotMap};

new_key_type! {
    /// Generational index of one entry in the map's arena.
    pub(crate) struct NodeKey;
}

/// Links a node uses only while it lives in a tree bin: the red-black tree
/// structure plus the back link of the bin's doubly linked list. Reset to the
/// default when the bin is turned back into a chain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct TreeLinks {
    pub(crate) parent: Option<NodeKey>,
    pub(crate) left: Option<NodeKey>,
    pub(crate) right: Option<NodeKey>,
    pub(crate) prev: Option<NodeKey>,
    pub(crate) red: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct Node<K, V> {
    pub(crate) hash: u32,
    pub(crate) key: K,
    pub(crate) value: V,
    /// Next entry of the same bucket, in chain or list order.
    pub(crate) next: Option<NodeKey>,
    pub(crate) tree: TreeLinks,
}

impl<K, V> Node<K, V> {
    pub(crate) fn new(hash: u32, key: K, value: V, next: Option<NodeKey>) -> Self {
        Self {
            hash,
            key,
            value,
            next,
            tree: TreeLinks::default(),
        }
    }
}

pub(crate) type Arena<K, V> = SlotMap<NodeKey, Node<K, V>>;

/// One slot of the bucket array.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) enum Bin {
    #[default]
    Empty,
    /// Head of a singly linked chain.
    Chain(NodeKey),
    /// Head of a tree bin's linked list. Normally also the tree root, but the
    /// root can drift away from the head; see `tree_bin::root`.
    Tree(NodeKey),
}

impl Bin {
    #[inline]
    pub(crate) fn head(self) -> Option<NodeKey> {
        match self {
            Bin::Empty => None,
            Bin::Chain(h) | Bin::Tree(h) => Some(h),
        }
    }

    /// Wraps a chain head, mapping `None` to `Empty`.
    #[inline]
    pub(crate) fn chain(head: Option<NodeKey>) -> Self {
        head.map_or(Bin::Empty, Bin::Chain)
    }
}

/// Builder for one half of a bucket being split on resize. Appends keep the
/// original relative order.
#[derive(Debug, Default)]
pub(crate) struct Partition {
    pub(crate) head: Option<NodeKey>,
    pub(crate) tail: Option<NodeKey>,
    pub(crate) len: usize,
}

impl Partition {
    /// Appends the detached node `x`; `with_prev` also maintains the list back
    /// links used by tree bins.
    pub(crate) fn push<K, V>(&mut self, nodes: &mut Arena<K, V>, x: NodeKey, with_prev: bool) {
        if with_prev {
            nodes[x].tree.prev = self.tail;
        }
        match self.tail {
            None => self.head = Some(x),
            Some(t) => nodes[t].next = Some(x),
        }
        self.tail = Some(x);
        self.len += 1;
    }
}
