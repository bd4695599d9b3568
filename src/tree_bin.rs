//! Tree bins: buckets whose entries form a red-black tree ordered by hash.
//!
//! Every node of a tree bin is a member of two structures at once: the tree
//! (`parent`/`left`/`right`) and a doubly linked list (`next`/`prev`) that
//! starts at the bucket slot. The list keeps chain order so a bin can be
//! walked, split and turned back into a chain without touching the tree.
//!
//! After every movable operation the tree root is moved to the head of the
//! list. Removals made on behalf of a cursor leave the list order alone, so
//! the root may drift away from the head; `root` recovers it by ascent.

use crate::hashing::{index_for, UNTREEIFY_THRESHOLD};
use crate::node::{Arena, Bin, NodeKey, Partition, TreeLinks};
use crate::order::{direction, tie_break, KeyOrder};
use crate::rbtree::{balance_deletion, balance_insertion, check_invariants};
use core::borrow::Borrow;
use core::cmp::Ordering;

/// True root of the tree containing `x`.
pub(crate) fn root<K, V>(nodes: &Arena<K, V>, mut x: NodeKey) -> NodeKey {
    while let Some(p) = nodes[x].tree.parent {
        x = p;
    }
    x
}

/// Makes `root` the head of its bucket's list and tags the slot as a tree bin.
pub(crate) fn move_root_to_front<K, V>(bins: &mut [Bin], nodes: &mut Arena<K, V>, root: NodeKey) {
    let index = index_for(nodes[root].hash, bins.len());
    let first = bins[index].head();
    bins[index] = Bin::Tree(root);
    if first != Some(root) {
        let rp = nodes[root].tree.prev;
        let rn = nodes[root].next;
        if let Some(rn) = rn {
            nodes[rn].tree.prev = rp;
        }
        if let Some(rp) = rp {
            nodes[rp].next = rn;
        }
        if let Some(first) = first {
            nodes[first].tree.prev = Some(root);
        }
        nodes[root].next = first;
        nodes[root].tree.prev = None;
    }
    debug_assert!(
        check_invariants(nodes, root).is_ok(),
        "tree bin invariant violated: {:?}",
        check_invariants(nodes, root)
    );
}

/// Searches the subtree under `start` for `key`.
///
/// Descends by hash. On a hash tie the order decides the side when it can;
/// otherwise both subtrees are searched, right first, because rotations may
/// have left equal-hash nodes on either side.
pub(crate) fn find<K, V, Q, O>(
    nodes: &Arena<K, V>,
    start: NodeKey,
    hash: u32,
    key: &Q,
    order: &O,
) -> Option<NodeKey>
where
    K: Borrow<Q>,
    Q: ?Sized + Eq,
    O: KeyOrder<Q>,
{
    let mut p = Some(start);
    while let Some(pk) = p {
        let n = &nodes[pk];
        let (pl, pr) = (n.tree.left, n.tree.right);
        if n.hash > hash {
            p = pl;
        } else if n.hash < hash {
            p = pr;
        } else if n.key.borrow() == key {
            return Some(pk);
        } else {
            match (pl, pr) {
                (None, _) => p = pr,
                (_, None) => p = pl,
                (Some(l), Some(r)) => match direction(order, key, n.key.borrow()) {
                    Some(Ordering::Less) => p = Some(l),
                    Some(_) => p = Some(r),
                    None => {
                        if let Some(q) = find(nodes, r, hash, key, order) {
                            return Some(q);
                        }
                        p = Some(l);
                    }
                },
            }
        }
    }
    None
}

/// Links every node of the list starting at `head` into a fresh tree, in list
/// order, then moves the root to the front of the bucket.
pub(crate) fn treeify<K, V, O>(bins: &mut [Bin], nodes: &mut Arena<K, V>, head: NodeKey, order: &O)
where
    O: KeyOrder<K>,
{
    let mut root: Option<NodeKey> = None;
    let mut prev = None;
    let mut cur = Some(head);
    while let Some(x) = cur {
        cur = nodes[x].next;
        nodes[x].tree = TreeLinks {
            prev,
            ..TreeLinks::default()
        };
        prev = Some(x);
        let Some(r) = root else {
            root = Some(x);
            continue;
        };
        let h = nodes[x].hash;
        let mut p = r;
        loop {
            let ph = nodes[p].hash;
            let dir = if ph > h {
                Ordering::Less
            } else if ph < h {
                Ordering::Greater
            } else {
                direction(order, &nodes[x].key, &nodes[p].key).unwrap_or_else(|| tie_break(x, p))
            };
            let child = if dir == Ordering::Greater {
                nodes[p].tree.right
            } else {
                nodes[p].tree.left
            };
            match child {
                Some(c) => p = c,
                None => {
                    attach(nodes, p, x, dir);
                    root = Some(balance_insertion(nodes, r, x));
                    break;
                }
            }
        }
    }
    if let Some(root) = root {
        move_root_to_front(bins, nodes, root);
    }
}

/// Drops the tree structure of the list starting at `head`, leaving a chain
/// in the same order.
pub(crate) fn untreeify<K, V>(nodes: &mut Arena<K, V>, head: NodeKey) -> Bin {
    let mut cur = Some(head);
    while let Some(x) = cur {
        nodes[x].tree = TreeLinks::default();
        cur = nodes[x].next;
    }
    Bin::Chain(head)
}

fn attach<K, V>(nodes: &mut Arena<K, V>, parent: NodeKey, x: NodeKey, dir: Ordering) {
    nodes[x].tree.parent = Some(parent);
    if dir == Ordering::Greater {
        nodes[parent].tree.right = Some(x);
    } else {
        nodes[parent].tree.left = Some(x);
    }
}

/// Links the detached node `x` into the tree bin whose list starts at `head`.
///
/// Returns the node already holding an equal key instead, leaving `x`
/// unlinked. On a tie the order cannot break, both subtrees are searched once
/// for the key before the identity tie-break picks a side. The new node goes
/// into the list right after its tree parent.
pub(crate) fn put_tree_val<K, V, O>(
    bins: &mut [Bin],
    nodes: &mut Arena<K, V>,
    head: NodeKey,
    x: NodeKey,
    order: &O,
) -> Option<NodeKey>
where
    K: Eq,
    O: KeyOrder<K>,
{
    let h = nodes[x].hash;
    let root = root(nodes, head);
    let mut searched = false;
    let mut p = root;
    loop {
        let ph = nodes[p].hash;
        let dir = if ph > h {
            Ordering::Less
        } else if ph < h {
            Ordering::Greater
        } else if nodes[p].key == nodes[x].key {
            return Some(p);
        } else if let Some(dir) = direction(order, &nodes[x].key, &nodes[p].key) {
            dir
        } else {
            if !searched {
                searched = true;
                let key = &nodes[x].key;
                let found = [nodes[p].tree.left, nodes[p].tree.right]
                    .into_iter()
                    .flatten()
                    .find_map(|c| find(nodes, c, h, key, order));
                if found.is_some() {
                    return found;
                }
            }
            tie_break(x, p)
        };
        let child = if dir == Ordering::Greater {
            nodes[p].tree.right
        } else {
            nodes[p].tree.left
        };
        if let Some(c) = child {
            p = c;
            continue;
        }
        let xpn = nodes[p].next;
        attach(nodes, p, x, dir);
        nodes[p].next = Some(x);
        nodes[x].next = xpn;
        nodes[x].tree.prev = Some(p);
        if let Some(xpn) = xpn {
            nodes[xpn].tree.prev = Some(x);
        }
        let root = balance_insertion(nodes, root, x);
        move_root_to_front(bins, nodes, root);
        return None;
    }
}

/// A tree is too sparse to keep once its root lacks a child or its left child
/// lacks a left child.
fn is_sparse<K, V>(nodes: &Arena<K, V>, root: NodeKey) -> bool {
    let t = nodes[root].tree;
    t.right.is_none() || t.left.map_or(true, |rl| nodes[rl].tree.left.is_none())
}

/// Unlinks `p` from its tree bin's list and tree. `p` stays in the arena.
///
/// When `movable`, a sparse bin is turned back into a chain instead of being
/// rebalanced, and the root is moved to the front afterwards. Cursor removals
/// pass `movable = false` so the list order they are walking stays intact.
pub(crate) fn remove_tree_node<K, V>(bins: &mut [Bin], nodes: &mut Arena<K, V>, p: NodeKey, movable: bool) {
    let index = index_for(nodes[p].hash, bins.len());
    let Some(first) = bins[index].head() else {
        return;
    };
    let succ = nodes[p].next;
    let pred = nodes[p].tree.prev;
    match pred {
        None => bins[index] = succ.map_or(Bin::Empty, Bin::Tree),
        Some(pred) => nodes[pred].next = succ,
    }
    if let Some(succ) = succ {
        nodes[succ].tree.prev = pred;
    }
    let Some(new_first) = bins[index].head() else {
        return;
    };
    // `first` may be `p` itself; it is still linked into the tree here.
    let mut root = root(nodes, first);
    if movable && is_sparse(nodes, root) {
        bins[index] = untreeify(nodes, new_first);
        return;
    }

    let TreeLinks { left: pl, right: pr, .. } = nodes[p].tree;
    let replacement = match (pl, pr) {
        (Some(pl), Some(pr)) => {
            let mut s = pr;
            while let Some(sl) = nodes[s].tree.left {
                s = sl;
            }
            let s_red = nodes[s].tree.red;
            nodes[s].tree.red = nodes[p].tree.red;
            nodes[p].tree.red = s_red;
            let sr = nodes[s].tree.right;
            let pp = nodes[p].tree.parent;
            if s == pr {
                nodes[p].tree.parent = Some(s);
                nodes[s].tree.right = Some(p);
            } else {
                let sp = nodes[s].tree.parent;
                nodes[p].tree.parent = sp;
                if let Some(sp) = sp {
                    if nodes[sp].tree.left == Some(s) {
                        nodes[sp].tree.left = Some(p);
                    } else {
                        nodes[sp].tree.right = Some(p);
                    }
                }
                nodes[s].tree.right = Some(pr);
                nodes[pr].tree.parent = Some(s);
            }
            nodes[p].tree.left = None;
            nodes[p].tree.right = sr;
            if let Some(sr) = sr {
                nodes[sr].tree.parent = Some(p);
            }
            nodes[s].tree.left = Some(pl);
            nodes[pl].tree.parent = Some(s);
            nodes[s].tree.parent = pp;
            match pp {
                None => root = s,
                Some(pp) => {
                    if nodes[pp].tree.left == Some(p) {
                        nodes[pp].tree.left = Some(s);
                    } else {
                        nodes[pp].tree.right = Some(s);
                    }
                }
            }
            sr.unwrap_or(p)
        }
        (Some(pl), None) => pl,
        (None, Some(pr)) => pr,
        (None, None) => p,
    };
    if replacement != p {
        let pp = nodes[p].tree.parent;
        nodes[replacement].tree.parent = pp;
        match pp {
            None => {
                root = replacement;
                nodes[replacement].tree.red = false;
            }
            Some(pp) => {
                if nodes[pp].tree.left == Some(p) {
                    nodes[pp].tree.left = Some(replacement);
                } else {
                    nodes[pp].tree.right = Some(replacement);
                }
            }
        }
        nodes[p].tree.left = None;
        nodes[p].tree.right = None;
        nodes[p].tree.parent = None;
    }

    let r = if nodes[p].tree.red {
        root
    } else {
        balance_deletion(nodes, root, replacement)
    };

    if replacement == p {
        if let Some(pp) = nodes[p].tree.parent.take() {
            if nodes[pp].tree.left == Some(p) {
                nodes[pp].tree.left = None;
            } else if nodes[pp].tree.right == Some(p) {
                nodes[pp].tree.right = None;
            }
        }
    }
    nodes[p].tree = TreeLinks::default();
    nodes[p].next = None;
    if movable {
        move_root_to_front(bins, nodes, r);
    }
}

/// Distributes the tree bin whose list starts at `head` over the new table:
/// nodes without `bit` stay at `index`, the others move to `index + bit`.
/// List order is kept. Small halves become chains; a half that received
/// every node keeps its existing tree.
pub(crate) fn split<K, V, O>(
    bins: &mut [Bin],
    nodes: &mut Arena<K, V>,
    head: NodeKey,
    index: usize,
    bit: usize,
    order: &O,
) where
    O: KeyOrder<K>,
{
    let mut lo = Partition::default();
    let mut hi = Partition::default();
    let mut e = Some(head);
    while let Some(x) = e {
        e = nodes[x].next;
        nodes[x].next = None;
        if nodes[x].hash as usize & bit == 0 {
            lo.push(nodes, x, true);
        } else {
            hi.push(nodes, x, true);
        }
    }
    for (half, other, at) in [(&lo, &hi, index), (&hi, &lo, index + bit)] {
        let Some(h) = half.head else {
            continue;
        };
        if half.len <= UNTREEIFY_THRESHOLD {
            bins[at] = untreeify(nodes, h);
        } else {
            bins[at] = Bin::Tree(h);
            if other.head.is_some() {
                treeify(bins, nodes, h, order);
            }
        }
    }
}
