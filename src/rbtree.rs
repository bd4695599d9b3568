//! Red-black tree engine over the arena's tree links.
//!
//! These functions touch only `parent`/`left`/`right`/`red` (and `prev`/`next`
//! in the checker); they never look at keys, values or hashes except to verify
//! ordering. Each mutating function takes the current root and returns the
//! root after the operation, which changes whenever a rotation lifts a node
//! to the top.

use crate::node::{Arena, NodeKey};

#[inline]
fn is_red<K, V>(nodes: &Arena<K, V>, x: Option<NodeKey>) -> bool {
    x.map_or(false, |x| nodes[x].tree.red)
}

#[inline]
fn set_red<K, V>(nodes: &mut Arena<K, V>, x: NodeKey, red: bool) {
    nodes[x].tree.red = red;
}

/// Points `pp`'s child slot that held `old` at `new`; with no parent, `new`
/// becomes the root and is painted black.
fn replace_child<K, V>(
    nodes: &mut Arena<K, V>,
    root: &mut NodeKey,
    pp: Option<NodeKey>,
    old: NodeKey,
    new: NodeKey,
) {
    match pp {
        None => {
            *root = new;
            set_red(nodes, new, false);
        }
        Some(pp) => {
            if nodes[pp].tree.left == Some(old) {
                nodes[pp].tree.left = Some(new);
            } else {
                nodes[pp].tree.right = Some(new);
            }
        }
    }
}

/// Rotates `p` down to the left, lifting its right child. No-op when `p` has
/// no right child.
pub(crate) fn rotate_left<K, V>(nodes: &mut Arena<K, V>, mut root: NodeKey, p: NodeKey) -> NodeKey {
    let Some(r) = nodes[p].tree.right else {
        return root;
    };
    let rl = nodes[r].tree.left;
    nodes[p].tree.right = rl;
    if let Some(rl) = rl {
        nodes[rl].tree.parent = Some(p);
    }
    let pp = nodes[p].tree.parent;
    nodes[r].tree.parent = pp;
    replace_child(nodes, &mut root, pp, p, r);
    nodes[r].tree.left = Some(p);
    nodes[p].tree.parent = Some(r);
    root
}

/// Mirror of `rotate_left`.
pub(crate) fn rotate_right<K, V>(nodes: &mut Arena<K, V>, mut root: NodeKey, p: NodeKey) -> NodeKey {
    let Some(l) = nodes[p].tree.left else {
        return root;
    };
    let lr = nodes[l].tree.right;
    nodes[p].tree.left = lr;
    if let Some(lr) = lr {
        nodes[lr].tree.parent = Some(p);
    }
    let pp = nodes[p].tree.parent;
    nodes[l].tree.parent = pp;
    replace_child(nodes, &mut root, pp, p, l);
    nodes[l].tree.right = Some(p);
    nodes[p].tree.parent = Some(l);
    root
}

/// Restores the red-black properties after `x` was linked in as a leaf.
pub(crate) fn balance_insertion<K, V>(nodes: &mut Arena<K, V>, mut root: NodeKey, mut x: NodeKey) -> NodeKey {
    set_red(nodes, x, true);
    loop {
        let Some(mut xp) = nodes[x].tree.parent else {
            set_red(nodes, x, false);
            return x;
        };
        if !nodes[xp].tree.red {
            return root;
        }
        let Some(mut xpp) = nodes[xp].tree.parent else {
            return root;
        };
        let xppl = nodes[xpp].tree.left;
        let xppr = nodes[xpp].tree.right;
        if xppl == Some(xp) {
            if let Some(uncle) = xppr.filter(|&u| nodes[u].tree.red) {
                set_red(nodes, uncle, false);
                set_red(nodes, xp, false);
                set_red(nodes, xpp, true);
                x = xpp;
                continue;
            }
            if nodes[xp].tree.right == Some(x) {
                x = xp;
                root = rotate_left(nodes, root, x);
                // x went down, so it has a parent and grandparent again.
                xp = nodes[x].tree.parent.unwrap_or(x);
                xpp = nodes[xp].tree.parent.unwrap_or(xp);
            }
            set_red(nodes, xp, false);
            if xpp != xp {
                set_red(nodes, xpp, true);
                root = rotate_right(nodes, root, xpp);
            }
        } else {
            if let Some(uncle) = xppl.filter(|&u| nodes[u].tree.red) {
                set_red(nodes, uncle, false);
                set_red(nodes, xp, false);
                set_red(nodes, xpp, true);
                x = xpp;
                continue;
            }
            if nodes[xp].tree.left == Some(x) {
                x = xp;
                root = rotate_right(nodes, root, x);
                xp = nodes[x].tree.parent.unwrap_or(x);
                xpp = nodes[xp].tree.parent.unwrap_or(xp);
            }
            set_red(nodes, xp, false);
            if xpp != xp {
                set_red(nodes, xpp, true);
                root = rotate_left(nodes, root, xpp);
            }
        }
    }
}

/// Restores the red-black properties after a black node was spliced out;
/// `x` is the node that took its place (or the removed node itself while
/// still linked, when it had no children).
pub(crate) fn balance_deletion<K, V>(nodes: &mut Arena<K, V>, mut root: NodeKey, mut x: NodeKey) -> NodeKey {
    loop {
        if x == root {
            return root;
        }
        let Some(mut xp) = nodes[x].tree.parent else {
            set_red(nodes, x, false);
            return x;
        };
        if nodes[x].tree.red {
            set_red(nodes, x, false);
            return root;
        }
        if nodes[xp].tree.left == Some(x) {
            let mut xpr = nodes[xp].tree.right;
            if let Some(s) = xpr.filter(|&s| nodes[s].tree.red) {
                set_red(nodes, s, false);
                set_red(nodes, xp, true);
                root = rotate_left(nodes, root, xp);
                xp = match nodes[x].tree.parent {
                    Some(p) => p,
                    None => return root,
                };
                xpr = nodes[xp].tree.right;
            }
            let Some(s) = xpr else {
                x = xp;
                continue;
            };
            let sl = nodes[s].tree.left;
            let sr = nodes[s].tree.right;
            if !is_red(nodes, sr) && !is_red(nodes, sl) {
                set_red(nodes, s, true);
                x = xp;
                continue;
            }
            let mut s = s;
            if !is_red(nodes, sr) {
                if let Some(sl) = sl {
                    set_red(nodes, sl, false);
                }
                set_red(nodes, s, true);
                root = rotate_right(nodes, root, s);
                xp = match nodes[x].tree.parent {
                    Some(p) => p,
                    None => return root,
                };
                match nodes[xp].tree.right {
                    Some(ns) => s = ns,
                    None => {
                        x = root;
                        continue;
                    }
                }
            }
            let parent_red = nodes[xp].tree.red;
            set_red(nodes, s, parent_red);
            if let Some(sr) = nodes[s].tree.right {
                set_red(nodes, sr, false);
            }
            set_red(nodes, xp, false);
            root = rotate_left(nodes, root, xp);
            x = root;
        } else {
            let mut xpl = nodes[xp].tree.left;
            if let Some(s) = xpl.filter(|&s| nodes[s].tree.red) {
                set_red(nodes, s, false);
                set_red(nodes, xp, true);
                root = rotate_right(nodes, root, xp);
                xp = match nodes[x].tree.parent {
                    Some(p) => p,
                    None => return root,
                };
                xpl = nodes[xp].tree.left;
            }
            let Some(s) = xpl else {
                x = xp;
                continue;
            };
            let sl = nodes[s].tree.left;
            let sr = nodes[s].tree.right;
            if !is_red(nodes, sl) && !is_red(nodes, sr) {
                set_red(nodes, s, true);
                x = xp;
                continue;
            }
            let mut s = s;
            if !is_red(nodes, sl) {
                if let Some(sr) = sr {
                    set_red(nodes, sr, false);
                }
                set_red(nodes, s, true);
                root = rotate_left(nodes, root, s);
                xp = match nodes[x].tree.parent {
                    Some(p) => p,
                    None => return root,
                };
                match nodes[xp].tree.left {
                    Some(ns) => s = ns,
                    None => {
                        x = root;
                        continue;
                    }
                }
            }
            let parent_red = nodes[xp].tree.red;
            set_red(nodes, s, parent_red);
            if let Some(sl) = nodes[s].tree.left {
                set_red(nodes, sl, false);
            }
            set_red(nodes, xp, false);
            root = rotate_right(nodes, root, xp);
            x = root;
        }
    }
}

/// Verifies the subtree under `t`: parent/child and list links agree, hashes
/// are ordered, no red node has a red child, and every path down carries the
/// same number of black nodes. Returns that black height.
///
/// Walks the whole subtree; meant for assertions and tests.
pub(crate) fn check_invariants<K, V>(nodes: &Arena<K, V>, t: NodeKey) -> Result<usize, &'static str> {
    check_subtree(nodes, t, None, None)
}

fn check_subtree<K, V>(
    nodes: &Arena<K, V>,
    t: NodeKey,
    lo: Option<u32>,
    hi: Option<u32>,
) -> Result<usize, &'static str> {
    let n = nodes.get(t).ok_or("dangling tree link")?;
    let links = n.tree;
    if let Some(tb) = links.prev {
        if nodes.get(tb).and_then(|b| b.next) != Some(t) {
            return Err("prev.next does not point back");
        }
    }
    if let Some(tn) = n.next {
        if nodes.get(tn).and_then(|x| x.tree.prev) != Some(t) {
            return Err("next.prev does not point back");
        }
    }
    if let Some(tp) = links.parent {
        let p = nodes.get(tp).ok_or("dangling parent")?;
        if p.tree.left != Some(t) && p.tree.right != Some(t) {
            return Err("parent does not own child");
        }
    }
    if lo.map_or(false, |lo| n.hash < lo) || hi.map_or(false, |hi| n.hash > hi) {
        return Err("hash out of order");
    }
    let mut heights = [0usize; 2];
    for (slot, child) in [links.left, links.right].into_iter().enumerate() {
        let Some(c) = child else {
            continue;
        };
        let cn = nodes.get(c).ok_or("dangling child")?;
        if cn.tree.parent != Some(t) {
            return Err("child.parent mismatch");
        }
        if links.red && cn.tree.red {
            return Err("red node with red child");
        }
        heights[slot] = if slot == 0 {
            check_subtree(nodes, c, lo, Some(n.hash))?
        } else {
            check_subtree(nodes, c, Some(n.hash), hi)?
        };
    }
    if heights[0] != heights[1] {
        return Err("black height mismatch");
    }
    Ok(heights[0] + usize::from(!links.red))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Node;
    use core::cmp::Ordering;

    // Plain binary-search-tree insert by hash, then rebalance.
    fn insert(nodes: &mut Arena<(), ()>, root: Option<NodeKey>, hash: u32) -> (NodeKey, NodeKey) {
        let x = nodes.insert(Node::new(hash, (), (), None));
        let Some(root) = root else {
            nodes[x].tree.red = false;
            return (x, x);
        };
        let mut p = root;
        loop {
            let go_left = hash.cmp(&nodes[p].hash) != Ordering::Greater;
            let next = if go_left { nodes[p].tree.left } else { nodes[p].tree.right };
            match next {
                Some(n) => p = n,
                None => {
                    nodes[x].tree.parent = Some(p);
                    if go_left {
                        nodes[p].tree.left = Some(x);
                    } else {
                        nodes[p].tree.right = Some(x);
                    }
                    return (balance_insertion(nodes, root, x), x);
                }
            }
        }
    }

    fn inorder(nodes: &Arena<(), ()>, t: Option<NodeKey>, out: &mut Vec<u32>) {
        if let Some(t) = t {
            inorder(nodes, nodes[t].tree.left, out);
            out.push(nodes[t].hash);
            inorder(nodes, nodes[t].tree.right, out);
        }
    }

    #[test]
    fn ascending_inserts_stay_balanced() {
        let mut nodes: Arena<(), ()> = Arena::with_key();
        let mut root = None;
        for h in 1..=9u32 {
            root = Some(insert(&mut nodes, root, h).0);
            check_invariants(&nodes, root.unwrap()).unwrap();
        }
        let root = root.unwrap();
        // 4B(2R(1B,3B),6R(5B,8B(7R,9R)))
        assert_eq!(nodes[root].hash, 4);
        assert!(!nodes[root].tree.red);
        let l = nodes[root].tree.left.unwrap();
        let r = nodes[root].tree.right.unwrap();
        assert_eq!((nodes[l].hash, nodes[l].tree.red), (2, true));
        assert_eq!((nodes[r].hash, nodes[r].tree.red), (6, true));
        let mut seen = Vec::new();
        inorder(&nodes, Some(root), &mut seen);
        assert_eq!(seen, (1..=9).collect::<Vec<_>>());
    }

    #[test]
    fn rotations_preserve_order_and_update_root() {
        let mut nodes: Arena<(), ()> = Arena::with_key();
        let mut root = None;
        for h in [2u32, 1, 3] {
            root = Some(insert(&mut nodes, root, h).0);
        }
        let root = root.unwrap();
        let new_root = rotate_left(&mut nodes, root, root);
        assert_eq!(nodes[new_root].hash, 3);
        assert_eq!(nodes[new_root].tree.parent, None);
        assert_eq!(nodes[new_root].tree.left, Some(root));
        let back = rotate_right(&mut nodes, new_root, new_root);
        assert_eq!(back, root);
        let mut seen = Vec::new();
        inorder(&nodes, Some(back), &mut seen);
        assert_eq!(seen, vec![1, 2, 3]);
    }

    #[test]
    fn rotation_without_child_is_noop() {
        let mut nodes: Arena<(), ()> = Arena::with_key();
        let (root, _) = insert(&mut nodes, None, 1);
        assert_eq!(rotate_left(&mut nodes, root, root), root);
        assert_eq!(rotate_right(&mut nodes, root, root), root);
    }

    #[test]
    fn checker_rejects_red_red_and_black_height() {
        let mut nodes: Arena<(), ()> = Arena::with_key();
        let mut root = None;
        for h in [2u32, 1, 3] {
            root = Some(insert(&mut nodes, root, h).0);
        }
        let root = root.unwrap();
        let l = nodes[root].tree.left.unwrap();
        nodes[root].tree.red = true;
        assert_eq!(check_invariants(&nodes, root), Err("red node with red child"));
        nodes[root].tree.red = false;
        nodes[l].tree.red = false;
        assert_eq!(check_invariants(&nodes, root), Err("black height mismatch"));
    }

    #[test]
    fn checker_rejects_misordered_hashes() {
        let mut nodes: Arena<(), ()> = Arena::with_key();
        let mut root = None;
        for h in [2u32, 1, 3] {
            root = Some(insert(&mut nodes, root, h).0);
        }
        let root = root.unwrap();
        let l = nodes[root].tree.left.unwrap();
        nodes[l].hash = 7;
        assert_eq!(check_invariants(&nodes, root), Err("hash out of order"));
    }

    #[test]
    fn checker_rejects_one_sided_list_links() {
        let mut nodes: Arena<(), ()> = Arena::with_key();
        let mut root = None;
        for h in [2u32, 1, 3] {
            root = Some(insert(&mut nodes, root, h).0);
        }
        let root = root.unwrap();
        let l = nodes[root].tree.left.unwrap();
        let r = nodes[root].tree.right.unwrap();
        nodes[root].tree.prev = Some(l);
        assert_eq!(check_invariants(&nodes, root), Err("prev.next does not point back"));
        nodes[l].next = Some(root);
        assert!(check_invariants(&nodes, root).is_ok());
        nodes[root].next = Some(r);
        assert_eq!(check_invariants(&nodes, root), Err("next.prev does not point back"));
        nodes[r].tree.prev = Some(root);
        assert!(check_invariants(&nodes, root).is_ok());
    }

    #[test]
    fn checker_rejects_parent_that_lost_its_child() {
        let mut nodes: Arena<(), ()> = Arena::with_key();
        let mut root = None;
        for h in [2u32, 1, 3] {
            root = Some(insert(&mut nodes, root, h).0);
        }
        let root = root.unwrap();
        let l = nodes[root].tree.left.unwrap();
        nodes[root].tree.left = None;
        assert_eq!(check_invariants(&nodes, l), Err("parent does not own child"));
    }
}
