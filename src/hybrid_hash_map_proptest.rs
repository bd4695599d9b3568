#![cfg(test)]

// Property tests for HybridHashMap kept inside the crate so they can check
// bucket and tree-bin structure after every operation.

use crate::hashing::{index_for, MIN_TREEIFY_CAPACITY};
use crate::node::{Arena, Bin, NodeKey, TreeLinks};
use crate::order::Natural;
use crate::raw_table::RawTable;
use crate::rbtree::check_invariants;
use crate::tree_bin;
use crate::{Handle, HybridHashMap};
use hashbrown::HashMap;
use proptest::prelude::*;
use std::hash::{BuildHasher, Hasher};

// Hashers that make bucket placement predictable.

/// Raw hash = the key itself (for keys written as one integer).
#[derive(Clone, Default)]
struct IdentityBuild;
#[derive(Default)]
struct IdentityHasher(u64);
impl BuildHasher for IdentityBuild {
    type Hasher = IdentityHasher;
    fn build_hasher(&self) -> IdentityHasher {
        IdentityHasher(0)
    }
}
impl Hasher for IdentityHasher {
    fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.0 = (self.0 << 8) | b as u64;
        }
    }
    fn write_u16(&mut self, n: u16) {
        self.0 = n as u64;
    }
    fn write_u32(&mut self, n: u32) {
        self.0 = n as u64;
    }
    fn finish(&self) -> u64 {
        self.0
    }
}

/// Every key hashes to 0.
#[derive(Clone, Default)]
struct ConstBuild;
struct ConstHasher;
impl BuildHasher for ConstBuild {
    type Hasher = ConstHasher;
    fn build_hasher(&self) -> ConstHasher {
        ConstHasher
    }
}
impl Hasher for ConstHasher {
    fn write(&mut self, _bytes: &[u8]) {}
    fn finish(&self) -> u64 {
        0
    }
}

/// Three hash classes, 256 apart: they share bucket 0 until the table
/// reaches 512 buckets, so trees form and are later split.
#[derive(Clone, Default)]
struct ClassBuild;
#[derive(Default)]
struct ClassHasher(u64);
impl BuildHasher for ClassBuild {
    type Hasher = ClassHasher;
    fn build_hasher(&self) -> ClassHasher {
        ClassHasher(0)
    }
}
impl Hasher for ClassHasher {
    fn write(&mut self, _bytes: &[u8]) {}
    fn write_u16(&mut self, n: u16) {
        self.0 = ((n % 3) as u64) << 8;
    }
    fn finish(&self) -> u64 {
        self.0
    }
}

fn count_tree<K, V>(nodes: &Arena<K, V>, t: Option<NodeKey>) -> usize {
    match t {
        None => 0,
        Some(x) => 1 + count_tree(nodes, nodes[x].tree.left) + count_tree(nodes, nodes[x].tree.right),
    }
}

/// Structural check of the whole table.
fn check_table<K, V>(t: &RawTable<K, V>) -> Result<(), String> {
    let cap = t.bins.len();
    if cap != 0 && !cap.is_power_of_two() {
        return Err(format!("table length {cap} is not a power of two"));
    }
    if t.len() > t.threshold.saturating_add(1) {
        return Err(format!("size {} above threshold {}", t.len(), t.threshold));
    }
    let mut total = 0;
    for (i, bin) in t.bins.iter().enumerate() {
        let (head, tree) = match *bin {
            Bin::Empty => continue,
            Bin::Chain(h) => (h, false),
            Bin::Tree(h) => (h, true),
        };
        let mut listed = 0;
        let mut cur = Some(head);
        while let Some(x) = cur {
            let n = t.nodes.get(x).ok_or_else(|| format!("bucket {i}: dangling link"))?;
            if index_for(n.hash, cap) != i {
                return Err(format!("bucket {i}: node with hash {} misplaced", n.hash));
            }
            if !tree && n.tree != TreeLinks::default() {
                return Err(format!("bucket {i}: chain node keeps tree links"));
            }
            listed += 1;
            cur = n.next;
        }
        if tree {
            if cap < MIN_TREEIFY_CAPACITY {
                return Err(format!("bucket {i}: tree bin in a table of {cap}"));
            }
            if t.nodes[head].tree.prev.is_some() {
                return Err(format!("bucket {i}: list head has a predecessor"));
            }
            let root = tree_bin::root(&t.nodes, head);
            check_invariants(&t.nodes, root).map_err(|e| format!("bucket {i}: {e}"))?;
            let in_tree = count_tree(&t.nodes, Some(root));
            if in_tree != listed {
                return Err(format!("bucket {i}: {listed} listed but {in_tree} in tree"));
            }
        }
        total += listed;
    }
    if total != t.len() {
        return Err(format!("{total} reachable of {} stored", t.len()));
    }
    Ok(())
}

fn chain_keys<K: Copy, V, S, O>(m: &HybridHashMap<K, V, S, O>, index: usize) -> Vec<K> {
    let mut out = Vec::new();
    let mut cur = m.table.bins[index].head();
    while let Some(x) = cur {
        out.push(m.table.nodes[x].key);
        cur = m.table.nodes[x].next;
    }
    out
}

#[derive(Clone, Debug)]
enum Op {
    Insert(u16, i32),
    PutIfAbsent(u16, i32),
    Remove(u16),
    RemoveHandle(u16),
    ComputeIfAbsent(u16, i32),
    Compute(u16, Option<i32>),
    Merge(u16, i32),
    Replace(u16, i32),
    Get(u16),
    Retain(u8),
    CursorRemove(u8),
    Clear,
}

fn arb_ops(keys: u16) -> impl Strategy<Value = Vec<Op>> {
    let k = 0..keys;
    let op = prop_oneof![
        6 => (k.clone(), any::<i32>()).prop_map(|(k, v)| Op::Insert(k, v)),
        1 => (k.clone(), any::<i32>()).prop_map(|(k, v)| Op::PutIfAbsent(k, v)),
        3 => k.clone().prop_map(Op::Remove),
        1 => k.clone().prop_map(Op::RemoveHandle),
        2 => (k.clone(), any::<i32>()).prop_map(|(k, v)| Op::ComputeIfAbsent(k, v)),
        2 => (k.clone(), proptest::option::of(any::<i32>())).prop_map(|(k, v)| Op::Compute(k, v)),
        2 => (k.clone(), -3i32..3).prop_map(|(k, v)| Op::Merge(k, v)),
        1 => (k.clone(), any::<i32>()).prop_map(|(k, v)| Op::Replace(k, v)),
        2 => k.clone().prop_map(Op::Get),
        1 => (2u8..5).prop_map(Op::Retain),
        1 => (2u8..5).prop_map(Op::CursorRemove),
        1 => Just(Op::Clear),
    ];
    proptest::collection::vec(op, 1..200)
}

// Applies `ops` to `sut` and to a hashbrown model, checking structure,
// size and contents after every step. Handles are tracked per key and
// must keep resolving until their entry goes away.
fn run<S, O>(mut sut: HybridHashMap<u16, i32, S, O>, ops: Vec<Op>) -> Result<(), TestCaseError>
where
    S: BuildHasher,
    O: crate::KeyOrder<u16>,
{
    let mut model: HashMap<u16, i32> = HashMap::new();
    let mut handles: HashMap<u16, Handle> = HashMap::new();
    for op in ops {
        match op {
            Op::Insert(k, v) => {
                prop_assert_eq!(sut.insert(k, v), model.insert(k, v));
            }
            Op::PutIfAbsent(k, v) => {
                let got = sut.put_if_absent(k, v).map(|v| *v);
                let want = model.get(&k).copied();
                if want.is_none() {
                    model.insert(k, v);
                }
                prop_assert_eq!(got, want);
            }
            Op::Remove(k) => {
                prop_assert_eq!(sut.remove(&k), model.remove(&k));
            }
            Op::RemoveHandle(k) => match sut.find(&k) {
                Some(h) => {
                    prop_assert_eq!(sut.remove_handle(h), model.remove_entry(&k));
                    prop_assert!(h.value(&sut).is_none());
                }
                None => prop_assert!(!model.contains_key(&k)),
            },
            Op::ComputeIfAbsent(k, v) => {
                let mut calls = 0;
                let got = sut
                    .compute_if_absent(k, |_| {
                        calls += 1;
                        Some(v)
                    })
                    .map(|v| *v);
                let present = model.contains_key(&k);
                prop_assert_eq!(calls, usize::from(!present));
                let want = *model.entry(k).or_insert(v);
                prop_assert_eq!(got, Some(want));
            }
            Op::Compute(k, v) => {
                let before = model.get(&k).copied();
                let got = sut
                    .compute(k, |_, cur| {
                        assert_eq!(cur.copied(), before);
                        v
                    })
                    .map(|v| *v);
                match v {
                    Some(v) => {
                        model.insert(k, v);
                    }
                    None => {
                        model.remove(&k);
                    }
                }
                prop_assert_eq!(got, v);
            }
            Op::Merge(k, v) => {
                // A zero sum removes the entry.
                let f = |old: &i32, new: i32| Some(old.wrapping_add(new)).filter(|s| *s != 0);
                let got = sut.merge(k, v, f).map(|v| *v);
                let want = match model.get(&k) {
                    None => Some(v),
                    Some(old) => f(old, v),
                };
                match want {
                    Some(w) => {
                        model.insert(k, w);
                    }
                    None => {
                        model.remove(&k);
                    }
                }
                prop_assert_eq!(got, want);
            }
            Op::Replace(k, v) => {
                let want = model.get_mut(&k).map(|slot| std::mem::replace(slot, v));
                prop_assert_eq!(sut.replace(&k, v), want);
            }
            Op::Get(k) => {
                prop_assert_eq!(sut.get(&k), model.get(&k));
                prop_assert_eq!(sut.contains_key(&k), model.contains_key(&k));
            }
            Op::Retain(m) => {
                let m = u16::from(m);
                sut.retain(|k, _| k % m != 0);
                model.retain(|k, _| k % m != 0);
            }
            Op::CursorRemove(m) => {
                let m = u16::from(m);
                let mut c = sut.cursor();
                let mut seen = 0;
                while let Some(entry) = c.next(&sut) {
                    let (k, _) = entry.map_err(|e| TestCaseError::fail(e.to_string()))?;
                    seen += 1;
                    if k % m == 1 {
                        let (k, v) = c.remove(&mut sut).map_err(|e| TestCaseError::fail(e.to_string()))?;
                        prop_assert_eq!(model.remove(&k), Some(v));
                    }
                }
                prop_assert!(seen >= sut.len());
            }
            Op::Clear => {
                sut.clear();
                model.clear();
            }
        }

        check_table(&sut.table).map_err(TestCaseError::fail)?;
        prop_assert_eq!(sut.len(), model.len());
        for (k, v) in &model {
            prop_assert_eq!(sut.get(k), Some(v));
        }
        handles.retain(|k, _| model.contains_key(k));
        for (&k, &v) in &model {
            let h = *handles.entry(k).or_insert_with(|| sut.find(&k).expect("present"));
            prop_assert_eq!(h.key(&sut), Some(&k));
            prop_assert_eq!(h.value(&sut), Some(&v));
        }
    }
    let mut drained: Vec<(u16, i32)> = sut.drain().collect();
    drained.sort_unstable();
    let mut expected: Vec<(u16, i32)> = model.into_iter().collect();
    expected.sort_unstable();
    prop_assert_eq!(drained, expected);
    check_table(&sut.table).map_err(TestCaseError::fail)?;
    Ok(())
}

// Property: state-machine equivalence against hashbrown::HashMap under the
// default hasher. Buckets stay well formed after every operation.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine(ops in arb_ops(64)) {
        run(HybridHashMap::new(), ops)?;
    }
}

// Property: every key in one bucket with one hash. Exercises treeify at 64
// slots, the identity tie-break and sparse-shape untreeify.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine_constant_hash(ops in arb_ops(48)) {
        let sut: HybridHashMap<u16, i32, ConstBuild> = HybridHashMap::with_hasher(ConstBuild);
        run(sut, ops)?;
    }
}

// Property: three hash classes sharing a bucket until 512 slots, with a
// natural order on keys. Exercises ordered tree descent and tree splits.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine_hash_classes(ops in arb_ops(400)) {
        let sut: HybridHashMap<u16, i32, ClassBuild, Natural> =
            HybridHashMap::with_hasher_and_order(ClassBuild, Natural);
        run(sut, ops)?;
    }
}

#[test]
fn identity_hash_grows_on_thirteenth_key() {
    let mut m: HybridHashMap<u32, u32, IdentityBuild> = HybridHashMap::with_capacity_and_hasher(16, IdentityBuild);
    for k in 0..12 {
        m.insert(k, k);
    }
    assert_eq!(m.capacity(), 16);
    assert_eq!(m.table.threshold, 12);
    m.insert(12, 12);
    assert_eq!(m.capacity(), 32);
    assert_eq!(m.table.threshold, 24);
    for k in 0..13 {
        assert_eq!(m.get(&k), Some(&k));
    }
    check_table(&m.table).unwrap();
}

#[test]
fn colliding_bucket_treeifies_and_returns_to_chain() {
    let keys: Vec<u32> = (0..9).map(|i| 3 + 64 * i).collect();
    let mut m: HybridHashMap<u32, u32, IdentityBuild> = HybridHashMap::with_capacity_and_hasher(64, IdentityBuild);
    for &k in &keys[..8] {
        m.insert(k, k);
    }
    assert!(matches!(m.table.bins[3], Bin::Chain(_)));
    m.insert(keys[8], keys[8]);
    assert!(matches!(m.table.bins[3], Bin::Tree(_)));
    assert_eq!(m.capacity(), 64);
    for k in &keys {
        assert_eq!(m.get(k), Some(k));
    }
    check_table(&m.table).unwrap();

    for k in &keys[..4] {
        assert_eq!(m.remove(k), Some(*k));
        check_table(&m.table).unwrap();
    }
    assert!(matches!(m.table.bins[3], Bin::Chain(_)));
    assert_eq!(m.len(), 5);
    for k in &keys[4..] {
        assert_eq!(m.get(k), Some(k));
    }
}

#[test]
fn short_tree_bin_becomes_chain_on_split() {
    let mut m: HybridHashMap<u32, u32, IdentityBuild> = HybridHashMap::with_capacity_and_hasher(64, IdentityBuild);
    // 3 + 64i: even i stay at 3 after doubling, odd i move to 67.
    for i in 0..12 {
        m.insert(3 + 64 * i, i);
    }
    assert!(matches!(m.table.bins[3], Bin::Tree(_)));
    m.table.resize(&m.order);
    assert_eq!(m.capacity(), 128);
    let mut lo = chain_keys(&m, 3);
    let mut hi = chain_keys(&m, 67);
    lo.sort_unstable();
    hi.sort_unstable();
    assert_eq!(lo, vec![3, 131, 259, 387, 515, 643]);
    assert_eq!(hi, vec![67, 195, 323, 451, 579, 707]);
    assert!(matches!(m.table.bins[3], Bin::Chain(_)));
    assert!(matches!(m.table.bins[67], Bin::Chain(_)));
    check_table(&m.table).unwrap();
}

#[test]
fn compute_family_prepends_while_insert_appends() {
    let mut m: HybridHashMap<u32, u32, IdentityBuild> = HybridHashMap::with_capacity_and_hasher(16, IdentityBuild);
    m.insert(3, 0);
    m.insert(19, 0);
    m.compute(35, |_, _| Some(0));
    m.compute_if_absent(51, |_| Some(0));
    m.merge(67, 0, |_, v| Some(v));
    m.insert(83, 0);
    assert_eq!(chain_keys(&m, 3), vec![67, 51, 35, 3, 19, 83]);
}

#[test]
fn compute_grows_before_lookup_not_after() {
    let mut m: HybridHashMap<u32, u32, IdentityBuild> = HybridHashMap::with_capacity_and_hasher(16, IdentityBuild);
    for k in 0..12 {
        m.compute_if_absent(k, |k| Some(*k));
    }
    m.compute_if_absent(12, |k| Some(*k));
    // Thirteen entries over a threshold of twelve, still 16 buckets.
    assert_eq!(m.capacity(), 16);
    m.compute_if_absent(13, |k| Some(*k));
    assert_eq!(m.capacity(), 32);
    check_table(&m.table).unwrap();
}

#[test]
fn handles_survive_treeify_and_resize() {
    let mut m: HybridHashMap<u32, u32, ConstBuild> = HybridHashMap::with_hasher(ConstBuild);
    let mut hs = Vec::new();
    for k in 0..40 {
        m.insert(k, k * 10);
        hs.push(m.find(&k).unwrap());
    }
    assert_eq!(m.capacity(), 64);
    assert!(matches!(m.table.bins[0], Bin::Tree(_)));
    for (k, h) in hs.iter().enumerate() {
        assert_eq!(h.key(&m), Some(&(k as u32)));
        assert_eq!(h.value(&m), Some(&(k as u32 * 10)));
    }
    m.remove(&7);
    assert!(hs[7].value(&m).is_none());
    *hs[8].value_mut(&mut m).unwrap() += 1;
    assert_eq!(m.get(&8), Some(&81));
    check_table(&m.table).unwrap();
}

#[test]
fn cursor_removal_keeps_tree_shape_valid() {
    let mut m: HybridHashMap<u32, u32, ConstBuild> = HybridHashMap::with_hasher(ConstBuild);
    for k in 0..30 {
        m.insert(k, k);
    }
    assert!(matches!(m.table.bins[0], Bin::Tree(_)));
    let mut c = m.cursor();
    let mut seen = 0;
    while let Some(entry) = c.next(&m) {
        entry.unwrap();
        seen += 1;
        c.remove(&mut m).unwrap();
        check_table(&m.table).unwrap();
    }
    assert_eq!(seen, 30);
    assert!(m.is_empty());
    assert_eq!(m.table.bins[0], Bin::Empty);
}

#[test]
fn clear_keeps_table_and_tree_free_buckets() {
    let mut m: HybridHashMap<u32, u32, ConstBuild> = HybridHashMap::with_hasher(ConstBuild);
    for k in 0..20 {
        m.insert(k, k);
    }
    m.clear();
    assert_eq!(m.capacity(), 64);
    assert!(m.table.bins.iter().all(|b| *b == Bin::Empty));
    m.insert(1, 1);
    assert_eq!(m.get(&1), Some(&1));
    check_table(&m.table).unwrap();
}

#[test]
fn forgotten_drain_leaves_map_empty_and_consistent() {
    let mut m: HybridHashMap<u32, u32> = (0..10).map(|k| (k, k)).collect();
    let h = m.find(&3).unwrap();
    std::mem::forget(m.drain());
    assert_eq!(m.len(), 0);
    assert_eq!(m.iter_mut().count(), 0);
    check_table(&m.table).unwrap();
    assert!(h.value(&m).is_none());
    assert_eq!(m.insert(3, 99), None);
    assert_eq!(m.len(), 1);
    assert!(h.value(&m).is_none());
    check_table(&m.table).unwrap();
}
