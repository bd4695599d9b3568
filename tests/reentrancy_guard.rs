#![cfg(test)]

// A key whose `Eq` calls back into the map that is comparing it. Debug
// builds must panic at the nested entry instead of reading the map while
// it is mid-operation.

use hybrid_hashmap::HybridHashMap;
use std::cell::Cell;
use std::hash::{BuildHasher, Hash, Hasher};

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

type Map = HybridHashMap<Nosy, u32, ConstBuild>;

thread_local! {
    static MAP: Cell<*const Map> = const { Cell::new(std::ptr::null()) };
}

#[derive(Debug, Clone, Hash)]
struct Nosy(u32);

impl PartialEq for Nosy {
    fn eq(&self, other: &Self) -> bool {
        let m = MAP.with(|c| c.get());
        if !m.is_null() {
            // Only shared borrows of the map are live here.
            let _ = unsafe { &*m }.len();
            let _ = unsafe { &*m }.contains_key(&Nosy(u32::MAX));
        }
        self.0 == other.0
    }
}
impl Eq for Nosy {}

fn filled() -> Map {
    let mut m = Map::with_hasher(ConstBuild);
    m.insert(Nosy(1), 1);
    m.insert(Nosy(2), 2);
    m
}

#[cfg(debug_assertions)]
#[test]
fn reentrant_lookup_panics_in_debug() {
    let m = filled();
    MAP.with(|c| c.set(&m));
    let res = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| m.get(&Nosy(2)).copied()));
    MAP.with(|c| c.set(std::ptr::null()));
    assert!(res.is_err(), "expected reentrancy to panic in debug builds");
    // The guard was released while unwinding.
    assert_eq!(m.get(&Nosy(2)), Some(&2));
}

#[test]
fn sequential_calls_are_ok() {
    let m = filled();
    for _ in 0..3 {
        assert_eq!(m.get(&Nosy(1)), Some(&1));
    }
    assert!(!m.contains_key(&Nosy(3)));
}
