// HybridHashMap unit test suite (public API).
//
// Each test documents what behavior is being verified. The core
// properties exercised:
// - Map semantics: insert/replace/remove and the compute family agree
//   with what a plain map would do.
// - Growth: capacity doubles once size passes capacity * load factor and
//   every key stays reachable.
// - Collisions: heavily colliding keys stay reachable through treeify,
//   resize and removal.
// - Ordering: new keys from `compute`-style calls land before keys from
//   `insert` within one bucket.
// - Fail-fast: a cursor notices structural changes made behind its back.
use hybrid_hashmap::{Error, HybridHashMap, Natural, OrderFn};
use std::cmp::Ordering;
use std::hash::{BuildHasher, Hash, Hasher};

// Raw hash equals the key for integer keys.
#[derive(Clone, Default)]
struct IdentityBuild;
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
    fn write_u32(&mut self, n: u32) {
        self.0 = n as u64;
    }
    fn finish(&self) -> u64 {
        self.0
    }
}

// Keys whose hash ignores everything but `bucket`: many distinct keys with
// one hash.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
struct Colliding {
    bucket: u32,
    id: u32,
}
impl Hash for Colliding {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.bucket.hash(state);
    }
}

fn c(id: u32) -> Colliding {
    Colliding { bucket: 7, id }
}

// Test: basic insert/get/replace/remove.
// Verifies: insert returns the displaced value; remove returns the value
// and the key disappears.
#[test]
fn insert_get_remove() {
    let mut m = HybridHashMap::new();
    assert!(m.is_empty());
    assert_eq!(m.insert("a".to_string(), 1), None);
    assert_eq!(m.insert("b".to_string(), 2), None);
    assert_eq!(m.insert("a".to_string(), 3), Some(1));
    assert_eq!(m.len(), 2);
    assert_eq!(m.get("a"), Some(&3));
    assert_eq!(m["b"], 2);
    assert_eq!(m.get_key_value("b"), Some((&"b".to_string(), &2)));
    assert!(m.contains_key("b"));
    assert!(m.contains_value(&3));
    assert!(!m.contains_value(&1));

    *m.get_mut("b").unwrap() += 10;
    assert_eq!(m.get("b"), Some(&12));

    assert_eq!(m.remove("a"), Some(3));
    assert_eq!(m.remove("a"), None);
    assert_eq!(m.remove_entry("b"), Some(("b".to_string(), 12)));
    assert!(m.is_empty());
}

// Test: construction arguments.
// Verifies: non-positive and non-finite load factors are rejected;
// capacities are rounded up to a power of two and clamped.
#[test]
fn construction_validates_load_factor() {
    for lf in [0.0, -1.0, f32::NAN, f32::INFINITY] {
        let r = HybridHashMap::<u32, u32>::with_capacity_and_load_factor(16, lf);
        assert!(matches!(r, Err(Error::InvalidLoadFactor(_))));
    }
    let m = HybridHashMap::<u32, u32>::with_capacity_and_load_factor(10, 0.5).unwrap();
    assert_eq!(m.capacity(), 16);
    assert_eq!(m.load_factor(), 0.5);
    assert_eq!(HybridHashMap::<u32, u32>::new().capacity(), 16);
    assert_eq!(HybridHashMap::<u32, u32>::with_capacity(0).capacity(), 1);
    assert_eq!(HybridHashMap::<u32, u32>::with_capacity(usize::MAX).capacity(), 1 << 30);
}

// Test: growth at the threshold with an identity hash.
// Verifies: 12 keys fit in 16 buckets; the 13th doubles to 32 and every
// key is still found.
#[test]
fn grows_once_past_threshold() {
    let mut m: HybridHashMap<u32, u32, IdentityBuild> = HybridHashMap::with_capacity_and_hasher(16, IdentityBuild);
    for k in 0..12 {
        m.insert(k, k);
    }
    assert_eq!(m.capacity(), 16);
    m.insert(12, 12);
    assert_eq!(m.capacity(), 32);
    assert!((0..13).all(|k| m.get(&k) == Some(&k)));
}

// Test: a small load factor grows earlier.
#[test]
fn custom_load_factor_controls_growth() {
    let mut m = HybridHashMap::with_config(8, 0.5, IdentityBuild, hybrid_hashmap::Unordered).unwrap();
    for k in 0..4u32 {
        m.insert(k, ());
    }
    assert_eq!(m.capacity(), 8);
    m.insert(4, ());
    assert_eq!(m.capacity(), 16);
}

// Test: many keys sharing one hash.
// Verifies: all keys remain reachable across treeify and growth, and as
// they are removed one by one.
#[test]
fn colliding_keys_stay_reachable() {
    let mut m = HybridHashMap::new();
    for id in 0..200 {
        assert_eq!(m.insert(c(id), id), None);
    }
    assert_eq!(m.len(), 200);
    for id in 0..200 {
        assert_eq!(m.get(&c(id)), Some(&id));
    }
    assert_eq!(m.get(&c(1000)), None);
    for id in (0..200).step_by(2) {
        assert_eq!(m.remove(&c(id)), Some(id));
    }
    for id in 0..200 {
        assert_eq!(m.get(&c(id)), if id % 2 == 0 { None } else { Some(&id) });
    }
}

// Test: the same under a natural and a function order.
#[test]
fn colliding_keys_with_key_order() {
    let mut natural = HybridHashMap::with_order(Natural);
    let mut by_fn = HybridHashMap::with_order(OrderFn(|a: &Colliding, b: &Colliding| b.id.cmp(&a.id)));
    for id in (0..100).rev() {
        natural.insert(c(id), id);
        by_fn.insert(c(id), id);
    }
    for id in 0..100 {
        assert_eq!(natural.get(&c(id)), Some(&id));
        assert_eq!(by_fn.get(&c(id)), Some(&id));
    }
    for id in 0..90 {
        assert_eq!(natural.remove(&c(id)), Some(id));
        assert_eq!(by_fn.remove(&c(id)), Some(id));
    }
    assert_eq!(natural.len(), 10);
    let mut a: Vec<u32> = natural.values().copied().collect();
    let mut b: Vec<u32> = by_fn.values().copied().collect();
    a.sort_unstable();
    b.sort_unstable();
    assert_eq!(a, (90..100).collect::<Vec<_>>());
    assert_eq!(a, b);
}

// Test: head insertion for the compute family versus tail append for
// insert, observed through iteration order of a single bucket.
#[test]
fn compute_prepends_and_insert_appends() {
    let mut m: HybridHashMap<u32, u32, IdentityBuild> = HybridHashMap::with_capacity_and_hasher(16, IdentityBuild);
    m.insert(3, 0);
    m.insert(19, 0);
    m.compute_if_absent(35, |_| Some(0));
    m.insert(51, 0);
    let order: Vec<u32> = m.keys().copied().collect();
    assert_eq!(order, vec![35, 3, 19, 51]);
}

// Test: compute_if_absent.
// Verifies: the function runs only for an absent key and a `None` result
// inserts nothing.
#[test]
fn compute_if_absent_runs_only_when_absent() {
    let mut m = HybridHashMap::new();
    let mut calls = 0;
    assert_eq!(
        m.compute_if_absent("k", |_| {
            calls += 1;
            Some(1)
        }),
        Some(&mut 1)
    );
    assert_eq!(
        m.compute_if_absent("k", |_| {
            calls += 1;
            Some(2)
        }),
        Some(&mut 1)
    );
    assert_eq!(calls, 1);
    assert_eq!(m.compute_if_absent("none", |_| None), None);
    assert!(!m.contains_key("none"));
}

// Test: compute_if_present and compute.
// Verifies: `None` removes, `Some` replaces, absent keys are untouched by
// compute_if_present and inserted by compute.
#[test]
fn compute_and_compute_if_present() {
    let mut m: HybridHashMap<&str, i32> = HybridHashMap::new();
    assert_eq!(m.compute_if_present("k", |_, v| Some(v + 1)), None);
    assert!(m.is_empty());

    assert_eq!(m.compute("k", |_, v| Some(v.map_or(1, |v| v + 1))), Some(&mut 1));
    assert_eq!(m.compute("k", |_, v| Some(v.map_or(1, |v| v + 1))), Some(&mut 2));
    assert_eq!(m.compute_if_present("k", |_, v| Some(v * 10)), Some(&mut 20));
    assert_eq!(m.compute_if_present("k", |_, _| None), None);
    assert!(!m.contains_key("k"));
    assert_eq!(m.compute("gone", |_, _| None), None);
    assert!(m.is_empty());
}

// Test: merge.
#[test]
fn merge_inserts_combines_and_removes() {
    let mut m = HybridHashMap::new();
    for w in "a b a c a b".split(' ') {
        m.merge(w, 1, |old, new| Some(old + new));
    }
    assert_eq!(m.get("a"), Some(&3));
    assert_eq!(m.get("b"), Some(&2));
    assert_eq!(m.merge("c", 1, |_, _| None), None);
    assert!(!m.contains_key("c"));
}

// Test: conditional operations.
#[test]
fn conditional_replace_and_remove() {
    let mut m = HybridHashMap::new();
    assert_eq!(m.put_if_absent(1, "one"), None);
    assert_eq!(m.put_if_absent(1, "uno"), Some(&mut "one"));
    assert_eq!(m.replace(&2, "two"), None);
    assert!(!m.contains_key(&2));
    assert_eq!(m.replace(&1, "eins"), Some("one"));
    assert!(!m.replace_if_eq(&1, &"one", "x"));
    assert!(m.replace_if_eq(&1, &"eins", "ein"));
    assert!(!m.remove_if_eq(&1, &"eins"));
    assert!(m.remove_if_eq(&1, &"ein"));
    assert!(m.is_empty());
}

// Test: bulk operations.
#[test]
fn bulk_operations() {
    let mut m: HybridHashMap<u32, u32> = (0..100).map(|i| (i, i)).collect();
    assert_eq!(m.len(), 100);
    m.extend((100..150).map(|i| (i, i)));
    assert_eq!(m.len(), 150);
    m.replace_all(|k, v| k + v);
    assert!(m.iter().all(|(k, v)| *v == 2 * k));
    m.retain(|k, _| k % 3 == 0);
    assert_eq!(m.len(), 50);
    for v in m.values_mut() {
        *v = 0;
    }
    assert!(m.values().all(|v| *v == 0));
    for (_, v) in m.iter_mut() {
        *v = 1;
    }
    assert_eq!(m.values().sum::<u32>(), 50);
    let mut keys: Vec<u32> = m.keys().copied().collect();
    keys.sort_unstable();
    assert_eq!(keys, (0..150).step_by(3).collect::<Vec<_>>());
}

// Test: clear and drain keep the bucket array.
#[test]
fn clear_and_drain_keep_capacity() {
    let mut m: HybridHashMap<u32, u32> = (0..100).map(|i| (i, i)).collect();
    let cap = m.capacity();
    m.clear();
    assert!(m.is_empty());
    assert_eq!(m.capacity(), cap);
    m.extend((0..10).map(|i| (i, i)));
    let mut drained: Vec<(u32, u32)> = m.drain().collect();
    drained.sort_unstable();
    assert_eq!(drained, (0..10).map(|i| (i, i)).collect::<Vec<_>>());
    assert!(m.is_empty());
    assert_eq!(m.capacity(), cap);
    assert_eq!(m.get(&3), None);
}

// Test: owning iteration, clone, equality and Debug.
#[test]
fn into_iter_clone_eq_debug() {
    let mut m = HybridHashMap::new();
    m.insert(1, "x");
    let copy = m.clone();
    assert_eq!(m, copy);
    m.insert(2, "y");
    assert_ne!(m, copy);
    assert_eq!(format!("{copy:?}"), r#"{1: "x"}"#);
    let mut all: Vec<_> = m.into_iter().collect();
    all.sort_unstable();
    assert_eq!(all, vec![(1, "x"), (2, "y")]);
}

// Test: handles.
// Verifies: a handle resolves across growth and stops resolving once its
// entry is removed, even if the key is inserted again.
#[test]
fn handles_follow_their_entry() {
    let mut m = HybridHashMap::new();
    m.insert(c(0), 0);
    let h = m.find(&c(0)).unwrap();
    for id in 1..100 {
        m.insert(c(id), id);
    }
    assert_eq!(h.key(&m), Some(&c(0)));
    *h.value_mut(&mut m).unwrap() = 42;
    assert_eq!(m.get(&c(0)), Some(&42));
    assert_eq!(m.remove_handle(h), Some((c(0), 42)));
    assert_eq!(m.remove_handle(h), None);
    m.insert(c(0), 1);
    assert!(h.value(&m).is_none());
    assert_ne!(m.find(&c(0)), Some(h));
}

// Test: cursor traversal with removal.
// Verifies: the cursor visits every entry once and removes through itself
// without tripping fail-fast detection.
#[test]
fn cursor_visits_all_and_removes() {
    let mut m: HybridHashMap<u32, u32> = (0..50).map(|i| (i, i)).collect();
    let mut c = m.cursor();
    let mut seen = Vec::new();
    while let Some(entry) = c.next(&m) {
        let (k, _) = entry.unwrap();
        seen.push(*k);
        if k % 2 == 0 {
            c.remove(&mut m).unwrap();
        }
    }
    seen.sort_unstable();
    assert_eq!(seen, (0..50).collect::<Vec<_>>());
    assert_eq!(m.len(), 25);
    assert!(m.keys().all(|k| k % 2 == 1));
}

// Test: cursor fail-fast.
// Verifies: structural changes outside the cursor are reported on the next
// step; value replacement is not structural.
#[test]
fn cursor_detects_foreign_modification() {
    let mut m: HybridHashMap<u32, u32> = (0..10).map(|i| (i, i)).collect();
    let mut c = m.cursor();
    c.next(&m).unwrap().unwrap();
    m.insert(3, 33);
    assert!(c.next(&m).unwrap().is_ok());
    m.insert(100, 100);
    assert!(matches!(c.next(&m), Some(Err(Error::ConcurrentModification { .. }))));
    assert!(matches!(c.remove(&mut m), Err(Error::ConcurrentModification { .. })));

    let mut c = m.cursor();
    m.remove(&100);
    assert!(matches!(c.next(&m), Some(Err(Error::ConcurrentModification { .. }))));
}

// Test: cursor removal without a current entry.
#[test]
fn cursor_remove_requires_current_entry() {
    let mut m: HybridHashMap<u32, u32> = (0..3).map(|i| (i, i)).collect();
    let mut c = m.cursor();
    assert_eq!(c.remove(&mut m), Err(Error::NoCurrentEntry));
    c.next(&m).unwrap().unwrap();
    assert!(c.remove(&mut m).is_ok());
    assert_eq!(c.remove(&mut m), Err(Error::NoCurrentEntry));
    assert_eq!(m.len(), 2);
}

// Test: key order through a borrowed form.
// Verifies: String keys under `Natural` can be looked up by &str.
#[test]
fn natural_order_supports_borrowed_lookup() {
    let mut m = HybridHashMap::with_order(Natural);
    m.insert("alpha".to_string(), 1);
    assert_eq!(m.get("alpha"), Some(&1));
    assert_eq!(m.remove("alpha"), Some(1));
}

#[test]
fn order_fn_compares_stored_keys() {
    let rev = OrderFn(|a: &u32, b: &u32| -> Ordering { b.cmp(a) });
    let mut m = HybridHashMap::with_order(rev);
    m.insert(5u32, ());
    assert!(m.contains_key(&5));
}

// Test: the map can move to another thread.
#[test]
fn map_is_send() {
    fn assert_send<T: Send>() {}
    assert_send::<HybridHashMap<String, Vec<u8>>>();
    let mut m = HybridHashMap::new();
    m.insert(1u8, 2u8);
    let m = std::thread::spawn(move || {
        m.insert(3, 4);
        m
    })
    .join()
    .unwrap();
    assert_eq!(m.len(), 2);
}
