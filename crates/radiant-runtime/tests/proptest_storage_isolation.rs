#![forbid(unsafe_code)]

//! Property-based tests for storage namespaces.
//!
//! 1. Namespaces with distinct prefixes over one store never observe each
//!    other's keys, even when one prefix extends the other.
//! 2. `set_item` is idempotent.
//! 3. A namespace behaves like an independent map under any sequence of
//!    set/remove operations.

use std::collections::BTreeMap;
use std::rc::Rc;

use proptest::prelude::*;
use radiant_runtime::{KeyValueStore, MemoryStore, StorageNamespace};

// ── Strategies ──────────────────────────────────────────────────────────

fn prefix() -> impl Strategy<Value = String> {
    // Small alphabet with dots so nested and overlapping prefixes are common.
    "[ab.]{0,4}"
}

fn key() -> impl Strategy<Value = String> {
    "[ab.%]{0,4}"
}

#[derive(Debug, Clone)]
enum Op {
    Set { left: bool, key: String, value: String },
    Remove { left: bool, key: String },
}

fn ops() -> impl Strategy<Value = Vec<Op>> {
    proptest::collection::vec(
        prop_oneof![
            (any::<bool>(), key(), "[0-9]{1,3}")
                .prop_map(|(left, key, value)| Op::Set { left, key, value }),
            (any::<bool>(), key()).prop_map(|(left, key)| Op::Remove { left, key }),
        ],
        0..40,
    )
}

fn normalized(prefix: &str) -> String {
    if prefix.ends_with('.') {
        prefix.to_owned()
    } else {
        format!("{prefix}.")
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 1 + 3. Isolation and map semantics
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn distinct_prefixes_are_isolated(p1 in prefix(), p2 in prefix(), ops in ops()) {
        prop_assume!(normalized(&p1) != normalized(&p2));
        let store: Rc<dyn KeyValueStore> = Rc::new(MemoryStore::new());
        let left = StorageNamespace::new(Rc::clone(&store), p1);
        let right = StorageNamespace::new(Rc::clone(&store), p2);
        let mut left_model = BTreeMap::new();
        let mut right_model = BTreeMap::new();

        for op in &ops {
            match op {
                Op::Set { left: true, key, value } => {
                    left.set_item(key, value).unwrap();
                    left_model.insert(key.clone(), value.clone());
                }
                Op::Set { left: false, key, value } => {
                    right.set_item(key, value).unwrap();
                    right_model.insert(key.clone(), value.clone());
                }
                Op::Remove { left: true, key } => {
                    left.remove_item(key).unwrap();
                    left_model.remove(key);
                }
                Op::Remove { left: false, key } => {
                    right.remove_item(key).unwrap();
                    right_model.remove(key);
                }
            }
        }

        for (ns, model) in [(&left, &left_model), (&right, &right_model)] {
            let mut keys = ns.keys();
            keys.sort();
            prop_assert_eq!(keys, model.keys().cloned().collect::<Vec<_>>());
            for (k, v) in model {
                let got = ns.get_item(k);
                prop_assert_eq!(got.as_deref(), Some(v.as_str()));
            }
        }
        for k in left_model.keys() {
            if !right_model.contains_key(k) {
                prop_assert_eq!(right.get_item(k), None);
            }
        }
        for k in right_model.keys() {
            if !left_model.contains_key(k) {
                prop_assert_eq!(left.get_item(k), None);
            }
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 2. Idempotence
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn set_item_twice_is_set_item_once(p in prefix(), k in key(), v in "[a-z0-9]{0,8}") {
        let store = Rc::new(MemoryStore::new());
        let ns = StorageNamespace::new(store.clone(), p);
        ns.set_item(&k, &v).unwrap();
        let after_once = store.keys();
        ns.set_item(&k, &v).unwrap();
        prop_assert_eq!(store.keys(), after_once);
        prop_assert_eq!(ns.get_item(&k), Some(v));
    }
}
