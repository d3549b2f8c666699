#![no_main]

use std::collections::BTreeMap;
use std::rc::Rc;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use radiant_runtime::{KeyValueStore, MemoryStore, StorageNamespace};

#[derive(Arbitrary, Debug)]
enum Op {
    Set { left: bool, key: String, value: String },
    Remove { left: bool, key: String },
    Clear { left: bool },
}

#[derive(Arbitrary, Debug)]
struct Input {
    left_prefix: String,
    right_prefix: String,
    ops: Vec<Op>,
}

fn normalized(prefix: &str) -> String {
    if prefix.ends_with('.') {
        prefix.to_owned()
    } else {
        format!("{prefix}.")
    }
}

fuzz_target!(|input: Input| {
    if normalized(&input.left_prefix) == normalized(&input.right_prefix) {
        return;
    }
    let store: Rc<dyn KeyValueStore> = Rc::new(MemoryStore::new());
    let namespaces = [
        StorageNamespace::new(Rc::clone(&store), input.left_prefix),
        StorageNamespace::new(Rc::clone(&store), input.right_prefix),
    ];
    let mut models = [BTreeMap::new(), BTreeMap::new()];

    for op in input.ops.into_iter().take(256) {
        match op {
            Op::Set { left, key, value } => {
                let side = usize::from(!left);
                namespaces[side].set_item(&key, &value).expect("memory store");
                models[side].insert(key, value);
            }
            Op::Remove { left, key } => {
                let side = usize::from(!left);
                namespaces[side].remove_item(&key).expect("memory store");
                models[side].remove(&key);
            }
            Op::Clear { left } => {
                let side = usize::from(!left);
                namespaces[side].clear().expect("memory store");
                models[side].clear();
            }
        }
    }

    for (ns, model) in namespaces.iter().zip(&models) {
        let mut keys = ns.keys();
        keys.sort();
        assert_eq!(keys, model.keys().cloned().collect::<Vec<_>>());
        for (key, value) in model {
            assert_eq!(ns.get_item(key).as_deref(), Some(value.as_str()));
        }
    }
});
