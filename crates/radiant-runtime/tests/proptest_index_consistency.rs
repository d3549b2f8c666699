#![forbid(unsafe_code)]

//! Property-based consistency tests for the capability index.
//!
//! A fixed set of slot cells is rewired at random: each mutation puts either
//! nothing or a fresh block into a slot, and the fresh block declares random
//! capabilities and links back to random slots (so sharing and cycles are
//! common). After a full flush:
//!
//! 1. Every capability lookup equals a naive reachability computation.
//! 2. The index keeps no replaced block alive.

use std::collections::HashSet;

use proptest::prelude::*;
use radiant_core::{Block, BlockId, Cell, Scheduler, Value, ValueType, WeakBlock};
use radiant_runtime::Index;

const SLOTS: usize = 6;
const CAPABILITIES: [&str; 3] = ["Receiver", "Device", "PositionedDevice"];

#[derive(Debug, Clone)]
struct Mutation {
    slot: usize,
    /// `None` clears the slot.
    block: Option<(u8, Vec<usize>)>,
    flush_after: bool,
}

fn mutations() -> impl Strategy<Value = Vec<Mutation>> {
    proptest::collection::vec(
        (
            0..SLOTS,
            proptest::option::of((0u8..8, proptest::collection::vec(0..SLOTS, 0..3))),
            any::<bool>(),
        )
            .prop_map(|(slot, block, flush_after)| Mutation {
                slot,
                block,
                flush_after,
            }),
        0..30,
    )
}

fn build_block(mask: u8, links: &[usize], slots: &[Cell]) -> Block {
    let mut builder = Block::builder();
    for (bit, cap) in CAPABILITIES.iter().enumerate() {
        if mask & (1 << bit) != 0 {
            builder = builder.implements(*cap);
        }
    }
    for (i, &link) in links.iter().enumerate() {
        builder = builder.cell(format!("link{i}"), slots[link].clone());
    }
    builder
        .cell("freq", Cell::local(ValueType::Number, 0.0))
        .build()
}

fn naive_lookup(root: &Cell, capability: &str) -> Vec<BlockId> {
    fn visit_cell(cell: &Cell, seen: &mut HashSet<u64>, out: &mut Vec<Block>) {
        if let Value::Block(block) = cell.get()
            && seen.insert(block.id().raw())
        {
            out.push(block.clone());
            for (_, child) in block.iter() {
                visit_cell(child, seen, out);
            }
        }
    }
    let mut seen = HashSet::new();
    let mut blocks = Vec::new();
    visit_cell(root, &mut seen, &mut blocks);
    blocks
        .into_iter()
        .filter(|b| b.implements(capability))
        .map(|b| b.id())
        .collect()
}

proptest! {
    #[test]
    fn lookups_match_naive_walk(muts in mutations()) {
        let sched = Scheduler::new();
        let slots: Vec<Cell> = (0..SLOTS)
            .map(|_| Cell::local(ValueType::Any, Value::Null))
            .collect();
        let mut root_builder = Block::builder().implements("Top");
        for (i, slot) in slots.iter().take(2).enumerate() {
            root_builder = root_builder.cell(format!("s{i}"), slot.clone());
        }
        let root = Cell::constant(ValueType::Block, root_builder.build());
        let index = Index::new(&sched, root.clone());
        let mut created: Vec<WeakBlock> = Vec::new();

        for m in &muts {
            let value = match &m.block {
                Some((mask, links)) => {
                    let block = build_block(*mask, links, &slots);
                    created.push(block.downgrade());
                    Value::Block(block)
                }
                None => Value::Null,
            };
            slots[m.slot].set(value).unwrap();
            if m.flush_after {
                sched.run_until_idle(16);
            }
        }
        sched.run_until_idle(16);
        prop_assert_eq!(sched.pending(), 0);

        for cap in CAPABILITIES.iter().chain(["Top"].iter()) {
            let got: Vec<BlockId> = index.lookup_capability(cap).iter().map(Block::id).collect();
            prop_assert_eq!(got, naive_lookup(&root, cap), "capability {}", cap);
        }

        let held: HashSet<BlockId> = slots
            .iter()
            .filter_map(|s| s.get().as_block().map(Block::id))
            .collect();
        for weak in &created {
            prop_assert_eq!(!weak.is_dead(), held.contains(&weak.id()));
        }

        // Break reference cycles between slots and blocks.
        for slot in &slots {
            slot.set(Value::Null).unwrap();
        }
    }
}
