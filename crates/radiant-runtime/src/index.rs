#![forbid(unsafe_code)]

//! Capability index over the block tree reachable from a root cell.
//!
//! # Design
//!
//! The index walks the graph from the root cell's value: every block found is
//! recorded in an arena of [`WeakBlock`] slots keyed by [`BlockId`], and every
//! capability it declares appends its id to that capability's list. Cells
//! able to hold a block (`any` or `block` value types) are watched through
//! the scheduler; when one changes, the index re-walks the graph inside that
//! notification task, so a lookup never observes a half-finished walk.
//!
//! # Invariants
//!
//! 1. After the scheduler has flushed every pending notification,
//!    [`Index::lookup_capability`] returns exactly the reachable blocks
//!    declaring that capability, in depth-first pre-order (key order).
//! 2. Each block and each cell is visited at most once per walk, so shared
//!    and cyclic graphs terminate.
//! 3. The index holds no strong reference to any block or non-root cell. A
//!    dropped block vanishes from results even before the next walk.
//! 4. Several watched cells changing in one tick cause a single walk.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::{Rc, Weak};

use radiant_core::{Block, BlockId, Cell, CellId, Scheduler, Subscription, WeakBlock, WeakCell};
use tracing::debug;

#[derive(Default)]
struct IndexState {
    arena: HashMap<BlockId, WeakBlock>,
    order: Vec<BlockId>,
    by_capability: HashMap<String, Vec<BlockId>>,
    watched: HashMap<CellId, Watched>,
    /// Scheduler tick of the last walk.
    walked_tick: Option<u64>,
    walks: u64,
}

struct Watched {
    cell: WeakCell,
    /// Cell version read by the walk that installed this watch.
    version: u64,
    _subscription: Subscription,
}

struct IndexInner {
    scheduler: Scheduler,
    root: Cell,
    state: RefCell<IndexState>,
}

/// Shared handle to a capability index.
#[derive(Clone)]
pub struct Index {
    inner: Rc<IndexInner>,
}

impl fmt::Debug for Index {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.borrow();
        f.debug_struct("Index")
            .field("root", &self.inner.root.id())
            .field("blocks", &state.order.len())
            .field("watched", &state.watched.len())
            .field("walks", &state.walks)
            .finish()
    }
}

/// Result of one traversal, before it is swapped into the index.
#[derive(Default)]
struct Walk {
    seen_blocks: HashSet<BlockId>,
    seen_cells: HashSet<CellId>,
    arena: HashMap<BlockId, WeakBlock>,
    order: Vec<BlockId>,
    by_capability: HashMap<String, Vec<BlockId>>,
    watch: Vec<Cell>,
}

impl Walk {
    fn visit_cell(&mut self, cell: &Cell) {
        if !self.seen_cells.insert(cell.id()) {
            return;
        }
        if cell.value_type().may_hold_block() {
            self.watch.push(cell.clone());
        }
        if let Some(block) = cell.with(|value| value.as_block().cloned()) {
            self.visit_block(&block);
        }
    }

    fn visit_block(&mut self, block: &Block) {
        let id = block.id();
        if !self.seen_blocks.insert(id) {
            return;
        }
        self.order.push(id);
        self.arena.insert(id, block.downgrade());
        for capability in block.capabilities() {
            self.by_capability
                .entry(capability.to_owned())
                .or_default()
                .push(id);
        }
        for (_, cell) in block.iter() {
            self.visit_cell(cell);
        }
    }
}

impl Index {
    /// Index the graph under `root`, keeping it current through `scheduler`.
    #[must_use]
    pub fn new(scheduler: &Scheduler, root: Cell) -> Self {
        let index = Self {
            inner: Rc::new(IndexInner {
                scheduler: scheduler.clone(),
                root,
                state: RefCell::new(IndexState::default()),
            }),
        };
        Self::walk(&index.inner);
        index
    }

    fn walk(inner: &Rc<IndexInner>) {
        let mut walk = Walk::default();
        walk.visit_cell(&inner.root);

        let mut previous = std::mem::take(&mut inner.state.borrow_mut().watched);
        let mut watched = HashMap::with_capacity(walk.watch.len());
        for cell in &walk.watch {
            let entry = match previous.remove(&cell.id()) {
                Some(existing) => Watched {
                    version: cell.version(),
                    ..existing
                },
                None => Watched {
                    cell: cell.downgrade(),
                    version: cell.version(),
                    _subscription: Self::watch(inner, cell),
                },
            };
            watched.insert(cell.id(), entry);
        }
        let dropped = previous.len();
        drop(previous);

        let mut state = inner.state.borrow_mut();
        state.arena = walk.arena;
        state.order = walk.order;
        state.by_capability = walk.by_capability;
        state.watched = watched;
        state.walked_tick = Some(inner.scheduler.tick());
        state.walks += 1;
        debug!(
            root = inner.root.id().raw(),
            blocks = state.order.len(),
            watched = state.watched.len(),
            unwatched = dropped,
            walk = state.walks,
            "index walk"
        );
    }

    fn watch(inner: &Rc<IndexInner>, cell: &Cell) -> Subscription {
        let weak: Weak<IndexInner> = Rc::downgrade(inner);
        cell.subscribe(&inner.scheduler, move |_| {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            // Values are current when a notification runs, so one walk per
            // tick covers every change delivered in it.
            let tick = inner.scheduler.tick();
            if inner.state.borrow().walked_tick == Some(tick) {
                return;
            }
            Self::walk(&inner);
        })
    }

    fn resolve(&self, ids: &[BlockId]) -> Vec<Block> {
        let state = self.inner.state.borrow();
        ids.iter()
            .filter_map(|id| state.arena.get(id).and_then(WeakBlock::upgrade))
            .collect()
    }

    /// Reachable blocks declaring capability `name`, in traversal order.
    #[must_use]
    pub fn lookup_capability(&self, name: &str) -> Vec<Block> {
        let ids = self
            .inner
            .state
            .borrow()
            .by_capability
            .get(name)
            .cloned()
            .unwrap_or_default();
        self.resolve(&ids)
    }

    /// Every reachable block, in traversal order.
    #[must_use]
    pub fn reachable_blocks(&self) -> Vec<Block> {
        let ids = self.inner.state.borrow().order.clone();
        self.resolve(&ids)
    }

    /// Whether the block with `id` was reachable at the last walk and is alive.
    #[must_use]
    pub fn contains(&self, id: BlockId) -> bool {
        self.inner
            .state
            .borrow()
            .arena
            .get(&id)
            .is_some_and(|weak| !weak.is_dead())
    }

    #[must_use]
    pub fn root(&self) -> &Cell {
        &self.inner.root
    }

    #[must_use]
    pub fn scheduler(&self) -> &Scheduler {
        &self.inner.scheduler
    }

    /// Number of completed walks, the initial one included.
    #[must_use]
    pub fn walk_count(&self) -> u64 {
        self.inner.state.borrow().walks
    }

    /// Whether a watched cell changed since the last walk, so results may
    /// lag until the scheduler flushes.
    #[must_use]
    pub fn is_stale(&self) -> bool {
        self.inner.state.borrow().watched.values().any(|w| {
            w.cell
                .upgrade()
                .is_some_and(|cell| cell.version() != w.version)
        })
    }

    /// Number of cells currently watched for structural changes.
    #[must_use]
    pub fn watched_cells(&self) -> usize {
        self.inner.state.borrow().watched.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use radiant_core::{Value, ValueType};

    fn ids(blocks: &[Block]) -> Vec<BlockId> {
        blocks.iter().map(Block::id).collect()
    }

    fn leaf(capability: &str) -> Block {
        Block::builder()
            .cell("freq", Cell::local(ValueType::Number, 0.0))
            .implements(capability)
            .build()
    }

    #[test]
    fn finds_capabilities_in_preorder() {
        let sched = Scheduler::new();
        let a = leaf("Foo");
        let b = leaf("Foo");
        let root_block = Block::builder()
            .cell("a", Cell::constant(ValueType::Block, a.clone()))
            .cell("b", Cell::constant(ValueType::Block, b.clone()))
            .implements("Top")
            .build();
        let root = Cell::constant(ValueType::Block, root_block.clone());
        let index = Index::new(&sched, root);

        assert_eq!(ids(&index.lookup_capability("Foo")), vec![a.id(), b.id()]);
        assert_eq!(ids(&index.lookup_capability("Top")), vec![root_block.id()]);
        assert!(index.lookup_capability("Nope").is_empty());
        assert_eq!(index.reachable_blocks().len(), 3);
    }

    #[test]
    fn replacement_is_seen_after_flush() {
        let sched = Scheduler::new();
        let slot = Cell::local(ValueType::Block, leaf("Foo"));
        let root = Cell::constant(
            ValueType::Block,
            Block::builder().cell("slot", slot.clone()).build(),
        );
        let index = Index::new(&sched, root);
        assert_eq!(index.lookup_capability("Foo").len(), 1);
        assert!(!index.is_stale());

        let replacement = leaf("Bar");
        slot.set(replacement.clone()).unwrap();
        // Not flushed yet: the previous consistent snapshot is still served.
        assert!(index.is_stale());
        assert!(index.lookup_capability("Bar").is_empty());

        sched.run_until_idle(8);
        assert!(!index.is_stale());
        assert!(index.lookup_capability("Foo").is_empty());
        assert_eq!(ids(&index.lookup_capability("Bar")), vec![replacement.id()]);
    }

    #[test]
    fn removed_block_is_not_kept_alive() {
        let sched = Scheduler::new();
        let slot = Cell::local(ValueType::Any, leaf("Foo"));
        let root = Cell::constant(
            ValueType::Block,
            Block::builder().cell("slot", slot.clone()).build(),
        );
        let index = Index::new(&sched, root);
        let weak = index.lookup_capability("Foo")[0].downgrade();

        slot.set(Value::Null).unwrap();
        // Dropped before any flush: results already exclude it.
        assert!(weak.is_dead());
        assert!(index.lookup_capability("Foo").is_empty());
        assert!(!index.contains(weak.id()));
        sched.run_until_idle(8);
        assert!(index.lookup_capability("Foo").is_empty());
    }

    #[test]
    fn cycles_terminate() {
        let sched = Scheduler::new();
        let back = Cell::local(ValueType::Any, Value::Null);
        let a = Block::builder().cell("next", back.clone()).implements("Foo").build();
        let b = Block::builder()
            .cell("back", Cell::constant(ValueType::Block, a.clone()))
            .implements("Foo")
            .build();
        back.set(b.clone()).unwrap();

        let index = Index::new(&sched, Cell::constant(ValueType::Block, a.clone()));
        assert_eq!(ids(&index.lookup_capability("Foo")), vec![a.id(), b.id()]);

        // Break the cycle so the blocks can be freed.
        back.set(Value::Null).unwrap();
    }

    #[test]
    fn shared_block_listed_once() {
        let sched = Scheduler::new();
        let shared = leaf("Foo");
        let root = Cell::constant(
            ValueType::Block,
            Block::builder()
                .cell("x", Cell::constant(ValueType::Block, shared.clone()))
                .cell("y", Cell::constant(ValueType::Block, shared.clone()))
                .build(),
        );
        let index = Index::new(&sched, root);
        assert_eq!(ids(&index.lookup_capability("Foo")), vec![shared.id()]);
    }

    #[test]
    fn many_changes_one_walk_per_tick() {
        let sched = Scheduler::new();
        let slots: Vec<Cell> = (0..4)
            .map(|_| Cell::local(ValueType::Block, leaf("Foo")))
            .collect();
        let mut builder = Block::builder();
        for (i, slot) in slots.iter().enumerate() {
            builder = builder.cell(format!("s{i}"), slot.clone());
        }
        let index = Index::new(&sched, Cell::constant(ValueType::Block, builder.build()));
        assert_eq!(index.walk_count(), 1);

        for slot in &slots {
            slot.set(leaf("Bar")).unwrap();
        }
        sched.run_until_idle(8);
        assert_eq!(index.walk_count(), 2);
        assert_eq!(index.lookup_capability("Bar").len(), 4);
    }

    #[test]
    fn non_block_cells_are_not_watched() {
        let sched = Scheduler::new();
        let freq = Cell::local(ValueType::Number, 0.0);
        let root = Cell::constant(
            ValueType::Block,
            Block::builder().cell("freq", freq.clone()).build(),
        );
        let index = Index::new(&sched, root);
        assert_eq!(index.watched_cells(), 1);
        assert_eq!(freq.subscriber_count(), 0);
        freq.set(1.0).unwrap();
        assert_eq!(sched.pending(), 0);
    }

    #[test]
    fn dropped_index_unsubscribes() {
        let sched = Scheduler::new();
        let slot = Cell::local(ValueType::Block, leaf("Foo"));
        let root = Cell::constant(
            ValueType::Block,
            Block::builder().cell("slot", slot.clone()).build(),
        );
        let index = Index::new(&sched, root);
        assert_eq!(slot.subscriber_count(), 1);
        drop(index);
        assert_eq!(slot.subscriber_count(), 0);
    }
}
