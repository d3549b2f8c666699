#![forbid(unsafe_code)]

//! Blocks: named, ordered collections of cells.
//!
//! A block's key set is fixed when it is built; only the contents of its
//! cells change. Besides data keys, a block carries *capability markers*:
//! boolean attributes spelled `_implements_<Name>` that other components
//! test to select polymorphic behavior. Markers are kept apart from the data
//! keys and never show up in [`Block::keys`].
//!
//! A block is usually held inside a cell of type [`ValueType::Block`]
//! (cell-of-block), which lets a whole subtree be replaced at once.
//!
//! [`ValueType::Block`]: crate::ValueType::Block

use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::cell::Cell;

/// Reserved key prefix of a capability marker.
pub const CAPABILITY_PREFIX: &str = "_implements_";

static NEXT_BLOCK_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique block identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(u64);

impl BlockId {
    fn next() -> Self {
        Self(NEXT_BLOCK_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// Marker key for capability `name`, e.g. `_implements_Foo`.
#[must_use]
pub fn marker_key(name: &str) -> String {
    format!("{CAPABILITY_PREFIX}{name}")
}

/// Capability name carried by a marker key, if `key` is one.
#[must_use]
pub fn capability_of(key: &str) -> Option<&str> {
    key.strip_prefix(CAPABILITY_PREFIX)
        .filter(|name| !name.is_empty())
}

struct BlockInner {
    id: BlockId,
    entries: Vec<(String, Cell)>,
    markers: Vec<(String, bool)>,
}

/// Shared handle to a block. Cloning shares the same block.
#[derive(Clone)]
pub struct Block {
    inner: Rc<BlockInner>,
}

/// Non-owning block handle.
#[derive(Clone)]
pub struct WeakBlock {
    id: BlockId,
    inner: Weak<BlockInner>,
}

impl WeakBlock {
    #[must_use]
    pub fn id(&self) -> BlockId {
        self.id
    }

    #[must_use]
    pub fn upgrade(&self) -> Option<Block> {
        self.inner.upgrade().map(|inner| Block { inner })
    }

    /// Whether the block has been dropped.
    #[must_use]
    pub fn is_dead(&self) -> bool {
        self.inner.strong_count() == 0
    }
}

impl fmt::Debug for WeakBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakBlock")
            .field("id", &self.id)
            .field("alive", &!self.is_dead())
            .finish()
    }
}

impl fmt::Debug for Block {
    // Keys only: cell values may lead back to this block.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Block")
            .field("id", &self.inner.id)
            .field("keys", &self.keys().collect::<Vec<_>>())
            .field("capabilities", &self.capabilities().collect::<Vec<_>>())
            .finish()
    }
}

impl Block {
    #[must_use]
    pub fn builder() -> BlockBuilder {
        BlockBuilder::default()
    }

    /// A block with no keys and no capabilities.
    #[must_use]
    pub fn empty() -> Self {
        BlockBuilder::default().build()
    }

    #[must_use]
    pub fn id(&self) -> BlockId {
        self.inner.id
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Cell> {
        self.inner
            .entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, cell)| cell)
    }

    /// Data keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.inner.entries.iter().map(|(k, _)| k.as_str())
    }

    /// Data entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Cell)> {
        self.inner.entries.iter().map(|(k, c)| (k.as_str(), c))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }

    /// Whether the block declares capability `name` as true.
    #[must_use]
    pub fn implements(&self, name: &str) -> bool {
        self.inner
            .markers
            .iter()
            .any(|(cap, declared)| *declared && cap == name)
    }

    /// Capabilities declared true, in declaration order.
    pub fn capabilities(&self) -> impl Iterator<Item = &str> {
        self.inner
            .markers
            .iter()
            .filter(|(_, declared)| *declared)
            .map(|(cap, _)| cap.as_str())
    }

    /// Every marker, including ones declared false, as `(marker_key, value)`.
    pub fn markers(&self) -> impl Iterator<Item = (String, bool)> + '_ {
        self.inner
            .markers
            .iter()
            .map(|(cap, declared)| (marker_key(cap), *declared))
    }

    #[must_use]
    pub fn downgrade(&self) -> WeakBlock {
        WeakBlock {
            id: self.inner.id,
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Whether two handles refer to the same block.
    #[must_use]
    pub fn ptr_eq(&self, other: &Block) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

/// Builder for [`Block`].
#[derive(Default)]
pub struct BlockBuilder {
    entries: Vec<(String, Cell)>,
    markers: Vec<(String, bool)>,
}

impl BlockBuilder {
    /// Add a data key. Re-adding a key replaces its cell in place.
    ///
    /// # Panics
    ///
    /// Panics if `key` is a capability marker key (`_implements_<Name>`);
    /// declare capabilities with [`implements`](Self::implements).
    #[must_use]
    pub fn cell(mut self, key: impl Into<String>, cell: Cell) -> Self {
        let key = key.into();
        assert!(
            capability_of(&key).is_none(),
            "marker key {key} used as a data key"
        );
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = cell,
            None => self.entries.push((key, cell)),
        }
        self
    }

    /// Declare capability `name` as true.
    #[must_use]
    pub fn implements(self, name: impl Into<String>) -> Self {
        self.declare(name, true)
    }

    /// Set capability `name` to `declared`. Re-declaring keeps the first position.
    #[must_use]
    pub fn declare(mut self, name: impl Into<String>, declared: bool) -> Self {
        let name = name.into();
        match self.markers.iter_mut().find(|(n, _)| *n == name) {
            Some(marker) => marker.1 = declared,
            None => self.markers.push((name, declared)),
        }
        self
    }

    /// Set a marker by its full key (`_implements_<Name>`).
    ///
    /// Keys without the reserved prefix are ignored and reported as `false`.
    #[must_use]
    pub fn marker(self, key: &str, declared: bool) -> (Self, bool) {
        match capability_of(key) {
            Some(name) => (self.declare(name, declared), true),
            None => (self, false),
        }
    }

    #[must_use]
    pub fn build(self) -> Block {
        Block {
            inner: Rc::new(BlockInner {
                id: BlockId::next(),
                entries: self.entries,
                markers: self.markers,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{Value, ValueType};

    #[test]
    fn keys_keep_insertion_order() {
        let block = Block::builder()
            .cell("zeta", Cell::constant(ValueType::Number, 1.0))
            .cell("alpha", Cell::constant(ValueType::Number, 2.0))
            .cell("mid", Cell::constant(ValueType::Number, 3.0))
            .build();
        assert_eq!(block.keys().collect::<Vec<_>>(), vec!["zeta", "alpha", "mid"]);
        assert_eq!(block.len(), 3);
    }

    #[test]
    fn re_adding_key_replaces_in_place() {
        let block = Block::builder()
            .cell("a", Cell::constant(ValueType::Number, 1.0))
            .cell("b", Cell::constant(ValueType::Number, 2.0))
            .cell("a", Cell::constant(ValueType::Number, 9.0))
            .build();
        assert_eq!(block.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(block.get("a").unwrap().get(), Value::Number(9.0));
    }

    #[test]
    fn markers_are_not_data_keys() {
        let block = Block::builder()
            .cell("freq", Cell::local(ValueType::Number, 0.0))
            .implements("Foo")
            .declare("Bar", false)
            .build();
        assert_eq!(block.keys().collect::<Vec<_>>(), vec!["freq"]);
        assert!(block.implements("Foo"));
        assert!(!block.implements("Bar"));
        assert_eq!(block.capabilities().collect::<Vec<_>>(), vec!["Foo"]);
        assert_eq!(
            block.markers().collect::<Vec<_>>(),
            vec![("_implements_Foo".to_owned(), true), ("_implements_Bar".to_owned(), false)]
        );
    }

    #[test]
    fn marker_by_full_key() {
        let (builder, accepted) = Block::builder().marker("_implements_Foo", true);
        assert!(accepted);
        let (builder, accepted) = builder.marker("implements_Bar", true);
        assert!(!accepted);
        let block = builder.build();
        assert_eq!(block.capabilities().collect::<Vec<_>>(), vec!["Foo"]);
    }

    #[test]
    fn capability_of_parses_prefix() {
        assert_eq!(capability_of("_implements_Foo"), Some("Foo"));
        assert_eq!(capability_of("_implements_"), None);
        assert_eq!(capability_of("freq"), None);
        assert_eq!(marker_key("Foo"), "_implements_Foo");
    }

    #[test]
    fn weak_block_dies_with_last_handle() {
        let block = Block::empty();
        let weak = block.downgrade();
        assert_eq!(weak.id(), block.id());
        assert!(weak.upgrade().is_some());
        drop(block);
        assert!(weak.is_dead());
        assert!(weak.upgrade().is_none());
    }

    #[test]
    #[should_panic(expected = "used as a data key")]
    fn marker_key_as_data_key_panics() {
        let _ = Block::builder().cell("_implements_Foo", Cell::constant(ValueType::Boolean, true));
    }
}
