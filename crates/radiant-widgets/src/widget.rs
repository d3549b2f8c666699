#![forbid(unsafe_code)]

//! Widget trait, construction config and the widget registry.
//!
//! Every widget is built from a [`WidgetConfig`] naming its target cell, the
//! element it owns, the storage namespace for its UI-local state, and the
//! shared [`WidgetContext`]. Nothing reaches for global state: the scheduler,
//! index and registry all arrive through the config.

use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use radiant_core::{Block, Cell, Scheduler, Value};
use radiant_runtime::{Index, StorageNamespace};

use crate::element::Element;
use crate::error::{DispatchError, Result};

/// Registry key prefix for capability-backed widget implementations.
pub const INTERFACE_PREFIX: &str = "interface:";

// ---------------------------------------------------------------------------
// Widget
// ---------------------------------------------------------------------------

/// Identity of a widget implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WidgetKind {
    name: &'static str,
    type_id: TypeId,
}

impl WidgetKind {
    #[must_use]
    pub fn of<W: Widget>(name: &'static str) -> Self {
        Self {
            name,
            type_id: TypeId::of::<W>(),
        }
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Whether this kind identifies implementation `W`.
    #[must_use]
    pub fn is<W: Widget>(&self) -> bool {
        self.type_id == TypeId::of::<W>()
    }
}

impl fmt::Display for WidgetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// A headless widget bound to a target cell.
pub trait Widget: Any {
    /// Root element this widget renders into.
    fn element(&self) -> &Element;

    fn kind(&self) -> WidgetKind;

    fn as_any(&self) -> &dyn Any;
}

impl dyn Widget {
    /// Downcast to a concrete implementation.
    #[must_use]
    pub fn downcast_ref<W: Widget>(&self) -> Option<&W> {
        self.as_any().downcast_ref::<W>()
    }

    #[must_use]
    pub fn is<W: Widget>(&self) -> bool {
        self.kind().is::<W>()
    }
}

impl fmt::Debug for dyn Widget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Widget")
            .field("kind", &self.kind())
            .field("element", self.element())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Coordinator actions
// ---------------------------------------------------------------------------

/// Application-level actions widgets may invoke. Opaque to the widgets.
pub trait CoordinatorActions {
    fn dispatch(&self, action: &str, payload: &Value);
}

/// Actions sink that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoActions;

impl CoordinatorActions for NoActions {
    fn dispatch(&self, _action: &str, _payload: &Value) {}
}

/// Actions sink that records every dispatch, in order.
#[derive(Debug, Default)]
pub struct RecordingActions {
    log: RefCell<Vec<(String, Value)>>,
}

impl RecordingActions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn dispatched(&self) -> Vec<(String, Value)> {
        self.log.borrow().clone()
    }

    /// Number of dispatches of `action`.
    #[must_use]
    pub fn count(&self, action: &str) -> usize {
        self.log.borrow().iter().filter(|(a, _)| a == action).count()
    }
}

impl CoordinatorActions for RecordingActions {
    fn dispatch(&self, action: &str, payload: &Value) {
        self.log
            .borrow_mut()
            .push((action.to_owned(), payload.clone()));
    }
}

#[derive(Clone)]
pub struct Coordinator {
    pub actions: Rc<dyn CoordinatorActions>,
}

impl fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Coordinator").finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Environment shared by every widget of one tree.
#[derive(Clone)]
pub struct WidgetContext {
    pub widgets: Option<Rc<WidgetRegistry>>,
    pub scheduler: Scheduler,
    pub index: Index,
    pub coordinator: Coordinator,
}

impl fmt::Debug for WidgetContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WidgetContext")
            .field("widgets", &self.widgets)
            .field("index", &self.index)
            .finish_non_exhaustive()
    }
}

/// Everything one widget needs to construct itself.
#[derive(Clone)]
pub struct WidgetConfig {
    pub scheduler: Scheduler,
    pub target: Cell,
    pub element: Element,
    pub storage: StorageNamespace,
    pub index: Index,
    pub context: WidgetContext,
    pub actions: Rc<dyn CoordinatorActions>,
    /// Block nesting depth of this widget under the tree root.
    pub depth: usize,
}

impl fmt::Debug for WidgetConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WidgetConfig")
            .field("target", &self.target.id())
            .field("storage", &self.storage.prefix())
            .field("depth", &self.depth)
            .finish_non_exhaustive()
    }
}

impl WidgetConfig {
    /// Root config: a fresh `div` element at depth 0.
    #[must_use]
    pub fn new(
        scheduler: &Scheduler,
        target: Cell,
        storage: StorageNamespace,
        index: Index,
        widgets: Option<Rc<WidgetRegistry>>,
        actions: Rc<dyn CoordinatorActions>,
    ) -> Self {
        Self {
            scheduler: scheduler.clone(),
            target,
            element: Element::new("div"),
            storage,
            index: index.clone(),
            context: WidgetContext {
                widgets,
                scheduler: scheduler.clone(),
                index,
                coordinator: Coordinator {
                    actions: Rc::clone(&actions),
                },
            },
            actions,
            depth: 0,
        }
    }

    /// The target's current value as a block.
    pub fn target_block(&self) -> Result<Block> {
        self.target.with(|value| {
            value.as_block().cloned().ok_or_else(|| {
                DispatchError::configuration(format!(
                    "target cell {} holds {}, not a block",
                    self.target.id(),
                    value.kind_name()
                ))
            })
        })
    }

    /// The target's current value as a number.
    pub fn target_number(&self) -> Result<f64> {
        self.target.with(|value| {
            value.as_number().ok_or_else(|| {
                DispatchError::configuration(format!(
                    "target cell {} holds {}, not a number",
                    self.target.id(),
                    value.kind_name()
                ))
            })
        })
    }

    /// Config for a nested widget showing `target`, stored under `key`.
    #[must_use]
    pub fn child(&self, key: &str, target: Cell) -> Self {
        Self {
            target,
            element: Element::new("div"),
            storage: self.storage.child(key),
            depth: self.depth + 1,
            ..self.clone()
        }
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Widget constructor stored in a [`WidgetRegistry`].
pub type WidgetCtor = Rc<dyn Fn(WidgetConfig) -> Result<Box<dyn Widget>>>;

/// Ordered map from registry keys to widget constructors.
///
/// Keys of the form `interface:<Name>` select the implementation for blocks
/// declaring capability `<Name>`. Registration order is dispatch priority.
#[derive(Default, Clone)]
pub struct WidgetRegistry {
    entries: Vec<(String, WidgetCtor)>,
}

impl fmt::Debug for WidgetRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|(k, _)| k))
            .finish()
    }
}

impl WidgetRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `ctor` under `key`, replacing in place an existing entry.
    pub fn register(&mut self, key: impl Into<String>, ctor: WidgetCtor) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = ctor,
            None => self.entries.push((key, ctor)),
        }
    }

    /// Register a typed constructor as the implementation of capability `name`.
    pub fn register_interface<W, F>(&mut self, name: &str, ctor: F)
    where
        W: Widget,
        F: Fn(WidgetConfig) -> Result<W> + 'static,
    {
        let ctor: WidgetCtor =
            Rc::new(move |config| ctor(config).map(|w| Box::new(w) as Box<dyn Widget>));
        self.register(format!("{INTERFACE_PREFIX}{name}"), ctor);
    }

    /// Builder form of [`register_interface`](Self::register_interface).
    #[must_use]
    pub fn with_interface<W, F>(mut self, name: &str, ctor: F) -> Self
    where
        W: Widget,
        F: Fn(WidgetConfig) -> Result<W> + 'static,
    {
        self.register_interface(name, ctor);
        self
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&WidgetCtor> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, c)| c)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `(capability, constructor)` pairs in registration order.
    pub fn interfaces(&self) -> impl Iterator<Item = (&str, &WidgetCtor)> {
        self.entries
            .iter()
            .filter_map(|(k, c)| k.strip_prefix(INTERFACE_PREFIX).map(|name| (name, c)))
    }

    /// Reject keys that are empty or carry the interface prefix with no name.
    pub fn validate(&self) -> Result<()> {
        for (key, _) in &self.entries {
            if key.is_empty() {
                return Err(DispatchError::configuration("widget registry has an empty key"));
            }
            if let Some(name) = key.strip_prefix(INTERFACE_PREFIX)
                && (name.is_empty() || name.contains(char::is_whitespace))
            {
                return Err(DispatchError::configuration(format!(
                    "widget registry key {key:?} is not of the form \"{INTERFACE_PREFIX}<Name>\""
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Dummy(Element);

    impl Widget for Dummy {
        fn element(&self) -> &Element {
            &self.0
        }
        fn kind(&self) -> WidgetKind {
            WidgetKind::of::<Self>("Dummy")
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    fn dummy(config: WidgetConfig) -> Result<Dummy> {
        Ok(Dummy(config.element))
    }

    #[test]
    fn interfaces_keep_registration_order() {
        let mut registry = WidgetRegistry::new()
            .with_interface("B", dummy)
            .with_interface("A", dummy);
        registry.register("other", Rc::new(|c| dummy(c).map(|w| Box::new(w) as Box<dyn Widget>)));
        registry.register_interface("B", dummy);

        let names: Vec<&str> = registry.interfaces().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["B", "A"]);
        assert_eq!(registry.len(), 3);
        assert!(registry.get("interface:A").is_some());
    }

    #[test]
    fn empty_interface_name_is_rejected() {
        let registry = WidgetRegistry::new().with_interface("", dummy);
        assert!(matches!(
            registry.validate(),
            Err(DispatchError::Configuration { .. })
        ));
        assert!(WidgetRegistry::new().with_interface("Foo", dummy).validate().is_ok());
    }

    #[test]
    fn kind_identifies_type() {
        let kind = WidgetKind::of::<Dummy>("Dummy");
        assert!(kind.is::<Dummy>());
        assert_eq!(kind.to_string(), "Dummy");
    }

    #[test]
    fn recording_actions_counts() {
        let actions = RecordingActions::new();
        actions.dispatch("registerMap", &Value::Null);
        actions.dispatch("other", &Value::Null);
        assert_eq!(actions.count("registerMap"), 1);
        assert_eq!(actions.dispatched().len(), 2);
    }
}
