#![forbid(unsafe_code)]

//! Capability dispatch.
//!
//! [`PickBlock`] reads the capability markers of its target block and builds
//! the registered implementation for the first capability (in registry
//! order) the block declares, falling back to [`BlockWidget`].
//!
//! # Invariants
//!
//! 1. A [`Dispatch`] leaves `Unresolved` at most once.
//! 2. The widget handed out is the chosen implementation itself; its
//!    [`Widget::kind`] never names `PickBlock`.
//!
//! # Failure Modes
//!
//! Missing registry, malformed registry keys and a non-block target all fail
//! with [`DispatchError::Configuration`]. Only the construction at hand
//! aborts; sibling widgets are unaffected.

use tracing::debug;

use crate::block_widget::BlockWidget;
use crate::error::{DispatchError, Result};
use crate::widget::{Widget, WidgetConfig, WidgetKind};

/// Resolution state of one dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Dispatch {
    #[default]
    Unresolved,
    Resolved {
        /// Capability that selected the implementation; `None` for the default.
        capability: Option<String>,
        kind: WidgetKind,
    },
}

impl Dispatch {
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved { .. })
    }

    /// Pick and construct the implementation for `config.target`.
    pub fn resolve(&mut self, config: WidgetConfig) -> Result<Box<dyn Widget>> {
        if self.is_resolved() {
            return Err(DispatchError::configuration("dispatch already resolved"));
        }
        let registry = config
            .context
            .widgets
            .clone()
            .ok_or_else(|| DispatchError::configuration("context has no widget registry"))?;
        registry.validate()?;
        let block = config.target_block()?;

        let chosen = registry
            .interfaces()
            .find(|(name, _)| block.implements(name))
            .map(|(name, ctor)| (name.to_owned(), ctor.clone()));
        let (capability, widget) = match chosen {
            Some((name, ctor)) => {
                let widget = ctor(config)?;
                (Some(name), widget)
            }
            None => (None, Box::new(BlockWidget::new(config)?) as Box<dyn Widget>),
        };

        debug!(
            block = block.id().raw(),
            capability = capability.as_deref().unwrap_or("<default>"),
            kind = %widget.kind(),
            "dispatch resolved"
        );
        *self = Self::Resolved {
            capability,
            kind: widget.kind(),
        };
        Ok(widget)
    }
}

/// Dispatching widget constructor.
pub struct PickBlock {
    dispatch: Dispatch,
    widget: Box<dyn Widget>,
}

impl std::fmt::Debug for PickBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PickBlock")
            .field("dispatch", &self.dispatch)
            .finish_non_exhaustive()
    }
}

impl PickBlock {
    pub fn new(config: WidgetConfig) -> Result<Self> {
        let mut dispatch = Dispatch::default();
        let widget = dispatch.resolve(config)?;
        Ok(Self { dispatch, widget })
    }

    #[must_use]
    pub fn dispatch(&self) -> &Dispatch {
        &self.dispatch
    }

    #[must_use]
    pub fn widget(&self) -> &dyn Widget {
        self.widget.as_ref()
    }

    #[must_use]
    pub fn into_widget(self) -> Box<dyn Widget> {
        self.widget
    }
}

/// Construct the widget for `config.target` by capability.
pub fn pick_block(config: WidgetConfig) -> Result<Box<dyn Widget>> {
    PickBlock::new(config).map(PickBlock::into_widget)
}

#[cfg(test)]
mod tests {
    use std::any::Any;
    use std::rc::Rc;

    use radiant_core::{Block, Cell, Scheduler, Value, ValueType};
    use radiant_runtime::{Index, MemoryStore, StorageNamespace};

    use super::*;
    use crate::element::Element;
    use crate::widget::{NoActions, WidgetRegistry};

    struct Foo(Element);
    struct Bar(Element);

    macro_rules! dummy_widget {
        ($t:ident) => {
            impl Widget for $t {
                fn element(&self) -> &Element {
                    &self.0
                }
                fn kind(&self) -> WidgetKind {
                    WidgetKind::of::<Self>(stringify!($t))
                }
                fn as_any(&self) -> &dyn Any {
                    self
                }
            }
        };
    }
    dummy_widget!(Foo);
    dummy_widget!(Bar);

    fn config(target: Value, registry: Option<WidgetRegistry>) -> WidgetConfig {
        let sched = Scheduler::new();
        let target = Cell::constant(ValueType::Any, target);
        let index = Index::new(&sched, target.clone());
        WidgetConfig::new(
            &sched,
            target,
            StorageNamespace::new(Rc::new(MemoryStore::new()), "test"),
            index,
            registry.map(Rc::new),
            Rc::new(NoActions),
        )
    }

    fn registry() -> WidgetRegistry {
        WidgetRegistry::new()
            .with_interface("Foo", |c: WidgetConfig| Ok(Foo(c.element)))
            .with_interface("Bar", |c: WidgetConfig| Ok(Bar(c.element)))
    }

    #[test]
    fn first_registered_capability_wins() {
        let block = Block::builder().implements("Bar").implements("Foo").build();
        let picked = PickBlock::new(config(block.into(), Some(registry()))).unwrap();
        assert!(picked.widget().is::<Foo>());
        assert_eq!(
            picked.dispatch(),
            &Dispatch::Resolved {
                capability: Some("Foo".to_owned()),
                kind: WidgetKind::of::<Foo>("Foo"),
            }
        );
    }

    #[test]
    fn false_marker_does_not_match() {
        let (builder, _) = Block::builder().marker("_implements_Foo", false);
        let widget = pick_block(config(builder.build().into(), Some(registry()))).unwrap();
        assert!(widget.is::<BlockWidget>());
    }

    #[test]
    fn missing_registry_is_configuration_error() {
        let err = pick_block(config(Block::empty().into(), None)).unwrap_err();
        assert!(matches!(err, DispatchError::Configuration { .. }));
    }

    #[test]
    fn non_block_target_is_configuration_error() {
        let err = pick_block(config(Value::Number(1.0), Some(registry()))).unwrap_err();
        assert!(matches!(err, DispatchError::Configuration { message } if message.contains("number")));
    }

    #[test]
    fn dispatch_resolves_once() {
        let cfg = config(Block::empty().into(), Some(registry()));
        let mut dispatch = Dispatch::default();
        assert!(!dispatch.is_resolved());
        dispatch.resolve(cfg.clone()).unwrap();
        assert!(dispatch.is_resolved());
        assert!(dispatch.resolve(cfg).is_err());
    }
}
