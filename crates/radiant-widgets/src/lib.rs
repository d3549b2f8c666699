#![forbid(unsafe_code)]

//! Headless widgets for Radiant.
//!
//! Widgets are models, not views: each owns an [`Element`] tree that a
//! renderer mirrors, and binds to cells through the session scheduler.
//!
//! - [`pick_block`]: choose a widget for a block from its capability markers.
//! - [`BlockWidget`]: the default, one row per key.
//! - [`Knob`], [`GeoMap`], [`ScopePlot`]: purpose-built widgets.

pub mod block_widget;
pub mod element;
pub mod error;
pub mod geomap;
pub mod knob;
pub mod pick_block;
pub mod scope_plot;
pub mod widget;

pub use block_widget::{BlockWidget, MAX_NESTING};
pub use element::Element;
pub use error::{DispatchError, Result};
pub use geomap::GeoMap;
pub use knob::{Knob, KnobKey};
pub use pick_block::{Dispatch, PickBlock, pick_block};
pub use scope_plot::{FrameError, ScopeFrame, ScopeHeader, ScopePlot, parse_frame};
pub use widget::{
    Coordinator, CoordinatorActions, INTERFACE_PREFIX, NoActions, RecordingActions, Widget,
    WidgetConfig, WidgetContext, WidgetCtor, WidgetKind, WidgetRegistry,
};

/// Registry with every built-in widget registered under its capability.
///
/// `Knob` is not capability-backed: it edits a number cell, not a block.
#[must_use]
pub fn default_registry() -> WidgetRegistry {
    WidgetRegistry::new()
        .with_interface("GeoMap", GeoMap::new)
        .with_interface("Scope", |config: WidgetConfig| {
            let block = config.target_block()?;
            let frames = block.get("frames").cloned().ok_or_else(|| {
                DispatchError::configuration("Scope block has no \"frames\" cell")
            })?;
            ScopePlot::new(WidgetConfig {
                target: frames,
                ..config
            })
        })
}
