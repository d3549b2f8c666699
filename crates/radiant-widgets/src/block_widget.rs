#![forbid(unsafe_code)]

//! Default widget for a block: one row per data key.
//!
//! Rows holding plain values show the value's text. Rows holding a block
//! nest the widget picked for that block by capability, down to
//! [`MAX_NESTING`] levels. Every row follows its cell: after a flush that
//! delivers a change, the row is rebuilt from the new value.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use radiant_core::{Block, Cell, Subscription, Value, WeakCell};
use tracing::{trace, warn};

use crate::element::Element;
use crate::error::Result;
use crate::pick_block::pick_block;
use crate::widget::{Widget, WidgetConfig, WidgetKind};

/// Nested blocks deeper than this show as a summary row.
pub const MAX_NESTING: usize = 8;

struct Row {
    key: String,
    element: Element,
    child: Option<Box<dyn Widget>>,
}

pub struct BlockWidget {
    element: Element,
    block: Block,
    rows: Rc<RefCell<Vec<Row>>>,
    _subscriptions: Vec<Subscription>,
}

impl fmt::Debug for BlockWidget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockWidget")
            .field("block", &self.block.id())
            .field("rows", &self.rows.borrow().len())
            .finish_non_exhaustive()
    }
}

impl BlockWidget {
    pub fn new(config: WidgetConfig) -> Result<Self> {
        let block = config.target_block()?;
        let element = config.element.clone();
        element.add_class("widget-BlockWidget");

        let rows = Rc::new(RefCell::new(Vec::with_capacity(block.len())));
        let mut subscriptions = Vec::with_capacity(block.len());
        for (position, (key, cell)) in block.iter().enumerate() {
            let row_element = Element::with_class("div", "row");
            row_element.set_attribute("data-key", key);
            row_element.append_child({
                let label = Element::with_class("span", "row-label");
                label.set_text(key);
                label
            });
            element.append_child(row_element.clone());

            let child = fill_row(&config, key, cell, &row_element);
            rows.borrow_mut().push(Row {
                key: key.to_owned(),
                element: row_element,
                child,
            });
            subscriptions.push(follow(&config, position, key, cell, &rows));
        }

        Ok(Self {
            element,
            block,
            rows,
            _subscriptions: subscriptions,
        })
    }

    #[must_use]
    pub fn block(&self) -> &Block {
        &self.block
    }

    #[must_use]
    pub fn row_keys(&self) -> Vec<String> {
        self.rows.borrow().iter().map(|r| r.key.clone()).collect()
    }

    /// Text shown for a plain-valued row.
    #[must_use]
    pub fn row_text(&self, key: &str) -> Option<String> {
        let rows = self.rows.borrow();
        let row = rows.iter().find(|r| r.key == key)?;
        row.element
            .query_class("row-value")
            .first()
            .map(Element::text)
    }

    /// Kind of the widget nested in a block-valued row.
    #[must_use]
    pub fn child_kind(&self, key: &str) -> Option<WidgetKind> {
        self.rows
            .borrow()
            .iter()
            .find(|r| r.key == key)
            .and_then(|r| r.child.as_ref().map(|c| c.kind()))
    }
}

impl Widget for BlockWidget {
    fn element(&self) -> &Element {
        &self.element
    }

    fn kind(&self) -> WidgetKind {
        WidgetKind::of::<Self>("BlockWidget")
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn follow(
    config: &WidgetConfig,
    position: usize,
    key: &str,
    cell: &Cell,
    rows: &Rc<RefCell<Vec<Row>>>,
) -> Subscription {
    let scheduler = config.scheduler.clone();
    let config = config.clone();
    let key = key.to_owned();
    let weak_cell: WeakCell = cell.downgrade();
    let weak_rows: Weak<RefCell<Vec<Row>>> = Rc::downgrade(rows);
    cell.subscribe(&scheduler, move |_| {
        let (Some(rows), Some(cell)) = (weak_rows.upgrade(), weak_cell.upgrade()) else {
            return;
        };
        let Some(row_element) = rows.borrow().get(position).map(|r| r.element.clone()) else {
            return;
        };
        trace!(key = %key, "block row refresh");
        let child = fill_row(&config, &key, &cell, &row_element);
        if let Some(row) = rows.borrow_mut().get_mut(position) {
            row.child = child;
        }
    })
}

/// Rebuild the content of `row` (everything after its label) from `cell`.
fn fill_row(config: &WidgetConfig, key: &str, cell: &Cell, row: &Element) -> Option<Box<dyn Widget>> {
    row.truncate_children(1);
    let value = cell.get();
    match value {
        Value::Block(_) if config.depth < MAX_NESTING => {
            match pick_block(config.child(key, cell.clone())) {
                Ok(widget) => {
                    row.append_child(widget.element().clone());
                    Some(widget)
                }
                Err(err) => {
                    warn!(key, error = %err, "nested widget construction failed");
                    let error = Element::with_class("span", "widget-error");
                    error.set_text(err.to_string());
                    row.append_child(error);
                    None
                }
            }
        }
        Value::Block(block) => {
            let summary = Element::with_class("span", "row-value");
            summary.set_text(format!("block {}", block.id().raw()));
            row.append_child(summary);
            None
        }
        other => {
            let text = Element::with_class("span", "row-value");
            text.set_text(other.to_string());
            row.append_child(text);
            None
        }
    }
}
