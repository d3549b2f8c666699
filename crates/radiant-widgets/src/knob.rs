#![forbid(unsafe_code)]

//! Digit-wise editor for a number cell.
//!
//! The knob shows a sign element followed by one element per decimal place,
//! most significant first; the last digit element is the ones place. Keys
//! are delivered to a digit:
//!
//! - `-` makes the value negative and `+` positive. Zero keeps its sign
//!   through this, so typing `-` on `0` gives `-0` and a digit typed next
//!   yields a negative number.
//! - A digit replaces that place of the magnitude, keeping the sign.
//! - `Up` / `Down` add or subtract one unit of that place.
//!
//! The cell is written immediately; the elements are re-rendered at once and
//! again whenever a flush delivers an outside change.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use radiant_core::{Cell, CellError, Subscription, ValueType};
use tracing::debug;

use crate::element::Element;
use crate::error::{DispatchError, Result};
use crate::widget::{Widget, WidgetConfig, WidgetKind};

/// Decimal places shown by default (`10^0` through `10^9`).
pub const DEFAULT_PLACES: u32 = 10;

/// A key delivered to one digit of a knob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KnobKey {
    Char(char),
    Up,
    Down,
}

struct KnobView {
    sign: Element,
    /// Digit elements, most significant first.
    digits: Vec<Element>,
}

impl KnobView {
    fn render(&self, value: f64) {
        self.sign
            .set_text(if value.is_sign_negative() { "-" } else { "" });
        let magnitude = value.abs();
        let places = self.digits.len();
        for (i, digit) in self.digits.iter().enumerate() {
            let place = (places - 1 - i) as i32;
            digit.set_text(digit_at(magnitude, place).to_string());
        }
    }
}

fn digit_at(magnitude: f64, place: i32) -> u8 {
    if !magnitude.is_finite() {
        return 0;
    }
    ((magnitude / 10f64.powi(place)).floor() % 10.0) as u8
}

pub struct Knob {
    element: Element,
    target: Cell,
    view: Rc<KnobView>,
    _subscription: Subscription,
}

impl fmt::Debug for Knob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Knob")
            .field("target", &self.target.id())
            .field("places", &self.view.digits.len())
            .finish_non_exhaustive()
    }
}

impl Knob {
    pub fn new(config: WidgetConfig) -> Result<Self> {
        Self::with_places(config, DEFAULT_PLACES)
    }

    /// Knob showing `places` decimal places (at least one).
    pub fn with_places(config: WidgetConfig, places: u32) -> Result<Self> {
        let initial = config.target_number()?;
        if !config.target.is_writable() {
            return Err(DispatchError::configuration(format!(
                "knob target {} is not writable",
                config.target.id()
            )));
        }
        if !matches!(
            config.target.value_type(),
            ValueType::Any | ValueType::Number | ValueType::Range { .. }
        ) {
            return Err(DispatchError::configuration(format!(
                "knob target type {} is not numeric",
                config.target.value_type().name()
            )));
        }

        let element = config.element.clone();
        element.add_class("widget-Knob");
        let sign = Element::with_class("span", "knob-sign");
        element.append_child(sign.clone());
        let digits: Vec<Element> = (0..places.max(1))
            .rev()
            .map(|place| {
                let digit = Element::with_class("span", "knob-digit");
                digit.set_attribute("data-place", place.to_string());
                element.append_child(digit.clone());
                digit
            })
            .collect();

        let view = Rc::new(KnobView { sign, digits });
        view.render(initial);

        let weak_view = Rc::downgrade(&view);
        let subscription = config.target.subscribe(&config.scheduler, move |value| {
            if let (Some(view), Some(n)) = (weak_view.upgrade(), value.as_number()) {
                view.render(n);
            }
        });

        Ok(Self {
            element,
            target: config.target,
            view,
            _subscription: subscription,
        })
    }

    #[must_use]
    pub fn value(&self) -> f64 {
        self.target.get().as_number().unwrap_or(0.0)
    }

    /// Digit elements, most significant first.
    #[must_use]
    pub fn digits(&self) -> &[Element] {
        &self.view.digits
    }

    #[must_use]
    pub fn sign_element(&self) -> &Element {
        &self.view.sign
    }

    /// Deliver `key` to the digit for decimal `place` (0 is the ones place).
    ///
    /// Returns the place focus moves to: the next lower place after a typed
    /// digit, otherwise unchanged. Keys with no meaning are ignored.
    pub fn press(&self, place: u32, key: KnobKey) -> std::result::Result<u32, CellError> {
        let current = self.value();
        let unit = 10f64.powi(place as i32);
        let (next, focus) = match key {
            KnobKey::Char('-' | '_') => (-current.abs(), place),
            KnobKey::Char('+' | '=') => (current.abs(), place),
            KnobKey::Char(c) => match c.to_digit(10) {
                Some(d) => {
                    let magnitude = current.abs();
                    let old = f64::from(digit_at(magnitude, place as i32));
                    let replaced = magnitude + (f64::from(d) - old) * unit;
                    (replaced.copysign(current), place.saturating_sub(1))
                }
                None => return Ok(place),
            },
            KnobKey::Up => (current + unit, place),
            KnobKey::Down => (current - unit, place),
        };
        debug!(cell = self.target.id().raw(), place, ?key, value = next, "knob edit");
        self.target.set(next)?;
        self.view.render(next);
        Ok(focus)
    }

    /// Deliver `key` to whichever digit `element` is.
    ///
    /// Returns `None` when `element` is not one of this knob's digits.
    pub fn handle_key(
        &self,
        element: &Element,
        key: KnobKey,
    ) -> Option<std::result::Result<u32, CellError>> {
        let places = self.view.digits.len();
        let index = self.view.digits.iter().position(|d| d.ptr_eq(element))?;
        Some(self.press((places - 1 - index) as u32, key))
    }
}

impl Widget for Knob {
    fn element(&self) -> &Element {
        &self.element
    }

    fn kind(&self) -> WidgetKind {
        WidgetKind::of::<Self>("Knob")
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
