#![forbid(unsafe_code)]

//! Oscilloscope frame tracker.
//!
//! A scope cell carries frames shaped `[{"freq": f, "rate": r}, samples]`.
//! [`ScopePlot`] validates the frame present at construction and keeps the
//! latest valid frame; a malformed update is logged and skipped.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use radiant_core::{Subscription, Value};
use serde::Deserialize;
use thiserror::Error;
use tracing::{trace, warn};

use crate::element::Element;
use crate::error::{DispatchError, Result};
use crate::widget::{Widget, WidgetConfig, WidgetKind};

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct ScopeHeader {
    /// Center frequency in Hz.
    pub freq: f64,
    /// Sample rate in Hz.
    pub rate: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScopeFrame {
    pub header: ScopeHeader,
    /// Number of sample entries.
    pub samples: usize,
}

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("scope frame must be structured data, found {0}")]
    NotData(&'static str),
    #[error("scope frame must be a two-element array")]
    Shape,
    #[error("invalid scope frame header: {0}")]
    Header(#[from] serde_json::Error),
    #[error("scope frame sample rate must be positive, found {0}")]
    Rate(f64),
    #[error("scope frame samples must be an array")]
    Samples,
}

/// Parse and validate one frame.
pub fn parse_frame(value: &Value) -> std::result::Result<ScopeFrame, FrameError> {
    let data = value
        .as_data()
        .ok_or_else(|| FrameError::NotData(value.kind_name()))?;
    let [header, samples] = data.as_array().map(Vec::as_slice).ok_or(FrameError::Shape)? else {
        return Err(FrameError::Shape);
    };
    let header = ScopeHeader::deserialize(header)?;
    if header.rate.is_nan() || header.rate <= 0.0 {
        return Err(FrameError::Rate(header.rate));
    }
    let samples = samples.as_array().ok_or(FrameError::Samples)?.len();
    Ok(ScopeFrame { header, samples })
}

fn render(element: &Element, frame: &ScopeFrame) {
    element.set_attribute("data-freq", frame.header.freq.to_string());
    element.set_attribute("data-rate", frame.header.rate.to_string());
    element.set_attribute("data-samples", frame.samples.to_string());
}

struct ScopeState {
    frame: Option<ScopeFrame>,
    accepted: u64,
    rejected: u64,
}

pub struct ScopePlot {
    element: Element,
    state: Rc<RefCell<ScopeState>>,
    _subscription: Subscription,
}

impl fmt::Debug for ScopePlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopePlot")
            .field("frame", &self.state.borrow().frame)
            .finish_non_exhaustive()
    }
}

impl ScopePlot {
    pub fn new(config: WidgetConfig) -> Result<Self> {
        let initial = config
            .target
            .with(parse_frame)
            .map_err(|err| DispatchError::configuration(err.to_string()))?;

        let element = config.element.clone();
        element.add_class("widget-ScopePlot");
        render(&element, &initial);
        let state = Rc::new(RefCell::new(ScopeState {
            frame: Some(initial),
            accepted: 1,
            rejected: 0,
        }));

        let weak = Rc::downgrade(&state);
        let view = element.clone();
        let subscription = config.target.subscribe(&config.scheduler, move |value| {
            let Some(state) = weak.upgrade() else {
                return;
            };
            let mut state = state.borrow_mut();
            match parse_frame(value) {
                Ok(frame) => {
                    trace!(samples = frame.samples, "scope frame");
                    render(&view, &frame);
                    state.frame = Some(frame);
                    state.accepted += 1;
                }
                Err(err) => {
                    warn!(error = %err, "skipping malformed scope frame");
                    state.rejected += 1;
                }
            }
        });

        Ok(Self {
            element,
            state,
            _subscription: subscription,
        })
    }

    /// Latest valid frame.
    #[must_use]
    pub fn frame(&self) -> Option<ScopeFrame> {
        self.state.borrow().frame
    }

    /// `(accepted, rejected)` frame counts, the initial frame included.
    #[must_use]
    pub fn frame_counts(&self) -> (u64, u64) {
        let state = self.state.borrow();
        (state.accepted, state.rejected)
    }
}

impl Widget for ScopePlot {
    fn element(&self) -> &Element {
        &self.element
    }

    fn kind(&self) -> WidgetKind {
        WidgetKind::of::<Self>("ScopePlot")
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use radiant_core::{Cell, Scheduler, ValueType};
    use radiant_runtime::{Index, MemoryStore, StorageNamespace};
    use serde_json::json;

    use super::*;
    use crate::widget::NoActions;

    fn plot(sched: &Scheduler, cell: &Cell) -> Result<ScopePlot> {
        ScopePlot::new(WidgetConfig::new(
            sched,
            cell.clone(),
            StorageNamespace::new(Rc::new(MemoryStore::new()), "scope"),
            Index::new(sched, cell.clone()),
            None,
            Rc::new(NoActions),
        ))
    }

    #[test]
    fn parses_header_and_counts_samples() {
        let frame = parse_frame(&json!([{"freq": 100.5, "rate": 48000}, [1, 2, 3]]).into()).unwrap();
        assert_eq!(frame.header.freq, 100.5);
        assert_eq!(frame.header.rate, 48000.0);
        assert_eq!(frame.samples, 3);
    }

    #[test]
    fn rejects_malformed_frames() {
        assert!(matches!(parse_frame(&Value::Null), Err(FrameError::NotData("null"))));
        assert!(matches!(parse_frame(&json!([1]).into()), Err(FrameError::Shape)));
        assert!(matches!(
            parse_frame(&json!([{"freq": 0}, []]).into()),
            Err(FrameError::Header(_))
        ));
        assert!(matches!(
            parse_frame(&json!([{"freq": 0, "rate": 0}, []]).into()),
            Err(FrameError::Rate(_))
        ));
        assert!(matches!(
            parse_frame(&json!([{"freq": 0, "rate": 1}, 5]).into()),
            Err(FrameError::Samples)
        ));
    }

    #[test]
    fn keeps_last_valid_frame() {
        let sched = Scheduler::new();
        let cell = Cell::local(ValueType::Any, json!([{"freq": 0, "rate": 1}, []]));
        let plot = plot(&sched, &cell).unwrap();
        assert_eq!(plot.frame().map(|f| f.samples), Some(0));

        cell.set(json!([{"freq": 5, "rate": 2}, [0.5, 0.25]])).unwrap();
        sched.run_until_idle(4);
        cell.set(json!("garbage")).unwrap();
        sched.run_until_idle(4);

        let frame = plot.frame().unwrap();
        assert_eq!(frame.header.freq, 5.0);
        assert_eq!(frame.samples, 2);
        assert_eq!(plot.frame_counts(), (2, 1));
        assert_eq!(plot.element().attribute("data-samples").as_deref(), Some("2"));
    }

    #[test]
    fn malformed_initial_frame_is_configuration_error() {
        let sched = Scheduler::new();
        let cell = Cell::local(ValueType::Any, 3.0);
        assert!(matches!(
            plot(&sched, &cell),
            Err(DispatchError::Configuration { .. })
        ));
    }
}
