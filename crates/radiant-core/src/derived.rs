#![forbid(unsafe_code)]

//! Read-only cells recomputed from other cells.
//!
//! # Design
//!
//! [`DerivedCell`] pairs a [`Cell`] with [`WritePolicy::Derived`] and the
//! subscriptions that keep it current. Each source subscription runs the
//! compute function over a snapshot of every source and stores the result.
//! Recomputation therefore happens in the flush that delivers the source
//! change, and the derived cell's own subscribers hear about it one tick
//! later.
//!
//! # Invariants
//!
//! 1. The initial value is computed eagerly at construction and must satisfy
//!    the declared type; otherwise construction fails with
//!    [`CellError::TypeMismatch`].
//! 2. Sources changing several times in one tick cause one recomputation per
//!    source subscription and at most one notification downstream.
//! 3. A computed value rejected by the declared type is discarded (logged);
//!    the previous value stays.
//!
//! # Failure Modes
//!
//! - **Compute function panics**: the scheduler isolates the panic; the
//!   derived cell keeps its last value.
//! - **DerivedCell dropped**: its subscriptions go with it, so sources stop
//!   driving recomputation. Outstanding [`Cell`] handles keep the last value.
//!
//! [`WritePolicy::Derived`]: crate::WritePolicy::Derived

use std::cell::Cell as Counter;
use std::fmt;
use std::rc::Rc;

use tracing::warn;

use crate::cell::{Cell, Subscription};
use crate::error::CellError;
use crate::scheduler::Scheduler;
use crate::value::{Value, ValueType};

type Compute = dyn Fn(&[Value]) -> Value;

/// A cell whose value is a function of other cells.
pub struct DerivedCell {
    cell: Cell,
    recomputations: Rc<Counter<u64>>,
    _subscriptions: Vec<Subscription>,
}

impl fmt::Debug for DerivedCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DerivedCell")
            .field("cell", &self.cell)
            .field("recomputations", &self.recomputations.get())
            .finish()
    }
}

fn snapshot(sources: &[Cell]) -> Vec<Value> {
    sources.iter().map(Cell::get).collect()
}

impl DerivedCell {
    /// Derive a cell from `sources` through `compute`.
    ///
    /// Fails if the initial computed value does not satisfy `value_type`.
    pub fn new(
        scheduler: &Scheduler,
        sources: &[Cell],
        value_type: ValueType,
        compute: impl Fn(&[Value]) -> Value + 'static,
    ) -> Result<Self, CellError> {
        let compute: Rc<Compute> = Rc::new(compute);
        let initial = compute(&snapshot(sources));
        if !value_type.check(&initial) {
            return Err(CellError::type_mismatch(&value_type, &initial));
        }
        let cell = Cell::derived(value_type, initial);
        let recomputations = Rc::new(Counter::new(0));

        let shared_sources: Rc<[Cell]> = sources.iter().cloned().collect();
        let subscriptions = sources
            .iter()
            .map(|source| {
                let target = cell.clone();
                let sources = Rc::clone(&shared_sources);
                let compute = Rc::clone(&compute);
                let count = Rc::clone(&recomputations);
                source.subscribe(scheduler, move |_| {
                    let next = compute(&snapshot(&sources));
                    count.set(count.get() + 1);
                    if target.value_type().check(&next) {
                        target.store(next);
                    } else {
                        warn!(cell = target.id().raw(), ?next, "derived value rejected");
                    }
                })
            })
            .collect();

        Ok(Self {
            cell,
            recomputations,
            _subscriptions: subscriptions,
        })
    }

    /// Derive a cell from a single source.
    pub fn map(
        scheduler: &Scheduler,
        source: &Cell,
        value_type: ValueType,
        map: impl Fn(&Value) -> Value + 'static,
    ) -> Result<Self, CellError> {
        Self::new(scheduler, std::slice::from_ref(source), value_type, move |values| {
            map(&values[0])
        })
    }

    /// Read-only handle to the derived value.
    #[must_use]
    pub fn cell(&self) -> &Cell {
        &self.cell
    }

    #[must_use]
    pub fn get(&self) -> Value {
        self.cell.get()
    }

    /// Recomputations triggered by source changes (the initial one excluded).
    #[must_use]
    pub fn recomputations(&self) -> u64 {
        self.recomputations.get()
    }
}
