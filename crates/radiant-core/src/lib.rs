#![forbid(unsafe_code)]

//! Reactive cell core for Radiant.
//!
//! - [`Value`] / [`ValueType`]: the dynamic values cells hold and the
//!   descriptors that validate them.
//! - [`Cell`]: an observable single-value container; [`Subscription`] is its
//!   RAII de-registration guard.
//! - [`DerivedCell`]: a read-only cell recomputed from other cells.
//! - [`Block`]: a named, ordered collection of cells with capability markers.
//! - [`Scheduler`]: the cooperative tick loop every notification goes through.
//!
//! # Architecture
//!
//! Everything here is single-threaded (`Rc`/`RefCell`). Mutation is
//! synchronous; subscribers run only when the owning [`Scheduler`] flushes.

pub mod block;
pub mod cell;
pub mod derived;
pub mod error;
pub mod scheduler;
pub mod value;

pub use block::{Block, BlockBuilder, BlockId, CAPABILITY_PREFIX, WeakBlock, capability_of, marker_key};
pub use cell::{Cell, CellId, Subscription, WeakCell, WritePolicy};
pub use derived::DerivedCell;
pub use error::{CellError, Result};
pub use scheduler::{FlushReport, HostHook, ManualHost, Scheduler, TaskKey, WeakScheduler};
pub use value::{Value, ValueType, format_number, parse_number};
