#![forbid(unsafe_code)]

//! Cooperative, single-threaded update scheduler.
//!
//! Cell mutations are synchronous, but everything a subscriber observes is
//! deferred to the next *tick*: a [`Scheduler::flush`] that drains the tasks
//! pending when it started. The scheduler never runs a task from inside
//! [`enqueue`](Scheduler::enqueue); it only asks its [`HostHook`] to arrange a
//! flush, the way a browser schedules a microtask.
//!
//! # Invariants
//!
//! 1. Tasks of one tick run in enqueue order.
//! 2. A task enqueued while tick N is flushing runs in tick N+1 or later.
//! 3. A keyed task enqueued again before its tick starts is dropped
//!    (coalescing), so a cell set five times in a tick notifies once.
//! 4. A task that panics is caught; later tasks of the same tick still run
//!    and the scheduler remains usable.
//! 5. A `flush()` issued from inside a running task is a no-op.
//!
//! # Host integration
//!
//! Production hosts implement [`HostHook`] and call `flush()` from their
//! event loop when asked. Tests use [`ManualHost`] and drive ticks by hand
//! with [`Scheduler::flush`] or [`Scheduler::run_until_idle`].

use std::cell::{Cell, RefCell};
use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::rc::{Rc, Weak};

use tracing::{error, trace};

/// Receives a request to flush the scheduler at some later point.
///
/// `request_flush` is called when the queue goes from idle to non-empty. The
/// host must not flush synchronously from inside this call.
pub trait HostHook {
    fn request_flush(&self);
}

/// Host hook for deterministic tests: counts requests and does nothing else.
#[derive(Debug, Default)]
pub struct ManualHost {
    requests: Cell<u64>,
}

impl ManualHost {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of flush requests received so far.
    #[must_use]
    pub fn requests(&self) -> u64 {
        self.requests.get()
    }
}

impl HostHook for ManualHost {
    fn request_flush(&self) {
        self.requests.set(self.requests.get() + 1);
    }
}

/// Coalescing key for [`Scheduler::enqueue_keyed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskKey(u64);

impl TaskKey {
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// Outcome of a single flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FlushReport {
    /// Tick number of this flush (0 when the flush was skipped).
    pub tick: u64,
    /// Tasks that ran to completion or panicked.
    pub ran: usize,
    /// Tasks that panicked.
    pub panicked: usize,
}

type Task = Box<dyn FnOnce()>;

struct Pending {
    key: Option<TaskKey>,
    task: Task,
}

struct SchedulerInner {
    queue: RefCell<VecDeque<Pending>>,
    /// Keys present in `queue`.
    pending_keys: RefCell<HashSet<TaskKey>>,
    flushing: Cell<bool>,
    tick: Cell<u64>,
    next_key: Cell<u64>,
    panics: Cell<u64>,
    host: Rc<dyn HostHook>,
}

/// Shared handle to a session's scheduler.
///
/// Cloning creates another handle to the **same** queue.
#[derive(Clone)]
pub struct Scheduler {
    inner: Rc<SchedulerInner>,
}

/// Non-owning scheduler handle, for hosts that must not keep it alive.
#[derive(Clone)]
pub struct WeakScheduler {
    inner: Weak<SchedulerInner>,
}

impl WeakScheduler {
    #[must_use]
    pub fn upgrade(&self) -> Option<Scheduler> {
        self.inner.upgrade().map(|inner| Scheduler { inner })
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("pending", &self.pending())
            .field("flushing", &self.is_flushing())
            .field("tick", &self.tick())
            .finish()
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    /// Create a scheduler driven by a [`ManualHost`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_host(Rc::new(ManualHost::new()))
    }

    /// Create a scheduler that notifies `host` when a flush is needed.
    #[must_use]
    pub fn with_host(host: Rc<dyn HostHook>) -> Self {
        Self {
            inner: Rc::new(SchedulerInner {
                queue: RefCell::new(VecDeque::new()),
                pending_keys: RefCell::new(HashSet::new()),
                flushing: Cell::new(false),
                tick: Cell::new(0),
                next_key: Cell::new(1),
                panics: Cell::new(0),
                host,
            }),
        }
    }

    #[must_use]
    pub fn downgrade(&self) -> WeakScheduler {
        WeakScheduler {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Whether two handles refer to the same scheduler.
    #[must_use]
    pub fn ptr_eq(&self, other: &Scheduler) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Allocate a fresh coalescing key.
    #[must_use]
    pub fn allocate_key(&self) -> TaskKey {
        let raw = self.inner.next_key.get();
        self.inner.next_key.set(raw + 1);
        TaskKey(raw)
    }

    /// Queue `task` for a future tick.
    pub fn enqueue(&self, task: impl FnOnce() + 'static) {
        self.push(Pending {
            key: None,
            task: Box::new(task),
        });
    }

    /// Queue `task` unless a task with the same key is already waiting.
    ///
    /// Returns `false` when the task was coalesced away.
    pub fn enqueue_keyed(&self, key: TaskKey, task: impl FnOnce() + 'static) -> bool {
        if !self.inner.pending_keys.borrow_mut().insert(key) {
            trace!(key = key.raw(), "coalesced scheduler task");
            return false;
        }
        self.push(Pending {
            key: Some(key),
            task: Box::new(task),
        });
        true
    }

    fn push(&self, pending: Pending) {
        let was_idle = {
            let mut queue = self.inner.queue.borrow_mut();
            let was_idle = queue.is_empty();
            queue.push_back(pending);
            was_idle
        };
        if was_idle && !self.inner.flushing.get() {
            self.inner.host.request_flush();
        }
    }

    /// Run every task that was pending when this call started.
    pub fn flush(&self) -> FlushReport {
        if self.inner.flushing.get() {
            trace!("re-entrant flush ignored");
            return FlushReport::default();
        }
        let batch = {
            let mut queue = self.inner.queue.borrow_mut();
            self.inner.pending_keys.borrow_mut().clear();
            std::mem::take(&mut *queue)
        };
        if batch.is_empty() {
            return FlushReport::default();
        }

        self.inner.flushing.set(true);
        let tick = self.inner.tick.get() + 1;
        self.inner.tick.set(tick);

        let mut report = FlushReport {
            tick,
            ..FlushReport::default()
        };
        for pending in batch {
            let Pending { key, task } = pending;
            report.ran += 1;
            if catch_unwind(AssertUnwindSafe(task)).is_err() {
                report.panicked += 1;
                self.inner.panics.set(self.inner.panics.get() + 1);
                error!(tick, key = key.map(TaskKey::raw), "scheduler task panicked");
            }
        }
        self.inner.flushing.set(false);

        trace!(tick, ran = report.ran, panicked = report.panicked, "scheduler flush");
        if !self.inner.queue.borrow().is_empty() {
            self.inner.host.request_flush();
        }
        report
    }

    /// Flush repeatedly until nothing is pending or `max_ticks` ran.
    ///
    /// Returns the number of ticks that ran.
    pub fn run_until_idle(&self, max_ticks: usize) -> usize {
        let mut ticks = 0;
        while ticks < max_ticks && self.pending() > 0 {
            self.flush();
            ticks += 1;
        }
        ticks
    }

    /// Number of queued tasks.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.inner.queue.borrow().len()
    }

    #[must_use]
    pub fn is_flushing(&self) -> bool {
        self.inner.flushing.get()
    }

    /// Number of the last tick that ran (0 before the first flush).
    #[must_use]
    pub fn tick(&self) -> u64 {
        self.inner.tick.get()
    }

    /// Total tasks that panicked over the scheduler's lifetime.
    #[must_use]
    pub fn panic_count(&self) -> u64 {
        self.inner.panics.get()
    }
}
