#![forbid(unsafe_code)]

//! Observable single-value cells.
//!
//! # Design
//!
//! A [`Cell`] is a shared handle (`Rc`) to a value, its declared
//! [`ValueType`], a [`WritePolicy`], and a list of subscriber slots. Each slot
//! keeps a `Weak` pointer to its callback; the strong pointer lives in the
//! [`Subscription`] guard returned to the subscriber, so dropping the guard is
//! all it takes to unsubscribe. Dead slots are pruned lazily on the next
//! notification.
//!
//! Notification is never synchronous. [`Cell::set`] stores the value at once
//! and enqueues one keyed task per live subscriber on that subscriber's
//! [`Scheduler`]. The key is per-slot, so several sets within a tick reach a
//! subscriber once, with the value current at flush time.
//!
//! # Invariants
//!
//! 1. `get()` after a successful `set()` returns the new value before any
//!    subscriber runs.
//! 2. A set whose value is identical ([`Value::same_value`]) to the current
//!    one is a no-op: no version bump, no notification. `0` and `-0` are not
//!    identical.
//! 3. Version increments exactly once per effective set.
//! 4. Constant and derived cells reject `set` with [`CellError::Immutable`].
//! 5. Dropping a [`Subscription`] before the flush guarantees its callback
//!    does not run.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::trace;

use crate::error::CellError;
use crate::scheduler::{Scheduler, TaskKey};
use crate::value::{Value, ValueType};

static NEXT_CELL_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique cell identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellId(u64);

impl CellId {
    fn next() -> Self {
        Self(NEXT_CELL_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Who may change a cell's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WritePolicy {
    /// Fixed at construction.
    Constant,
    /// Settable by any holder.
    Writable,
    /// Recomputed from other cells; not settable from outside.
    Derived,
}

type Callback = dyn Fn(&Value);

struct SubscriberSlot {
    key: TaskKey,
    scheduler: Scheduler,
    callback: Weak<Callback>,
}

struct CellInner {
    id: CellId,
    policy: WritePolicy,
    value_type: ValueType,
    value: RefCell<Value>,
    version: std::cell::Cell<u64>,
    subscribers: RefCell<Vec<SubscriberSlot>>,
}

/// Shared handle to an observable value.
///
/// Cloning creates a new handle to the **same** cell.
#[derive(Clone)]
pub struct Cell {
    inner: Rc<CellInner>,
}

impl fmt::Debug for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cell")
            .field("id", &self.inner.id)
            .field("policy", &self.inner.policy)
            .field("value_type", &self.inner.value_type)
            .field("value", &*self.inner.value.borrow())
            .field("version", &self.inner.version.get())
            .finish()
    }
}

impl Cell {
    fn with_policy(policy: WritePolicy, value_type: ValueType, initial: Value) -> Self {
        assert!(
            value_type.check(&initial),
            "initial value {initial:?} does not satisfy {value_type:?}"
        );
        Self {
            inner: Rc::new(CellInner {
                id: CellId::next(),
                policy,
                value_type,
                value: RefCell::new(initial),
                version: std::cell::Cell::new(0),
                subscribers: RefCell::new(Vec::new()),
            }),
        }
    }

    /// A read-only cell whose value never changes.
    ///
    /// # Panics
    ///
    /// Panics if `value` does not satisfy `value_type`. Use
    /// [`try_constant`](Self::try_constant) for unchecked input.
    #[must_use]
    pub fn constant(value_type: ValueType, value: impl Into<Value>) -> Self {
        Self::with_policy(WritePolicy::Constant, value_type, value.into())
    }

    /// A locally writable cell.
    ///
    /// # Panics
    ///
    /// Panics if `initial` does not satisfy `value_type`. Use
    /// [`try_local`](Self::try_local) for unchecked input.
    #[must_use]
    pub fn local(value_type: ValueType, initial: impl Into<Value>) -> Self {
        Self::with_policy(WritePolicy::Writable, value_type, initial.into())
    }

    /// A locally writable cell, rejecting an initial value of the wrong type.
    pub fn try_local(value_type: ValueType, initial: impl Into<Value>) -> Result<Self, CellError> {
        let initial = initial.into();
        if !value_type.check(&initial) {
            return Err(CellError::type_mismatch(&value_type, &initial));
        }
        Ok(Self::with_policy(WritePolicy::Writable, value_type, initial))
    }

    /// A constant cell, rejecting a value of the wrong type.
    pub fn try_constant(value_type: ValueType, value: impl Into<Value>) -> Result<Self, CellError> {
        let value = value.into();
        if !value_type.check(&value) {
            return Err(CellError::type_mismatch(&value_type, &value));
        }
        Ok(Self::with_policy(WritePolicy::Constant, value_type, value))
    }

    pub(crate) fn derived(value_type: ValueType, initial: Value) -> Self {
        Self::with_policy(WritePolicy::Derived, value_type, initial)
    }

    #[must_use]
    pub fn id(&self) -> CellId {
        self.inner.id
    }

    #[must_use]
    pub fn policy(&self) -> WritePolicy {
        self.inner.policy
    }

    #[must_use]
    pub fn is_writable(&self) -> bool {
        self.inner.policy == WritePolicy::Writable
    }

    #[must_use]
    pub fn value_type(&self) -> &ValueType {
        &self.inner.value_type
    }

    /// Current value.
    #[must_use]
    pub fn get(&self) -> Value {
        self.inner.value.borrow().clone()
    }

    /// Borrow the current value without cloning.
    ///
    /// # Panics
    ///
    /// Panics if `f` sets this same cell (re-entrant borrow).
    pub fn with<R>(&self, f: impl FnOnce(&Value) -> R) -> R {
        f(&self.inner.value.borrow())
    }

    /// Number of effective sets since construction.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.version.get()
    }

    /// Store `value` after checking the write policy and declared type.
    pub fn set(&self, value: impl Into<Value>) -> Result<(), CellError> {
        if self.inner.policy != WritePolicy::Writable {
            return Err(CellError::Immutable { cell: self.id() });
        }
        let value = value.into();
        if !self.inner.value_type.check(&value) {
            return Err(CellError::type_mismatch(&self.inner.value_type, &value));
        }
        self.store(value);
        Ok(())
    }

    /// Store without policy checks. Returns whether the value changed.
    pub(crate) fn store(&self, value: Value) -> bool {
        {
            let mut current = self.inner.value.borrow_mut();
            if current.same_value(&value) {
                return false;
            }
            *current = value;
        }
        self.inner.version.set(self.inner.version.get() + 1);
        self.notify();
        true
    }

    fn notify(&self) {
        let targets: Vec<(Scheduler, TaskKey, Weak<Callback>)> = {
            let mut subs = self.inner.subscribers.borrow_mut();
            subs.retain(|slot| slot.callback.strong_count() > 0);
            subs.iter()
                .map(|slot| (slot.scheduler.clone(), slot.key, slot.callback.clone()))
                .collect()
        };
        trace!(cell = self.id().raw(), subscribers = targets.len(), "cell changed");
        for (scheduler, key, callback) in targets {
            let cell = Rc::downgrade(&self.inner);
            scheduler.enqueue_keyed(key, move || {
                let (Some(callback), Some(cell)) = (callback.upgrade(), cell.upgrade()) else {
                    return;
                };
                let value = cell.value.borrow().clone();
                callback(&value);
            });
        }
    }

    /// Run `callback` on a future flush of `scheduler` after each effective set.
    ///
    /// Nothing runs at subscription time. Slots of dropped subscriptions are
    /// pruned here as well as on change, so a cell that never changes does
    /// not accumulate them.
    pub fn subscribe(
        &self,
        scheduler: &Scheduler,
        callback: impl Fn(&Value) + 'static,
    ) -> Subscription {
        let callback: Rc<Callback> = Rc::new(callback);
        let mut subs = self.inner.subscribers.borrow_mut();
        subs.retain(|slot| slot.callback.strong_count() > 0);
        subs.push(SubscriberSlot {
            key: scheduler.allocate_key(),
            scheduler: scheduler.clone(),
            callback: Rc::downgrade(&callback),
        });
        Subscription {
            callback: Some(callback),
        }
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner
            .subscribers
            .borrow()
            .iter()
            .filter(|slot| slot.callback.strong_count() > 0)
            .count()
    }

    /// Registered slots, dead ones included.
    #[cfg(test)]
    pub(crate) fn slot_count(&self) -> usize {
        self.inner.subscribers.borrow().len()
    }

    /// Whether two handles refer to the same cell.
    #[must_use]
    pub fn ptr_eq(&self, other: &Cell) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Non-owning handle.
    #[must_use]
    pub fn downgrade(&self) -> WeakCell {
        WeakCell {
            id: self.inner.id,
            inner: Rc::downgrade(&self.inner),
        }
    }
}

/// Non-owning handle to a [`Cell`].
#[derive(Clone)]
pub struct WeakCell {
    id: CellId,
    inner: Weak<CellInner>,
}

impl fmt::Debug for WeakCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakCell")
            .field("id", &self.id)
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}

impl WeakCell {
    #[must_use]
    pub fn id(&self) -> CellId {
        self.id
    }

    #[must_use]
    pub fn upgrade(&self) -> Option<Cell> {
        self.inner.upgrade().map(|inner| Cell { inner })
    }
}

/// RAII guard for a cell subscription.
///
/// Dropping it (or calling [`cancel`](Self::cancel)) de-registers the callback.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    callback: Option<Rc<Callback>>,
}

impl Subscription {
    /// De-register explicitly.
    pub fn cancel(mut self) {
        self.callback = None;
    }

    /// Whether the callback is still registered.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.callback.is_some()
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}
