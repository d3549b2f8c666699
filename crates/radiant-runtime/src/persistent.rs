#![forbid(unsafe_code)]

//! Writable cells mirrored into a storage namespace.
//!
//! A [`PersistentCell`] restores its value from storage when created,
//! writes the restored (or default) value back immediately, and writes every
//! later change back when the scheduler delivers it. UI-local state such as a
//! map viewport survives reloads this way.

use std::fmt;

use radiant_core::{Cell, Scheduler, Subscription, Value, ValueType};
use tracing::{debug, warn};

use crate::error::StorageError;
use crate::storage::StorageNamespace;

pub struct PersistentCell {
    cell: Cell,
    key: String,
    restored: bool,
    _subscription: Subscription,
}

impl fmt::Debug for PersistentCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistentCell")
            .field("key", &self.key)
            .field("restored", &self.restored)
            .field("cell", &self.cell)
            .finish()
    }
}

impl PersistentCell {
    /// Bind `key` of `storage` to a new writable cell.
    ///
    /// A stored value that does not parse as `value_type` is ignored in favor
    /// of `default`.
    pub fn new(
        scheduler: &Scheduler,
        storage: &StorageNamespace,
        key: &str,
        value_type: ValueType,
        default: impl Into<Value>,
    ) -> Result<Self, StorageError> {
        let stored = storage.get_item(key);
        let parsed = stored.as_deref().and_then(|text| {
            let parsed = value_type.parse_stored(text);
            if parsed.is_none() {
                warn!(key, stored = text, "ignoring unparseable stored value");
            }
            parsed
        });
        let restored = parsed.is_some();
        let initial = parsed.unwrap_or_else(|| default.into());
        let cell = Cell::try_local(value_type, initial).map_err(|source| {
            StorageError::InvalidDefault {
                key: key.to_owned(),
                source,
            }
        })?;

        if let Some(text) = cell.value_type().format_stored(&cell.get()) {
            storage.set_item(key, &text)?;
        }
        debug!(key, restored, "persistent cell bound");

        let sink = storage.clone();
        let sink_key = key.to_owned();
        let value_type = cell.value_type().clone();
        let subscription = cell.subscribe(scheduler, move |value| {
            let Some(text) = value_type.format_stored(value) else {
                return;
            };
            if let Err(err) = sink.set_item(&sink_key, &text) {
                warn!(key = %sink_key, error = %err, "failed to persist cell");
            }
        });

        Ok(Self {
            cell,
            key: key.to_owned(),
            restored,
            _subscription: subscription,
        })
    }

    #[must_use]
    pub fn cell(&self) -> &Cell {
        &self.cell
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Whether the initial value came from storage rather than the default.
    #[must_use]
    pub fn restored(&self) -> bool {
        self.restored
    }
}
