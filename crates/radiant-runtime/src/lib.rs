#![forbid(unsafe_code)]

//! Session runtime for Radiant.
//!
//! - [`storage`]: prefix-scoped namespaces over memory or file stores.
//! - [`persistent`]: cells mirrored into a namespace.
//! - [`index`]: capability lookups over the live block tree.
//! - [`session`]: the owner of a scheduler and a store.
//! - [`config`] / [`logging`]: session configuration and subscriber setup.

pub mod config;
pub mod error;
pub mod index;
pub mod logging;
pub mod persistent;
pub mod session;
pub mod storage;

pub use config::{LogConfig, SessionConfig, StorageBackendConfig};
pub use error::{ConfigError, Result, RuntimeError, StorageError};
pub use index::Index;
pub use persistent::PersistentCell;
pub use session::Session;
pub use storage::{FileStore, KeyValueStore, MemoryStore, StorageNamespace};
