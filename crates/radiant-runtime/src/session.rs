#![forbid(unsafe_code)]

//! Session: the owner of one scheduler and one backing store.
//!
//! Every component receives the scheduler and storage it needs from the
//! session instead of reaching for window-global state. Dropping the session
//! handle (and the components built from it) ends the tick domain.

use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use radiant_core::{Cell, HostHook, ManualHost, Scheduler};
use tracing::info;
use web_time::{SystemTime, UNIX_EPOCH};

use crate::config::{SessionConfig, StorageBackendConfig};
use crate::error::StorageError;
use crate::index::Index;
use crate::storage::{FileStore, KeyValueStore, MemoryStore, StorageNamespace};

static NEXT_NAMESPACE: AtomicU64 = AtomicU64::new(1);

pub struct Session {
    config: SessionConfig,
    scheduler: Scheduler,
    store: Rc<dyn KeyValueStore>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.config)
            .field("scheduler", &self.scheduler)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Session with a [`ManualHost`]; the embedder drives ticks with [`drain`](Self::drain).
    pub fn new(config: SessionConfig) -> Result<Self, StorageError> {
        Self::with_host(config, Rc::new(ManualHost::new()))
    }

    /// Session configured from `RADIANT_*` environment variables.
    pub fn from_env() -> crate::Result<Self> {
        let config = SessionConfig::from_env()?;
        Ok(Self::new(config)?)
    }

    /// Session whose scheduler asks `host` for flushes.
    pub fn with_host(config: SessionConfig, host: Rc<dyn HostHook>) -> Result<Self, StorageError> {
        let store: Rc<dyn KeyValueStore> = match &config.storage {
            StorageBackendConfig::Memory => Rc::new(MemoryStore::new()),
            StorageBackendConfig::File { path } => Rc::new(FileStore::open(path.clone())?),
        };
        info!(storage = ?config.storage, "session started");
        Ok(Self {
            config,
            scheduler: Scheduler::with_host(host),
            store,
        })
    }

    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    #[must_use]
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    #[must_use]
    pub fn store(&self) -> Rc<dyn KeyValueStore> {
        Rc::clone(&self.store)
    }

    #[must_use]
    pub fn namespace(&self, prefix: &str) -> StorageNamespace {
        StorageNamespace::new(Rc::clone(&self.store), prefix)
    }

    /// Namespace under a prefix no other call in any process run will produce.
    #[must_use]
    pub fn unique_namespace(&self) -> StorageNamespace {
        let serial = NEXT_NAMESPACE.fetch_add(1, Ordering::Relaxed);
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_nanos());
        self.namespace(&format!("{nanos:x}-{serial:x}"))
    }

    /// Capability index rooted at `root`, driven by this session's scheduler.
    #[must_use]
    pub fn index(&self, root: Cell) -> Index {
        Index::new(&self.scheduler, root)
    }

    /// Flush until idle, bounded by `max_ticks_per_drain`. Returns ticks run.
    pub fn drain(&self) -> usize {
        self.scheduler
            .run_until_idle(self.config.max_ticks_per_drain)
    }
}
