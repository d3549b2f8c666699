#![forbid(unsafe_code)]

//! Radiant public facade crate.
//!
//! Re-exports the core, runtime and (with the default `widgets` feature)
//! widget crates, and offers [`start`] to bring up a session from config.

use radiant_runtime::{ConfigError, RuntimeError, Session, SessionConfig};

pub mod prelude {
    pub use radiant_core as core;
    pub use radiant_runtime as runtime;
    #[cfg(feature = "widgets")]
    pub use radiant_widgets as widgets;

    pub use radiant_core::{Block, Cell, Scheduler, Subscription, Value, ValueType};
    pub use radiant_runtime::{Index, PersistentCell, Session, SessionConfig, StorageNamespace};
    #[cfg(feature = "widgets")]
    pub use radiant_widgets::{Widget, WidgetConfig, WidgetRegistry, pick_block};
}

/// Install logging per `config.log`, then open a session.
///
/// A subscriber already installed by the embedder is kept.
pub fn start(config: SessionConfig) -> Result<Session, RuntimeError> {
    match radiant_runtime::logging::init(&config.log) {
        Ok(()) => {}
        Err(ConfigError::LoggingInit(reason)) => {
            tracing::debug!(%reason, "keeping existing subscriber");
        }
        Err(err) => return Err(err.into()),
    }
    Ok(Session::new(config)?)
}

/// [`start`] with configuration read from `RADIANT_*` environment variables.
pub fn start_from_env() -> Result<Session, RuntimeError> {
    start(SessionConfig::from_env()?)
}
