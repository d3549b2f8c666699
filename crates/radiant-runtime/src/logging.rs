#![forbid(unsafe_code)]

//! Subscriber installation for binaries embedding a session.
//!
//! Library code only emits `tracing` events. With the `logging` feature,
//! [`init`] installs a `tracing-subscriber` fmt subscriber filtered by
//! [`LogConfig::filter`]; without it, [`init`] does nothing.

use crate::config::LogConfig;
use crate::error::ConfigError;

#[cfg(feature = "logging")]
pub fn init(config: &LogConfig) -> Result<(), ConfigError> {
    use tracing_subscriber::EnvFilter;

    let filter =
        EnvFilter::try_new(&config.filter).map_err(|err| ConfigError::InvalidLogFilter {
            filter: config.filter.clone(),
            message: err.to_string(),
        })?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let installed = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|err| ConfigError::LoggingInit(err.to_string()))
}

#[cfg(not(feature = "logging"))]
pub fn init(_config: &LogConfig) -> Result<(), ConfigError> {
    Ok(())
}
