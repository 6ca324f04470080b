//! Keyturn Log - logging setup for the keyturn tools
//!
//! Installs a `tracing` subscriber with an `EnvFilter` and a pretty, compact
//! or JSON fmt layer writing to stderr, so stdout stays free for reports.
//!
//! ```no_run
//! let _guard = keyturn_log::init_with(keyturn_log::Config::from_env())?;
//! tracing::info!(secret = "svc/bot", "Rotation started");
//! # Ok::<(), keyturn_log::LogError>(())
//! ```
#![forbid(unsafe_code)]

mod builder;
mod config;
mod error;

pub use builder::{LoggerBuilder, LoggerGuard};
pub use config::{Config, DisplayConfig, Fields, Format};
pub use error::{LogError, LogResult};

/// Initialize logging with an explicit configuration
///
/// # Errors
///
/// See [`LoggerBuilder::build`].
pub fn init_with(config: Config) -> LogResult<LoggerGuard> {
    LoggerBuilder::from_config(config).build()
}
