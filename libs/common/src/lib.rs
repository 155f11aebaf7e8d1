//! Forge basic library
//!
//! Provides infrastructure shared by the forge crates:
//! - logging bootstrap
//! - SQLite client
//! - layered configuration loading

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub mod config_loader;
pub mod error;
pub mod logging;
pub mod service_config;

pub use config_loader::{figment_for, load_config, load_config_from_file};
pub use error::{Error, Result};
pub use service_config::{DatabaseConfig, LoggingConfig, DEFAULT_DB_PATH};

// Re-export common dependencies
pub use anyhow;
pub use serde;
