//! Configuration sections shared by forge binaries

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::logging::LogConfig;

/// Default database file location
pub const DEFAULT_DB_PATH: &str = "data/forge.db";

/// SQLite database settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database file path
    pub path: String,
    /// Maximum pool connections
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: DEFAULT_DB_PATH.to_string(),
            max_connections: 5,
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Base level ("info", "debug", ...)
    pub level: String,
    /// Directory for log files
    pub dir: String,
    /// Also write rolling log files
    pub file: bool,
    /// JSON lines in the log file
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            dir: "logs".to_string(),
            file: false,
            json: false,
        }
    }
}

impl LoggingConfig {
    /// Build the runtime logger configuration for a service
    pub fn to_log_config(&self, service_name: &str) -> LogConfig {
        LogConfig {
            service_name: service_name.to_string(),
            level: self.level.clone(),
            log_dir: PathBuf::from(&self.dir),
            enable_file: self.file,
            enable_json: self.json,
            ..Default::default()
        }
    }
}
