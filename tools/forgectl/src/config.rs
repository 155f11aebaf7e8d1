//! forgectl configuration
//!
//! Layered through `common::load_config("forgectl")`: config files under
//! `config/`, then `FORGECTL_`-prefixed environment variables
//! (e.g. `FORGECTL_DATABASE__PATH`). An explicit `--config` file replaces
//! the layered lookup; `--db-path` and `--verbose` override both.

use anyhow::{Context, Result};
use common::{DatabaseConfig, LoggingConfig};
use forge_rules::CodegenOptions;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const SERVICE_NAME: &str = "forgectl";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ForgectlConfig {
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub codegen: CodegenOptions,
}

impl ForgectlConfig {
    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        match config_file {
            Some(path) => common::load_config_from_file(path)
                .with_context(|| format!("Failed to load config file {}", path.display())),
            None => common::load_config(SERVICE_NAME).context("Failed to load configuration"),
        }
    }

    /// Apply command-line overrides
    pub fn with_overrides(mut self, db_path: Option<&str>, verbose: bool) -> Self {
        if let Some(path) = db_path {
            self.database.path = path.to_string();
        }
        if verbose {
            self.logging.level = "debug".to_string();
        }
        self
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use forge_rules::QuotingStrategy;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ForgectlConfig::default();
        assert_eq!(config.database.path, "data/forge.db");
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.codegen.field_context, "fields");
        assert_eq!(config.codegen.quoting, QuotingStrategy::StringTagOnly);
    }

    #[test]
    fn test_load_yaml_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            "database:\n  path: /tmp/rules.db\ncodegen:\n  quoting: textual_types\n  field_context: record"
        )
        .unwrap();

        let config = ForgectlConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.database.path, "/tmp/rules.db");
        assert_eq!(config.codegen.quoting, QuotingStrategy::TextualTypes);
        assert_eq!(config.codegen.field_context, "record");
        // Unset sections keep their defaults
        assert_eq!(config.logging, LoggingConfig::default());
    }

    #[test]
    fn test_cli_overrides() {
        let config = ForgectlConfig::default().with_overrides(Some("other.db"), true);
        assert_eq!(config.database.path, "other.db");
        assert_eq!(config.logging.level, "debug");

        let untouched = ForgectlConfig::default().with_overrides(None, false);
        assert_eq!(untouched, ForgectlConfig::default());
    }
}
