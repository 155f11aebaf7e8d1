//! Configuration loading helpers
//!
//! Layered loading with `figment`: files under `config/`, then
//! service-prefixed environment variables.

use figment::{
    providers::{Env, Format, Json, Toml, Yaml},
    Figment,
};
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

use crate::error::{Error, Result};

/// Environment variable selecting the environment-specific config file
pub const ENV_FORGE_ENV: &str = "FORGE_ENV";

/// Build the layered provider stack for a service
///
/// Priority (highest to lowest):
/// 1. Environment variables prefixed with `<SERVICE>_` (`__` separates nesting)
/// 2. Service-specific file (e.g., config/forgectl.yaml)
/// 3. Local overrides (config/local.yaml)
/// 4. Environment-specific file (e.g., config/production.yaml)
/// 5. Default file (config/default.yaml)
pub fn figment_for(service_name: &str) -> Figment {
    let env = std::env::var(ENV_FORGE_ENV).unwrap_or_else(|_| "development".to_string());
    let prefix = format!("{}_", service_name.to_uppercase().replace('-', "_"));

    Figment::new()
        .merge(Toml::file("config/default.toml"))
        .merge(Yaml::file("config/default.yaml"))
        .merge(Toml::file(format!("config/{}.toml", env)))
        .merge(Yaml::file(format!("config/{}.yaml", env)))
        .merge(Toml::file("config/local.toml"))
        .merge(Yaml::file("config/local.yaml"))
        .merge(Toml::file(format!("config/{}.toml", service_name)))
        .merge(Yaml::file(format!("config/{}.yaml", service_name)))
        .merge(Env::prefixed(&prefix).split("__"))
}

/// Load configuration from the layered sources
///
/// Missing files are skipped; `T`'s serde defaults fill the gaps.
pub fn load_config<T>(service_name: &str) -> Result<T>
where
    T: for<'de> Deserialize<'de>,
{
    debug!("Loading configuration for {}", service_name);
    figment_for(service_name)
        .extract()
        .map_err(|e| Error::Config(format!("Failed to load configuration: {}", e)))
}

/// Load configuration from a specific file, picking the format by extension
pub fn load_config_from_file<T, P>(path: P) -> Result<T>
where
    T: for<'de> Deserialize<'de>,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(|s| s.to_str())
        .ok_or_else(|| Error::Config("Config file must have an extension".to_string()))?;

    let figment = match extension {
        "toml" => Figment::new().merge(Toml::file(path)),
        "yaml" | "yml" => Figment::new().merge(Yaml::file(path)),
        "json" => Figment::new().merge(Json::file(path)),
        _ => {
            return Err(Error::Config(format!(
                "Unsupported config file format: {}",
                extension
            )))
        },
    };

    figment
        .extract()
        .map_err(|e| Error::Config(format!("Failed to load configuration from file: {}", e)))
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use crate::service_config::{DatabaseConfig, LoggingConfig};
    use serde::Deserialize;

    #[derive(Debug, Default, Deserialize)]
    #[serde(default)]
    struct SampleConfig {
        database: DatabaseConfig,
        logging: LoggingConfig,
    }

    #[test]
    fn test_load_yaml_file_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("forge.yaml");
        std::fs::write(&path, "database:\n  path: /tmp/rules.db\n").unwrap();

        let config: SampleConfig = load_config_from_file(&path).unwrap();
        assert_eq!(config.database.path, "/tmp/rules.db");
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_load_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("forge.toml");
        std::fs::write(&path, "[logging]\nlevel = \"debug\"\nfile = true\n").unwrap();

        let config: SampleConfig = load_config_from_file(&path).unwrap();
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.file);
    }

    #[test]
    fn test_unsupported_extension_rejected() {
        let err = load_config_from_file::<SampleConfig, _>("forge.ini").unwrap_err();
        assert!(err.to_string().contains("Unsupported config file format"));
    }
}
