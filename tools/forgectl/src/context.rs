//! Database handle shared by all subcommands

use anyhow::{Context as _, Result};
use common::sqlite::SqliteClient;
use forge_rules::{init_schema, CodegenOptions, RuleEngine};
use sqlx::SqlitePool;
use tracing::debug;

use crate::config::ForgectlConfig;

pub struct CliContext {
    client: SqliteClient,
    engine: RuleEngine,
}

impl CliContext {
    /// Open the configured database and make sure the schema exists
    pub async fn open(config: &ForgectlConfig) -> Result<Self> {
        let client =
            SqliteClient::with_max_connections(&config.database.path, config.database.max_connections)
                .await
                .with_context(|| format!("Failed to open database {}", config.database.path))?;
        Self::from_client(client, config.codegen.clone()).await
    }

    pub async fn from_client(client: SqliteClient, options: CodegenOptions) -> Result<Self> {
        init_schema(client.pool()).await?;
        debug!("Using database {}", client.path());

        let engine = RuleEngine::new(client.pool().clone()).with_options(options);
        Ok(Self { client, engine })
    }

    pub fn pool(&self) -> &SqlitePool {
        self.client.pool()
    }

    pub fn engine(&self) -> &RuleEngine {
        &self.engine
    }

    pub fn db_path(&self) -> &str {
        self.client.path()
    }
}
