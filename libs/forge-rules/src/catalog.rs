//! Catalog Adapter - read-only lookups of functions and fields
//!
//! The rule engine never mutates catalog entries through this seam. The
//! usage counts double as delete guards and take any executor so callers
//! can run them inside the transaction that performs the delete.

use async_trait::async_trait;
use sqlx::{Executor, Row, Sqlite, SqlitePool};
use tracing::debug;

use crate::error::{Result, RuleError};
use crate::types::{FieldRef, FunctionRef};

/// Lookups the line builder and delete guards depend on
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Function name, parameter count and declared parameter types;
    /// `NotFound` when unknown
    async fn lookup_function(&self, id: i64) -> Result<FunctionRef>;

    /// Field name and type; `None` for an absent id or an unknown field
    async fn lookup_field(&self, id: Option<i64>) -> Result<Option<FieldRef>>;

    /// Number of rule lines invoking the function
    async fn count_function_usages(&self, function_id: i64) -> Result<i64>;

    /// Number of rule group memberships referencing the rule
    async fn count_rule_group_usages(&self, rule_id: i64) -> Result<i64>;
}

/// Catalog backed by the rule database itself
#[derive(Debug, Clone)]
pub struct SqliteCatalog {
    pool: SqlitePool,
}

impl SqliteCatalog {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl Catalog for SqliteCatalog {
    async fn lookup_function(&self, id: i64) -> Result<FunctionRef> {
        let row = sqlx::query("SELECT name, param_count FROM functions WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Err(RuleError::not_found("Function", id));
        };

        let param_types: Vec<String> = sqlx::query_scalar(
            "SELECT param_type FROM function_params WHERE function_id = ? ORDER BY seq ASC",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(FunctionRef {
            name: row.try_get("name")?,
            param_count: row.try_get("param_count")?,
            param_types,
        })
    }

    async fn lookup_field(&self, id: Option<i64>) -> Result<Option<FieldRef>> {
        let Some(id) = id else {
            return Ok(None);
        };

        let row = sqlx::query("SELECT name, field_type FROM fields WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(FieldRef {
                name: row.try_get("name")?,
                field_type: row.try_get("field_type")?,
            })),
            None => {
                debug!("Field {} not in catalog", id);
                Ok(None)
            },
        }
    }

    async fn count_function_usages(&self, function_id: i64) -> Result<i64> {
        count_function_usages(&self.pool, function_id).await
    }

    async fn count_rule_group_usages(&self, rule_id: i64) -> Result<i64> {
        count_rule_group_usages(&self.pool, rule_id).await
    }
}

/// Delete guard for functions
pub async fn count_function_usages<'e, E>(executor: E, function_id: i64) -> Result<i64>
where
    E: Executor<'e, Database = Sqlite>,
{
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM rule_lines WHERE function_id = ?")
        .bind(function_id)
        .fetch_one(executor)
        .await?;
    Ok(count)
}

/// Delete guard for rules
pub async fn count_rule_group_usages<'e, E>(executor: E, rule_id: i64) -> Result<i64>
where
    E: Executor<'e, Database = Sqlite>,
{
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM rule_group_rules WHERE rule_id = ?")
            .bind(rule_id)
            .fetch_one(executor)
            .await?;
    Ok(count)
}
