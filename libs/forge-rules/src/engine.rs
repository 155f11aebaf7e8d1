//! Rule Engine - the four operations consumed by the CRUD layer
//!
//! Wraps the writes that change generated code so that each one is followed
//! by regeneration of the affected rules' cached condition/action code: rule
//! line writes refresh the owning rule, function and declared-parameter
//! writes refresh every rule with a line invoking the function.

use std::sync::Arc;

use sqlx::SqlitePool;
use tracing::{debug, info, warn};

use crate::catalog::{Catalog, SqliteCatalog};
use crate::codegen;
use crate::error::{Result, RuleError};
use crate::functions;
use crate::line_builder::build_rule_lines;
use crate::repository::{self, rule_exists};
use crate::resolver::CodegenOptions;
use crate::types::{
    FunctionParamInput, GeneratedCode, LineView, NewFunction, NewRuleLine, RuleLineUpdate,
};

/// Rule line writes and code generation over one rule database
pub struct RuleEngine<C: Catalog + ?Sized = SqliteCatalog> {
    /// SQLite pool for rule persistence
    pool: SqlitePool,
    /// Function/field lookups used during generation
    catalog: Arc<C>,
    /// Rendering options
    options: CodegenOptions,
}

impl RuleEngine<SqliteCatalog> {
    /// Engine whose catalog reads from the same database
    pub fn new(pool: SqlitePool) -> Self {
        let catalog = Arc::new(SqliteCatalog::new(pool.clone()));
        Self {
            pool,
            catalog,
            options: CodegenOptions::default(),
        }
    }
}

impl<C: Catalog + ?Sized> RuleEngine<C> {
    pub fn with_catalog(pool: SqlitePool, catalog: Arc<C>) -> Self {
        Self {
            pool,
            catalog,
            options: CodegenOptions::default(),
        }
    }

    pub fn with_options(mut self, options: CodegenOptions) -> Self {
        self.options = options;
        self
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn options(&self) -> &CodegenOptions {
        &self.options
    }

    /// `addRuleLine`: insert a line and refresh the rule's cached code
    pub async fn add_rule_line(&self, line: &NewRuleLine) -> Result<i64> {
        let line_id = repository::add_rule_line(&self.pool, line).await?;
        if let Some(rule_id) = line.rule_id {
            self.refresh_rule_code(rule_id).await?;
        }
        Ok(line_id)
    }

    /// `updateRuleLine`: replace function, sequence and parameters
    pub async fn update_rule_line(&self, update: &RuleLineUpdate) -> Result<()> {
        let rule_id = repository::update_rule_line(&self.pool, update).await?;
        self.refresh_rule_code(rule_id).await?;
        Ok(())
    }

    /// `deleteRuleLine`: remove a line with its parameters
    pub async fn delete_rule_line(&self, line_id: i64) -> Result<()> {
        let rule_id = repository::delete_rule_line(&self.pool, line_id).await?;
        self.refresh_rule_code(rule_id).await?;
        Ok(())
    }

    /// `generateCode`: render a rule's lines without touching storage
    ///
    /// Lines whose parameter count differs from the function's declaration
    /// are rendered as stored and reported with a warning.
    pub async fn generate_code(&self, rule_id: i64) -> Result<GeneratedCode> {
        let lines = self.rule_lines(rule_id).await?;
        for line in lines.iter().filter(|line| line.param_count_mismatch()) {
            warn!(
                "Rule {} line {}: {} declares {} param(s), line supplies {}",
                rule_id,
                line.line_id,
                line.function_name,
                line.declared_param_count,
                line.parameters.len()
            );
        }
        codegen::render_code(&lines, &self.options)
    }

    /// Regenerate and persist the cached code of a rule
    pub async fn refresh_rule_code(&self, rule_id: i64) -> Result<GeneratedCode> {
        if !rule_exists(&self.pool, rule_id).await? {
            return Err(RuleError::not_found("Rule", rule_id));
        }
        let code =
            codegen::generate_code(&self.pool, self.catalog.as_ref(), rule_id, &self.options)
                .await?;
        repository::store_generated_code(&self.pool, rule_id, &code).await?;
        debug!(
            "Rule {}: cache refreshed ({} condition / {} action bytes)",
            rule_id,
            code.condition_code.len(),
            code.action_code.len()
        );
        Ok(code)
    }

    /// Refresh every rule with a line invoking the function
    pub async fn refresh_function_rules(&self, function_id: i64) -> Result<Vec<i64>> {
        let rule_ids = functions::rules_using_function(&self.pool, function_id).await?;
        for &rule_id in &rule_ids {
            self.refresh_rule_code(rule_id).await?;
        }
        if !rule_ids.is_empty() {
            info!(
                "Function {}: cached code of {} rule(s) refreshed",
                function_id,
                rule_ids.len()
            );
        }
        Ok(rule_ids)
    }

    /// Update a function; rules invoking it get their cached code refreshed
    pub async fn update_function(&self, id: i64, function: &NewFunction) -> Result<()> {
        functions::update_function(&self.pool, id, function).await?;
        self.refresh_function_rules(id).await?;
        Ok(())
    }

    /// Declare a function parameter; the declared type can change quoting
    pub async fn add_function_param(
        &self,
        function_id: i64,
        param: &FunctionParamInput,
    ) -> Result<i64> {
        let param_id = functions::add_function_param(&self.pool, function_id, param).await?;
        self.refresh_function_rules(function_id).await?;
        Ok(param_id)
    }

    pub async fn update_function_param(
        &self,
        param_id: i64,
        param: &FunctionParamInput,
    ) -> Result<()> {
        let function_id = functions::update_function_param(&self.pool, param_id, param).await?;
        self.refresh_function_rules(function_id).await?;
        Ok(())
    }

    pub async fn delete_function_param(&self, param_id: i64) -> Result<()> {
        let function_id = functions::delete_function_param(&self.pool, param_id).await?;
        self.refresh_function_rules(function_id).await?;
        Ok(())
    }

    /// Resolved lines of a rule in emission order
    pub async fn rule_lines(&self, rule_id: i64) -> Result<Vec<LineView>> {
        if !rule_exists(&self.pool, rule_id).await? {
            return Err(RuleError::not_found("Rule", rule_id));
        }
        build_rule_lines(&self.pool, self.catalog.as_ref(), rule_id).await
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use crate::schema::init_schema;
    use crate::types::ParamInput;
    use tracing_test::traced_test;

    fn mismatch_warnings(lines: &[&str]) -> usize {
        lines
            .iter()
            .filter(|line| line.contains("WARN") && line.contains("line supplies"))
            .count()
    }

    #[tokio::test]
    #[traced_test]
    async fn test_mismatch_warns_on_generate_only() {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        init_schema(&pool).await.unwrap();
        for sql in [
            "INSERT INTO functions (id, name, param_count) VALUES (1, 'between', 3)",
            "INSERT INTO rules (id, name) VALUES (10, 'Range')",
        ] {
            sqlx::query(sql).execute(&pool).await.unwrap();
        }
        let engine = RuleEngine::new(pool);

        // Line write refreshes the cache quietly
        engine
            .add_rule_line(&NewRuleLine {
                rule_id: Some(10),
                function_id: Some(1),
                is_condition: true,
                sequence: 0,
                parameters: vec![ParamInput::literal("5")],
            })
            .await
            .unwrap();
        engine.refresh_rule_code(10).await.unwrap();
        logs_assert(|lines: &[&str]| match mismatch_warnings(lines) {
            0 => Ok(()),
            n => Err(format!("{} warning(s) during refresh", n)),
        });

        let code = engine.generate_code(10).await.unwrap();
        assert_eq!(code.condition_code, "between(5);");
        logs_assert(|lines: &[&str]| match mismatch_warnings(lines) {
            1 => Ok(()),
            n => Err(format!("expected one warning, saw {}", n)),
        });
    }
}
