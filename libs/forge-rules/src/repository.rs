//! Rules Repository - SQLite persistence for rules and their lines
//!
//! Rule lines are written together with their parameters inside a single
//! transaction; parameter updates are delete-then-reinsert. Callers that
//! need the generated-code cache kept current go through
//! [`RuleEngine`](crate::engine::RuleEngine).

use sqlx::{sqlite::SqliteRow, Executor, Row, Sqlite, SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};

use crate::catalog::{count_rule_group_usages, SqliteCatalog};
use crate::error::{Result, RuleError};
use crate::line_builder::build_rule_lines;
use crate::types::{GeneratedCode, LineView, NewRule, NewRuleLine, ParamInput, Rule, RuleLineUpdate};

// ============================================================================
// Rules
// ============================================================================

/// List all rules, most recently updated first
pub async fn list_rules(pool: &SqlitePool) -> Result<Vec<Rule>> {
    let rows = sqlx::query(
        r#"
        SELECT id, name, field_class_id, rule_type, description,
               condition_code, action_code, updated_at
        FROM rules
        ORDER BY updated_at DESC, id DESC
        "#,
    )
    .fetch_all(pool)
    .await?;

    let mut rules = Vec::with_capacity(rows.len());
    for row in rows {
        rules.push(hydrate_rule(&row)?);
    }
    Ok(rules)
}

/// Get a single rule by ID
pub async fn get_rule(pool: &SqlitePool, id: i64) -> Result<Rule> {
    let row = sqlx::query(
        r#"
        SELECT id, name, field_class_id, rule_type, description,
               condition_code, action_code, updated_at
        FROM rules
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => hydrate_rule(&row),
        None => Err(RuleError::not_found("Rule", id)),
    }
}

/// Check whether a rule exists
pub async fn rule_exists<'e, E>(executor: E, id: i64) -> Result<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let found: Option<i64> = sqlx::query_scalar("SELECT id FROM rules WHERE id = ?")
        .bind(id)
        .fetch_optional(executor)
        .await?;
    Ok(found.is_some())
}

/// Create a rule, returning its ID
pub async fn create_rule(pool: &SqlitePool, rule: &NewRule) -> Result<i64> {
    validate_rule(pool, rule).await?;

    let result = sqlx::query(
        r#"
        INSERT INTO rules (name, field_class_id, rule_type, description)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(rule.name.trim())
    .bind(rule.field_class_id)
    .bind(&rule.rule_type)
    .bind(&rule.description)
    .execute(pool)
    .await?;

    let id = result.last_insert_rowid();
    info!("Rule '{}' created with id {}", rule.name.trim(), id);
    Ok(id)
}

/// Update a rule's metadata; lines and cached code are untouched
pub async fn update_rule(pool: &SqlitePool, id: i64, rule: &NewRule) -> Result<()> {
    validate_rule(pool, rule).await?;

    let result = sqlx::query(
        r#"
        UPDATE rules
        SET name = ?, field_class_id = ?, rule_type = ?, description = ?,
            updated_at = CURRENT_TIMESTAMP
        WHERE id = ?
        "#,
    )
    .bind(rule.name.trim())
    .bind(rule.field_class_id)
    .bind(&rule.rule_type)
    .bind(&rule.description)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(RuleError::not_found("Rule", id));
    }

    info!("Rule {} updated", id);
    Ok(())
}

/// Delete a rule with its lines and parameters
///
/// Blocked while any rule group still lists the rule.
pub async fn delete_rule(pool: &SqlitePool, id: i64) -> Result<()> {
    let mut tx = pool.begin().await?;

    if !rule_exists(&mut *tx, id).await? {
        return Err(RuleError::not_found("Rule", id));
    }

    let usages = count_rule_group_usages(&mut *tx, id).await?;
    if usages > 0 {
        warn!("Refusing to delete rule {}: {} group membership(s)", id, usages);
        return Err(RuleError::conflict(format!(
            "rule {} is in use by {} rule group membership(s)",
            id, usages
        )));
    }

    sqlx::query(
        "DELETE FROM rule_line_params WHERE line_id IN (SELECT id FROM rule_lines WHERE rule_id = ?)",
    )
    .bind(id)
    .execute(&mut *tx)
    .await?;
    let lines = sqlx::query("DELETE FROM rule_lines WHERE rule_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?
        .rows_affected();
    sqlx::query("DELETE FROM rules WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    info!("Rule {} deleted ({} line(s))", id, lines);
    Ok(())
}

/// Stored lines of a rule in emission order
pub async fn list_rule_lines(pool: &SqlitePool, rule_id: i64) -> Result<Vec<LineView>> {
    if !rule_exists(pool, rule_id).await? {
        return Err(RuleError::not_found("Rule", rule_id));
    }
    let catalog = SqliteCatalog::new(pool.clone());
    build_rule_lines(pool, &catalog, rule_id).await
}

/// Persist generated code into the rule's cache columns
pub async fn store_generated_code(
    pool: &SqlitePool,
    rule_id: i64,
    code: &GeneratedCode,
) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE rules
        SET condition_code = ?, action_code = ?, updated_at = CURRENT_TIMESTAMP
        WHERE id = ?
        "#,
    )
    .bind(&code.condition_code)
    .bind(&code.action_code)
    .bind(rule_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(RuleError::not_found("Rule", rule_id));
    }
    debug!("Rule {}: generated code cached", rule_id);
    Ok(())
}

async fn validate_rule(pool: &SqlitePool, rule: &NewRule) -> Result<()> {
    if rule.name.trim().is_empty() {
        return Err(RuleError::validation("rule name is required"));
    }
    if let Some(class_id) = rule.field_class_id {
        let found: Option<i64> = sqlx::query_scalar("SELECT id FROM field_classes WHERE id = ?")
            .bind(class_id)
            .fetch_optional(pool)
            .await?;
        if found.is_none() {
            return Err(RuleError::not_found("FieldClass", class_id));
        }
    }
    Ok(())
}

fn hydrate_rule(row: &SqliteRow) -> Result<Rule> {
    Ok(Rule {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        field_class_id: row.try_get("field_class_id")?,
        rule_type: row.try_get("rule_type")?,
        description: row.try_get("description")?,
        condition_code: row.try_get("condition_code")?,
        action_code: row.try_get("action_code")?,
        updated_at: row.try_get("updated_at")?,
    })
}

// ============================================================================
// Rule lines
// ============================================================================

/// Insert a line with its parameters, returning the line ID
pub async fn add_rule_line(pool: &SqlitePool, line: &NewRuleLine) -> Result<i64> {
    let rule_id = require_id(line.rule_id, "rule id")?;
    let function_id = require_id(line.function_id, "function id")?;
    validate_line_shape(line.sequence, &line.parameters)?;

    let mut tx = pool.begin().await?;

    if !rule_exists(&mut *tx, rule_id).await? {
        return Err(RuleError::not_found("Rule", rule_id));
    }
    ensure_function(&mut tx, function_id).await?;
    ensure_sequence_free(&mut tx, rule_id, line.is_condition, line.sequence, None).await?;
    ensure_fields(&mut tx, &line.parameters).await?;

    let line_id = sqlx::query(
        r#"
        INSERT INTO rule_lines (rule_id, function_id, is_condition, sequence_num)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(rule_id)
    .bind(function_id)
    .bind(line.is_condition)
    .bind(line.sequence)
    .execute(&mut *tx)
    .await?
    .last_insert_rowid();

    insert_params(&mut tx, line_id, &line.parameters).await?;
    tx.commit().await?;

    info!(
        "Rule {}: added line {} ({} #{}, {} param(s))",
        rule_id,
        line_id,
        if line.is_condition { "condition" } else { "action" },
        line.sequence,
        line.parameters.len()
    );
    Ok(line_id)
}

/// Replace a line's function, sequence and full parameter list
///
/// Returns the owning rule ID.
pub async fn update_rule_line(pool: &SqlitePool, update: &RuleLineUpdate) -> Result<i64> {
    let line_id = require_id(update.line_id, "line id")?;
    let function_id = require_id(update.function_id, "function id")?;
    validate_line_shape(update.sequence, &update.parameters)?;

    let mut tx = pool.begin().await?;

    let (rule_id, is_condition) = fetch_line_owner(&mut tx, line_id).await?;
    ensure_function(&mut tx, function_id).await?;
    ensure_sequence_free(&mut tx, rule_id, is_condition, update.sequence, Some(line_id)).await?;
    ensure_fields(&mut tx, &update.parameters).await?;

    sqlx::query(
        r#"
        UPDATE rule_lines
        SET function_id = ?, sequence_num = ?, updated_at = CURRENT_TIMESTAMP
        WHERE id = ?
        "#,
    )
    .bind(function_id)
    .bind(update.sequence)
    .bind(line_id)
    .execute(&mut *tx)
    .await?;

    sqlx::query("DELETE FROM rule_line_params WHERE line_id = ?")
        .bind(line_id)
        .execute(&mut *tx)
        .await?;
    insert_params(&mut tx, line_id, &update.parameters).await?;
    tx.commit().await?;

    info!("Rule {}: updated line {}", rule_id, line_id);
    Ok(rule_id)
}

/// Delete a line and its parameters, returning the owning rule ID
pub async fn delete_rule_line(pool: &SqlitePool, line_id: i64) -> Result<i64> {
    let mut tx = pool.begin().await?;

    let (rule_id, _) = fetch_line_owner(&mut tx, line_id).await?;

    sqlx::query("DELETE FROM rule_line_params WHERE line_id = ?")
        .bind(line_id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM rule_lines WHERE id = ?")
        .bind(line_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    info!("Rule {}: deleted line {}", rule_id, line_id);
    Ok(rule_id)
}

fn require_id(id: Option<i64>, what: &str) -> Result<i64> {
    match id {
        Some(id) if id > 0 => Ok(id),
        Some(id) => Err(RuleError::validation(format!("invalid {}: {}", what, id))),
        None => Err(RuleError::validation(format!("{} is required", what))),
    }
}

fn validate_line_shape(sequence: i64, parameters: &[ParamInput]) -> Result<()> {
    if sequence < 0 {
        return Err(RuleError::validation(format!(
            "sequence must be non-negative, got {}",
            sequence
        )));
    }
    for (index, param) in parameters.iter().enumerate() {
        if param.field_id.is_none() && param.literal_value.is_none() {
            return Err(RuleError::validation(format!(
                "parameter {} needs a field id or a literal value",
                index
            )));
        }
    }
    Ok(())
}

async fn fetch_line_owner(conn: &mut SqliteConnection, line_id: i64) -> Result<(i64, bool)> {
    let row = sqlx::query("SELECT rule_id, is_condition FROM rule_lines WHERE id = ?")
        .bind(line_id)
        .fetch_optional(&mut *conn)
        .await?;

    match row {
        Some(row) => Ok((row.try_get("rule_id")?, row.try_get("is_condition")?)),
        None => Err(RuleError::not_found("RuleLine", line_id)),
    }
}

async fn ensure_function(conn: &mut SqliteConnection, function_id: i64) -> Result<()> {
    let found: Option<i64> = sqlx::query_scalar("SELECT id FROM functions WHERE id = ?")
        .bind(function_id)
        .fetch_optional(&mut *conn)
        .await?;
    match found {
        Some(_) => Ok(()),
        None => Err(RuleError::not_found("Function", function_id)),
    }
}

async fn ensure_sequence_free(
    conn: &mut SqliteConnection,
    rule_id: i64,
    is_condition: bool,
    sequence: i64,
    except_line: Option<i64>,
) -> Result<()> {
    let taken: Option<i64> = sqlx::query_scalar(
        r#"
        SELECT id FROM rule_lines
        WHERE rule_id = ? AND is_condition = ? AND sequence_num = ? AND id != ?
        "#,
    )
    .bind(rule_id)
    .bind(is_condition)
    .bind(sequence)
    .bind(except_line.unwrap_or(0))
    .fetch_optional(&mut *conn)
    .await?;

    match taken {
        Some(other) => Err(RuleError::conflict(format!(
            "rule {} already has {} line {} at sequence {}",
            rule_id,
            if is_condition { "condition" } else { "action" },
            other,
            sequence
        ))),
        None => Ok(()),
    }
}

async fn ensure_fields(conn: &mut SqliteConnection, parameters: &[ParamInput]) -> Result<()> {
    for field_id in parameters.iter().filter_map(|p| p.field_id) {
        let found: Option<i64> = sqlx::query_scalar("SELECT id FROM fields WHERE id = ?")
            .bind(field_id)
            .fetch_optional(&mut *conn)
            .await?;
        if found.is_none() {
            return Err(RuleError::not_found("Field", field_id));
        }
    }
    Ok(())
}

async fn insert_params(
    conn: &mut SqliteConnection,
    line_id: i64,
    parameters: &[ParamInput],
) -> Result<()> {
    for (index, param) in parameters.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO rule_line_params (line_id, param_index, field_id, literal_value, value_type)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(line_id)
        .bind(index as i64)
        .bind(param.field_id)
        .bind(&param.literal_value)
        .bind(&param.value_type)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_require_id() {
        assert_eq!(require_id(Some(3), "rule id").unwrap(), 3);
        assert!(matches!(
            require_id(None, "rule id"),
            Err(RuleError::Validation(_))
        ));
        assert!(matches!(
            require_id(Some(0), "rule id"),
            Err(RuleError::Validation(_))
        ));
    }

    #[test]
    fn test_line_shape() {
        assert!(validate_line_shape(0, &[ParamInput::literal("1")]).is_ok());
        assert!(validate_line_shape(-1, &[]).is_err());
        assert!(validate_line_shape(0, &[ParamInput::default()]).is_err());
    }
}
