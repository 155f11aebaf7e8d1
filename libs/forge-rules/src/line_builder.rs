//! Rule Line Builder
//!
//! Reads the stored lines of one rule in emission order (conditions first,
//! then actions, each by ascending sequence) and resolves function and field
//! metadata through the [`Catalog`]. Each parameter carries the type the
//! function declares for its position, if any.

use sqlx::{Row, SqlitePool};
use tracing::debug;

use crate::catalog::Catalog;
use crate::error::{Result, RuleError};
use crate::types::{LineView, ParamView, Phase};

/// Build the ordered line views for a rule
///
/// A missing function or a parameter that names a field unknown to the
/// catalog fails the whole build with `NotFound`. Parameter count
/// mismatches are kept; [`LineView::param_count_mismatch`] flags them.
pub async fn build_rule_lines<C>(
    pool: &SqlitePool,
    catalog: &C,
    rule_id: i64,
) -> Result<Vec<LineView>>
where
    C: Catalog + ?Sized,
{
    let rows = sqlx::query(
        r#"
        SELECT id, function_id, is_condition, sequence_num
        FROM rule_lines
        WHERE rule_id = ?
        ORDER BY is_condition DESC, sequence_num ASC
        "#,
    )
    .bind(rule_id)
    .fetch_all(pool)
    .await?;

    let mut lines = Vec::with_capacity(rows.len());
    for row in rows {
        let line_id: i64 = row.try_get("id")?;
        let function_id: i64 = row.try_get("function_id")?;
        let is_condition: bool = row.try_get("is_condition")?;
        let sequence: i64 = row.try_get("sequence_num")?;

        let function = catalog.lookup_function(function_id).await?;
        let parameters = load_params(pool, catalog, line_id, &function.param_types).await?;

        let line = LineView {
            line_id,
            function_id,
            function_name: function.name,
            declared_param_count: function.param_count,
            phase: Phase::from_flag(is_condition),
            sequence,
            parameters,
        };
        if line.param_count_mismatch() {
            debug!(
                "Rule {} line {}: {} declares {} param(s), line supplies {}",
                rule_id,
                line_id,
                line.function_name,
                line.declared_param_count,
                line.parameters.len()
            );
        }
        lines.push(line);
    }

    debug!("Rule {}: built {} line(s)", rule_id, lines.len());
    Ok(lines)
}

async fn load_params<C>(
    pool: &SqlitePool,
    catalog: &C,
    line_id: i64,
    declared_types: &[String],
) -> Result<Vec<ParamView>>
where
    C: Catalog + ?Sized,
{
    let rows = sqlx::query(
        r#"
        SELECT param_index, field_id, literal_value, value_type
        FROM rule_line_params
        WHERE line_id = ?
        ORDER BY param_index ASC
        "#,
    )
    .bind(line_id)
    .fetch_all(pool)
    .await?;

    let mut params = Vec::with_capacity(rows.len());
    for (position, row) in rows.iter().enumerate() {
        let field_id: Option<i64> = row.try_get("field_id")?;
        let field = match field_id {
            Some(id) => Some(
                catalog
                    .lookup_field(Some(id))
                    .await?
                    .ok_or_else(|| RuleError::not_found("Field", id))?,
            ),
            None => None,
        };

        params.push(ParamView {
            index: row.try_get("param_index")?,
            field_id,
            field,
            literal: row.try_get("literal_value")?,
            value_type: row.try_get("value_type")?,
            declared_type: declared_types.get(position).cloned(),
        });
    }
    Ok(params)
}
