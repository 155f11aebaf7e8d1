//! Code Generator
//!
//! Renders each line as `name(arg1, arg2, ...);` and joins the statements of
//! a phase with `\n`. A phase without lines renders as the empty string.
//! Output depends only on stored state and [`CodegenOptions`].

use sqlx::SqlitePool;

use crate::catalog::Catalog;
use crate::error::Result;
use crate::line_builder::build_rule_lines;
use crate::resolver::{resolve_param, CodegenOptions};
use crate::types::{GeneratedCode, LineView, Phase};

/// Render one invocation statement
pub fn render_statement(line: &LineView, options: &CodegenOptions) -> Result<String> {
    let args = line
        .parameters
        .iter()
        .map(|param| resolve_param(param, options))
        .collect::<Result<Vec<_>>>()?;
    Ok(format!("{}({});", line.function_name, args.join(", ")))
}

/// Render already-ordered lines into condition and action blocks
pub fn render_code(lines: &[LineView], options: &CodegenOptions) -> Result<GeneratedCode> {
    let mut condition = Vec::new();
    let mut action = Vec::new();

    for line in lines {
        let statement = render_statement(line, options)?;
        match line.phase {
            Phase::Condition => condition.push(statement),
            Phase::Action => action.push(statement),
        }
    }

    Ok(GeneratedCode {
        condition_code: condition.join("\n"),
        action_code: action.join("\n"),
    })
}

/// Build and render the lines of a stored rule
///
/// Does not check that the rule exists; an unknown id yields empty blocks.
/// `RuleEngine::generate_code` adds the existence check.
pub async fn generate_code<C>(
    pool: &SqlitePool,
    catalog: &C,
    rule_id: i64,
    options: &CodegenOptions,
) -> Result<GeneratedCode>
where
    C: Catalog + ?Sized,
{
    let lines = build_rule_lines(pool, catalog, rule_id).await?;
    render_code(&lines, options)
}
