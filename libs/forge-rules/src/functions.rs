//! Function catalog writes
//!
//! Functions are referenced by rule lines; deletion is blocked while any
//! line still invokes the function. A function may declare its parameters
//! (name, type, direction); when it does, `param_count` is the number of
//! declared parameters and is kept in step by every parameter write.

use regex::Regex;
use sqlx::{sqlite::SqliteRow, Row, SqliteConnection, SqlitePool};
use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;
use tracing::{debug, info, warn};

use crate::catalog::count_function_usages;
use crate::error::{Result, RuleError};
use crate::types::{Function, FunctionParam, FunctionParamInput, NewFunction};

#[allow(clippy::expect_used)] // Static pattern, verified by tests
fn identifier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier pattern")
    })
}

fn validate_function(function: &NewFunction) -> Result<()> {
    if !identifier_pattern().is_match(&function.name) {
        return Err(RuleError::validation(format!(
            "function name '{}' is not a valid identifier",
            function.name
        )));
    }
    if function.param_count < 0 {
        return Err(RuleError::validation(format!(
            "function '{}' declares a negative parameter count",
            function.name
        )));
    }

    if let Some(params) = &function.parameters {
        let listed = params.len() as i64;
        if function.param_count != 0 && function.param_count != listed {
            return Err(RuleError::validation(format!(
                "function '{}' declares {} param(s) but lists {}",
                function.name, function.param_count, listed
            )));
        }

        let mut seen = HashSet::new();
        for param in params {
            validate_param(param)?;
            if !seen.insert(param.seq) {
                return Err(RuleError::validation(format!(
                    "function '{}' lists parameter seq {} twice",
                    function.name, param.seq
                )));
            }
        }
    }
    Ok(())
}

fn validate_param(param: &FunctionParamInput) -> Result<()> {
    if param.name.trim().is_empty() || param.param_type.trim().is_empty() {
        return Err(RuleError::validation("parameter name and type are required"));
    }
    if param.seq < 0 {
        return Err(RuleError::validation(format!(
            "parameter '{}' has a negative seq",
            param.name
        )));
    }
    Ok(())
}

/// Count to store: the declared list wins over the bare count
fn effective_param_count(function: &NewFunction) -> i64 {
    match &function.parameters {
        Some(params) => params.len() as i64,
        None => function.param_count,
    }
}

/// List all functions ordered by name, with their declared parameters
pub async fn list_functions(pool: &SqlitePool) -> Result<Vec<Function>> {
    let rows = sqlx::query(
        r#"
        SELECT id, name, param_count, description, return_type
        FROM functions
        ORDER BY name ASC
        "#,
    )
    .fetch_all(pool)
    .await?;

    let param_rows = sqlx::query(
        r#"
        SELECT id, function_id, seq, name, param_type, io_type, description
        FROM function_params
        ORDER BY function_id ASC, seq ASC
        "#,
    )
    .fetch_all(pool)
    .await?;

    let mut by_function: HashMap<i64, Vec<FunctionParam>> = HashMap::new();
    for row in &param_rows {
        let param = hydrate_param(row)?;
        by_function.entry(param.function_id).or_default().push(param);
    }

    rows.iter()
        .map(|row| -> Result<Function> {
            let mut function = hydrate_function(row)?;
            function.parameters = by_function.remove(&function.id).unwrap_or_default();
            Ok(function)
        })
        .collect()
}

/// Get a single function by ID
pub async fn get_function(pool: &SqlitePool, id: i64) -> Result<Function> {
    let row = sqlx::query(
        r#"
        SELECT id, name, param_count, description, return_type
        FROM functions
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Err(RuleError::not_found("Function", id));
    };
    let mut function = hydrate_function(&row)?;
    function.parameters = fetch_params(pool, id).await?;
    Ok(function)
}

/// Create a function with its declared parameters, returning its ID
pub async fn create_function(pool: &SqlitePool, function: &NewFunction) -> Result<i64> {
    validate_function(function)?;

    let mut tx = pool.begin().await?;
    let result = sqlx::query(
        r#"
        INSERT INTO functions (name, param_count, description, return_type)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(&function.name)
    .bind(effective_param_count(function))
    .bind(&function.description)
    .bind(&function.return_type)
    .execute(&mut *tx)
    .await?;

    let id = result.last_insert_rowid();
    if let Some(params) = &function.parameters {
        insert_params(&mut tx, id, params).await?;
    }
    tx.commit().await?;

    info!("Function '{}' created with id {}", function.name, id);
    Ok(id)
}

/// Update a function in place
///
/// Does not touch the cached code of rules using the function; go through
/// [`RuleEngine::update_function`](crate::engine::RuleEngine::update_function)
/// for that.
pub async fn update_function(pool: &SqlitePool, id: i64, function: &NewFunction) -> Result<()> {
    validate_function(function)?;

    let mut tx = pool.begin().await?;
    let result = sqlx::query(
        r#"
        UPDATE functions
        SET name = ?, param_count = ?, description = ?, return_type = ?,
            updated_at = CURRENT_TIMESTAMP
        WHERE id = ?
        "#,
    )
    .bind(&function.name)
    .bind(function.param_count)
    .bind(&function.description)
    .bind(&function.return_type)
    .bind(id)
    .execute(&mut *tx)
    .await?;

    if result.rows_affected() == 0 {
        return Err(RuleError::not_found("Function", id));
    }

    match &function.parameters {
        Some(params) => {
            sqlx::query("DELETE FROM function_params WHERE function_id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            insert_params(&mut tx, id, params).await?;
            sync_param_count(&mut tx, id).await?;
        },
        None => {
            // Declared parameters stay authoritative; 0 means "unchanged"
            let declared = count_declared(&mut tx, id).await?;
            if declared > 0 {
                if function.param_count != 0 && function.param_count != declared {
                    return Err(RuleError::validation(format!(
                        "function {} declares {} parameter(s); param count {} does not match",
                        id, declared, function.param_count
                    )));
                }
                sync_param_count(&mut tx, id).await?;
            }
        },
    }
    tx.commit().await?;

    info!("Function {} updated", id);
    Ok(())
}

/// Delete a function unless a rule line still uses it
///
/// Guard and delete share one transaction; declared parameters go with it.
pub async fn delete_function(pool: &SqlitePool, id: i64) -> Result<()> {
    let mut tx = pool.begin().await?;

    let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM functions WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
    if exists.is_none() {
        return Err(RuleError::not_found("Function", id));
    }

    let usages = count_function_usages(&mut *tx, id).await?;
    if usages > 0 {
        warn!("Refusing to delete function {}: {} rule line(s)", id, usages);
        return Err(RuleError::conflict(format!(
            "function {} is in use by {} rule line(s)",
            id, usages
        )));
    }

    sqlx::query("DELETE FROM function_params WHERE function_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM functions WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    info!("Function {} deleted", id);
    Ok(())
}

/// Rules with at least one line invoking the function, ascending by ID
pub async fn rules_using_function(pool: &SqlitePool, function_id: i64) -> Result<Vec<i64>> {
    let ids = sqlx::query_scalar(
        "SELECT DISTINCT rule_id FROM rule_lines WHERE function_id = ? ORDER BY rule_id ASC",
    )
    .bind(function_id)
    .fetch_all(pool)
    .await?;
    Ok(ids)
}

// ============================================================================
// Declared parameters
// ============================================================================

/// Declared parameters of a function in `seq` order
pub async fn list_function_params(pool: &SqlitePool, function_id: i64) -> Result<Vec<FunctionParam>> {
    let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM functions WHERE id = ?")
        .bind(function_id)
        .fetch_optional(pool)
        .await?;
    if exists.is_none() {
        return Err(RuleError::not_found("Function", function_id));
    }
    fetch_params(pool, function_id).await
}

/// Declare one more parameter, returning its ID
pub async fn add_function_param(
    pool: &SqlitePool,
    function_id: i64,
    param: &FunctionParamInput,
) -> Result<i64> {
    validate_param(param)?;

    let mut tx = pool.begin().await?;
    let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM functions WHERE id = ?")
        .bind(function_id)
        .fetch_optional(&mut *tx)
        .await?;
    if exists.is_none() {
        return Err(RuleError::not_found("Function", function_id));
    }

    ensure_seq_free(&mut tx, function_id, param.seq, None).await?;
    let param_id = insert_param(&mut tx, function_id, param).await?;
    sync_param_count(&mut tx, function_id).await?;
    tx.commit().await?;

    info!(
        "Function {}: parameter '{}' declared at seq {}",
        function_id, param.name, param.seq
    );
    Ok(param_id)
}

/// Replace a declared parameter, returning the owning function ID
pub async fn update_function_param(
    pool: &SqlitePool,
    param_id: i64,
    param: &FunctionParamInput,
) -> Result<i64> {
    validate_param(param)?;

    let mut tx = pool.begin().await?;
    let function_id = fetch_param_owner(&mut tx, param_id).await?;
    ensure_seq_free(&mut tx, function_id, param.seq, Some(param_id)).await?;

    sqlx::query(
        r#"
        UPDATE function_params
        SET seq = ?, name = ?, param_type = ?, io_type = ?, description = ?,
            updated_at = CURRENT_TIMESTAMP
        WHERE id = ?
        "#,
    )
    .bind(param.seq)
    .bind(param.name.trim())
    .bind(param.param_type.trim())
    .bind(param.io_type.as_str())
    .bind(&param.description)
    .bind(param_id)
    .execute(&mut *tx)
    .await?;
    tx.commit().await?;

    info!("Function {}: parameter {} updated", function_id, param_id);
    Ok(function_id)
}

/// Remove a declared parameter, returning the owning function ID
pub async fn delete_function_param(pool: &SqlitePool, param_id: i64) -> Result<i64> {
    let mut tx = pool.begin().await?;
    let function_id = fetch_param_owner(&mut tx, param_id).await?;

    sqlx::query("DELETE FROM function_params WHERE id = ?")
        .bind(param_id)
        .execute(&mut *tx)
        .await?;
    sync_param_count(&mut tx, function_id).await?;
    tx.commit().await?;

    info!("Function {}: parameter {} deleted", function_id, param_id);
    Ok(function_id)
}

async fn fetch_params(pool: &SqlitePool, function_id: i64) -> Result<Vec<FunctionParam>> {
    let rows = sqlx::query(
        r#"
        SELECT id, function_id, seq, name, param_type, io_type, description
        FROM function_params
        WHERE function_id = ?
        ORDER BY seq ASC
        "#,
    )
    .bind(function_id)
    .fetch_all(pool)
    .await?;

    rows.iter().map(hydrate_param).collect()
}

async fn fetch_param_owner(conn: &mut SqliteConnection, param_id: i64) -> Result<i64> {
    let owner: Option<i64> =
        sqlx::query_scalar("SELECT function_id FROM function_params WHERE id = ?")
            .bind(param_id)
            .fetch_optional(&mut *conn)
            .await?;
    owner.ok_or_else(|| RuleError::not_found("FunctionParam", param_id))
}

async fn ensure_seq_free(
    conn: &mut SqliteConnection,
    function_id: i64,
    seq: i64,
    except_param: Option<i64>,
) -> Result<()> {
    let taken: Option<i64> = sqlx::query_scalar(
        "SELECT id FROM function_params WHERE function_id = ? AND seq = ? AND id != ?",
    )
    .bind(function_id)
    .bind(seq)
    .bind(except_param.unwrap_or(0))
    .fetch_optional(&mut *conn)
    .await?;

    match taken {
        Some(other) => Err(RuleError::conflict(format!(
            "function {} already declares parameter {} at seq {}",
            function_id, other, seq
        ))),
        None => Ok(()),
    }
}

async fn insert_params(
    conn: &mut SqliteConnection,
    function_id: i64,
    params: &[FunctionParamInput],
) -> Result<()> {
    for param in params {
        insert_param(conn, function_id, param).await?;
    }
    Ok(())
}

async fn insert_param(
    conn: &mut SqliteConnection,
    function_id: i64,
    param: &FunctionParamInput,
) -> Result<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO function_params (function_id, seq, name, param_type, io_type, description)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(function_id)
    .bind(param.seq)
    .bind(param.name.trim())
    .bind(param.param_type.trim())
    .bind(param.io_type.as_str())
    .bind(&param.description)
    .execute(&mut *conn)
    .await?;
    Ok(result.last_insert_rowid())
}

async fn count_declared(conn: &mut SqliteConnection, function_id: i64) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM function_params WHERE function_id = ?")
        .bind(function_id)
        .fetch_one(&mut *conn)
        .await?;
    Ok(count)
}

/// `param_count` follows the declared parameter list
async fn sync_param_count(conn: &mut SqliteConnection, function_id: i64) -> Result<()> {
    let count = count_declared(conn, function_id).await?;
    sqlx::query(
        "UPDATE functions SET param_count = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
    )
    .bind(count)
    .bind(function_id)
    .execute(&mut *conn)
    .await?;
    debug!("Function {}: param_count now {}", function_id, count);
    Ok(())
}

fn hydrate_function(row: &SqliteRow) -> Result<Function> {
    Ok(Function {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        param_count: row.try_get("param_count")?,
        description: row.try_get("description")?,
        return_type: row.try_get("return_type")?,
        parameters: Vec::new(),
    })
}

fn hydrate_param(row: &SqliteRow) -> Result<FunctionParam> {
    let io_type: String = row.try_get("io_type")?;
    Ok(FunctionParam {
        id: row.try_get("id")?,
        function_id: row.try_get("function_id")?,
        seq: row.try_get("seq")?,
        name: row.try_get("name")?,
        param_type: row.try_get("param_type")?,
        io_type: io_type.parse()?,
        description: row.try_get("description")?,
    })
}
