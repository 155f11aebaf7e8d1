//! Database schema for the rule engine
//!
//! All statements are idempotent (`CREATE TABLE IF NOT EXISTS`).

use sqlx::SqlitePool;
use tracing::info;

use crate::error::Result;

/// Field classes (schemas imported from API contracts; read-only here)
pub const FIELD_CLASSES_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS field_classes (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        class_type TEXT,
        description TEXT,
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
        updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
"#;

/// Typed attributes of a field class
pub const FIELDS_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS fields (
        id INTEGER PRIMARY KEY,
        field_class_id INTEGER REFERENCES field_classes(id),
        name TEXT NOT NULL,
        field_type TEXT,
        size INTEGER,
        precision_size INTEGER,
        default_value TEXT,
        description TEXT,
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
        updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
"#;

pub const FUNCTIONS_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS functions (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL UNIQUE,
        param_count INTEGER NOT NULL DEFAULT 0,
        description TEXT,
        return_type TEXT,
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
        updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
"#;

/// Declared parameters of a function; `io_type` is 'IN' | 'OUT' | 'INOUT'
pub const FUNCTION_PARAMS_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS function_params (
        id INTEGER PRIMARY KEY,
        function_id INTEGER NOT NULL REFERENCES functions(id),
        seq INTEGER NOT NULL,
        name TEXT NOT NULL,
        param_type TEXT NOT NULL,
        io_type TEXT NOT NULL DEFAULT 'IN',
        description TEXT,
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
        updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
        UNIQUE (function_id, seq)
    )
"#;

/// Rules; `condition_code`/`action_code` hold the last generated source
pub const RULES_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS rules (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        field_class_id INTEGER REFERENCES field_classes(id),
        rule_type TEXT,
        description TEXT,
        condition_code TEXT NOT NULL DEFAULT '',
        action_code TEXT NOT NULL DEFAULT '',
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
        updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
"#;

/// Sequence numbers are unique per (rule, phase)
pub const RULE_LINES_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS rule_lines (
        id INTEGER PRIMARY KEY,
        rule_id INTEGER NOT NULL REFERENCES rules(id),
        function_id INTEGER NOT NULL REFERENCES functions(id),
        is_condition INTEGER NOT NULL DEFAULT 1,
        sequence_num INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
        updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
        UNIQUE (rule_id, is_condition, sequence_num)
    )
"#;

pub const RULE_LINE_PARAMS_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS rule_line_params (
        id INTEGER PRIMARY KEY,
        line_id INTEGER NOT NULL REFERENCES rule_lines(id) ON DELETE CASCADE,
        param_index INTEGER NOT NULL,
        field_id INTEGER REFERENCES fields(id),
        literal_value TEXT,
        value_type TEXT,
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
        UNIQUE (line_id, param_index)
    )
"#;

/// Anchor columns: kind is 'none' | 'self' | 'group', group id set for 'group'
pub const RULE_GROUPS_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS rule_groups (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        cond_type TEXT,
        parent_id INTEGER REFERENCES rule_groups(id) ON DELETE SET NULL,
        description TEXT,
        is_condition INTEGER NOT NULL DEFAULT 0,
        is_action INTEGER NOT NULL DEFAULT 0,
        cond_start_kind TEXT NOT NULL DEFAULT 'none',
        cond_start_group_id INTEGER,
        act_start_kind TEXT NOT NULL DEFAULT 'none',
        act_start_group_id INTEGER,
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
        updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
"#;

pub const RULE_GROUP_RULES_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS rule_group_rules (
        id INTEGER PRIMARY KEY,
        group_id INTEGER NOT NULL REFERENCES rule_groups(id),
        rule_id INTEGER NOT NULL REFERENCES rules(id),
        sequence INTEGER NOT NULL,
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
"#;

pub const RULE_LINES_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_rule_lines_function ON rule_lines(function_id)";

pub const RULE_GROUP_RULES_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_rule_group_rules_rule ON rule_group_rules(rule_id)";

/// Statements in dependency order
pub const ALL_TABLES: &[&str] = &[
    FIELD_CLASSES_TABLE,
    FIELDS_TABLE,
    FUNCTIONS_TABLE,
    FUNCTION_PARAMS_TABLE,
    RULES_TABLE,
    RULE_LINES_TABLE,
    RULE_LINE_PARAMS_TABLE,
    RULE_GROUPS_TABLE,
    RULE_GROUP_RULES_TABLE,
    RULE_LINES_INDEX,
    RULE_GROUP_RULES_INDEX,
];

/// Create every table used by the rule engine
pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
    for ddl in ALL_TABLES {
        sqlx::query(*ddl).execute(pool).await?;
    }
    info!("Rule schema initialized ({} statements)", ALL_TABLES.len());
    Ok(())
}
