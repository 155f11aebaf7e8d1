//! Parameter Resolver - turns a stored parameter into an argument token
//!
//! A referenced field always wins and renders as `<context>.<field name>`.
//! Otherwise the literal renders verbatim, quoted only when the active
//! [`QuotingStrategy`] says its type is textual. A literal's type is its own
//! `value_type`, else the type the function declares for that position.

use serde::{Deserialize, Serialize};

use crate::error::{Result, RuleError};
use crate::types::ParamView;

/// The one declared type that triggers quoting under the default strategy
pub const STRING_TYPE_TAG: &str = "STRING";

/// Default execution-context prefix for field access
pub const DEFAULT_FIELD_CONTEXT: &str = "fields";

/// Declared field types as spelled by imported contracts
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    String,
    Varchar,
    Char,
    Text,
    Clob,
    Integer,
    Decimal,
    Boolean,
    Date,
    DateTime,
    Other(String),
}

impl FieldType {
    /// Case-insensitive; a size suffix such as `VARCHAR2(40)` is ignored
    pub fn parse(declared: &str) -> Self {
        let base = declared
            .split('(')
            .next()
            .unwrap_or(declared)
            .trim()
            .to_ascii_uppercase();

        match base.as_str() {
            "STRING" => FieldType::String,
            "VARCHAR" | "VARCHAR2" | "NVARCHAR" | "NVARCHAR2" => FieldType::Varchar,
            "CHAR" | "NCHAR" => FieldType::Char,
            "TEXT" => FieldType::Text,
            "CLOB" | "NCLOB" => FieldType::Clob,
            "INTEGER" | "INT" | "BIGINT" | "SMALLINT" | "LONG" => FieldType::Integer,
            "DECIMAL" | "NUMBER" | "NUMERIC" | "FLOAT" | "DOUBLE" | "REAL" => FieldType::Decimal,
            "BOOLEAN" | "BOOL" => FieldType::Boolean,
            "DATE" => FieldType::Date,
            "DATETIME" | "TIMESTAMP" => FieldType::DateTime,
            _ => FieldType::Other(base),
        }
    }

    pub fn is_textual(&self) -> bool {
        matches!(
            self,
            FieldType::String
                | FieldType::Varchar
                | FieldType::Char
                | FieldType::Text
                | FieldType::Clob
        )
    }
}

/// Which declared types get their literals wrapped in quotes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotingStrategy {
    /// Quote only when the declared type is exactly `STRING` (case-sensitive)
    #[default]
    StringTagOnly,
    /// Quote every textual spelling (`VARCHAR`, `TEXT`, `char`, ...)
    TextualTypes,
}

impl QuotingStrategy {
    pub fn should_quote(self, declared: Option<&str>) -> bool {
        let Some(declared) = declared else {
            return false;
        };
        match self {
            QuotingStrategy::StringTagOnly => declared == STRING_TYPE_TAG,
            QuotingStrategy::TextualTypes => FieldType::parse(declared).is_textual(),
        }
    }
}

impl std::str::FromStr for QuotingStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "string_tag_only" | "legacy" => Ok(QuotingStrategy::StringTagOnly),
            "textual_types" | "textual" => Ok(QuotingStrategy::TextualTypes),
            other => Err(format!("unknown quoting strategy: {}", other)),
        }
    }
}

/// Rendering options shared by the resolver and the code generator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodegenOptions {
    /// Prefix of field-access expressions
    pub field_context: String,
    pub quoting: QuotingStrategy,
}

impl Default for CodegenOptions {
    fn default() -> Self {
        Self {
            field_context: DEFAULT_FIELD_CONTEXT.to_string(),
            quoting: QuotingStrategy::default(),
        }
    }
}

/// Render one parameter as an argument token
pub fn resolve_param(param: &ParamView, options: &CodegenOptions) -> Result<String> {
    if let Some(field) = &param.field {
        return Ok(format!("{}.{}", options.field_context, field.name));
    }

    let Some(literal) = &param.literal else {
        return Err(RuleError::validation(format!(
            "parameter {} has neither a field reference nor a literal",
            param.index
        )));
    };

    if options.quoting.should_quote(param.literal_type()) {
        Ok(format!("'{}'", literal))
    } else {
        Ok(literal.clone())
    }
}
