//! Rule composition type definitions
//!
//! Persisted rows and the views built on top of them:
//! - Function / Field: catalog entries referenced by rule lines
//! - Rule / RuleLine / parameters: the ordered invocation program of a rule
//! - RuleGroup / GroupAnchor: hierarchical composition of rules
//! - Input types accepted by the write operations (camelCase on the wire)

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::{Result, RuleError};

// ============================================================================
// Catalog
// ============================================================================

/// Reusable named operation available to rule lines
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Function {
    pub id: i64,
    pub name: String,
    pub param_count: i64,
    pub description: Option<String>,
    pub return_type: Option<String>,
    /// Declared parameters ordered by `seq`; empty for count-only functions
    #[serde(default)]
    pub parameters: Vec<FunctionParam>,
}

/// Function create/update payload
///
/// A supplied `parameters` list replaces the declared parameters and
/// determines `param_count`; `None` leaves them untouched on update.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewFunction {
    #[serde(alias = "functionName", alias = "funcName")]
    pub name: String,
    #[serde(default)]
    pub param_count: i64,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub return_type: Option<String>,
    #[serde(default)]
    pub parameters: Option<Vec<FunctionParamInput>>,
}

/// Data direction of a declared function parameter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ParamDirection {
    #[default]
    In,
    Out,
    InOut,
}

impl ParamDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            ParamDirection::In => "IN",
            ParamDirection::Out => "OUT",
            ParamDirection::InOut => "INOUT",
        }
    }
}

impl std::str::FromStr for ParamDirection {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "IN" | "I" => Ok(ParamDirection::In),
            "OUT" | "O" => Ok(ParamDirection::Out),
            "INOUT" | "IN_OUT" | "IO" => Ok(ParamDirection::InOut),
            other => Err(RuleError::Serialization(format!(
                "unknown parameter direction: {}",
                other
            ))),
        }
    }
}

impl std::fmt::Display for ParamDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declared parameter of a function
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionParam {
    pub id: i64,
    pub function_id: i64,
    pub seq: i64,
    pub name: String,
    pub param_type: String,
    pub io_type: ParamDirection,
    pub description: Option<String>,
}

/// Declared parameter create/update payload
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionParamInput {
    #[serde(default, alias = "sequence")]
    pub seq: i64,
    #[serde(alias = "paramName")]
    pub name: String,
    #[serde(alias = "paramType")]
    pub param_type: String,
    #[serde(default, alias = "paramIoType")]
    pub io_type: ParamDirection,
    #[serde(default)]
    pub description: Option<String>,
}

impl FunctionParamInput {
    pub fn new(seq: i64, name: impl Into<String>, param_type: impl Into<String>) -> Self {
        Self {
            seq,
            name: name.into(),
            param_type: param_type.into(),
            ..Default::default()
        }
    }

    pub fn with_direction(mut self, io_type: ParamDirection) -> Self {
        self.io_type = io_type;
        self
    }
}

/// What code generation needs to know about a function
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionRef {
    pub name: String,
    pub param_count: i64,
    /// Declared parameter types in `seq` order
    pub param_types: Vec<String>,
}

/// What code generation needs to know about a field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldRef {
    pub name: String,
    pub field_type: Option<String>,
}

/// Schema imported from an API contract
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldClass {
    pub id: i64,
    pub name: String,
    pub class_type: Option<String>,
    pub description: Option<String>,
}

/// Typed attribute of a field class
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    pub id: i64,
    pub field_class_id: Option<i64>,
    pub name: String,
    pub field_type: Option<String>,
    pub size: Option<i64>,
    pub precision_size: Option<i64>,
    pub default_value: Option<String>,
    pub description: Option<String>,
}

/// Field class entry of an import document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldClassImport {
    pub name: String,
    #[serde(default)]
    pub class_type: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldImport>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldImport {
    pub name: String,
    #[serde(default, rename = "type", alias = "fieldType")]
    pub field_type: Option<String>,
    #[serde(default)]
    pub size: Option<i64>,
    #[serde(default, alias = "precision")]
    pub precision_size: Option<i64>,
    #[serde(default)]
    pub default_value: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

// ============================================================================
// Rules
// ============================================================================

/// Named unit of logic; `condition_code`/`action_code` cache the last generation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    pub id: i64,
    pub name: String,
    pub field_class_id: Option<i64>,
    pub rule_type: Option<String>,
    pub description: Option<String>,
    pub condition_code: String,
    pub action_code: String,
    pub updated_at: Option<NaiveDateTime>,
}

/// Rule create/update payload
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRule {
    #[serde(alias = "ruleName")]
    pub name: String,
    #[serde(default, alias = "classId")]
    pub field_class_id: Option<i64>,
    #[serde(default)]
    pub rule_type: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Condition or action track of a rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Condition,
    Action,
}

impl Phase {
    pub fn from_flag(is_condition: bool) -> Self {
        if is_condition {
            Phase::Condition
        } else {
            Phase::Action
        }
    }

    pub fn is_condition(self) -> bool {
        matches!(self, Phase::Condition)
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Condition => write!(f, "condition"),
            Phase::Action => write!(f, "action"),
        }
    }
}

/// One positional argument as submitted by a writer
///
/// `value_type` types the literal; when absent the function's declared
/// parameter type at the same position applies. Neither matters when a
/// field is referenced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParamInput {
    #[serde(default)]
    pub field_id: Option<i64>,
    #[serde(default)]
    pub literal_value: Option<String>,
    #[serde(default)]
    pub value_type: Option<String>,
}

impl ParamInput {
    pub fn field(field_id: i64) -> Self {
        Self {
            field_id: Some(field_id),
            ..Default::default()
        }
    }

    pub fn literal(value: impl Into<String>) -> Self {
        Self {
            literal_value: Some(value.into()),
            ..Default::default()
        }
    }

    pub fn typed_literal(value: impl Into<String>, value_type: impl Into<String>) -> Self {
        Self {
            field_id: None,
            literal_value: Some(value.into()),
            value_type: Some(value_type.into()),
        }
    }
}

fn default_true() -> bool {
    true
}

/// `addRuleLine` payload
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRuleLine {
    pub rule_id: Option<i64>,
    pub function_id: Option<i64>,
    #[serde(default = "default_true")]
    pub is_condition: bool,
    #[serde(default, alias = "sequenceNum")]
    pub sequence: i64,
    #[serde(default)]
    pub parameters: Vec<ParamInput>,
}

/// `updateRuleLine` payload; the phase of a line never changes
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleLineUpdate {
    pub line_id: Option<i64>,
    pub function_id: Option<i64>,
    #[serde(default, alias = "sequenceNum")]
    pub sequence: i64,
    #[serde(default)]
    pub parameters: Vec<ParamInput>,
}

/// Stored parameter with its field resolved through the catalog
///
/// `declared_type` is the function's declared type for this position.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParamView {
    pub index: i64,
    pub field_id: Option<i64>,
    pub field: Option<FieldRef>,
    pub literal: Option<String>,
    pub value_type: Option<String>,
    pub declared_type: Option<String>,
}

impl ParamView {
    /// Type a literal is rendered against: its own, else the declared one
    pub fn literal_type(&self) -> Option<&str> {
        self.value_type
            .as_deref()
            .or(self.declared_type.as_deref())
    }
}

/// One invocation line ready for rendering
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineView {
    pub line_id: i64,
    pub function_id: i64,
    pub function_name: String,
    pub declared_param_count: i64,
    pub phase: Phase,
    pub sequence: i64,
    pub parameters: Vec<ParamView>,
}

impl LineView {
    pub fn param_count_mismatch(&self) -> bool {
        self.parameters.len() as i64 != self.declared_param_count
    }
}

/// Output of code generation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedCode {
    pub condition_code: String,
    pub action_code: String,
}

// ============================================================================
// Rule Groups
// ============================================================================

/// Start point of a group's condition or action traversal
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "groupId", rename_all = "camelCase")]
pub enum GroupAnchor {
    #[default]
    None,
    /// The group's own membership list
    SelfMembership,
    /// Another group's membership list
    ForeignGroup(i64),
}

impl GroupAnchor {
    const KIND_NONE: &'static str = "none";
    const KIND_SELF: &'static str = "self";
    const KIND_GROUP: &'static str = "group";

    /// Column pair `(kind, group_id)` used by the rule_groups table
    pub fn to_columns(self) -> (&'static str, Option<i64>) {
        match self {
            GroupAnchor::None => (Self::KIND_NONE, None),
            GroupAnchor::SelfMembership => (Self::KIND_SELF, None),
            GroupAnchor::ForeignGroup(id) => (Self::KIND_GROUP, Some(id)),
        }
    }

    pub fn from_columns(kind: &str, group_id: Option<i64>) -> Result<Self> {
        match (kind, group_id) {
            (Self::KIND_NONE, _) => Ok(GroupAnchor::None),
            (Self::KIND_SELF, _) => Ok(GroupAnchor::SelfMembership),
            (Self::KIND_GROUP, Some(id)) => Ok(GroupAnchor::ForeignGroup(id)),
            (Self::KIND_GROUP, None) => Err(RuleError::Serialization(
                "group anchor without a group id".to_string(),
            )),
            (other, _) => Err(RuleError::Serialization(format!(
                "unknown anchor kind: {}",
                other
            ))),
        }
    }
}

/// Hierarchical composition of rules
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleGroup {
    pub id: i64,
    pub name: String,
    pub cond_type: Option<String>,
    pub parent_id: Option<i64>,
    pub description: Option<String>,
    pub is_condition: bool,
    pub is_action: bool,
    pub condition_start: GroupAnchor,
    pub action_start: GroupAnchor,
    pub updated_at: Option<NaiveDateTime>,
}

/// Rule group create/update payload; `rules` is the complete ordered membership
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleGroupInput {
    #[serde(alias = "groupName")]
    pub name: String,
    #[serde(default)]
    pub cond_type: Option<String>,
    #[serde(default, alias = "parentGroupId")]
    pub parent_id: Option<i64>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_condition: bool,
    #[serde(default)]
    pub is_action: bool,
    #[serde(default)]
    pub condition_start: GroupAnchor,
    #[serde(default)]
    pub action_start: GroupAnchor,
    #[serde(default)]
    pub rules: Vec<i64>,
}

/// Rule membership row joined with the rule name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupMember {
    pub rule_id: i64,
    pub rule_name: String,
    pub sequence: i64,
}
