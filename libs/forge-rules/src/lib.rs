//! Forge Rules - Rule Composition and Code Generation
//!
//! Rules are ordered lists of function invocations split into a condition
//! phase and an action phase. This crate provides:
//! - Function catalog CRUD with declared parameters and usage-guarded deletes
//! - Rule and rule line persistence (SQLite)
//! - Code generation: lines rendered as `name(args);` statements
//! - Rule groups with ordered membership and traversal anchors
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌──────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   Catalog   │────▶│ Line Builder │────▶│  Resolver   │────▶│   Codegen   │
//! │ (fn, field) │     │ (order, join)│     │ (arg token) │     │ (cond/act)  │
//! └─────────────┘     └──────────────┘     └─────────────┘     └─────────────┘
//!        ▲                   ▲                                        │
//!        │                   │                                        ▼
//! ┌─────────────┐     ┌──────────────┐                         ┌─────────────┐
//! │ Rule Groups │     │  Repository  │◀────────────────────────│ RuleEngine  │
//! │ (members)   │     │   (SQLite)   │      cache refresh      │ (4 ops)     │
//! └─────────────┘     └──────────────┘                         └─────────────┘
//! ```

pub mod catalog;
mod codegen;
mod engine;
mod error;
mod fields;
mod functions;
mod group;
mod line_builder;
mod repository;
pub mod resolver;
pub mod schema;
pub mod types;

// Re-export public API
pub use catalog::{Catalog, SqliteCatalog};
pub use codegen::{generate_code, render_code, render_statement};
pub use engine::RuleEngine;
pub use error::{Result, RuleError};
pub use fields::{import_field_classes, list_field_classes, list_fields};
pub use functions::{
    add_function_param, create_function, delete_function, delete_function_param, get_function,
    list_function_params, list_functions, rules_using_function, update_function,
    update_function_param,
};
pub use group::{
    action_anchor, anchor_target, assigned_rules, condition_anchor, create_rule_group,
    delete_rule_group, get_rule_group, list_rule_groups, update_rule_group,
};
pub use line_builder::build_rule_lines;
pub use repository::{
    add_rule_line, create_rule, delete_rule, delete_rule_line, get_rule, list_rule_lines,
    list_rules, rule_exists, store_generated_code, update_rule, update_rule_line,
};
pub use resolver::{resolve_param, CodegenOptions, FieldType, QuotingStrategy};
pub use schema::init_schema;

// Re-export rule types for convenience
pub use types::{
    Field, FieldClass, FieldClassImport, FieldImport, FieldRef, Function, FunctionParam,
    FunctionParamInput, FunctionRef, GeneratedCode, GroupAnchor, GroupMember, LineView,
    NewFunction, NewRule, NewRuleLine, ParamDirection, ParamInput, ParamView, Phase, Rule,
    RuleGroup, RuleGroupInput, RuleLineUpdate,
};
