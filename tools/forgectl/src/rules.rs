//! Rule and rule line commands

use anyhow::Result;
use clap::{Args, Subcommand};
use forge_rules::{NewRule, NewRuleLine, RuleLineUpdate};
use serde_json::json;
use tracing::info;

use crate::context::CliContext;
use crate::output::{print_json, success};
use crate::params::{into_inputs, ParamArg};

#[derive(Args, Debug, Clone)]
pub struct RuleArgs {
    pub name: String,
    /// Owning field class
    #[arg(long = "class")]
    pub field_class_id: Option<i64>,
    /// Free-form rule type tag
    #[arg(long = "type")]
    pub rule_type: Option<String>,
    #[arg(short, long)]
    pub description: Option<String>,
}

impl From<RuleArgs> for NewRule {
    fn from(args: RuleArgs) -> Self {
        NewRule {
            name: args.name,
            field_class_id: args.field_class_id,
            rule_type: args.rule_type,
            description: args.description,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum RuleCommands {
    #[command(about = "List rules, most recently updated first")]
    List,

    #[command(about = "Show a rule with its cached code")]
    Show { id: i64 },

    #[command(about = "Create a rule")]
    Add(RuleArgs),

    #[command(about = "Update a rule's metadata")]
    Update {
        id: i64,
        #[command(flatten)]
        rule: RuleArgs,
    },

    #[command(about = "Delete a rule with its lines")]
    Delete { id: i64 },

    #[command(about = "Show a rule's lines in emission order")]
    Lines { id: i64 },

    #[command(about = "Generate condition and action code")]
    Generate {
        id: i64,
        /// Store the result in the rule's cached code
        #[arg(long)]
        persist: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum LineCommands {
    #[command(about = "Append a line to a rule")]
    Add {
        rule_id: i64,
        function_id: i64,
        /// Action line (default: condition)
        #[arg(long)]
        action: bool,
        /// Sequence within the phase
        #[arg(short, long = "seq", default_value = "0")]
        sequence: i64,
        /// field:<id> | lit:<value> | lit:<TYPE>:<value>, in order
        #[arg(short, long = "param")]
        params: Vec<ParamArg>,
    },

    #[command(about = "Replace a line's function, sequence and parameters")]
    Update {
        line_id: i64,
        function_id: i64,
        #[arg(short, long = "seq", default_value = "0")]
        sequence: i64,
        #[arg(short, long = "param")]
        params: Vec<ParamArg>,
    },

    #[command(about = "Delete a line")]
    Delete { line_id: i64 },
}

pub async fn handle_command(cmd: RuleCommands, ctx: &CliContext) -> Result<()> {
    let pool = ctx.pool();
    match cmd {
        RuleCommands::List => {
            print_json(&forge_rules::list_rules(pool).await?)?;
        },
        RuleCommands::Show { id } => {
            print_json(&forge_rules::get_rule(pool, id).await?)?;
        },
        RuleCommands::Add(args) => {
            let id = forge_rules::create_rule(pool, &args.into()).await?;
            print_json(&json!({ "id": id }))?;
        },
        RuleCommands::Update { id, rule } => {
            forge_rules::update_rule(pool, id, &rule.into()).await?;
            success(format!("Rule {} updated", id));
        },
        RuleCommands::Delete { id } => {
            forge_rules::delete_rule(pool, id).await?;
            success(format!("Rule {} deleted", id));
        },
        RuleCommands::Lines { id } => {
            print_json(&ctx.engine().rule_lines(id).await?)?;
        },
        RuleCommands::Generate { id, persist } => {
            let code = if persist {
                let code = ctx.engine().refresh_rule_code(id).await?;
                info!("Rule {} code stored", id);
                code
            } else {
                ctx.engine().generate_code(id).await?
            };
            print_json(&code)?;
        },
    }
    Ok(())
}

pub async fn handle_line_command(cmd: LineCommands, ctx: &CliContext) -> Result<()> {
    let engine = ctx.engine();
    match cmd {
        LineCommands::Add {
            rule_id,
            function_id,
            action,
            sequence,
            params,
        } => {
            let line_id = engine
                .add_rule_line(&NewRuleLine {
                    rule_id: Some(rule_id),
                    function_id: Some(function_id),
                    is_condition: !action,
                    sequence,
                    parameters: into_inputs(params),
                })
                .await?;
            print_json(&json!({ "lineId": line_id }))?;
        },
        LineCommands::Update {
            line_id,
            function_id,
            sequence,
            params,
        } => {
            engine
                .update_rule_line(&RuleLineUpdate {
                    line_id: Some(line_id),
                    function_id: Some(function_id),
                    sequence,
                    parameters: into_inputs(params),
                })
                .await?;
            success(format!("Line {} updated", line_id));
        },
        LineCommands::Delete { line_id } => {
            engine.delete_rule_line(line_id).await?;
            success(format!("Line {} deleted", line_id));
        },
    }
    Ok(())
}
