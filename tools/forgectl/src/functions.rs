//! Function catalog commands

use anyhow::Result;
use clap::{Args, Subcommand};
use forge_rules::{FunctionParamInput, NewFunction, ParamDirection};
use serde_json::json;
use std::str::FromStr;

use crate::context::CliContext;
use crate::output::{print_json, success};

/// Declared parameter: `<name>:<TYPE>` or `<name>:<TYPE>:<IN|OUT|INOUT>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredParamArg {
    pub name: String,
    pub param_type: String,
    pub io_type: ParamDirection,
}

impl FromStr for DeclaredParamArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, ':');
        let (Some(name), Some(param_type)) = (parts.next(), parts.next()) else {
            return Err(format!(
                "invalid parameter '{}': expected <name>:<TYPE>[:<IN|OUT|INOUT>]",
                s
            ));
        };
        if name.is_empty() || param_type.is_empty() {
            return Err(format!("invalid parameter '{}': empty name or type", s));
        }
        let io_type = match parts.next() {
            Some(io) => io.parse::<ParamDirection>().map_err(|e| e.to_string())?,
            None => ParamDirection::default(),
        };
        Ok(DeclaredParamArg {
            name: name.to_string(),
            param_type: param_type.to_string(),
            io_type,
        })
    }
}

impl DeclaredParamArg {
    fn into_input(self, seq: i64) -> FunctionParamInput {
        FunctionParamInput::new(seq, self.name, self.param_type).with_direction(self.io_type)
    }
}

#[derive(Args, Debug, Clone)]
pub struct FunctionArgs {
    /// Function name (identifier)
    pub name: String,
    /// Number of parameters (derived when --param is given)
    #[arg(short, long = "params", default_value = "0")]
    pub param_count: i64,
    #[arg(short, long)]
    pub description: Option<String>,
    /// Declared return type
    #[arg(short, long = "returns")]
    pub return_type: Option<String>,
    /// Declared parameters in order: <name>:<TYPE>[:<IN|OUT|INOUT>]
    #[arg(long = "param")]
    pub parameters: Vec<DeclaredParamArg>,
}

impl From<FunctionArgs> for NewFunction {
    fn from(args: FunctionArgs) -> Self {
        let parameters = if args.parameters.is_empty() {
            None
        } else {
            Some(
                args.parameters
                    .into_iter()
                    .enumerate()
                    .map(|(seq, param)| param.into_input(seq as i64))
                    .collect(),
            )
        };
        NewFunction {
            name: args.name,
            param_count: args.param_count,
            description: args.description,
            return_type: args.return_type,
            parameters,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct ParamArgs {
    /// Position among the declared parameters
    #[arg(long)]
    pub seq: i64,
    pub name: String,
    pub param_type: String,
    #[arg(long = "io", default_value = "IN")]
    pub io_type: ParamDirection,
    #[arg(short, long)]
    pub description: Option<String>,
}

impl From<ParamArgs> for FunctionParamInput {
    fn from(args: ParamArgs) -> Self {
        FunctionParamInput {
            seq: args.seq,
            name: args.name,
            param_type: args.param_type,
            io_type: args.io_type,
            description: args.description,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum FunctionCommands {
    #[command(about = "List all functions")]
    List,

    #[command(about = "Show one function with its declared parameters")]
    Show { id: i64 },

    #[command(about = "Register a new function")]
    Add(FunctionArgs),

    #[command(about = "Replace a function's definition and refresh rules using it")]
    Update {
        id: i64,
        #[command(flatten)]
        function: FunctionArgs,
    },

    #[command(about = "Delete a function no rule line uses")]
    Delete { id: i64 },

    #[command(about = "List a function's declared parameters")]
    Params { id: i64 },

    #[command(about = "Declare a parameter on a function")]
    AddParam {
        function_id: i64,
        #[command(flatten)]
        param: ParamArgs,
    },

    #[command(about = "Replace a declared parameter")]
    UpdateParam {
        param_id: i64,
        #[command(flatten)]
        param: ParamArgs,
    },

    #[command(about = "Remove a declared parameter")]
    DeleteParam { param_id: i64 },
}

pub async fn handle_command(cmd: FunctionCommands, ctx: &CliContext) -> Result<()> {
    let pool = ctx.pool();
    let engine = ctx.engine();
    match cmd {
        FunctionCommands::List => {
            print_json(&forge_rules::list_functions(pool).await?)?;
        },
        FunctionCommands::Show { id } => {
            print_json(&forge_rules::get_function(pool, id).await?)?;
        },
        FunctionCommands::Add(args) => {
            let id = forge_rules::create_function(pool, &args.into()).await?;
            print_json(&json!({ "id": id }))?;
        },
        FunctionCommands::Update { id, function } => {
            engine.update_function(id, &function.into()).await?;
            success(format!("Function {} updated", id));
        },
        FunctionCommands::Delete { id } => {
            forge_rules::delete_function(pool, id).await?;
            success(format!("Function {} deleted", id));
        },
        FunctionCommands::Params { id } => {
            print_json(&forge_rules::list_function_params(pool, id).await?)?;
        },
        FunctionCommands::AddParam { function_id, param } => {
            let id = engine.add_function_param(function_id, &param.into()).await?;
            print_json(&json!({ "paramId": id }))?;
        },
        FunctionCommands::UpdateParam { param_id, param } => {
            engine.update_function_param(param_id, &param.into()).await?;
            success(format!("Parameter {} updated", param_id));
        },
        FunctionCommands::DeleteParam { param_id } => {
            engine.delete_function_param(param_id).await?;
            success(format!("Parameter {} deleted", param_id));
        },
    }
    Ok(())
}
