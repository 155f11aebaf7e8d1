//! Rule group commands

use anyhow::Result;
use clap::{Args, Subcommand};
use forge_rules::{GroupAnchor, RuleGroupInput};
use serde_json::json;
use std::str::FromStr;

use crate::context::CliContext;
use crate::output::{print_json, success};

/// Anchor argument: `none`, `self` or `group:<id>`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnchorArg(pub GroupAnchor);

impl FromStr for AnchorArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(AnchorArg(GroupAnchor::None)),
            "self" => Ok(AnchorArg(GroupAnchor::SelfMembership)),
            other => other
                .strip_prefix("group:")
                .and_then(|id| id.parse().ok())
                .map(|id| AnchorArg(GroupAnchor::ForeignGroup(id)))
                .ok_or_else(|| format!("invalid anchor '{}': expected none, self or group:<id>", s)),
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct GroupArgs {
    pub name: String,
    /// Combinator label, e.g. AND / OR
    #[arg(long)]
    pub cond_type: Option<String>,
    #[arg(long)]
    pub parent: Option<i64>,
    #[arg(short, long)]
    pub description: Option<String>,
    /// Group contributes conditions
    #[arg(long)]
    pub condition: bool,
    /// Group contributes actions
    #[arg(long)]
    pub action: bool,
    #[arg(long, default_value = "none")]
    pub cond_start: AnchorArg,
    #[arg(long, default_value = "none")]
    pub act_start: AnchorArg,
    /// Member rule IDs in order (full membership)
    #[arg(short, long = "rule")]
    pub rules: Vec<i64>,
}

impl From<GroupArgs> for RuleGroupInput {
    fn from(args: GroupArgs) -> Self {
        RuleGroupInput {
            name: args.name,
            cond_type: args.cond_type,
            parent_id: args.parent,
            description: args.description,
            is_condition: args.condition,
            is_action: args.action,
            condition_start: args.cond_start.0,
            action_start: args.act_start.0,
            rules: args.rules,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum GroupCommands {
    #[command(about = "List rule groups")]
    List,

    #[command(about = "Show a group with its member rules")]
    Show { id: i64 },

    #[command(about = "Create a rule group")]
    Add(GroupArgs),

    #[command(about = "Replace a group and its whole membership")]
    Update {
        id: i64,
        #[command(flatten)]
        group: GroupArgs,
    },

    #[command(about = "Delete a group; child groups are detached")]
    Delete { id: i64 },
}

pub async fn handle_command(cmd: GroupCommands, ctx: &CliContext) -> Result<()> {
    let pool = ctx.pool();
    match cmd {
        GroupCommands::List => {
            print_json(&forge_rules::list_rule_groups(pool).await?)?;
        },
        GroupCommands::Show { id } => {
            let group = forge_rules::get_rule_group(pool, id).await?;
            let members = forge_rules::assigned_rules(pool, id).await?;
            print_json(&json!({
                "group": group,
                "rules": members,
                "conditionStartGroup": forge_rules::anchor_target(id, group.condition_start),
                "actionStartGroup": forge_rules::anchor_target(id, group.action_start),
            }))?;
        },
        GroupCommands::Add(args) => {
            let id = forge_rules::create_rule_group(pool, &args.into()).await?;
            print_json(&json!({ "id": id }))?;
        },
        GroupCommands::Update { id, group } => {
            forge_rules::update_rule_group(pool, id, &group.into()).await?;
            success(format!("Rule group {} updated", id));
        },
        GroupCommands::Delete { id } => {
            forge_rules::delete_rule_group(pool, id).await?;
            success(format!("Rule group {} deleted", id));
        },
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_anchor_arg() {
        assert_eq!("none".parse::<AnchorArg>().unwrap().0, GroupAnchor::None);
        assert_eq!(
            "self".parse::<AnchorArg>().unwrap().0,
            GroupAnchor::SelfMembership
        );
        assert_eq!(
            "group:7".parse::<AnchorArg>().unwrap().0,
            GroupAnchor::ForeignGroup(7)
        );
        assert!("group:x".parse::<AnchorArg>().is_err());
        assert!("parent".parse::<AnchorArg>().is_err());
    }
}
