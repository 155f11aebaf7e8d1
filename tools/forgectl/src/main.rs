//! forgectl - Management tool for the rule composition engine
//!
//! Works directly against the rule database: function catalog, rules and
//! their lines, rule groups, field class import and code generation.

mod config;
mod context;
mod fields;
mod functions;
mod groups;
mod output;
mod params;
mod rules;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use colored::*;
use std::path::PathBuf;
use tracing::debug;

use crate::config::{ForgectlConfig, SERVICE_NAME};
use crate::context::CliContext;

#[derive(Parser)]
#[command(name = "forgectl")]
#[command(about = "Forge rule engine management tool")]
#[command(long_about = "Forge rule engine management tool

Catalog:
  fields      Import and list field classes
  functions   Manage reusable functions

Rules:
  rules       Manage rules and generate their code
  lines       Add, update and delete rule lines
  groups      Compose rules into rule groups

Examples:
  forgectl init
  forgectl functions add isAdult --params 1
  forgectl functions add approve --param tier:STRING
  forgectl rules add CheckAge
  forgectl lines add 1 1 --param field:3
  forgectl lines add 1 2 --action --param lit:gold
  forgectl rules generate 1 --persist")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Configuration file (default: layered config/ lookup)
    #[arg(short = 'c', long = "config", global = true)]
    config: Option<PathBuf>,

    /// Database file (overrides database.path)
    #[arg(long = "db-path", global = true, env = "FORGE_DB_PATH")]
    db_path: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database schema
    Init,

    /// Field classes imported from API contracts
    #[command(subcommand)]
    Fields(fields::FieldCommands),

    /// Function catalog
    #[command(subcommand)]
    Functions(functions::FunctionCommands),

    /// Rules and code generation
    #[command(subcommand)]
    Rules(rules::RuleCommands),

    /// Rule lines
    #[command(subcommand)]
    Lines(rules::LineCommands),

    /// Rule groups
    #[command(subcommand)]
    Groups(groups::GroupCommands),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    if let Err(e) = run(cli).await {
        output::failure(format!("{:#}", e));
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = ForgectlConfig::load(cli.config.as_deref())?
        .with_overrides(cli.db_path.as_deref(), cli.verbose);

    let mut log_config = config.logging.to_log_config(SERVICE_NAME);
    log_config.ansi = !cli.no_color;
    common::logging::init_with_config(log_config)
        .map_err(|e| anyhow!("Failed to initialize logging: {}", e))?;
    debug!("Configuration: {:?}", config);

    let ctx = CliContext::open(&config).await?;

    match cli.command {
        Commands::Init => {
            output::success(format!(
                "Schema ready in {}",
                ctx.db_path().bright_cyan()
            ));
        },
        Commands::Fields(cmd) => fields::handle_command(cmd, &ctx).await?,
        Commands::Functions(cmd) => functions::handle_command(cmd, &ctx).await?,
        Commands::Rules(cmd) => rules::handle_command(cmd, &ctx).await?,
        Commands::Lines(cmd) => rules::handle_line_command(cmd, &ctx).await?,
        Commands::Groups(cmd) => groups::handle_command(cmd, &ctx).await?,
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use common::sqlite::SqliteClient;
    use forge_rules::CodegenOptions;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("forgectl").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_cli_parses_line_params() {
        let cli = parse(&[
            "lines", "add", "3", "9", "--action", "--seq", "2", "--param", "field:4", "-p",
            "lit:STRING:gold",
        ]);
        match cli.command {
            Commands::Lines(rules::LineCommands::Add {
                rule_id,
                function_id,
                action,
                sequence,
                params,
            }) => {
                assert_eq!((rule_id, function_id, action, sequence), (3, 9, true, 2));
                assert_eq!(params.len(), 2);
            },
            _ => panic!("unexpected command"),
        }
    }

    #[test]
    fn test_cli_rejects_bad_param() {
        let result = Cli::try_parse_from(["forgectl", "lines", "add", "1", "1", "--param", "x"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_parses_param_declarations() {
        let cli = parse(&[
            "functions", "add-param", "4", "--seq", "1", "tier", "STRING", "--io", "inout",
        ]);
        match cli.command {
            Commands::Functions(functions::FunctionCommands::AddParam { function_id, param }) => {
                assert_eq!(function_id, 4);
                assert_eq!(param.seq, 1);
                assert_eq!(param.io_type, forge_rules::ParamDirection::InOut);
            },
            _ => panic!("unexpected command"),
        }
    }

    #[test]
    fn test_global_flags() {
        let cli = parse(&["--db-path", "/tmp/x.db", "rules", "generate", "5", "--persist", "-v"]);
        assert_eq!(cli.db_path.as_deref(), Some("/tmp/x.db"));
        assert!(cli.verbose);
        assert!(matches!(
            cli.command,
            Commands::Rules(rules::RuleCommands::Generate { id: 5, persist: true })
        ));
    }

    #[tokio::test]
    async fn test_commands_against_memory_database() {
        let client = SqliteClient::in_memory().await.unwrap();
        let ctx = CliContext::from_client(client, CodegenOptions::default())
            .await
            .unwrap();

        let steps = [
            vec!["functions", "add", "isAdult", "--params", "1"],
            vec!["functions", "add", "approve", "--param", "tier:STRING"],
            vec!["rules", "add", "CheckAge"],
            vec!["lines", "add", "1", "1", "--param", "lit:18"],
            vec!["lines", "add", "1", "2", "--action", "--param", "lit:gold"],
            vec!["groups", "add", "Adults", "--rule", "1", "--cond-start", "self"],
            vec!["functions", "update", "1", "isGrownUp", "--params", "1"],
        ];
        for step in steps {
            let cli = parse(&step);
            match cli.command {
                Commands::Functions(cmd) => functions::handle_command(cmd, &ctx).await.unwrap(),
                Commands::Rules(cmd) => rules::handle_command(cmd, &ctx).await.unwrap(),
                Commands::Lines(cmd) => rules::handle_line_command(cmd, &ctx).await.unwrap(),
                Commands::Groups(cmd) => groups::handle_command(cmd, &ctx).await.unwrap(),
                _ => unreachable!(),
            }
        }

        let rule = forge_rules::get_rule(ctx.pool(), 1).await.unwrap();
        assert_eq!(rule.condition_code, "isGrownUp(18);");
        assert_eq!(rule.action_code, "approve('gold');");

        // In use by a line, so the delete is refused
        let cli = parse(&["functions", "delete", "1"]);
        let Commands::Functions(cmd) = cli.command else {
            unreachable!()
        };
        assert!(functions::handle_command(cmd, &ctx).await.is_err());
    }
}
