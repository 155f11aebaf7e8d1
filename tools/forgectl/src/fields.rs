//! Field class import and listing

use anyhow::{bail, Context, Result};
use clap::Subcommand;
use forge_rules::FieldClassImport;
use serde_json::json;
use std::path::{Path, PathBuf};

use crate::context::CliContext;
use crate::output::print_json;

#[derive(Subcommand, Debug)]
pub enum FieldCommands {
    #[command(about = "Import field classes from a YAML or JSON file")]
    Import { file: PathBuf },

    #[command(about = "List fields")]
    List {
        /// Only fields of this class
        #[arg(long = "class")]
        class_id: Option<i64>,
    },

    #[command(about = "List field classes")]
    Classes,
}

/// Parse an import document: a list of field classes with their fields
pub fn read_import_file(path: &Path) -> Result<Vec<FieldClassImport>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let classes = match path.extension().and_then(|e| e.to_str()) {
        Some("yaml") | Some("yml") => serde_yaml::from_str(&content)?,
        Some("json") => serde_json::from_str(&content)?,
        _ => bail!("Unsupported import format: {}", path.display()),
    };
    Ok(classes)
}

pub async fn handle_command(cmd: FieldCommands, ctx: &CliContext) -> Result<()> {
    let pool = ctx.pool();
    match cmd {
        FieldCommands::Import { file } => {
            let classes = read_import_file(&file)?;
            let ids = forge_rules::import_field_classes(pool, &classes).await?;
            print_json(&json!({ "classIds": ids }))?;
        },
        FieldCommands::List { class_id } => {
            print_json(&forge_rules::list_fields(pool, class_id).await?)?;
        },
        FieldCommands::Classes => {
            print_json(&forge_rules::list_field_classes(pool).await?)?;
        },
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_read_yaml_import() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            r#"
- name: Customer
  classType: request
  fields:
    - name: age
      type: INTEGER
    - name: tier
      type: STRING
      size: 10
"#
        )
        .unwrap();

        let classes = read_import_file(file.path()).unwrap();
        assert_eq!(classes.len(), 1);
        assert_eq!(classes[0].fields.len(), 2);
        assert_eq!(classes[0].fields[1].field_type.as_deref(), Some("STRING"));
        assert_eq!(classes[0].fields[1].size, Some(10));
    }

    #[test]
    fn test_unknown_extension_rejected() {
        let file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        assert!(read_import_file(file.path()).is_err());
    }
}
