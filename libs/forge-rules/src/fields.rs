//! Field class import
//!
//! Field classes and fields are read-only to rule composition; they enter
//! the database through a bulk import of contract-derived schemas.

use sqlx::{Row, SqlitePool};
use tracing::info;

use crate::error::{Result, RuleError};
use crate::types::{Field, FieldClass, FieldClassImport};

/// Insert field classes with their fields in one transaction
///
/// Returns the new class IDs in input order.
pub async fn import_field_classes(
    pool: &SqlitePool,
    classes: &[FieldClassImport],
) -> Result<Vec<i64>> {
    for class in classes {
        if class.name.trim().is_empty() {
            return Err(RuleError::validation("field class name is required"));
        }
        if class.fields.iter().any(|f| f.name.trim().is_empty()) {
            return Err(RuleError::validation(format!(
                "field class '{}' has a field without a name",
                class.name
            )));
        }
    }

    let mut tx = pool.begin().await?;
    let mut ids = Vec::with_capacity(classes.len());
    let mut field_count = 0;

    for class in classes {
        let class_id = sqlx::query(
            "INSERT INTO field_classes (name, class_type, description) VALUES (?, ?, ?)",
        )
        .bind(class.name.trim())
        .bind(&class.class_type)
        .bind(&class.description)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        for field in &class.fields {
            sqlx::query(
                r#"
                INSERT INTO fields (
                    field_class_id, name, field_type, size, precision_size,
                    default_value, description
                )
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(class_id)
            .bind(field.name.trim())
            .bind(&field.field_type)
            .bind(field.size)
            .bind(field.precision_size)
            .bind(&field.default_value)
            .bind(&field.description)
            .execute(&mut *tx)
            .await?;
            field_count += 1;
        }
        ids.push(class_id);
    }
    tx.commit().await?;

    info!(
        "Imported {} field class(es), {} field(s)",
        ids.len(),
        field_count
    );
    Ok(ids)
}

pub async fn list_field_classes(pool: &SqlitePool) -> Result<Vec<FieldClass>> {
    let rows = sqlx::query(
        "SELECT id, name, class_type, description FROM field_classes ORDER BY id ASC",
    )
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| -> Result<FieldClass> {
            Ok(FieldClass {
                id: row.try_get("id")?,
                name: row.try_get("name")?,
                class_type: row.try_get("class_type")?,
                description: row.try_get("description")?,
            })
        })
        .collect()
}

/// Fields of one class, or every field when `class_id` is `None`
pub async fn list_fields(pool: &SqlitePool, class_id: Option<i64>) -> Result<Vec<Field>> {
    let rows = sqlx::query(
        r#"
        SELECT id, field_class_id, name, field_type, size, precision_size,
               default_value, description
        FROM fields
        WHERE ? IS NULL OR field_class_id = ?
        ORDER BY id ASC
        "#,
    )
    .bind(class_id)
    .bind(class_id)
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| -> Result<Field> {
            Ok(Field {
                id: row.try_get("id")?,
                field_class_id: row.try_get("field_class_id")?,
                name: row.try_get("name")?,
                field_type: row.try_get("field_type")?,
                size: row.try_get("size")?,
                precision_size: row.try_get("precision_size")?,
                default_value: row.try_get("default_value")?,
                description: row.try_get("description")?,
            })
        })
        .collect()
}
