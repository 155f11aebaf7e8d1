//! Rule Group Composer
//!
//! Groups own an ordered rule membership that is replaced wholesale on every
//! update, plus two anchors naming where condition and action traversal
//! start. Anchors are stored and returned as-is; nothing here walks them.

use std::collections::HashSet;

use sqlx::{sqlite::SqliteRow, Row, SqliteConnection, SqlitePool};
use tracing::{info, warn};

use crate::error::{Result, RuleError};
use crate::types::{GroupAnchor, GroupMember, RuleGroup, RuleGroupInput};

const GROUP_COLUMNS: &str = r#"
    id, name, cond_type, parent_id, description, is_condition, is_action,
    cond_start_kind, cond_start_group_id, act_start_kind, act_start_group_id, updated_at
"#;

/// List all rule groups ordered by ID
pub async fn list_rule_groups(pool: &SqlitePool) -> Result<Vec<RuleGroup>> {
    let sql = format!("SELECT {} FROM rule_groups ORDER BY id ASC", GROUP_COLUMNS);
    let rows = sqlx::query(&sql).fetch_all(pool).await?;

    let mut groups = Vec::with_capacity(rows.len());
    for row in rows {
        groups.push(hydrate_group(&row)?);
    }
    Ok(groups)
}

/// Get a single rule group by ID
pub async fn get_rule_group(pool: &SqlitePool, id: i64) -> Result<RuleGroup> {
    let sql = format!("SELECT {} FROM rule_groups WHERE id = ?", GROUP_COLUMNS);
    let row = sqlx::query(&sql).bind(id).fetch_optional(pool).await?;

    match row {
        Some(row) => hydrate_group(&row),
        None => Err(RuleError::not_found("RuleGroup", id)),
    }
}

/// Member rules of a group in stored sequence order
pub async fn assigned_rules(pool: &SqlitePool, group_id: i64) -> Result<Vec<GroupMember>> {
    let mut conn = pool.acquire().await?;
    if !group_exists(&mut conn, group_id).await? {
        return Err(RuleError::not_found("RuleGroup", group_id));
    }

    let rows = sqlx::query(
        r#"
        SELECT m.rule_id, r.name AS rule_name, m.sequence
        FROM rule_group_rules m
        JOIN rules r ON r.id = m.rule_id
        WHERE m.group_id = ?
        ORDER BY m.sequence ASC, m.id ASC
        "#,
    )
    .bind(group_id)
    .fetch_all(&mut *conn)
    .await?;

    rows.iter()
        .map(|row| -> Result<GroupMember> {
            Ok(GroupMember {
                rule_id: row.try_get("rule_id")?,
                rule_name: row.try_get("rule_name")?,
                sequence: row.try_get("sequence")?,
            })
        })
        .collect()
}

/// Create a group with its initial membership, returning the group ID
pub async fn create_rule_group(pool: &SqlitePool, input: &RuleGroupInput) -> Result<i64> {
    validate_name(input)?;

    let mut tx = pool.begin().await?;
    if let Some(parent_id) = input.parent_id {
        if !group_exists(&mut tx, parent_id).await? {
            return Err(RuleError::not_found("RuleGroup", parent_id));
        }
    }
    ensure_anchor(&mut tx, input.condition_start).await?;
    ensure_anchor(&mut tx, input.action_start).await?;
    ensure_rules(&mut tx, &input.rules).await?;

    let (cond_kind, cond_group) = input.condition_start.to_columns();
    let (act_kind, act_group) = input.action_start.to_columns();

    let id = sqlx::query(
        r#"
        INSERT INTO rule_groups (
            name, cond_type, parent_id, description, is_condition, is_action,
            cond_start_kind, cond_start_group_id, act_start_kind, act_start_group_id
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(input.name.trim())
    .bind(&input.cond_type)
    .bind(input.parent_id)
    .bind(&input.description)
    .bind(input.is_condition)
    .bind(input.is_action)
    .bind(cond_kind)
    .bind(cond_group)
    .bind(act_kind)
    .bind(act_group)
    .execute(&mut *tx)
    .await?
    .last_insert_rowid();

    replace_members(&mut tx, id, &input.rules).await?;
    tx.commit().await?;

    info!(
        "Rule group '{}' created with id {} ({} rule(s))",
        input.name.trim(),
        id,
        input.rules.len()
    );
    Ok(id)
}

/// Replace a group's attributes and its entire membership
pub async fn update_rule_group(pool: &SqlitePool, id: i64, input: &RuleGroupInput) -> Result<()> {
    validate_name(input)?;

    let mut tx = pool.begin().await?;
    if !group_exists(&mut tx, id).await? {
        return Err(RuleError::not_found("RuleGroup", id));
    }
    if let Some(parent_id) = input.parent_id {
        ensure_acyclic(&mut tx, id, parent_id).await?;
    }
    ensure_anchor(&mut tx, input.condition_start).await?;
    ensure_anchor(&mut tx, input.action_start).await?;
    ensure_rules(&mut tx, &input.rules).await?;

    let (cond_kind, cond_group) = input.condition_start.to_columns();
    let (act_kind, act_group) = input.action_start.to_columns();

    sqlx::query(
        r#"
        UPDATE rule_groups
        SET name = ?, cond_type = ?, parent_id = ?, description = ?,
            is_condition = ?, is_action = ?,
            cond_start_kind = ?, cond_start_group_id = ?,
            act_start_kind = ?, act_start_group_id = ?,
            updated_at = CURRENT_TIMESTAMP
        WHERE id = ?
        "#,
    )
    .bind(input.name.trim())
    .bind(&input.cond_type)
    .bind(input.parent_id)
    .bind(&input.description)
    .bind(input.is_condition)
    .bind(input.is_action)
    .bind(cond_kind)
    .bind(cond_group)
    .bind(act_kind)
    .bind(act_group)
    .bind(id)
    .execute(&mut *tx)
    .await?;

    replace_members(&mut tx, id, &input.rules).await?;
    tx.commit().await?;

    info!("Rule group {} updated ({} rule(s))", id, input.rules.len());
    Ok(())
}

/// Delete a group and its memberships
///
/// Child groups are detached and anchors pointing at the group reset to none.
pub async fn delete_rule_group(pool: &SqlitePool, id: i64) -> Result<()> {
    let mut tx = pool.begin().await?;
    if !group_exists(&mut tx, id).await? {
        return Err(RuleError::not_found("RuleGroup", id));
    }

    sqlx::query("DELETE FROM rule_group_rules WHERE group_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    let children = sqlx::query("UPDATE rule_groups SET parent_id = NULL WHERE parent_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?
        .rows_affected();
    sqlx::query(
        r#"
        UPDATE rule_groups
        SET cond_start_kind = 'none', cond_start_group_id = NULL
        WHERE cond_start_kind = 'group' AND cond_start_group_id = ?
        "#,
    )
    .bind(id)
    .execute(&mut *tx)
    .await?;
    sqlx::query(
        r#"
        UPDATE rule_groups
        SET act_start_kind = 'none', act_start_group_id = NULL
        WHERE act_start_kind = 'group' AND act_start_group_id = ?
        "#,
    )
    .bind(id)
    .execute(&mut *tx)
    .await?;
    sqlx::query("DELETE FROM rule_groups WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    if children > 0 {
        warn!("Rule group {} deleted; detached {} child group(s)", id, children);
    } else {
        info!("Rule group {} deleted", id);
    }
    Ok(())
}

/// Group whose membership an anchor of `group_id` starts from
pub fn anchor_target(group_id: i64, anchor: GroupAnchor) -> Option<i64> {
    match anchor {
        GroupAnchor::None => None,
        GroupAnchor::SelfMembership => Some(group_id),
        GroupAnchor::ForeignGroup(other) => Some(other),
    }
}

/// Condition-start anchor of a group
pub async fn condition_anchor(pool: &SqlitePool, group_id: i64) -> Result<GroupAnchor> {
    Ok(get_rule_group(pool, group_id).await?.condition_start)
}

/// Action-start anchor of a group
pub async fn action_anchor(pool: &SqlitePool, group_id: i64) -> Result<GroupAnchor> {
    Ok(get_rule_group(pool, group_id).await?.action_start)
}

fn validate_name(input: &RuleGroupInput) -> Result<()> {
    if input.name.trim().is_empty() {
        return Err(RuleError::validation("rule group name is required"));
    }
    Ok(())
}

async fn group_exists(conn: &mut SqliteConnection, id: i64) -> Result<bool> {
    let found: Option<i64> = sqlx::query_scalar("SELECT id FROM rule_groups WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(found.is_some())
}

async fn ensure_anchor(conn: &mut SqliteConnection, anchor: GroupAnchor) -> Result<()> {
    if let GroupAnchor::ForeignGroup(other) = anchor {
        if !group_exists(conn, other).await? {
            return Err(RuleError::not_found("RuleGroup", other));
        }
    }
    Ok(())
}

async fn ensure_rules(conn: &mut SqliteConnection, rules: &[i64]) -> Result<()> {
    for &rule_id in rules {
        let found: Option<i64> = sqlx::query_scalar("SELECT id FROM rules WHERE id = ?")
            .bind(rule_id)
            .fetch_optional(&mut *conn)
            .await?;
        if found.is_none() {
            return Err(RuleError::not_found("Rule", rule_id));
        }
    }
    Ok(())
}

/// Walk up from `parent_id`; reaching `group_id` means the link would close a loop
async fn ensure_acyclic(conn: &mut SqliteConnection, group_id: i64, parent_id: i64) -> Result<()> {
    let mut seen = HashSet::new();
    let mut current = Some(parent_id);

    while let Some(id) = current {
        if id == group_id {
            return Err(RuleError::validation(format!(
                "rule group {} cannot be nested under {}: parent chain loops back",
                group_id, parent_id
            )));
        }
        if !seen.insert(id) {
            break;
        }

        let row: Option<Option<i64>> =
            sqlx::query_scalar("SELECT parent_id FROM rule_groups WHERE id = ?")
                .bind(id)
                .fetch_optional(&mut *conn)
                .await?;
        current = match row {
            Some(next) => next,
            None if id == parent_id => return Err(RuleError::not_found("RuleGroup", parent_id)),
            None => None,
        };
    }
    Ok(())
}

async fn replace_members(conn: &mut SqliteConnection, group_id: i64, rules: &[i64]) -> Result<()> {
    sqlx::query("DELETE FROM rule_group_rules WHERE group_id = ?")
        .bind(group_id)
        .execute(&mut *conn)
        .await?;

    for (sequence, &rule_id) in rules.iter().enumerate() {
        sqlx::query("INSERT INTO rule_group_rules (group_id, rule_id, sequence) VALUES (?, ?, ?)")
            .bind(group_id)
            .bind(rule_id)
            .bind(sequence as i64)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

fn hydrate_group(row: &SqliteRow) -> Result<RuleGroup> {
    let cond_kind: String = row.try_get("cond_start_kind")?;
    let act_kind: String = row.try_get("act_start_kind")?;

    Ok(RuleGroup {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        cond_type: row.try_get("cond_type")?,
        parent_id: row.try_get("parent_id")?,
        description: row.try_get("description")?,
        is_condition: row.try_get("is_condition")?,
        is_action: row.try_get("is_action")?,
        condition_start: GroupAnchor::from_columns(&cond_kind, row.try_get("cond_start_group_id")?)?,
        action_start: GroupAnchor::from_columns(&act_kind, row.try_get("act_start_group_id")?)?,
        updated_at: row.try_get("updated_at")?,
    })
}
