//! Integration tests for rule group composition

#![allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable

use forge_rules::{
    action_anchor, anchor_target, assigned_rules, condition_anchor, create_rule,
    create_rule_group, delete_rule_group, get_rule_group, init_schema, list_rule_groups,
    update_rule_group, GroupAnchor, NewRule, Result, RuleError, RuleGroupInput,
};
use sqlx::SqlitePool;

async fn setup_test_db() -> SqlitePool {
    let pool = SqlitePool::connect("sqlite::memory:")
        .await
        .expect("Failed to create in-memory database");
    init_schema(&pool).await.unwrap();
    pool
}

async fn new_rule(pool: &SqlitePool, name: &str) -> i64 {
    create_rule(
        pool,
        &NewRule {
            name: name.to_string(),
            ..Default::default()
        },
    )
    .await
    .unwrap()
}

fn group(name: &str, rules: Vec<i64>) -> RuleGroupInput {
    RuleGroupInput {
        name: name.to_string(),
        cond_type: Some("AND".to_string()),
        rules,
        ..Default::default()
    }
}

async fn membership_rows(pool: &SqlitePool, group_id: i64) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM rule_group_rules WHERE group_id = ?")
        .bind(group_id)
        .fetch_one(pool)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_update_replaces_membership() -> Result<()> {
    let pool = setup_test_db().await;
    let rule_a = new_rule(&pool, "RuleA").await;
    let rule_b = new_rule(&pool, "RuleB").await;

    let id = create_rule_group(&pool, &group("Eligibility", vec![rule_a, rule_b])).await?;
    let members = assigned_rules(&pool, id).await?;
    assert_eq!(
        members
            .iter()
            .map(|m| (m.rule_name.as_str(), m.sequence))
            .collect::<Vec<_>>(),
        vec![("RuleA", 0), ("RuleB", 1)]
    );

    update_rule_group(&pool, id, &group("Eligibility", vec![rule_b])).await?;

    let members = assigned_rules(&pool, id).await?;
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].rule_id, rule_b);
    assert_eq!(members[0].sequence, 0);
    assert_eq!(membership_rows(&pool, id).await, 1);
    Ok(())
}

#[tokio::test]
async fn test_group_attributes_and_anchors() -> Result<()> {
    let pool = setup_test_db().await;
    let rule_a = new_rule(&pool, "RuleA").await;

    let base = create_rule_group(&pool, &group("Base", vec![rule_a])).await?;
    let composite = create_rule_group(
        &pool,
        &RuleGroupInput {
            name: "Composite".to_string(),
            cond_type: Some("OR".to_string()),
            parent_id: Some(base),
            description: Some("wraps base".to_string()),
            is_condition: true,
            is_action: false,
            condition_start: GroupAnchor::ForeignGroup(base),
            action_start: GroupAnchor::SelfMembership,
            rules: vec![],
        },
    )
    .await?;

    let stored = get_rule_group(&pool, composite).await?;
    assert_eq!(stored.cond_type.as_deref(), Some("OR"));
    assert_eq!(stored.parent_id, Some(base));
    assert!(stored.is_condition);
    assert!(!stored.is_action);
    assert_eq!(stored.condition_start, GroupAnchor::ForeignGroup(base));

    assert_eq!(
        anchor_target(composite, condition_anchor(&pool, composite).await?),
        Some(base)
    );
    assert_eq!(
        anchor_target(composite, action_anchor(&pool, composite).await?),
        Some(composite)
    );
    assert_eq!(condition_anchor(&pool, base).await?, GroupAnchor::None);

    assert_eq!(list_rule_groups(&pool).await?.len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_group_validation() -> Result<()> {
    let pool = setup_test_db().await;
    let rule_a = new_rule(&pool, "RuleA").await;

    assert!(matches!(
        create_rule_group(&pool, &group("", vec![])).await,
        Err(RuleError::Validation(_))
    ));
    assert!(matches!(
        create_rule_group(&pool, &group("Ghost", vec![rule_a, 777])).await,
        Err(RuleError::NotFound { kind: "Rule", id: 777 })
    ));
    assert!(matches!(
        create_rule_group(
            &pool,
            &RuleGroupInput {
                condition_start: GroupAnchor::ForeignGroup(55),
                ..group("Dangling", vec![])
            }
        )
        .await,
        Err(RuleError::NotFound {
            kind: "RuleGroup",
            id: 55
        })
    ));
    assert!(list_rule_groups(&pool).await?.is_empty());

    let id = create_rule_group(&pool, &group("Real", vec![rule_a])).await?;
    let err = update_rule_group(&pool, id, &group("Real", vec![rule_a, 888]))
        .await
        .unwrap_err();
    assert!(matches!(err, RuleError::NotFound { .. }));
    // Failed update leaves the previous membership intact
    assert_eq!(membership_rows(&pool, id).await, 1);

    assert!(matches!(
        update_rule_group(&pool, 4040, &group("Missing", vec![])).await,
        Err(RuleError::NotFound { kind: "RuleGroup", .. })
    ));
    Ok(())
}

#[tokio::test]
async fn test_parent_cycles_rejected() -> Result<()> {
    let pool = setup_test_db().await;

    let root = create_rule_group(&pool, &group("Root", vec![])).await?;
    let child = create_rule_group(
        &pool,
        &RuleGroupInput {
            parent_id: Some(root),
            ..group("Child", vec![])
        },
    )
    .await?;
    let grandchild = create_rule_group(
        &pool,
        &RuleGroupInput {
            parent_id: Some(child),
            ..group("Grandchild", vec![])
        },
    )
    .await?;

    let reparent_root = RuleGroupInput {
        parent_id: Some(grandchild),
        ..group("Root", vec![])
    };
    assert!(matches!(
        update_rule_group(&pool, root, &reparent_root).await,
        Err(RuleError::Validation(_))
    ));

    let self_parent = RuleGroupInput {
        parent_id: Some(child),
        ..group("Child", vec![])
    };
    assert!(matches!(
        update_rule_group(&pool, child, &self_parent).await,
        Err(RuleError::Validation(_))
    ));

    assert_eq!(get_rule_group(&pool, root).await?.parent_id, None);
    Ok(())
}

#[tokio::test]
async fn test_delete_group_detaches_dependents() -> Result<()> {
    let pool = setup_test_db().await;
    let rule_a = new_rule(&pool, "RuleA").await;

    let parent = create_rule_group(&pool, &group("Parent", vec![rule_a])).await?;
    let child = create_rule_group(
        &pool,
        &RuleGroupInput {
            parent_id: Some(parent),
            action_start: GroupAnchor::ForeignGroup(parent),
            ..group("Child", vec![rule_a])
        },
    )
    .await?;

    delete_rule_group(&pool, parent).await?;

    assert!(matches!(
        get_rule_group(&pool, parent).await,
        Err(RuleError::NotFound { .. })
    ));
    assert_eq!(membership_rows(&pool, parent).await, 0);

    let child = get_rule_group(&pool, child).await?;
    assert_eq!(child.parent_id, None);
    assert_eq!(child.action_start, GroupAnchor::None);
    assert_eq!(assigned_rules(&pool, child.id).await?.len(), 1);

    assert!(matches!(
        delete_rule_group(&pool, parent).await,
        Err(RuleError::NotFound { .. })
    ));
    Ok(())
}
