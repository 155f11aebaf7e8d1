//! Integration tests for code generation and the generated-code cache

#![allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable

use forge_rules::{
    create_function, create_rule, get_function, get_rule, import_field_classes, init_schema,
    list_fields, CodegenOptions, FieldClassImport, FieldImport, FunctionParamInput, NewFunction,
    NewRule, NewRuleLine, ParamInput, QuotingStrategy, Result, RuleEngine, RuleError,
    RuleLineUpdate,
};
use sqlx::SqlitePool;

struct Fixture {
    pool: SqlitePool,
    engine: RuleEngine,
    age_field: i64,
    tier_field: i64,
}

async fn setup() -> Fixture {
    let pool = SqlitePool::connect("sqlite::memory:")
        .await
        .expect("Failed to create in-memory database");
    init_schema(&pool).await.unwrap();

    import_field_classes(
        &pool,
        &[FieldClassImport {
            name: "Customer".to_string(),
            fields: vec![
                FieldImport {
                    name: "age".to_string(),
                    field_type: Some("INTEGER".to_string()),
                    ..Default::default()
                },
                FieldImport {
                    name: "tier".to_string(),
                    field_type: Some("STRING".to_string()),
                    ..Default::default()
                },
            ],
            ..Default::default()
        }],
    )
    .await
    .unwrap();
    let fields = list_fields(&pool, None).await.unwrap();

    Fixture {
        engine: RuleEngine::new(pool.clone()),
        age_field: fields[0].id,
        tier_field: fields[1].id,
        pool,
    }
}

async fn func(pool: &SqlitePool, name: &str, param_count: i64) -> i64 {
    create_function(
        pool,
        &NewFunction {
            name: name.to_string(),
            param_count,
            ..Default::default()
        },
    )
    .await
    .unwrap()
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

fn line(
    rule_id: i64,
    function_id: i64,
    is_condition: bool,
    sequence: i64,
    parameters: Vec<ParamInput>,
) -> NewRuleLine {
    NewRuleLine {
        rule_id: Some(rule_id),
        function_id: Some(function_id),
        is_condition,
        sequence,
        parameters,
    }
}

#[tokio::test]
async fn test_check_age_example() -> Result<()> {
    let fx = setup().await;
    let is_adult = func(&fx.pool, "isAdult", 1).await;
    let approve = func(&fx.pool, "approve", 1).await;
    let rule_id = new_rule(&fx.pool, "CheckAge").await;

    fx.engine
        .add_rule_line(&line(rule_id, is_adult, true, 0, vec![ParamInput::field(fx.age_field)]))
        .await?;
    fx.engine
        .add_rule_line(&line(
            rule_id,
            approve,
            false,
            0,
            vec![ParamInput::typed_literal("gold", "STRING")],
        ))
        .await?;

    let code = fx.engine.generate_code(rule_id).await?;
    assert_eq!(code.condition_code, "isAdult(fields.age);");
    assert_eq!(code.action_code, "approve('gold');");
    Ok(())
}

#[tokio::test]
async fn test_lines_render_in_phase_then_sequence_order() -> Result<()> {
    let fx = setup().await;
    let rule_id = new_rule(&fx.pool, "Ordered").await;

    let mut ids = std::collections::HashMap::new();
    for name in ["c0", "c1", "c2", "a0", "a1"] {
        ids.insert(name, func(&fx.pool, name, 0).await);
    }

    // Inserted out of order on purpose, actions first
    for (name, is_condition, sequence) in [
        ("a1", false, 1),
        ("c2", true, 2),
        ("a0", false, 0),
        ("c0", true, 0),
        ("c1", true, 1),
    ] {
        fx.engine
            .add_rule_line(&line(rule_id, ids[name], is_condition, sequence, vec![]))
            .await?;
    }

    let code = fx.engine.generate_code(rule_id).await?;
    assert_eq!(code.condition_code, "c0();\nc1();\nc2();");
    assert_eq!(code.action_code, "a0();\na1();");

    let lines = fx.engine.rule_lines(rule_id).await?;
    let order: Vec<&str> = lines.iter().map(|l| l.function_name.as_str()).collect();
    assert_eq!(order, vec!["c0", "c1", "c2", "a0", "a1"]);
    Ok(())
}

#[tokio::test]
async fn test_non_contiguous_sequences() -> Result<()> {
    let fx = setup().await;
    let first = func(&fx.pool, "first", 0).await;
    let second = func(&fx.pool, "second", 0).await;
    let rule_id = new_rule(&fx.pool, "Gaps").await;

    fx.engine
        .add_rule_line(&line(rule_id, second, true, 40, vec![]))
        .await?;
    fx.engine
        .add_rule_line(&line(rule_id, first, true, 7, vec![]))
        .await?;

    let code = fx.engine.generate_code(rule_id).await?;
    assert_eq!(code.condition_code, "first();\nsecond();");
    assert_eq!(code.action_code, "");
    Ok(())
}

#[tokio::test]
async fn test_generation_is_deterministic() -> Result<()> {
    let fx = setup().await;
    let check = func(&fx.pool, "check", 2).await;
    let rule_id = new_rule(&fx.pool, "Stable").await;
    fx.engine
        .add_rule_line(&line(
            rule_id,
            check,
            true,
            0,
            vec![ParamInput::field(fx.tier_field), ParamInput::literal("3")],
        ))
        .await?;

    let first = fx.engine.generate_code(rule_id).await?;
    let second = fx.engine.generate_code(rule_id).await?;
    assert_eq!(first, second);
    assert_eq!(first.condition_code, "check(fields.tier, 3);");
    Ok(())
}

#[tokio::test]
async fn test_literal_quoting() -> Result<()> {
    let fx = setup().await;
    let emit = func(&fx.pool, "emit", 2).await;
    let rule_id = new_rule(&fx.pool, "Quoting").await;
    fx.engine
        .add_rule_line(&line(
            rule_id,
            emit,
            false,
            0,
            vec![
                ParamInput::typed_literal("abc", "STRING"),
                ParamInput::typed_literal("42", "INTEGER"),
            ],
        ))
        .await?;
    fx.engine
        .add_rule_line(&line(
            rule_id,
            emit,
            false,
            1,
            vec![
                ParamInput::typed_literal("abc", "VARCHAR"),
                ParamInput::literal("raw"),
            ],
        ))
        .await?;

    let code = fx.engine.generate_code(rule_id).await?;
    assert_eq!(code.action_code, "emit('abc', 42);\nemit(abc, raw);");

    let textual = RuleEngine::new(fx.pool.clone()).with_options(CodegenOptions {
        quoting: QuotingStrategy::TextualTypes,
        ..Default::default()
    });
    let code = textual.generate_code(rule_id).await?;
    assert_eq!(code.action_code, "emit('abc', 42);\nemit('abc', raw);");
    Ok(())
}

#[tokio::test]
async fn test_field_reference_takes_precedence() -> Result<()> {
    let fx = setup().await;
    let greet = func(&fx.pool, "greet", 1).await;
    let rule_id = new_rule(&fx.pool, "Precedence").await;
    fx.engine
        .add_rule_line(&line(
            rule_id,
            greet,
            true,
            0,
            vec![ParamInput {
                field_id: Some(fx.tier_field),
                literal_value: Some("shadowed".to_string()),
                value_type: Some("STRING".to_string()),
            }],
        ))
        .await?;

    let code = fx.engine.generate_code(rule_id).await?;
    assert_eq!(code.condition_code, "greet(fields.tier);");

    let scoped = RuleEngine::new(fx.pool.clone()).with_options(CodegenOptions {
        field_context: "input".to_string(),
        ..Default::default()
    });
    assert_eq!(
        scoped.generate_code(rule_id).await?.condition_code,
        "greet(input.tier);"
    );
    Ok(())
}

#[tokio::test]
async fn test_empty_rule_generates_empty_blocks() -> Result<()> {
    let fx = setup().await;
    let rule_id = new_rule(&fx.pool, "Empty").await;

    let code = fx.engine.generate_code(rule_id).await?;
    assert_eq!(code.condition_code, "");
    assert_eq!(code.action_code, "");

    assert!(matches!(
        fx.engine.generate_code(9999).await,
        Err(RuleError::NotFound { kind: "Rule", .. })
    ));
    Ok(())
}

#[tokio::test]
async fn test_cache_follows_every_line_write() -> Result<()> {
    let fx = setup().await;
    let is_adult = func(&fx.pool, "isAdult", 1).await;
    let rule_id = new_rule(&fx.pool, "Cached").await;

    let line_id = fx
        .engine
        .add_rule_line(&line(rule_id, is_adult, true, 0, vec![ParamInput::field(fx.age_field)]))
        .await?;
    assert_eq!(
        get_rule(&fx.pool, rule_id).await?.condition_code,
        "isAdult(fields.age);"
    );

    fx.engine
        .update_rule_line(&RuleLineUpdate {
            line_id: Some(line_id),
            function_id: Some(is_adult),
            sequence: 0,
            parameters: vec![ParamInput::literal("21")],
        })
        .await?;
    assert_eq!(
        get_rule(&fx.pool, rule_id).await?.condition_code,
        "isAdult(21);"
    );

    fx.engine.delete_rule_line(line_id).await?;
    let stored = get_rule(&fx.pool, rule_id).await?;
    assert_eq!(stored.condition_code, "");
    assert_eq!(stored.action_code, "");

    let params: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM rule_line_params WHERE line_id = ?")
        .bind(line_id)
        .fetch_one(&fx.pool)
        .await
        .unwrap();
    assert_eq!(params, 0);
    Ok(())
}

/// Cached code of a rule must equal a fresh generation
async fn assert_cache_current(fx: &Fixture, rule_id: i64) -> Result<()> {
    let stored = get_rule(&fx.pool, rule_id).await?;
    let live = fx.engine.generate_code(rule_id).await?;
    assert_eq!(stored.condition_code, live.condition_code);
    assert_eq!(stored.action_code, live.action_code);
    Ok(())
}

#[tokio::test]
async fn test_cache_follows_function_rename() -> Result<()> {
    let fx = setup().await;
    let is_adult = func(&fx.pool, "isAdult", 1).await;
    let first = new_rule(&fx.pool, "AdultCheck").await;
    let second = new_rule(&fx.pool, "AdultAction").await;
    let untouched = new_rule(&fx.pool, "Untouched").await;

    fx.engine
        .add_rule_line(&line(first, is_adult, true, 0, vec![ParamInput::literal("18")]))
        .await?;
    fx.engine
        .add_rule_line(&line(second, is_adult, false, 0, vec![ParamInput::field(fx.age_field)]))
        .await?;

    fx.engine
        .update_function(
            is_adult,
            &NewFunction {
                name: "isGrownUp".to_string(),
                param_count: 1,
                ..Default::default()
            },
        )
        .await?;

    assert_eq!(get_rule(&fx.pool, first).await?.condition_code, "isGrownUp(18);");
    assert_eq!(
        get_rule(&fx.pool, second).await?.action_code,
        "isGrownUp(fields.age);"
    );
    assert_cache_current(&fx, first).await?;
    assert_cache_current(&fx, second).await?;
    assert_eq!(get_rule(&fx.pool, untouched).await?.condition_code, "");
    Ok(())
}

#[tokio::test]
async fn test_cache_follows_declared_param_writes() -> Result<()> {
    let fx = setup().await;
    let approve = func(&fx.pool, "approve", 0).await;
    let rule_id = new_rule(&fx.pool, "Tiered").await;

    fx.engine
        .add_rule_line(&line(rule_id, approve, false, 0, vec![ParamInput::literal("gold")]))
        .await?;
    assert_eq!(get_rule(&fx.pool, rule_id).await?.action_code, "approve(gold);");

    // Declaring the slot as STRING quotes the untyped literal
    let param_id = fx
        .engine
        .add_function_param(approve, &FunctionParamInput::new(0, "tier", "STRING"))
        .await?;
    assert_eq!(get_rule(&fx.pool, rule_id).await?.action_code, "approve('gold');");
    assert_eq!(get_function(&fx.pool, approve).await?.param_count, 1);
    assert_cache_current(&fx, rule_id).await?;

    fx.engine
        .update_function_param(param_id, &FunctionParamInput::new(0, "tier", "INTEGER"))
        .await?;
    assert_eq!(get_rule(&fx.pool, rule_id).await?.action_code, "approve(gold);");

    fx.engine
        .update_function_param(param_id, &FunctionParamInput::new(0, "tier", "STRING"))
        .await?;
    fx.engine.delete_function_param(param_id).await?;
    assert_eq!(get_rule(&fx.pool, rule_id).await?.action_code, "approve(gold);");
    assert_cache_current(&fx, rule_id).await?;
    Ok(())
}

#[tokio::test]
async fn test_literal_type_source_precedence() -> Result<()> {
    let fx = setup().await;
    let grant = create_function(
        &fx.pool,
        &NewFunction {
            name: "grant".to_string(),
            parameters: Some(vec![
                FunctionParamInput::new(0, "who", "STRING"),
                FunctionParamInput::new(1, "tier", "STRING"),
                FunctionParamInput::new(2, "level", "VARCHAR"),
            ]),
            ..Default::default()
        },
    )
    .await?;
    let rule_id = new_rule(&fx.pool, "Sources").await;

    fx.engine
        .add_rule_line(&line(
            rule_id,
            grant,
            false,
            0,
            vec![
                // Field beats both literal types
                ParamInput {
                    field_id: Some(fx.age_field),
                    literal_value: Some("ignored".to_string()),
                    value_type: Some("STRING".to_string()),
                },
                // Own type beats the declared STRING
                ParamInput::typed_literal("7", "INTEGER"),
                // Untyped: the declared VARCHAR applies
                ParamInput::literal("high"),
            ],
        ))
        .await?;
    fx.engine
        .add_rule_line(&line(
            rule_id,
            grant,
            false,
            1,
            vec![
                ParamInput::literal("bob"),
                ParamInput::literal("gold"),
                ParamInput::typed_literal("low", "STRING"),
            ],
        ))
        .await?;

    let code = fx.engine.generate_code(rule_id).await?;
    assert_eq!(
        code.action_code,
        "grant(fields.age, 7, high);\ngrant('bob', 'gold', 'low');"
    );

    let textual = RuleEngine::new(fx.pool.clone()).with_options(CodegenOptions {
        quoting: QuotingStrategy::TextualTypes,
        ..Default::default()
    });
    assert_eq!(
        textual.generate_code(rule_id).await?.action_code,
        "grant(fields.age, 7, 'high');\ngrant('bob', 'gold', 'low');"
    );
    Ok(())
}
