/// Integration suite for the Rust source backend: structural assertions on
/// the emitted module text.
use jschema_codegen::{compile_to_code, Config};
use serde_json::json;

#[test]
fn test_emitted_module_is_self_contained() {
    let (entry, code) = compile_to_code(
        &json!({
            "properties": {
                "name": {"type": "string", "pattern": "^[a-z]+$"},
                "age": {"type": "integer", "default": 0}
            },
            "required": ["name"]
        }),
        &Config::default(),
    )
    .unwrap();

    assert_eq!(entry, "validate");
    // own error type, no reference back to the compiler crate
    assert!(code.contains("pub struct ValidationError"));
    assert!(!code.contains("jschema_codegen::"));
    // regex literal carried along as a static
    assert!(code.contains("static RE_0: Lazy<Regex>"));
    assert!(code.contains("Regex::new(\"^[a-z]+$\")"));
    // default literal embedded
    assert!(code.contains("json_literal(\"0\")"));
    // the header names the crates the module needs
    assert!(code.starts_with("// Generated by jschema-codegen."));
    assert!(code.contains("// Requires: serde_json, regex, once_cell"));
}

#[test]
fn test_emitted_procedures_match_compiled_scopes() {
    let (entry, code) = compile_to_code(
        &json!({
            "definitions": {
                "item": {"type": "object", "required": ["id"]}
            },
            "items": {"$ref": "#/definitions/item"}
        }),
        &Config::default(),
    )
    .unwrap();
    assert_eq!(entry, "validate");
    assert!(code.contains("pub fn validate(data: &mut Value)"));
    assert!(code.contains("pub fn validate___definitions_item(data: &mut Value)"));
    assert!(code.contains("validate___definitions_item(data_item)?;"));
}

#[test]
fn test_emitted_format_checkers_are_copied() {
    let (_, code) = compile_to_code(
        &json!({
            "properties": {
                "ptr": {"format": "json-pointer"},
                "when": {"format": "date-time"}
            }
        }),
        &Config::default(),
    )
    .unwrap();
    // predicate format: function copy
    assert!(code.contains("fn format_is_json_pointer(value: &str) -> bool"));
    // regex format: pooled static, no function
    assert!(code.contains("static RE_0"));
    assert!(!code.contains("fn format_is_date_time"));
}

#[test]
fn test_emitted_version_constant_is_opt_in() {
    let config = Config {
        include_version: true,
        ..Config::default()
    };
    let (_, with_version) = compile_to_code(&json!({"type": "string"}), &config).unwrap();
    assert!(with_version.contains("pub const VERSION: &str ="));

    let (_, without) = compile_to_code(&json!({"type": "string"}), &Config::default()).unwrap();
    assert!(!without.contains("pub const VERSION"));
}

#[test]
fn test_emitted_code_is_deterministic() {
    let schema = json!({
        "properties": {
            "a": {"type": "string"},
            "b": {"enum": [1, 2]},
            "c": {"$ref": "#/properties/a"}
        }
    });
    let (_, first) = compile_to_code(&schema, &Config::default()).unwrap();
    let (_, second) = compile_to_code(&schema, &Config::default()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_emitted_draft4_has_no_float_integer_clause() {
    let draft4 = Config {
        schema_version: "draft4".into(),
        ..Config::default()
    };
    let (_, code) = compile_to_code(&json!({"type": "integer"}), &draft4).unwrap();
    assert!(code.contains("data.as_i64().is_some() || data.as_u64().is_some()"));
    assert!(!code.contains("fract()"));

    let (_, code) = compile_to_code(&json!({"type": "integer"}), &Config::default()).unwrap();
    assert!(code.contains("fract() == 0.0"));
}

#[test]
fn test_emitted_combinators_catch_failures_locally() {
    let (_, code) = compile_to_code(
        &json!({"oneOf": [{"type": "string"}, {"minLength": 3}]}),
        &Config::default(),
    )
    .unwrap();
    // scratch copies and counting, not early returns across branches
    assert!(code.contains("let mut data_one_of_count = 0u32;"));
    assert!(code.contains("data.clone()"));
    assert!(code.contains("if data_one_of_count != 1"));
    assert!(code.contains("must be valid exactly by one of oneOf definition"));
}
