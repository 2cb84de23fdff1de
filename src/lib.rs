//! JSON Schema compiler for drafts 04, 06 and 07.
//!
//! Instead of interpreting a schema at validation time, [`compile`] turns it
//! into an executable validator: one procedure per referenced schema scope,
//! keywords running in a fixed per-draft order, with `default` injection and
//! content decoding applied to the validated value in place.
//! [`compile_to_code`] lowers the same procedures to standalone Rust source
//! that can be persisted and built without this crate's compiler.
//!
//! ```
//! use serde_json::json;
//!
//! let config = jschema_codegen::Config::default();
//! let validator = jschema_codegen::compile(
//!     &json!({
//!         "type": "object",
//!         "properties": {
//!             "name": {"type": "string"},
//!             "port": {"type": "integer", "default": 8080}
//!         }
//!     }),
//!     &config,
//! )
//! .unwrap();
//!
//! let data = validator.validate(json!({"name": "example"})).unwrap();
//! assert_eq!(data, json!({"name": "example", "port": 8080}));
//! ```
//!
//! Two differences from the letter of the JSON Schema specification are
//! intentional: `pattern` accepts anything the `regex` crate accepts rather
//! than a portable subset, and `default` values are injected into the
//! returned data.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

pub mod compiler;
pub mod emit_rs;
pub mod error;
pub mod formats;
pub mod interp;
pub mod ir;
pub mod meta_schema;
pub mod resolver;

pub use crate::error::{CompileError, ValidationError};
pub use crate::formats::FormatRegistry;
pub use crate::interp::Validator;
pub use crate::meta_schema::{Draft, MetaSchema};

/// Fetch function for a custom URI scheme: receives the absolute URI and
/// returns the parsed schema document.
pub type UriHandler = Arc<dyn Fn(&str) -> Result<Value, CompileError> + Send + Sync>;

/// Compilation options.
#[derive(Clone)]
pub struct Config {
    /// Draft used when the schema carries no `$schema` of its own: a short
    /// name ("draft4", "draft6", "draft7") or a meta-schema URI.
    pub schema_version: String,
    /// Scheme -> fetch function overrides for remote `$ref` resolution.
    pub uri_handlers: HashMap<String, UriHandler>,
    /// Whether remotely fetched documents are cached after first resolution.
    pub cache_refs: bool,
    /// Whether the input schema is validated against its own meta-schema
    /// before compiling.
    pub validate_schema: bool,
    /// Whether the crate version is embedded in generated source.
    pub include_version: bool,
    /// Format name -> checker table used by the `format` keyword.
    pub formats: FormatRegistry,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            schema_version: "draft7".to_string(),
            uri_handlers: HashMap::new(),
            cache_refs: true,
            validate_schema: false,
            include_version: false,
            formats: FormatRegistry::default(),
        }
    }
}

/// Compile `schema` into an invocable validator.
///
/// Fresh resolver and compiler state per call: concurrent compilations never
/// share anything mutable.
pub fn compile(schema: &Value, config: &Config) -> Result<Validator, CompileError> {
    let program = build(schema, config)?;
    Ok(Validator::new(program))
}

/// Compile `schema` to standalone Rust source implementing the same
/// procedures. Returns the entry-point procedure name and the source text.
pub fn compile_to_code(schema: &Value, config: &Config) -> Result<(String, String), CompileError> {
    let program = build(schema, config)?;
    let entry = program.entry.clone();
    Ok((entry, emit_rs::emit(&program)))
}

fn build(schema: &Value, config: &Config) -> Result<ir::Program, CompileError> {
    let resolver = resolver::RefResolver::from_schema(schema, config)?;
    if config.validate_schema {
        let normalized = resolver.document().clone();
        resolver.meta_schema().validate(&normalized)?;
    }
    compiler::Compiler::new(resolver, config).compile()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_end_to_end_properties_example() {
        let validator = compile(
            &json!({
                "properties": {
                    "a": {"type": "string"},
                    "b": {"type": "integer"}
                }
            }),
            &Config::default(),
        )
        .unwrap();
        assert_eq!(
            validator.validate(json!({"a": "a", "b": 1})).unwrap(),
            json!({"a": "a", "b": 1})
        );
        let err = validator.validate(json!({"a": 1, "b": 1})).unwrap_err();
        assert_eq!(err.message, "data.a must be string");
    }

    #[test]
    fn test_end_to_end_pattern_example() {
        let validator = compile(
            &json!({
                "properties": {
                    "a": {"type": "string", "pattern": "[ab]"}
                }
            }),
            &Config::default(),
        )
        .unwrap();
        assert!(validator.validate(json!({"a": "cat"})).is_ok());
        let err = validator.validate(json!({"a": "c"})).unwrap_err();
        assert_eq!(err.message, "data.a must match pattern [ab]");
    }

    #[test]
    fn test_validation_is_deterministic() {
        let validator = compile(
            &json!({
                "properties": {
                    "a": {"default": 1},
                    "b": {"type": "string"}
                }
            }),
            &Config::default(),
        )
        .unwrap();
        let first = validator.validate(json!({"b": "x"})).unwrap();
        let second = validator.validate(json!({"b": "x"})).unwrap();
        assert_eq!(first, second);
        for _ in 0..3 {
            assert!(validator.validate(json!({"b": 1})).is_err());
        }
    }

    #[test]
    fn test_default_injection_is_idempotent() {
        let validator = compile(
            &json!({
                "properties": {
                    "a": {"default": {"nested": [1]}}
                }
            }),
            &Config::default(),
        )
        .unwrap();
        let once = validator.validate(json!({})).unwrap();
        let twice = validator.validate(once.clone()).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_cyclic_self_reference_compiles_and_validates() {
        let validator = compile(
            &json!({"properties": {"child": {"$ref": "#"}}}),
            &Config::default(),
        )
        .unwrap();
        let mut nested = json!({});
        for _ in 0..50 {
            nested = json!({"child": nested});
        }
        assert!(validator.validate(nested).is_ok());
    }

    #[test]
    fn test_draft_sensitivity_of_boolean_exclusive_minimum() {
        let schema = json!({"type": "integer", "minimum": 1, "exclusiveMinimum": true});

        // draft-04: boolean flag, compiles and validates
        let draft4 = Config {
            schema_version: "draft4".into(),
            validate_schema: true,
            ..Config::default()
        };
        let validator = compile(&schema, &draft4).unwrap();
        assert!(validator.validate(json!(2)).is_ok());
        assert!(validator.validate(json!(1)).is_err());

        // draft-07: exclusiveMinimum must be a number; the schema fails its
        // own meta-schema
        let draft7 = Config {
            validate_schema: true,
            ..Config::default()
        };
        let err = compile(&schema, &draft7).unwrap_err();
        assert!(matches!(err, CompileError::SchemaValidation(_)), "{err}");
    }

    #[test]
    fn test_schema_version_from_document_overrides_config() {
        // $schema names draft-04 while the config default is draft-07; the
        // boolean exclusiveMinimum only compiles under draft-04 rules
        let schema = json!({
            "$schema": "http://json-schema.org/draft-04/schema#",
            "minimum": 1,
            "exclusiveMinimum": true
        });
        let validator = compile(&schema, &Config::default()).unwrap();
        assert!(validator.validate(json!(1)).is_err());
        assert!(validator.validate(json!(2)).is_ok());
    }

    #[test]
    fn test_meta_schema_accepts_valid_schema() {
        let config = Config {
            validate_schema: true,
            ..Config::default()
        };
        let validator = compile(
            &json!({
                "type": "object",
                "properties": {"a": {"type": "string", "minLength": 1}},
                "required": ["a"]
            }),
            &config,
        )
        .unwrap();
        assert!(validator.validate(json!({"a": "x"})).is_ok());
    }

    #[test]
    fn test_entry_point_names_follow_scope() {
        let validator = compile(&json!({}), &Config::default()).unwrap();
        assert_eq!(validator.entry_point(), "validate");

        let validator = compile(
            &json!({"$id": "http://example.com/api/item.json", "type": "object"}),
            &Config::default(),
        )
        .unwrap();
        assert_eq!(
            validator.entry_point(),
            "validate_http___example_com_api_item_json"
        );
    }

    #[test]
    fn test_compile_to_code_returns_entry_and_source() {
        let (entry, code) = compile_to_code(
            &json!({"properties": {"a": {"type": "string"}}}),
            &Config::default(),
        )
        .unwrap();
        assert_eq!(entry, "validate");
        assert!(code.contains(&format!(
            "pub fn {entry}(data: &mut Value) -> Result<(), ValidationError>"
        )));
    }

    #[test]
    fn test_unknown_schema_version_is_rejected() {
        let config = Config {
            schema_version: "draft9".into(),
            ..Config::default()
        };
        let err = compile(&json!({}), &config).unwrap_err();
        assert!(matches!(err, CompileError::UnknownSchemaVersion(_)));
    }
}
