/// Schema compiler: walks schema nodes and emits typed validation steps,
/// one procedure per distinct referenced scope.
///
/// The work queue starts with the root scope; every `$ref` encountered
/// during generation registers its target scope as needed. A scope moves
/// from needed to done exactly once, so recursive and self-referential
/// schemas terminate with a plain procedure call instead of endless
/// expansion.
use std::collections::{BTreeMap, HashMap, HashSet};

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::CompileError;
use crate::ir::{
    AdditionalItems, Block, CompiledPattern, ContainsRule, DependencyRule, JsonType, Program,
    PropertyNamesRule, PropertyRule, Step, TupleItem,
};
use crate::meta_schema::{Draft, Keyword};
use crate::resolver::RefResolver;
use crate::Config;

pub struct Compiler<'a> {
    resolver: RefResolver,
    config: &'a Config,
    draft: Draft,
    needed: BTreeMap<String, String>,
    done: HashSet<String>,
    procedures: BTreeMap<String, Block>,
    regexes: Vec<CompiledPattern>,
    regex_index: HashMap<String, usize>,
    entry: String,
}

impl<'a> Compiler<'a> {
    pub fn new(resolver: RefResolver, config: &'a Config) -> Self {
        let draft = resolver.meta_schema().draft;
        let (uri, name) = resolver.scope_name("");
        let mut needed = BTreeMap::new();
        needed.insert(uri, name.clone());
        Compiler {
            resolver,
            config,
            draft,
            needed,
            done: HashSet::new(),
            procedures: BTreeMap::new(),
            regexes: Vec::new(),
            regex_index: HashMap::new(),
            entry: name,
        }
    }

    /// Drain the work queue and return the finished program.
    pub fn compile(mut self) -> Result<Program, CompileError> {
        // Generating one procedure can register more; loop until the queue
        // is empty rather than iterating a snapshot.
        while let Some((uri, name)) = self.needed.pop_first() {
            self.generate_procedure(&uri, name)?;
        }
        Ok(Program {
            procedures: self.procedures,
            entry: self.entry,
            regexes: self.regexes,
            formats: self.config.formats.clone(),
            version: self
                .config
                .include_version
                .then(|| env!("CARGO_PKG_VERSION").to_string()),
        })
    }

    fn generate_procedure(&mut self, uri: &str, name: String) -> Result<(), CompileError> {
        self.done.insert(uri.to_string());
        debug!(scope = %uri, procedure = %name, "generating validation procedure");
        let node = self.resolver.enter_ref(uri)?;
        let result = self.compile_node(&node, "data");
        self.resolver.exit_ref();
        self.procedures.insert(name, result?);
        Ok(())
    }

    /// Emit the step block for one schema node. `path` is the compile-time
    /// path template, used only to derive names for sub-procedures.
    fn compile_node(&mut self, node: &Value, path: &str) -> Result<Block, CompileError> {
        match node {
            Value::Bool(true) => Ok(Vec::new()),
            Value::Bool(false) => Ok(vec![Step::Fail]),
            Value::Object(map) => {
                if let Some(reference) = map.get("$ref").and_then(Value::as_str) {
                    // $ref overrides any sibling keywords in drafts 04..07
                    return Ok(vec![self.step_ref(reference)]);
                }
                let mut block = Vec::new();
                for keyword in self.draft.keywords() {
                    if map.contains_key(keyword.as_str()) {
                        self.generate_keyword(*keyword, map, path, &mut block)?;
                    }
                }
                Ok(block)
            }
            _ => Err(CompileError::NotASchema),
        }
    }

    fn step_ref(&mut self, reference: &str) -> Step {
        self.resolver.push_scope(reference);
        let (uri, name) = self.resolver.scope_name("");
        if !self.done.contains(&uri) && !self.needed.contains_key(&uri) {
            self.needed.insert(uri, name.clone());
        }
        self.resolver.pop_scope();
        Step::Call(name)
    }

    /// Register a sub-schema (propertyNames/contains) as its own procedure,
    /// named after the current path plus `postfix`, and pre-cache its
    /// definition so the work queue can dereference it.
    fn subschema_procedure(&mut self, definition: &Value, path: &str, postfix: &str) -> String {
        self.resolver.push_scope(path);
        let (scope_uri, name) = self.resolver.scope_name(postfix);
        let uri = format!("{scope_uri}{postfix}");
        if !self.done.contains(&uri) && !self.needed.contains_key(&uri) {
            self.needed.insert(uri.clone(), name.clone());
            self.resolver.cache_definition(uri, definition.clone());
        }
        self.resolver.pop_scope();
        name
    }

    fn pool_regex(&mut self, source: &str) -> Result<usize, CompileError> {
        if let Some(&idx) = self.regex_index.get(source) {
            return Ok(idx);
        }
        let regex = regex::Regex::new(source).map_err(|err| CompileError::InvalidRegex {
            pattern: source.to_string(),
            reason: err.to_string(),
        })?;
        let idx = self.regexes.len();
        self.regexes.push(CompiledPattern {
            source: source.to_string(),
            regex,
        });
        self.regex_index.insert(source.to_string(), idx);
        Ok(idx)
    }

    fn generate_keyword(
        &mut self,
        keyword: Keyword,
        map: &Map<String, Value>,
        path: &str,
        out: &mut Block,
    ) -> Result<(), CompileError> {
        match keyword {
            Keyword::Type => self.generate_type(map, out),
            Keyword::Enum => self.generate_enum(map, out),
            Keyword::AllOf => self.generate_combinator(map, "allOf", path, out),
            Keyword::AnyOf => self.generate_combinator(map, "anyOf", path, out),
            Keyword::OneOf => self.generate_combinator(map, "oneOf", path, out),
            Keyword::Not => self.generate_not(map, path, out),
            Keyword::MinLength => {
                out.push(Step::MinLength(expect_u64(map, "minLength")?));
                Ok(())
            }
            Keyword::MaxLength => {
                out.push(Step::MaxLength(expect_u64(map, "maxLength")?));
                Ok(())
            }
            Keyword::Pattern => self.generate_pattern(map, out),
            Keyword::Format => self.generate_format(map, out),
            Keyword::Minimum => self.generate_minimum(map, out),
            Keyword::Maximum => self.generate_maximum(map, out),
            Keyword::MultipleOf => {
                out.push(Step::MultipleOf {
                    divisor: expect_number(map, "multipleOf")?,
                });
                Ok(())
            }
            Keyword::MinItems => {
                out.push(Step::MinItems(expect_u64(map, "minItems")?));
                Ok(())
            }
            Keyword::MaxItems => {
                out.push(Step::MaxItems(expect_u64(map, "maxItems")?));
                Ok(())
            }
            Keyword::UniqueItems => {
                if map.get("uniqueItems").and_then(Value::as_bool) == Some(true) {
                    out.push(Step::UniqueItems);
                }
                Ok(())
            }
            Keyword::Items => self.generate_items(map, path, out),
            Keyword::MinProperties => {
                out.push(Step::MinProperties(expect_u64(map, "minProperties")?));
                Ok(())
            }
            Keyword::MaxProperties => {
                out.push(Step::MaxProperties(expect_u64(map, "maxProperties")?));
                Ok(())
            }
            Keyword::Required => self.generate_required(map, out),
            Keyword::Properties => self.generate_properties(map, path, out),
            Keyword::PatternProperties => self.generate_pattern_properties(map, path, out),
            Keyword::AdditionalProperties => self.generate_additional_properties(map, path, out),
            Keyword::Dependencies => self.generate_dependencies(map, path, out),
            Keyword::ExclusiveMinimum => {
                out.push(Step::ExclusiveMinimum {
                    limit: expect_number(map, "exclusiveMinimum")?,
                });
                Ok(())
            }
            Keyword::ExclusiveMaximum => {
                out.push(Step::ExclusiveMaximum {
                    limit: expect_number(map, "exclusiveMaximum")?,
                });
                Ok(())
            }
            Keyword::PropertyNames => self.generate_property_names(map, path, out),
            Keyword::Contains => self.generate_contains(map, path, out),
            Keyword::Const => {
                out.push(Step::Const(map["const"].clone()));
                Ok(())
            }
            Keyword::If => self.generate_if_then_else(map, path, out),
            Keyword::ContentMediaType => self.generate_content_media_type(map, out),
            Keyword::ContentEncoding => self.generate_content_encoding(map, out),
        }
    }

    fn generate_type(
        &mut self,
        map: &Map<String, Value>,
        out: &mut Block,
    ) -> Result<(), CompileError> {
        let listed = match &map["type"] {
            Value::String(name) => vec![name.as_str()],
            Value::Array(names) => names.iter().filter_map(Value::as_str).collect(),
            _ => return Err(CompileError::Other("type must be a string or array".into())),
        };
        let mut types = Vec::with_capacity(listed.len());
        for name in listed {
            types.push(JsonType::parse(name).ok_or_else(|| {
                CompileError::UnknownType(name.to_string())
            })?);
        }
        out.push(Step::Type {
            types,
            float_integer: self.draft.float_with_zero_fraction_is_integer(),
        });
        Ok(())
    }

    fn generate_enum(
        &mut self,
        map: &Map<String, Value>,
        out: &mut Block,
    ) -> Result<(), CompileError> {
        let values = map["enum"]
            .as_array()
            .ok_or_else(|| CompileError::Other("enum must be an array".into()))?;
        out.push(Step::Enum(values.clone()));
        Ok(())
    }

    fn generate_combinator(
        &mut self,
        map: &Map<String, Value>,
        keyword: &str,
        path: &str,
        out: &mut Block,
    ) -> Result<(), CompileError> {
        let items = map[keyword]
            .as_array()
            .ok_or_else(|| CompileError::Other(format!("{keyword} must be an array")))?;
        let mut blocks = Vec::with_capacity(items.len());
        for item in items {
            blocks.push(self.compile_node(item, path)?);
        }
        out.push(match keyword {
            "allOf" => Step::AllOf(blocks),
            "anyOf" => Step::AnyOf(blocks),
            _ => Step::OneOf(blocks),
        });
        Ok(())
    }

    fn generate_not(
        &mut self,
        map: &Map<String, Value>,
        path: &str,
        out: &mut Block,
    ) -> Result<(), CompileError> {
        let definition = &map["not"];
        if definition == &Value::Bool(false) {
            // not:false always passes
            return Ok(());
        }
        let block = self.compile_node(definition, path)?;
        out.push(Step::Not(block));
        Ok(())
    }

    fn generate_pattern(
        &mut self,
        map: &Map<String, Value>,
        out: &mut Block,
    ) -> Result<(), CompileError> {
        let pattern = map["pattern"]
            .as_str()
            .ok_or_else(|| CompileError::Other("pattern must be a string".into()))?;
        let pool = self.pool_regex(pattern)?;
        out.push(Step::Pattern {
            pool,
            pattern: pattern.to_string(),
        });
        Ok(())
    }

    fn generate_format(
        &mut self,
        map: &Map<String, Value>,
        out: &mut Block,
    ) -> Result<(), CompileError> {
        let name = match map["format"].as_str() {
            Some(name) => name,
            // non-string format values are ignored like unknown names
            None => return Ok(()),
        };
        if self.draft.format_regex_names().contains(&name) {
            if let Some(pattern) = self.config.formats.regex_pattern(name) {
                let pattern = pattern.to_string();
                let pool = self.pool_regex(&pattern)?;
                out.push(Step::FormatRegex {
                    pool,
                    name: name.to_string(),
                });
            }
        }
        if self.draft.format_function_names().contains(&name) {
            if self.config.formats.predicate(name).is_some() {
                out.push(Step::FormatCheck {
                    name: name.to_string(),
                });
            }
        }
        // a name the draft does not recognize is silently ignored
        Ok(())
    }

    fn generate_minimum(
        &mut self,
        map: &Map<String, Value>,
        out: &mut Block,
    ) -> Result<(), CompileError> {
        // draft-04 spells exclusivity as a boolean flag on minimum
        let exclusive = self.draft == Draft::Draft4
            && map.get("exclusiveMinimum").and_then(Value::as_bool) == Some(true);
        out.push(Step::Minimum {
            limit: expect_number(map, "minimum")?,
            exclusive,
        });
        Ok(())
    }

    fn generate_maximum(
        &mut self,
        map: &Map<String, Value>,
        out: &mut Block,
    ) -> Result<(), CompileError> {
        let exclusive = self.draft == Draft::Draft4
            && map.get("exclusiveMaximum").and_then(Value::as_bool) == Some(true);
        out.push(Step::Maximum {
            limit: expect_number(map, "maximum")?,
            exclusive,
        });
        Ok(())
    }

    fn generate_items(
        &mut self,
        map: &Map<String, Value>,
        path: &str,
        out: &mut Block,
    ) -> Result<(), CompileError> {
        match &map["items"] {
            Value::Bool(true) => Ok(()),
            Value::Bool(false) => {
                out.push(Step::ItemsFalse);
                Ok(())
            }
            Value::Array(definitions) => {
                let mut items = Vec::with_capacity(definitions.len());
                for (idx, definition) in definitions.iter().enumerate() {
                    let block = self.compile_node(definition, &format!("{path}[{idx}]"))?;
                    let default = definition
                        .as_object()
                        .and_then(|m| m.get("default"))
                        .cloned();
                    items.push(TupleItem { block, default });
                }
                let additional = match map.get("additionalItems") {
                    Some(Value::Bool(false)) => Some(AdditionalItems::Deny),
                    Some(Value::Bool(true)) | None => None,
                    Some(definition) => {
                        let block = self.compile_node(definition, &format!("{path}[]"))?;
                        if block.is_empty() {
                            None
                        } else {
                            Some(AdditionalItems::Schema(block))
                        }
                    }
                };
                out.push(Step::ItemsTuple { items, additional });
                Ok(())
            }
            definition @ Value::Object(_) => {
                let block = self.compile_node(definition, &format!("{path}[]"))?;
                if !block.is_empty() {
                    out.push(Step::ItemsAll(block));
                }
                Ok(())
            }
            _ => Err(CompileError::Other(
                "items must be a schema or an array of schemas".into(),
            )),
        }
    }

    fn generate_required(
        &mut self,
        map: &Map<String, Value>,
        out: &mut Block,
    ) -> Result<(), CompileError> {
        let keys: Vec<String> = map["required"]
            .as_array()
            .ok_or_else(|| CompileError::Other("required must be an array".into()))?
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect();
        if !keys.is_empty() {
            out.push(Step::Required(keys));
        }
        Ok(())
    }

    fn generate_properties(
        &mut self,
        map: &Map<String, Value>,
        path: &str,
        out: &mut Block,
    ) -> Result<(), CompileError> {
        let declared = map["properties"]
            .as_object()
            .ok_or_else(|| CompileError::Other("properties must be an object".into()))?;
        let mut rules = Vec::with_capacity(declared.len());
        for (key, definition) in declared {
            let block = self.compile_node(definition, &format!("{path}.{key}"))?;
            let default = definition
                .as_object()
                .and_then(|m| m.get("default"))
                .cloned();
            rules.push(PropertyRule {
                key: key.clone(),
                block,
                default,
            });
        }
        out.push(Step::Properties(rules));
        Ok(())
    }

    fn generate_pattern_properties(
        &mut self,
        map: &Map<String, Value>,
        path: &str,
        out: &mut Block,
    ) -> Result<(), CompileError> {
        let declared = map["patternProperties"]
            .as_object()
            .ok_or_else(|| CompileError::Other("patternProperties must be an object".into()))?;
        let mut rules = Vec::with_capacity(declared.len());
        for (pattern, definition) in declared {
            let pool = self.pool_regex(pattern)?;
            let block = self.compile_node(definition, &format!("{path}.{{key}}"))?;
            rules.push((pool, pattern.clone(), block));
        }
        out.push(Step::PatternProperties(rules));
        Ok(())
    }

    fn generate_additional_properties(
        &mut self,
        map: &Map<String, Value>,
        path: &str,
        out: &mut Block,
    ) -> Result<(), CompileError> {
        match &map["additionalProperties"] {
            Value::Bool(false) => {
                out.push(Step::AdditionalProperties(None));
                Ok(())
            }
            Value::Bool(true) => Ok(()),
            definition => {
                let block = self.compile_node(definition, &format!("{path}.{{key}}"))?;
                if !block.is_empty() {
                    out.push(Step::AdditionalProperties(Some(block)));
                }
                Ok(())
            }
        }
    }

    fn generate_dependencies(
        &mut self,
        map: &Map<String, Value>,
        path: &str,
        out: &mut Block,
    ) -> Result<(), CompileError> {
        let declared = map["dependencies"]
            .as_object()
            .ok_or_else(|| CompileError::Other("dependencies must be an object".into()))?;
        let mut rules = Vec::new();
        for (key, dependency) in declared {
            let rule = match dependency {
                Value::Bool(true) => continue,
                Value::Bool(false) => DependencyRule::Fail,
                Value::Array(keys) => {
                    if keys.is_empty() {
                        continue;
                    }
                    DependencyRule::Keys(
                        keys.iter()
                            .filter_map(Value::as_str)
                            .map(str::to_string)
                            .collect(),
                    )
                }
                definition => DependencyRule::Schema(self.compile_node(definition, path)?),
            };
            rules.push((key.clone(), rule));
        }
        if !rules.is_empty() {
            out.push(Step::Dependencies(rules));
        }
        Ok(())
    }

    fn generate_property_names(
        &mut self,
        map: &Map<String, Value>,
        path: &str,
        out: &mut Block,
    ) -> Result<(), CompileError> {
        match &map["propertyNames"] {
            Value::Bool(false) => {
                out.push(Step::PropertyNames(PropertyNamesRule::DenyNonEmpty));
                Ok(())
            }
            Value::Bool(true) => Ok(()),
            definition @ Value::Object(obj) => {
                if obj.is_empty() {
                    return Ok(());
                }
                let name = self.subschema_procedure(definition, path, "_property_names");
                out.push(Step::PropertyNames(PropertyNamesRule::Procedure(name)));
                Ok(())
            }
            _ => Err(CompileError::Other(
                "propertyNames must be a schema".into(),
            )),
        }
    }

    fn generate_contains(
        &mut self,
        map: &Map<String, Value>,
        path: &str,
        out: &mut Block,
    ) -> Result<(), CompileError> {
        match &map["contains"] {
            Value::Bool(false) => {
                out.push(Step::Contains(ContainsRule::AlwaysFail));
                Ok(())
            }
            Value::Bool(true) => {
                out.push(Step::Contains(ContainsRule::NonEmpty));
                Ok(())
            }
            definition @ Value::Object(_) => {
                let name = self.subschema_procedure(definition, path, "_contains");
                out.push(Step::Contains(ContainsRule::Procedure(name)));
                Ok(())
            }
            _ => Err(CompileError::Other("contains must be a schema".into())),
        }
    }

    fn generate_if_then_else(
        &mut self,
        map: &Map<String, Value>,
        path: &str,
        out: &mut Block,
    ) -> Result<(), CompileError> {
        let then_block = match map.get("then") {
            Some(definition) => Some(self.compile_node(definition, path)?),
            None => None,
        };
        let else_block = match map.get("else") {
            Some(definition) => Some(self.compile_node(definition, path)?),
            None => None,
        };
        if then_block.is_none() && else_block.is_none() {
            // no branch to select; the condition alone has no effect
            return Ok(());
        }
        let condition = self.compile_node(&map["if"], path)?;
        out.push(Step::IfThenElse {
            condition,
            then_block,
            else_block,
        });
        Ok(())
    }

    fn generate_content_media_type(
        &mut self,
        map: &Map<String, Value>,
        out: &mut Block,
    ) -> Result<(), CompileError> {
        if map.contains_key("contentEncoding") {
            // handled by generate_content_encoding so decoding runs first
            return Ok(());
        }
        if map["contentMediaType"] == Value::String("application/json".into()) {
            out.push(Step::ContentMediaTypeJson);
        }
        Ok(())
    }

    fn generate_content_encoding(
        &mut self,
        map: &Map<String, Value>,
        out: &mut Block,
    ) -> Result<(), CompileError> {
        if map["contentEncoding"] == Value::String("base64".into()) {
            out.push(Step::ContentEncodingBase64);
        }
        if map.get("contentMediaType") == Some(&Value::String("application/json".into())) {
            out.push(Step::ContentMediaTypeJson);
        }
        Ok(())
    }
}

fn expect_u64(map: &Map<String, Value>, keyword: &str) -> Result<u64, CompileError> {
    map[keyword]
        .as_u64()
        .ok_or_else(|| CompileError::Other(format!("{keyword} must be a non-negative integer")))
}

fn expect_number(
    map: &Map<String, Value>,
    keyword: &str,
) -> Result<serde_json::Number, CompileError> {
    match &map[keyword] {
        Value::Number(n) => Ok(n.clone()),
        _ => Err(CompileError::Other(format!("{keyword} must be a number"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn compile_program(schema: Value) -> Program {
        compile_program_with(schema, &Config::default())
    }

    fn compile_program_with(schema: Value, config: &Config) -> Program {
        let resolver = RefResolver::from_schema(&schema, config).unwrap();
        Compiler::new(resolver, config).compile().unwrap()
    }

    fn entry_block(program: &Program) -> &Block {
        &program.procedures[&program.entry]
    }

    #[test]
    fn test_empty_schema_compiles_to_nothing() {
        let program = compile_program(json!({}));
        assert_eq!(program.entry, "validate");
        assert!(entry_block(&program).is_empty());
    }

    #[test]
    fn test_boolean_schemas() {
        let program = compile_program(json!(true));
        assert!(entry_block(&program).is_empty());
        let program = compile_program(json!(false));
        assert_eq!(entry_block(&program), &vec![Step::Fail]);
    }

    #[test]
    fn test_type_step_carries_draft_integer_semantics() {
        let program = compile_program(json!({"type": "integer"}));
        assert_eq!(
            entry_block(&program),
            &vec![Step::Type {
                types: vec![JsonType::Integer],
                float_integer: true,
            }]
        );
        let config = Config {
            schema_version: "draft4".into(),
            ..Config::default()
        };
        let program = compile_program_with(json!({"type": "integer"}), &config);
        assert_eq!(
            entry_block(&program),
            &vec![Step::Type {
                types: vec![JsonType::Integer],
                float_integer: false,
            }]
        );
    }

    #[test]
    fn test_unknown_type_is_a_compile_error() {
        let schema = json!({"type": "decimal"});
        let config = Config::default();
        let resolver = RefResolver::from_schema(&schema, &config).unwrap();
        let err = Compiler::new(resolver, &config).compile().unwrap_err();
        assert!(matches!(err, CompileError::UnknownType(name) if name == "decimal"));
    }

    #[test]
    fn test_ref_ignores_sibling_keywords() {
        let program = compile_program(json!({
            "definitions": {"a": {"type": "string"}},
            "properties": {
                "x": {"$ref": "#/definitions/a", "minLength": 100}
            }
        }));
        let block = entry_block(&program);
        let Step::Properties(rules) = &block[0] else {
            panic!("expected Properties step");
        };
        assert_eq!(rules[0].block, vec![Step::Call("validate___definitions_a".into())]);
        // the referenced scope got its own procedure
        assert_eq!(
            program.procedures["validate___definitions_a"],
            vec![Step::Type {
                types: vec![JsonType::String],
                float_integer: true,
            }]
        );
    }

    #[test]
    fn test_cyclic_self_reference_terminates() {
        let program = compile_program(json!({
            "properties": {"child": {"$ref": "#"}}
        }));
        // exactly one procedure: the root, calling itself
        assert_eq!(program.procedures.len(), 1);
        let Step::Properties(rules) = &entry_block(&program)[0] else {
            panic!("expected Properties step");
        };
        assert_eq!(rules[0].block, vec![Step::Call("validate".into())]);
    }

    #[test]
    fn test_keywords_emit_in_table_order() {
        let program = compile_program(json!({
            "minLength": 1,
            "type": "string",
            "enum": ["a", "ab"]
        }));
        let kinds: Vec<&str> = entry_block(&program)
            .iter()
            .map(|step| match step {
                Step::Type { .. } => "type",
                Step::Enum(_) => "enum",
                Step::MinLength(_) => "minLength",
                _ => "other",
            })
            .collect();
        assert_eq!(kinds, ["type", "enum", "minLength"]);
    }

    #[test]
    fn test_draft4_ignores_draft6_keywords() {
        let config = Config {
            schema_version: "draft4".into(),
            ..Config::default()
        };
        let program = compile_program_with(json!({"const": 4, "contains": {"type": "null"}}), &config);
        assert!(entry_block(&program).is_empty());
    }

    #[test]
    fn test_draft4_exclusive_minimum_flag() {
        let config = Config {
            schema_version: "draft4".into(),
            ..Config::default()
        };
        let program =
            compile_program_with(json!({"minimum": 5, "exclusiveMinimum": true}), &config);
        assert_eq!(
            entry_block(&program),
            &vec![Step::Minimum {
                limit: serde_json::Number::from(5),
                exclusive: true,
            }]
        );
        // draft-07 treats the same minimum as inclusive and exclusiveMinimum
        // as its own numeric keyword
        let program = compile_program(json!({"minimum": 5, "exclusiveMinimum": 3}));
        assert_eq!(
            entry_block(&program),
            &vec![
                Step::Minimum {
                    limit: serde_json::Number::from(5),
                    exclusive: false,
                },
                Step::ExclusiveMinimum {
                    limit: serde_json::Number::from(3),
                },
            ]
        );
    }

    #[test]
    fn test_regex_pool_deduplicates() {
        let program = compile_program(json!({
            "properties": {
                "a": {"pattern": "^x+$"},
                "b": {"pattern": "^x+$"},
                "c": {"pattern": "^y+$"}
            }
        }));
        assert_eq!(program.regexes.len(), 2);
        let sources: Vec<&str> = program.regexes.iter().map(|p| p.source.as_str()).collect();
        assert!(sources.contains(&"^x+$"));
        assert!(sources.contains(&"^y+$"));
    }

    #[test]
    fn test_invalid_pattern_is_a_compile_error() {
        let schema = json!({"pattern": "[unclosed"});
        let config = Config::default();
        let resolver = RefResolver::from_schema(&schema, &config).unwrap();
        let err = Compiler::new(resolver, &config).compile().unwrap_err();
        assert!(matches!(err, CompileError::InvalidRegex { .. }));
    }

    #[test]
    fn test_unknown_format_is_ignored() {
        let program = compile_program(json!({"format": "half-life"}));
        assert!(entry_block(&program).is_empty());
    }

    #[test]
    fn test_format_dispatch_regex_vs_predicate() {
        let program = compile_program(json!({"format": "date-time"}));
        assert!(matches!(
            entry_block(&program)[0],
            Step::FormatRegex { ref name, .. } if name == "date-time"
        ));
        let program = compile_program(json!({"format": "regex"}));
        assert!(matches!(
            entry_block(&program)[0],
            Step::FormatCheck { ref name } if name == "regex"
        ));
        // draft-04 does not know uri-template; draft-06 does
        let config = Config {
            schema_version: "draft4".into(),
            ..Config::default()
        };
        let program = compile_program_with(json!({"format": "uri-template"}), &config);
        assert!(entry_block(&program).is_empty());
    }

    #[test]
    fn test_items_forms() {
        let program = compile_program(json!({"items": {"type": "null"}}));
        assert!(matches!(entry_block(&program)[0], Step::ItemsAll(_)));

        let program = compile_program(json!({"items": false}));
        assert_eq!(entry_block(&program), &vec![Step::ItemsFalse]);

        let program = compile_program(json!({
            "items": [{"type": "string"}, {"type": "integer", "default": 42}],
            "additionalItems": false
        }));
        let Step::ItemsTuple { items, additional } = &entry_block(&program)[0] else {
            panic!("expected ItemsTuple");
        };
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].default, Some(json!(42)));
        assert_eq!(additional, &Some(AdditionalItems::Deny));
    }

    #[test]
    fn test_unique_items_false_is_a_no_op() {
        let program = compile_program(json!({"uniqueItems": false}));
        assert!(entry_block(&program).is_empty());
        let program = compile_program(json!({"uniqueItems": true}));
        assert_eq!(entry_block(&program), &vec![Step::UniqueItems]);
    }

    #[test]
    fn test_property_names_and_contains_register_procedures() {
        let program = compile_program(json!({
            "propertyNames": {"maxLength": 3},
            "contains": {"type": "integer"}
        }));
        let block = entry_block(&program);
        let names: Vec<&String> = program.procedures.keys().collect();
        assert!(names.iter().any(|n| n.ends_with("_property_names")), "{names:?}");
        assert!(names.iter().any(|n| n.ends_with("_contains")), "{names:?}");
        assert!(matches!(
            block[0],
            Step::PropertyNames(PropertyNamesRule::Procedure(_))
        ));
        assert!(matches!(block[1], Step::Contains(ContainsRule::Procedure(_))));
    }

    #[test]
    fn test_dependencies_forms() {
        let program = compile_program(json!({
            "dependencies": {
                "a": ["b", "c"],
                "d": {"required": ["e"]},
                "f": true,
                "g": false
            }
        }));
        let Step::Dependencies(rules) = &entry_block(&program)[0] else {
            panic!("expected Dependencies");
        };
        assert_eq!(rules.len(), 3);
        assert_eq!(
            rules[0],
            ("a".to_string(), DependencyRule::Keys(vec!["b".into(), "c".into()]))
        );
        assert!(matches!(rules[1], (ref k, DependencyRule::Schema(_)) if k == "d"));
        assert_eq!(rules[2], ("g".to_string(), DependencyRule::Fail));
    }

    #[test]
    fn test_content_keywords_order_decode_before_parse() {
        let program = compile_program(json!({
            "contentEncoding": "base64",
            "contentMediaType": "application/json"
        }));
        assert_eq!(
            entry_block(&program),
            &vec![Step::ContentEncodingBase64, Step::ContentMediaTypeJson]
        );
        // media type alone still parses
        let program = compile_program(json!({"contentMediaType": "application/json"}));
        assert_eq!(entry_block(&program), &vec![Step::ContentMediaTypeJson]);
    }

    #[test]
    fn test_include_version() {
        let config = Config {
            include_version: true,
            ..Config::default()
        };
        let program = compile_program_with(json!({}), &config);
        assert_eq!(program.version.as_deref(), Some(env!("CARGO_PKG_VERSION")));
        let program = compile_program(json!({}));
        assert_eq!(program.version, None);
    }
}
