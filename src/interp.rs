/// Direct interpretation of a compiled `Program` over `serde_json::Value`.
///
/// Procedures run their steps in emission order against a mutable value:
/// defaults are injected and content decodings applied in place, and the
/// first violated constraint surfaces as a `ValidationError`. Combinator
/// steps run their sub-blocks against scratch copies and commit only the
/// accepted copy, so a failed branch leaves no side effects behind.
use std::collections::BTreeSet;

use base64::Engine;
use serde_json::Value;

use crate::error::ValidationError;
use crate::ir::{
    AdditionalItems, ContainsRule, DependencyRule, JsonType, Program, PropertyNamesRule, Step,
};
use crate::ir::json_eq;

/// A compiled validator: the program plus its entry-point name.
///
/// Immutable after compilation; safe to invoke concurrently from multiple
/// threads as long as the input values themselves are not shared.
#[derive(Debug, Clone)]
pub struct Validator {
    program: Program,
}

impl Validator {
    pub(crate) fn new(program: Program) -> Self {
        Validator { program }
    }

    /// Name of the root procedure, matching the root resolution scope.
    pub fn entry_point(&self) -> &str {
        &self.program.entry
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    /// Validate `data`, returning the (possibly mutated) value on success.
    pub fn validate(&self, mut data: Value) -> Result<Value, ValidationError> {
        let entry = self.program.entry.clone();
        self.program.call(&entry, &mut data, "data")?;
        Ok(data)
    }
}

/// Per-block runtime state: the lazily built set of object keys not yet
/// visited by `properties`/`patternProperties`, consumed by
/// `additionalProperties`. Sub-blocks always start fresh.
#[derive(Default)]
struct BlockState {
    unvisited: Option<BTreeSet<String>>,
}

impl BlockState {
    fn unvisited(&mut self, value: &Value) -> &mut BTreeSet<String> {
        self.unvisited.get_or_insert_with(|| {
            value
                .as_object()
                .map(|obj| obj.keys().cloned().collect())
                .unwrap_or_default()
        })
    }
}

impl Program {
    /// Invoke a named procedure against `value`.
    pub fn call(
        &self,
        name: &str,
        value: &mut Value,
        path: &str,
    ) -> Result<(), ValidationError> {
        let block = self.procedures.get(name).ok_or_else(|| {
            ValidationError::new(format!("unknown validation procedure: {name}"))
        })?;
        self.run_block(block, value, path)
    }

    fn run_block(
        &self,
        block: &[Step],
        value: &mut Value,
        path: &str,
    ) -> Result<(), ValidationError> {
        let mut state = BlockState::default();
        for step in block {
            self.run_step(step, value, path, &mut state)?;
        }
        Ok(())
    }

    fn run_step(
        &self,
        step: &Step,
        value: &mut Value,
        path: &str,
        state: &mut BlockState,
    ) -> Result<(), ValidationError> {
        match step {
            Step::Fail => Err(ValidationError::new(format!(
                "{path} has False boolean schema"
            ))),

            // paths restart at the procedure boundary, like the generated
            // procedures' own `data` parameter
            Step::Call(name) => self.call(name, value, "data"),

            Step::Type {
                types,
                float_integer,
            } => {
                if types.iter().any(|t| t.matches(value, *float_integer)) {
                    Ok(())
                } else {
                    let expected: Vec<&str> = types.iter().map(JsonType::as_str).collect();
                    Err(ValidationError::new(format!(
                        "{path} must be {}",
                        expected.join(" or ")
                    )))
                }
            }

            Step::Enum(values) => {
                if values.iter().any(|v| json_eq(v, value)) {
                    Ok(())
                } else {
                    let rendered = serde_json::to_string(values).unwrap_or_default();
                    Err(ValidationError::new(format!(
                        "{path} must be one of {rendered}"
                    )))
                }
            }

            Step::Const(expected) => {
                if json_eq(expected, value) {
                    Ok(())
                } else {
                    Err(ValidationError::new(format!("{path} const not valid")))
                }
            }

            Step::AllOf(blocks) => {
                for block in blocks {
                    self.run_block(block, value, path)?;
                }
                Ok(())
            }

            Step::AnyOf(blocks) => {
                for block in blocks {
                    let mut candidate = value.clone();
                    if self.run_block(block, &mut candidate, path).is_ok() {
                        *value = candidate;
                        return Ok(());
                    }
                }
                Err(ValidationError::new(format!(
                    "{path} must be valid by one of anyOf definition"
                )))
            }

            Step::OneOf(blocks) => {
                let mut matched = 0u32;
                let mut accepted = None;
                for block in blocks {
                    let mut candidate = value.clone();
                    if self.run_block(block, &mut candidate, path).is_ok() {
                        matched += 1;
                        accepted = Some(candidate);
                    }
                }
                if matched != 1 {
                    return Err(ValidationError::new(format!(
                        "{path} must be valid exactly by one of oneOf definition"
                    )));
                }
                if let Some(candidate) = accepted {
                    *value = candidate;
                }
                Ok(())
            }

            Step::Not(block) => {
                let mut probe = value.clone();
                if self.run_block(block, &mut probe, path).is_ok() {
                    Err(ValidationError::new(format!(
                        "{path} must not be valid by not definition"
                    )))
                } else {
                    Ok(())
                }
            }

            Step::MinLength(limit) => {
                if let Some(text) = value.as_str() {
                    if (text.chars().count() as u64) < *limit {
                        return Err(ValidationError::new(format!(
                            "{path} must be longer than or equal to {limit} characters"
                        )));
                    }
                }
                Ok(())
            }

            Step::MaxLength(limit) => {
                if let Some(text) = value.as_str() {
                    if (text.chars().count() as u64) > *limit {
                        return Err(ValidationError::new(format!(
                            "{path} must be shorter than or equal to {limit} characters"
                        )));
                    }
                }
                Ok(())
            }

            Step::Pattern { pool, pattern } => {
                if let Some(text) = value.as_str() {
                    if !self.regexes[*pool].regex.is_match(text) {
                        return Err(ValidationError::new(format!(
                            "{path} must match pattern {pattern}"
                        )));
                    }
                }
                Ok(())
            }

            Step::FormatRegex { pool, name } => {
                if let Some(text) = value.as_str() {
                    if !self.regexes[*pool].regex.is_match(text) {
                        return Err(ValidationError::new(format!("{path} must be {name}")));
                    }
                }
                Ok(())
            }

            Step::FormatCheck { name } => {
                if let Some(text) = value.as_str() {
                    if let Some(predicate) = self.formats.predicate(name) {
                        if !predicate(text) {
                            return Err(ValidationError::new(format!(
                                "{path} must be a valid {name}"
                            )));
                        }
                    }
                }
                Ok(())
            }

            Step::Minimum { limit, exclusive } => {
                if let Some(number) = number_of(value) {
                    let bound = limit.as_f64().unwrap_or(f64::NAN);
                    if *exclusive && number <= bound {
                        return Err(ValidationError::new(format!(
                            "{path} must be bigger than {limit}"
                        )));
                    }
                    if !*exclusive && number < bound {
                        return Err(ValidationError::new(format!(
                            "{path} must be bigger than or equal to {limit}"
                        )));
                    }
                }
                Ok(())
            }

            Step::Maximum { limit, exclusive } => {
                if let Some(number) = number_of(value) {
                    let bound = limit.as_f64().unwrap_or(f64::NAN);
                    if *exclusive && number >= bound {
                        return Err(ValidationError::new(format!(
                            "{path} must be smaller than {limit}"
                        )));
                    }
                    if !*exclusive && number > bound {
                        return Err(ValidationError::new(format!(
                            "{path} must be smaller than or equal to {limit}"
                        )));
                    }
                }
                Ok(())
            }

            Step::ExclusiveMinimum { limit } => {
                if let Some(number) = number_of(value) {
                    if number <= limit.as_f64().unwrap_or(f64::NAN) {
                        return Err(ValidationError::new(format!(
                            "{path} must be bigger than {limit}"
                        )));
                    }
                }
                Ok(())
            }

            Step::ExclusiveMaximum { limit } => {
                if let Some(number) = number_of(value) {
                    if number >= limit.as_f64().unwrap_or(f64::NAN) {
                        return Err(ValidationError::new(format!(
                            "{path} must be smaller than {limit}"
                        )));
                    }
                }
                Ok(())
            }

            // float division with an exact integer-quotient test; quotients
            // that land on a representable-float boundary can misreport
            Step::MultipleOf { divisor } => {
                if let Some(number) = number_of(value) {
                    let quotient = number / divisor.as_f64().unwrap_or(f64::NAN);
                    if quotient.trunc() != quotient {
                        return Err(ValidationError::new(format!(
                            "{path} must be multiple of {divisor}"
                        )));
                    }
                }
                Ok(())
            }

            Step::MinItems(limit) => {
                if let Some(items) = value.as_array() {
                    if (items.len() as u64) < *limit {
                        return Err(ValidationError::new(format!(
                            "{path} must contain at least {limit} items"
                        )));
                    }
                }
                Ok(())
            }

            Step::MaxItems(limit) => {
                if let Some(items) = value.as_array() {
                    if (items.len() as u64) > *limit {
                        return Err(ValidationError::new(format!(
                            "{path} must contain less than or equal to {limit} items"
                        )));
                    }
                }
                Ok(())
            }

            Step::UniqueItems => {
                if let Some(items) = value.as_array() {
                    for i in 1..items.len() {
                        for j in 0..i {
                            if json_eq(&items[i], &items[j]) {
                                return Err(ValidationError::new(format!(
                                    "{path} must contain unique items"
                                )));
                            }
                        }
                    }
                }
                Ok(())
            }

            Step::ItemsAll(block) => {
                if value.is_array() {
                    let len = value.as_array().map_or(0, Vec::len);
                    for idx in 0..len {
                        if let Some(item) = value.get_mut(idx) {
                            self.run_block(block, item, &format!("{path}[{idx}]"))?;
                        }
                    }
                }
                Ok(())
            }

            Step::ItemsFalse => {
                if value.as_array().map_or(false, |items| !items.is_empty()) {
                    return Err(ValidationError::new(format!(
                        "{path} with False boolean schema"
                    )));
                }
                Ok(())
            }

            Step::ItemsTuple { items, additional } => {
                if !value.is_array() {
                    return Ok(());
                }
                // length before default injection, so appended defaults are
                // not re-validated or re-counted
                let len = value.as_array().map_or(0, Vec::len);
                for (idx, item) in items.iter().enumerate() {
                    if len > idx {
                        if let Some(element) = value.get_mut(idx) {
                            self.run_block(&item.block, element, &format!("{path}[{idx}]"))?;
                        }
                    } else if let Some(default) = &item.default {
                        if let Some(elements) = value.as_array_mut() {
                            elements.push(default.clone());
                        }
                    }
                }
                match additional {
                    Some(AdditionalItems::Deny) => {
                        if len > items.len() {
                            return Err(ValidationError::new(format!(
                                "{path} must contain only specified items"
                            )));
                        }
                    }
                    Some(AdditionalItems::Schema(block)) => {
                        for idx in items.len()..len {
                            if let Some(element) = value.get_mut(idx) {
                                self.run_block(block, element, &format!("{path}[{idx}]"))?;
                            }
                        }
                    }
                    None => {}
                }
                Ok(())
            }

            Step::MinProperties(limit) => {
                if let Some(object) = value.as_object() {
                    if (object.len() as u64) < *limit {
                        return Err(ValidationError::new(format!(
                            "{path} must contain at least {limit} properties"
                        )));
                    }
                }
                Ok(())
            }

            Step::MaxProperties(limit) => {
                if let Some(object) = value.as_object() {
                    if (object.len() as u64) > *limit {
                        return Err(ValidationError::new(format!(
                            "{path} must contain less than or equal to {limit} properties"
                        )));
                    }
                }
                Ok(())
            }

            Step::Required(keys) => {
                if let Some(object) = value.as_object() {
                    if !keys.iter().all(|key| object.contains_key(key)) {
                        return Err(ValidationError::new(format!(
                            "{path} must contain {keys:?} properties"
                        )));
                    }
                }
                Ok(())
            }

            Step::Properties(rules) => {
                if !value.is_object() {
                    return Ok(());
                }
                state.unvisited(value);
                for rule in rules {
                    if value.get(&rule.key).is_some() {
                        if let Some(keys) = state.unvisited.as_mut() {
                            keys.remove(&rule.key);
                        }
                        if let Some(child) = value.get_mut(&rule.key) {
                            self.run_block(
                                &rule.block,
                                child,
                                &format!("{path}.{}", rule.key),
                            )?;
                        }
                    } else if let Some(default) = &rule.default {
                        if let Some(object) = value.as_object_mut() {
                            object.insert(rule.key.clone(), default.clone());
                        }
                    }
                }
                Ok(())
            }

            Step::PatternProperties(rules) => {
                if !value.is_object() {
                    return Ok(());
                }
                state.unvisited(value);
                let keys: Vec<String> = value
                    .as_object()
                    .map(|obj| obj.keys().cloned().collect())
                    .unwrap_or_default();
                for key in keys {
                    for (pool, _, block) in rules {
                        if self.regexes[*pool].regex.is_match(&key) {
                            if let Some(visited) = state.unvisited.as_mut() {
                                visited.remove(&key);
                            }
                            if let Some(child) = value.get_mut(&key) {
                                self.run_block(block, child, &format!("{path}.{key}"))?;
                            }
                        }
                    }
                }
                Ok(())
            }

            Step::AdditionalProperties(handling) => {
                if !value.is_object() {
                    return Ok(());
                }
                let leftovers: Vec<String> =
                    state.unvisited(value).iter().cloned().collect();
                match handling {
                    None => {
                        if !leftovers.is_empty() {
                            return Err(ValidationError::new(format!(
                                "{path} must contain only specified properties"
                            )));
                        }
                    }
                    Some(block) => {
                        for key in leftovers {
                            if let Some(child) = value.get_mut(&key) {
                                self.run_block(block, child, &format!("{path}.{key}"))?;
                            }
                        }
                    }
                }
                Ok(())
            }

            Step::Dependencies(rules) => {
                if !value.is_object() {
                    return Ok(());
                }
                for (key, rule) in rules {
                    if value.get(key).is_none() {
                        continue;
                    }
                    match rule {
                        DependencyRule::Keys(needed) => {
                            for wanted in needed {
                                if value.get(wanted).is_none() {
                                    return Err(ValidationError::new(format!(
                                        "{path} missing dependency {wanted} for {key}"
                                    )));
                                }
                            }
                        }
                        DependencyRule::Schema(block) => {
                            self.run_block(block, value, path)?;
                        }
                        DependencyRule::Fail => {
                            return Err(ValidationError::new(format!(
                                "{path} with false schema"
                            )));
                        }
                    }
                }
                Ok(())
            }

            Step::PropertyNames(rule) => {
                let keys: Vec<String> = match value.as_object() {
                    Some(object) => object.keys().cloned().collect(),
                    None => return Ok(()),
                };
                match rule {
                    PropertyNamesRule::DenyNonEmpty => {
                        if !keys.is_empty() {
                            return Err(ValidationError::new(format!(
                                "{path} propertyNames with boolean schema false"
                            )));
                        }
                    }
                    PropertyNamesRule::Procedure(name) => {
                        for key in keys {
                            let mut probe = Value::String(key);
                            if self.call(name, &mut probe, "data").is_err() {
                                return Err(ValidationError::new(format!(
                                    "{path} must contain only properties with correct name"
                                )));
                            }
                        }
                    }
                }
                Ok(())
            }

            Step::Contains(rule) => {
                let len = match value.as_array() {
                    Some(items) => items.len(),
                    None => return Ok(()),
                };
                match rule {
                    ContainsRule::AlwaysFail => {
                        return Err(ValidationError::new(format!(
                            "{path} has False boolean schema"
                        )));
                    }
                    ContainsRule::NonEmpty => {
                        if len == 0 {
                            return Err(ValidationError::new(format!(
                                "{path} contains empty array is invalid"
                            )));
                        }
                    }
                    ContainsRule::Procedure(name) => {
                        if len == 0 {
                            return Err(ValidationError::new(format!(
                                "{path} contains empty array is invalid"
                            )));
                        }
                        let mut found = false;
                        for idx in 0..len {
                            let mut probe = value
                                .get(idx)
                                .cloned()
                                .unwrap_or(Value::Null);
                            if self.call(name, &mut probe, "data").is_ok() {
                                found = true;
                                break;
                            }
                        }
                        if !found {
                            return Err(ValidationError::new(format!(
                                "{path} must contain at least some defined thing"
                            )));
                        }
                    }
                }
                Ok(())
            }

            Step::IfThenElse {
                condition,
                then_block,
                else_block,
            } => {
                // the condition runs on a scratch copy: its outcome selects
                // the branch, its mutations are discarded
                let mut probe = value.clone();
                let holds = self.run_block(condition, &mut probe, path).is_ok();
                if holds {
                    if let Some(block) = then_block {
                        self.run_block(block, value, path)?;
                    }
                } else if let Some(block) = else_block {
                    self.run_block(block, value, path)?;
                }
                Ok(())
            }

            Step::ContentEncodingBase64 => {
                if !value.is_string() {
                    return Ok(());
                }
                let raw = value.as_str().unwrap_or_default().to_string();
                let decoded = base64::engine::general_purpose::STANDARD
                    .decode(raw.as_bytes())
                    .ok()
                    .and_then(|bytes| String::from_utf8(bytes).ok());
                match decoded {
                    Some(text) if !text.is_empty() => {
                        *value = Value::String(text);
                        Ok(())
                    }
                    _ => Err(ValidationError::new(format!(
                        "{path} invalid content encoding"
                    ))),
                }
            }

            Step::ContentMediaTypeJson => {
                if !value.is_string() {
                    return Ok(());
                }
                let raw = value.as_str().unwrap_or_default().to_string();
                match serde_json::from_str::<Value>(&raw) {
                    Ok(parsed) => {
                        *value = parsed;
                        Ok(())
                    }
                    Err(_) => Err(ValidationError::new(format!(
                        "{path} invalid json content"
                    ))),
                }
            }
        }
    }
}

/// Numeric view of a value for bound checks. Booleans are not numbers.
fn number_of(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{compile, Config};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn validator(schema: Value) -> Validator {
        compile(&schema, &Config::default()).unwrap()
    }

    fn message(schema: Value, data: Value) -> String {
        validator(schema).validate(data).unwrap_err().message
    }

    #[test]
    fn test_validator_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Validator>();
    }

    #[test]
    fn test_type_checks() {
        let v = validator(json!({"type": "string"}));
        assert!(v.validate(json!("hello")).is_ok());
        assert_eq!(
            v.validate(json!(1)).unwrap_err().message,
            "data must be string"
        );
        assert_eq!(
            message(json!({"type": ["string", "number"]}), json!(null)),
            "data must be string or number"
        );
    }

    #[test]
    fn test_booleans_are_not_numbers() {
        assert_eq!(
            message(json!({"type": "number"}), json!(true)),
            "data must be number"
        );
        assert!(validator(json!({"type": "boolean"})).validate(json!(true)).is_ok());
    }

    #[test]
    fn test_integer_semantics_per_draft() {
        assert!(validator(json!({"type": "integer"})).validate(json!(1.0)).is_ok());
        let draft4 = Config {
            schema_version: "draft4".into(),
            ..Config::default()
        };
        let v = compile(&json!({"type": "integer"}), &draft4).unwrap();
        assert!(v.validate(json!(1.0)).is_err());
        assert!(v.validate(json!(1)).is_ok());
    }

    #[test]
    fn test_enum_uses_deep_equality() {
        let v = validator(json!({"enum": [1, "a", [2, 3]]}));
        assert!(v.validate(json!(1.0)).is_ok());
        assert!(v.validate(json!([2.0, 3])).is_ok());
        assert_eq!(
            v.validate(json!("b")).unwrap_err().message,
            "data must be one of [1,\"a\",[2,3]]"
        );
    }

    #[test]
    fn test_const_deep_equality() {
        let v = validator(json!({"const": {"a": [1]}}));
        assert!(v.validate(json!({"a": [1.0]})).is_ok());
        assert_eq!(
            v.validate(json!({"a": [2]})).unwrap_err().message,
            "data const not valid"
        );
    }

    #[test]
    fn test_all_of_accumulates_side_effects() {
        let v = validator(json!({
            "allOf": [
                {"properties": {"a": {"default": 1}}},
                {"properties": {"b": {"default": 2}}}
            ]
        }));
        assert_eq!(v.validate(json!({})).unwrap(), json!({"a": 1, "b": 2}));
    }

    #[test]
    fn test_any_of_keeps_first_successful_branch_only() {
        let v = validator(json!({
            "anyOf": [
                {"type": "object", "required": ["x"], "properties": {"a": {"default": 1}}},
                {"type": "object", "properties": {"b": {"default": 2}}}
            ]
        }));
        // first branch fails on required; its default must not leak
        assert_eq!(v.validate(json!({})).unwrap(), json!({"b": 2}));
        assert_eq!(
            validator(json!({"anyOf": [{"type": "string"}, {"type": "integer"}]}))
                .validate(json!(null))
                .unwrap_err()
                .message,
            "data must be valid by one of anyOf definition"
        );
    }

    #[test]
    fn test_one_of_counts_matches() {
        let schema = json!({
            "oneOf": [
                {"type": "number", "multipleOf": 3},
                {"type": "number", "multipleOf": 5}
            ]
        });
        let v = validator(schema);
        assert!(v.validate(json!(9)).is_ok());
        assert!(v.validate(json!(10)).is_ok());
        assert_eq!(
            v.validate(json!(15)).unwrap_err().message,
            "data must be valid exactly by one of oneOf definition"
        );
        assert!(v.validate(json!(7)).is_err());
    }

    #[test]
    fn test_not_including_boolean_literals() {
        let v = validator(json!({"not": {"type": "null"}}));
        assert!(v.validate(json!(1)).is_ok());
        assert_eq!(
            v.validate(json!(null)).unwrap_err().message,
            "data must not be valid by not definition"
        );
        // not:true always fails, not:false always passes
        assert!(validator(json!({"not": true})).validate(json!(1)).is_err());
        assert!(validator(json!({"not": false})).validate(json!(1)).is_ok());
        // not:{} behaves like not:true
        assert!(validator(json!({"not": {}})).validate(json!(0)).is_err());
    }

    #[test]
    fn test_string_lengths_are_code_points() {
        let v = validator(json!({"minLength": 2, "maxLength": 3}));
        assert!(v.validate(json!("áb")).is_ok());
        assert_eq!(
            v.validate(json!("a")).unwrap_err().message,
            "data must be longer than or equal to 2 characters"
        );
        assert_eq!(
            v.validate(json!("abcd")).unwrap_err().message,
            "data must be shorter than or equal to 3 characters"
        );
        // non-strings skip length checks
        assert!(v.validate(json!(5)).is_ok());
    }

    #[test]
    fn test_pattern_is_a_search() {
        let v = validator(json!({"pattern": "[ab]"}));
        assert!(v.validate(json!("xxaxx")).is_ok());
        assert_eq!(
            v.validate(json!("c")).unwrap_err().message,
            "data must match pattern [ab]"
        );
    }

    #[test]
    fn test_format_checks() {
        let v = validator(json!({"format": "date-time"}));
        assert!(v.validate(json!("2018-02-05T14:17:10.00Z")).is_ok());
        assert_eq!(
            v.validate(json!("not a date")).unwrap_err().message,
            "data must be date-time"
        );
        let v = validator(json!({"format": "regex"}));
        assert!(v.validate(json!("[ab]+")).is_ok());
        assert_eq!(
            v.validate(json!("[ab")).unwrap_err().message,
            "data must be a valid regex"
        );
    }

    #[test]
    fn test_numeric_bounds() {
        let v = validator(json!({"minimum": 2, "maximum": 5}));
        assert!(v.validate(json!(2)).is_ok());
        assert!(v.validate(json!(5.0)).is_ok());
        assert_eq!(
            v.validate(json!(1)).unwrap_err().message,
            "data must be bigger than or equal to 2"
        );
        assert_eq!(
            v.validate(json!(6)).unwrap_err().message,
            "data must be smaller than or equal to 5"
        );
        let v = validator(json!({"exclusiveMinimum": 2, "exclusiveMaximum": 5}));
        assert!(v.validate(json!(3)).is_ok());
        assert_eq!(
            v.validate(json!(2)).unwrap_err().message,
            "data must be bigger than 2"
        );
        assert_eq!(
            v.validate(json!(5)).unwrap_err().message,
            "data must be smaller than 5"
        );
    }

    #[test]
    fn test_draft4_exclusive_flags() {
        let draft4 = Config {
            schema_version: "draft4".into(),
            ..Config::default()
        };
        let v = compile(
            &json!({"minimum": 2, "exclusiveMinimum": true}),
            &draft4,
        )
        .unwrap();
        assert!(v.validate(json!(3)).is_ok());
        assert_eq!(
            v.validate(json!(2)).unwrap_err().message,
            "data must be bigger than 2"
        );
    }

    #[test]
    fn test_multiple_of() {
        let v = validator(json!({"multipleOf": 3}));
        assert!(v.validate(json!(9)).is_ok());
        assert!(v.validate(json!(9.0)).is_ok());
        assert_eq!(
            v.validate(json!(10)).unwrap_err().message,
            "data must be multiple of 3"
        );
        assert!(validator(json!({"multipleOf": 0.5})).validate(json!(2.5)).is_ok());
    }

    #[test]
    fn test_array_bounds_and_uniqueness() {
        let v = validator(json!({"minItems": 1, "maxItems": 2}));
        assert!(v.validate(json!([1])).is_ok());
        assert_eq!(
            v.validate(json!([])).unwrap_err().message,
            "data must contain at least 1 items"
        );
        assert_eq!(
            v.validate(json!([1, 2, 3])).unwrap_err().message,
            "data must contain less than or equal to 2 items"
        );

        let unique = validator(json!({"uniqueItems": true}));
        assert!(unique.validate(json!([1, "1", [1], {"a": 1}])).is_ok());
        // numerically equal values collide even across representations
        assert_eq!(
            unique.validate(json!([1, 1.0])).unwrap_err().message,
            "data must contain unique items"
        );
        // same string rendering, different types: still unique
        assert!(unique.validate(json!(["1", 1])).is_ok());
    }

    #[test]
    fn test_items_schema_form() {
        let v = validator(json!({"items": {"type": "integer"}}));
        assert!(v.validate(json!([1, 2, 3])).is_ok());
        assert_eq!(
            v.validate(json!([1, "x"])).unwrap_err().message,
            "data[1] must be integer"
        );
    }

    #[test]
    fn test_items_tuple_form_with_defaults_and_additional() {
        let v = validator(json!({
            "items": [{"type": "string"}, {"type": "integer", "default": 7}],
            "additionalItems": false
        }));
        assert_eq!(v.validate(json!(["a"])).unwrap(), json!(["a", 7]));
        assert_eq!(
            v.validate(json!(["a", 1, true])).unwrap_err().message,
            "data must contain only specified items"
        );

        let v = validator(json!({
            "items": [{"type": "string"}],
            "additionalItems": {"type": "integer"}
        }));
        assert!(v.validate(json!(["a", 1, 2])).is_ok());
        assert_eq!(
            v.validate(json!(["a", 1, "b"])).unwrap_err().message,
            "data[2] must be integer"
        );
    }

    #[test]
    fn test_object_bounds_and_required() {
        let v = validator(json!({"minProperties": 1, "maxProperties": 2}));
        assert!(v.validate(json!({"a": 1})).is_ok());
        assert_eq!(
            v.validate(json!({})).unwrap_err().message,
            "data must contain at least 1 properties"
        );

        let v = validator(json!({"required": ["a", "b"]}));
        assert!(v.validate(json!({"a": 1, "b": 2})).is_ok());
        assert_eq!(
            v.validate(json!({"a": 1})).unwrap_err().message,
            "data must contain [\"a\", \"b\"] properties"
        );
    }

    #[test]
    fn test_properties_with_defaults() {
        let v = validator(json!({
            "properties": {
                "a": {"type": "number", "default": 42},
                "b": {"type": "string"}
            }
        }));
        assert_eq!(v.validate(json!({})).unwrap(), json!({"a": 42}));
        assert_eq!(
            v.validate(json!({"b": 3})).unwrap_err().message,
            "data.b must be string"
        );
    }

    #[test]
    fn test_additional_properties() {
        let v = validator(json!({
            "properties": {"a": {}},
            "additionalProperties": false
        }));
        assert!(v.validate(json!({"a": 1})).is_ok());
        assert_eq!(
            v.validate(json!({"a": 1, "b": 2})).unwrap_err().message,
            "data must contain only specified properties"
        );

        let v = validator(json!({
            "properties": {"a": {}},
            "additionalProperties": {"type": "integer"}
        }));
        assert!(v.validate(json!({"a": "anything", "b": 2})).is_ok());
        assert_eq!(
            v.validate(json!({"b": "nope"})).unwrap_err().message,
            "data.b must be integer"
        );
    }

    #[test]
    fn test_pattern_properties_mark_keys_visited() {
        let v = validator(json!({
            "patternProperties": {"^x": {"type": "integer"}},
            "additionalProperties": false
        }));
        assert!(v.validate(json!({"x1": 1, "x2": 2})).is_ok());
        assert_eq!(
            v.validate(json!({"x1": "s"})).unwrap_err().message,
            "data.x1 must be integer"
        );
        assert_eq!(
            v.validate(json!({"y": 1})).unwrap_err().message,
            "data must contain only specified properties"
        );
    }

    #[test]
    fn test_dependencies() {
        let v = validator(json!({
            "dependencies": {"a": ["b"]}
        }));
        assert!(v.validate(json!({"b": 1})).is_ok());
        assert!(v.validate(json!({"a": 1, "b": 1})).is_ok());
        assert_eq!(
            v.validate(json!({"a": 1})).unwrap_err().message,
            "data missing dependency b for a"
        );

        let v = validator(json!({
            "dependencies": {"a": {"required": ["c"]}}
        }));
        assert!(v.validate(json!({"a": 1, "c": 1})).is_ok());
        assert!(v.validate(json!({"a": 1})).is_err());
    }

    #[test]
    fn test_property_names() {
        let v = validator(json!({"propertyNames": {"maxLength": 2}}));
        assert!(v.validate(json!({"ab": 1, "c": 2})).is_ok());
        assert_eq!(
            v.validate(json!({"abc": 1})).unwrap_err().message,
            "data must contain only properties with correct name"
        );
        let deny = validator(json!({"propertyNames": false}));
        assert!(deny.validate(json!({})).is_ok());
        assert!(deny.validate(json!({"a": 1})).is_err());
    }

    #[test]
    fn test_contains() {
        let v = validator(json!({"contains": {"type": "integer"}}));
        assert!(v.validate(json!(["a", 2])).is_ok());
        assert_eq!(
            v.validate(json!([])).unwrap_err().message,
            "data contains empty array is invalid"
        );
        assert_eq!(
            v.validate(json!(["a", "b"])).unwrap_err().message,
            "data must contain at least some defined thing"
        );
    }

    #[test]
    fn test_if_then_else() {
        let v = validator(json!({
            "if": {"type": "integer"},
            "then": {"minimum": 10},
            "else": {"maxLength": 2}
        }));
        assert!(v.validate(json!(12)).is_ok());
        assert!(v.validate(json!(5)).is_err());
        assert!(v.validate(json!("ab")).is_ok());
        assert!(v.validate(json!("abc")).is_err());
        // absent branch is a no-op
        let v = validator(json!({"if": {"type": "integer"}, "then": {"minimum": 10}}));
        assert!(v.validate(json!("anything")).is_ok());
    }

    #[test]
    fn test_content_encoding_and_media_type() {
        let v = validator(json!({"contentEncoding": "base64"}));
        assert_eq!(v.validate(json!("aGVsbG8=")).unwrap(), json!("hello"));
        assert_eq!(
            v.validate(json!("***")).unwrap_err().message,
            "data invalid content encoding"
        );
        // empty decode result is an error
        assert!(v.validate(json!("")).is_err());

        let v = validator(json!({"contentMediaType": "application/json"}));
        assert_eq!(v.validate(json!("{\"a\": 1}")).unwrap(), json!({"a": 1}));
        assert_eq!(
            v.validate(json!("{nope")).unwrap_err().message,
            "data invalid json content"
        );

        // base64-wrapped json decodes then parses
        let v = validator(json!({
            "contentEncoding": "base64",
            "contentMediaType": "application/json"
        }));
        assert_eq!(v.validate(json!("eyJhIjogMX0=")).unwrap(), json!({"a": 1}));
    }

    #[test]
    fn test_ref_cycle_validates_nested_data() {
        let v = validator(json!({"properties": {"child": {"$ref": "#"}}}));
        assert!(v
            .validate(json!({"child": {"child": {"child": {}}}}))
            .is_ok());
        assert!(v.validate(json!({"child": {"child": 5}})).is_ok());
    }
}
