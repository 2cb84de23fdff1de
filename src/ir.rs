/// Typed validation steps: the intermediate form the compiler emits.
///
/// A `Program` maps procedure names to step blocks. Steps are immutable,
/// backend-neutral values: the interpreter executes them directly and the
/// Rust source backend lowers them to text. Nothing here knows about
/// resolution scopes or drafts -- draft decisions are baked in at compile
/// time (e.g. `float_integer` on a `Type` step).
use std::collections::BTreeMap;

use serde_json::{Number, Value};

use crate::formats::FormatRegistry;

/// The seven JSON Schema primitive type names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JsonType {
    Array,
    Boolean,
    Integer,
    Null,
    Number,
    Object,
    String,
}

impl JsonType {
    pub fn parse(name: &str) -> Option<JsonType> {
        match name {
            "array" => Some(JsonType::Array),
            "boolean" => Some(JsonType::Boolean),
            "integer" => Some(JsonType::Integer),
            "null" => Some(JsonType::Null),
            "number" => Some(JsonType::Number),
            "object" => Some(JsonType::Object),
            "string" => Some(JsonType::String),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JsonType::Array => "array",
            JsonType::Boolean => "boolean",
            JsonType::Integer => "integer",
            JsonType::Null => "null",
            JsonType::Number => "number",
            JsonType::Object => "object",
            JsonType::String => "string",
        }
    }

    /// Runtime type test. Booleans never match `number`/`integer`;
    /// `float_integer` admits floats with zero fractional part as integers
    /// (drafts >= 06).
    pub fn matches(&self, value: &Value, float_integer: bool) -> bool {
        match self {
            JsonType::Array => value.is_array(),
            JsonType::Boolean => value.is_boolean(),
            JsonType::Null => value.is_null(),
            JsonType::Object => value.is_object(),
            JsonType::String => value.is_string(),
            JsonType::Number => value.is_number(),
            JsonType::Integer => match value {
                Value::Number(n) => {
                    n.is_i64()
                        || n.is_u64()
                        || (float_integer && n.as_f64().map_or(false, |f| f.fract() == 0.0))
                }
                _ => false,
            },
        }
    }
}

/// A sequence of steps validating one value binding.
pub type Block = Vec<Step>;

/// One positional `items` entry: a sub-block plus an optional default to
/// append when the position is missing.
#[derive(Debug, Clone, PartialEq)]
pub struct TupleItem {
    pub block: Block,
    pub default: Option<Value>,
}

/// `additionalItems` handling for the positional `items` form.
#[derive(Debug, Clone, PartialEq)]
pub enum AdditionalItems {
    Deny,
    Schema(Block),
}

/// One declared property: sub-block plus an optional default injected when
/// the key is absent.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyRule {
    pub key: String,
    pub block: Block,
    pub default: Option<Value>,
}

/// One `dependencies` entry, keyed by the triggering property.
#[derive(Debug, Clone, PartialEq)]
pub enum DependencyRule {
    /// Listed keys must be present alongside the trigger.
    Keys(Vec<String>),
    /// The whole object revalidates against a sub-block.
    Schema(Block),
    /// `false` schema dependency: the trigger's presence is itself an error.
    Fail,
}

/// `propertyNames` handling.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyNamesRule {
    /// `propertyNames: false` -- any key at all is an error.
    DenyNonEmpty,
    /// Every key validates against the named procedure.
    Procedure(String),
}

/// `contains` handling.
#[derive(Debug, Clone, PartialEq)]
pub enum ContainsRule {
    /// `contains: false` -- every array fails.
    AlwaysFail,
    /// `contains: true` -- only empty arrays fail.
    NonEmpty,
    /// At least one element must satisfy the named procedure.
    Procedure(String),
}

/// One emitted validation step. Each guards on the dynamic type it applies
/// to; non-matching values skip the step silently.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// `false` boolean schema: unconditional failure.
    Fail,
    /// `$ref`: call the referenced scope's procedure.
    Call(String),
    Type {
        types: Vec<JsonType>,
        float_integer: bool,
    },
    Enum(Vec<Value>),
    Const(Value),
    AllOf(Vec<Block>),
    AnyOf(Vec<Block>),
    OneOf(Vec<Block>),
    /// An empty block always validates, making `Not(vec![])` an
    /// unconditional failure.
    Not(Block),
    MinLength(u64),
    MaxLength(u64),
    Pattern {
        pool: usize,
        pattern: String,
    },
    FormatRegex {
        pool: usize,
        name: String,
    },
    FormatCheck {
        name: String,
    },
    Minimum {
        limit: Number,
        exclusive: bool,
    },
    Maximum {
        limit: Number,
        exclusive: bool,
    },
    ExclusiveMinimum {
        limit: Number,
    },
    ExclusiveMaximum {
        limit: Number,
    },
    MultipleOf {
        divisor: Number,
    },
    MinItems(u64),
    MaxItems(u64),
    UniqueItems,
    /// `items` with a single schema: every element validates against it.
    ItemsAll(Block),
    /// `items: false`.
    ItemsFalse,
    /// `items` with an array of schemas.
    ItemsTuple {
        items: Vec<TupleItem>,
        additional: Option<AdditionalItems>,
    },
    MinProperties(u64),
    MaxProperties(u64),
    Required(Vec<String>),
    Properties(Vec<PropertyRule>),
    PatternProperties(Vec<(usize, String, Block)>),
    /// `None` rejects any key left unvisited by `properties`/
    /// `patternProperties`; `Some` validates leftover values.
    AdditionalProperties(Option<Block>),
    Dependencies(Vec<(String, DependencyRule)>),
    PropertyNames(PropertyNamesRule),
    Contains(ContainsRule),
    IfThenElse {
        condition: Block,
        then_block: Option<Block>,
        else_block: Option<Block>,
    },
    /// `contentEncoding: base64`: decode the string in place.
    ContentEncodingBase64,
    /// `contentMediaType: application/json`: parse the string in place.
    ContentMediaTypeJson,
}

/// A regex literal collected once per compilation and referenced by pool
/// index from `Pattern`/`PatternProperties`/`FormatRegex` steps.
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    pub source: String,
    pub regex: regex::Regex,
}

/// The compiler's output: named procedures, the entry-point name, the regex
/// pool and the format registry the procedures dispatch into.
#[derive(Debug, Clone)]
pub struct Program {
    pub procedures: BTreeMap<String, Block>,
    pub entry: String,
    pub regexes: Vec<CompiledPattern>,
    pub formats: FormatRegistry,
    pub version: Option<String>,
}

/// Structural deep equality with numeric cross-representation comparison:
/// `1`, `1.0` and `1u64` are equal; values of different JSON types never
/// are. Used by `enum`, `const` and `uniqueItems`.
pub fn json_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => number_eq(x, y),
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(va, vb)| json_eq(va, vb))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x.iter()
                    .all(|(key, va)| y.get(key).map_or(false, |vb| json_eq(va, vb)))
        }
        _ => a == b,
    }
}

fn number_eq(x: &Number, y: &Number) -> bool {
    if let (Some(a), Some(b)) = (x.as_i64(), y.as_i64()) {
        return a == b;
    }
    if let (Some(a), Some(b)) = (x.as_u64(), y.as_u64()) {
        return a == b;
    }
    match (x.as_f64(), y.as_f64()) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}
