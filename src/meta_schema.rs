/// Meta-schema registry: which keywords exist per draft, in which order they
/// run, which property names a schema's own URI (`id` vs `$id`), and which
/// string formats a draft recognizes.
///
/// Each draft's keyword table is an independent, explicit constant -- no
/// "draft-06 is draft-04 plus X" modeling. Emitted validation steps run in
/// table order, so error determinism for a given invalid document depends on
/// these lists staying exactly as they are.
use once_cell::sync::Lazy;
use serde_json::Value;

use crate::error::CompileError;

pub const DRAFT_04_URI: &str = "http://json-schema.org/draft-04/schema#";
pub const DRAFT_06_URI: &str = "http://json-schema.org/draft-06/schema#";
pub const DRAFT_07_URI: &str = "http://json-schema.org/draft-07/schema#";

/// One validation keyword. The compiler maps each variant to its generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Keyword {
    Type,
    Enum,
    AllOf,
    AnyOf,
    OneOf,
    Not,
    MinLength,
    MaxLength,
    Pattern,
    Format,
    Minimum,
    Maximum,
    MultipleOf,
    MinItems,
    MaxItems,
    UniqueItems,
    Items,
    MinProperties,
    MaxProperties,
    Required,
    Properties,
    PatternProperties,
    AdditionalProperties,
    Dependencies,
    ExclusiveMinimum,
    ExclusiveMaximum,
    PropertyNames,
    Contains,
    Const,
    If,
    ContentMediaType,
    ContentEncoding,
}

impl Keyword {
    pub fn as_str(&self) -> &'static str {
        match self {
            Keyword::Type => "type",
            Keyword::Enum => "enum",
            Keyword::AllOf => "allOf",
            Keyword::AnyOf => "anyOf",
            Keyword::OneOf => "oneOf",
            Keyword::Not => "not",
            Keyword::MinLength => "minLength",
            Keyword::MaxLength => "maxLength",
            Keyword::Pattern => "pattern",
            Keyword::Format => "format",
            Keyword::Minimum => "minimum",
            Keyword::Maximum => "maximum",
            Keyword::MultipleOf => "multipleOf",
            Keyword::MinItems => "minItems",
            Keyword::MaxItems => "maxItems",
            Keyword::UniqueItems => "uniqueItems",
            Keyword::Items => "items",
            Keyword::MinProperties => "minProperties",
            Keyword::MaxProperties => "maxProperties",
            Keyword::Required => "required",
            Keyword::Properties => "properties",
            Keyword::PatternProperties => "patternProperties",
            Keyword::AdditionalProperties => "additionalProperties",
            Keyword::Dependencies => "dependencies",
            Keyword::ExclusiveMinimum => "exclusiveMinimum",
            Keyword::ExclusiveMaximum => "exclusiveMaximum",
            Keyword::PropertyNames => "propertyNames",
            Keyword::Contains => "contains",
            Keyword::Const => "const",
            Keyword::If => "if",
            Keyword::ContentMediaType => "contentMediaType",
            Keyword::ContentEncoding => "contentEncoding",
        }
    }
}

/// Draft-04 keyword table, in generation order.
pub const DRAFT_04_KEYWORDS: &[Keyword] = &[
    Keyword::Type,
    Keyword::Enum,
    Keyword::AllOf,
    Keyword::AnyOf,
    Keyword::OneOf,
    Keyword::Not,
    Keyword::MinLength,
    Keyword::MaxLength,
    Keyword::Pattern,
    Keyword::Format,
    Keyword::Minimum,
    Keyword::Maximum,
    Keyword::MultipleOf,
    Keyword::MinItems,
    Keyword::MaxItems,
    Keyword::UniqueItems,
    Keyword::Items,
    Keyword::MinProperties,
    Keyword::MaxProperties,
    Keyword::Required,
    Keyword::Properties,
    Keyword::PatternProperties,
    Keyword::AdditionalProperties,
    Keyword::Dependencies,
];

/// Draft-06 keyword table, in generation order.
pub const DRAFT_06_KEYWORDS: &[Keyword] = &[
    Keyword::Type,
    Keyword::Enum,
    Keyword::AllOf,
    Keyword::AnyOf,
    Keyword::OneOf,
    Keyword::Not,
    Keyword::MinLength,
    Keyword::MaxLength,
    Keyword::Pattern,
    Keyword::Format,
    Keyword::Minimum,
    Keyword::Maximum,
    Keyword::MultipleOf,
    Keyword::MinItems,
    Keyword::MaxItems,
    Keyword::UniqueItems,
    Keyword::Items,
    Keyword::MinProperties,
    Keyword::MaxProperties,
    Keyword::Required,
    Keyword::Properties,
    Keyword::PatternProperties,
    Keyword::AdditionalProperties,
    Keyword::Dependencies,
    Keyword::ExclusiveMinimum,
    Keyword::ExclusiveMaximum,
    Keyword::PropertyNames,
    Keyword::Contains,
    Keyword::Const,
];

/// Draft-07 keyword table, in generation order.
pub const DRAFT_07_KEYWORDS: &[Keyword] = &[
    Keyword::Type,
    Keyword::Enum,
    Keyword::AllOf,
    Keyword::AnyOf,
    Keyword::OneOf,
    Keyword::Not,
    Keyword::MinLength,
    Keyword::MaxLength,
    Keyword::Pattern,
    Keyword::Format,
    Keyword::Minimum,
    Keyword::Maximum,
    Keyword::MultipleOf,
    Keyword::MinItems,
    Keyword::MaxItems,
    Keyword::UniqueItems,
    Keyword::Items,
    Keyword::MinProperties,
    Keyword::MaxProperties,
    Keyword::Required,
    Keyword::Properties,
    Keyword::PatternProperties,
    Keyword::AdditionalProperties,
    Keyword::Dependencies,
    Keyword::ExclusiveMinimum,
    Keyword::ExclusiveMaximum,
    Keyword::PropertyNames,
    Keyword::Contains,
    Keyword::Const,
    Keyword::If,
    Keyword::ContentMediaType,
    Keyword::ContentEncoding,
];

static DRAFT_04_DOCUMENT: Lazy<Value> = Lazy::new(|| {
    serde_json::from_str(include_str!("meta_schema/draft-04.json"))
        .expect("embedded draft-04 meta-schema is valid JSON")
});
static DRAFT_06_DOCUMENT: Lazy<Value> = Lazy::new(|| {
    serde_json::from_str(include_str!("meta_schema/draft-06.json"))
        .expect("embedded draft-06 meta-schema is valid JSON")
});
static DRAFT_07_DOCUMENT: Lazy<Value> = Lazy::new(|| {
    serde_json::from_str(include_str!("meta_schema/draft-07.json"))
        .expect("embedded draft-07 meta-schema is valid JSON")
});

/// A JSON Schema draft, selected from `$schema` on the input document or the
/// configured default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Draft {
    Draft4,
    Draft6,
    Draft7,
}

impl Draft {
    /// Accepts both short names ("draft4") and meta-schema URIs.
    pub fn parse(version: &str) -> Result<Draft, CompileError> {
        match version {
            "draft4" | DRAFT_04_URI => Ok(Draft::Draft4),
            "draft6" | DRAFT_06_URI => Ok(Draft::Draft6),
            "draft7" | DRAFT_07_URI => Ok(Draft::Draft7),
            other => Err(CompileError::UnknownSchemaVersion(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Draft::Draft4 => "draft4",
            Draft::Draft6 => "draft6",
            Draft::Draft7 => "draft7",
        }
    }

    pub fn uri(&self) -> &'static str {
        match self {
            Draft::Draft4 => DRAFT_04_URI,
            Draft::Draft6 => DRAFT_06_URI,
            Draft::Draft7 => DRAFT_07_URI,
        }
    }

    /// The property name that denotes a schema's self-identifying URI.
    pub fn id_keyword(&self) -> &'static str {
        match self {
            Draft::Draft4 => "id",
            Draft::Draft6 | Draft::Draft7 => "$id",
        }
    }

    /// Whether a float with zero fractional part counts as an integer.
    pub fn float_with_zero_fraction_is_integer(&self) -> bool {
        !matches!(self, Draft::Draft4)
    }

    pub fn keywords(&self) -> &'static [Keyword] {
        match self {
            Draft::Draft4 => DRAFT_04_KEYWORDS,
            Draft::Draft6 => DRAFT_06_KEYWORDS,
            Draft::Draft7 => DRAFT_07_KEYWORDS,
        }
    }

    /// Format names backed by a regular expression in this draft.
    pub fn format_regex_names(&self) -> &'static [&'static str] {
        match self {
            Draft::Draft4 => &["date-time", "email", "hostname", "ipv4", "ipv6", "uri"],
            Draft::Draft6 => &[
                "date-time",
                "email",
                "hostname",
                "ipv4",
                "ipv6",
                "uri",
                "uri-template",
            ],
            Draft::Draft7 => &[
                "date",
                "date-time",
                "email",
                "hostname",
                "ipv4",
                "ipv6",
                "relative-json-pointer",
                "time",
                "uri",
                "uri-template",
            ],
        }
    }

    /// Format names backed by a checker function in this draft.
    pub fn format_function_names(&self) -> &'static [&'static str] {
        match self {
            Draft::Draft4 => &["regex"],
            Draft::Draft6 => &["json-pointer", "regex", "uri-reference"],
            Draft::Draft7 => &[
                "idn-email",
                "idn-hostname",
                "iri",
                "iri-reference",
                "json-pointer",
                "regex",
                "uri-reference",
            ],
        }
    }
}

/// Per-draft rule set: keyword table, identity property and the draft's own
/// meta-schema document.
#[derive(Debug, Clone, Copy)]
pub struct MetaSchema {
    pub draft: Draft,
}

impl MetaSchema {
    pub fn new(version: &str) -> Result<MetaSchema, CompileError> {
        Ok(MetaSchema {
            draft: Draft::parse(version)?,
        })
    }

    pub fn uri(&self) -> &'static str {
        self.draft.uri()
    }

    pub fn id_keyword(&self) -> &'static str {
        self.draft.id_keyword()
    }

    /// The embedded meta-schema document for this draft.
    pub fn document(&self) -> &'static Value {
        match self.draft {
            Draft::Draft4 => &DRAFT_04_DOCUMENT,
            Draft::Draft6 => &DRAFT_06_DOCUMENT,
            Draft::Draft7 => &DRAFT_07_DOCUMENT,
        }
    }

    /// Validate a user schema against this draft's meta-schema by compiling
    /// the meta-schema with the same compiler and running it.
    pub fn validate(&self, schema: &Value) -> Result<(), CompileError> {
        let config = crate::Config {
            schema_version: self.draft.name().to_string(),
            validate_schema: false,
            ..crate::Config::default()
        };
        let validator = crate::compile(self.document(), &config)?;
        validator
            .validate(schema.clone())
            .map_err(|err| CompileError::SchemaValidation(err.message))?;
        Ok(())
    }
}
