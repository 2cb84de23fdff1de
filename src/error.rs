/// Error types shared by the resolver, the compiler and compiled validators.
///
/// Two distinct failure classes: `CompileError` is fatal and aborts
/// compilation; `ValidationError` is the uniform, catchable outcome of a
/// violated constraint and doubles as control flow inside `anyOf`/`oneOf`/
/// `not`/`if`.
use std::fmt;

#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("schema must be an object or a boolean")]
    NotASchema,
    #[error("unknown schema version: '{0}'")]
    UnknownSchemaVersion(String),
    #[error("unknown type: '{0}'")]
    UnknownType(String),
    #[error("unresolvable ref: {0}")]
    UnresolvableRef(String),
    #[error("cannot fetch {uri}: {reason}")]
    Fetch { uri: String, reason: String },
    #[error("invalid regular expression '{pattern}': {reason}")]
    InvalidRegex { pattern: String, reason: String },
    #[error("schema is not valid against its meta-schema: {0}")]
    SchemaValidation(String),
    #[error("{0}")]
    Other(String),
}

/// Raised by a compiled validator when a constraint is violated.
///
/// Every keyword failure is this one kind; the `message` names the offending
/// path and the violated constraint. Callers discriminate by message text,
/// never by variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub message: String,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ValidationError {}
