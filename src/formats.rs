/// Format checkers: a name -> checker table the compiler calls into by name.
///
/// Two flavors: regex-backed formats (the pattern source is pooled by the
/// compiler next to user `pattern` literals) and predicate-backed formats
/// (a plain `fn(&str) -> bool`). The registry is owned per compilation --
/// there is no module-level mutable state -- and callers may inject their own
/// entries through `Config::formats`.
///
/// The predicates are pragmatic shape checks, not full RFC parsers: a
/// complete RFC 3987 IRI grammar is explicitly out of scope.
use std::collections::BTreeMap;

pub type FormatPredicate = fn(&str) -> bool;

const DATE_PATTERN: &str = r"^\d{4}-\d{1,2}-\d{1,2}$";
const DATE_TIME_PATTERN: &str =
    r"(?i)^\d{4}-\d{2}-\d{2}[t ]\d{2}:\d{2}:\d{2}(\.\d+)?(z|[+-]\d{2}:?\d{2})?$";
const EMAIL_PATTERN: &str = r"^[^@\s]+@[^@\s]+\.[^@\s]+$";
const HOSTNAME_PATTERN: &str = r"^(([a-zA-Z0-9]|[a-zA-Z0-9][a-zA-Z0-9\-]*[a-zA-Z0-9])\.)*([A-Za-z0-9]|[A-Za-z0-9][A-Za-z0-9\-]{1,62}[A-Za-z0-9])$";
const IPV4_PATTERN: &str = r"^(25[0-5]|2[0-4]\d|[01]?\d\d?)(\.(25[0-5]|2[0-4]\d|[01]?\d\d?)){3}$";
const IPV6_PATTERN: &str = r"^(([0-9a-fA-F]{1,4}:){7}[0-9a-fA-F]{1,4}|([0-9a-fA-F]{1,4}:){1,7}:|([0-9a-fA-F]{1,4}:){1,6}:[0-9a-fA-F]{1,4}|([0-9a-fA-F]{1,4}:){1,5}(:[0-9a-fA-F]{1,4}){1,2}|([0-9a-fA-F]{1,4}:){1,4}(:[0-9a-fA-F]{1,4}){1,3}|([0-9a-fA-F]{1,4}:){1,3}(:[0-9a-fA-F]{1,4}){1,4}|([0-9a-fA-F]{1,4}:){1,2}(:[0-9a-fA-F]{1,4}){1,5}|[0-9a-fA-F]{1,4}:((:[0-9a-fA-F]{1,4}){1,6})|:((:[0-9a-fA-F]{1,4}){1,7}|:))$";
const RELATIVE_JSON_POINTER_PATTERN: &str = r"^(?:0|[1-9][0-9]*)(?:#|(?:/(?:[^~/]|~0|~1)*)*)$";
const TIME_PATTERN: &str =
    r"^\d{1,2}:\d{1,2}(:\d{1,2}(\.\d{1,6})?([zZ]|[+-]\d\d:\d\d)?)?$";
const URI_PATTERN: &str = r"^\w+:(/?/?)[^\s]+$";
const URI_TEMPLATE_PATTERN: &str = r#"(?i)^(?:(?:[^\x00-\x20"'<>%\\^`{|}]|%[0-9a-f]{2})|\{[+#./;?&=,!@|]?(?:[a-z0-9_]|%[0-9a-f]{2})+(?::[1-9][0-9]{0,3}|\*)?(?:,(?:[a-z0-9_]|%[0-9a-f]{2})+(?::[1-9][0-9]{0,3}|\*)?)*\})*$"#;

fn is_valid_regex(value: &str) -> bool {
    regex::Regex::new(value).is_ok()
}

fn is_valid_json_pointer(value: &str) -> bool {
    if value.is_empty() {
        return true;
    }
    if !value.starts_with('/') {
        return false;
    }
    let mut chars = value.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '~' && !matches!(chars.peek(), Some('0') | Some('1')) {
            return false;
        }
    }
    true
}

fn has_no_whitespace_or_control(value: &str) -> bool {
    !value.chars().any(|c| c.is_whitespace() || c.is_control())
}

fn is_valid_uri_reference(value: &str) -> bool {
    // Absolute URIs parse fully; relative references get a shape check only.
    if url::Url::parse(value).is_ok() {
        return true;
    }
    has_no_whitespace_or_control(value) && value.chars().all(|c| c.is_ascii())
}

fn is_valid_iri(value: &str) -> bool {
    !value.is_empty() && value.contains(':') && has_no_whitespace_or_control(value)
}

fn is_valid_iri_reference(value: &str) -> bool {
    has_no_whitespace_or_control(value)
}

fn is_valid_idn_email(value: &str) -> bool {
    let mut parts = value.splitn(2, '@');
    match (parts.next(), parts.next()) {
        (Some(local), Some(domain)) => {
            !local.is_empty() && !domain.is_empty() && !domain.contains('@')
        }
        _ => false,
    }
}

fn is_valid_idn_hostname(value: &str) -> bool {
    !value.is_empty()
        && has_no_whitespace_or_control(value)
        && value
            .split('.')
            .all(|label| !label.is_empty() && label.chars().count() <= 63)
}

/// Name -> checker registry, injectable per compilation.
#[derive(Debug, Clone)]
pub struct FormatRegistry {
    regexes: BTreeMap<String, String>,
    predicates: BTreeMap<String, FormatPredicate>,
}

impl Default for FormatRegistry {
    fn default() -> Self {
        let mut registry = FormatRegistry {
            regexes: BTreeMap::new(),
            predicates: BTreeMap::new(),
        };
        registry.register_regex("date", DATE_PATTERN);
        registry.register_regex("date-time", DATE_TIME_PATTERN);
        registry.register_regex("email", EMAIL_PATTERN);
        registry.register_regex("hostname", HOSTNAME_PATTERN);
        registry.register_regex("ipv4", IPV4_PATTERN);
        registry.register_regex("ipv6", IPV6_PATTERN);
        registry.register_regex("relative-json-pointer", RELATIVE_JSON_POINTER_PATTERN);
        registry.register_regex("time", TIME_PATTERN);
        registry.register_regex("uri", URI_PATTERN);
        registry.register_regex("uri-template", URI_TEMPLATE_PATTERN);
        registry.register_predicate("regex", is_valid_regex);
        registry.register_predicate("json-pointer", is_valid_json_pointer);
        registry.register_predicate("uri-reference", is_valid_uri_reference);
        registry.register_predicate("iri", is_valid_iri);
        registry.register_predicate("iri-reference", is_valid_iri_reference);
        registry.register_predicate("idn-email", is_valid_idn_email);
        registry.register_predicate("idn-hostname", is_valid_idn_hostname);
        registry
    }
}

impl FormatRegistry {
    pub fn register_regex(&mut self, name: impl Into<String>, pattern: impl Into<String>) {
        self.regexes.insert(name.into(), pattern.into());
    }

    pub fn register_predicate(&mut self, name: impl Into<String>, predicate: FormatPredicate) {
        self.predicates.insert(name.into(), predicate);
    }

    pub fn regex_pattern(&self, name: &str) -> Option<&str> {
        self.regexes.get(name).map(String::as_str)
    }

    pub fn predicate(&self, name: &str) -> Option<FormatPredicate> {
        self.predicates.get(name).copied()
    }
}
