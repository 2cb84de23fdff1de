/// JSON Schema URI resolution scopes and dereferencing.
///
/// A single pre-compilation walk rewrites every relative `$ref` into an
/// absolute URI and registers every `$id` scope in the cache; during
/// compilation the resolver hands out dereferenced nodes while keeping the
/// scope stack and the current base document balanced on every exit path.
use std::collections::HashMap;

use serde_json::Value;
use tracing::{debug, trace};
use url::Url;

use crate::error::CompileError;
use crate::meta_schema::MetaSchema;
use crate::{Config, UriHandler};

/// Syntactic URI normalization, used as the cache key everywhere.
/// Absolute URIs get scheme/host/path canonicalization; empty fragments are
/// dropped; anything unparseable is passed through.
pub fn normalize(uri: &str) -> String {
    if let Ok(mut url) = Url::parse(uri) {
        if url.fragment() == Some("") {
            url.set_fragment(None);
        }
        return url.to_string();
    }
    let (base, fragment) = split_fragment(uri);
    if fragment.is_empty() {
        base.to_string()
    } else {
        uri.to_string()
    }
}

/// Split a URI at its first `#` into (document URI, fragment).
pub fn split_fragment(uri: &str) -> (&str, &str) {
    match uri.find('#') {
        Some(idx) => (&uri[..idx], &uri[idx + 1..]),
        None => (uri, ""),
    }
}

/// Resolve `reference` against `base`. Absolute bases follow RFC 3986 via
/// the `url` crate; empty or relative bases fall back to fragment
/// attachment and last-segment path merging.
pub fn join(base: &str, reference: &str) -> String {
    if let Ok(base_url) = Url::parse(base) {
        if let Ok(joined) = base_url.join(reference) {
            return joined.to_string();
        }
    }
    if Url::parse(reference).is_ok() {
        return reference.to_string();
    }
    if reference.is_empty() {
        return base.to_string();
    }
    if let Some(fragment) = reference.strip_prefix('#') {
        let (path, _) = split_fragment(base);
        return format!("{path}#{fragment}");
    }
    let (path, _) = split_fragment(base);
    match path.rfind('/') {
        Some(idx) => format!("{}/{}", &path[..idx], reference),
        None => reference.to_string(),
    }
}

/// Dereference a JSON-Pointer fragment within `document`.
///
/// Segments are percent-decoded as a whole, then unescaped per RFC 6901
/// (`~1` -> `/`, `~0` -> `~`); numeric segments index arrays, named segments
/// index maps. An unresolvable segment is a fatal resolution error.
pub fn resolve_pointer<'a>(
    document: &'a Value,
    fragment: &str,
) -> Result<&'a Value, CompileError> {
    let decoded = urlencoding::decode(fragment)
        .map(|cow| cow.into_owned())
        .unwrap_or_else(|_| fragment.to_string());
    let trimmed = decoded.trim_start_matches('/');
    if trimmed.is_empty() {
        return Ok(document);
    }
    let mut node = document;
    for part in trimmed.split('/') {
        let part = part.replace("~1", "/").replace("~0", "~");
        node = match node {
            Value::Array(items) => part.parse::<usize>().ok().and_then(|idx| items.get(idx)),
            Value::Object(map) => map.get(&part),
            _ => None,
        }
        .ok_or(CompileError::UnresolvableRef(part))?;
    }
    Ok(node)
}

/// Tracks nested resolution scopes and dereferences `$ref` targets, caching
/// remote documents per instance.
pub struct RefResolver {
    base_uri: String,
    document: Value,
    meta: MetaSchema,
    store: HashMap<String, Value>,
    scope_stack: Vec<String>,
    saved: Vec<(String, Value)>,
    cache: bool,
    handlers: HashMap<String, UriHandler>,
}

impl RefResolver {
    pub fn new(
        base_uri: String,
        schema: Value,
        meta: MetaSchema,
        handlers: HashMap<String, UriHandler>,
        cache: bool,
    ) -> Self {
        let mut resolver = RefResolver {
            scope_stack: vec![base_uri.clone()],
            base_uri,
            document: Value::Null,
            meta,
            store: HashMap::new(),
            saved: Vec::new(),
            cache,
            handlers,
        };
        let mut document = schema;
        resolver.walk(&mut document);
        resolver.document = document;
        resolver
    }

    /// Construct a resolver for a schema document, selecting the draft from
    /// the document's `$schema` (falling back to the configured default) and
    /// the base URI from the draft's identity property.
    pub fn from_schema(schema: &Value, config: &Config) -> Result<Self, CompileError> {
        let version = schema
            .as_object()
            .and_then(|map| map.get("$schema"))
            .and_then(Value::as_str)
            .unwrap_or(&config.schema_version);
        let meta = MetaSchema::new(version)?;
        let base_uri = schema
            .as_object()
            .and_then(|map| map.get(meta.id_keyword()))
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();
        Ok(RefResolver::new(
            base_uri,
            schema.clone(),
            meta,
            config.uri_handlers.clone(),
            config.cache_refs,
        ))
    }

    pub fn meta_schema(&self) -> &MetaSchema {
        &self.meta
    }

    /// The schema document after the normalization walk.
    pub fn document(&self) -> &Value {
        &self.document
    }

    pub fn current_scope(&self) -> &str {
        self.scope_stack.last().map(String::as_str).unwrap_or("")
    }

    /// Run `f` with `scope` (resolved against the current scope) pushed; the
    /// scope is popped when `f` returns, on success and on failure alike.
    pub fn in_scope<T>(&mut self, scope: &str, f: impl FnOnce(&mut Self) -> T) -> T {
        self.push_scope(scope);
        let result = f(self);
        self.pop_scope();
        result
    }

    /// Explicit scope push for callers that cannot borrow through a closure.
    /// Every `push_scope` must be paired with exactly one `pop_scope`.
    pub fn push_scope(&mut self, scope: &str) {
        let joined = join(self.current_scope(), scope);
        self.scope_stack.push(joined);
    }

    pub fn pop_scope(&mut self) {
        debug_assert!(self.scope_stack.len() > 1, "scope stack underflow");
        self.scope_stack.pop();
    }

    /// Pre-register a definition under a synthetic URI so a later
    /// `enter_ref` on that URI finds it without fetching.
    pub fn cache_definition(&mut self, uri: String, node: Value) {
        self.store.insert(uri, node);
    }

    /// Resolve `reference` against the current scope and return the
    /// dereferenced node, entering its scope. The caller must call
    /// `exit_ref` exactly once afterwards, on success and on error paths
    /// alike; nothing is entered when this returns `Err`.
    pub fn enter_ref(&mut self, reference: &str) -> Result<Value, CompileError> {
        let new_uri = join(self.current_scope(), reference);
        let (uri, fragment) = split_fragment(&new_uri);
        let document = if let Some(cached) = self.store.get(&normalize(uri)) {
            trace!(uri, "resolved from cache");
            cached.clone()
        } else if uri.is_empty() || uri == split_fragment(&self.base_uri).0 {
            self.document.clone()
        } else {
            let fetched = self.resolve_remote(uri)?;
            if self.cache {
                self.store.insert(normalize(uri), fetched.clone());
            }
            fetched
        };
        let node = resolve_pointer(&document, fragment)?.clone();
        let old_base = std::mem::replace(&mut self.base_uri, uri.to_string());
        let old_document = std::mem::replace(&mut self.document, document);
        self.saved.push((old_base, old_document));
        let uri = uri.to_string();
        self.push_scope(&uri);
        Ok(node)
    }

    /// Restore the scope and base document saved by the matching `enter_ref`.
    pub fn exit_ref(&mut self) {
        self.pop_scope();
        if let Some((base, document)) = self.saved.pop() {
            self.base_uri = base;
            self.document = document;
        }
    }

    /// Derive a procedure name from the current scope: percent-decode,
    /// replace JSON-Pointer escapes and non-identifier characters with
    /// underscores, lowercase, trim trailing underscores, append `postfix`.
    /// Returns the normalized scope URI alongside the name.
    pub fn scope_name(&self, postfix: &str) -> (String, String) {
        let scope = self.current_scope();
        let decoded = urlencoding::decode(scope)
            .map(|cow| cow.into_owned())
            .unwrap_or_else(|_| scope.to_string());
        let decoded = decoded.replace("~1", "_").replace("~0", "_");
        let mut name = String::from("validate_");
        for c in decoded.chars() {
            if c.is_ascii_alphanumeric() || c == '_' {
                name.push(c);
            } else {
                name.push('_');
            }
        }
        name.push_str(postfix);
        let name = name.to_lowercase();
        (normalize(scope), name.trim_end_matches('_').to_string())
    }

    /// Pre-order normalization pass, run once before compilation.
    ///
    /// `$ref` values are rewritten absolute against the current scope;
    /// identity-bearing nodes open a new scope and are cached under it. The
    /// values of `enum`, `const` and `default` are data literals and are not
    /// descended into.
    fn walk(&mut self, node: &mut Value) {
        match node {
            Value::Object(map) => {
                if matches!(map.get("$ref"), Some(Value::String(_))) {
                    let reference = map
                        .get("$ref")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string();
                    let absolute = join(self.current_scope(), &reference);
                    map.insert("$ref".to_string(), Value::String(absolute));
                } else if let Some(id) = map.get(self.meta.id_keyword()).and_then(Value::as_str) {
                    let id = id.to_string();
                    self.in_scope(&id, |resolver| {
                        resolver.walk_members(map);
                        let cache_key = normalize(resolver.current_scope());
                        trace!(scope = %cache_key, "registered $id scope");
                        resolver.store.insert(cache_key, Value::Object(map.clone()));
                    });
                } else {
                    self.walk_members(map);
                }
            }
            Value::Array(items) => {
                for item in items {
                    self.walk(item);
                }
            }
            _ => {}
        }
    }

    /// Walk the members of one schema node. The values of `enum`, `const`
    /// and `default` are data literals; the values of the map-of-schemas
    /// keywords carry arbitrary property names, so the literal-keyword
    /// exclusion must not recurse into them.
    fn walk_members(&mut self, map: &mut serde_json::Map<String, Value>) {
        for (key, child) in map.iter_mut() {
            match key.as_str() {
                "enum" | "const" | "default" => {}
                "properties" | "patternProperties" | "definitions" | "dependencies" => {
                    if let Value::Object(named) = child {
                        for (_, schema) in named.iter_mut() {
                            self.walk(schema);
                        }
                    } else {
                        self.walk(child);
                    }
                }
                _ => self.walk(child),
            }
        }
    }

    /// Fetch a document for a URI with no local cache entry: a registered
    /// scheme handler wins, `http`/`https` go through a blocking GET, and
    /// any other scheme is read as a local UTF-8 JSON file.
    fn resolve_remote(&self, uri: &str) -> Result<Value, CompileError> {
        let scheme = Url::parse(uri)
            .map(|url| url.scheme().to_string())
            .unwrap_or_default();
        if let Some(handler) = self.handlers.get(&scheme) {
            debug!(uri, scheme, "fetching remote schema via handler");
            return handler(uri);
        }
        match scheme.as_str() {
            "http" | "https" => {
                debug!(uri, "fetching remote schema over http");
                let response =
                    reqwest::blocking::get(uri).map_err(|err| CompileError::Fetch {
                        uri: uri.to_string(),
                        reason: err.to_string(),
                    })?;
                response.json::<Value>().map_err(|err| CompileError::Fetch {
                    uri: uri.to_string(),
                    reason: err.to_string(),
                })
            }
            _ => {
                debug!(uri, "reading schema from local file");
                let path = Url::parse(uri)
                    .ok()
                    .and_then(|url| url.to_file_path().ok())
                    .map(|path| path.to_string_lossy().into_owned())
                    .unwrap_or_else(|| uri.to_string());
                let text = std::fs::read_to_string(&path).map_err(|err| CompileError::Fetch {
                    uri: uri.to_string(),
                    reason: err.to_string(),
                })?;
                serde_json::from_str(&text).map_err(|err| CompileError::Fetch {
                    uri: uri.to_string(),
                    reason: err.to_string(),
                })
            }
        }
    }
}
