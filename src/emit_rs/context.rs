/// EmitContext: the data threaded through each emit function.
///
/// Tracks the Rust identifier currently bound to the value under validation
/// and the error-message path expression. Paths are templates: literal
/// segments for static descents, runtime arguments for loop indexes and
/// keys, rendered as a plain string literal or a `format!` call depending
/// on whether any argument is present.
use std::collections::HashSet;

use super::writer::{escape_rs, escape_rs_format};

#[derive(Debug, Clone)]
enum Segment {
    Lit(String),
    Arg(String),
}

/// A path template for error messages, e.g. `data.items[{i}]`.
#[derive(Debug, Clone)]
pub struct PathExpr {
    segments: Vec<Segment>,
}

impl PathExpr {
    pub fn root() -> Self {
        PathExpr {
            segments: vec![Segment::Lit("data".into())],
        }
    }

    pub fn push_lit(&self, text: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.push(Segment::Lit(text.to_string()));
        PathExpr { segments }
    }

    pub fn push_arg(&self, expr: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.push(Segment::Arg(expr.to_string()));
        PathExpr { segments }
    }

    pub fn has_args(&self) -> bool {
        self.segments
            .iter()
            .any(|segment| matches!(segment, Segment::Arg(_)))
    }

    /// Render `<path> <message>` as a Rust expression producing a String or
    /// &str literal.
    pub fn message_expr(&self, message: &str) -> String {
        if self.has_args() {
            let mut template = String::new();
            let mut args = Vec::new();
            for segment in &self.segments {
                match segment {
                    Segment::Lit(text) => template.push_str(&escape_rs_format(text)),
                    Segment::Arg(expr) => {
                        template.push_str("{}");
                        args.push(expr.clone());
                    }
                }
            }
            template.push(' ');
            template.push_str(&escape_rs_format(message));
            format!("format!(\"{template}\", {})", args.join(", "))
        } else {
            let mut text = String::new();
            for segment in &self.segments {
                if let Segment::Lit(lit) = segment {
                    text.push_str(lit);
                }
            }
            text.push(' ');
            text.push_str(message);
            format!("\"{}\"", escape_rs(&text))
        }
    }
}

/// Per-procedure pool of local variable names; keeps generated helper
/// locals unique without redeclaring.
#[derive(Debug, Default)]
pub struct VarPool {
    used: HashSet<String>,
}

impl VarPool {
    pub fn fresh(&mut self, stem: &str) -> String {
        if self.used.insert(stem.to_string()) {
            return stem.to_string();
        }
        let mut counter = 2;
        loop {
            let candidate = format!("{stem}_{counter}");
            if self.used.insert(candidate.clone()) {
                return candidate;
            }
            counter += 1;
        }
    }
}

/// Context passed to each per-step emit function.
#[derive(Debug, Clone)]
pub struct EmitContext {
    /// Identifier of the `&mut Value` binding being validated.
    pub var: String,
    /// Path template for error messages.
    pub path: PathExpr,
}

impl EmitContext {
    /// Context for a procedure body: `fn validate_x(data: &mut Value)`.
    pub fn procedure() -> Self {
        EmitContext {
            var: "data".into(),
            path: PathExpr::root(),
        }
    }

    /// Descend into a named property value.
    pub fn prop(&self, vars: &mut VarPool, key: &str) -> Self {
        EmitContext {
            var: vars.fresh(&format!("{}_{}", self.var, ident_of(key))),
            path: self.path.push_lit(&format!(".{key}")),
        }
    }

    /// Descend into a fixed array position.
    pub fn index(&self, vars: &mut VarPool, idx: usize) -> Self {
        EmitContext {
            var: vars.fresh(&format!("{}_{}", self.var, idx)),
            path: self.path.push_lit(&format!("[{idx}]")),
        }
    }

    /// Descend into a loop element; `idx_var` is the loop variable.
    pub fn element(&self, vars: &mut VarPool, idx_var: &str) -> Self {
        EmitContext {
            var: vars.fresh(&format!("{}_item", self.var)),
            path: self
                .path
                .push_lit("[")
                .push_arg(idx_var)
                .push_lit("]"),
        }
    }

    /// Descend into a runtime-keyed member; `key_var` is the key variable.
    pub fn keyed(&self, vars: &mut VarPool, key_var: &str) -> Self {
        EmitContext {
            var: vars.fresh(&format!("{}_value", self.var)),
            path: self.path.push_lit(".").push_arg(key_var),
        }
    }

    /// Context for a scratch-copy closure body (combinators); the path is
    /// unchanged, only the binding differs.
    pub fn scratch(&self, vars: &mut VarPool) -> Self {
        EmitContext {
            var: vars.fresh(&format!("{}_v", self.var)),
            path: self.path.clone(),
        }
    }

    /// The `return Err(...)` statement for a violated constraint.
    pub fn fail_stmt(&self, message: &str) -> String {
        format!(
            "return Err(ValidationError::new({}));",
            self.path.message_expr(message)
        )
    }
}

fn ident_of(key: &str) -> String {
    let cleaned: String = key
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    cleaned.to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_path_renders_plain_literal() {
        let ctx = EmitContext::procedure();
        assert_eq!(
            ctx.fail_stmt("must be string"),
            "return Err(ValidationError::new(\"data must be string\"));"
        );
        let mut vars = VarPool::default();
        let child = ctx.prop(&mut vars, "a");
        assert_eq!(child.var, "data_a");
        assert_eq!(
            child.fail_stmt("must be integer"),
            "return Err(ValidationError::new(\"data.a must be integer\"));"
        );
    }

    #[test]
    fn test_runtime_path_renders_format() {
        let mut vars = VarPool::default();
        let ctx = EmitContext::procedure().element(&mut vars, "data_x");
        assert_eq!(ctx.var, "data_item");
        assert_eq!(
            ctx.fail_stmt("must be integer"),
            "return Err(ValidationError::new(format!(\"data[{}] must be integer\", data_x)));"
        );
    }

    #[test]
    fn test_braces_in_literals_survive_format_rendering() {
        let mut vars = VarPool::default();
        let ctx = EmitContext::procedure().element(&mut vars, "i");
        let stmt = ctx.fail_stmt("must match pattern ^x{2,3}$");
        assert!(stmt.contains("^x{{2,3}}$"));
    }

    #[test]
    fn test_var_pool_uniquing() {
        let mut vars = VarPool::default();
        assert_eq!(vars.fresh("data_a"), "data_a");
        assert_eq!(vars.fresh("data_a"), "data_a_2");
        assert_eq!(vars.fresh("data_a"), "data_a_3");
    }

    #[test]
    fn test_keyed_descent() {
        let mut vars = VarPool::default();
        let ctx = EmitContext::procedure().keyed(&mut vars, "key");
        assert_eq!(ctx.var, "data_value");
        assert_eq!(
            ctx.fail_stmt("must be integer"),
            "return Err(ValidationError::new(format!(\"data.{} must be integer\", key)));"
        );
    }

    #[test]
    fn test_ident_sanitization() {
        let mut vars = VarPool::default();
        let ctx = EmitContext::procedure().prop(&mut vars, "Weird-Key!");
        assert_eq!(ctx.var, "data_weird_key_");
    }
}
