/// Top-level composition: lowers every procedure of a `Program` to Rust
/// source text by dispatching per step kind.
///
/// The emitted module is self-contained: it carries its own error type,
/// its own copies of the pooled regex literals as lazy statics, and its own
/// copies of the referenced format checkers. Emitted checks are
/// straightforward per-keyword blocks mirroring the interpreter.
use std::collections::BTreeSet;

use serde_json::Value;

use super::context::{EmitContext, VarPool};
use super::writer::{escape_rs, CodeWriter};
use crate::ir::{
    AdditionalItems, Block, ContainsRule, DependencyRule, JsonType, Program, PropertyNamesRule,
    Step,
};

/// Emit a complete standalone Rust module from a compiled program.
pub fn emit(program: &Program) -> String {
    let needs = scan_program(program);
    let mut w = CodeWriter::new();

    w.line("// Generated by jschema-codegen. Do not edit by hand.");
    let mut deps = vec!["serde_json"];
    if !program.regexes.is_empty() {
        deps.push("regex");
        deps.push("once_cell");
    }
    if needs.base64 {
        deps.push("base64");
    }
    if needs.url {
        deps.push("url");
    }
    w.line(&format!("// Requires: {}", deps.join(", ")));
    w.line("#![allow(dead_code, unused_variables, unused_mut, clippy::all)]");
    w.line("");
    if !program.regexes.is_empty() {
        w.line("use once_cell::sync::Lazy;");
        w.line("use regex::Regex;");
    }
    w.line("use serde_json::Value;");
    w.line("");

    if let Some(version) = &program.version {
        w.line(&format!("pub const VERSION: &str = \"{}\";", escape_rs(version)));
        w.line("");
    }

    emit_error_type(&mut w);

    for (idx, pattern) in program.regexes.iter().enumerate() {
        w.line(&format!(
            "static RE_{idx}: Lazy<Regex> = Lazy::new(|| Regex::new(\"{}\").expect(\"validated at schema compile time\"));",
            escape_rs(&pattern.source)
        ));
    }
    if !program.regexes.is_empty() {
        w.line("");
    }

    if needs.json_lit {
        emit_json_literal_fn(&mut w);
    }
    if needs.json_eq {
        emit_json_eq_fn(&mut w);
    }
    if needs.base64 {
        emit_base64_fn(&mut w);
    }
    for name in &needs.format_fns {
        emit_format_fn(&mut w, name);
    }

    for (name, block) in &program.procedures {
        w.open(&format!(
            "pub fn {name}(data: &mut Value) -> Result<(), ValidationError>"
        ));
        let mut vars = VarPool::default();
        vars.fresh("data");
        let ctx = EmitContext::procedure();
        emit_block(&mut w, &ctx, &mut vars, program, block);
        w.line("Ok(())");
        w.close();
        w.line("");
    }

    w.finish()
}

#[derive(Default)]
struct Needs {
    json_eq: bool,
    json_lit: bool,
    base64: bool,
    url: bool,
    format_fns: BTreeSet<String>,
}

fn scan_program(program: &Program) -> Needs {
    let mut needs = Needs::default();
    for block in program.procedures.values() {
        scan_block(block, &mut needs);
    }
    needs.url = needs.format_fns.contains("uri-reference");
    needs
}

fn scan_block(block: &Block, needs: &mut Needs) {
    for step in block {
        match step {
            Step::Enum(_) => {
                needs.json_eq = true;
                needs.json_lit = true;
            }
            Step::Const(_) => {
                needs.json_eq = true;
                needs.json_lit = true;
            }
            Step::UniqueItems => needs.json_eq = true,
            Step::ContentEncodingBase64 => needs.base64 = true,
            Step::FormatCheck { name } => {
                needs.format_fns.insert(name.clone());
            }
            Step::AllOf(blocks) | Step::AnyOf(blocks) | Step::OneOf(blocks) => {
                for inner in blocks {
                    scan_block(inner, needs);
                }
            }
            Step::Not(inner) | Step::ItemsAll(inner) => scan_block(inner, needs),
            Step::ItemsTuple { items, additional } => {
                for item in items {
                    scan_block(&item.block, needs);
                    if item.default.is_some() {
                        needs.json_lit = true;
                    }
                }
                if let Some(AdditionalItems::Schema(inner)) = additional {
                    scan_block(inner, needs);
                }
            }
            Step::Properties(rules) => {
                for rule in rules {
                    scan_block(&rule.block, needs);
                    if rule.default.is_some() {
                        needs.json_lit = true;
                    }
                }
            }
            Step::PatternProperties(rules) => {
                for (_, _, inner) in rules {
                    scan_block(inner, needs);
                }
            }
            Step::AdditionalProperties(Some(inner)) => scan_block(inner, needs),
            Step::Dependencies(rules) => {
                for (_, rule) in rules {
                    if let DependencyRule::Schema(inner) = rule {
                        scan_block(inner, needs);
                    }
                }
            }
            Step::IfThenElse {
                condition,
                then_block,
                else_block,
            } => {
                scan_block(condition, needs);
                if let Some(inner) = then_block {
                    scan_block(inner, needs);
                }
                if let Some(inner) = else_block {
                    scan_block(inner, needs);
                }
            }
            _ => {}
        }
    }
}

fn emit_error_type(w: &mut CodeWriter) {
    w.line("#[derive(Debug, Clone, PartialEq)]");
    w.open("pub struct ValidationError");
    w.line("pub message: String,");
    w.close();
    w.line("");
    w.open("impl ValidationError");
    w.open("pub fn new(message: impl Into<String>) -> Self");
    w.line("ValidationError { message: message.into() }");
    w.close();
    w.close();
    w.line("");
    w.open("impl std::fmt::Display for ValidationError");
    w.open("fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result");
    w.line("f.write_str(&self.message)");
    w.close();
    w.close();
    w.line("");
    w.line("impl std::error::Error for ValidationError {}");
    w.line("");
}

fn emit_json_literal_fn(w: &mut CodeWriter) {
    w.open("fn json_literal(text: &str) -> Value");
    w.line("serde_json::from_str(text).unwrap_or(Value::Null)");
    w.close();
    w.line("");
}

fn emit_json_eq_fn(w: &mut CodeWriter) {
    w.open("fn json_eq(a: &Value, b: &Value) -> bool");
    w.open("match (a, b)");
    w.open("(Value::Number(x), Value::Number(y)) =>");
    w.line("if let (Some(i), Some(j)) = (x.as_i64(), y.as_i64()) { return i == j; }");
    w.line("if let (Some(i), Some(j)) = (x.as_u64(), y.as_u64()) { return i == j; }");
    w.open("match (x.as_f64(), y.as_f64())");
    w.line("(Some(i), Some(j)) => i == j,");
    w.line("_ => false,");
    w.close();
    w.close();
    w.line("(Value::Array(x), Value::Array(y)) => x.len() == y.len() && x.iter().zip(y).all(|(va, vb)| json_eq(va, vb)),");
    w.line("(Value::Object(x), Value::Object(y)) => x.len() == y.len() && x.iter().all(|(k, va)| y.get(k).map_or(false, |vb| json_eq(va, vb))),");
    w.line("_ => a == b,");
    w.close();
    w.close();
    w.line("");
}

fn emit_base64_fn(w: &mut CodeWriter) {
    w.open("fn decode_base64(text: &str) -> Option<String>");
    w.line("use base64::Engine as _;");
    w.line("let bytes = base64::engine::general_purpose::STANDARD.decode(text.as_bytes()).ok()?;");
    w.line("String::from_utf8(bytes).ok()");
    w.close();
    w.line("");
}

fn emit_format_fn(w: &mut CodeWriter, name: &str) {
    let ident = format_fn_ident(name);
    match name {
        "regex" => {
            w.open(&format!("fn {ident}(value: &str) -> bool"));
            w.line("regex::Regex::new(value).is_ok()");
            w.close();
        }
        "json-pointer" => {
            w.open(&format!("fn {ident}(value: &str) -> bool"));
            w.line("if value.is_empty() { return true; }");
            w.line("if !value.starts_with('/') { return false; }");
            w.line("let mut chars = value.chars().peekable();");
            w.open("while let Some(c) = chars.next()");
            w.line("if c == '~' && !matches!(chars.peek(), Some('0') | Some('1')) { return false; }");
            w.close();
            w.line("true");
            w.close();
        }
        "uri-reference" => {
            w.open(&format!("fn {ident}(value: &str) -> bool"));
            w.line("if url::Url::parse(value).is_ok() { return true; }");
            w.line("!value.chars().any(|c| c.is_whitespace() || c.is_control()) && value.is_ascii()");
            w.close();
        }
        "iri" => {
            w.open(&format!("fn {ident}(value: &str) -> bool"));
            w.line("!value.is_empty() && value.contains(':') && !value.chars().any(|c| c.is_whitespace() || c.is_control())");
            w.close();
        }
        "iri-reference" => {
            w.open(&format!("fn {ident}(value: &str) -> bool"));
            w.line("!value.chars().any(|c| c.is_whitespace() || c.is_control())");
            w.close();
        }
        "idn-email" => {
            w.open(&format!("fn {ident}(value: &str) -> bool"));
            w.line("let mut parts = value.splitn(2, '@');");
            w.open("match (parts.next(), parts.next())");
            w.line("(Some(local), Some(domain)) => !local.is_empty() && !domain.is_empty() && !domain.contains('@'),");
            w.line("_ => false,");
            w.close();
            w.close();
        }
        "idn-hostname" => {
            w.open(&format!("fn {ident}(value: &str) -> bool"));
            w.line("!value.is_empty() && !value.chars().any(|c| c.is_whitespace() || c.is_control()) && value.split('.').all(|label| !label.is_empty() && label.chars().count() <= 63)");
            w.close();
        }
        _ => {
            // external format checker referenced by the schema; wire in a
            // real implementation before persisting
            w.open(&format!("fn {ident}(_value: &str) -> bool"));
            w.line("true");
            w.close();
        }
    }
    w.line("");
}

fn format_fn_ident(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!("format_is_{}", cleaned.to_lowercase())
}

fn json_literal_text(value: &Value) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "null".to_string())
}

/// True when the whole block needs the unvisited-keys set.
fn block_needs_keys(block: &Block) -> bool {
    block.iter().any(|step| {
        matches!(
            step,
            Step::Properties(_) | Step::PatternProperties(_) | Step::AdditionalProperties(_)
        )
    })
}

fn emit_block(
    w: &mut CodeWriter,
    ctx: &EmitContext,
    vars: &mut VarPool,
    program: &Program,
    block: &Block,
) {
    let keys_var = if block_needs_keys(block) {
        let keys = vars.fresh(&format!("{}_keys", ctx.var));
        w.line(&format!(
            "let mut {keys}: std::collections::BTreeSet<String> = {var}.as_object().map(|o| o.keys().cloned().collect()).unwrap_or_default();",
            var = ctx.var
        ));
        Some(keys)
    } else {
        None
    };
    for step in block {
        emit_step(w, ctx, vars, program, step, keys_var.as_deref());
    }
}

/// Emit a scratch-copy closure run of `block`; returns (copy, result) vars.
fn emit_scratch_run(
    w: &mut CodeWriter,
    ctx: &EmitContext,
    vars: &mut VarPool,
    program: &Program,
    block: &Block,
) -> (String, String) {
    let copy = vars.fresh(&format!("{}_sub", ctx.var));
    w.line(&format!("let mut {copy} = {}.clone();", ctx.var));
    let inner = ctx.scratch(vars);
    let result = vars.fresh(&format!("{copy}_result"));
    w.open(&format!(
        "let {result}: Result<(), ValidationError> = (|{}: &mut Value|",
        inner.var
    ));
    emit_block(w, &inner, vars, program, block);
    w.line("Ok(())");
    w.close_with(&format!(")(&mut {copy});"));
    (copy, result)
}

fn type_failure_condition(types: &[JsonType], float_integer: bool, var: &str) -> String {
    if types.is_empty() {
        return "true".to_string();
    }
    let matches: Vec<String> = types
        .iter()
        .map(|t| match t {
            JsonType::Array => format!("{var}.is_array()"),
            JsonType::Boolean => format!("{var}.is_boolean()"),
            JsonType::Null => format!("{var}.is_null()"),
            JsonType::Object => format!("{var}.is_object()"),
            JsonType::String => format!("{var}.is_string()"),
            JsonType::Number => format!("{var}.is_number()"),
            JsonType::Integer => {
                if float_integer {
                    format!(
                        "({var}.as_i64().is_some() || {var}.as_u64().is_some() || {var}.as_f64().map_or(false, |f| f.fract() == 0.0))"
                    )
                } else {
                    format!("({var}.as_i64().is_some() || {var}.as_u64().is_some())")
                }
            }
        })
        .collect();
    format!("!({})", matches.join(" || "))
}

fn f64_literal(number: &serde_json::Number) -> String {
    format!("{:?}", number.as_f64().unwrap_or(f64::NAN))
}

fn emit_step(
    w: &mut CodeWriter,
    ctx: &EmitContext,
    vars: &mut VarPool,
    program: &Program,
    step: &Step,
    keys: Option<&str>,
) {
    let var = ctx.var.clone();
    match step {
        Step::Fail => {
            w.line(&ctx.fail_stmt("has False boolean schema"));
        }

        Step::Call(name) => {
            w.line(&format!("{name}({var})?;"));
        }

        Step::Type {
            types,
            float_integer,
        } => {
            let expected: Vec<&str> = types.iter().map(JsonType::as_str).collect();
            w.open(&format!(
                "if {}",
                type_failure_condition(types, *float_integer, &var)
            ));
            w.line(&ctx.fail_stmt(&format!("must be {}", expected.join(" or "))));
            w.close();
        }

        Step::Enum(values) => {
            let rendered = json_literal_text(&Value::Array(values.clone()));
            w.open(&format!(
                "if !json_literal(\"{}\").as_array().map_or(false, |allowed| allowed.iter().any(|candidate| json_eq(candidate, {var})))",
                escape_rs(&rendered)
            ));
            w.line(&ctx.fail_stmt(&format!("must be one of {rendered}")));
            w.close();
        }

        Step::Const(expected) => {
            let rendered = json_literal_text(expected);
            w.open(&format!(
                "if !json_eq({var}, &json_literal(\"{}\"))",
                escape_rs(&rendered)
            ));
            w.line(&ctx.fail_stmt("const not valid"));
            w.close();
        }

        Step::AllOf(blocks) => {
            for inner in blocks {
                w.open_bare();
                emit_block(w, ctx, vars, program, inner);
                w.close();
            }
        }

        Step::AnyOf(blocks) => {
            let count = vars.fresh(&format!("{var}_any_of_count"));
            w.line(&format!("let mut {count} = 0u32;"));
            for inner in blocks {
                w.open_bare();
                w.open(&format!("if {count} == 0"));
                let (copy, result) = emit_scratch_run(w, ctx, vars, program, inner);
                w.open(&format!("if {result}.is_ok()"));
                w.line(&format!("*{var} = {copy};"));
                w.line(&format!("{count} += 1;"));
                w.close();
                w.close();
                w.close();
            }
            w.open(&format!("if {count} == 0"));
            w.line(&ctx.fail_stmt("must be valid by one of anyOf definition"));
            w.close();
        }

        Step::OneOf(blocks) => {
            let count = vars.fresh(&format!("{var}_one_of_count"));
            let accepted = vars.fresh(&format!("{var}_one_of_data"));
            w.line(&format!("let mut {count} = 0u32;"));
            w.line(&format!("let mut {accepted}: Option<Value> = None;"));
            for inner in blocks {
                w.open_bare();
                let (copy, result) = emit_scratch_run(w, ctx, vars, program, inner);
                w.open(&format!("if {result}.is_ok()"));
                w.line(&format!("{count} += 1;"));
                w.line(&format!("{accepted} = Some({copy});"));
                w.close();
                w.close();
            }
            w.open(&format!("if {count} != 1"));
            w.line(&ctx.fail_stmt("must be valid exactly by one of oneOf definition"));
            w.close();
            w.open(&format!("if let Some({accepted}_value) = {accepted}"));
            w.line(&format!("*{var} = {accepted}_value;"));
            w.close();
        }

        Step::Not(inner) => {
            let (_, result) = emit_scratch_run(w, ctx, vars, program, inner);
            w.open(&format!("if {result}.is_ok()"));
            w.line(&ctx.fail_stmt("must not be valid by not definition"));
            w.close();
        }

        Step::MinLength(limit) => {
            let text = vars.fresh(&format!("{var}_str"));
            w.open(&format!("if let Some({text}) = {var}.as_str()"));
            w.open(&format!("if ({text}.chars().count() as u64) < {limit}"));
            w.line(&ctx.fail_stmt(&format!(
                "must be longer than or equal to {limit} characters"
            )));
            w.close();
            w.close();
        }

        Step::MaxLength(limit) => {
            let text = vars.fresh(&format!("{var}_str"));
            w.open(&format!("if let Some({text}) = {var}.as_str()"));
            w.open(&format!("if ({text}.chars().count() as u64) > {limit}"));
            w.line(&ctx.fail_stmt(&format!(
                "must be shorter than or equal to {limit} characters"
            )));
            w.close();
            w.close();
        }

        Step::Pattern { pool, pattern } => {
            let text = vars.fresh(&format!("{var}_str"));
            w.open(&format!("if let Some({text}) = {var}.as_str()"));
            w.open(&format!("if !RE_{pool}.is_match({text})"));
            w.line(&ctx.fail_stmt(&format!("must match pattern {pattern}")));
            w.close();
            w.close();
        }

        Step::FormatRegex { pool, name } => {
            let text = vars.fresh(&format!("{var}_str"));
            w.open(&format!("if let Some({text}) = {var}.as_str()"));
            w.open(&format!("if !RE_{pool}.is_match({text})"));
            w.line(&ctx.fail_stmt(&format!("must be {name}")));
            w.close();
            w.close();
        }

        Step::FormatCheck { name } => {
            let text = vars.fresh(&format!("{var}_str"));
            w.open(&format!("if let Some({text}) = {var}.as_str()"));
            w.open(&format!("if !{}({text})", format_fn_ident(name)));
            w.line(&ctx.fail_stmt(&format!("must be a valid {name}")));
            w.close();
            w.close();
        }

        Step::Minimum { limit, exclusive } => {
            let number = vars.fresh(&format!("{var}_num"));
            w.open(&format!("if let Some({number}) = {var}.as_f64()"));
            if *exclusive {
                w.open(&format!("if {number} <= {}", f64_literal(limit)));
                w.line(&ctx.fail_stmt(&format!("must be bigger than {limit}")));
            } else {
                w.open(&format!("if {number} < {}", f64_literal(limit)));
                w.line(&ctx.fail_stmt(&format!("must be bigger than or equal to {limit}")));
            }
            w.close();
            w.close();
        }

        Step::Maximum { limit, exclusive } => {
            let number = vars.fresh(&format!("{var}_num"));
            w.open(&format!("if let Some({number}) = {var}.as_f64()"));
            if *exclusive {
                w.open(&format!("if {number} >= {}", f64_literal(limit)));
                w.line(&ctx.fail_stmt(&format!("must be smaller than {limit}")));
            } else {
                w.open(&format!("if {number} > {}", f64_literal(limit)));
                w.line(&ctx.fail_stmt(&format!(
                    "must be smaller than or equal to {limit}"
                )));
            }
            w.close();
            w.close();
        }

        Step::ExclusiveMinimum { limit } => {
            let number = vars.fresh(&format!("{var}_num"));
            w.open(&format!("if let Some({number}) = {var}.as_f64()"));
            w.open(&format!("if {number} <= {}", f64_literal(limit)));
            w.line(&ctx.fail_stmt(&format!("must be bigger than {limit}")));
            w.close();
            w.close();
        }

        Step::ExclusiveMaximum { limit } => {
            let number = vars.fresh(&format!("{var}_num"));
            w.open(&format!("if let Some({number}) = {var}.as_f64()"));
            w.open(&format!("if {number} >= {}", f64_literal(limit)));
            w.line(&ctx.fail_stmt(&format!("must be smaller than {limit}")));
            w.close();
            w.close();
        }

        Step::MultipleOf { divisor } => {
            let number = vars.fresh(&format!("{var}_num"));
            let quotient = vars.fresh(&format!("{var}_quotient"));
            w.open(&format!("if let Some({number}) = {var}.as_f64()"));
            w.line(&format!(
                "let {quotient} = {number} / {};",
                f64_literal(divisor)
            ));
            w.open(&format!("if {quotient}.trunc() != {quotient}"));
            w.line(&ctx.fail_stmt(&format!("must be multiple of {divisor}")));
            w.close();
            w.close();
        }

        Step::MinItems(limit) => {
            let items = vars.fresh(&format!("{var}_arr"));
            w.open(&format!("if let Some({items}) = {var}.as_array()"));
            w.open(&format!("if ({items}.len() as u64) < {limit}"));
            w.line(&ctx.fail_stmt(&format!("must contain at least {limit} items")));
            w.close();
            w.close();
        }

        Step::MaxItems(limit) => {
            let items = vars.fresh(&format!("{var}_arr"));
            w.open(&format!("if let Some({items}) = {var}.as_array()"));
            w.open(&format!("if ({items}.len() as u64) > {limit}"));
            w.line(&ctx.fail_stmt(&format!(
                "must contain less than or equal to {limit} items"
            )));
            w.close();
            w.close();
        }

        Step::UniqueItems => {
            let items = vars.fresh(&format!("{var}_arr"));
            let i = vars.fresh(&format!("{var}_i"));
            let j = vars.fresh(&format!("{var}_j"));
            w.open(&format!("if let Some({items}) = {var}.as_array()"));
            w.open(&format!("for {i} in 1..{items}.len()"));
            w.open(&format!("for {j} in 0..{i}"));
            w.open(&format!("if json_eq(&{items}[{i}], &{items}[{j}])"));
            w.line(&ctx.fail_stmt("must contain unique items"));
            w.close();
            w.close();
            w.close();
            w.close();
        }

        Step::ItemsAll(inner) => {
            let len = vars.fresh(&format!("{var}_len"));
            let idx = vars.fresh(&format!("{var}_x"));
            w.open(&format!("if {var}.is_array()"));
            w.line(&format!(
                "let {len} = {var}.as_array().map_or(0, |a| a.len());"
            ));
            w.open(&format!("for {idx} in 0..{len}"));
            let child = ctx.element(vars, &idx);
            w.open(&format!("if let Some({}) = {var}.get_mut({idx})", child.var));
            emit_block(w, &child, vars, program, inner);
            w.close();
            w.close();
            w.close();
        }

        Step::ItemsFalse => {
            w.open(&format!(
                "if {var}.as_array().map_or(false, |items| !items.is_empty())"
            ));
            w.line(&ctx.fail_stmt("with False boolean schema"));
            w.close();
        }

        Step::ItemsTuple { items, additional } => {
            let len = vars.fresh(&format!("{var}_len"));
            w.open(&format!("if {var}.is_array()"));
            w.line(&format!(
                "let {len} = {var}.as_array().map_or(0, |a| a.len());"
            ));
            for (idx, item) in items.iter().enumerate() {
                w.open(&format!("if {len} > {idx}"));
                let child = ctx.index(vars, idx);
                w.open(&format!("if let Some({}) = {var}.get_mut({idx})", child.var));
                emit_block(w, &child, vars, program, &item.block);
                w.close();
                if let Some(default) = &item.default {
                    w.close_open("else");
                    let elements = vars.fresh(&format!("{var}_elements"));
                    w.open(&format!(
                        "if let Some({elements}) = {var}.as_array_mut()"
                    ));
                    w.line(&format!(
                        "{elements}.push(json_literal(\"{}\"));",
                        escape_rs(&json_literal_text(default))
                    ));
                    w.close();
                    w.close();
                } else {
                    w.close();
                }
            }
            match additional {
                Some(AdditionalItems::Deny) => {
                    w.open(&format!("if {len} > {}", items.len()));
                    w.line(&ctx.fail_stmt("must contain only specified items"));
                    w.close();
                }
                Some(AdditionalItems::Schema(inner)) => {
                    let idx = vars.fresh(&format!("{var}_x"));
                    w.open(&format!("for {idx} in {}..{len}", items.len()));
                    let child = ctx.element(vars, &idx);
                    w.open(&format!("if let Some({}) = {var}.get_mut({idx})", child.var));
                    emit_block(w, &child, vars, program, inner);
                    w.close();
                    w.close();
                }
                None => {}
            }
            w.close();
        }

        Step::MinProperties(limit) => {
            let object = vars.fresh(&format!("{var}_obj"));
            w.open(&format!("if let Some({object}) = {var}.as_object()"));
            w.open(&format!("if ({object}.len() as u64) < {limit}"));
            w.line(&ctx.fail_stmt(&format!(
                "must contain at least {limit} properties"
            )));
            w.close();
            w.close();
        }

        Step::MaxProperties(limit) => {
            let object = vars.fresh(&format!("{var}_obj"));
            w.open(&format!("if let Some({object}) = {var}.as_object()"));
            w.open(&format!("if ({object}.len() as u64) > {limit}"));
            w.line(&ctx.fail_stmt(&format!(
                "must contain less than or equal to {limit} properties"
            )));
            w.close();
            w.close();
        }

        Step::Required(required) => {
            let object = vars.fresh(&format!("{var}_obj"));
            w.open(&format!("if let Some({object}) = {var}.as_object()"));
            let all = required
                .iter()
                .map(|key| format!("{object}.contains_key(\"{}\")", escape_rs(key)))
                .collect::<Vec<_>>()
                .join(" && ");
            w.open(&format!("if !({all})"));
            w.line(&ctx.fail_stmt(&format!("must contain {required:?} properties")));
            w.close();
            w.close();
        }

        Step::Properties(rules) => {
            w.open(&format!("if {var}.is_object()"));
            for rule in rules {
                let key = escape_rs(&rule.key);
                w.open(&format!("if {var}.get(\"{key}\").is_some()"));
                if let Some(keys) = keys {
                    w.line(&format!("{keys}.remove(\"{key}\");"));
                }
                let child = ctx.prop(vars, &rule.key);
                w.open(&format!(
                    "if let Some({}) = {var}.get_mut(\"{key}\")",
                    child.var
                ));
                emit_block(w, &child, vars, program, &rule.block);
                w.close();
                if let Some(default) = &rule.default {
                    w.close_open("else");
                    let object = vars.fresh(&format!("{var}_object"));
                    w.open(&format!("if let Some({object}) = {var}.as_object_mut()"));
                    w.line(&format!(
                        "{object}.insert(\"{key}\".to_string(), json_literal(\"{}\"));",
                        escape_rs(&json_literal_text(default))
                    ));
                    w.close();
                    w.close();
                } else {
                    w.close();
                }
            }
            w.close();
        }

        Step::PatternProperties(rules) => {
            let prop_keys = vars.fresh(&format!("{var}_prop_keys"));
            let key = vars.fresh(&format!("{var}_key"));
            w.open(&format!("if {var}.is_object()"));
            w.line(&format!(
                "let {prop_keys}: Vec<String> = {var}.as_object().map(|o| o.keys().cloned().collect()).unwrap_or_default();"
            ));
            w.open(&format!("for {key} in &{prop_keys}"));
            for (pool, _, inner) in rules {
                w.open(&format!("if RE_{pool}.is_match({key})"));
                if let Some(keys) = keys {
                    w.line(&format!("{keys}.remove({key}.as_str());"));
                }
                let child = ctx.keyed(vars, &key);
                w.open(&format!(
                    "if let Some({}) = {var}.get_mut({key}.as_str())",
                    child.var
                ));
                emit_block(w, &child, vars, program, inner);
                w.close();
                w.close();
            }
            w.close();
            w.close();
        }

        Step::AdditionalProperties(handling) => {
            let keys = match keys {
                Some(keys) => keys.to_string(),
                None => return,
            };
            w.open(&format!("if {var}.is_object()"));
            match handling {
                None => {
                    w.open(&format!("if !{keys}.is_empty()"));
                    w.line(&ctx.fail_stmt("must contain only specified properties"));
                    w.close();
                }
                Some(inner) => {
                    let extra = vars.fresh(&format!("{var}_extra"));
                    let key = vars.fresh(&format!("{var}_key"));
                    w.line(&format!(
                        "let {extra}: Vec<String> = {keys}.iter().cloned().collect();"
                    ));
                    w.open(&format!("for {key} in &{extra}"));
                    let child = ctx.keyed(vars, &key);
                    w.open(&format!(
                        "if let Some({}) = {var}.get_mut({key}.as_str())",
                        child.var
                    ));
                    emit_block(w, &child, vars, program, inner);
                    w.close();
                    w.close();
                }
            }
            w.close();
        }

        Step::Dependencies(rules) => {
            w.open(&format!("if {var}.is_object()"));
            for (trigger, rule) in rules {
                let trigger_escaped = escape_rs(trigger);
                w.open(&format!("if {var}.get(\"{trigger_escaped}\").is_some()"));
                match rule {
                    DependencyRule::Keys(needed) => {
                        for wanted in needed {
                            w.open(&format!(
                                "if {var}.get(\"{}\").is_none()",
                                escape_rs(wanted)
                            ));
                            w.line(&ctx.fail_stmt(&format!(
                                "missing dependency {wanted} for {trigger}"
                            )));
                            w.close();
                        }
                    }
                    DependencyRule::Schema(inner) => {
                        w.open_bare();
                        emit_block(w, ctx, vars, program, inner);
                        w.close();
                    }
                    DependencyRule::Fail => {
                        w.line(&ctx.fail_stmt("with false schema"));
                    }
                }
                w.close();
            }
            w.close();
        }

        Step::PropertyNames(rule) => match rule {
            PropertyNamesRule::DenyNonEmpty => {
                w.open(&format!(
                    "if {var}.as_object().map_or(false, |o| !o.is_empty())"
                ));
                w.line(&ctx.fail_stmt("propertyNames with boolean schema false"));
                w.close();
            }
            PropertyNamesRule::Procedure(procedure) => {
                let names = vars.fresh(&format!("{var}_names"));
                let key = vars.fresh(&format!("{var}_name"));
                let probe = vars.fresh(&format!("{var}_name_value"));
                w.open(&format!("if {var}.is_object()"));
                w.line(&format!(
                    "let {names}: Vec<String> = {var}.as_object().map(|o| o.keys().cloned().collect()).unwrap_or_default();"
                ));
                w.open(&format!("for {key} in &{names}"));
                w.line(&format!("let mut {probe} = Value::String({key}.clone());"));
                w.open(&format!("if {procedure}(&mut {probe}).is_err()"));
                w.line(&ctx.fail_stmt("must contain only properties with correct name"));
                w.close();
                w.close();
                w.close();
            }
        },

        Step::Contains(rule) => {
            w.open(&format!("if {var}.is_array()"));
            match rule {
                ContainsRule::AlwaysFail => {
                    w.line(&ctx.fail_stmt("has False boolean schema"));
                }
                ContainsRule::NonEmpty => {
                    w.open(&format!(
                        "if {var}.as_array().map_or(true, |a| a.is_empty())"
                    ));
                    w.line(&ctx.fail_stmt("contains empty array is invalid"));
                    w.close();
                }
                ContainsRule::Procedure(procedure) => {
                    w.open(&format!(
                        "if {var}.as_array().map_or(true, |a| a.is_empty())"
                    ));
                    w.line(&ctx.fail_stmt("contains empty array is invalid"));
                    w.close();
                    let found = vars.fresh(&format!("{var}_found"));
                    let len = vars.fresh(&format!("{var}_len"));
                    let idx = vars.fresh(&format!("{var}_x"));
                    let probe = vars.fresh(&format!("{var}_candidate"));
                    w.line(&format!("let mut {found} = false;"));
                    w.line(&format!(
                        "let {len} = {var}.as_array().map_or(0, |a| a.len());"
                    ));
                    w.open(&format!("for {idx} in 0..{len}"));
                    w.line(&format!(
                        "let mut {probe} = {var}.get({idx}).cloned().unwrap_or(Value::Null);"
                    ));
                    w.open(&format!("if {procedure}(&mut {probe}).is_ok()"));
                    w.line(&format!("{found} = true;"));
                    w.close();
                    w.close();
                    w.open(&format!("if !{found}"));
                    w.line(&ctx.fail_stmt("must contain at least some defined thing"));
                    w.close();
                }
            }
            w.close();
        }

        Step::IfThenElse {
            condition,
            then_block,
            else_block,
        } => {
            let (_, result) = emit_scratch_run(w, ctx, vars, program, condition);
            match (then_block, else_block) {
                (Some(then_steps), Some(else_steps)) => {
                    w.open(&format!("if {result}.is_ok()"));
                    emit_block(w, ctx, vars, program, then_steps);
                    w.close_open("else");
                    emit_block(w, ctx, vars, program, else_steps);
                    w.close();
                }
                (Some(then_steps), None) => {
                    w.open(&format!("if {result}.is_ok()"));
                    emit_block(w, ctx, vars, program, then_steps);
                    w.close();
                }
                (None, Some(else_steps)) => {
                    w.open(&format!("if {result}.is_err()"));
                    emit_block(w, ctx, vars, program, else_steps);
                    w.close();
                }
                (None, None) => {}
            }
        }

        Step::ContentEncodingBase64 => {
            let raw = vars.fresh(&format!("{var}_raw"));
            let text = vars.fresh(&format!("{var}_decoded"));
            w.open(&format!("if {var}.is_string()"));
            w.line(&format!(
                "let {raw} = {var}.as_str().unwrap_or_default().to_string();"
            ));
            w.open(&format!("match decode_base64(&{raw})"));
            w.line(&format!(
                "Some({text}) if !{text}.is_empty() => {{ *{var} = Value::String({text}); }}"
            ));
            w.line(&format!(
                "_ => {{ {} }}",
                ctx.fail_stmt("invalid content encoding")
            ));
            w.close();
            w.close();
        }

        Step::ContentMediaTypeJson => {
            let raw = vars.fresh(&format!("{var}_raw"));
            let parsed = vars.fresh(&format!("{var}_parsed"));
            w.open(&format!("if {var}.is_string()"));
            w.line(&format!(
                "let {raw} = {var}.as_str().unwrap_or_default().to_string();"
            ));
            w.open(&format!("match serde_json::from_str::<Value>(&{raw})"));
            w.line(&format!("Ok({parsed}) => {{ *{var} = {parsed}; }}"));
            w.line(&format!(
                "Err(_) => {{ {} }}",
                ctx.fail_stmt("invalid json content")
            ));
            w.close();
            w.close();
        }
    }
}
