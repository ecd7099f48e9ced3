// Copyright (c) 2025 Arazzo Engine Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Criterion evaluation (C4): `simple`, `regex`, `jsonpath`, and the
//! unconditionally unsupported `xpath` dialect.

use jsonpath_rust::JsonPathQuery;
use regex::Regex;
use serde_json::Value;

use crate::context::ExecutionContext;
use crate::error::{ArazzoError, Result};
use crate::expression::Expression;
use crate::model::{Criterion, CriterionType};

/// Comparison operators recognized by simple-evaluate, ordered so the
/// longest-matching token is tried first (`==` before `=`, `<=` before `<`).
const OPERATORS: &[&str] = &["==", "!=", "<=", ">=", "<", ">"];

pub struct CriterionEvaluator {
    expression: Expression,
}

impl Default for CriterionEvaluator {
    fn default() -> Self {
        Self { expression: Expression::default() }
    }
}

impl CriterionEvaluator {
    pub fn new(expression: Expression) -> Self {
        Self { expression }
    }

    pub fn evaluate(&self, criterion: &Criterion, ctx: &ExecutionContext) -> Result<bool> {
        match criterion.dialect() {
            CriterionType::Simple => self.evaluate_simple(&criterion.condition, ctx),
            CriterionType::Regex => self.evaluate_regex(criterion, ctx),
            CriterionType::Jsonpath => self.evaluate_jsonpath(criterion, ctx),
            CriterionType::Xpath => Err(ArazzoError::criterion(
                "the xpath criterion dialect is not implemented",
            )),
        }
    }

    fn evaluate_simple(&self, condition: &str, ctx: &ExecutionContext) -> Result<bool> {
        let trimmed = condition.trim();
        if is_bare_path(trimmed) {
            let value = self.expression.evaluate(trimmed, ctx)?;
            return Ok(truthy(&value));
        }
        let (op, lhs_text, rhs_text) = split_comparison(trimmed)
            .ok_or_else(|| ArazzoError::criterion(format!("malformed condition '{condition}'")))?;
        let lhs = self.resolve_operand(lhs_text, ctx)?;
        let rhs = self.resolve_operand(rhs_text, ctx)?;
        compare(op, &lhs, &rhs)
    }

    fn resolve_operand(&self, text: &str, ctx: &ExecutionContext) -> Result<Value> {
        let trimmed = text.trim();
        if let Some(stripped) = trimmed.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')) {
            return Ok(Value::String(stripped.to_string()));
        }
        if is_numeric_literal(trimmed) {
            return Ok(parse_numeric(trimmed));
        }
        self.expression.evaluate(trimmed, ctx)
    }

    fn evaluate_regex(&self, criterion: &Criterion, ctx: &ExecutionContext) -> Result<bool> {
        let datum = self.resolve_context(criterion, ctx)?;
        let text = datum.as_str().ok_or_else(|| {
            ArazzoError::criterion("regex criterion context resolved to null or a non-string")
        })?;
        let re = Regex::new(&criterion.condition)
            .map_err(|e| ArazzoError::criterion(format!("invalid regex: {e}")))?;
        Ok(re.is_match(text))
    }

    fn evaluate_jsonpath(&self, criterion: &Criterion, ctx: &ExecutionContext) -> Result<bool> {
        let datum = self.resolve_context(criterion, ctx)?;
        let matches = datum
            .path(&criterion.condition)
            .map_err(|e| ArazzoError::criterion(format!("invalid jsonpath: {e}")))?;
        let non_empty = matches.as_array().map(|a| !a.is_empty()).unwrap_or(!matches.is_null());
        Ok(non_empty)
    }

    fn resolve_context(&self, criterion: &Criterion, ctx: &ExecutionContext) -> Result<Value> {
        let expr = criterion.context.as_deref().unwrap_or("$response.body");
        self.expression.evaluate(expr, ctx)
    }
}

/// `true` if `condition` is a bare runtime expression path with no operator,
/// e.g. `$response.statusCode`.
fn is_bare_path(condition: &str) -> bool {
    if !condition.starts_with('$') {
        return false;
    }
    condition[1..].chars().all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_')
}

fn is_numeric_literal(text: &str) -> bool {
    if text.is_empty() {
        return false;
    }
    let mut seen_dot = false;
    let mut chars = text.chars().peekable();
    if chars.peek() == Some(&'-') {
        chars.next();
    }
    let mut any_digit = false;
    for c in chars {
        if c.is_ascii_digit() {
            any_digit = true;
        } else if c == '.' && !seen_dot {
            seen_dot = true;
        } else {
            return false;
        }
    }
    any_digit
}

fn parse_numeric(text: &str) -> Value {
    if text.contains('.') {
        Value::from(text.parse::<f64>().unwrap_or(0.0))
    } else {
        Value::from(text.parse::<i64>().unwrap_or(0))
    }
}

/// Splits on the first (leftmost), longest-matching operator in
/// `OPERATORS`. This is the deliberate divergence from a naive
/// first-character split: `!=` is never mistaken for a unary `!` nor `<=`
/// for `<` followed by a stray `=`.
fn split_comparison(condition: &str) -> Option<(&'static str, &str, &str)> {
    let mut best: Option<(usize, &'static str)> = None;
    for op in OPERATORS {
        if let Some(pos) = condition.find(op) {
            match best {
                Some((best_pos, best_op)) if pos > best_pos || (pos == best_pos && op.len() <= best_op.len()) => {}
                _ => best = Some((pos, op)),
            }
        }
    }
    let (pos, op) = best?;
    let (lhs, rest) = condition.split_at(pos);
    let rhs = &rest[op.len()..];
    Some((op, lhs, rhs))
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn compare(op: &str, lhs: &Value, rhs: &Value) -> Result<bool> {
    match op {
        "==" => Ok(lhs == rhs),
        "!=" => Ok(lhs != rhs),
        "<" | ">" | "<=" | ">=" => {
            let (l, r) = (
                lhs.as_f64().ok_or_else(|| operand_type_error(lhs))?,
                rhs.as_f64().ok_or_else(|| operand_type_error(rhs))?,
            );
            Ok(match op {
                "<" => l < r,
                ">" => l > r,
                "<=" => l <= r,
                ">=" => l >= r,
                _ => unreachable!(),
            })
        }
        _ => Err(ArazzoError::criterion(format!("unknown operator '{op}'"))),
    }
}

fn operand_type_error(value: &Value) -> ArazzoError {
    ArazzoError::criterion(format!(
        "ordering comparison requires numeric operands, got {value}"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx_with_status(code: u16) -> ExecutionContext {
        let mut ctx = ExecutionContext::new(json!({}), json!({}), json!({}));
        ctx.set_current_response("https://x".into(), "GET".into(), code, json!({"ok": true}), json!({}));
        ctx
    }

    #[test]
    fn bare_path_truthy() {
        let eval = CriterionEvaluator::default();
        let crit = Criterion { context: None, condition: "$response.body.ok".into(), criterion_type: None };
        assert!(eval.evaluate(&crit, &ctx_with_status(200)).unwrap());
    }

    #[test]
    fn numeric_equality_comparison() {
        let eval = CriterionEvaluator::default();
        let crit = Criterion {
            context: None,
            condition: "$statusCode == 200".into(),
            criterion_type: None,
        };
        assert!(eval.evaluate(&crit, &ctx_with_status(200)).unwrap());
    }

    #[test]
    fn not_equal_operator_is_not_confused_with_bang() {
        let eval = CriterionEvaluator::default();
        let crit = Criterion {
            context: None,
            condition: "$statusCode != 404".into(),
            criterion_type: None,
        };
        assert!(eval.evaluate(&crit, &ctx_with_status(200)).unwrap());
    }

    #[test]
    fn less_equal_operator_parses_before_less_than() {
        let eval = CriterionEvaluator::default();
        let crit = Criterion {
            context: None,
            condition: "$statusCode <= 200".into(),
            criterion_type: None,
        };
        assert!(eval.evaluate(&crit, &ctx_with_status(200)).unwrap());
    }

    #[test]
    fn string_literal_comparison() {
        let eval = CriterionEvaluator::default();
        let crit = Criterion {
            context: None,
            condition: "$method == 'GET'".into(),
            criterion_type: None,
        };
        assert!(eval.evaluate(&crit, &ctx_with_status(200)).unwrap());
    }

    #[test]
    fn ordering_on_mismatched_types_errors() {
        let eval = CriterionEvaluator::default();
        let crit = Criterion {
            context: None,
            condition: "$method > 5".into(),
            criterion_type: None,
        };
        assert!(eval.evaluate(&crit, &ctx_with_status(200)).is_err());
    }

    #[test]
    fn regex_dialect_matches_response_context() {
        let eval = CriterionEvaluator::default();
        let mut ctx = ExecutionContext::new(json!({}), json!({}), json!({}));
        ctx.set_current_response("https://x".into(), "GET".into(), 200, json!("tok-abc"), json!({}));
        let crit = Criterion {
            context: Some("$response.body".into()),
            condition: "^tok-".into(),
            criterion_type: Some(CriterionType::Regex),
        };
        assert!(eval.evaluate(&crit, &ctx).unwrap());
    }

    #[test]
    fn jsonpath_dialect_checks_match_count() {
        let eval = CriterionEvaluator::default();
        let mut ctx = ExecutionContext::new(json!({}), json!({}), json!({}));
        ctx.set_current_response(
            "https://x".into(),
            "GET".into(),
            200,
            json!({"pets": [{"id": 1}, {"id": 2}]}),
            json!({}),
        );
        let crit = Criterion {
            context: Some("$response.body".into()),
            condition: "$.pets[?(@.id == 2)]".into(),
            criterion_type: Some(CriterionType::Jsonpath),
        };
        assert!(eval.evaluate(&crit, &ctx).unwrap());
    }

    #[test]
    fn xpath_dialect_is_unsupported() {
        let eval = CriterionEvaluator::default();
        let crit = Criterion {
            context: Some("$response".into()),
            condition: "/pets".into(),
            criterion_type: Some(CriterionType::Xpath),
        };
        assert!(eval.evaluate(&crit, &ctx_with_status(200)).is_err());
    }
}
