// Copyright (c) 2025 Arazzo Engine Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The execution context: a nested, JSON-kinded store that runtime
//! expressions resolve against.
//!
//! Exclusively owned by one running workflow instance — no sharing across
//! concurrent runs. Mutated only by the step runner (response capture,
//! output extraction) and the orchestrator (workflow output capture).

use serde_json::{Map, Value};

/// Root keys of the execution context tree.
const KEY_INPUTS: &str = "inputs";
const KEY_SOURCE_DESCRIPTIONS: &str = "sourceDescriptions";
const KEY_COMPONENTS: &str = "components";
const KEY_WORKFLOWS: &str = "workflows";
const KEY_STEPS: &str = "steps";
const KEY_URL: &str = "url";
const KEY_METHOD: &str = "method";
const KEY_STATUS_CODE: &str = "statusCode";
const KEY_RESPONSE: &str = "response";
const KEY_HEADERS: &str = "headers";

/// The nested execution context described by the document model: a JSON
/// object root with `inputs`, `sourceDescriptions`, `components`, per-workflow
/// `outputs`, per-step `outputs`, and a per-step response slot that is
/// overwritten at each step entry.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    root: Value,
}

impl ExecutionContext {
    /// Builds a fresh context for a new workflow run.
    pub fn new(inputs: Value, source_descriptions: Value, components: Value) -> Self {
        let mut root = Map::new();
        root.insert(KEY_INPUTS.to_string(), inputs);
        root.insert(KEY_SOURCE_DESCRIPTIONS.to_string(), source_descriptions);
        root.insert(KEY_COMPONENTS.to_string(), components);
        root.insert(KEY_WORKFLOWS.to_string(), Value::Object(Map::new()));
        root.insert(KEY_STEPS.to_string(), Value::Object(Map::new()));
        Self { root: Value::Object(root) }
    }

    /// Builds a child context for a sub-workflow invocation, seeded from the
    /// parent's `sourceDescriptions`/`components` but with fresh inputs and
    /// no inherited step/workflow history.
    pub fn child(&self, inputs: Value) -> Self {
        Self::new(
            inputs,
            self.root.get(KEY_SOURCE_DESCRIPTIONS).cloned().unwrap_or(Value::Null),
            self.root.get(KEY_COMPONENTS).cloned().unwrap_or(Value::Null),
        )
    }

    /// The full tree, as resolved against by the expression evaluator.
    pub fn root(&self) -> &Value {
        &self.root
    }

    pub fn inputs(&self) -> &Value {
        self.root.get(KEY_INPUTS).unwrap_or(&Value::Null)
    }

    pub fn components(&self) -> &Value {
        self.root.get(KEY_COMPONENTS).unwrap_or(&Value::Null)
    }

    /// Overwrites the current step's `url`/`method`/`statusCode`/`response`/
    /// `headers` slot. Called once per step entry; prior values are not
    /// retained — historical access is exclusively via `steps.<id>.outputs`.
    ///
    /// `response` is stored as `{body, headers}`, not the raw body value, so
    /// that `$response.body.*` and `$response.headers.*` expressions resolve
    /// the way the document format expects; `headers` is additionally kept
    /// at its own top-level key.
    pub fn set_current_response(
        &mut self,
        url: String,
        method: String,
        status_code: u16,
        response_body: Value,
        headers: Value,
    ) {
        let mut response = Map::new();
        response.insert("body".to_string(), response_body);
        response.insert("headers".to_string(), headers.clone());

        let root = self.root_object_mut();
        root.insert(KEY_URL.to_string(), Value::String(url));
        root.insert(KEY_METHOD.to_string(), Value::String(method));
        root.insert(KEY_STATUS_CODE.to_string(), Value::from(status_code));
        root.insert(KEY_RESPONSE.to_string(), Value::Object(response));
        root.insert(KEY_HEADERS.to_string(), headers);
    }

    /// Records one named output for `step_id`. Subsequent steps observe it
    /// at `$steps.<step_id>.outputs.<name>`.
    pub fn set_step_output(&mut self, step_id: &str, name: &str, value: Value) {
        let steps = self.section_mut(KEY_STEPS);
        let entry = steps
            .entry(step_id.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        let outputs = entry
            .as_object_mut()
            .expect("step entries are always objects")
            .entry("outputs".to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        outputs
            .as_object_mut()
            .expect("outputs is always an object")
            .insert(name.to_string(), value);
    }

    /// All outputs recorded so far for `step_id`, if any ran.
    pub fn step_outputs(&self, step_id: &str) -> Option<&Value> {
        self.root
            .get(KEY_STEPS)?
            .get(step_id)?
            .get("outputs")
    }

    /// Records one named output for `workflow_id`, captured once the
    /// workflow reaches a natural end.
    pub fn set_workflow_output(&mut self, workflow_id: &str, name: &str, value: Value) {
        let workflows = self.section_mut(KEY_WORKFLOWS);
        let entry = workflows
            .entry(workflow_id.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        let outputs = entry
            .as_object_mut()
            .expect("workflow entries are always objects")
            .entry("outputs".to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        outputs
            .as_object_mut()
            .expect("outputs is always an object")
            .insert(name.to_string(), value);
    }

    /// All outputs recorded for `workflow_id`.
    pub fn workflow_outputs(&self, workflow_id: &str) -> Value {
        self.root
            .get(KEY_WORKFLOWS)
            .and_then(|w| w.get(workflow_id))
            .and_then(|w| w.get("outputs"))
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new()))
    }

    fn root_object_mut(&mut self) -> &mut Map<String, Value> {
        self.root.as_object_mut().expect("context root is always an object")
    }

    fn section_mut(&mut self, key: &str) -> &mut Map<String, Value> {
        self.root_object_mut()
            .entry(key.to_string())
            .or_insert_with(|| Value::Object(Map::new()))
            .as_object_mut()
            .expect("context sections are always objects")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn records_and_reads_step_outputs() {
        let mut ctx = ExecutionContext::new(json!({}), json!({}), json!({}));
        ctx.set_step_output("login", "sessionToken", json!("tok-abc"));
        assert_eq!(
            ctx.step_outputs("login").unwrap().get("sessionToken").unwrap(),
            &json!("tok-abc")
        );
    }

    #[test]
    fn overwrites_response_slot_each_step() {
        let mut ctx = ExecutionContext::new(json!({}), json!({}), json!({}));
        ctx.set_current_response(
            "https://a".into(),
            "GET".into(),
            200,
            json!({"count": 1}),
            json!({}),
        );
        ctx.set_current_response(
            "https://b".into(),
            "POST".into(),
            201,
            json!({"count": 2}),
            json!({}),
        );
        assert_eq!(ctx.root().get("statusCode").unwrap(), &json!(201));
        assert_eq!(ctx.root().get("url").unwrap(), &json!("https://b"));
        assert_eq!(
            ctx.root().get("response").unwrap().get("body").unwrap(),
            &json!({"count": 2})
        );
    }

    #[test]
    fn child_context_inherits_components_not_history() {
        let mut parent = ExecutionContext::new(json!({}), json!({}), json!({"x": 1}));
        parent.set_step_output("a", "out", json!(1));
        let child = parent.child(json!({"y": 2}));
        assert_eq!(child.components(), &json!({"x": 1}));
        assert_eq!(child.inputs(), &json!({"y": 2}));
        assert!(child.step_outputs("a").is_none());
    }
}
