// Copyright (c) 2025 Arazzo Engine Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed in-memory representation of an Arazzo document.
//!
//! This is C1 in the engine's component breakdown: a read-only tree built
//! once at load time and never mutated during execution. Unknown fields are
//! ignored on load (`extensions` below captures them for round-tripping);
//! required-field and cross-reference violations surface as
//! [`ArazzoError::DocumentInvalid`].

use std::collections::{HashMap, HashSet};

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ArazzoError, Result};

/// Root of a parsed Arazzo document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    #[serde(rename = "arazzo")]
    pub arazzo_version: String,
    pub info: Info,
    pub source_descriptions: Vec<SourceDescription>,
    pub workflows: Vec<Workflow>,
    #[serde(default)]
    pub components: Value,
    #[serde(flatten)]
    pub extensions: Map<String, Value>,
}

impl Document {
    /// Parses a document from YAML text.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let doc: Document = serde_yaml::from_str(yaml)
            .map_err(|e| ArazzoError::document_invalid("$", e.to_string()))?;
        doc.validate()?;
        Ok(doc)
    }

    /// Parses a document from JSON text.
    pub fn from_json(json: &str) -> Result<Self> {
        let doc: Document = serde_json::from_str(json)
            .map_err(|e| ArazzoError::document_invalid("$", e.to_string()))?;
        doc.validate()?;
        Ok(doc)
    }

    /// Looks up a workflow by id.
    pub fn workflow(&self, workflow_id: &str) -> Option<&Workflow> {
        self.workflows.iter().find(|w| w.workflow_id == workflow_id)
    }

    /// Structural validation: unique ids, resolvable `dependsOn`, acyclic
    /// dependency graph, unique source description names, exactly-one
    /// invocation target per step, well-formed `goto`/`retry` actions.
    pub fn validate(&self) -> Result<()> {
        validate_source_descriptions(&self.source_descriptions)?;

        let workflow_ids: HashSet<&str> =
            self.workflows.iter().map(|w| w.workflow_id.as_str()).collect();
        if workflow_ids.len() != self.workflows.len() {
            return Err(ArazzoError::document_invalid(
                "$.workflows",
                "workflowId values must be unique within the document",
            ));
        }

        for workflow in &self.workflows {
            if workflow.steps.is_empty() {
                return Err(ArazzoError::document_invalid(
                    format!("$.workflows[{}].steps", workflow.workflow_id),
                    "a workflow must declare at least one step",
                ));
            }

            for dep in &workflow.depends_on {
                if !workflow_ids.contains(dep.as_str()) {
                    return Err(ArazzoError::document_invalid(
                        format!("$.workflows[{}].dependsOn", workflow.workflow_id),
                        format!("unknown workflow dependency '{dep}'"),
                    ));
                }
            }

            let step_ids: HashSet<&str> =
                workflow.steps.iter().map(|s| s.step_id.as_str()).collect();
            if step_ids.len() != workflow.steps.len() {
                return Err(ArazzoError::document_invalid(
                    format!("$.workflows[{}].steps", workflow.workflow_id),
                    "stepId values must be unique within a workflow",
                ));
            }

            for step in &workflow.steps {
                step.validate_invocation_target(&workflow.workflow_id)?;
                for action in &step.on_success {
                    if let SuccessActionOrReusable::Inline(a) = action {
                        a.validate(&workflow.workflow_id, step)?;
                    }
                }
                for action in &step.on_failure {
                    if let FailureActionOrReusable::Inline(a) = action {
                        a.validate(&workflow.workflow_id, step)?;
                    }
                }
            }
        }

        detect_dependency_cycle(&self.workflows)?;
        Ok(())
    }
}

fn validate_source_descriptions(sources: &[SourceDescription]) -> Result<()> {
    let name_pattern = Regex::new(r"^[A-Za-z0-9_-]+$").expect("static pattern compiles");
    let mut seen = HashSet::new();
    for source in sources {
        if !name_pattern.is_match(&source.name) {
            return Err(ArazzoError::document_invalid(
                "$.sourceDescriptions",
                format!("source description name '{}' is not `[A-Za-z0-9_-]+`", source.name),
            ));
        }
        if !seen.insert(source.name.as_str()) {
            return Err(ArazzoError::document_invalid(
                "$.sourceDescriptions",
                format!("duplicate source description name '{}'", source.name),
            ));
        }
    }
    Ok(())
}

fn detect_dependency_cycle(workflows: &[Workflow]) -> Result<()> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Unvisited,
        Visiting,
        Done,
    }

    let by_id: HashMap<&str, &Workflow> =
        workflows.iter().map(|w| (w.workflow_id.as_str(), w)).collect();
    let mut marks: HashMap<&str, Mark> =
        workflows.iter().map(|w| (w.workflow_id.as_str(), Mark::Unvisited)).collect();

    fn visit<'a>(
        id: &'a str,
        by_id: &HashMap<&'a str, &'a Workflow>,
        marks: &mut HashMap<&'a str, Mark>,
    ) -> Result<()> {
        match marks.get(id) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::Visiting) => {
                return Err(ArazzoError::document_invalid(
                    "$.workflows[*].dependsOn",
                    format!("dependency cycle detected at workflow '{id}'"),
                ))
            }
            _ => {}
        }
        marks.insert(id, Mark::Visiting);
        if let Some(workflow) = by_id.get(id) {
            for dep in &workflow.depends_on {
                visit(dep.as_str(), by_id, marks)?;
            }
        }
        marks.insert(id, Mark::Done);
        Ok(())
    }

    for id in by_id.keys() {
        visit(id, &by_id, &mut marks)?;
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Info {
    pub title: String,
    pub version: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceDescription {
    pub name: String,
    pub url: String,
    #[serde(rename = "type")]
    pub source_type: SourceType,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Openapi,
    Arazzo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    pub workflow_id: String,
    #[serde(default)]
    pub inputs_schema: Option<Value>,
    #[serde(default)]
    pub depends_on: Vec<String>,
    pub steps: Vec<Step>,
    #[serde(default)]
    pub success_actions: Vec<SuccessActionOrReusable>,
    #[serde(default)]
    pub failure_actions: Vec<FailureActionOrReusable>,
    /// Maps a friendly output name to the runtime expression that produces it.
    #[serde(default)]
    pub outputs: HashMap<String, String>,
    #[serde(default)]
    pub parameters: Vec<ParameterOrReusable>,
    #[serde(flatten)]
    pub extensions: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub step_id: String,
    #[serde(default)]
    pub operation_id: Option<String>,
    #[serde(default)]
    pub operation_path: Option<String>,
    #[serde(default)]
    pub workflow_id: Option<String>,
    #[serde(default)]
    pub parameters: Vec<ParameterOrReusable>,
    #[serde(default)]
    pub request_body: Option<RequestBody>,
    #[serde(default)]
    pub success_criteria: Vec<Criterion>,
    #[serde(default)]
    pub on_success: Vec<SuccessActionOrReusable>,
    #[serde(default)]
    pub on_failure: Vec<FailureActionOrReusable>,
    /// Maps an output name to the runtime expression that produces it.
    #[serde(default)]
    pub outputs: HashMap<String, String>,
    #[serde(flatten)]
    pub extensions: Map<String, Value>,
}

impl Step {
    /// A step must name exactly one of `operationId`, `operationPath`,
    /// `workflowId` as its invocation target.
    fn validate_invocation_target(&self, workflow_id: &str) -> Result<()> {
        let set = [
            self.operation_id.is_some(),
            self.operation_path.is_some(),
            self.workflow_id.is_some(),
        ];
        if set.iter().filter(|present| **present).count() != 1 {
            return Err(ArazzoError::document_invalid(
                format!("$.workflows[{workflow_id}].steps[{}]", self.step_id),
                "exactly one of operationId, operationPath, or workflowId must be set",
            ));
        }
        Ok(())
    }

    /// The invocation target this step names.
    pub fn invocation_target(&self) -> InvocationTarget<'_> {
        if let Some(op_id) = &self.operation_id {
            InvocationTarget::OperationId(op_id)
        } else if let Some(op_path) = &self.operation_path {
            InvocationTarget::OperationPath(op_path)
        } else if let Some(wf_id) = &self.workflow_id {
            InvocationTarget::Workflow(wf_id)
        } else {
            // Unreachable once `validate` has run, but validation is not
            // re-checked on every access; fall back rather than panic.
            InvocationTarget::OperationId("")
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum InvocationTarget<'a> {
    OperationId(&'a str),
    OperationPath(&'a str),
    Workflow(&'a str),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "in")]
    pub location: ParameterLocation,
    pub value: Value,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ParameterLocation {
    Path,
    Query,
    Header,
    Cookie,
    Body,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestBody {
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub payload: Value,
    #[serde(default)]
    pub replacements: Vec<PayloadReplacement>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayloadReplacement {
    /// A JSON Pointer (RFC 6901) into the rendered payload.
    pub target: String,
    pub value: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Criterion {
    #[serde(default)]
    pub context: Option<String>,
    pub condition: String,
    #[serde(default, rename = "type")]
    pub criterion_type: Option<CriterionType>,
}

impl Criterion {
    pub fn dialect(&self) -> CriterionType {
        self.criterion_type.unwrap_or(CriterionType::Simple)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CriterionType {
    Simple,
    Regex,
    Jsonpath,
    Xpath,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuccessAction {
    pub name: String,
    #[serde(rename = "type")]
    pub action_type: SuccessActionType,
    #[serde(default)]
    pub workflow_id: Option<String>,
    #[serde(default)]
    pub step_id: Option<String>,
    #[serde(default)]
    pub criteria: Vec<Criterion>,
}

impl SuccessAction {
    fn validate(&self, workflow_id: &str, step: &Step) -> Result<()> {
        if self.action_type == SuccessActionType::Goto
            && (self.workflow_id.is_some() as u8 + self.step_id.is_some() as u8) != 1
        {
            return Err(ArazzoError::document_invalid(
                format!(
                    "$.workflows[{workflow_id}].steps[{}].onSuccess[{}]",
                    step.step_id, self.name
                ),
                "a `goto` action must set exactly one of workflowId or stepId",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SuccessActionType {
    End,
    Goto,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureAction {
    pub name: String,
    #[serde(rename = "type")]
    pub action_type: FailureActionType,
    #[serde(default)]
    pub workflow_id: Option<String>,
    #[serde(default)]
    pub step_id: Option<String>,
    #[serde(default)]
    pub retry_after: Option<f64>,
    #[serde(default)]
    pub retry_limit: Option<u32>,
    #[serde(default)]
    pub criteria: Vec<Criterion>,
}

impl FailureAction {
    fn validate(&self, workflow_id: &str, step: &Step) -> Result<()> {
        if self.action_type == FailureActionType::Goto
            && (self.workflow_id.is_some() as u8 + self.step_id.is_some() as u8) != 1
        {
            return Err(ArazzoError::document_invalid(
                format!(
                    "$.workflows[{workflow_id}].steps[{}].onFailure[{}]",
                    step.step_id, self.name
                ),
                "a `goto` action must set exactly one of workflowId or stepId",
            ));
        }
        if let Some(retry_after) = self.retry_after {
            if retry_after < 0.0 {
                return Err(ArazzoError::document_invalid(
                    format!(
                        "$.workflows[{workflow_id}].steps[{}].onFailure[{}].retryAfter",
                        step.step_id, self.name
                    ),
                    "retryAfter must be >= 0",
                ));
            }
        }
        Ok(())
    }

    /// The step id a `retry` action re-enters. Per §9 note 4, a `retry`
    /// action without an explicit `stepId` retries the current step.
    pub fn retry_target<'a>(&'a self, current_step_id: &'a str) -> &'a str {
        self.step_id.as_deref().unwrap_or(current_step_id)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FailureActionType {
    End,
    Retry,
    Goto,
}

/// `{reference, value?}` — points into `components` and is resolved to an
/// inline value before step execution. `reference` is a runtime expression
/// such as `$components.parameters.pagination`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReusableObject {
    pub reference: String,
    #[serde(default)]
    pub value: Option<Value>,
}

impl ReusableObject {
    /// Resolves this reference against `components`, applying `value` as an
    /// override when present, and deserializes the result into `T`.
    pub fn resolve<T: serde::de::DeserializeOwned>(&self, components: &Value) -> Result<T> {
        let mut resolved = resolve_dot_path(components, &self.reference)
            .cloned()
            .ok_or_else(|| {
                ArazzoError::document_invalid(
                    "$.components",
                    format!("unresolvable reference '{}'", self.reference),
                )
            })?;
        if let Some(overlay) = &self.value {
            merge_json(&mut resolved, overlay);
        }
        serde_json::from_value(resolved)
            .map_err(|e| ArazzoError::document_invalid(&self.reference, e.to_string()))
    }
}

fn resolve_dot_path<'a>(root: &'a Value, expr: &str) -> Option<&'a Value> {
    let path = expr.strip_prefix('$').unwrap_or(expr);
    let mut node = root;
    for segment in path.split('.').skip(1) {
        node = node.get(segment)?;
    }
    Some(node)
}

fn merge_json(base: &mut Value, overlay: &Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (k, v) in overlay_map {
                merge_json(base_map.entry(k.clone()).or_insert(Value::Null), v);
            }
        }
        (base_slot, overlay_value) => *base_slot = overlay_value.clone(),
    }
}

/// A `Parameter` or a `ReusableObject` pointing at one. Untagged because the
/// document distinguishes the two structurally: a `reference` key marks a
/// reusable reference, anything else is an inline parameter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterOrReusable {
    Reusable(ReusableObject),
    Inline(Parameter),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SuccessActionOrReusable {
    Reusable(ReusableObject),
    Inline(SuccessAction),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FailureActionOrReusable {
    Reusable(ReusableObject),
    Inline(FailureAction),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_yaml() -> &'static str {
        r#"
arazzo: 1.0.0
info:
  title: Sample
  version: 1.0.0
sourceDescriptions:
  - name: petstore
    url: https://example.com/openapi.yaml
    type: openapi
workflows:
  - workflowId: getPets
    steps:
      - stepId: listPets
        operationId: listPets
        successCriteria:
          - condition: "$statusCode == 200"
        outputs:
          petCount: "$response.body.count"
"#
    }

    #[test]
    fn parses_minimal_document() {
        let doc = Document::from_yaml(sample_yaml()).unwrap();
        assert_eq!(doc.workflows.len(), 1);
        assert_eq!(doc.workflows[0].steps[0].step_id, "listPets");
    }

    #[test]
    fn rejects_duplicate_workflow_ids() {
        let yaml = r#"
arazzo: 1.0.0
info: {title: t, version: "1"}
sourceDescriptions: []
workflows:
  - workflowId: a
    steps: [{stepId: s, operationId: op}]
  - workflowId: a
    steps: [{stepId: s2, operationId: op}]
"#;
        let err = Document::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, ArazzoError::DocumentInvalid { .. }));
    }

    #[test]
    fn rejects_unknown_depends_on() {
        let yaml = r#"
arazzo: 1.0.0
info: {title: t, version: "1"}
sourceDescriptions: []
workflows:
  - workflowId: a
    dependsOn: [missing]
    steps: [{stepId: s, operationId: op}]
"#;
        let err = Document::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, ArazzoError::DocumentInvalid { .. }));
    }

    #[test]
    fn rejects_dependency_cycle() {
        let yaml = r#"
arazzo: 1.0.0
info: {title: t, version: "1"}
sourceDescriptions: []
workflows:
  - workflowId: a
    dependsOn: [b]
    steps: [{stepId: s, operationId: op}]
  - workflowId: b
    dependsOn: [a]
    steps: [{stepId: s, operationId: op}]
"#;
        let err = Document::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, ArazzoError::DocumentInvalid { .. }));
    }

    #[test]
    fn rejects_step_with_two_invocation_targets() {
        let yaml = r#"
arazzo: 1.0.0
info: {title: t, version: "1"}
sourceDescriptions: []
workflows:
  - workflowId: a
    steps: [{stepId: s, operationId: op, workflowId: other}]
"#;
        let err = Document::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, ArazzoError::DocumentInvalid { .. }));
    }

    #[test]
    fn resolves_reusable_parameter() {
        let components: Value = serde_json::json!({
            "parameters": {
                "pagination": {"name": "page", "in": "query", "value": "1"}
            }
        });
        let reusable = ReusableObject {
            reference: "$components.parameters.pagination".to_string(),
            value: None,
        };
        let param: Parameter = reusable.resolve(&components).unwrap();
        assert_eq!(param.name, "page");
    }
}
