// Copyright (c) 2025 Arazzo Engine Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The step runner (C6): resolves one step's parameters and body, invokes
//! it (or recurses into a sub-workflow), evaluates success criteria, and
//! dispatches the matching success/failure action.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::context::ExecutionContext;
use crate::criterion::CriterionEvaluator;
use crate::error::{ArazzoError, Result};
use crate::expression::Expression;
use crate::invoker::{OperationInvoker, OperationTarget, RequestPayload, ResolvedParameter};
use crate::model::{
    Criterion, Document, FailureAction, FailureActionOrReusable, FailureActionType,
    InvocationTarget, Parameter, ParameterOrReusable, Step, SuccessAction,
    SuccessActionOrReusable, SuccessActionType, Workflow,
};
use crate::retry::{RetryOutcome, RetryTracker};

/// Callback the orchestrator implements so `StepRunner` can recurse into a
/// sub-workflow without depending on `Orchestrator`'s concrete type.
#[async_trait]
pub trait SubWorkflowInvoker: Send + Sync {
    async fn run_sub_workflow(
        &self,
        workflow_id: &str,
        inputs: Value,
        depth: usize,
    ) -> Result<SubWorkflowOutcome>;
}

pub struct SubWorkflowOutcome {
    pub succeeded: bool,
    pub outputs: Value,
}

/// What the orchestrator should do after a step completes.
#[derive(Debug, Clone)]
pub enum StepTransition {
    FallThrough,
    GotoStep(String),
    GotoWorkflow(String),
    EndSuccess,
    EndFailure,
}

enum DispatchOutcome {
    Transition(StepTransition),
    RetryStep,
}

pub struct StepRunner {
    expression: Expression,
    criteria: CriterionEvaluator,
}

impl Default for StepRunner {
    fn default() -> Self {
        Self {
            expression: Expression::default(),
            criteria: CriterionEvaluator::new(Expression::default()),
        }
    }
}

impl StepRunner {
    #[allow(clippy::too_many_arguments)]
    pub async fn run_step(
        &self,
        step: &Step,
        workflow: &Workflow,
        document: &Document,
        ctx: &mut ExecutionContext,
        invoker: &dyn OperationInvoker,
        retry: &mut RetryTracker,
        config: &EngineConfig,
        cancellation: &CancellationToken,
        sub_workflows: &dyn SubWorkflowInvoker,
        depth: usize,
    ) -> Result<StepTransition> {
        loop {
            if cancellation.is_cancelled() {
                return Err(ArazzoError::Cancelled);
            }

            let succeeded = if let InvocationTarget::Workflow(target_id) = step.invocation_target() {
                self.run_sub_workflow_step(
                    step, target_id, document, ctx, sub_workflows, depth, config,
                )
                .await?
            } else {
                self.run_operation_step(step, document, ctx, invoker, config, cancellation)
                    .await?
            };

            self.capture_outputs(step, ctx)?;

            let dispatch = if succeeded {
                self.dispatch_success(step, workflow, ctx)?
            } else {
                self.dispatch_failure(step, workflow, ctx, retry, cancellation).await?
            };

            match dispatch {
                DispatchOutcome::Transition(t) => return Ok(t),
                DispatchOutcome::RetryStep => {
                    debug!(step_id = %step.step_id, "retrying step");
                    continue;
                }
            }
        }
    }

    async fn run_sub_workflow_step(
        &self,
        step: &Step,
        target_workflow_id: &str,
        document: &Document,
        ctx: &mut ExecutionContext,
        sub_workflows: &dyn SubWorkflowInvoker,
        depth: usize,
        config: &EngineConfig,
    ) -> Result<bool> {
        if depth >= config.max_nesting_depth {
            return Err(ArazzoError::NestingTooDeep { depth });
        }
        let resolved = self.resolve_parameters(step, document, ctx)?;
        let inputs = parameters_to_inputs(&resolved);
        info!(step_id = %step.step_id, workflow_id = %target_workflow_id, "entering sub-workflow");
        let outcome = sub_workflows.run_sub_workflow(target_workflow_id, inputs, depth + 1).await?;
        ctx.set_step_output(&step.step_id, "__sub_workflow_outputs", outcome.outputs.clone());
        for (name, value) in outcome.outputs.as_object().into_iter().flatten() {
            ctx.set_step_output(&step.step_id, name, value.clone());
        }
        Ok(outcome.succeeded)
    }

    async fn run_operation_step(
        &self,
        step: &Step,
        document: &Document,
        ctx: &mut ExecutionContext,
        invoker: &dyn OperationInvoker,
        config: &EngineConfig,
        cancellation: &CancellationToken,
    ) -> Result<bool> {
        let resolved = self.resolve_parameters(step, document, ctx)?;
        let payload = self.resolve_request_body(step, ctx)?;
        let target = self.resolve_target(step, document)?;

        if cancellation.is_cancelled() {
            return Err(ArazzoError::Cancelled);
        }

        let invocation = invoker.invoke(&target, &resolved, payload.as_ref());
        let response = match config.step_timeout {
            Some(timeout) => tokio::time::timeout(timeout, invocation)
                .await
                .map_err(|_| ArazzoError::Timeout { duration: timeout })??,
            None => invocation.await?,
        };

        if cancellation.is_cancelled() {
            return Err(ArazzoError::Cancelled);
        }

        info!(step_id = %step.step_id, status_code = response.status_code, "step invoked");
        let headers_value = Value::Object(
            response
                .headers
                .iter()
                .map(|(k, v)| (k.clone(), Value::from(v.clone())))
                .collect(),
        );
        ctx.set_current_response(
            target_url(&target),
            target_method(step, &target),
            response.status_code,
            response.body.clone(),
            headers_value,
        );

        self.evaluate_success(step, ctx, response.status_code)
    }

    fn evaluate_success(&self, step: &Step, ctx: &ExecutionContext, status_code: u16) -> Result<bool> {
        if step.success_criteria.is_empty() {
            return Ok((200..400).contains(&status_code));
        }
        for criterion in &step.success_criteria {
            if !self.criteria.evaluate(criterion, ctx)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn capture_outputs(&self, step: &Step, ctx: &mut ExecutionContext) -> Result<()> {
        for (name, expr) in &step.outputs {
            let value = self.expression.evaluate(expr, ctx)?;
            ctx.set_step_output(&step.step_id, name, value);
        }
        Ok(())
    }

    fn dispatch_success(
        &self,
        step: &Step,
        workflow: &Workflow,
        ctx: &ExecutionContext,
    ) -> Result<DispatchOutcome> {
        let actions = self.resolve_success_actions(step, workflow, ctx.components())?;
        for action in &actions {
            if self.criteria_match(&action.criteria, ctx)? {
                return Ok(DispatchOutcome::Transition(match action.action_type {
                    SuccessActionType::End => StepTransition::EndSuccess,
                    SuccessActionType::Goto => self.goto_transition(
                        action.workflow_id.as_deref(),
                        action.step_id.as_deref(),
                    ),
                }));
            }
        }
        Ok(DispatchOutcome::Transition(StepTransition::FallThrough))
    }

    async fn dispatch_failure(
        &self,
        step: &Step,
        workflow: &Workflow,
        ctx: &ExecutionContext,
        retry: &mut RetryTracker,
        cancellation: &CancellationToken,
    ) -> Result<DispatchOutcome> {
        let actions = self.resolve_failure_actions(step, workflow, ctx.components())?;
        for action in &actions {
            if !self.criteria_match(&action.criteria, ctx)? {
                continue;
            }
            match action.action_type {
                FailureActionType::End => {
                    return Ok(DispatchOutcome::Transition(StepTransition::EndFailure))
                }
                FailureActionType::Goto => {
                    return Ok(DispatchOutcome::Transition(self.goto_transition(
                        action.workflow_id.as_deref(),
                        action.step_id.as_deref(),
                    )))
                }
                FailureActionType::Retry => {
                    match retry.record_attempt(&step.step_id, &action.name, action.retry_limit) {
                        RetryOutcome::Retry => {
                            let delay = Duration::from_secs_f64(action.retry_after.unwrap_or(0.0));
                            wait_or_cancel(delay, cancellation).await?;
                            return Ok(DispatchOutcome::RetryStep);
                        }
                        RetryOutcome::LimitExhausted => {
                            warn!(step_id = %step.step_id, action = %action.name, "retry limit exhausted");
                            continue;
                        }
                    }
                }
            }
        }
        Ok(DispatchOutcome::Transition(StepTransition::EndFailure))
    }

    fn goto_transition(&self, workflow_id: Option<&str>, step_id: Option<&str>) -> StepTransition {
        if let Some(wf) = workflow_id {
            StepTransition::GotoWorkflow(wf.to_string())
        } else {
            StepTransition::GotoStep(step_id.unwrap_or_default().to_string())
        }
    }

    fn criteria_match(&self, criteria: &[Criterion], ctx: &ExecutionContext) -> Result<bool> {
        for criterion in criteria {
            if !self.criteria.evaluate(criterion, ctx)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Step-local actions first, then the workflow-level defaults, in
    /// document order.
    fn resolve_success_actions(
        &self,
        step: &Step,
        workflow: &Workflow,
        components: &Value,
    ) -> Result<Vec<SuccessAction>> {
        step.on_success
            .iter()
            .chain(workflow.success_actions.iter())
            .map(|item| match item {
                SuccessActionOrReusable::Inline(a) => Ok(a.clone()),
                SuccessActionOrReusable::Reusable(r) => r.resolve(components),
            })
            .collect()
    }

    fn resolve_failure_actions(
        &self,
        step: &Step,
        workflow: &Workflow,
        components: &Value,
    ) -> Result<Vec<FailureAction>> {
        step.on_failure
            .iter()
            .chain(workflow.failure_actions.iter())
            .map(|item| match item {
                FailureActionOrReusable::Inline(a) => Ok(a.clone()),
                FailureActionOrReusable::Reusable(r) => r.resolve(components),
            })
            .collect()
    }

    fn resolve_parameters(
        &self,
        step: &Step,
        document: &Document,
        ctx: &ExecutionContext,
    ) -> Result<Vec<ResolvedParameter>> {
        let mut resolved = Vec::with_capacity(step.parameters.len());
        for item in &step.parameters {
            let param: Parameter = match item {
                ParameterOrReusable::Inline(p) => p.clone(),
                ParameterOrReusable::Reusable(reusable) => reusable.resolve(&document.components)?,
            };
            let value = self.resolve_value(&param.value, ctx)?;
            resolved.push(ResolvedParameter {
                name: param.name,
                location: param.location,
                value,
            });
        }
        Ok(resolved)
    }

    /// Evaluates a literal-or-expression leaf: strings containing `$` or
    /// `{` go through C3, anything else (including structured literals,
    /// walked recursively) passes through.
    fn resolve_value(&self, value: &Value, ctx: &ExecutionContext) -> Result<Value> {
        match value {
            Value::String(s) if s.contains('$') || s.contains('{') => self.expression.evaluate(s, ctx),
            Value::Array(items) => Ok(Value::Array(
                items.iter().map(|v| self.resolve_value(v, ctx)).collect::<Result<_>>()?,
            )),
            Value::Object(map) => {
                let mut out = Map::with_capacity(map.len());
                for (k, v) in map {
                    out.insert(k.clone(), self.resolve_value(v, ctx)?);
                }
                Ok(Value::Object(out))
            }
            other => Ok(other.clone()),
        }
    }

    fn resolve_request_body(&self, step: &Step, ctx: &ExecutionContext) -> Result<Option<RequestPayload>> {
        let Some(body) = &step.request_body else {
            return Ok(None);
        };
        let mut payload = self.resolve_value(&body.payload, ctx)?;
        for replacement in &body.replacements {
            let value = self.resolve_value(&replacement.value, ctx)?;
            set_json_pointer(&mut payload, &replacement.target, value);
        }
        Ok(Some(RequestPayload {
            content_type: body.content_type.clone(),
            body: payload,
        }))
    }

    fn resolve_target(&self, step: &Step, document: &Document) -> Result<OperationTarget> {
        match step.invocation_target() {
            InvocationTarget::OperationId(id) => Ok(OperationTarget::OperationId(id.to_string())),
            InvocationTarget::OperationPath(path) => {
                let (source_name, pointer) = path.split_once('#').ok_or_else(|| {
                    ArazzoError::expression(path, "operationPath must contain a '#' pointer")
                })?;
                let source_name = source_name
                    .trim_start_matches("{$sourceDescriptions.")
                    .trim_end_matches(".url}");
                let source = document
                    .source_descriptions
                    .iter()
                    .find(|s| s.name == source_name)
                    .ok_or_else(|| {
                        ArazzoError::expression(path, format!("unknown source description '{source_name}'"))
                    })?;
                Ok(OperationTarget::OperationPath {
                    source_url: source.url.clone(),
                    pointer: pointer.to_string(),
                })
            }
            InvocationTarget::Workflow(_) => unreachable!("handled by run_sub_workflow_step"),
        }
    }
}

fn parameters_to_inputs(params: &[ResolvedParameter]) -> Value {
    let mut map = Map::with_capacity(params.len());
    for p in params {
        map.insert(p.name.clone(), p.value.clone());
    }
    Value::Object(map)
}

fn target_url(target: &OperationTarget) -> String {
    match target {
        OperationTarget::OperationId(id) => id.clone(),
        OperationTarget::OperationPath { source_url, pointer } => format!("{source_url}#{pointer}"),
    }
}

/// Recovers the HTTP method for `$method`/`{$method}` context recording.
/// `OperationInvoker` never returns the method it used, so this is resolved
/// from what the step itself names: an `operationPath` pointer follows the
/// OpenAPI convention `#/paths/{path}/{method}`, so its last segment *is*
/// the method. An `operationId` step carries no such structure, so it falls
/// back to an `x-method` extension when the document supplies one, or
/// `"UNKNOWN"` rather than guessing a specific verb.
fn target_method(step: &Step, target: &OperationTarget) -> String {
    if let OperationTarget::OperationPath { pointer, .. } = target {
        if let Some(method) = http_method_from_pointer(pointer) {
            return method;
        }
    }
    if let Some(method) = step.extensions.get("x-method").and_then(|v| v.as_str()) {
        return method.to_uppercase();
    }
    "UNKNOWN".to_string()
}

fn http_method_from_pointer(pointer: &str) -> Option<String> {
    const HTTP_METHODS: &[&str] = &["get", "put", "post", "delete", "patch", "head", "options", "trace"];
    let last_segment = pointer.rsplit('/').next()?;
    HTTP_METHODS.contains(&last_segment).then(|| last_segment.to_uppercase())
}

async fn wait_or_cancel(delay: Duration, cancellation: &CancellationToken) -> Result<()> {
    tokio::select! {
        _ = tokio::time::sleep(delay) => Ok(()),
        _ = cancellation.cancelled() => Err(ArazzoError::Cancelled),
    }
}

/// Writes `value` at JSON Pointer `pointer` within `root`, creating
/// intermediate objects along the path when a segment names a key that
/// doesn't exist yet.
fn set_json_pointer(root: &mut Value, pointer: &str, value: Value) {
    let Some(stripped) = pointer.strip_prefix('/') else {
        *root = value;
        return;
    };
    if stripped.is_empty() {
        *root = value;
        return;
    }
    let segments: Vec<String> = stripped
        .split('/')
        .map(|s| s.replace("~1", "/").replace("~0", "~"))
        .collect();
    let mut node = root;
    for segment in &segments[..segments.len() - 1] {
        if !node.is_object() {
            *node = Value::Object(Map::new());
        }
        node = node
            .as_object_mut()
            .expect("just ensured object")
            .entry(segment.clone())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    node.as_object_mut()
        .expect("just ensured object")
        .insert(segments.last().unwrap().clone(), value);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_pointer_write_creates_intermediate_objects() {
        let mut root = serde_json::json!({});
        set_json_pointer(&mut root, "/a/b", Value::from(1));
        assert_eq!(root, serde_json::json!({"a": {"b": 1}}));
    }

    #[test]
    fn json_pointer_write_overwrites_existing_leaf() {
        let mut root = serde_json::json!({"a": {"b": 1}});
        set_json_pointer(&mut root, "/a/b", Value::from(2));
        assert_eq!(root, serde_json::json!({"a": {"b": 2}}));
    }

    fn step_with_extensions(extensions: Map<String, Value>) -> Step {
        Step {
            step_id: "call".to_string(),
            operation_id: Some("op".to_string()),
            operation_path: None,
            workflow_id: None,
            parameters: Vec::new(),
            request_body: None,
            success_criteria: Vec::new(),
            on_success: Vec::new(),
            on_failure: Vec::new(),
            outputs: Default::default(),
            extensions,
        }
    }

    #[test]
    fn target_method_reads_last_pointer_segment() {
        let step = step_with_extensions(Map::new());
        let target = OperationTarget::OperationPath {
            source_url: "https://example.com/openapi.yaml".to_string(),
            pointer: "/paths/~1pets/get".to_string(),
        };
        assert_eq!(target_method(&step, &target), "GET");
    }

    #[test]
    fn target_method_falls_back_to_x_method_extension() {
        let mut extensions = Map::new();
        extensions.insert("x-method".to_string(), Value::String("PATCH".to_string()));
        let step = step_with_extensions(extensions);
        let target = OperationTarget::OperationId("updatePet".to_string());
        assert_eq!(target_method(&step, &target), "PATCH");
    }

    #[test]
    fn target_method_defaults_to_unknown_without_a_hint() {
        let step = step_with_extensions(Map::new());
        let target = OperationTarget::OperationId("updatePet".to_string());
        assert_eq!(target_method(&step, &target), "UNKNOWN");
    }
}
