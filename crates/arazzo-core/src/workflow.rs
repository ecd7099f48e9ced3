// Copyright (c) 2025 Arazzo Engine Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The workflow orchestrator (C7): resolves the workflow dependency graph,
//! seeds the execution context from inputs, drives the step runner (C6)
//! step by step, applies workflow-level default actions, and collects
//! workflow outputs.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::EngineConfig;
use crate::context::ExecutionContext;
use crate::dag::Dag;
use crate::error::{ArazzoError, Result};
use crate::expression::Expression;
use crate::invoker::OperationInvoker;
use crate::model::Document;
use crate::retry::RetryTracker;
use crate::step::{StepRunner, StepTransition, SubWorkflowInvoker, SubWorkflowOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowStatus {
    Success,
    Failure,
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct WorkflowRunOutcome {
    pub status: WorkflowStatus,
    pub outputs: Value,
    pub error: Option<String>,
}

/// Entry point for running one or all workflows in a document.
pub struct Orchestrator;

impl Orchestrator {
    /// Runs a single named workflow to completion (or failure/cancellation).
    pub async fn run_workflow(
        document: &Document,
        workflow_id: &str,
        inputs: Value,
        invoker: &dyn OperationInvoker,
        config: &EngineConfig,
    ) -> Result<WorkflowRunOutcome> {
        Self::run_workflow_cancellable(
            document,
            workflow_id,
            inputs,
            invoker,
            config,
            &CancellationToken::new(),
        )
        .await
    }

    /// As [`Self::run_workflow`], but honoring an externally supplied
    /// cancellation token.
    pub async fn run_workflow_cancellable(
        document: &Document,
        workflow_id: &str,
        inputs: Value,
        invoker: &dyn OperationInvoker,
        config: &EngineConfig,
        cancellation: &CancellationToken,
    ) -> Result<WorkflowRunOutcome> {
        let session = RunSession { document, invoker, config, cancellation };
        session.run_workflow_at_depth(workflow_id, inputs, 0).await
    }

    /// Runs every workflow in the document in `dependsOn` order, each with
    /// the same input set.
    pub async fn run_all(
        document: &Document,
        inputs: Value,
        invoker: &dyn OperationInvoker,
        config: &EngineConfig,
    ) -> Result<HashMap<String, WorkflowRunOutcome>> {
        let dag = Dag::from_workflows(&document.workflows);
        let order = dag.execution_order()?;
        let cancellation = CancellationToken::new();
        let session = RunSession { document, invoker, config, cancellation: &cancellation };
        let mut results = HashMap::with_capacity(order.len());
        for workflow_id in order {
            let outcome = session.run_workflow_at_depth(&workflow_id, inputs.clone(), 0).await?;
            results.insert(workflow_id, outcome);
        }
        Ok(results)
    }
}

struct RunSession<'a> {
    document: &'a Document,
    invoker: &'a dyn OperationInvoker,
    config: &'a EngineConfig,
    cancellation: &'a CancellationToken,
}

impl<'a> RunSession<'a> {
    /// Boxed because a `goto` to another workflow recurses into this same
    /// function; a plain `async fn` cannot call itself without indirection.
    fn run_workflow_at_depth<'b>(
        &'b self,
        workflow_id: &'b str,
        inputs: Value,
        depth: usize,
    ) -> Pin<Box<dyn Future<Output = Result<WorkflowRunOutcome>> + Send + 'b>> {
        Box::pin(self.run_workflow_at_depth_inner(workflow_id, inputs, depth))
    }

    async fn run_workflow_at_depth_inner(
        &self,
        workflow_id: &str,
        inputs: Value,
        depth: usize,
    ) -> Result<WorkflowRunOutcome> {
        let workflow = self.document.workflow(workflow_id).ok_or_else(|| {
            ArazzoError::document_invalid("$.workflows", format!("unknown workflow '{workflow_id}'"))
        })?;

        validate_inputs_against_schema(workflow_id, &inputs, workflow.inputs_schema.as_ref())?;

        info!(workflow_id = %workflow_id, "starting workflow");
        let mut ctx = ExecutionContext::new(
            inputs,
            serde_json::to_value(&self.document.source_descriptions).unwrap_or(Value::Null),
            self.document.components.clone(),
        );
        let mut retry = RetryTracker::new();
        let runner = StepRunner::default();
        let expression = Expression::default();

        let mut current_step_id = workflow.steps[0].step_id.clone();
        let status;

        loop {
            if self.cancellation.is_cancelled() {
                warn!(workflow_id = %workflow_id, "workflow cancelled");
                status = WorkflowStatus::Cancelled;
                break;
            }

            let step_index = workflow
                .steps
                .iter()
                .position(|s| s.step_id == current_step_id)
                .ok_or_else(|| {
                    ArazzoError::WorkflowFailed { workflow_id: workflow_id.to_string() }
                })?;
            let step = &workflow.steps[step_index];

            let transition = runner
                .run_step(
                    step,
                    workflow,
                    self.document,
                    &mut ctx,
                    self.invoker,
                    &mut retry,
                    self.config,
                    self.cancellation,
                    self,
                    depth,
                )
                .await?;

            match transition {
                StepTransition::FallThrough => {
                    if step_index + 1 < workflow.steps.len() {
                        current_step_id = workflow.steps[step_index + 1].step_id.clone();
                        continue;
                    }
                    status = WorkflowStatus::Success;
                    break;
                }
                StepTransition::GotoStep(next) => {
                    current_step_id = next;
                    continue;
                }
                StepTransition::GotoWorkflow(target_workflow_id) => {
                    info!(workflow_id = %workflow_id, target = %target_workflow_id, "goto workflow");
                    return self
                        .run_workflow_at_depth(&target_workflow_id, ctx.inputs().clone(), depth)
                        .await;
                }
                StepTransition::EndSuccess => {
                    status = WorkflowStatus::Success;
                    break;
                }
                StepTransition::EndFailure => {
                    status = WorkflowStatus::Failure;
                    break;
                }
            }
        }

        if status == WorkflowStatus::Success {
            for (name, expr) in &workflow.outputs {
                let value = expression.evaluate(expr, &ctx)?;
                ctx.set_workflow_output(workflow_id, name, value);
            }
            info!(workflow_id = %workflow_id, "workflow completed successfully");
        } else {
            error!(workflow_id = %workflow_id, status = ?status, "workflow did not succeed");
        }

        Ok(WorkflowRunOutcome {
            status,
            outputs: ctx.workflow_outputs(workflow_id),
            error: match status {
                WorkflowStatus::Success => None,
                WorkflowStatus::Failure => Some(format!("workflow '{workflow_id}' failed")),
                WorkflowStatus::Cancelled => Some("workflow execution was cancelled".to_string()),
            },
        })
    }
}

#[async_trait]
impl<'a> SubWorkflowInvoker for RunSession<'a> {
    async fn run_sub_workflow(
        &self,
        workflow_id: &str,
        inputs: Value,
        depth: usize,
    ) -> Result<SubWorkflowOutcome> {
        let outcome = self.run_workflow_at_depth(workflow_id, inputs, depth).await?;
        Ok(SubWorkflowOutcome {
            succeeded: outcome.status == WorkflowStatus::Success,
            outputs: outcome.outputs,
        })
    }
}

/// Structural check only: when `schema` declares `required`, every named
/// field must be present in `inputs`. Full JSON Schema validation is not
/// implemented.
fn validate_inputs_against_schema(workflow_id: &str, inputs: &Value, schema: Option<&Value>) -> Result<()> {
    let Some(schema) = schema else {
        return Ok(());
    };
    let Some(required) = schema.get("required").and_then(|r| r.as_array()) else {
        return Ok(());
    };
    for field in required {
        let Some(name) = field.as_str() else { continue };
        if inputs.get(name).is_none() {
            return Err(ArazzoError::document_invalid(
                format!("$.workflows[{workflow_id}].inputsSchema"),
                format!("missing required input '{name}'"),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_validation_flags_missing_required_input() {
        let schema = serde_json::json!({"required": ["customerId"]});
        let err = validate_inputs_against_schema("wf", &serde_json::json!({}), Some(&schema)).unwrap_err();
        assert!(matches!(err, ArazzoError::DocumentInvalid { .. }));
    }

    #[test]
    fn schema_validation_passes_when_required_present() {
        let schema = serde_json::json!({"required": ["customerId"]});
        let inputs = serde_json::json!({"customerId": "c1"});
        assert!(validate_inputs_against_schema("wf", &inputs, Some(&schema)).is_ok());
    }
}
