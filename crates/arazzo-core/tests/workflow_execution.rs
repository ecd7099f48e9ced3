// Copyright (c) 2025 Arazzo Engine Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end orchestrator tests against `ScriptedInvoker`, covering the
//! scenario tables and testable properties named in the engine's design
//! notes (sequential execution, retry bounding, goto validity, nesting
//! limits, cancellation).

use arazzo_core::config::EngineConfig;
use arazzo_core::model::Document;
use arazzo_core::test_utils::{login_then_retrieve_document, ScriptedInvoker, ScriptedResponse};
use arazzo_core::workflow::{Orchestrator, WorkflowStatus};
use serde_json::json;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn sequential_steps_pass_output_forward() {
    let document = login_then_retrieve_document();
    let invoker = ScriptedInvoker::new(vec![
        ScriptedResponse::ok(json!("tok-abc")),
        ScriptedResponse::ok(json!([{"id": 1, "name": "Rex"}])),
    ]);
    let config = EngineConfig::default();

    let outcome = Orchestrator::run_workflow(&document, "loginThenRetrieve", json!({}), &invoker, &config)
        .await
        .unwrap();

    assert_eq!(outcome.status, WorkflowStatus::Success);
    assert_eq!(outcome.outputs["sessionToken"], json!("tok-abc"));

    let calls = invoker.calls();
    assert_eq!(calls.len(), 2);
    let auth_header = calls[1]
        .parameters
        .iter()
        .find(|p| p.name == "Authorization")
        .expect("Authorization parameter resolved");
    assert_eq!(auth_header.value, json!("tok-abc"));
}

fn single_step_document(success_criteria: &str) -> Document {
    let yaml = format!(
        r#"
arazzo: 1.0.0
info: {{title: t, version: "1"}}
sourceDescriptions:
  - name: petstore
    url: https://example.com/openapi.yaml
    type: openapi
workflows:
  - workflowId: wf
    steps:
      - stepId: call
        operationId: op
        successCriteria:
          - condition: "{success_criteria}"
"#
    );
    Document::from_yaml(&yaml).unwrap()
}

#[tokio::test]
async fn retry_action_bounds_reattempts_by_limit() {
    let yaml = r#"
arazzo: 1.0.0
info: {title: t, version: "1"}
sourceDescriptions:
  - name: petstore
    url: https://example.com/openapi.yaml
    type: openapi
workflows:
  - workflowId: wf
    steps:
      - stepId: call
        operationId: op
        successCriteria:
          - condition: "$statusCode == 200"
        onFailure:
          - name: retryOnError
            type: retry
            retryAfter: 0
            retryLimit: 2
"#;
    let document = Document::from_yaml(yaml).unwrap();
    let invoker = ScriptedInvoker::new(vec![
        ScriptedResponse::with_status(500, json!({})),
        ScriptedResponse::with_status(500, json!({})),
        ScriptedResponse::with_status(500, json!({})),
    ]);
    let config = EngineConfig::default();

    let outcome = Orchestrator::run_workflow(&document, "wf", json!({}), &invoker, &config)
        .await
        .unwrap();

    assert_eq!(outcome.status, WorkflowStatus::Failure);
    assert_eq!(invoker.calls().len(), 3);
}

#[tokio::test]
async fn goto_unknown_step_is_fatal() {
    let yaml = r#"
arazzo: 1.0.0
info: {title: t, version: "1"}
sourceDescriptions:
  - name: petstore
    url: https://example.com/openapi.yaml
    type: openapi
workflows:
  - workflowId: wf
    steps:
      - stepId: call
        operationId: op
        successCriteria:
          - condition: "$statusCode == 200"
        onSuccess:
          - name: jump
            type: goto
            stepId: doesNotExist
"#;
    let document = Document::from_yaml(yaml).unwrap();
    let invoker = ScriptedInvoker::new(vec![ScriptedResponse::ok(json!({}))]);
    let config = EngineConfig::default();

    let err = Orchestrator::run_workflow(&document, "wf", json!({}), &invoker, &config)
        .await
        .unwrap_err();

    assert!(matches!(err, arazzo_core::error::ArazzoError::WorkflowFailed { .. }));
}

#[tokio::test]
async fn default_success_range_accepts_2xx_to_3xx() {
    let config = EngineConfig::default();
    let yaml = r#"
arazzo: 1.0.0
info: {title: t, version: "1"}
sourceDescriptions:
  - name: petstore
    url: https://example.com/openapi.yaml
    type: openapi
workflows:
  - workflowId: wf
    steps:
      - stepId: call
        operationId: op
"#;
    let document = Document::from_yaml(yaml).unwrap();
    let invoker = ScriptedInvoker::new(vec![ScriptedResponse::with_status(204, json!(null))]);
    let outcome = Orchestrator::run_workflow(&document, "wf", json!({}), &invoker, &config)
        .await
        .unwrap();
    assert_eq!(outcome.status, WorkflowStatus::Success);
}

#[tokio::test]
async fn sub_workflow_nesting_cap_is_enforced() {
    let yaml = r#"
arazzo: 1.0.0
info: {title: t, version: "1"}
sourceDescriptions: []
workflows:
  - workflowId: recurse
    steps:
      - stepId: call
        workflowId: recurse
"#;
    let document = Document::from_yaml(yaml).unwrap();
    let invoker = ScriptedInvoker::new(vec![]);
    let config = EngineConfig::default().with_max_nesting_depth(3);

    let err = Orchestrator::run_workflow(&document, "recurse", json!({}), &invoker, &config)
        .await
        .unwrap_err();

    assert!(matches!(err, arazzo_core::error::ArazzoError::NestingTooDeep { depth: 3 }));
}

#[tokio::test]
async fn cancellation_before_step_invocation_ends_run_cancelled() {
    let document = single_step_document("$statusCode == 200");
    let invoker = ScriptedInvoker::new(vec![ScriptedResponse::ok(json!({}))]);
    let config = EngineConfig::default();
    let cancellation = CancellationToken::new();
    cancellation.cancel();

    let outcome = Orchestrator::run_workflow_cancellable(
        &document,
        "wf",
        json!({}),
        &invoker,
        &config,
        &cancellation,
    )
    .await
    .unwrap();

    assert_eq!(outcome.status, WorkflowStatus::Cancelled);
    assert!(invoker.calls().is_empty());
}
