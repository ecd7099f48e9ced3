// Copyright (c) 2025 Arazzo Engine Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fixture documents and a scriptable invoker shared by this crate's
//! integration tests, and exported under the `test-utils` feature so
//! `arazzo-invoker`/`arazzo-cli` can build on the same fixtures rather than
//! duplicating them.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::invoker::{InvocationResponse, OperationInvoker, OperationTarget, RequestPayload, ResolvedParameter};
use crate::model::Document;

/// A canned response for one invocation, matched by call order.
#[derive(Debug, Clone)]
pub struct ScriptedResponse {
    pub status_code: u16,
    pub body: Value,
    pub headers: HashMap<String, Vec<String>>,
}

impl ScriptedResponse {
    pub fn ok(body: Value) -> Self {
        Self { status_code: 200, body, headers: HashMap::new() }
    }

    pub fn with_status(status_code: u16, body: Value) -> Self {
        Self { status_code, body, headers: HashMap::new() }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.entry(name.to_string()).or_default().push(value.to_string());
        self
    }
}

/// One recorded call, kept for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub target: OperationTarget,
    pub parameters: Vec<ResolvedParameter>,
    pub body: Option<RequestPayload>,
}

/// An [`OperationInvoker`] that replays a fixed script of responses in
/// order and records every call it received.
pub struct ScriptedInvoker {
    responses: Mutex<std::collections::VecDeque<ScriptedResponse>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedInvoker {
    pub fn new(responses: Vec<ScriptedResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().expect("lock poisoned").clone()
    }
}

#[async_trait]
impl OperationInvoker for ScriptedInvoker {
    async fn invoke(
        &self,
        target: &OperationTarget,
        parameters: &[ResolvedParameter],
        body: Option<&RequestPayload>,
    ) -> std::result::Result<InvocationResponse, crate::error::InvocationError> {
        self.calls.lock().expect("lock poisoned").push(RecordedCall {
            target: target.clone(),
            parameters: parameters.to_vec(),
            body: body.cloned(),
        });
        let response = self
            .responses
            .lock()
            .expect("lock poisoned")
            .pop_front()
            .ok_or_else(|| crate::error::InvocationError::Transport("no scripted response left".into()))?;
        Ok(InvocationResponse {
            status_code: response.status_code,
            headers: response.headers,
            body: response.body,
        })
    }
}

/// A login-then-retrieve fixture: two sequential steps where the second
/// reads the first's captured output.
pub fn login_then_retrieve_document() -> Document {
    let yaml = r#"
arazzo: 1.0.0
info:
  title: login-then-retrieve
  version: 1.0.0
sourceDescriptions:
  - name: petstore
    url: https://example.com/openapi.yaml
    type: openapi
workflows:
  - workflowId: loginThenRetrieve
    steps:
      - stepId: login
        operationId: login
        successCriteria:
          - condition: "$statusCode == 200"
        outputs:
          sessionToken: "$response.body"
      - stepId: getPets
        operationId: listPets
        parameters:
          - name: Authorization
            in: header
            value: "$steps.login.outputs.sessionToken"
        successCriteria:
          - condition: "$statusCode == 200"
        outputs:
          pets: "$response.body"
    outputs:
      sessionToken: "$steps.login.outputs.sessionToken"
"#;
    Document::from_yaml(yaml).expect("fixture document is well-formed")
}
