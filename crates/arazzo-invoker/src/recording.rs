// Copyright (c) 2025 Arazzo Engine Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! An in-memory, scriptable invoker. Used by `arazzo-core`'s integration
//! tests indirectly (via `arazzo-core::test_utils::ScriptedInvoker`) and
//! directly by `arazzo-cli --dry-run`, where no real downstream API should
//! be called but the engine still needs *some* invoker to drive.

use std::collections::HashMap;
use std::sync::Mutex;

use arazzo_core::error::InvocationError;
use arazzo_core::invoker::{InvocationResponse, OperationInvoker, OperationTarget, RequestPayload, ResolvedParameter};
use async_trait::async_trait;
use serde_json::Value;

/// One recorded invocation, kept for inspection after a dry run.
#[derive(Debug, Clone)]
pub struct RecordedInvocation {
    pub target_description: String,
    pub parameters: Vec<ResolvedParameter>,
    pub body: Option<Value>,
}

/// An invoker that echoes a synthetic success response for every call and
/// records what it was asked to invoke, for CLI `--dry-run` output and for
/// test assertions.
pub struct RecordingInvoker {
    default_status: u16,
    scripted: Mutex<HashMap<String, InvocationResponse>>,
    calls: Mutex<Vec<RecordedInvocation>>,
}

impl Default for RecordingInvoker {
    fn default() -> Self {
        Self {
            default_status: 200,
            scripted: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl RecordingInvoker {
    pub fn new(default_status: u16) -> Self {
        Self { default_status, scripted: Mutex::new(HashMap::new()), calls: Mutex::new(Vec::new()) }
    }

    /// Scripts a specific response for calls to `operation_id`.
    pub fn script(&self, operation_id: &str, response: InvocationResponse) {
        self.scripted.lock().expect("lock poisoned").insert(operation_id.to_string(), response);
    }

    pub fn calls(&self) -> Vec<RecordedInvocation> {
        self.calls.lock().expect("lock poisoned").clone()
    }
}

fn describe(target: &OperationTarget) -> String {
    match target {
        OperationTarget::OperationId(id) => id.clone(),
        OperationTarget::OperationPath { source_url, pointer } => format!("{source_url}{pointer}"),
    }
}

#[async_trait]
impl OperationInvoker for RecordingInvoker {
    async fn invoke(
        &self,
        target: &OperationTarget,
        parameters: &[ResolvedParameter],
        body: Option<&RequestPayload>,
    ) -> Result<InvocationResponse, InvocationError> {
        let description = describe(target);
        self.calls.lock().expect("lock poisoned").push(RecordedInvocation {
            target_description: description.clone(),
            parameters: parameters.to_vec(),
            body: body.map(|b| b.body.clone()),
        });

        if let OperationTarget::OperationId(id) = target {
            if let Some(response) = self.scripted.lock().expect("lock poisoned").get(id) {
                return Ok(InvocationResponse {
                    status_code: response.status_code,
                    headers: response.headers.clone(),
                    body: response.body.clone(),
                });
            }
        }

        Ok(InvocationResponse {
            status_code: self.default_status,
            headers: HashMap::new(),
            body: Value::Null,
        })
    }
}
