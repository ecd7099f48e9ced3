// Copyright (c) 2025 Arazzo Engine Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The operation invoker interface (C5): the seam between the engine and
//! whatever actually performs an API call. Concrete invokers (HTTP, a
//! scriptable recorder for tests) live in the `arazzo-invoker` crate; the
//! engine only depends on this trait.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::InvocationError;
use crate::model::ParameterLocation;

/// What a step is asking the invoker to call: either a named operation
/// (resolved against a source description) or a source-relative JSON
/// Pointer into the source document.
#[derive(Debug, Clone)]
pub enum OperationTarget {
    OperationId(String),
    OperationPath { source_url: String, pointer: String },
}

/// One resolved parameter, already evaluated and grouped by location.
#[derive(Debug, Clone)]
pub struct ResolvedParameter {
    pub name: String,
    pub location: ParameterLocation,
    pub value: Value,
}

/// The fully rendered request body, after payload evaluation and
/// `PayloadReplacement` application.
#[derive(Debug, Clone, Default)]
pub struct RequestPayload {
    pub content_type: Option<String>,
    pub body: Value,
}

/// The response C5 hands back to the step runner for context recording.
#[derive(Debug, Clone)]
pub struct InvocationResponse {
    pub status_code: u16,
    pub headers: HashMap<String, Vec<String>>,
    pub body: Value,
}

/// Implemented by anything that can execute a resolved operation call.
/// Implementations must be safe to share across concurrently running
/// workflow instances (`Send + Sync`); the engine never mutates an invoker.
#[async_trait]
pub trait OperationInvoker: Send + Sync {
    async fn invoke(
        &self,
        target: &OperationTarget,
        parameters: &[ResolvedParameter],
        body: Option<&RequestPayload>,
    ) -> Result<InvocationResponse, InvocationError>;
}
