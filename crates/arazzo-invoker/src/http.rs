// Copyright (c) 2025 Arazzo Engine Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A `reqwest`-backed [`OperationInvoker`]. Resolving an `operationId` or
//! `operationPath` into a concrete method and URL requires understanding
//! the referenced OpenAPI document, which this crate does not parse — the
//! caller supplies a [`SourceResolver`] that performs that lookup.

use std::collections::HashMap;
use std::time::Duration;

use arazzo_core::error::InvocationError;
use arazzo_core::invoker::{InvocationResponse, OperationInvoker, OperationTarget, RequestPayload, ResolvedParameter};
use arazzo_core::model::ParameterLocation;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, info};

use crate::error::convert_reqwest_error;

const HTTP_METHODS: &[&str] = &["get", "put", "post", "delete", "patch", "head", "options", "trace"];

/// A resolved HTTP method + URL template for one operation target.
#[derive(Debug, Clone)]
pub struct ResolvedOperation {
    pub method: String,
    /// May contain `{name}` placeholders filled from `path` parameters.
    pub url_template: String,
}

/// Maps an [`OperationTarget`] to the concrete request it represents.
/// Implemented by callers who have already parsed the referenced OpenAPI
/// document (or who maintain a static registry for a known API surface).
pub trait SourceResolver: Send + Sync {
    fn resolve(&self, target: &OperationTarget) -> Result<ResolvedOperation, InvocationError>;
}

/// A `SourceResolver` backed by a static `operationId -> (method, url)`
/// table, useful for tests and small fixed deployments.
pub struct StaticSourceResolver {
    operations: HashMap<String, ResolvedOperation>,
}

impl StaticSourceResolver {
    pub fn new(operations: HashMap<String, ResolvedOperation>) -> Self {
        Self { operations }
    }
}

impl SourceResolver for StaticSourceResolver {
    fn resolve(&self, target: &OperationTarget) -> Result<ResolvedOperation, InvocationError> {
        match target {
            OperationTarget::OperationId(id) => self
                .operations
                .get(id)
                .cloned()
                .ok_or_else(|| InvocationError::UnresolvedTarget(id.clone())),
            OperationTarget::OperationPath { source_url, pointer } => {
                // `operationPath` pointers follow the OpenAPI convention
                // `#/paths/{path}/{method}`: the last segment names the
                // method directly, so no guess is needed here.
                let method = pointer
                    .rsplit('/')
                    .next()
                    .filter(|s| HTTP_METHODS.contains(s))
                    .map(|s| s.to_uppercase())
                    .ok_or_else(|| {
                        InvocationError::UnresolvedTarget(format!(
                            "operationPath '{pointer}' does not end in a recognized HTTP method"
                        ))
                    })?;
                Ok(ResolvedOperation { method, url_template: format!("{source_url}{pointer}") })
            }
        }
    }
}

pub struct HttpInvoker<R: SourceResolver> {
    client: Client,
    resolver: R,
}

impl<R: SourceResolver> HttpInvoker<R> {
    pub fn new(resolver: R) -> Self {
        Self::with_timeout(resolver, Duration::from_secs(30))
    }

    pub fn with_timeout(resolver: R, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .expect("failed to build HTTP client");
        Self { client, resolver }
    }

    fn apply_path_parameters(url_template: &str, parameters: &[ResolvedParameter]) -> String {
        let mut url = url_template.to_string();
        for p in parameters.iter().filter(|p| p.location == ParameterLocation::Path) {
            url = url.replace(&format!("{{{}}}", p.name), &stringify(&p.value));
        }
        url
    }
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[async_trait]
impl<R: SourceResolver + Send + Sync> OperationInvoker for HttpInvoker<R> {
    async fn invoke(
        &self,
        target: &OperationTarget,
        parameters: &[ResolvedParameter],
        body: Option<&RequestPayload>,
    ) -> Result<InvocationResponse, InvocationError> {
        let resolved = self.resolver.resolve(target)?;
        let url = Self::apply_path_parameters(&resolved.url_template, parameters);
        debug!(method = %resolved.method, url = %url, "invoking operation");

        let mut builder = self
            .client
            .request(
                resolved.method.parse().map_err(|_| {
                    InvocationError::UnresolvedTarget(format!("invalid HTTP method '{}'", resolved.method))
                })?,
                &url,
            );

        for p in parameters.iter().filter(|p| p.location == ParameterLocation::Query) {
            builder = builder.query(&[(p.name.as_str(), stringify(&p.value))]);
        }
        for p in parameters.iter().filter(|p| p.location == ParameterLocation::Header) {
            builder = builder.header(p.name.as_str(), stringify(&p.value));
        }
        if let Some(payload) = body {
            builder = builder.json(&payload.body);
            if let Some(content_type) = &payload.content_type {
                builder = builder.header("Content-Type", content_type.as_str());
            }
        }

        let response = builder.send().await.map_err(convert_reqwest_error)?;
        let status_code = response.status().as_u16();
        let mut headers: HashMap<String, Vec<String>> = HashMap::new();
        for (name, value) in response.headers() {
            if let Ok(text) = value.to_str() {
                headers.entry(name.to_string()).or_default().push(text.to_string());
            }
        }
        let body_text = response.text().await.map_err(convert_reqwest_error)?;
        let body_json: Value = if body_text.is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&body_text).unwrap_or(Value::String(body_text))
        };

        info!(status_code, "operation invoked");
        Ok(InvocationResponse { status_code, headers, body: body_json })
    }
}
