// Copyright (c) 2025 Arazzo Engine Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Arazzo workflow execution engine.

use std::time::Duration;
use thiserror::Error;

/// Errors raised by document loading, expression/criterion evaluation,
/// step execution, and workflow orchestration.
#[derive(Debug, Error)]
pub enum ArazzoError {
    /// A structural violation detected while loading or validating a document:
    /// a missing required field, a bad id pattern, an unresolvable `dependsOn`,
    /// or a dependency cycle.
    #[error("invalid document at {path}: {message}")]
    DocumentInvalid { path: String, message: String },

    /// A runtime expression failed to resolve where resolution was required
    /// (i.e. not inside an embedded template, which degrades to `"None"`).
    #[error("failed to evaluate expression '{expression}': {message}")]
    Expression { expression: String, message: String },

    /// A criterion could not be evaluated: a regex context resolved to `null`,
    /// an operand type mismatch on an ordering comparison, or an unsupported
    /// dialect (`xpath`).
    #[error("failed to evaluate criterion: {message}")]
    Criterion { message: String },

    /// The operation invoker returned a transport-level error, distinct from
    /// a non-2xx HTTP response (which is data, not an error).
    #[error(transparent)]
    Invocation(#[from] InvocationError),

    /// A step's success criteria did not hold and no failure action handled it.
    #[error("step '{step_id}' failed and no failure action handled it")]
    StepFailed { step_id: String },

    /// A workflow reached a terminal failure state.
    #[error("workflow '{workflow_id}' failed")]
    WorkflowFailed { workflow_id: String },

    /// Execution was cancelled via the caller-supplied cancellation token.
    #[error("workflow execution was cancelled")]
    Cancelled,

    /// A per-step deadline elapsed before the operation invoker returned.
    #[error("step execution timed out after {duration:?}")]
    Timeout { duration: Duration },

    /// Sub-workflow invocation exceeded the configured nesting cap.
    #[error("workflow nesting depth {depth} exceeds the configured maximum")]
    NestingTooDeep { depth: usize },
}

impl ArazzoError {
    pub fn document_invalid(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DocumentInvalid {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn expression(expression: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Expression {
            expression: expression.into(),
            message: message.into(),
        }
    }

    pub fn criterion(message: impl Into<String>) -> Self {
        Self::Criterion {
            message: message.into(),
        }
    }
}

/// Transport-level errors surfaced by an [`crate::invoker::OperationInvoker`].
///
/// Kept separate from [`ArazzoError`] so invoker crates do not need to depend
/// on the full engine error surface; `From<InvocationError> for ArazzoError`
/// lifts these at the step-runner boundary.
#[derive(Debug, Error)]
pub enum InvocationError {
    #[error("transport error calling operation: {0}")]
    Transport(String),

    #[error("could not resolve operation target: {0}")]
    UnresolvedTarget(String),

    #[error("invoker returned a malformed response: {0}")]
    MalformedResponse(String),
}

/// Convenience `Result` alias used throughout the engine.
pub type Result<T> = std::result::Result<T, ArazzoError>;
