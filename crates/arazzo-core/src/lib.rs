// Copyright (c) 2025 Arazzo Engine Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Document model and execution engine for the Arazzo workflow
//! specification format: parses a document, evaluates its runtime
//! expressions and criteria, and drives workflows to completion against a
//! pluggable [`invoker::OperationInvoker`].

pub mod config;
pub mod context;
pub mod criterion;
pub mod dag;
pub mod error;
pub mod expression;
pub mod invoker;
pub mod model;
pub mod retry;
pub mod step;
pub mod workflow;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use config::EngineConfig;
pub use context::ExecutionContext;
pub use error::{ArazzoError, InvocationError, Result};
pub use model::Document;
pub use workflow::{Orchestrator, WorkflowRunOutcome, WorkflowStatus};
