// Copyright (c) 2025 Arazzo Engine Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Concrete `OperationInvoker` implementations for the Arazzo engine: an
//! HTTP invoker over `reqwest`, and an in-memory recording invoker used by
//! tests and the CLI's dry-run mode.

pub mod error;
pub mod http;
pub mod recording;

pub use http::{HttpInvoker, ResolvedOperation, SourceResolver, StaticSourceResolver};
pub use recording::RecordingInvoker;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
