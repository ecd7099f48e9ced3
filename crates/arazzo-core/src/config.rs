// Copyright (c) 2025 Arazzo Engine Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Engine configuration that sits outside the document: everything that
//! is externally configured rather than document-declared.

use std::time::Duration;

/// The default cap on sub-workflow recursion depth.
pub const DEFAULT_MAX_NESTING_DEPTH: usize = 32;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Per-step deadline. When set, supersedes any remaining `retryAfter`
    /// wait and wraps the invoker call in `tokio::time::timeout`.
    pub step_timeout: Option<Duration>,
    /// Hard cap on sub-workflow call depth before `NestingTooDeep` fires.
    pub max_nesting_depth: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            step_timeout: None,
            max_nesting_depth: DEFAULT_MAX_NESTING_DEPTH,
        }
    }
}

impl EngineConfig {
    pub fn with_step_timeout(mut self, timeout: Duration) -> Self {
        self.step_timeout = Some(timeout);
        self
    }

    pub fn with_max_nesting_depth(mut self, depth: usize) -> Self {
        self.max_nesting_depth = depth;
        self
    }
}
