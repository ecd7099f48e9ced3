// Copyright (c) 2025 Arazzo Engine Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Converts transport-level failures into the engine's `InvocationError`.

use arazzo_core::error::InvocationError;

/// Maps a `reqwest::Error` onto the engine's small invocation error enum,
/// classifying by timeout first and then by HTTP status.
pub fn convert_reqwest_error(err: reqwest::Error) -> InvocationError {
    if err.is_timeout() {
        return InvocationError::Transport(format!("request timed out: {err}"));
    }
    if let Some(status) = err.status() {
        return InvocationError::Transport(format!("HTTP {status}: {err}"));
    }
    InvocationError::Transport(err.to_string())
}
