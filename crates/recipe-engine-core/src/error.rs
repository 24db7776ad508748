// Copyright (c) 2025 LLM DevOps
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error taxonomy for the recipe execution engine.

use std::fmt;

/// Result alias used throughout the engine.
pub type Result<T> = std::result::Result<T, EngineError>;

/// All errors the engine can surface.
///
/// Every fatal error names the step index, the step type, and the
/// underlying cause where one is known at the point of failure (see
/// [`EngineError::StepFailure`]); the CLI boundary is responsible for
/// rendering the summary-line-then-cause-chain format.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Malformed recipe, unknown step type, missing required field.
    #[error("config error: {0}")]
    Config(String),

    /// Unknown step type encountered during dispatch.
    #[error("unknown step type '{step_type}' at step index {index}")]
    UnknownStepType { index: usize, step_type: String },

    /// Unrenderable template fragment.
    #[error("template error rendering `{fragment}`: {message}")]
    Template { fragment: String, message: String },

    /// Any error raised during a step's `run()`, wrapped with its index and type.
    #[error("step {index} ({step_type}) failed: {cause}")]
    StepFailure {
        index: usize,
        step_type: String,
        #[source]
        cause: Box<EngineError>,
    },

    /// Per-iteration failure inside a Loop step.
    #[error("loop item {key} failed: {cause}")]
    LoopItem {
        key: LoopItemKey,
        #[source]
        cause: Box<EngineError>,
    },

    /// LLM transport/API/timeout failure.
    #[error("llm error ({provider}/{model}): {cause}")]
    Llm {
        provider: String,
        model: String,
        cause: String,
    },

    /// Structured-output schema validation failure.
    #[error("llm structured output did not match schema: {message}")]
    LlmSchema { payload: String, message: String },

    /// A built-in tool was used with a provider that does not support it.
    #[error("tool validation error: {0}")]
    ToolValidation(String),

    /// File not found, permission denied, encoding failure, etc.
    #[error("io error: {0}")]
    Io(String),

    /// MCP handle construction or invocation failure.
    #[error("mcp error: {0}")]
    Mcp(String),

    /// Cooperative cancellation. Not logged as a failure by callers that
    /// recognize it; it short-circuits ordinary completion.
    #[error("cancelled")]
    Cancelled,
}

/// Identifies which iteration of a Loop step an error came from.
#[derive(Debug, Clone)]
pub enum LoopItemKey {
    Index(usize),
    Key(String),
}

impl fmt::Display for LoopItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoopItemKey::Index(i) => write!(f, "#{i}"),
            LoopItemKey::Key(k) => write!(f, "{k:?}"),
        }
    }
}

impl EngineError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self::Io(msg.into())
    }

    pub fn mcp(msg: impl Into<String>) -> Self {
        Self::Mcp(msg.into())
    }

    /// Wraps `cause` as a [`EngineError::StepFailure`] naming `index`/`step_type`.
    pub fn step_failure(index: usize, step_type: impl Into<String>, cause: EngineError) -> Self {
        Self::StepFailure {
            index,
            step_type: step_type.into(),
            cause: Box::new(cause),
        }
    }

    /// Renders a single-line summary followed by the full cause chain, as
    /// mandated for the top-level error renderer.
    pub fn render_chain(&self) -> String {
        let mut lines = vec![self.to_string()];
        let mut source: Option<&(dyn std::error::Error + 'static)> = std::error::Error::source(self);
        while let Some(err) = source {
            lines.push(format!("  caused by: {err}"));
            source = err.source();
        }
        lines.join("\n")
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        Self::Config(format!("json error: {err}"))
    }
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
