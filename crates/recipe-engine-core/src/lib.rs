// Copyright (c) 2025 LLM DevOps
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The recipe execution engine: a declarative workflow engine that
//! consumes a JSON recipe and executes an ordered list of typed steps
//! against a shared mutable state container.
//!
//! See [`Executor`] for the orchestrator, [`State`] for the shared state
//! container, and [`steps`] for the built-in step implementations.

pub mod condition;
pub mod config;
pub mod context;
pub mod error;
pub mod executor;
pub mod llm;
pub mod mcp;
pub mod recipe;
pub mod registry;
pub mod state;
pub mod step;
pub mod steps;
pub mod template;

pub use context::EngineContext;
pub use error::{EngineError, Result};
pub use executor::Executor;
pub use recipe::{Recipe, StepSpec};
pub use registry::StepRegistry;
pub use state::State;
pub use step::Step;

/// Crate version, exposed for diagnostics and `--version` output.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
