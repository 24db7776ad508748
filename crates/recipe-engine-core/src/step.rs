// Copyright (c) 2025 LLM DevOps
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The common step lifecycle contract.

use async_trait::async_trait;

use crate::error::Result;
use crate::state::State;

/// Every step exposes a single asynchronous operation `run(state)`.
///
/// Configuration is parsed and validated when the step is constructed (see
/// [`crate::registry::StepConstructor`]); by the time `run` is called all
/// required fields are present and typed. Steps may suspend on I/O. Steps
/// may not assume exclusive access to state unless the engine arranged
/// cloning for them (Loop/Parallel/ExecuteRecipe-with-overrides do).
#[async_trait]
pub trait Step: Send + Sync {
    async fn run(&self, state: &mut State) -> Result<()>;
}
