// Copyright (c) 2025 LLM DevOps
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The orchestrator (§4.C5): loads a recipe, validates its shape, drives
//! steps sequentially, and propagates errors with step-index context.
//!
//! The Executor holds no state between runs. Two concurrent `execute`
//! calls against different state objects are independent of one another;
//! this struct is a thin, cheaply-cloned handle around the shared
//! [`EngineContext`].

use serde_json::Value;
use tracing::debug;

use crate::context::EngineContext;
use crate::error::{EngineError, Result};
use crate::recipe::Recipe;
use crate::state::State;

/// Drives a single recipe against a state, one step at a time.
#[derive(Clone)]
pub struct Executor {
    ctx: EngineContext,
}

impl Executor {
    pub fn new(ctx: EngineContext) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &EngineContext {
        &self.ctx
    }

    /// Loads a recipe from a path, raw JSON text, or already-parsed value,
    /// then executes it. See [`Recipe::load`]/[`Recipe::from_value`] for
    /// the load/validate contract.
    pub async fn execute_source(&self, source: &str, state: &mut State) -> Result<()> {
        debug!(source, "loading recipe");
        let recipe = Recipe::load(source)?;
        self.execute(&recipe, state).await
    }

    pub async fn execute_value(&self, value: Value, state: &mut State) -> Result<()> {
        let recipe = Recipe::from_value(value)?;
        self.execute(&recipe, state).await
    }

    /// Executes an already-loaded recipe's steps strictly in source order.
    /// Step `i+1` never starts before step `i` completes.
    pub async fn execute(&self, recipe: &Recipe, state: &mut State) -> Result<()> {
        debug!(steps = recipe.steps.len(), "executing recipe");

        for (index, spec) in recipe.steps.iter().enumerate() {
            debug!(
                index,
                step_type = %spec.step_type,
                config = %summarize_config(&spec.config),
                "executing step"
            );

            let constructor = self.ctx.registry.get(&spec.step_type).ok_or_else(|| {
                EngineError::UnknownStepType {
                    index,
                    step_type: spec.step_type.clone(),
                }
            })?;

            let step = constructor(std::sync::Arc::new(self.ctx.clone()), spec.config.clone())
                .map_err(|e| EngineError::step_failure(index, spec.step_type.clone(), e))?;

            step.run(state)
                .await
                .map_err(|e| EngineError::step_failure(index, spec.step_type.clone(), e))?;
        }

        Ok(())
    }
}

/// Produces a short, loggable summary of a step config (debug logging
/// only; never the full payload).
fn summarize_config(config: &Value) -> String {
    match config {
        Value::Object(map) => {
            let keys: Vec<&str> = map.keys().map(String::as_str).collect();
            format!("{{{}}}", keys.join(", "))
        }
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ProviderRegistry;
    use crate::registry::StepRegistry;
    use crate::steps::register_builtin_steps;
    use serde_json::json;

    fn test_context() -> EngineContext {
        let mut registry = StepRegistry::new();
        register_builtin_steps(&mut registry);
        EngineContext::new(registry, ProviderRegistry::new())
    }

    #[tokio::test]
    async fn unknown_step_type_fails_fast() {
        let executor = Executor::new(test_context());
        let mut state = State::new();
        let result = executor
            .execute_value(json!({"steps": [{"type": "totally_bogus", "config": {}}]}), &mut state)
            .await;

        match result {
            Err(EngineError::UnknownStepType { index, step_type }) => {
                assert_eq!(index, 0);
                assert_eq!(step_type, "totally_bogus");
            }
            other => panic!("expected UnknownStepType, got {other:?}"),
        }
        assert_eq!(state.artifacts_len(), 0);
    }

    #[tokio::test]
    async fn sequential_set_context_scenario_a() {
        let executor = Executor::new(test_context());
        let mut state = State::new();
        executor
            .execute_value(
                json!({"steps": [
                    {"type": "set_context", "config": {"key": "x", "value": "hello"}},
                    {"type": "set_context", "config": {"key": "x", "value": "{{x}} world"}}
                ]}),
                &mut state,
            )
            .await
            .unwrap();

        assert_eq!(state.get("x"), Some(&json!("hello world")));
    }
}
