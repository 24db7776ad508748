// Copyright (c) 2025 LLM DevOps
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Parallel: fan out a fixed, heterogeneous list of steps, each in its own
//! state clone; mutations do not propagate back (§4.C10).

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

use crate::context::EngineContext;
use crate::error::{EngineError, Result};
use crate::recipe::StepSpec;
use crate::state::State;
use crate::step::Step;
use crate::steps::concurrency::{build_semaphore, CancelToken};

fn default_max_concurrency() -> usize {
    1
}

fn default_true() -> bool {
    true
}

#[derive(Deserialize)]
struct Config {
    #[serde(default)]
    substeps: Vec<StepSpec>,
    #[serde(default = "default_max_concurrency")]
    max_concurrency: usize,
    #[serde(default)]
    delay: f64,
    #[serde(default = "default_true")]
    fail_fast: bool,
}

pub struct ParallelStep {
    ctx: Arc<EngineContext>,
    config: Config,
}

impl ParallelStep {
    pub fn new(ctx: Arc<EngineContext>, config: Value) -> Result<Self> {
        let config: Config = serde_json::from_value(config)
            .map_err(|e| EngineError::config(format!("invalid parallel config: {e}")))?;
        Ok(Self { ctx, config })
    }
}

#[async_trait]
impl Step for ParallelStep {
    async fn run(&self, state: &mut State) -> Result<()> {
        let semaphore = build_semaphore(self.config.max_concurrency);
        let cancel = CancelToken::new();
        let mut join_set = tokio::task::JoinSet::new();

        for (idx, spec) in self.config.substeps.iter().cloned().enumerate() {
            if idx > 0 && self.config.delay > 0.0 {
                tokio::time::sleep(Duration::from_secs_f64(self.config.delay)).await;
            }

            let ctx = self.ctx.clone();
            let mut branch_state = state.clone_isolated();
            let permit_pool = semaphore.clone();
            let cancel_token = cancel.clone();

            join_set.spawn(async move {
                if cancel_token.is_cancelled() {
                    return (idx, spec.step_type.clone(), Err(EngineError::Cancelled));
                }
                let _permit = match permit_pool.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return (idx, spec.step_type.clone(), Err(EngineError::Cancelled)),
                };
                if cancel_token.is_cancelled() {
                    return (idx, spec.step_type.clone(), Err(EngineError::Cancelled));
                }

                let result = (|| async {
                    let constructor = ctx.registry.get(&spec.step_type).ok_or_else(|| EngineError::UnknownStepType {
                        index: idx,
                        step_type: spec.step_type.clone(),
                    })?;
                    let step = constructor(ctx.clone(), spec.config.clone())
                        .map_err(|e| EngineError::step_failure(idx, spec.step_type.clone(), e))?;
                    step.run(&mut branch_state)
                        .await
                        .map_err(|e| EngineError::step_failure(idx, spec.step_type.clone(), e))
                })()
                .await;

                (idx, spec.step_type.clone(), result)
            });
        }

        let mut errors: Vec<Value> = Vec::new();

        while let Some(joined) = join_set.join_next().await {
            let (idx, step_type, outcome) =
                joined.map_err(|e| EngineError::config(format!("parallel task panicked: {e}")))?;
            if let Err(cause) = outcome {
                errors.push(json!({"index": idx, "step_type": step_type, "error": cause.to_string()}));
                if self.config.fail_fast {
                    cancel.cancel();
                    join_set.abort_all();
                    return Err(cause);
                }
            }
        }

        if !errors.is_empty() {
            state.set("__errors", Value::Array(errors));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ProviderRegistry;
    use crate::registry::StepRegistry;
    use crate::steps::register_builtin_steps;

    fn ctx() -> Arc<EngineContext> {
        let mut registry = StepRegistry::new();
        register_builtin_steps(&mut registry);
        Arc::new(EngineContext::new(registry, ProviderRegistry::new()))
    }

    #[tokio::test]
    async fn branches_do_not_mutate_parent_state() {
        let step = ParallelStep::new(
            ctx(),
            json!({
                "substeps": [
                    {"type": "set_context", "config": {"key": "a", "value": "1"}},
                    {"type": "set_context", "config": {"key": "b", "value": "2"}}
                ],
                "max_concurrency": 2
            }),
        )
        .unwrap();
        let mut state = State::new();
        step.run(&mut state).await.unwrap();
        assert_eq!(state.get("a"), None);
        assert_eq!(state.get("b"), None);
    }

    #[tokio::test]
    async fn fail_fast_true_propagates_first_error() {
        let step = ParallelStep::new(
            ctx(),
            json!({"substeps": [{"type": "totally_bogus", "config": {}}], "fail_fast": true}),
        )
        .unwrap();
        let mut state = State::new();
        assert!(step.run(&mut state).await.is_err());
    }
}
