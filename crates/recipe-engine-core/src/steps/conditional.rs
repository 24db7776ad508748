// Copyright (c) 2025 LLM DevOps
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conditional: render a condition, evaluate it, run one sub-step list (§4.C8).

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

use crate::condition;
use crate::context::EngineContext;
use crate::error::Result;
use crate::executor::Executor;
use crate::recipe::{Recipe, StepSpec};
use crate::state::State;
use crate::step::Step;
use crate::template::CompiledTemplate;

#[derive(Default, Deserialize)]
struct Branch {
    #[serde(default)]
    steps: Vec<StepSpec>,
}

#[derive(Deserialize)]
struct Config {
    condition: String,
    #[serde(default)]
    if_true: Option<Branch>,
    #[serde(default)]
    if_false: Option<Branch>,
}

pub struct ConditionalStep {
    ctx: Arc<EngineContext>,
    config: Config,
    condition: CompiledTemplate,
}

impl ConditionalStep {
    pub fn new(ctx: Arc<EngineContext>, config: Value) -> Result<Self> {
        let config: Config = serde_json::from_value(config)
            .map_err(|e| crate::error::EngineError::config(format!("invalid conditional config: {e}")))?;
        let condition = ctx.renderer.compile(&config.condition)?;
        Ok(Self { ctx, config, condition })
    }
}

#[async_trait]
impl Step for ConditionalStep {
    async fn run(&self, state: &mut State) -> Result<()> {
        let rendered = self.ctx.renderer.render_compiled(&self.condition, state)?;
        let truthy = condition::evaluate(&rendered)?;

        let branch = if truthy { &self.config.if_true } else { &self.config.if_false };
        let Some(branch) = branch else { return Ok(()) };

        let recipe = Recipe {
            name: None,
            description: None,
            inputs: Value::Null,
            steps: branch.steps.clone(),
        };
        let executor = Executor::new((*self.ctx).clone());
        executor.execute(&recipe, state).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ProviderRegistry;
    use crate::registry::StepRegistry;
    use crate::steps::register_builtin_steps;
    use serde_json::json;

    fn ctx() -> Arc<EngineContext> {
        let mut registry = StepRegistry::new();
        register_builtin_steps(&mut registry);
        Arc::new(EngineContext::new(registry, ProviderRegistry::new()))
    }

    #[tokio::test]
    async fn chooses_true_branch() {
        let step = ConditionalStep::new(
            ctx(),
            json!({
                "condition": "{{ready}}",
                "if_true": {"steps": [{"type": "set_context", "config": {"key": "w", "value": "T"}}]},
                "if_false": {"steps": [{"type": "set_context", "config": {"key": "w", "value": "F"}}]}
            }),
        )
        .unwrap();
        let mut state = State::new();
        state.set("ready", json!(true));
        step.run(&mut state).await.unwrap();
        assert_eq!(state.get("w"), Some(&json!("T")));
    }

    #[tokio::test]
    async fn chooses_false_branch() {
        let step = ConditionalStep::new(
            ctx(),
            json!({
                "condition": "{{ready}}",
                "if_true": {"steps": [{"type": "set_context", "config": {"key": "w", "value": "T"}}]},
                "if_false": {"steps": [{"type": "set_context", "config": {"key": "w", "value": "F"}}]}
            }),
        )
        .unwrap();
        let mut state = State::new();
        state.set("ready", json!(false));
        step.run(&mut state).await.unwrap();
        assert_eq!(state.get("w"), Some(&json!("F")));
    }

    #[tokio::test]
    async fn missing_branch_is_noop() {
        let step = ConditionalStep::new(ctx(), json!({"condition": "false"})).unwrap();
        let mut state = State::new();
        step.run(&mut state).await.unwrap();
        assert_eq!(state.artifacts_len(), 0);
    }
}
