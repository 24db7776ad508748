// Copyright (c) 2025 LLM DevOps
// SPDX-License-Identifier: MIT OR Apache-2.0

//! ExecuteRecipe: invoke a sub-recipe sharing the parent state (§4.C11).

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

use crate::context::EngineContext;
use crate::error::Result;
use crate::executor::Executor;
use crate::recipe::Recipe;
use crate::state::State;
use crate::step::Step;
use crate::template::CompiledTemplate;
use crate::steps::util::{compile_value_recursive, render_compiled_value_recursive, CompiledValue};

#[derive(Deserialize)]
struct Config {
    recipe_path: String,
    #[serde(default)]
    context_overrides: Value,
}

pub struct ExecuteRecipeStep {
    ctx: Arc<EngineContext>,
    recipe_path: CompiledTemplate,
    context_overrides: CompiledValue,
}

impl ExecuteRecipeStep {
    pub fn new(ctx: Arc<EngineContext>, config: Value) -> Result<Self> {
        let config: Config = serde_json::from_value(config)
            .map_err(|e| crate::error::EngineError::config(format!("invalid execute_recipe config: {e}")))?;
        let recipe_path = ctx.renderer.compile(&config.recipe_path)?;
        let context_overrides = compile_value_recursive(&ctx.renderer, &config.context_overrides)?;
        Ok(Self { ctx, recipe_path, context_overrides })
    }
}

#[async_trait]
impl Step for ExecuteRecipeStep {
    async fn run(&self, state: &mut State) -> Result<()> {
        let rendered_path = self.ctx.renderer.render_compiled(&self.recipe_path, state)?;
        let resolved_path = self.ctx.resolve_path(&rendered_path);

        let overrides = render_compiled_value_recursive(&self.ctx.renderer, state, &self.context_overrides)?;
        if let Value::Object(map) = overrides {
            for (key, value) in map {
                state.set(key, value);
            }
        }

        let recipe = Recipe::load(&resolved_path.to_string_lossy())?;
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
    use std::io::Write;

    fn ctx(base_dir: std::path::PathBuf) -> Arc<EngineContext> {
        let mut registry = StepRegistry::new();
        register_builtin_steps(&mut registry);
        Arc::new(EngineContext::new(registry, ProviderRegistry::new()).with_base_dir(base_dir))
    }

    #[tokio::test]
    async fn overrides_render_before_invocation() {
        let dir = tempfile::tempdir().unwrap();
        let sub_path = dir.path().join("sub.json");
        let mut file = std::fs::File::create(&sub_path).unwrap();
        write!(
            file,
            r#"{{"steps": [{{"type": "set_context", "config": {{"key": "out", "value": "{{{{greeting}}}}!"}}}}]}}"#
        )
        .unwrap();

        let step = ExecuteRecipeStep::new(
            ctx(dir.path().to_path_buf()),
            json!({"recipe_path": "sub.json", "context_overrides": {"greeting": "Hello {{name}}"}}),
        )
        .unwrap();

        let mut state = State::new();
        state.set("name", json!("Alice"));
        step.run(&mut state).await.unwrap();

        assert_eq!(state.get("out"), Some(&json!("Hello Alice!")));
    }
}
