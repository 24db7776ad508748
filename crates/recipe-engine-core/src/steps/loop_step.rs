// Copyright (c) 2025 LLM DevOps
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Loop: bounded-concurrency iteration over a collection with per-item
//! state isolation and input-order result collection (§4.C9).

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

use crate::context::EngineContext;
use crate::error::{EngineError, LoopItemKey, Result};
use crate::executor::Executor;
use crate::recipe::{Recipe, StepSpec};
use crate::state::State;
use crate::step::Step;
use crate::template::CompiledTemplate;
use crate::steps::concurrency::{build_semaphore, CancelToken};

fn default_max_concurrency() -> usize {
    1
}

fn default_true() -> bool {
    true
}

#[derive(Deserialize)]
struct Config {
    items: Value,
    item_key: String,
    #[serde(default = "default_max_concurrency")]
    max_concurrency: usize,
    #[serde(default)]
    delay: f64,
    #[serde(default)]
    substeps: Vec<StepSpec>,
    result_key: String,
    #[serde(default = "default_true")]
    fail_fast: bool,
}

enum Items {
    List(Vec<Value>),
    Mapping(Vec<(String, Value)>),
}

fn items_from_value(value: Value) -> Result<Items> {
    match value {
        Value::Array(items) => Ok(Items::List(items)),
        Value::Object(map) => Ok(Items::Mapping(map.into_iter().collect())),
        other => Err(EngineError::config(format!(
            "loop `items` must resolve to a list or mapping, got {other}"
        ))),
    }
}

/// `items`, precompiled: a literal list/mapping is kept as-is; a string is
/// compiled into a template that, once rendered, is treated as a dotted
/// path into `state` (§9 "Loop `items` as path vs. literal").
enum ItemsTemplate {
    Path(CompiledTemplate),
    Literal(Value),
}

fn compile_items_template(ctx: &EngineContext, raw: &Value) -> Result<ItemsTemplate> {
    match raw {
        Value::String(s) => Ok(ItemsTemplate::Path(ctx.renderer.compile(s)?)),
        other => Ok(ItemsTemplate::Literal(other.clone())),
    }
}

fn resolve_items(ctx: &EngineContext, state: &State, template: &ItemsTemplate) -> Result<Items> {
    match template {
        ItemsTemplate::Path(t) => {
            let rendered = ctx.renderer.render_compiled(t, state)?;
            let path = rendered.trim();
            match state.get_path(path) {
                Some(value) => items_from_value(value.clone()),
                None => Err(EngineError::config(format!(
                    "loop `items` path `{path}` was not found in state"
                ))),
            }
        }
        ItemsTemplate::Literal(v) => items_from_value(v.clone()),
    }
}

pub struct LoopStep {
    ctx: Arc<EngineContext>,
    config: Config,
    items: ItemsTemplate,
}

impl LoopStep {
    pub fn new(ctx: Arc<EngineContext>, config: Value) -> Result<Self> {
        let config: Config = serde_json::from_value(config)
            .map_err(|e| EngineError::config(format!("invalid loop config: {e}")))?;
        let items = compile_items_template(&ctx, &config.items)?;
        Ok(Self { ctx, config, items })
    }
}

#[async_trait]
impl Step for LoopStep {
    async fn run(&self, state: &mut State) -> Result<()> {
        let items = resolve_items(&self.ctx, state, &self.items)?;
        let entries: Vec<(LoopItemKey, Value)> = match items {
            Items::List(list) => list
                .into_iter()
                .enumerate()
                .map(|(i, v)| (LoopItemKey::Index(i), v))
                .collect(),
            Items::Mapping(map) => map.into_iter().map(|(k, v)| (LoopItemKey::Key(k), v)).collect(),
        };

        let n = entries.len();
        let semaphore = build_semaphore(self.config.max_concurrency);
        let cancel = CancelToken::new();
        let mut join_set = tokio::task::JoinSet::new();

        for (idx, (key, item_value)) in entries.into_iter().enumerate() {
            if idx > 0 && self.config.delay > 0.0 {
                tokio::time::sleep(Duration::from_secs_f64(self.config.delay)).await;
            }

            let ctx = self.ctx.clone();
            let substeps = self.config.substeps.clone();
            let item_key = self.config.item_key.clone();
            let base_state = state.clone_isolated();
            let permit_pool = semaphore.clone();
            let cancel_token = cancel.clone();

            join_set.spawn(async move {
                if cancel_token.is_cancelled() {
                    return (idx, key, Err(EngineError::Cancelled));
                }
                let _permit = match permit_pool.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return (idx, key, Err(EngineError::Cancelled)),
                };
                if cancel_token.is_cancelled() {
                    return (idx, key, Err(EngineError::Cancelled));
                }

                let mut item_state = base_state;
                item_state.set(item_key.clone(), item_value);
                match &key {
                    LoopItemKey::Index(i) => item_state.set("__index", json!(*i)),
                    LoopItemKey::Key(k) => item_state.set("__key", json!(k)),
                }

                let recipe = Recipe {
                    name: None,
                    description: None,
                    inputs: Value::Null,
                    steps: substeps,
                };
                let executor = Executor::new((*ctx).clone());
                let outcome = executor
                    .execute(&recipe, &mut item_state)
                    .await
                    .map(|_| item_state.get(&item_key).cloned().unwrap_or(Value::Null));
                (idx, key, outcome)
            });
        }

        let mut results: Vec<Option<Value>> = vec![None; n];
        let mut errors: Vec<Value> = Vec::new();

        while let Some(joined) = join_set.join_next().await {
            let (idx, key, outcome) = joined.map_err(|e| EngineError::config(format!("loop task panicked: {e}")))?;
            match outcome {
                Ok(value) => results[idx] = Some(value),
                Err(cause) => {
                    errors.push(json!({"index": idx, "key": key.to_string(), "error": cause.to_string()}));
                    if self.config.fail_fast {
                        cancel.cancel();
                        join_set.abort_all();
                        return Err(EngineError::LoopItem {
                            key,
                            cause: Box::new(cause),
                        });
                    }
                    results[idx] = Some(json!({"__error": cause.to_string()}));
                }
            }
        }

        let collected: Vec<Value> = results.into_iter().map(|r| r.unwrap_or(Value::Null)).collect();
        state.set(self.config.result_key.clone(), Value::Array(collected));
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
    async fn preserves_order_under_bounded_concurrency() {
        let step = LoopStep::new(
            ctx(),
            json!({
                "items": "data",
                "item_key": "it",
                "max_concurrency": 2,
                "delay": 0,
                "substeps": [{"type": "set_context", "config": {"key": "it", "value": "{{it}}!"}}],
                "result_key": "out"
            }),
        )
        .unwrap();
        let mut state = State::new();
        state.set("data", json!(["a", "b", "c", "d"]));
        step.run(&mut state).await.unwrap();
        assert_eq!(state.get("out"), Some(&json!(["a!", "b!", "c!", "d!"])));
    }

    #[tokio::test]
    async fn empty_collection_produces_empty_result() {
        let step = LoopStep::new(
            ctx(),
            json!({
                "items": [],
                "item_key": "it",
                "substeps": [],
                "result_key": "out"
            }),
        )
        .unwrap();
        let mut state = State::new();
        step.run(&mut state).await.unwrap();
        assert_eq!(state.get("out"), Some(&json!([])));
    }

    #[tokio::test]
    async fn fail_fast_false_accumulates_errors() {
        let step = LoopStep::new(
            ctx(),
            json!({
                "items": [1, 2, 3],
                "item_key": "it",
                "fail_fast": false,
                "substeps": [{
                    "type": "conditional",
                    "config": {
                        "condition": "{{it}} == 2",
                        "if_true": {"steps": [{"type": "totally_bogus", "config": {}}]}
                    }
                }],
                "result_key": "out"
            }),
        )
        .unwrap();
        let mut state = State::new();
        step.run(&mut state).await.unwrap();

        let out = state.get("out").unwrap().as_array().unwrap();
        assert_eq!(out.len(), 3);
        assert!(out[1].get("__error").is_some());
        let errors = state.get("__errors").unwrap().as_array().unwrap();
        assert_eq!(errors.len(), 1);
    }

    #[tokio::test]
    async fn fail_fast_true_aborts_with_loop_item_error() {
        let step = LoopStep::new(
            ctx(),
            json!({
                "items": [1, 2, 3],
                "item_key": "it",
                "fail_fast": true,
                "substeps": [{
                    "type": "conditional",
                    "config": {
                        "condition": "{{it}} == 2",
                        "if_true": {"steps": [{"type": "totally_bogus", "config": {}}]}
                    }
                }],
                "result_key": "out"
            }),
        )
        .unwrap();
        let mut state = State::new();
        let result = step.run(&mut state).await;
        assert!(matches!(result, Err(EngineError::LoopItem { .. })));
    }
}
