// Copyright (c) 2025 LLM DevOps
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SetContext: writes a templated value under `key` (§4.C13).

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

use crate::context::EngineContext;
use crate::error::Result;
use crate::state::State;
use crate::step::Step;
use crate::template::CompiledTemplate;
use crate::steps::util::{compile_value_recursive, merge_values, render_compiled_value_recursive, CompiledValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
enum IfExists {
    Overwrite,
    Merge,
}

impl Default for IfExists {
    fn default() -> Self {
        IfExists::Overwrite
    }
}

#[derive(Deserialize)]
struct Config {
    key: String,
    #[serde(default)]
    value: Value,
    #[serde(default)]
    if_exists: IfExists,
    #[serde(default)]
    nested_render: bool,
}

pub struct SetContextStep {
    ctx: Arc<EngineContext>,
    config: Config,
    key: CompiledTemplate,
    value: CompiledValue,
}

impl SetContextStep {
    pub fn new(ctx: Arc<EngineContext>, config: Value) -> Result<Self> {
        let config: Config = serde_json::from_value(config)
            .map_err(|e| crate::error::EngineError::config(format!("invalid set_context config: {e}")))?;
        let key = ctx.renderer.compile(&config.key)?;
        let value = compile_value_recursive(&ctx.renderer, &config.value)?;
        Ok(Self { ctx, config, key, value })
    }
}

#[async_trait]
impl Step for SetContextStep {
    async fn run(&self, state: &mut State) -> Result<()> {
        let key = self.ctx.renderer.render_compiled(&self.key, state)?;
        let mut rendered = render_compiled_value_recursive(&self.ctx.renderer, state, &self.value)?;

        if self.config.nested_render {
            if let Value::String(s) = &rendered {
                rendered = Value::String(self.ctx.renderer.render(s, state)?);
            }
        }

        let final_value = match (self.config.if_exists, state.get(&key)) {
            (IfExists::Merge, Some(existing)) => merge_values(existing, &rendered),
            _ => rendered,
        };

        state.set(key, final_value);
        Ok(())
    }
}
