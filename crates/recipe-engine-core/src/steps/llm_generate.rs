// Copyright (c) 2025 LLM DevOps
// SPDX-License-Identifier: MIT OR Apache-2.0

//! LLMGenerate: render prompt/model, coerce `output_format` into a
//! structured-output descriptor, invoke the LLM capability, normalize and
//! store the result (§4.C12).

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

use crate::context::EngineContext;
use crate::error::{EngineError, Result};
use crate::llm::{BuiltinTool, GenerateOptions, GenerateResult, OutputType, ProviderRegistry};
use crate::mcp;
use crate::state::State;
use crate::step::Step;
use crate::template::CompiledTemplate;
use crate::steps::util::{compile_value_recursive, render_compiled_value_recursive, CompiledValue};

#[derive(Deserialize)]
struct Config {
    prompt: String,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    max_tokens: Option<Value>,
    #[serde(default)]
    mcp_servers: Vec<Value>,
    #[serde(default)]
    openai_builtin_tools: Vec<BuiltinToolConfig>,
    output_format: Value,
    output_key: String,
}

#[derive(Deserialize)]
struct BuiltinToolConfig {
    #[serde(rename = "type")]
    tool_type: String,
}

pub struct LLMGenerateStep {
    ctx: Arc<EngineContext>,
    prompt: CompiledTemplate,
    model: Option<CompiledTemplate>,
    max_tokens: Option<Value>,
    mcp_servers: Vec<CompiledValue>,
    builtin_tools: Vec<BuiltinTool>,
    output_type: OutputType,
    output_key: CompiledTemplate,
}

impl LLMGenerateStep {
    pub fn new(ctx: Arc<EngineContext>, config: Value) -> Result<Self> {
        let config: Config = serde_json::from_value(config)
            .map_err(|e| EngineError::config(format!("invalid llm_generate config: {e}")))?;
        let prompt = ctx.renderer.compile(&config.prompt)?;
        let model = config.model.as_deref().map(|m| ctx.renderer.compile(m)).transpose()?;
        let mcp_servers = config
            .mcp_servers
            .iter()
            .map(|raw| compile_value_recursive(&ctx.renderer, raw))
            .collect::<Result<Vec<_>>>()?;
        let builtin_tools = config
            .openai_builtin_tools
            .iter()
            .map(|t| BuiltinTool { tool_type: t.tool_type.clone() })
            .collect();
        let output_type = output_type_from_format(&config.output_format)?;
        let output_key = ctx.renderer.compile(&config.output_key)?;
        Ok(Self {
            ctx,
            prompt,
            model,
            max_tokens: config.max_tokens,
            mcp_servers,
            builtin_tools,
            output_type,
            output_key,
        })
    }
}

fn parse_max_tokens(value: &Option<Value>) -> Result<Option<u32>> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => Ok(n.as_u64().map(|v| v as u32)),
        Some(Value::String(s)) => s
            .parse::<u32>()
            .map(Some)
            .map_err(|_| EngineError::config(format!("`max_tokens` is not a valid integer: {s}"))),
        Some(other) => Err(EngineError::config(format!("`max_tokens` must be a number or numeric string, got {other}"))),
    }
}

fn output_type_from_format(format: &Value) -> Result<OutputType> {
    match format {
        Value::String(s) if s == "text" => Ok(OutputType::Text),
        Value::String(s) if s == "files" => Ok(OutputType::Files),
        Value::Object(_) => Ok(OutputType::Object { schema: format.clone() }),
        Value::Array(items) if items.len() == 1 && items[0].is_object() => Ok(OutputType::List {
            item_schema: items[0].clone(),
        }),
        other => Err(EngineError::config(format!(
            "`output_format` must be \"text\", \"files\", a schema object, or a single-item list of a schema object, got {other}"
        ))),
    }
}

fn unwrap_result(result: GenerateResult) -> Value {
    match result {
        GenerateResult::Text(text) => Value::String(text),
        GenerateResult::Files(files) => Value::Array(files),
        GenerateResult::Object(obj) => obj,
        GenerateResult::List(items) => Value::Array(items),
    }
}

#[async_trait]
impl Step for LLMGenerateStep {
    async fn run(&self, state: &mut State) -> Result<()> {
        let prompt = self.ctx.renderer.render_compiled(&self.prompt, state)?;
        let model_id = match &self.model {
            Some(model) => self.ctx.renderer.render_compiled(model, state)?,
            None => state
                .config_get_str("default_model")
                .ok_or_else(|| EngineError::config("llm_generate has no `model` and no `default_model` is configured"))?
                .to_string(),
        };
        let output_key = self.ctx.renderer.render_compiled(&self.output_key, state)?;
        let max_tokens = parse_max_tokens(&self.max_tokens)?;

        let mut mcp_handles = Vec::with_capacity(self.mcp_servers.len());
        for compiled in &self.mcp_servers {
            let rendered = render_compiled_value_recursive(&self.ctx.renderer, state, compiled)?;
            mcp_handles.push(mcp::build_handle(&rendered)?);
        }

        let builtin_tools = self.builtin_tools.clone();
        let provider = model_id.split('/').next().unwrap_or_default();
        ProviderRegistry::validate_builtin_tools(provider, &builtin_tools)?;

        debug!(%prompt, %model_id, "llm_generate dispatching");
        info!(provider, model = %model_id, "llm_generate invoking provider");

        let options = GenerateOptions {
            model_id,
            max_tokens,
            output_type: self.output_type.clone(),
            mcp_servers: mcp_handles,
            builtin_tools,
        };

        let result = self.ctx.providers.generate(&prompt, options).await?;
        state.set(output_key, unwrap_result(result));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LLMClient;
    use crate::registry::StepRegistry;
    use serde_json::json;

    struct StubClient;

    #[async_trait]
    impl LLMClient for StubClient {
        fn provider(&self) -> &str {
            "openai"
        }

        async fn generate(&self, _prompt: &str, options: &GenerateOptions) -> Result<GenerateResult> {
            match options.output_type {
                OutputType::Files => Ok(GenerateResult::Files(vec![
                    json!({"path": "a.txt", "content": "A"}),
                    json!({"path": "b.txt", "content": "B"}),
                ])),
                _ => Ok(GenerateResult::Text("stub".to_string())),
            }
        }
    }

    fn ctx() -> Arc<EngineContext> {
        let mut providers = ProviderRegistry::new();
        providers.register(Arc::new(StubClient));
        Arc::new(EngineContext::new(StepRegistry::new(), providers))
    }

    #[tokio::test]
    async fn files_output_format_stores_unwrapped_list() {
        let step = LLMGenerateStep::new(
            ctx(),
            json!({"prompt": "x", "model": "openai/gpt-4o", "output_format": "files", "output_key": "gen"}),
        )
        .unwrap();
        let mut state = State::new();
        step.run(&mut state).await.unwrap();

        assert_eq!(
            state.get("gen"),
            Some(&json!([{"path": "a.txt", "content": "A"}, {"path": "b.txt", "content": "B"}]))
        );
    }

    #[tokio::test]
    async fn rejects_builtin_tools_on_unsupported_provider() {
        let step = LLMGenerateStep::new(
            ctx(),
            json!({
                "prompt": "x",
                "model": "openai/gpt-4o",
                "output_format": "text",
                "output_key": "gen",
                "openai_builtin_tools": [{"type": "web_search_preview"}]
            }),
        )
        .unwrap();
        let mut state = State::new();
        assert!(step.run(&mut state).await.is_err());
    }

    #[tokio::test]
    async fn omitted_model_falls_back_to_config_default_model() {
        let step = LLMGenerateStep::new(
            ctx(),
            json!({"prompt": "x", "output_format": "text", "output_key": "gen"}),
        )
        .unwrap();
        let mut state = State::new();
        state.config_set("default_model", json!("openai/gpt-4o"));
        step.run(&mut state).await.unwrap();
        assert_eq!(state.get("gen"), Some(&json!("stub")));
    }

    #[tokio::test]
    async fn omitted_model_without_default_is_a_config_error() {
        let step = LLMGenerateStep::new(
            ctx(),
            json!({"prompt": "x", "output_format": "text", "output_key": "gen"}),
        )
        .unwrap();
        let mut state = State::new();
        assert!(step.run(&mut state).await.is_err());
    }
}
