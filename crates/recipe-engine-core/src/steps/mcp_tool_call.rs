// Copyright (c) 2025 LLM DevOps
// SPDX-License-Identifier: MIT OR Apache-2.0

//! MCP tool-call: invokes a named tool on a configured MCP server (§4.C13).

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

use crate::context::EngineContext;
use crate::error::Result;
use crate::mcp;
use crate::state::State;
use crate::step::Step;
use crate::template::CompiledTemplate;
use crate::steps::util::{compile_value_recursive, render_compiled_value_recursive, CompiledValue};

#[derive(Deserialize)]
struct Config {
    server: Value,
    tool_name: String,
    #[serde(default)]
    arguments: Value,
    result_key: String,
}

pub struct McpToolCallStep {
    ctx: Arc<EngineContext>,
    server: CompiledValue,
    tool_name: CompiledTemplate,
    arguments: CompiledValue,
    result_key: CompiledTemplate,
}

impl McpToolCallStep {
    pub fn new(ctx: Arc<EngineContext>, config: Value) -> Result<Self> {
        let config: Config = serde_json::from_value(config)
            .map_err(|e| crate::error::EngineError::config(format!("invalid mcp_tool_call config: {e}")))?;
        let server = compile_value_recursive(&ctx.renderer, &config.server)?;
        let tool_name = ctx.renderer.compile(&config.tool_name)?;
        let arguments = compile_value_recursive(&ctx.renderer, &config.arguments)?;
        let result_key = ctx.renderer.compile(&config.result_key)?;
        Ok(Self { ctx, server, tool_name, arguments, result_key })
    }
}

#[async_trait]
impl Step for McpToolCallStep {
    async fn run(&self, state: &mut State) -> Result<()> {
        let server_config = render_compiled_value_recursive(&self.ctx.renderer, state, &self.server)?;
        let handle = mcp::build_handle(&server_config)?;

        let tool_name = self.ctx.renderer.render_compiled(&self.tool_name, state)?;
        let arguments = render_compiled_value_recursive(&self.ctx.renderer, state, &self.arguments)?;
        let result_key = self.ctx.renderer.render_compiled(&self.result_key, state)?;

        let response = mcp::invoke_tool(&handle, &tool_name, arguments).await?;
        state.set(result_key, response);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ProviderRegistry;
    use crate::registry::StepRegistry;
    use serde_json::json;

    fn ctx() -> Arc<EngineContext> {
        Arc::new(EngineContext::new(StepRegistry::new(), ProviderRegistry::new()))
    }

    #[tokio::test]
    async fn invokes_http_server_and_stores_response() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/mcp")
            .with_status(200)
            .with_body(r#"{"ok": true}"#)
            .create_async()
            .await;

        let step = McpToolCallStep::new(
            ctx(),
            json!({
                "server": {"url": format!("{}/mcp", server.url())},
                "tool_name": "search",
                "arguments": {"query": "rust"},
                "result_key": "search_result"
            }),
        )
        .unwrap();
        let mut state = State::new();
        step.run(&mut state).await.unwrap();
        assert_eq!(state.get("search_result"), Some(&json!({"ok": true})));
    }

    #[tokio::test]
    async fn stdio_server_surfaces_unimplemented_transport_error() {
        let step = McpToolCallStep::new(
            ctx(),
            json!({
                "server": {"command": "mytool"},
                "tool_name": "search",
                "result_key": "out"
            }),
        )
        .unwrap();
        let mut state = State::new();
        let err = step.run(&mut state).await.unwrap_err();
        assert!(err.to_string().contains("stdio MCP transport is not implemented"));
    }
}
