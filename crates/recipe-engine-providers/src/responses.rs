// Copyright (c) 2025 LLM DevOps
// SPDX-License-Identifier: MIT OR Apache-2.0

//! OpenAI Responses API client, used for both `openai_responses` and
//! `azure_responses` (§4.C6) — the only providers allowed `builtin_tools`
//! and MCP server passthrough as Responses-API `tools` entries.

use async_trait::async_trait;
use recipe_engine_core::config::mask_credential;
use recipe_engine_core::error::{EngineError, Result};
use recipe_engine_core::llm::{GenerateOptions, GenerateResult, LLMClient, ModelId};
use recipe_engine_core::mcp::MCPServerHandle;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

use crate::openai::to_llm_error;
use crate::support::{augment_prompt, parse_result};

#[derive(Deserialize)]
struct ResponsesApiResponse {
    output: Vec<OutputItem>,
}

#[derive(Deserialize)]
struct OutputItem {
    #[serde(default)]
    content: Vec<ContentItem>,
}

#[derive(Deserialize)]
struct ContentItem {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct ApiErrorEnvelope {
    error: ApiError,
}

#[derive(Deserialize)]
struct ApiError {
    message: String,
}

fn parse_error_body(status: reqwest::StatusCode, body: &str) -> String {
    match serde_json::from_str::<ApiErrorEnvelope>(body) {
        Ok(envelope) => format!("{status}: {}", envelope.error.message),
        Err(_) => format!("{status}: {body}"),
    }
}

/// Renders an MCP server handle as a Responses-API `mcp` tool entry.
fn mcp_tool_entry(handle: &MCPServerHandle) -> Value {
    match handle {
        MCPServerHandle::Http { url, headers } => json!({
            "type": "mcp",
            "server_url": url,
            "headers": headers,
        }),
        MCPServerHandle::Stdio { command, args, .. } => json!({
            "type": "mcp",
            "command": command,
            "args": args,
        }),
    }
}

/// Shared Responses-API request logic; `provider` distinguishes
/// `openai_responses` from `azure_responses` only for error labeling,
/// since the two speak an identical payload shape once the caller has
/// resolved `base_url`/`auth_header`.
pub struct ResponsesApiClient {
    provider: String,
    base_url: String,
    auth_header: (String, String),
    http: reqwest::Client,
}

impl ResponsesApiClient {
    /// `auth_header` is `("Authorization", "Bearer sk-...")` for OpenAI or
    /// `("api-key", "...")` for Azure.
    pub fn new(provider: impl Into<String>, base_url: impl Into<String>, auth_header: (String, String)) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .expect("reqwest client should build with a static config");
        Self {
            provider: provider.into(),
            base_url: base_url.into(),
            auth_header,
            http,
        }
    }

    pub fn openai(api_key: impl Into<String>) -> Self {
        Self::new(
            "openai_responses",
            "https://api.openai.com/v1",
            ("Authorization".to_string(), format!("Bearer {}", api_key.into())),
        )
    }

    pub fn azure(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self::new("azure_responses", base_url, ("api-key".to_string(), api_key.into()))
    }
}

#[async_trait]
impl LLMClient for ResponsesApiClient {
    fn provider(&self) -> &str {
        &self.provider
    }

    async fn generate(&self, prompt: &str, options: &GenerateOptions) -> Result<GenerateResult> {
        tracing::debug!(
            provider = %self.provider,
            model = %options.model_id,
            credential = %mask_credential(&self.auth_header.1),
            "dispatching generate request"
        );

        let model = ModelId::parse(&options.model_id)?.model;
        let augmented = augment_prompt(prompt, &options.output_type);

        let mut tools: Vec<Value> = options.mcp_servers.iter().map(mcp_tool_entry).collect();
        tools.extend(
            options
                .builtin_tools
                .iter()
                .map(|t| json!({"type": t.tool_type})),
        );

        let mut body = json!({
            "model": model,
            "input": augmented,
        });
        if !tools.is_empty() {
            body["tools"] = json!(tools);
        }
        if let Some(max_tokens) = options.max_tokens {
            body["max_output_tokens"] = json!(max_tokens);
        }

        let response = self
            .http
            .post(format!("{}/responses", self.base_url))
            .header(&self.auth_header.0, &self.auth_header.1)
            .json(&body)
            .send()
            .await
            .map_err(|e| to_llm_error(&self.provider, &model, &e))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| to_llm_error(&self.provider, &model, &e))?;

        if !status.is_success() {
            return Err(EngineError::Llm {
                provider: self.provider.clone(),
                model,
                cause: parse_error_body(status, &text),
            });
        }

        let parsed: ResponsesApiResponse = serde_json::from_str(&text).map_err(|e| EngineError::Llm {
            provider: self.provider.clone(),
            model: model.clone(),
            cause: format!("malformed responses API payload: {e}"),
        })?;

        let content = parsed
            .output
            .into_iter()
            .flat_map(|item| item.content)
            .find_map(|c| c.text)
            .ok_or_else(|| EngineError::Llm {
                provider: self.provider.clone(),
                model: model.clone(),
                cause: "response contained no output text".to_string(),
            })?;

        parse_result(&content, &options.output_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recipe_engine_core::llm::{BuiltinTool, OutputType};

    #[tokio::test]
    async fn generate_includes_builtin_tools_in_request() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/responses")
            .match_body(mockito::Matcher::PartialJson(json!({
                "tools": [{"type": "web_search_preview"}]
            })))
            .with_status(200)
            .with_body(r#"{"output": [{"content": [{"text": "done"}]}]}"#)
            .create_async()
            .await;

        let client = ResponsesApiClient::new(
            "openai_responses",
            server.url(),
            ("Authorization".to_string(), "Bearer sk-test".to_string()),
        );
        let options = GenerateOptions {
            model_id: "openai_responses/gpt-4o".to_string(),
            max_tokens: None,
            output_type: OutputType::Text,
            mcp_servers: vec![],
            builtin_tools: vec![BuiltinTool {
                tool_type: "web_search_preview".to_string(),
            }],
        };
        let result = client.generate("hi", &options).await.unwrap();
        match result {
            GenerateResult::Text(t) => assert_eq!(t, "done"),
            _ => panic!("expected Text"),
        }
    }
}
