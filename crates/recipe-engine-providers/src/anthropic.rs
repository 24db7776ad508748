// Copyright (c) 2025 LLM DevOps
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Anthropic Messages API client implementing the unified `LLMClient`
//! capability.

use async_trait::async_trait;
use recipe_engine_core::config::mask_credential;
use recipe_engine_core::error::{EngineError, Result};
use recipe_engine_core::llm::{GenerateOptions, GenerateResult, LLMClient};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use crate::openai::to_llm_error;
use crate::support::{augment_prompt, parse_result};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 4096;

pub struct AnthropicClient {
    api_key: String,
    base_url: String,
    http: reqwest::Client,
}

impl AnthropicClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .expect("reqwest client should build with a static config");
        Self {
            api_key: api_key.into(),
            base_url: base_url.into(),
            http,
        }
    }
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
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

#[async_trait]
impl LLMClient for AnthropicClient {
    fn provider(&self) -> &str {
        "anthropic"
    }

    async fn generate(&self, prompt: &str, options: &GenerateOptions) -> Result<GenerateResult> {
        tracing::debug!(
            provider = "anthropic",
            model = %options.model_id,
            api_key = %mask_credential(&self.api_key),
            "dispatching generate request"
        );

        let model = recipe_engine_core::llm::ModelId::parse(&options.model_id)?.model;
        let augmented = augment_prompt(prompt, &options.output_type);

        let body = json!({
            "model": model,
            "max_tokens": options.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            "messages": [{"role": "user", "content": augmented}],
        });

        let response = self
            .http
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| to_llm_error("anthropic", &model, &e))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| to_llm_error("anthropic", &model, &e))?;

        if !status.is_success() {
            return Err(EngineError::Llm {
                provider: "anthropic".to_string(),
                model,
                cause: parse_error_body(status, &text),
            });
        }

        let parsed: MessagesResponse = serde_json::from_str(&text).map_err(|e| EngineError::Llm {
            provider: "anthropic".to_string(),
            model: model.clone(),
            cause: format!("malformed messages response: {e}"),
        })?;

        let content = parsed
            .content
            .into_iter()
            .find_map(|block| block.text)
            .ok_or_else(|| EngineError::Llm {
                provider: "anthropic".to_string(),
                model: model.clone(),
                cause: "response contained no text block".to_string(),
            })?;

        parse_result(&content, &options.output_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recipe_engine_core::llm::OutputType;

    #[tokio::test]
    async fn generate_returns_text_on_success() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/messages")
            .with_status(200)
            .with_body(r#"{"content": [{"type": "text", "text": "hello"}]}"#)
            .create_async()
            .await;

        let client = AnthropicClient::with_base_url("sk-ant-test", server.url());
        let options = GenerateOptions {
            model_id: "anthropic/claude-3-5-sonnet".to_string(),
            max_tokens: None,
            output_type: OutputType::Text,
            mcp_servers: vec![],
            builtin_tools: vec![],
        };
        let result = client.generate("hi", &options).await.unwrap();
        match result {
            GenerateResult::Text(t) => assert_eq!(t, "hello"),
            _ => panic!("expected Text"),
        }
    }

    #[tokio::test]
    async fn generate_surfaces_api_error_message() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/messages")
            .with_status(429)
            .with_body(r#"{"error": {"message": "rate limited"}}"#)
            .create_async()
            .await;

        let client = AnthropicClient::with_base_url("sk-ant-bad", server.url());
        let options = GenerateOptions {
            model_id: "anthropic/claude-3-5-sonnet".to_string(),
            max_tokens: None,
            output_type: OutputType::Text,
            mcp_servers: vec![],
            builtin_tools: vec![],
        };
        let err = client.generate("hi", &options).await.unwrap_err();
        assert!(err.to_string().contains("rate limited"));
    }
}
