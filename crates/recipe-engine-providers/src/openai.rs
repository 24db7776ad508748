// Copyright (c) 2025 LLM DevOps
// SPDX-License-Identifier: MIT OR Apache-2.0

//! OpenAI chat/completions client implementing the unified `LLMClient`
//! capability.

use async_trait::async_trait;
use recipe_engine_core::config::mask_credential;
use recipe_engine_core::error::{EngineError, Result};
use recipe_engine_core::llm::{GenerateOptions, GenerateResult, LLMClient};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use crate::support::{augment_prompt, parse_result};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

pub struct OpenAIClient {
    api_key: String,
    base_url: String,
    http: reqwest::Client,
}

impl OpenAIClient {
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
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ApiErrorEnvelope {
    error: ApiError,
}

#[derive(Deserialize)]
struct ApiError {
    message: String,
}

/// Parses OpenAI's `{error: {message, ...}}` shape, falling back to the
/// raw body when it doesn't match.
fn parse_error_body(status: reqwest::StatusCode, body: &str) -> String {
    match serde_json::from_str::<ApiErrorEnvelope>(body) {
        Ok(envelope) => format!("{status}: {}", envelope.error.message),
        Err(_) => format!("{status}: {body}"),
    }
}

#[async_trait]
impl LLMClient for OpenAIClient {
    fn provider(&self) -> &str {
        "openai"
    }

    async fn generate(&self, prompt: &str, options: &GenerateOptions) -> Result<GenerateResult> {
        tracing::debug!(
            provider = "openai",
            model = %options.model_id,
            api_key = %mask_credential(&self.api_key),
            "dispatching generate request"
        );

        let model = recipe_engine_core::llm::ModelId::parse(&options.model_id)?.model;
        let augmented = augment_prompt(prompt, &options.output_type);

        let mut body = json!({
            "model": model,
            "messages": [{"role": "user", "content": augmented}],
        });
        if let Some(max_tokens) = options.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| to_llm_error("openai", &model, &e))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| to_llm_error("openai", &model, &e))?;

        if !status.is_success() {
            return Err(EngineError::Llm {
                provider: "openai".to_string(),
                model,
                cause: parse_error_body(status, &text),
            });
        }

        let parsed: ChatResponse = serde_json::from_str(&text).map_err(|e| EngineError::Llm {
            provider: "openai".to_string(),
            model: model.clone(),
            cause: format!("malformed chat completion response: {e}"),
        })?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| EngineError::Llm {
                provider: "openai".to_string(),
                model: model.clone(),
                cause: "response contained no message content".to_string(),
            })?;

        parse_result(&content, &options.output_type)
    }
}

/// Maps a transport-level `reqwest::Error` to the unified LLM error shape,
/// distinguishing timeouts since they're the most actionable case.
pub(crate) fn to_llm_error(provider: &str, model: &str, err: &reqwest::Error) -> EngineError {
    let cause = if err.is_timeout() {
        "request timed out".to_string()
    } else {
        err.to_string()
    };
    EngineError::Llm {
        provider: provider.to_string(),
        model: model.to_string(),
        cause,
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
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_body(r#"{"choices": [{"message": {"content": "hello"}}]}"#)
            .create_async()
            .await;

        let client = OpenAIClient::with_base_url("sk-test", server.url());
        let options = GenerateOptions {
            model_id: "openai/gpt-4o".to_string(),
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
            .mock("POST", "/chat/completions")
            .with_status(401)
            .with_body(r#"{"error": {"message": "invalid api key"}}"#)
            .create_async()
            .await;

        let client = OpenAIClient::with_base_url("sk-bad", server.url());
        let options = GenerateOptions {
            model_id: "openai/gpt-4o".to_string(),
            max_tokens: None,
            output_type: OutputType::Text,
            mcp_servers: vec![],
            builtin_tools: vec![],
        };
        let err = client.generate("hi", &options).await.unwrap_err();
        assert!(err.to_string().contains("invalid api key"));
    }
}
