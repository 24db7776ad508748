// Copyright (c) 2025 LLM DevOps
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ollama client, speaking the OpenAI-compatible chat/completions
//! endpoint Ollama exposes at `{base_url}/v1`. No credential is required.

use async_trait::async_trait;
use recipe_engine_core::error::Result;
use recipe_engine_core::llm::{GenerateOptions, GenerateResult, LLMClient, ModelId};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use crate::openai::to_llm_error;
use crate::support::{augment_prompt, parse_result};
use recipe_engine_core::error::EngineError;

const DEFAULT_BASE_URL: &str = "http://localhost:11434/v1";

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

pub struct OllamaClient {
    base_url: String,
    http: reqwest::Client,
}

impl OllamaClient {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .expect("reqwest client should build with a static config");
        Self {
            base_url: base_url.into(),
            http,
        }
    }
}

impl Default for OllamaClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LLMClient for OllamaClient {
    fn provider(&self) -> &str {
        "ollama"
    }

    async fn generate(&self, prompt: &str, options: &GenerateOptions) -> Result<GenerateResult> {
        tracing::debug!(provider = "ollama", model = %options.model_id, "dispatching generate request");

        let model = ModelId::parse(&options.model_id)?.model;
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
            .json(&body)
            .send()
            .await
            .map_err(|e| to_llm_error("ollama", &model, &e))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| to_llm_error("ollama", &model, &e))?;

        if !status.is_success() {
            return Err(EngineError::Llm {
                provider: "ollama".to_string(),
                model,
                cause: format!("{status}: {text}"),
            });
        }

        let parsed: ChatResponse = serde_json::from_str(&text).map_err(|e| EngineError::Llm {
            provider: "ollama".to_string(),
            model: model.clone(),
            cause: format!("malformed chat completion response: {e}"),
        })?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| EngineError::Llm {
                provider: "ollama".to_string(),
                model: model.clone(),
                cause: "response contained no message content".to_string(),
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
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_body(r#"{"choices": [{"message": {"content": "local reply"}}]}"#)
            .create_async()
            .await;

        let client = OllamaClient::with_base_url(server.url());
        let options = GenerateOptions {
            model_id: "ollama/llama3".to_string(),
            max_tokens: None,
            output_type: OutputType::Text,
            mcp_servers: vec![],
            builtin_tools: vec![],
        };
        let result = client.generate("hi", &options).await.unwrap();
        match result {
            GenerateResult::Text(t) => assert_eq!(t, "local reply"),
            _ => panic!("expected Text"),
        }
    }
}
