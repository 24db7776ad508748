// Copyright (c) 2025 LLM DevOps
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Azure OpenAI chat/completions client. Wire shape matches
//! [`crate::openai`]; the differences are the URL layout
//! (`{base_url}/openai/deployments/{deployment}/chat/completions`,
//! api-version query param) and the `api-key` auth header.

use async_trait::async_trait;
use recipe_engine_core::config::mask_credential;
use recipe_engine_core::error::{EngineError, Result};
use recipe_engine_core::llm::{GenerateOptions, GenerateResult, LLMClient, ModelId};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use crate::openai::to_llm_error;
use crate::support::{augment_prompt, parse_result};

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

fn parse_error_body(status: reqwest::StatusCode, body: &str) -> String {
    match serde_json::from_str::<ApiErrorEnvelope>(body) {
        Ok(envelope) => format!("{status}: {}", envelope.error.message),
        Err(_) => format!("{status}: {body}"),
    }
}

pub struct AzureOpenAIClient {
    api_key: String,
    base_url: String,
    api_version: String,
    http: reqwest::Client,
}

impl AzureOpenAIClient {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>, api_version: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .expect("reqwest client should build with a static config");
        Self {
            api_key: api_key.into(),
            base_url: base_url.into(),
            api_version: api_version.into(),
            http,
        }
    }
}

#[async_trait]
impl LLMClient for AzureOpenAIClient {
    fn provider(&self) -> &str {
        "azure"
    }

    async fn generate(&self, prompt: &str, options: &GenerateOptions) -> Result<GenerateResult> {
        tracing::debug!(
            provider = "azure",
            model = %options.model_id,
            api_key = %mask_credential(&self.api_key),
            "dispatching generate request"
        );

        let model_id = ModelId::parse(&options.model_id)?;
        let deployment = model_id.deployment.clone().unwrap_or_else(|| model_id.model.clone());
        let augmented = augment_prompt(prompt, &options.output_type);

        let mut body = json!({
            "messages": [{"role": "user", "content": augmented}],
        });
        if let Some(max_tokens) = options.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }

        let url = format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.base_url, deployment, self.api_version
        );

        let response = self
            .http
            .post(&url)
            .header("api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| to_llm_error("azure", &model_id.model, &e))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| to_llm_error("azure", &model_id.model, &e))?;

        if !status.is_success() {
            return Err(EngineError::Llm {
                provider: "azure".to_string(),
                model: model_id.model,
                cause: parse_error_body(status, &text),
            });
        }

        let parsed: ChatResponse = serde_json::from_str(&text).map_err(|e| EngineError::Llm {
            provider: "azure".to_string(),
            model: model_id.model.clone(),
            cause: format!("malformed chat completion response: {e}"),
        })?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| EngineError::Llm {
                provider: "azure".to_string(),
                model: model_id.model.clone(),
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
    async fn generate_uses_deployment_from_model_id() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", mockito::Matcher::Regex(r"^/openai/deployments/my-deploy/chat/completions".to_string()))
            .with_status(200)
            .with_body(r#"{"choices": [{"message": {"content": "hi there"}}]}"#)
            .create_async()
            .await;

        let client = AzureOpenAIClient::new("key", server.url(), "2024-02-01");
        let options = GenerateOptions {
            model_id: "azure/gpt-4o/my-deploy".to_string(),
            max_tokens: None,
            output_type: OutputType::Text,
            mcp_servers: vec![],
            builtin_tools: vec![],
        };
        let result = client.generate("hi", &options).await.unwrap();
        match result {
            GenerateResult::Text(t) => assert_eq!(t, "hi there"),
            _ => panic!("expected Text"),
        }
    }
}
