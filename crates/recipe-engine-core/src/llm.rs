// Copyright (c) 2025 LLM DevOps
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The unified LLM capability (§4.C6): a single async `generate` façade
//! over multiple providers, plus the provider registry steps dispatch
//! through.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{EngineError, Result};
use crate::mcp::MCPServerHandle;

/// Structured-output descriptor a step can ask the LLM capability for.
#[derive(Debug, Clone)]
pub enum OutputType {
    /// Plain text.
    Text,
    /// A list of `FileSpec { path, content }`.
    Files,
    /// A single object matching `schema`.
    Object { schema: Value },
    /// A list of objects, each matching `item_schema`. Transported as
    /// `{items: [...]}` internally, then unwrapped by the caller.
    List { item_schema: Value },
}

/// An OpenAI Responses-API built-in tool descriptor. `web_search_preview`
/// is the only accepted type in the current contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltinTool {
    pub tool_type: String,
}

/// Options accompanying a `generate` call.
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    /// `provider/model` or `provider/model/deployment`.
    pub model_id: String,
    pub max_tokens: Option<u32>,
    pub output_type: OutputType,
    pub mcp_servers: Vec<MCPServerHandle>,
    pub builtin_tools: Vec<BuiltinTool>,
}

/// The value the capability hands back: already the *structured content*
/// the caller requested, never the raw transport envelope.
#[derive(Debug, Clone)]
pub enum GenerateResult {
    Text(String),
    Files(Vec<Value>),
    Object(Value),
    List(Vec<Value>),
}

/// A parsed `provider/model[/deployment]` model id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelId {
    pub provider: String,
    pub model: String,
    pub deployment: Option<String>,
}

impl ModelId {
    pub fn parse(raw: &str) -> Result<Self> {
        let mut parts = raw.splitn(3, '/');
        let provider = parts
            .next()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| EngineError::config(format!("invalid model id `{raw}`: missing provider")))?
            .to_string();
        let model = parts
            .next()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| EngineError::config(format!("invalid model id `{raw}`: missing model")))?
            .to_string();
        let deployment = parts.next().map(String::from);
        Ok(Self {
            provider,
            model,
            deployment,
        })
    }
}

/// Recognized providers. `openai_responses`/`azure_responses` are the
/// only providers allowed `builtin_tools`.
pub const RESPONSES_API_PROVIDERS: &[&str] = &["openai_responses", "azure_responses"];

/// Unified async LLM capability a provider crate implements once per
/// backend. Network/API/timeout errors surface as `EngineError::Llm`;
/// structured-output validation failures as `EngineError::LlmSchema`.
#[async_trait]
pub trait LLMClient: Send + Sync {
    /// The provider tag this client answers to (`openai`, `anthropic`, ...).
    fn provider(&self) -> &str;

    async fn generate(&self, prompt: &str, options: &GenerateOptions) -> Result<GenerateResult>;
}

/// Construction-time, immutable mapping from provider tag to client,
/// mirroring the Step Registry's shape.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    clients: HashMap<String, Arc<dyn LLMClient>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, client: Arc<dyn LLMClient>) {
        self.clients.insert(client.provider().to_string(), client);
    }

    pub fn get(&self, provider: &str) -> Option<Arc<dyn LLMClient>> {
        self.clients.get(provider).cloned()
    }

    /// Validates that `builtin_tools` is empty unless `provider` is one of
    /// the Responses-API providers (§4.C6).
    pub fn validate_builtin_tools(provider: &str, tools: &[BuiltinTool]) -> Result<()> {
        if tools.is_empty() {
            return Ok(());
        }
        if !RESPONSES_API_PROVIDERS.contains(&provider) {
            return Err(EngineError::ToolValidation(format!(
                "builtin_tools are only supported by {RESPONSES_API_PROVIDERS:?}, not `{provider}`"
            )));
        }
        for tool in tools {
            if tool.tool_type != "web_search_preview" {
                return Err(EngineError::ToolValidation(format!(
                    "unsupported builtin tool type `{}`",
                    tool.tool_type
                )));
            }
        }
        Ok(())
    }

    /// Dispatches a generate call, resolving the provider from `model_id`
    /// and validating built-in tools against it first.
    pub async fn generate(&self, prompt: &str, options: GenerateOptions) -> Result<GenerateResult> {
        let model_id = ModelId::parse(&options.model_id)?;
        Self::validate_builtin_tools(&model_id.provider, &options.builtin_tools)?;

        let client = self.get(&model_id.provider).ok_or_else(|| EngineError::Llm {
            provider: model_id.provider.clone(),
            model: model_id.model.clone(),
            cause: "no client registered for this provider".to_string(),
        })?;

        client.generate(prompt, &options).await
    }
}
