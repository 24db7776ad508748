// Copyright (c) 2025 LLM DevOps
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Concrete `LLMClient` implementations for the recognized providers
//! (§4.C6): `openai`, `azure`, `anthropic`, `ollama`, `openai_responses`,
//! `azure_responses`. Each client is constructed once, with credentials
//! already resolved from `State.config`, and registered into a
//! `ProviderRegistry` by the embedding CLI at startup.

pub mod anthropic;
pub mod azure;
pub mod ollama;
pub mod openai;
pub mod responses;
mod support;

pub use anthropic::AnthropicClient;
pub use azure::AzureOpenAIClient;
pub use ollama::OllamaClient;
pub use openai::OpenAIClient;
pub use responses::ResponsesApiClient;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
