// Copyright (c) 2025 LLM DevOps
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Loads provider credentials and defaults from the process environment
//! into `State.config`.
//!
//! Per §4.C6/§6, the core itself never touches `std::env` at call time;
//! this loader is invoked once by the embedding CLI at process start
//! (after `.env` loading), and everything downstream reads from
//! `State.config`.

use serde_json::json;

use crate::state::State;

const ENV_KEYS: &[&str] = &[
    "OPENAI_API_KEY",
    "ANTHROPIC_API_KEY",
    "OLLAMA_BASE_URL",
    "AZURE_OPENAI_BASE_URL",
    "AZURE_OPENAI_API_VERSION",
    "AZURE_OPENAI_API_KEY",
    "AZURE_OPENAI_DEPLOYMENT_NAME",
    "AZURE_USE_MANAGED_IDENTITY",
    "AZURE_CLIENT_ID",
    "DEFAULT_MODEL",
];

/// Populates `state.config` with every recognized environment variable
/// that is actually set. Keys are mirrored verbatim (e.g.
/// `state.config_get("OPENAI_API_KEY")`), plus a convenience
/// `default_model` alias for `DEFAULT_MODEL` that [`crate::steps::llm_generate`]
/// falls back to.
pub fn load_from_env(state: &mut State) {
    for key in ENV_KEYS {
        if let Ok(value) = std::env::var(key) {
            state.config_set(*key, json!(value));
        }
    }
    if let Some(default_model) = state.config_get("DEFAULT_MODEL").cloned() {
        state.config_set("default_model", default_model);
    } else {
        state.config_set("default_model", json!("openai/gpt-4o"));
    }
}

/// Masks a credential for debug logging: keeps the last 4 characters,
/// replaces the rest with `*`.
pub fn mask_credential(value: &str) -> String {
    if value.len() <= 4 {
        return "*".repeat(value.len());
    }
    let visible = &value[value.len() - 4..];
    format!("{}{}", "*".repeat(value.len() - 4), visible)
}
