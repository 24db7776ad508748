// Copyright (c) 2025 LLM DevOps
// SPDX-License-Identifier: MIT OR Apache-2.0

//! MCP server configuration and the handle factory (§4.C7).
//!
//! The core treats [`MCPServerHandle`] as opaque: it builds handles from
//! config and passes them through to the LLM capability. Transport
//! (HTTP/stdio) is implemented by the client library, not here.

use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

use crate::error::{EngineError, Result};

/// One MCP-server config, discriminated by presence of `url` vs `command`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum MCPServerConfig {
    Http {
        url: String,
        #[serde(default)]
        headers: HashMap<String, String>,
    },
    Stdio {
        command: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default)]
        env: HashMap<String, String>,
        #[serde(default)]
        cwd: Option<String>,
    },
}

/// An opaque handle to a remote tool server, ready to hand to the LLM
/// capability.
#[derive(Debug, Clone)]
pub enum MCPServerHandle {
    Http {
        url: String,
        headers: HashMap<String, String>,
    },
    Stdio {
        command: String,
        args: Vec<String>,
        env: HashMap<String, String>,
        cwd: Option<String>,
    },
}

/// Builds a handle from a config value, resolving stdio's empty-string
/// env values from the host environment (omitting the variable if still
/// unresolved).
pub fn build_handle(config: &Value) -> Result<MCPServerHandle> {
    let parsed: MCPServerConfig = serde_json::from_value(config.clone())
        .map_err(|e| EngineError::mcp(format!("invalid MCP server config: {e}")))?;

    match parsed {
        MCPServerConfig::Http { url, headers } => Ok(MCPServerHandle::Http { url, headers }),
        MCPServerConfig::Stdio {
            command,
            args,
            env,
            cwd,
        } => {
            let mut resolved_env = HashMap::new();
            for (key, value) in env {
                if value.is_empty() {
                    if let Ok(host_value) = std::env::var(&key) {
                        resolved_env.insert(key, host_value);
                    }
                    // still unresolved: omit the variable entirely
                } else {
                    resolved_env.insert(key, value);
                }
            }
            Ok(MCPServerHandle::Stdio {
                command,
                args,
                env: resolved_env,
                cwd,
            })
        }
    }
}

/// Invokes a named tool on a handle, returning its JSON response.
///
/// HTTP handles POST `{tool, arguments}` to the configured URL with the
/// configured headers. Stdio transport (spawn + MCP-over-stdio protocol)
/// is out of scope for the core per its interface-only contract for MCP
/// transports; it returns a clear [`EngineError::Mcp`] rather than
/// silently no-oping.
pub async fn invoke_tool(handle: &MCPServerHandle, tool_name: &str, arguments: Value) -> Result<Value> {
    match handle {
        MCPServerHandle::Http { url, headers } => {
            let client = reqwest::Client::new();
            let mut request = client.post(url).json(&serde_json::json!({
                "tool": tool_name,
                "arguments": arguments,
            }));
            for (key, value) in headers {
                request = request.header(key, value);
            }
            let response = request
                .send()
                .await
                .map_err(|e| EngineError::mcp(format!("request to `{url}` failed: {e}")))?;
            if !response.status().is_success() {
                return Err(EngineError::mcp(format!(
                    "MCP server `{url}` returned status {}",
                    response.status()
                )));
            }
            response
                .json::<Value>()
                .await
                .map_err(|e| EngineError::mcp(format!("invalid JSON response from `{url}`: {e}")))
        }
        MCPServerHandle::Stdio { command, .. } => Err(EngineError::mcp(format!(
            "stdio MCP transport is not implemented in this engine; cannot invoke `{tool_name}` on `{command}`"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builds_http_handle() {
        let handle = build_handle(&json!({"url": "https://example.com/mcp", "headers": {"X-Key": "v"}}))
            .unwrap();
        match handle {
            MCPServerHandle::Http { url, headers } => {
                assert_eq!(url, "https://example.com/mcp");
                assert_eq!(headers.get("X-Key").map(String::as_str), Some("v"));
            }
            _ => panic!("expected http handle"),
        }
    }

    #[test]
    fn stdio_empty_env_value_resolved_from_host_env_or_omitted() {
        std::env::set_var("RECIPE_ENGINE_TEST_MCP_VAR", "resolved");
        let handle = build_handle(&json!({
            "command": "mytool",
            "args": ["--serve"],
            "env": {"RECIPE_ENGINE_TEST_MCP_VAR": "", "UNRESOLVABLE_VAR_XYZ": ""}
        }))
        .unwrap();

        match handle {
            MCPServerHandle::Stdio { env, .. } => {
                assert_eq!(env.get("RECIPE_ENGINE_TEST_MCP_VAR").map(String::as_str), Some("resolved"));
                assert!(!env.contains_key("UNRESOLVABLE_VAR_XYZ"));
            }
            _ => panic!("expected stdio handle"),
        }
        std::env::remove_var("RECIPE_ENGINE_TEST_MCP_VAR");
    }
}
