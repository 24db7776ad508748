// Copyright (c) 2025 LLM DevOps
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shell: runs a command, capturing stdout (§4.C13). True CPU/process
//! parallelism is deliberately farmed out here rather than run on the
//! engine's cooperative event loop (§5).

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

use crate::context::EngineContext;
use crate::error::{EngineError, Result};
use crate::state::State;
use crate::step::Step;
use crate::template::CompiledTemplate;

#[derive(Deserialize)]
struct Config {
    command: String,
    output_key: String,
    #[serde(default)]
    cwd: Option<String>,
}

pub struct ShellStep {
    ctx: Arc<EngineContext>,
    command: CompiledTemplate,
    output_key: CompiledTemplate,
    cwd: Option<CompiledTemplate>,
}

impl ShellStep {
    pub fn new(ctx: Arc<EngineContext>, config: Value) -> Result<Self> {
        let config: Config = serde_json::from_value(config)
            .map_err(|e| EngineError::config(format!("invalid shell config: {e}")))?;
        let command = ctx.renderer.compile(&config.command)?;
        let output_key = ctx.renderer.compile(&config.output_key)?;
        let cwd = config.cwd.as_deref().map(|c| ctx.renderer.compile(c)).transpose()?;
        Ok(Self { ctx, command, output_key, cwd })
    }
}

#[async_trait]
impl Step for ShellStep {
    async fn run(&self, state: &mut State) -> Result<()> {
        let command = self.ctx.renderer.render_compiled(&self.command, state)?;
        let output_key = self.ctx.renderer.render_compiled(&self.output_key, state)?;

        let mut cmd = tokio::process::Command::new("sh");
        cmd.arg("-c").arg(&command);
        match &self.cwd {
            Some(cwd) => {
                let rendered_cwd = self.ctx.renderer.render_compiled(cwd, state)?;
                cmd.current_dir(self.ctx.resolve_path(&rendered_cwd));
            }
            None => {
                cmd.current_dir(&self.ctx.base_dir);
            }
        }

        let output = cmd
            .output()
            .await
            .map_err(|e| EngineError::io(format!("failed to run shell command `{command}`: {e}")))?;

        if !output.status.success() {
            return Err(EngineError::io(format!(
                "shell command `{command}` exited with status {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr)
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        state.set(output_key, Value::String(stdout));
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
    async fn captures_stdout() {
        let step = ShellStep::new(ctx(), json!({"command": "echo -n hi", "output_key": "out"})).unwrap();
        let mut state = State::new();
        step.run(&mut state).await.unwrap();
        assert_eq!(state.get("out"), Some(&json!("hi")));
    }

    #[tokio::test]
    async fn nonzero_exit_is_an_error() {
        let step = ShellStep::new(ctx(), json!({"command": "exit 1", "output_key": "out"})).unwrap();
        let mut state = State::new();
        assert!(step.run(&mut state).await.is_err());
    }
}
