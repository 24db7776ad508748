// Copyright (c) 2025 LLM DevOps
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WriteFiles: writes a list of FileSpec under a root directory (§4.C13).

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

use crate::context::EngineContext;
use crate::error::{EngineError, Result};
use crate::state::State;
use crate::step::Step;
use crate::template::CompiledTemplate;

#[derive(Debug, Deserialize)]
struct FileSpec {
    path: String,
    content: String,
}

#[derive(Deserialize)]
struct Config {
    #[serde(default)]
    files: Option<Vec<FileSpec>>,
    #[serde(default)]
    files_key: Option<String>,
    root: String,
}

struct CompiledFileSpec {
    path: CompiledTemplate,
    content: CompiledTemplate,
}

struct RenderedFileSpec {
    path: String,
    content: String,
}

pub struct WriteFilesStep {
    ctx: Arc<EngineContext>,
    root: CompiledTemplate,
    files: Option<Vec<CompiledFileSpec>>,
    files_key: Option<String>,
}

impl WriteFilesStep {
    pub fn new(ctx: Arc<EngineContext>, config: Value) -> Result<Self> {
        let config: Config = serde_json::from_value(config)
            .map_err(|e| EngineError::config(format!("invalid write_files config: {e}")))?;
        if config.files.is_none() && config.files_key.is_none() {
            return Err(EngineError::config("write_files requires `files` or `files_key`"));
        }
        let root = ctx.renderer.compile(&config.root)?;
        let files = config
            .files
            .as_ref()
            .map(|files| {
                files
                    .iter()
                    .map(|f| -> Result<CompiledFileSpec> {
                        Ok(CompiledFileSpec {
                            path: ctx.renderer.compile(&f.path)?,
                            content: ctx.renderer.compile(&f.content)?,
                        })
                    })
                    .collect::<Result<Vec<_>>>()
            })
            .transpose()?;
        Ok(Self { ctx, root, files, files_key: config.files_key })
    }
}

#[async_trait]
impl Step for WriteFilesStep {
    async fn run(&self, state: &mut State) -> Result<()> {
        let root = self.ctx.renderer.render_compiled(&self.root, state)?;
        let root_dir = self.ctx.resolve_path(&root);

        let files: Vec<RenderedFileSpec> = if let Some(files) = &self.files {
            files
                .iter()
                .map(|f| -> Result<RenderedFileSpec> {
                    Ok(RenderedFileSpec {
                        path: self.ctx.renderer.render_compiled(&f.path, state)?,
                        content: self.ctx.renderer.render_compiled(&f.content, state)?,
                    })
                })
                .collect::<Result<Vec<_>>>()?
        } else {
            let key = self.files_key.as_deref().unwrap();
            let value = state
                .get(key)
                .ok_or_else(|| EngineError::config(format!("write_files `files_key` `{key}` not found in state")))?;
            let specs: Vec<FileSpec> = serde_json::from_value(value.clone())
                .map_err(|e| EngineError::config(format!("`{key}` is not a list of FileSpec: {e}")))?;
            specs
                .into_iter()
                .map(|f| RenderedFileSpec { path: f.path, content: f.content })
                .collect()
        };

        for file in &files {
            let target = root_dir.join(&file.path);
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&target, &file.content)?;
        }

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
    async fn writes_inline_files_creating_parents() {
        let dir = tempfile::tempdir().unwrap();
        let step = WriteFilesStep::new(
            ctx(),
            json!({
                "files": [{"path": "nested/a.txt", "content": "hello"}],
                "root": dir.path().to_string_lossy()
            }),
        )
        .unwrap();
        let mut state = State::new();
        step.run(&mut state).await.unwrap();

        let written = std::fs::read_to_string(dir.path().join("nested/a.txt")).unwrap();
        assert_eq!(written, "hello");
    }

    #[tokio::test]
    async fn writes_files_from_files_key() {
        let dir = tempfile::tempdir().unwrap();
        let step = WriteFilesStep::new(
            ctx(),
            json!({"files_key": "gen", "root": dir.path().to_string_lossy()}),
        )
        .unwrap();
        let mut state = State::new();
        state.set("gen", json!([{"path": "b.txt", "content": "world"}]));
        step.run(&mut state).await.unwrap();

        let written = std::fs::read_to_string(dir.path().join("b.txt")).unwrap();
        assert_eq!(written, "world");
    }
}
