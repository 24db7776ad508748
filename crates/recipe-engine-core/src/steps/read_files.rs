// Copyright (c) 2025 LLM DevOps
// SPDX-License-Identifier: MIT OR Apache-2.0

//! ReadFiles: reads one or more files into state (§4.C13).

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::context::EngineContext;
use crate::error::{EngineError, Result};
use crate::state::State;
use crate::step::Step;
use crate::template::{CompiledTemplate, Renderer};
use crate::steps::util::as_path_list;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
enum MergeMode {
    Concat,
    Dict,
}

impl Default for MergeMode {
    fn default() -> Self {
        MergeMode::Concat
    }
}

#[derive(Deserialize)]
struct Config {
    path: Value,
    content_key: String,
    #[serde(default)]
    optional: bool,
    #[serde(default)]
    merge_mode: MergeMode,
}

/// A leaf in a `path` config value: either a literal JSON value or a
/// precompiled template over a string entry.
enum PathEntry {
    Template(CompiledTemplate),
    Literal(Value),
}

/// The `path` config field, precompiled once at construction: a single
/// templated string, a list of templated/literal entries, or an
/// already-structured value with no templates to compile.
enum PathTemplate {
    Single(CompiledTemplate),
    List(Vec<PathEntry>),
    Other(Value),
}

fn compile_path_template(renderer: &Renderer, raw: &Value) -> Result<PathTemplate> {
    match raw {
        Value::String(s) => Ok(PathTemplate::Single(renderer.compile(s)?)),
        Value::Array(items) => {
            let compiled = items
                .iter()
                .map(|item| match item {
                    Value::String(s) => Ok(PathEntry::Template(renderer.compile(s)?)),
                    other => Ok(PathEntry::Literal(other.clone())),
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(PathTemplate::List(compiled))
        }
        other => Ok(PathTemplate::Other(other.clone())),
    }
}

pub struct ReadFilesStep {
    ctx: Arc<EngineContext>,
    config: Config,
    path: PathTemplate,
    content_key: CompiledTemplate,
}

impl ReadFilesStep {
    pub fn new(ctx: Arc<EngineContext>, config: Value) -> Result<Self> {
        let config: Config = serde_json::from_value(config)
            .map_err(|e| EngineError::config(format!("invalid read_files config: {e}")))?;
        let path = compile_path_template(&ctx.renderer, &config.path)?;
        let content_key = ctx.renderer.compile(&config.content_key)?;
        Ok(Self { ctx, config, path, content_key })
    }
}

fn render_path_entries(renderer: &Renderer, state: &State, template: &PathTemplate) -> Result<Vec<String>> {
    let rendered = match template {
        PathTemplate::Single(t) => Value::String(renderer.render_compiled(t, state)?),
        PathTemplate::List(entries) => {
            let mut rendered = Vec::with_capacity(entries.len());
            for entry in entries {
                match entry {
                    PathEntry::Template(t) => rendered.push(Value::String(renderer.render_compiled(t, state)?)),
                    PathEntry::Literal(v) => rendered.push(v.clone()),
                }
            }
            Value::Array(rendered)
        }
        PathTemplate::Other(v) => v.clone(),
    };
    Ok(as_path_list(&rendered))
}

#[async_trait]
impl Step for ReadFilesStep {
    async fn run(&self, state: &mut State) -> Result<()> {
        let paths = render_path_entries(&self.ctx.renderer, state, &self.path)?;
        let content_key = self.ctx.renderer.render_compiled(&self.content_key, state)?;

        let mut contents: Vec<(String, String)> = Vec::with_capacity(paths.len());
        for path in &paths {
            let resolved = self.ctx.resolve_path(path);
            match std::fs::read_to_string(&resolved) {
                Ok(content) => contents.push((path.clone(), content)),
                Err(e) if self.config.optional && e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(EngineError::io(format!("failed to read `{}`: {e}", resolved.display())));
                }
            }
        }

        let value = match self.config.merge_mode {
            MergeMode::Concat => {
                json!(contents.iter().map(|(_, c)| c.clone()).collect::<Vec<_>>().join("\n"))
            }
            MergeMode::Dict => {
                let map: serde_json::Map<String, Value> =
                    contents.into_iter().map(|(p, c)| (p, Value::String(c))).collect();
                Value::Object(map)
            }
        };

        state.set(content_key, value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ProviderRegistry;
    use crate::registry::StepRegistry;
    use std::io::Write;

    fn ctx(base_dir: std::path::PathBuf) -> Arc<EngineContext> {
        Arc::new(EngineContext::new(StepRegistry::new(), ProviderRegistry::new()).with_base_dir(base_dir))
    }

    #[tokio::test]
    async fn optional_missing_file_yields_empty_content() {
        let dir = tempfile::tempdir().unwrap();
        let step = ReadFilesStep::new(
            ctx(dir.path().to_path_buf()),
            json!({"path": "missing.txt", "content_key": "out", "optional": true}),
        )
        .unwrap();
        let mut state = State::new();
        step.run(&mut state).await.unwrap();
        assert_eq!(state.get("out"), Some(&json!("")));
    }

    #[tokio::test]
    async fn dict_merge_mode_keys_by_path() {
        let dir = tempfile::tempdir().unwrap();
        let mut f = std::fs::File::create(dir.path().join("a.txt")).unwrap();
        write!(f, "hello").unwrap();

        let step = ReadFilesStep::new(
            ctx(dir.path().to_path_buf()),
            json!({"path": "a.txt", "content_key": "out", "merge_mode": "dict"}),
        )
        .unwrap();
        let mut state = State::new();
        step.run(&mut state).await.unwrap();
        assert_eq!(state.get("out"), Some(&json!({"a.txt": "hello"})));
    }
}
