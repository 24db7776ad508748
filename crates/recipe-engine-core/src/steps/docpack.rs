// Copyright (c) 2025 LLM DevOps
// SPDX-License-Identifier: MIT OR Apache-2.0

//! DocpackCreate / DocpackExtract: pack/unpack a ZIP archive containing an
//! `outline.json` plus resource files, with numeric-suffix conflict
//! resolution on the resource filenames (§4.C13, §6).

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::io::{Read, Write};
use std::path::Path;
use std::sync::Arc;

use crate::context::EngineContext;
use crate::error::{EngineError, Result};
use crate::state::State;
use crate::step::Step;
use crate::template::CompiledTemplate;
use crate::steps::util::{compile_value_recursive, render_compiled_value_recursive, CompiledValue};

fn unique_entry_name(used: &mut HashSet<String>, candidate: &str) -> String {
    if used.insert(candidate.to_string()) {
        return candidate.to_string();
    }
    let path = Path::new(candidate);
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or(candidate);
    let ext = path.extension().and_then(|s| s.to_str());
    let mut n = 1;
    loop {
        let attempt = match ext {
            Some(ext) => format!("{stem}_{n}.{ext}"),
            None => format!("{stem}_{n}"),
        };
        if used.insert(attempt.clone()) {
            return attempt;
        }
        n += 1;
    }
}

#[derive(Deserialize)]
struct CreateConfig {
    #[serde(default)]
    outline: Value,
    #[serde(default)]
    resources: BTreeMap<String, String>,
    output_path: String,
}

pub struct DocpackCreateStep {
    ctx: Arc<EngineContext>,
    output_path: CompiledTemplate,
    outline: CompiledValue,
    resources: BTreeMap<String, CompiledTemplate>,
}

impl DocpackCreateStep {
    pub fn new(ctx: Arc<EngineContext>, config: Value) -> Result<Self> {
        let config: CreateConfig = serde_json::from_value(config)
            .map_err(|e| EngineError::config(format!("invalid docpack_create config: {e}")))?;
        let output_path = ctx.renderer.compile(&config.output_path)?;
        let outline = compile_value_recursive(&ctx.renderer, &config.outline)?;
        let resources = config
            .resources
            .iter()
            .map(|(k, v)| Ok((k.clone(), ctx.renderer.compile(v)?)))
            .collect::<Result<BTreeMap<_, _>>>()?;
        Ok(Self { ctx, output_path, outline, resources })
    }
}

#[async_trait]
impl Step for DocpackCreateStep {
    async fn run(&self, state: &mut State) -> Result<()> {
        let output_path = self.ctx.renderer.render_compiled(&self.output_path, state)?;
        let resolved_output = self.ctx.resolve_path(&output_path);
        if let Some(parent) = resolved_output.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let outline = render_compiled_value_recursive(&self.ctx.renderer, state, &self.outline)?;
        let outline_json = serde_json::to_vec_pretty(&outline)?;

        let file = std::fs::File::create(&resolved_output)?;
        let mut zip = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated);

        zip.start_file("outline.json", options)
            .map_err(|e| EngineError::io(format!("failed to start outline.json entry: {e}")))?;
        zip.write_all(&outline_json)?;

        let mut used = HashSet::new();
        used.insert("outline.json".to_string());

        for (resource_key, source_path) in &self.resources {
            let rendered_source = self.ctx.renderer.render_compiled(source_path, state)?;
            let resolved_source = self.ctx.resolve_path(&rendered_source);
            let basename = resolved_source
                .file_name()
                .and_then(|s| s.to_str())
                .unwrap_or(resource_key)
                .to_string();
            let entry_name = unique_entry_name(&mut used, &basename);

            let contents = std::fs::read(&resolved_source)?;
            zip.start_file(&entry_name, options)
                .map_err(|e| EngineError::io(format!("failed to start entry `{entry_name}`: {e}")))?;
            zip.write_all(&contents)?;
        }

        zip.finish().map_err(|e| EngineError::io(format!("failed to finalize docpack: {e}")))?;
        Ok(())
    }
}

#[derive(Deserialize)]
struct ExtractConfig {
    archive_path: String,
    output_dir: String,
    #[serde(default)]
    outline_key: Option<String>,
}

pub struct DocpackExtractStep {
    ctx: Arc<EngineContext>,
    archive_path: CompiledTemplate,
    output_dir: CompiledTemplate,
    outline_key: Option<String>,
}

impl DocpackExtractStep {
    pub fn new(ctx: Arc<EngineContext>, config: Value) -> Result<Self> {
        let config: ExtractConfig = serde_json::from_value(config)
            .map_err(|e| EngineError::config(format!("invalid docpack_extract config: {e}")))?;
        let archive_path = ctx.renderer.compile(&config.archive_path)?;
        let output_dir = ctx.renderer.compile(&config.output_dir)?;
        Ok(Self { ctx, archive_path, output_dir, outline_key: config.outline_key })
    }
}

#[async_trait]
impl Step for DocpackExtractStep {
    async fn run(&self, state: &mut State) -> Result<()> {
        let archive_path = self.ctx.renderer.render_compiled(&self.archive_path, state)?;
        let output_dir = self.ctx.renderer.render_compiled(&self.output_dir, state)?;
        let resolved_archive = self.ctx.resolve_path(&archive_path);
        let resolved_output = self.ctx.resolve_path(&output_dir);
        std::fs::create_dir_all(&resolved_output)?;

        let file = std::fs::File::open(&resolved_archive)?;
        let mut archive = zip::ZipArchive::new(file)
            .map_err(|e| EngineError::io(format!("failed to open docpack `{archive_path}`: {e}")))?;

        let mut outline_value = Value::Null;
        for i in 0..archive.len() {
            let mut entry = archive
                .by_index(i)
                .map_err(|e| EngineError::io(format!("failed to read docpack entry {i}: {e}")))?;
            let Some(name) = entry.enclosed_name() else {
                continue;
            };
            let target = resolved_output.join(&name);
            if entry.is_dir() {
                std::fs::create_dir_all(&target)?;
                continue;
            }
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let mut contents = Vec::new();
            entry.read_to_end(&mut contents)?;

            if name == Path::new("outline.json") {
                outline_value = serde_json::from_slice(&contents).unwrap_or(Value::Null);
            }
            std::fs::write(&target, &contents)?;
        }

        if let Some(key) = &self.outline_key {
            state.set(key.clone(), outline_value);
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
    async fn create_then_extract_round_trips_outline() {
        let dir = tempfile::tempdir().unwrap();
        let archive_path = dir.path().join("out.docpack");

        let create = DocpackCreateStep::new(
            ctx(),
            json!({"outline": {"title": "hi"}, "output_path": archive_path.to_string_lossy()}),
        )
        .unwrap();
        let mut state = State::new();
        create.run(&mut state).await.unwrap();
        assert!(archive_path.exists());

        let extract_dir = dir.path().join("extracted");
        let extract = DocpackExtractStep::new(
            ctx(),
            json!({
                "archive_path": archive_path.to_string_lossy(),
                "output_dir": extract_dir.to_string_lossy(),
                "outline_key": "outline"
            }),
        )
        .unwrap();
        extract.run(&mut state).await.unwrap();

        assert_eq!(state.get("outline"), Some(&json!({"title": "hi"})));
        assert!(extract_dir.join("outline.json").exists());
    }

    #[test]
    fn unique_entry_name_appends_numeric_suffix() {
        let mut used = HashSet::new();
        assert_eq!(unique_entry_name(&mut used, "a.txt"), "a.txt");
        assert_eq!(unique_entry_name(&mut used, "a.txt"), "a_1.txt");
        assert_eq!(unique_entry_name(&mut used, "a.txt"), "a_2.txt");
    }
}
