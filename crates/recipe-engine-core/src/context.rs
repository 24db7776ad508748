// Copyright (c) 2025 LLM DevOps
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared, construction-time-immutable services every step constructor and
//! the Executor itself need: the step registry (for recursive dispatch
//! inside Conditional/Loop/Parallel/ExecuteRecipe), the provider registry,
//! and the template renderer.

use std::path::PathBuf;
use std::sync::Arc;

use crate::llm::ProviderRegistry;
use crate::registry::StepRegistry;
use crate::template::Renderer;

/// Bundles the services steps need beyond their own config. Cheap to
/// clone (everything inside is `Arc`).
#[derive(Clone)]
pub struct EngineContext {
    pub registry: Arc<StepRegistry>,
    pub providers: Arc<ProviderRegistry>,
    pub renderer: Arc<Renderer>,
    /// Directory recipe-relative paths (e.g. `ExecuteRecipe.recipe_path`)
    /// are resolved against. Defaults to the current working directory.
    pub base_dir: PathBuf,
}

impl EngineContext {
    pub fn new(registry: StepRegistry, providers: ProviderRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
            providers: Arc::new(providers),
            renderer: Arc::new(Renderer::new()),
            base_dir: std::env::current_dir().unwrap_or_default(),
        }
    }

    pub fn with_base_dir(mut self, base_dir: PathBuf) -> Self {
        self.base_dir = base_dir;
        self
    }

    pub fn resolve_path(&self, path: &str) -> PathBuf {
        let p = PathBuf::from(path);
        if p.is_absolute() {
            p
        } else {
            self.base_dir.join(p)
        }
    }
}
