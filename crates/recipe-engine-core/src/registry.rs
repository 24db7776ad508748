// Copyright (c) 2025 LLM DevOps
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Process-global step-type-tag -> step-constructor mapping.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::context::EngineContext;
use crate::error::Result;
use crate::step::Step;

/// A constructor accepts the shared engine context plus the step's
/// `config` subtree, and returns a boxed step instance. Construction is
/// where configuration validation happens (§4.C4).
pub type StepConstructor =
    Arc<dyn Fn(Arc<EngineContext>, Value) -> Result<Box<dyn Step>> + Send + Sync>;

/// A process-global mapping from step-type tag to step constructor.
///
/// Populated once at startup (one entry per concrete step type); lookup
/// is lock-free reads against a plain `HashMap` since the registry is
/// immutable after construction.
#[derive(Clone, Default)]
pub struct StepRegistry {
    constructors: HashMap<String, StepConstructor>,
}

impl StepRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a constructor under `step_type`. Re-registering a tag
    /// overwrites the previous entry (callers compose a registry at
    /// startup; overwrite is a deliberate escape hatch for tests).
    pub fn register(&mut self, step_type: impl Into<String>, constructor: StepConstructor) {
        self.constructors.insert(step_type.into(), constructor);
    }

    pub fn get(&self, step_type: &str) -> Option<&StepConstructor> {
        self.constructors.get(step_type)
    }

    pub fn contains(&self, step_type: &str) -> bool {
        self.constructors.contains_key(step_type)
    }
}
