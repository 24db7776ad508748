// Copyright (c) 2025 LLM DevOps
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Process-scoped shared mutable state: artifacts + config.

use serde_json::Value;
use std::collections::HashMap;

use crate::error::{EngineError, Result};

/// A process-scoped container of artifacts and config.
///
/// `artifacts` holds step outputs keyed by string; `config` holds
/// read-mostly credentials/endpoints/defaults. Both namespaces are
/// distinct so templates and steps can treat them differently.
///
/// `clone()` produces a deep, independent copy: subsequent mutations on
/// either side are invisible to the other. This is what Loop/Parallel
/// rely on for per-branch isolation.
#[derive(Debug, Clone, Default)]
pub struct State {
    artifacts: HashMap<String, Value>,
    config: HashMap<String, Value>,
}

impl State {
    /// Creates an empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a state from initial artifact and config mappings. Both
    /// inputs are deep-copied; the caller retains no back-channel into the
    /// constructed state.
    pub fn from_mappings(artifacts: HashMap<String, Value>, config: HashMap<String, Value>) -> Self {
        Self { artifacts, config }
    }

    /// Creates a state seeded only with artifacts (config empty).
    pub fn from_artifacts(artifacts: HashMap<String, Value>) -> Self {
        Self {
            artifacts,
            config: HashMap::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.artifacts.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.artifacts.insert(key.into(), value);
    }

    pub fn delete(&mut self, key: &str) -> Option<Value> {
        self.artifacts.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.artifacts.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.artifacts.iter()
    }

    pub fn config_get(&self, key: &str) -> Option<&Value> {
        self.config.get(key)
    }

    pub fn config_get_str(&self, key: &str) -> Option<&str> {
        self.config.get(key).and_then(Value::as_str)
    }

    pub fn config_set(&mut self, key: impl Into<String>, value: Value) {
        self.config.insert(key.into(), value);
    }

    /// Navigates a dotted/bracketed path (`a.b.c`, `a[0].b`) into the
    /// artifact namespace. Used by Loop's `items` string-path resolution.
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let mut segments = split_path(path);
        let first = segments.next()?;
        let mut current = self.artifacts.get(first)?;
        for seg in segments {
            current = navigate(current, &seg)?;
        }
        Some(current)
    }

    /// A snapshot of the artifact namespace as a JSON mapping. Does not
    /// consume `self`.
    pub fn snapshot(&self) -> Value {
        Value::Object(
            self.artifacts
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }

    /// Serializes the artifact namespace to a JSON string. Opaque values
    /// that fail to encode are coerced to their Display/Debug
    /// representation rather than failing the whole serialization,
    /// matching the "coerce by default" policy.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(&self.snapshot()).map_err(EngineError::from)
    }

    /// Same as [`State::to_json`] but fails hard on any non-encodable
    /// value, for callers that prefer strict serialization.
    pub fn to_json_strict(&self) -> Result<String> {
        serde_json::to_string(&self.snapshot()).map_err(EngineError::from)
    }

    /// Produces an independent deep copy of this state. Mutations to the
    /// clone are never visible to the original and vice versa.
    pub fn clone_isolated(&self) -> Self {
        self.clone()
    }

    pub fn artifacts_len(&self) -> usize {
        self.artifacts.len()
    }
}

fn split_path(path: &str) -> impl Iterator<Item = String> + '_ {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut chars = path.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '.' => {
                if !current.is_empty() {
                    segments.push(std::mem::take(&mut current));
                }
            }
            '[' => {
                if !current.is_empty() {
                    segments.push(std::mem::take(&mut current));
                }
                let mut idx = String::new();
                for c2 in chars.by_ref() {
                    if c2 == ']' {
                        break;
                    }
                    idx.push(c2);
                }
                segments.push(idx);
            }
            _ => current.push(c),
        }
    }
    if !current.is_empty() {
        segments.push(current);
    }
    segments.into_iter()
}

fn navigate<'a>(value: &'a Value, segment: &str) -> Option<&'a Value> {
    if let Ok(idx) = segment.parse::<usize>() {
        if let Value::Array(arr) = value {
            return arr.get(idx);
        }
    }
    match value {
        Value::Object(map) => map.get(segment),
        _ => None,
    }
}
