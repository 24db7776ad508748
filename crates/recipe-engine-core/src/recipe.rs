// Copyright (c) 2025 LLM DevOps
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Recipe file format: an ordered list of typed steps plus metadata.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

use crate::error::{EngineError, Result};

/// A tagged step record: `{type, config}`. Unknown top-level keys on the
/// recipe or the step are tolerated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepSpec {
    #[serde(rename = "type")]
    pub step_type: String,
    #[serde(default)]
    pub config: Value,
}

/// An ordered sequence of steps plus optional metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recipe {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub inputs: Value,
    #[serde(default)]
    pub steps: Vec<StepSpec>,
}

impl Recipe {
    /// Loads a recipe from one of three representations, per the
    /// Executor's load/validate contract:
    ///
    /// 1. An already-parsed [`serde_json::Value`] (used via
    ///    [`Recipe::from_value`] directly).
    /// 2. A string that resolves to an existing regular file: read and
    ///    JSON-decode it.
    /// 3. A string that is itself JSON: decode it as a literal.
    pub fn load(source: &str) -> Result<Self> {
        let path = Path::new(source);
        let text = if path.is_file() {
            std::fs::read_to_string(path).map_err(|e| {
                EngineError::config(format!("failed to read recipe file {source}: {e}"))
            })?
        } else {
            source.to_string()
        };
        let value: Value = serde_json::from_str(&text)
            .map_err(|e| EngineError::config(format!("failed to parse recipe JSON: {e}")))?;
        Self::from_value(value)
    }

    /// Builds a recipe from an already-parsed JSON value, validating its
    /// shape per the Executor's load/validate contract (§4.C5 steps 4-6).
    pub fn from_value(value: Value) -> Result<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| EngineError::config("recipe must be a JSON object"))?;

        let steps_value = obj.get("steps").cloned().unwrap_or_else(|| Value::Array(vec![]));
        let steps_array = steps_value
            .as_array()
            .ok_or_else(|| EngineError::config("recipe `steps` must be a list"))?;

        let mut steps = Vec::with_capacity(steps_array.len());
        for (i, raw_step) in steps_array.iter().enumerate() {
            let step_obj = raw_step
                .as_object()
                .ok_or_else(|| EngineError::config(format!("step {i} must be a JSON object")))?;
            let step_type = step_obj
                .get("type")
                .and_then(Value::as_str)
                .ok_or_else(|| EngineError::config(format!("step {i} is missing required string field `type`")))?
                .to_string();
            let config = step_obj.get("config").cloned().unwrap_or_else(|| Value::Object(Default::default()));
            if !config.is_object() {
                return Err(EngineError::config(format!(
                    "step {i} (`{step_type}`) `config` must be a JSON object"
                )));
            }
            steps.push(StepSpec { step_type, config });
        }

        Ok(Recipe {
            name: obj.get("name").and_then(Value::as_str).map(String::from),
            description: obj.get("description").and_then(Value::as_str).map(String::from),
            inputs: obj.get("inputs").cloned().unwrap_or(Value::Null),
            steps,
        })
    }
}
