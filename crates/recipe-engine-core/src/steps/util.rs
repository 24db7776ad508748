// Copyright (c) 2025 LLM DevOps
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared helpers used by more than one step implementation.

use serde_json::Value;

use crate::error::Result;
use crate::state::State;
use crate::template::{CompiledTemplate, Renderer};

/// A `Value` tree with every string leaf precompiled into a
/// [`CompiledTemplate`], produced once at step construction time and
/// rendered repeatedly against per-run state by [`render_compiled_value_recursive`].
///
/// Used by SetContext's `value`, ExecuteRecipe's `context_overrides`,
/// DocpackCreate's `outline`, and McpToolCall's `server`/`arguments`
/// (§4.C11's override-rendering design note, generalized to every config
/// field that accepts an arbitrary templated JSON tree).
pub enum CompiledValue {
    Template(CompiledTemplate),
    Array(Vec<CompiledValue>),
    Object(Vec<(String, CompiledValue)>),
    Literal(Value),
}

/// Compiles every string leaf of `value` into a template, once.
pub fn compile_value_recursive(renderer: &Renderer, value: &Value) -> Result<CompiledValue> {
    match value {
        Value::String(s) => Ok(CompiledValue::Template(renderer.compile(s)?)),
        Value::Array(items) => Ok(CompiledValue::Array(
            items
                .iter()
                .map(|v| compile_value_recursive(renderer, v))
                .collect::<Result<Vec<_>>>()?,
        )),
        Value::Object(map) => Ok(CompiledValue::Object(
            map.iter()
                .map(|(k, v)| Ok((k.clone(), compile_value_recursive(renderer, v)?)))
                .collect::<Result<Vec<_>>>()?,
        )),
        other => Ok(CompiledValue::Literal(other.clone())),
    }
}

/// Renders a precompiled value tree against `state`. After rendering, a
/// template leaf that parses as a JSON object or array is replaced by the
/// parsed structure; otherwise it's kept as the rendered string. Literal
/// leaves pass through untouched.
pub fn render_compiled_value_recursive(renderer: &Renderer, state: &State, value: &CompiledValue) -> Result<Value> {
    match value {
        CompiledValue::Template(t) => {
            let rendered = renderer.render_compiled(t, state)?;
            Ok(match serde_json::from_str::<Value>(&rendered) {
                Ok(parsed @ (Value::Object(_) | Value::Array(_))) => parsed,
                _ => Value::String(rendered),
            })
        }
        CompiledValue::Array(items) => {
            let rendered = items
                .iter()
                .map(|v| render_compiled_value_recursive(renderer, state, v))
                .collect::<Result<Vec<_>>>()?;
            Ok(Value::Array(rendered))
        }
        CompiledValue::Object(map) => {
            let mut rendered = serde_json::Map::with_capacity(map.len());
            for (k, v) in map {
                rendered.insert(k.clone(), render_compiled_value_recursive(renderer, state, v)?);
            }
            Ok(Value::Object(rendered))
        }
        CompiledValue::Literal(v) => Ok(v.clone()),
    }
}

/// Merges `new` into `existing` per SetContext's `if_exists: merge` rule:
/// strings concatenate, arrays append, objects shallow-merge. Mismatched
/// types fall back to `new` replacing `existing`.
pub fn merge_values(existing: &Value, new: &Value) -> Value {
    match (existing, new) {
        (Value::String(a), Value::String(b)) => Value::String(format!("{a}{b}")),
        (Value::Array(a), Value::Array(b)) => {
            let mut combined = a.clone();
            combined.extend(b.clone());
            Value::Array(combined)
        }
        (Value::Array(a), other) => {
            let mut combined = a.clone();
            combined.push(other.clone());
            Value::Array(combined)
        }
        (Value::Object(a), Value::Object(b)) => {
            let mut combined = a.clone();
            for (k, v) in b {
                combined.insert(k.clone(), v.clone());
            }
            Value::Object(combined)
        }
        (_, new) => new.clone(),
    }
}

/// Extracts a single path, a comma-delimited string of paths, or a JSON
/// array of paths from a config value, as ReadFiles' `path` field accepts.
pub fn as_path_list(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) => s.split(',').map(|p| p.trim().to_string()).filter(|p| !p.is_empty()).collect(),
        Value::Array(items) => items.iter().filter_map(|v| v.as_str().map(String::from)).collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn compiled_value_recursive_parses_json_strings() {
        let renderer = Renderer::new();
        let mut state = State::new();
        state.set("greeting", json!("Hello Alice"));
        let compiled = compile_value_recursive(&renderer, &json!("{{greeting}}")).unwrap();
        let result = render_compiled_value_recursive(&renderer, &state, &compiled).unwrap();
        assert_eq!(result, json!("Hello Alice"));
    }

    #[test]
    fn compiled_value_recursive_descends_into_collections() {
        let renderer = Renderer::new();
        let mut state = State::new();
        state.set("name", json!("Bob"));
        let compiled =
            compile_value_recursive(&renderer, &json!({"greeting": "hi {{name}}", "count": 3})).unwrap();
        let result = render_compiled_value_recursive(&renderer, &state, &compiled).unwrap();
        assert_eq!(result, json!({"greeting": "hi Bob", "count": 3}));
    }

    #[test]
    fn merge_concatenates_strings_and_appends_lists() {
        assert_eq!(merge_values(&json!("a"), &json!("b")), json!("ab"));
        assert_eq!(merge_values(&json!([1, 2]), &json!([3])), json!([1, 2, 3]));
    }
}
