// Copyright (c) 2025 LLM DevOps
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared request/response shaping used by every provider client: turning
//! an `OutputType` into a JSON-mode instruction, and parsing the model's
//! reply back into a `GenerateResult`.

use recipe_engine_core::error::{EngineError, Result};
use recipe_engine_core::llm::{GenerateResult, OutputType};
use serde_json::Value;

/// Appends a structured-output instruction to `prompt` when `output_type`
/// requires one. Plain-text requests are passed through unchanged; none of
/// the providers modeled here have a native JSON-schema response mode
/// exposed through the chat/messages APIs this client speaks, so the
/// contract is enforced by instruction plus response-side validation.
pub fn augment_prompt(prompt: &str, output_type: &OutputType) -> String {
    match output_type {
        OutputType::Text => prompt.to_string(),
        OutputType::Files => format!(
            "{prompt}\n\nRespond with a single JSON object of the form \
             {{\"files\": [{{\"path\": string, \"content\": string}}, ...]}} and nothing else."
        ),
        OutputType::Object { schema } => format!(
            "{prompt}\n\nRespond with a single JSON object matching this schema and nothing else:\n{schema}"
        ),
        OutputType::List { item_schema } => format!(
            "{prompt}\n\nRespond with a single JSON object of the form {{\"items\": [...]}} where each \
             element of `items` matches this schema, and nothing else:\n{item_schema}"
        ),
    }
}

/// Parses a model's raw text reply into the structured result `output_type`
/// calls for. Plain text always succeeds; everything else must round-trip
/// through [`serde_json::from_str`] or the step fails with
/// [`EngineError::LlmSchema`].
pub fn parse_result(raw_text: &str, output_type: &OutputType) -> Result<GenerateResult> {
    match output_type {
        OutputType::Text => Ok(GenerateResult::Text(raw_text.to_string())),
        OutputType::Files => {
            let value = parse_json_payload(raw_text)?;
            let files = value
                .get("files")
                .and_then(Value::as_array)
                .ok_or_else(|| EngineError::LlmSchema {
                    payload: raw_text.to_string(),
                    message: "expected a top-level `files` array".to_string(),
                })?;
            Ok(GenerateResult::Files(files.clone()))
        }
        OutputType::Object { .. } => Ok(GenerateResult::Object(parse_json_payload(raw_text)?)),
        OutputType::List { .. } => {
            let value = parse_json_payload(raw_text)?;
            let items = value
                .get("items")
                .and_then(Value::as_array)
                .ok_or_else(|| EngineError::LlmSchema {
                    payload: raw_text.to_string(),
                    message: "expected a top-level `items` array".to_string(),
                })?;
            Ok(GenerateResult::List(items.clone()))
        }
    }
}

fn parse_json_payload(raw_text: &str) -> Result<Value> {
    let trimmed = strip_code_fence(raw_text.trim());
    serde_json::from_str(trimmed).map_err(|e| EngineError::LlmSchema {
        payload: raw_text.to_string(),
        message: format!("response was not valid JSON: {e}"),
    })
}

/// Models routinely wrap JSON replies in a ```json fenced block despite
/// instructions not to; strip it rather than failing the whole step.
fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest).trim_start();
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_files_payload() {
        let raw = r#"{"files": [{"path": "a.txt", "content": "A"}]}"#;
        let result = parse_result(raw, &OutputType::Files).unwrap();
        match result {
            GenerateResult::Files(files) => assert_eq!(files, vec![json!({"path": "a.txt", "content": "A"})]),
            _ => panic!("expected Files"),
        }
    }

    #[test]
    fn strips_json_code_fence() {
        let raw = "```json\n{\"files\": []}\n```";
        assert!(parse_result(raw, &OutputType::Files).is_ok());
    }

    #[test]
    fn text_passes_through_unmodified() {
        let result = parse_result("plain reply", &OutputType::Text).unwrap();
        match result {
            GenerateResult::Text(t) => assert_eq!(t, "plain reply"),
            _ => panic!("expected Text"),
        }
    }
}
