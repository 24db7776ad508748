// Copyright (c) 2025 LLM DevOps
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Custom Liquid filters the stdlib doesn't provide: `snakecase`, `json`,
//! and a `date` override that understands the literal `'now'`.

use chrono::Local;
use liquid_core::{
    Display_filter, Filter, FilterParameters, FilterReflection, FromFilterParameters, ParseFilter,
    Result as LiquidResult, Runtime, Value, ValueView,
};

/// Converts a liquid value view into a `serde_json::Value`, recursively.
pub(crate) fn view_to_json(view: &dyn ValueView) -> serde_json::Value {
    if view.is_nil() {
        return serde_json::Value::Null;
    }
    if let Some(arr) = view.as_array() {
        return serde_json::Value::Array(arr.values().map(|v| view_to_json(v.as_view())).collect());
    }
    if let Some(obj) = view.as_object() {
        return serde_json::Value::Object(
            obj.iter()
                .map(|(k, v)| (k.into_string(), view_to_json(v.as_view())))
                .collect(),
        );
    }
    if let Some(scalar) = view.as_scalar() {
        if let Some(b) = scalar.to_bool() {
            return serde_json::Value::Bool(b);
        }
        if let Some(i) = scalar.to_integer() {
            return serde_json::Value::Number(i.into());
        }
        if let Some(f) = scalar.to_float() {
            if let Some(n) = serde_json::Number::from_f64(f) {
                return serde_json::Value::Number(n);
            }
        }
        return serde_json::Value::String(scalar.to_kstr().into_string());
    }
    serde_json::Value::String(view.to_kstr().into_string())
}

fn to_snake_case(input: &str) -> String {
    let mut out = String::with_capacity(input.len() + 4);
    let mut prev_was_lower_or_digit = false;
    for c in input.chars() {
        if c.is_uppercase() {
            if prev_was_lower_or_digit {
                out.push('_');
            }
            out.extend(c.to_lowercase());
            prev_was_lower_or_digit = false;
        } else if c == ' ' || c == '-' {
            out.push('_');
            prev_was_lower_or_digit = false;
        } else {
            out.push(c);
            prev_was_lower_or_digit = c.is_lowercase() || c.is_ascii_digit();
        }
    }
    out
}

#[derive(Clone, ParseFilter, FilterReflection)]
#[filter(
    name = "snakecase",
    description = "Converts a string to snake_case.",
    parsed(SnakecaseFilter)
)]
pub struct SnakecaseFilterParser;

#[derive(Debug, Default, Display_filter)]
#[name = "snakecase"]
struct SnakecaseFilter;

impl Filter for SnakecaseFilter {
    fn evaluate(&self, input: &dyn ValueView, _runtime: &dyn Runtime) -> LiquidResult<Value> {
        Ok(Value::scalar(to_snake_case(&input.to_kstr())))
    }
}

#[derive(Debug, FilterParameters)]
struct JsonArgs {
    #[parameter(description = "Number of spaces to indent with.", arg_type = "integer")]
    indent: Option<liquid_core::runtime::Expression>,
}

#[derive(Clone, ParseFilter, FilterReflection)]
#[filter(
    name = "json",
    description = "Serializes the input as a JSON string, optionally pretty-printed.",
    parameters(JsonArgs),
    parsed(JsonFilter)
)]
pub struct JsonFilterParser;

#[derive(FromFilterParameters, Display_filter)]
#[name = "json"]
struct JsonFilter {
    #[parameters]
    args: JsonArgs,
}

impl Filter for JsonFilter {
    fn evaluate(&self, input: &dyn ValueView, runtime: &dyn Runtime) -> LiquidResult<Value> {
        let args = self.args.evaluate(runtime)?;
        let json_value = view_to_json(input);

        let rendered = match args.indent {
            Some(width) if width > 0 => {
                let indent = " ".repeat(width as usize);
                let buf = Vec::new();
                let formatter = serde_json::ser::PrettyFormatter::with_indent(indent.as_bytes());
                let mut ser = serde_json::Serializer::with_formatter(buf, formatter);
                serde::Serialize::serialize(&json_value, &mut ser)
                    .map_err(|e| liquid_core::Error::with_msg(format!("json filter: {e}")))?;
                String::from_utf8(ser.into_inner())
                    .map_err(|e| liquid_core::Error::with_msg(format!("json filter: {e}")))?
            }
            _ => serde_json::to_string(&json_value)
                .map_err(|e| liquid_core::Error::with_msg(format!("json filter: {e}")))?,
        };

        Ok(Value::scalar(rendered))
    }
}

#[derive(Debug, FilterParameters)]
struct DateArgs {
    #[parameter(description = "The strftime-style format string.")]
    format: liquid_core::runtime::Expression,
}

#[derive(Clone, ParseFilter, FilterReflection)]
#[filter(
    name = "date",
    description = "Formats a date; the literal input 'now' means the current local time.",
    parameters(DateArgs),
    parsed(DateFilter)
)]
pub struct DateFilterParser;

#[derive(FromFilterParameters, Display_filter)]
#[name = "date"]
struct DateFilter {
    #[parameters]
    args: DateArgs,
}

impl Filter for DateFilter {
    fn evaluate(&self, input: &dyn ValueView, runtime: &dyn Runtime) -> LiquidResult<Value> {
        let args = self.args.evaluate(runtime)?;
        let format = args.format.into_owned();
        let raw = input.to_kstr();

        let formatted = if raw.as_str() == "now" {
            Local::now().format(&format).to_string()
        } else {
            match chrono::DateTime::parse_from_rfc3339(&raw) {
                Ok(dt) => dt.format(&format).to_string(),
                Err(_) => raw.into_string(),
            }
        };

        Ok(Value::scalar(formatted))
    }
}
