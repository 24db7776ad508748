// Copyright (c) 2025 LLM DevOps
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The Liquid-style template renderer (§4.C1).
//!
//! Wraps the `liquid` crate, which already gives us `{{ expr }}`
//! substitution with dotted/bracketed navigation and the `{% if/for/
//! assign/capture/unless %}` tag family for free. We layer three custom
//! filters on top (`snakecase`, `json`, and a `date` override that
//! understands the literal `'now'`); everything else (`default`,
//! `upcase`, `escape`, `replace`, `split`, `last`, `first`, `map`, `join`,
//! `size`, `minus`, `plus`) comes from Liquid's standard filter library.

mod filters;

use std::collections::HashMap;

use crate::error::{EngineError, Result};
use crate::state::State;

/// A precompiled template, produced once per step construction and
/// rendered repeatedly against different state snapshots.
pub struct CompiledTemplate {
    source: String,
    template: liquid::Template,
}

impl std::fmt::Debug for CompiledTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledTemplate").field("source", &self.source).finish()
    }
}

/// The renderer: a shared, filter-equipped Liquid parser.
pub struct Renderer {
    parser: liquid::Parser,
}

impl Renderer {
    pub fn new() -> Self {
        let parser = liquid::ParserBuilder::with_stdlib()
            .filter(filters::SnakecaseFilterParser)
            .filter(filters::JsonFilterParser)
            .filter(filters::DateFilterParser)
            .build()
            .expect("liquid parser configuration is valid");
        Self { parser }
    }

    /// Compiles `text` once; call [`Renderer::render_compiled`] to render
    /// it against state repeatedly without re-parsing.
    pub fn compile(&self, text: &str) -> Result<CompiledTemplate> {
        let template = self
            .parser
            .parse(text)
            .map_err(|e| EngineError::Template {
                fragment: text.to_string(),
                message: e.to_string(),
            })?;
        Ok(CompiledTemplate {
            source: text.to_string(),
            template,
        })
    }

    /// Renders `text` against `state` in one call (parse + render). For
    /// templates rendered once, this is fine; steps that construct once
    /// and run many times should prefer [`Renderer::compile`] +
    /// [`Renderer::render_compiled`].
    pub fn render(&self, text: &str, state: &State) -> Result<String> {
        self.render_compiled(&self.compile(text)?, state)
    }

    pub fn render_compiled(&self, compiled: &CompiledTemplate, state: &State) -> Result<String> {
        let globals = self.globals_from_state(state)?;
        compiled
            .template
            .render(&globals)
            .map_err(|e| EngineError::Template {
                fragment: compiled.source.clone(),
                message: e.to_string(),
            })
    }

    fn globals_from_state(&self, state: &State) -> Result<liquid::Object> {
        let snapshot: HashMap<String, serde_json::Value> =
            state.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        liquid::to_object(&snapshot).map_err(|e| EngineError::Template {
            fragment: String::new(),
            message: format!("failed to build template context: {e}"),
        })
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn idempotent_on_literal_input() {
        let renderer = Renderer::new();
        let state = State::new();
        assert_eq!(renderer.render("hello world", &state).unwrap(), "hello world");
    }

    #[test]
    fn substitutes_dotted_and_bracketed_paths() {
        let renderer = Renderer::new();
        let mut state = State::new();
        state.set("data", json!({"users": [{"name": "Alice"}]}));
        assert_eq!(
            renderer.render("{{ data.users[0].name }}", &state).unwrap(),
            "Alice"
        );
    }

    #[test]
    fn snakecase_filter() {
        let renderer = Renderer::new();
        let mut state = State::new();
        state.set("title", json!("Hello World"));
        assert_eq!(
            renderer.render("{{ title | snakecase }}", &state).unwrap(),
            "hello_world"
        );
    }

    #[test]
    fn if_for_tags() {
        let renderer = Renderer::new();
        let mut state = State::new();
        state.set("ready", json!(true));
        state.set("items", json!(["a", "b", "c"]));

        let rendered = renderer
            .render(
                "{% if ready %}yes{% else %}no{% endif %}-{% for i in items %}{{ i }}{% unless forloop.last %},{% endunless %}{% endfor %}",
                &state,
            )
            .unwrap();
        assert_eq!(rendered, "yes-a,b,c");
    }

    #[test]
    fn default_filter_on_missing_key() {
        let renderer = Renderer::new();
        let state = State::new();
        assert_eq!(
            renderer.render("{{ missing | default: 'x' }}", &state).unwrap(),
            "x"
        );
    }
}
