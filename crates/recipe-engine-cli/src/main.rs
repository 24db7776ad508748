// Copyright (c) 2025 LLM DevOps
// SPDX-License-Identifier: Apache-2.0

//! CLI entry point for the recipe execution engine.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use recipe_engine_core::config;
use recipe_engine_core::llm::ProviderRegistry;
use recipe_engine_core::registry::StepRegistry;
use recipe_engine_core::state::State;
use recipe_engine_core::steps::register_builtin_steps;
use recipe_engine_core::{EngineContext, EngineError, Executor, Recipe};
use recipe_engine_providers::{AnthropicClient, AzureOpenAIClient, OllamaClient, OpenAIClient, ResponsesApiClient};
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "recipe-engine")]
#[command(version, about = "Declarative JSON recipe execution engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug-level logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse and validate a recipe without executing it
    Validate {
        /// Path to the recipe file (or literal JSON)
        #[arg(value_name = "RECIPE")]
        recipe: String,
    },

    /// Execute a recipe
    Run {
        /// Path to the recipe file (or literal JSON)
        #[arg(value_name = "RECIPE")]
        recipe: String,

        /// Initial context values as `key=value` pairs (value parsed as
        /// JSON when possible, else treated as a literal string)
        #[arg(value_name = "KEY=VALUE")]
        context: Vec<String>,

        /// Directory recipe-relative paths resolve against (defaults to
        /// the current working directory)
        #[arg(long)]
        base_dir: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = if cli.verbose { tracing::Level::DEBUG } else { tracing::Level::INFO };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("recipe_engine={log_level}").into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let result = match cli.command {
        Commands::Validate { recipe } => validate_recipe(&recipe),
        Commands::Run { recipe, context, base_dir } => run_recipe(&recipe, &context, base_dir.as_deref()).await,
    };

    if let Err(e) = result {
        error!("{e:#}");
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn validate_recipe(source: &str) -> Result<()> {
    info!(source, "validating recipe");
    let recipe = Recipe::load(source).with_context(|| format!("failed to load recipe `{source}`"))?;

    println!("{}", "Recipe is valid".green().bold());
    if let Some(name) = &recipe.name {
        println!("  Name: {name}");
    }
    if let Some(description) = &recipe.description {
        println!("  Description: {description}");
    }
    println!("  Steps: {}", recipe.steps.len());
    for (i, step) in recipe.steps.iter().enumerate() {
        println!("    {i}: {}", step.step_type);
    }
    Ok(())
}

async fn run_recipe(source: &str, context_args: &[String], base_dir: Option<&str>) -> Result<()> {
    dotenvy::dotenv().ok();

    info!(source, "running recipe");
    println!("{} {}", "Running recipe:".cyan().bold(), source);

    let mut state = State::new();
    config::load_from_env(&mut state);
    for arg in context_args {
        let (key, value) = parse_context_arg(arg)?;
        state.set(key, value);
    }

    let mut registry = StepRegistry::new();
    register_builtin_steps(&mut registry);

    let providers = build_provider_registry(&state);

    let mut ctx = EngineContext::new(registry, providers);
    if let Some(dir) = base_dir {
        ctx = ctx.with_base_dir(std::path::PathBuf::from(dir));
    }

    let executor = Executor::new(ctx);
    println!("{}", "Executing...".cyan());

    match executor.execute_source(source, &mut state).await {
        Ok(()) => {
            println!("{}", "Recipe completed successfully".green().bold());
            println!("\n{}", "Artifacts:".cyan().bold());
            println!("{}", state.to_json()?);
            Ok(())
        }
        Err(err) => {
            eprintln!("{}", "Recipe failed".red().bold());
            anyhow::bail!(render_error(&err));
        }
    }
}

fn render_error(err: &EngineError) -> String {
    err.render_chain()
}

/// Parses a `key=value` context argument. The value is parsed as JSON
/// when it decodes cleanly (numbers, bools, objects, arrays, quoted
/// strings); otherwise it's stored as the literal string.
fn parse_context_arg(arg: &str) -> Result<(String, Value)> {
    let (key, raw_value) = arg
        .split_once('=')
        .with_context(|| format!("context argument `{arg}` must be `key=value`"))?;
    let value = serde_json::from_str(raw_value).unwrap_or_else(|_| Value::String(raw_value.to_string()));
    Ok((key.to_string(), value))
}

/// Constructs every provider client whose required credential is present
/// in `state.config` and registers it. Providers with missing credentials
/// are simply absent from the registry; `llm_generate` surfaces a clear
/// `EngineError::Llm` if a recipe later asks for one.
fn build_provider_registry(state: &State) -> ProviderRegistry {
    let mut registry = ProviderRegistry::new();

    if let Some(key) = state.config_get_str("OPENAI_API_KEY") {
        info!("registered openai provider");
        registry.register(Arc::new(OpenAIClient::new(key)));
        registry.register(Arc::new(ResponsesApiClient::openai(key)));
    }

    if let Some(key) = state.config_get_str("ANTHROPIC_API_KEY") {
        info!("registered anthropic provider");
        registry.register(Arc::new(AnthropicClient::new(key)));
    }

    if let (Some(key), Some(base_url)) = (
        state.config_get_str("AZURE_OPENAI_API_KEY"),
        state.config_get_str("AZURE_OPENAI_BASE_URL"),
    ) {
        let api_version = state
            .config_get_str("AZURE_OPENAI_API_VERSION")
            .unwrap_or("2024-02-01");
        info!("registered azure provider");
        registry.register(Arc::new(AzureOpenAIClient::new(key, base_url, api_version)));
        registry.register(Arc::new(ResponsesApiClient::azure(key, base_url)));
    }

    let ollama_base_url = state
        .config_get_str("OLLAMA_BASE_URL")
        .unwrap_or("http://localhost:11434/v1");
    info!(base_url = ollama_base_url, "registered ollama provider");
    registry.register(Arc::new(OllamaClient::with_base_url(ollama_base_url)));

    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_json_context_value() {
        let (key, value) = parse_context_arg("count=3").unwrap();
        assert_eq!(key, "count");
        assert_eq!(value, json!(3));
    }

    #[test]
    fn falls_back_to_string_for_non_json_value() {
        let (key, value) = parse_context_arg("name=not json: at all").unwrap();
        assert_eq!(key, "name");
        assert_eq!(value, json!("not json: at all"));
    }

    #[test]
    fn rejects_missing_equals_sign() {
        assert!(parse_context_arg("noequals").is_err());
    }
}
