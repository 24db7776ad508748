// Copyright (c) 2025 LLM DevOps
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Built-in step implementations and their registry wiring.

mod concurrency;
mod conditional;
mod docpack;
mod execute_recipe;
mod llm_generate;
mod loop_step;
mod mcp_tool_call;
mod parallel;
mod read_files;
mod set_context;
mod shell;
pub mod util;
mod write_files;

use std::sync::Arc;

use crate::registry::StepRegistry;

/// Registers every built-in step type under its recipe `type` tag. Called
/// once at startup by the embedding CLI (or by tests that need a full
/// registry).
pub fn register_builtin_steps(registry: &mut StepRegistry) {
    registry.register(
        "set_context",
        Arc::new(|ctx, config| Ok(Box::new(set_context::SetContextStep::new(ctx, config)?) as _)),
    );
    registry.register(
        "conditional",
        Arc::new(|ctx, config| Ok(Box::new(conditional::ConditionalStep::new(ctx, config)?) as _)),
    );
    registry.register(
        "loop",
        Arc::new(|ctx, config| Ok(Box::new(loop_step::LoopStep::new(ctx, config)?) as _)),
    );
    registry.register(
        "parallel",
        Arc::new(|ctx, config| Ok(Box::new(parallel::ParallelStep::new(ctx, config)?) as _)),
    );
    registry.register(
        "execute_recipe",
        Arc::new(|ctx, config| Ok(Box::new(execute_recipe::ExecuteRecipeStep::new(ctx, config)?) as _)),
    );
    registry.register(
        "llm_generate",
        Arc::new(|ctx, config| Ok(Box::new(llm_generate::LLMGenerateStep::new(ctx, config)?) as _)),
    );
    registry.register(
        "read_files",
        Arc::new(|ctx, config| Ok(Box::new(read_files::ReadFilesStep::new(ctx, config)?) as _)),
    );
    registry.register(
        "write_files",
        Arc::new(|ctx, config| Ok(Box::new(write_files::WriteFilesStep::new(ctx, config)?) as _)),
    );
    registry.register(
        "mcp_tool_call",
        Arc::new(|ctx, config| Ok(Box::new(mcp_tool_call::McpToolCallStep::new(ctx, config)?) as _)),
    );
    registry.register(
        "shell",
        Arc::new(|ctx, config| Ok(Box::new(shell::ShellStep::new(ctx, config)?) as _)),
    );
    registry.register(
        "docpack_create",
        Arc::new(|ctx, config| Ok(Box::new(docpack::DocpackCreateStep::new(ctx, config)?) as _)),
    );
    registry.register(
        "docpack_extract",
        Arc::new(|ctx, config| Ok(Box::new(docpack::DocpackExtractStep::new(ctx, config)?) as _)),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_every_builtin_tag() {
        let mut registry = StepRegistry::new();
        register_builtin_steps(&mut registry);
        for tag in [
            "set_context",
            "conditional",
            "loop",
            "parallel",
            "execute_recipe",
            "llm_generate",
            "read_files",
            "write_files",
            "mcp_tool_call",
            "shell",
            "docpack_create",
            "docpack_extract",
        ] {
            assert!(registry.contains(tag), "missing builtin step `{tag}`");
        }
    }
}
