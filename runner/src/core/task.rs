//! Agent task construction: mode, prompt rendering, and tool gating.
//!
//! Prompt text is configuration, not logic. The templates below are rendered
//! once per run and forwarded to the agent runtime unmodified; all
//! mode-specific behavior (tool restriction in particular) is keyed off
//! [`Mode`], never off prompt contents.

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{Context, Result};
use minijinja::{context, Environment};
use serde::{Deserialize, Serialize};

const VALIDATION_TEMPLATE: &str = include_str!("prompts/validation.md");
const GUARDRAILS_TEMPLATE: &str = include_str!("prompts/guardrails.md");

/// Scan mode selected by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Find system prompts and validate them through the AI Defense backend.
    Validation,
    /// Find LLM call sites and integrate AI Defense guardrails around them.
    Guardrails,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Validation => "validation",
            Mode::Guardrails => "guardrails",
        }
    }
}

/// Explicit tool allow-lists. Dry-run gating is keyed off these lists, never
/// inferred from tool names at runtime. Loaded from `[tools]` in the config
/// file; the defaults cover the standard agent tool surface and the AI
/// Defense bridge tools.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ToolConfig {
    /// Inspection/reporting tools, always permitted.
    pub read_only: Vec<String>,
    /// Tools capable of mutating files or running arbitrary commands.
    pub mutating: Vec<String>,
    /// Tool surface exposed by the AI Defense bridge.
    pub bridge: Vec<String>,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            read_only: vec!["Read".to_string(), "Glob".to_string(), "Grep".to_string()],
            mutating: vec!["Bash".to_string(), "Edit".to_string(), "Write".to_string()],
            bridge: vec![
                "mcp__ai_defense__validate_system_prompt".to_string(),
                "mcp__ai_defense__setup_ai_defense_guardrails".to_string(),
            ],
        }
    }
}

/// The single task description for one agent session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentTask {
    pub mode: Mode,
    /// Rendered prompt, forwarded verbatim to the agent runtime.
    pub prompt_text: String,
    /// Tool identifiers the session may use. Sorted for stable argv output.
    pub allowed_tools: BTreeSet<String>,
}

/// Inputs for prompt rendering.
#[derive(Debug, Clone, Copy)]
pub struct TaskInputs<'a> {
    pub target_dir: &'a Path,
    pub dry_run: bool,
    pub bridge_reachable: bool,
}

/// Compute the tool allow-list for a session.
///
/// Dry-run is a hard gate: only the configured read-only tools remain, so no
/// tool capable of mutating files or contacting the security backend is even
/// offered to the runtime. In live runs, mutating tools require guardrails
/// mode, and bridge tools require a reachable bridge. The lists themselves
/// come from configuration, never from tool-name inference.
pub fn allowed_tools(
    tools: &ToolConfig,
    mode: Mode,
    dry_run: bool,
    bridge_reachable: bool,
) -> BTreeSet<String> {
    let mut set: BTreeSet<String> = tools.read_only.iter().cloned().collect();
    if dry_run {
        return set;
    }
    if mode == Mode::Guardrails {
        set.extend(tools.mutating.iter().cloned());
    }
    if bridge_reachable {
        set.extend(tools.bridge.iter().cloned());
    }
    set
}

/// Build the one [`AgentTask`] for this run: render the mode's prompt and
/// attach the gated tool set.
pub fn build_task(tools: &ToolConfig, mode: Mode, inputs: &TaskInputs<'_>) -> Result<AgentTask> {
    let mut env = Environment::new();
    env.add_template("validation", VALIDATION_TEMPLATE)
        .context("validation template should be valid")?;
    env.add_template("guardrails", GUARDRAILS_TEMPLATE)
        .context("guardrails template should be valid")?;

    let template = env
        .get_template(mode.as_str())
        .context("look up prompt template")?;
    let prompt_text = template
        .render(context! {
            target_dir => inputs.target_dir.display().to_string(),
            dry_run => inputs.dry_run,
            bridge_reachable => inputs.bridge_reachable,
        })
        .with_context(|| format!("render {} prompt", mode.as_str()))?;

    Ok(AgentTask {
        mode,
        prompt_text,
        allowed_tools: allowed_tools(tools, mode, inputs.dry_run, inputs.bridge_reachable),
    })
}
