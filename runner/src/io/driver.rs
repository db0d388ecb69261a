//! Agent Driver: one session with the agent runtime per run.
//!
//! The [`AgentBackend`] trait decouples session orchestration from the actual
//! agent runtime (currently the `claude` CLI). Tests use scripted backends
//! that return predetermined event streams without spawning processes.
//!
//! The driver's contract is that it never raises: every session-level failure
//! (spawn error, timeout, nonzero exit, malformed event or envelope) is
//! captured into the returned [`SessionResult`] together with the partial
//! transcript, so a best-effort report can always be written. It never
//! retries either; re-running is the pipeline's responsibility.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, info, instrument, warn};

use crate::core::context::RunContext;
use crate::core::session::{
    parse_event_line, parse_output_envelope, SessionResult, StreamEvent, Turn, TurnRole,
};
use crate::core::task::AgentTask;
use crate::io::bridge::BridgeConfig;
use crate::io::config::ScanConfig;
use crate::io::process::run_command_with_timeout;

/// Parameters for one backend invocation.
#[derive(Debug, Clone)]
pub struct SessionRequest {
    /// Working directory for the agent process (the analysis target).
    pub workdir: PathBuf,
    /// Rendered task prompt, fed on stdin.
    pub prompt: String,
    /// Gated tool identifiers, sorted.
    pub allowed_tools: Vec<String>,
    /// Inline MCP server configuration. `None` when the bridge is not
    /// attached (dry-run or unreachable); credentials never appear here.
    pub mcp_config: Option<String>,
    /// Environment injected into the agent process (bridge credentials).
    pub env: BTreeMap<String, String>,
    /// Session wall-clock budget.
    pub timeout: Duration,
    /// Truncate captured output beyond this many bytes.
    pub output_limit_bytes: usize,
    /// Tee the raw event stream here for audit replay.
    pub transcript_path: Option<PathBuf>,
}

/// Raw outcome of one backend invocation, before stream interpretation.
#[derive(Debug, Clone, Default)]
pub struct BackendOutput {
    /// JSONL event lines in arrival order.
    pub lines: Vec<String>,
    pub timed_out: bool,
    pub exit_ok: bool,
    pub stderr: String,
}

/// Abstraction over agent runtimes.
pub trait AgentBackend {
    /// Run one session to completion and return its event stream.
    fn exec(&self, request: &SessionRequest) -> Result<BackendOutput>;
}

/// Backend that spawns the `claude` CLI.
#[derive(Debug, Clone)]
pub struct ClaudeBackend {
    command: String,
}

impl Default for ClaudeBackend {
    fn default() -> Self {
        Self {
            command: "claude".to_string(),
        }
    }
}

impl AgentBackend for ClaudeBackend {
    #[instrument(skip_all, fields(timeout_secs = request.timeout.as_secs(), bridged = request.mcp_config.is_some()))]
    fn exec(&self, request: &SessionRequest) -> Result<BackendOutput> {
        info!(workdir = %request.workdir.display(), "starting agent session");

        let mut cmd = std::process::Command::new(&self.command);
        cmd.arg("-p")
            .arg("--output-format")
            .arg("stream-json")
            .arg("--verbose")
            .arg("--allowed-tools")
            .arg(request.allowed_tools.join(","));
        if let Some(mcp_config) = &request.mcp_config {
            cmd.arg("--mcp-config").arg(mcp_config);
        }
        cmd.current_dir(&request.workdir).envs(&request.env);

        let output = run_command_with_timeout(
            cmd,
            Some(request.prompt.as_bytes()),
            request.timeout,
            request.output_limit_bytes,
            request.transcript_path.as_deref(),
        )
        .context("run agent runtime")?;

        let lines = String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::to_string)
            .collect();
        debug!(exit_code = ?output.status.code(), timed_out = output.timed_out, "agent session finished");
        Ok(BackendOutput {
            lines,
            timed_out: output.timed_out,
            exit_ok: output.status.success(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

/// Run the single agent session for this invocation.
///
/// Always returns a [`SessionResult`]; callers never see an error from here.
pub fn run_session<B: AgentBackend>(
    backend: &B,
    task: &AgentTask,
    context: &RunContext,
    bridge: &BridgeConfig,
    config: &ScanConfig,
    transcript_path: Option<&Path>,
) -> SessionResult {
    let request = build_request(task, context, bridge, config, transcript_path);
    match drive(backend, &request, config.session_timeout_secs) {
        Ok(result) => result,
        Err(err) => {
            warn!(err = %format!("{err:#}"), "agent session failed before producing a stream");
            SessionResult::failed(Vec::new(), format!("agent session error: {err:#}"))
        }
    }
}

fn build_request(
    task: &AgentTask,
    context: &RunContext,
    bridge: &BridgeConfig,
    config: &ScanConfig,
    transcript_path: Option<&Path>,
) -> SessionRequest {
    // Hard gate: the bridge is attached only to live sessions with a
    // reachable server. Dry-run never sees an MCP config regardless of what
    // the bridge builder produced.
    let attach_bridge = bridge.reachable && !context.dry_run;
    SessionRequest {
        workdir: context.target_dir.clone(),
        prompt: task.prompt_text.clone(),
        allowed_tools: task.allowed_tools.iter().cloned().collect(),
        mcp_config: attach_bridge.then(|| mcp_config_json(bridge)),
        env: bridge.credentials.clone(),
        timeout: Duration::from_secs(config.session_timeout_secs),
        output_limit_bytes: config.output_limit_bytes,
        transcript_path: transcript_path.map(Path::to_path_buf),
    }
}

/// Inline MCP configuration for the agent runtime. Credentials are injected
/// through the child environment instead, so none of them land in argv or on
/// disk.
fn mcp_config_json(bridge: &BridgeConfig) -> String {
    serde_json::json!({
        "mcpServers": {
            "ai_defense": {
                "command": bridge.server_command,
                "args": bridge.server_args,
                "cwd": bridge.working_dir,
            }
        }
    })
    .to_string()
}

fn drive<B: AgentBackend>(
    backend: &B,
    request: &SessionRequest,
    timeout_secs: u64,
) -> Result<SessionResult> {
    let output = backend.exec(request)?;

    let mut turns: Vec<Turn> = Vec::new();
    let mut completed: Option<(String, bool)> = None;
    for line in &output.lines {
        if line.trim().is_empty() {
            continue;
        }
        match parse_event_line(line) {
            Ok(StreamEvent::Turns(batch)) => turns.extend(batch),
            Ok(StreamEvent::Completed { text, is_error }) => {
                turns.push(Turn::new(TurnRole::Result, text.clone()));
                completed = Some((text, is_error));
            }
            Err(err) => {
                return Ok(SessionResult::failed(
                    turns,
                    format!("malformed agent event: {err:#}"),
                ));
            }
        }
    }

    if output.timed_out {
        return Ok(SessionResult::failed(
            turns,
            format!("agent session timed out after {timeout_secs}s"),
        ));
    }
    if !output.exit_ok {
        let detail = tail(&output.stderr, 500);
        return Ok(SessionResult::failed(
            turns,
            format!("agent runtime exited with failure: {detail}"),
        ));
    }
    let Some((text, is_error)) = completed else {
        return Ok(SessionResult::failed(
            turns,
            "agent stream ended without a result sentinel",
        ));
    };
    if is_error {
        return Ok(SessionResult::failed(
            turns,
            format!("agent reported an error result: {}", tail(&text, 500)),
        ));
    }

    let result = match parse_output_envelope(&text) {
        Ok(envelope) => {
            info!(findings = envelope.findings.len(), "agent session completed");
            SessionResult {
                turns,
                findings: envelope.findings,
                success: true,
                error_message: None,
            }
        }
        Err(err) => SessionResult::failed(turns, format!("malformed agent output: {err:#}")),
    };
    Ok(result)
}

fn tail(text: &str, limit: usize) -> String {
    let trimmed = text.trim();
    if trimmed.len() <= limit {
        return trimmed.to_string();
    }
    let start = trimmed.len() - limit;
    // Avoid splitting a UTF-8 character.
    let start = (start..trimmed.len())
        .find(|i| trimmed.is_char_boundary(*i))
        .unwrap_or(trimmed.len());
    format!("...{}", &trimmed[start..])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::task::{allowed_tools, Mode, ToolConfig};
    use crate::test_support::{result_line, tool_result_line, tool_use_line, ScriptedBackend};
    use std::collections::BTreeSet;
    use std::path::PathBuf;

    fn context(dry_run: bool) -> RunContext {
        RunContext {
            repo_root: PathBuf::from("/repo"),
            commit_id: Some("abc".to_string()),
            target_dir: PathBuf::from("/repo/app"),
            dry_run,
        }
    }

    fn bridge(reachable: bool) -> BridgeConfig {
        BridgeConfig {
            server_command: "python3".to_string(),
            server_args: vec!["-m".to_string(), "src.server".to_string()],
            working_dir: PathBuf::from("/repo/ai-defense-mcp"),
            credentials: BTreeMap::from([(
                "AIC_MANAGEMENT_API_KEY".to_string(),
                "key".to_string(),
            )]),
            reachable,
        }
    }

    fn task(mode: Mode, dry_run: bool, reachable: bool) -> AgentTask {
        let tools = ToolConfig::default();
        AgentTask {
            mode,
            prompt_text: "analyze".to_string(),
            allowed_tools: allowed_tools(&tools, mode, dry_run, reachable),
        }
    }

    #[test]
    fn successful_session_collects_turns_and_findings() {
        let backend = ScriptedBackend::new(vec![
            r#"{"type":"system","subtype":"init"}"#.to_string(),
            r#"{"type":"assistant","message":{"content":[{"type":"text","text":"looking"}]}}"#
                .to_string(),
            tool_use_line("Read", r#"{"file_path":"main.py"}"#),
            result_line(r#"{"findings":[{"kind":"system_prompt"}],"summary":"done"}"#, false),
        ]);

        let result = run_session(
            &backend,
            &task(Mode::Validation, true, false),
            &context(true),
            &bridge(false),
            &ScanConfig::default(),
            None,
        );

        assert!(result.success, "error: {:?}", result.error_message);
        assert_eq!(result.findings.len(), 1);
        let roles: Vec<TurnRole> = result.turns.iter().map(|turn| turn.role).collect();
        assert_eq!(
            roles,
            vec![
                TurnRole::System,
                TurnRole::Assistant,
                TurnRole::ToolUse,
                TurnRole::Result
            ]
        );
    }

    #[test]
    fn dry_run_never_attaches_the_bridge() {
        let backend = ScriptedBackend::new(vec![result_line(
            r#"{"findings":[],"summary":"ok"}"#,
            false,
        )]);
        // Even with a reachable-looking bridge, dry-run must not attach it.
        run_session(
            &backend,
            &task(Mode::Guardrails, true, true),
            &context(true),
            &bridge(true),
            &ScanConfig::default(),
            None,
        );

        let request = backend.last_request().expect("request captured");
        assert_eq!(request.mcp_config, None);
        let tools = ToolConfig::default();
        let expected: Vec<String> = tools.read_only.iter().cloned().collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        assert_eq!(request.allowed_tools, expected);
    }

    #[test]
    fn live_session_attaches_bridge_without_credentials_in_config() {
        let backend = ScriptedBackend::new(vec![result_line(
            r#"{"findings":[],"summary":"ok"}"#,
            false,
        )]);
        run_session(
            &backend,
            &task(Mode::Guardrails, false, true),
            &context(false),
            &bridge(true),
            &ScanConfig::default(),
            None,
        );

        let request = backend.last_request().expect("request captured");
        let mcp_config = request.mcp_config.expect("bridge attached");
        assert!(mcp_config.contains("src.server"));
        assert!(!mcp_config.contains("key"), "credential leaked into config");
        assert_eq!(request.env.get("AIC_MANAGEMENT_API_KEY").unwrap(), "key");
    }

    #[test]
    fn malformed_event_fails_but_keeps_partial_transcript() {
        let backend = ScriptedBackend::new(vec![
            r#"{"type":"assistant","message":{"content":[{"type":"text","text":"step one"}]}}"#
                .to_string(),
            "garbage line".to_string(),
        ]);

        let result = run_session(
            &backend,
            &task(Mode::Validation, true, false),
            &context(true),
            &bridge(false),
            &ScanConfig::default(),
            None,
        );

        assert!(!result.success);
        assert!(result
            .error_message
            .as_deref()
            .expect("message")
            .contains("malformed agent event"));
        assert_eq!(result.turns.len(), 1);
        assert_eq!(result.turns[0].content, "step one");
    }

    #[test]
    fn timeout_is_reported_with_the_bound() {
        let backend = ScriptedBackend::timing_out();
        let result = run_session(
            &backend,
            &task(Mode::Validation, true, false),
            &context(true),
            &bridge(false),
            &ScanConfig::default(),
            None,
        );

        assert!(!result.success);
        assert!(result
            .error_message
            .as_deref()
            .expect("message")
            .contains("timed out after 1800s"));
    }

    #[test]
    fn tool_results_keep_transcript_order() {
        let backend = ScriptedBackend::new(vec![
            tool_use_line("Read", r#"{"file_path":"main.py"}"#),
            tool_result_line("print('hi')"),
            result_line(r#"{"findings":[],"summary":"clean"}"#, false),
        ]);

        let result = run_session(
            &backend,
            &task(Mode::Validation, true, false),
            &context(true),
            &bridge(false),
            &ScanConfig::default(),
            None,
        );

        assert!(result.success, "error: {:?}", result.error_message);
        let roles: Vec<TurnRole> = result.turns.iter().map(|turn| turn.role).collect();
        assert_eq!(
            roles,
            vec![TurnRole::ToolUse, TurnRole::ToolResult, TurnRole::Result]
        );
        assert_eq!(result.turns[1].content, "print('hi')");
    }

    #[test]
    fn nonzero_exit_reports_the_stderr_tail() {
        let backend = ScriptedBackend::failing("authentication_error: invalid bearer token");
        let result = run_session(
            &backend,
            &task(Mode::Validation, true, false),
            &context(true),
            &bridge(false),
            &ScanConfig::default(),
            None,
        );

        assert!(!result.success);
        let message = result.error_message.as_deref().expect("message");
        assert!(message.contains("exited with failure"));
        assert!(message.contains("invalid bearer token"));
    }

    #[test]
    fn missing_result_sentinel_is_an_error() {
        let backend = ScriptedBackend::new(vec![
            r#"{"type":"assistant","message":{"content":[{"type":"text","text":"hi"}]}}"#
                .to_string(),
        ]);
        let result = run_session(
            &backend,
            &task(Mode::Validation, true, false),
            &context(true),
            &bridge(false),
            &ScanConfig::default(),
            None,
        );

        assert!(!result.success);
        assert!(result
            .error_message
            .as_deref()
            .expect("message")
            .contains("without a result sentinel"));
    }

    #[test]
    fn backend_failure_still_returns_a_result() {
        let backend = ScriptedBackend::erroring("auth failure: invalid api key");
        let result = run_session(
            &backend,
            &task(Mode::Validation, false, true),
            &context(false),
            &bridge(true),
            &ScanConfig::default(),
            None,
        );

        assert!(!result.success);
        assert!(result
            .error_message
            .as_deref()
            .expect("message")
            .contains("auth failure"));
        assert!(result.turns.is_empty());
        assert!(result.findings.is_empty());
    }

    #[test]
    fn malformed_envelope_fails_with_message() {
        let backend = ScriptedBackend::new(vec![result_line("not an envelope {}", false)]);
        let result = run_session(
            &backend,
            &task(Mode::Validation, true, false),
            &context(true),
            &bridge(false),
            &ScanConfig::default(),
            None,
        );

        assert!(!result.success);
        assert!(result
            .error_message
            .as_deref()
            .expect("message")
            .contains("malformed agent output"));
    }
}
