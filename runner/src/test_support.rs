//! Test-only helpers: scripted agent backends and event-stream fixtures.

use std::cell::RefCell;
use std::path::Path;

use anyhow::{anyhow, Result};

use crate::io::driver::{AgentBackend, BackendOutput, SessionRequest};

/// Backend that replays a predetermined event stream without spawning
/// processes, recording the last request for assertions.
pub struct ScriptedBackend {
    lines: Vec<String>,
    timed_out: bool,
    exit_ok: bool,
    stderr: String,
    spawn_error: Option<String>,
    last_request: RefCell<Option<SessionRequest>>,
}

impl ScriptedBackend {
    /// Backend that completes normally with the given event lines.
    pub fn new(lines: Vec<String>) -> Self {
        Self {
            lines,
            timed_out: false,
            exit_ok: true,
            stderr: String::new(),
            spawn_error: None,
            last_request: RefCell::new(None),
        }
    }

    /// Backend whose session hits the wall-clock bound with no output.
    pub fn timing_out() -> Self {
        let mut backend = Self::new(Vec::new());
        backend.timed_out = true;
        backend.exit_ok = false;
        backend
    }

    /// Backend that fails before producing any stream (spawn/auth failure).
    pub fn erroring(message: &str) -> Self {
        let mut backend = Self::new(Vec::new());
        backend.spawn_error = Some(message.to_string());
        backend
    }

    /// Backend that exits nonzero with the given stderr.
    pub fn failing(stderr: &str) -> Self {
        let mut backend = Self::new(Vec::new());
        backend.exit_ok = false;
        backend.stderr = stderr.to_string();
        backend
    }

    pub fn last_request(&self) -> Option<SessionRequest> {
        self.last_request.borrow().clone()
    }
}

impl AgentBackend for ScriptedBackend {
    fn exec(&self, request: &SessionRequest) -> Result<BackendOutput> {
        *self.last_request.borrow_mut() = Some(request.clone());
        if let Some(message) = &self.spawn_error {
            return Err(anyhow!("{message}"));
        }
        if let Some(path) = &request.transcript_path {
            write_transcript(path, &self.lines);
        }
        Ok(BackendOutput {
            lines: self.lines.clone(),
            timed_out: self.timed_out,
            exit_ok: self.exit_ok,
            stderr: self.stderr.clone(),
        })
    }
}

fn write_transcript(path: &Path, lines: &[String]) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create transcript dir");
    }
    let mut contents = lines.join("\n");
    contents.push('\n');
    std::fs::write(path, contents).expect("write transcript");
}

/// An assistant `tool_use` event line.
pub fn tool_use_line(tool: &str, input_json: &str) -> String {
    format!(
        r#"{{"type":"assistant","message":{{"content":[{{"type":"tool_use","name":"{tool}","input":{input_json}}}]}}}}"#
    )
}

/// A `tool_result` event line.
pub fn tool_result_line(output: &str) -> String {
    format!(
        r#"{{"type":"user","message":{{"content":[{{"type":"tool_result","content":{}}}]}}}}"#,
        serde_json::Value::String(output.to_string())
    )
}

/// The final `result` sentinel line.
pub fn result_line(text: &str, is_error: bool) -> String {
    serde_json::json!({
        "type": "result",
        "subtype": if is_error { "error" } else { "success" },
        "result": text,
        "is_error": is_error,
    })
    .to_string()
}

/// A complete, well-formed stream ending in the given envelope.
pub fn scripted_stream(findings: &[serde_json::Value], summary: &str) -> Vec<String> {
    let envelope = serde_json::json!({ "findings": findings, "summary": summary });
    vec![
        r#"{"type":"system","subtype":"init"}"#.to_string(),
        r#"{"type":"assistant","message":{"content":[{"type":"text","text":"analyzing"}]}}"#
            .to_string(),
        result_line(&envelope.to_string(), false),
    ]
}

/// Create the bridge server entry point under `root` so live-mode bridge
/// construction succeeds in tests.
pub fn write_bridge_entry(root: &Path) {
    let entry = root.join("ai-defense-mcp").join("src").join("server.py");
    std::fs::create_dir_all(entry.parent().expect("parent")).expect("create bridge dir");
    std::fs::write(entry, "# test fixture server\n").expect("write bridge entry");
}
