//! Session transcript model and agent event-stream parsing.
//!
//! The agent runtime emits a finite JSONL stream: one event per line,
//! terminated by a `result` sentinel (or by process death, which the driver
//! records as an error). Parsing is pure; the driver feeds lines in arrival
//! order and the resulting [`Turn`]s keep that order, which is the
//! transcript's primary evidentiary value for audit replay.

use anyhow::{bail, Context, Result};
use jsonschema::Draft;
use serde::{Deserialize, Serialize};
use serde_json::Value;

const OUTPUT_SCHEMA: &str = include_str!("../../schemas/agent_output.schema.json");

/// Role of a single transcript turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnRole {
    /// Runtime housekeeping (session init and similar).
    System,
    /// Assistant text.
    Assistant,
    /// Tool invocation requested by the assistant.
    ToolUse,
    /// Output returned by a tool.
    ToolResult,
    /// Final completion sentinel.
    Result,
}

/// One turn of the agent exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: TurnRole,
    pub content: String,
    /// Tool identifier, present on `tool_use` turns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
}

impl Turn {
    pub fn new(role: TurnRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool: None,
        }
    }

    pub fn tool_use(tool: impl Into<String>, input: impl Into<String>) -> Self {
        Self {
            role: TurnRole::ToolUse,
            content: input.into(),
            tool: Some(tool.into()),
        }
    }
}

/// Complete record of one agent session.
///
/// The driver always returns one of these, even when the session failed
/// partway: `turns` holds everything collected up to the failure and
/// `error_message` says what went wrong.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionResult {
    pub turns: Vec<Turn>,
    /// Opaque findings as emitted by the agent/tooling, in emission order.
    pub findings: Vec<Value>,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl SessionResult {
    /// A failed session that still carries the partial transcript.
    pub fn failed(turns: Vec<Turn>, message: impl Into<String>) -> Self {
        Self {
            turns,
            findings: Vec::new(),
            success: false,
            error_message: Some(message.into()),
        }
    }
}

/// Parsed significance of one stream line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Zero or more transcript turns carried by the event.
    Turns(Vec<Turn>),
    /// Final sentinel with the agent's last message text.
    Completed { text: String, is_error: bool },
}

/// Raw stream records as emitted by the agent runtime (`--output-format
/// stream-json`). Unknown record and block types are tolerated and skipped;
/// a line that is not a JSON object at all is a malformed event.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum StreamRecord {
    System(SystemRecord),
    Assistant(MessageRecord),
    User(MessageRecord),
    Result(ResultRecord),
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
struct SystemRecord {
    #[serde(default)]
    subtype: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessageRecord {
    message: MessageBody,
}

#[derive(Debug, Deserialize)]
struct MessageBody {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        name: String,
        #[serde(default)]
        input: Value,
    },
    ToolResult {
        #[serde(default)]
        content: Value,
        #[serde(default)]
        is_error: bool,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
struct ResultRecord {
    #[serde(default)]
    result: Option<String>,
    #[serde(default)]
    is_error: bool,
}

/// Parse one JSONL event line into transcript turns or the completion sentinel.
pub fn parse_event_line(line: &str) -> Result<StreamEvent> {
    let record: StreamRecord = serde_json::from_str(line).context("parse agent event")?;
    let event = match record {
        StreamRecord::System(system) => StreamEvent::Turns(vec![Turn::new(
            TurnRole::System,
            system.subtype.unwrap_or_default(),
        )]),
        StreamRecord::Assistant(record) | StreamRecord::User(record) => {
            StreamEvent::Turns(turns_from_blocks(record.message.content))
        }
        StreamRecord::Result(result) => StreamEvent::Completed {
            text: result.result.unwrap_or_default(),
            is_error: result.is_error,
        },
        StreamRecord::Unknown => StreamEvent::Turns(Vec::new()),
    };
    Ok(event)
}

fn turns_from_blocks(blocks: Vec<ContentBlock>) -> Vec<Turn> {
    let mut turns = Vec::new();
    for block in blocks {
        match block {
            ContentBlock::Text { text } => turns.push(Turn::new(TurnRole::Assistant, text)),
            ContentBlock::ToolUse { name, input } => {
                turns.push(Turn::tool_use(name, input.to_string()));
            }
            ContentBlock::ToolResult { content, is_error } => {
                let mut turn = Turn::new(TurnRole::ToolResult, render_tool_result(&content));
                if is_error {
                    turn.content = format!("[error] {}", turn.content);
                }
                turns.push(turn);
            }
            ContentBlock::Unknown => {}
        }
    }
    turns
}

fn render_tool_result(content: &Value) -> String {
    match content {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Structured envelope the prompts require as the agent's final message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputEnvelope {
    pub findings: Vec<Value>,
    pub summary: String,
}

/// Parse and validate the agent's final message: schema conformance first,
/// then the typed parse. Findings items stay opaque; the schema only pins the
/// envelope shape.
pub fn parse_output_envelope(text: &str) -> Result<OutputEnvelope> {
    let raw = extract_json_object(text)
        .context("final agent message does not contain a JSON object")?;
    let instance: Value = serde_json::from_str(raw).context("parse output envelope json")?;
    validate_envelope_schema(&instance)?;
    let envelope: OutputEnvelope =
        serde_json::from_value(instance).context("parse output envelope struct")?;
    Ok(envelope)
}

fn validate_envelope_schema(instance: &Value) -> Result<()> {
    let schema: Value =
        serde_json::from_str(OUTPUT_SCHEMA).context("parse embedded output schema")?;
    let compiled = jsonschema::options()
        .with_draft(Draft::Draft202012)
        .build(&schema)
        .context("compile output schema")?;
    let messages: Vec<String> = compiled
        .iter_errors(instance)
        .map(|err| err.to_string())
        .collect();
    if !messages.is_empty() {
        bail!("envelope validation failed:\n- {}", messages.join("\n- "));
    }
    Ok(())
}

/// The final message often wraps the envelope in prose or a code fence; take
/// the outermost `{...}` span.
fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end >= start).then(|| &text[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_assistant_text_and_tool_use_in_order() {
        let line = r#"{"type":"assistant","message":{"content":[
            {"type":"text","text":"inspecting main.py"},
            {"type":"tool_use","name":"Read","input":{"file_path":"main.py"}}
        ]}}"#;
        let event = parse_event_line(line).expect("parse");
        let StreamEvent::Turns(turns) = event else {
            panic!("expected turns");
        };
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, TurnRole::Assistant);
        assert_eq!(turns[0].content, "inspecting main.py");
        assert_eq!(turns[1].role, TurnRole::ToolUse);
        assert_eq!(turns[1].tool.as_deref(), Some("Read"));
    }

    #[test]
    fn parses_tool_result_with_error_marker() {
        let line = r#"{"type":"user","message":{"content":[
            {"type":"tool_result","content":"no such file","is_error":true}
        ]}}"#;
        let StreamEvent::Turns(turns) = parse_event_line(line).expect("parse") else {
            panic!("expected turns");
        };
        assert_eq!(turns[0].role, TurnRole::ToolResult);
        assert!(turns[0].content.starts_with("[error]"));
    }

    #[test]
    fn parses_result_sentinel() {
        let line = r#"{"type":"result","subtype":"success","result":"{\"findings\":[],\"summary\":\"clean\"}","is_error":false}"#;
        let event = parse_event_line(line).expect("parse");
        assert_eq!(
            event,
            StreamEvent::Completed {
                text: r#"{"findings":[],"summary":"clean"}"#.to_string(),
                is_error: false,
            }
        );
    }

    #[test]
    fn unknown_record_types_are_skipped() {
        let event = parse_event_line(r#"{"type":"stream_event","event":{}}"#).expect("parse");
        assert_eq!(event, StreamEvent::Turns(Vec::new()));
    }

    #[test]
    fn malformed_line_is_an_error() {
        assert!(parse_event_line("not json at all").is_err());
    }

    #[test]
    fn envelope_round_trips_through_prose_and_fences() {
        let text = "Here is the report:\n```json\n{\"findings\":[{\"kind\":\"system_prompt\"}],\"summary\":\"one prompt found\"}\n```";
        let envelope = parse_output_envelope(text).expect("parse envelope");
        assert_eq!(envelope.findings.len(), 1);
        assert_eq!(envelope.summary, "one prompt found");
    }

    #[test]
    fn envelope_missing_summary_fails_schema() {
        let err = parse_output_envelope(r#"{"findings":[]}"#).unwrap_err();
        assert!(err.to_string().contains("envelope validation failed"));
    }

    #[test]
    fn envelope_without_json_object_fails() {
        assert!(parse_output_envelope("all done, nothing to report").is_err());
    }
}
