//! Report projection from a finished session.
//!
//! The report is the single durable artifact of a run and the contract
//! consumed by downstream CI steps. Every field is a projection of
//! [`SessionResult`] plus [`RunContext`] (and the caller-supplied timestamp);
//! nothing else feeds it. Downstream consumers must treat `findings` as an
//! opaque, mode-dependent structure and key decisions only off `success`
//! and `mode`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::context::RunContext;
use crate::core::session::SessionResult;
use crate::core::task::Mode;

/// Durable run report, serialized as a single JSON object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub mode: Mode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_id: Option<String>,
    pub target_dir: String,
    pub timestamp: DateTime<Utc>,
    pub dry_run: bool,
    /// Opaque findings in emission order.
    pub findings: Vec<Value>,
    /// Whether analysis completed. Never reflects whether remediation
    /// occurred or what the findings say.
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Project the report. Pure: the timestamp is an input, so identical inputs
/// always produce an identical report (and identical serialized bytes).
pub fn build_report(
    session: &SessionResult,
    context: &RunContext,
    mode: Mode,
    timestamp: DateTime<Utc>,
) -> Report {
    Report {
        mode,
        commit_id: context.commit_id.clone(),
        target_dir: context.target_dir.display().to_string(),
        timestamp,
        dry_run: context.dry_run,
        findings: session.findings.clone(),
        success: session.success,
        error_message: session.error_message.clone(),
    }
}
